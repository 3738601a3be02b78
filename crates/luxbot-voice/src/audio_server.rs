//! Static routes serving synthesized WAV files to the robot.
//!
//! Mounted both by the client (companion file server) and by the TTS service.

use crate::error::{VoiceError, VoiceResult};
use axum::Router;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::path::PathBuf;
use tower_http::services::ServeDir;
use tracing::info;

/// `GET /audio/<file>` and `GET /static/audio/<file>` over `dir`.
pub fn audio_routes(dir: impl Into<PathBuf>) -> Router {
    let dir = dir.into();
    Router::new()
        .nest_service("/audio", ServeDir::new(&dir))
        .nest_service("/static/audio", ServeDir::new(&dir))
}

/// Bind `addr` and serve `dir` until the task is dropped.
pub async fn serve_audio_dir(addr: SocketAddr, dir: PathBuf) -> VoiceResult<()> {
    tokio::fs::create_dir_all(&dir).await?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("📂 Serving {} on http://{}", dir.display(), addr);
    axum::serve(listener, audio_routes(dir))
        .await
        .map_err(|e| VoiceError::Server(e.to_string()))
}

/// LAN address other hosts (the robot) can reach us on. Falls back to loopback.
pub fn local_ip() -> IpAddr {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn spawn(dir: PathBuf) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, audio_routes(dir)).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn serves_existing_file_as_wav() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("reply.wav"), b"RIFFdata").unwrap();
        let addr = spawn(dir.path().to_path_buf()).await;

        for route in ["audio", "static/audio"] {
            let res = reqwest::get(format!("http://{}/{}/reply.wav", addr, route))
                .await
                .unwrap();
            assert_eq!(res.status(), 200);
            assert_eq!(res.headers()["content-type"], "audio/wav");
            assert_eq!(res.bytes().await.unwrap().as_ref(), b"RIFFdata");
        }
    }

    #[tokio::test]
    async fn missing_and_traversal_requests_fail() {
        let parent = tempfile::tempdir().unwrap();
        let served = parent.path().join("audio");
        std::fs::create_dir(&served).unwrap();
        std::fs::write(parent.path().join("secret.txt"), b"keep out").unwrap();
        let addr = spawn(served).await;

        let missing = reqwest::get(format!("http://{}/audio/nope.wav", addr))
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);

        let sneaky = reqwest::get(format!("http://{}/audio/..%2Fsecret.txt", addr))
            .await
            .unwrap();
        assert_eq!(sneaky.status(), 404);
    }
}
