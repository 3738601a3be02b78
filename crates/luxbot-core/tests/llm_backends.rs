//! LLM backends against wiremock stand-ins for the hosted chat API and the
//! self-hosted generation server.

use luxbot_core::{
    DialogueHistory, LanguageModel, LlmBackendKind, OpenAiChat, PromptBuilder, PromptPayload,
    SelfHostedLlm,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_prompt() -> PromptPayload {
    PromptBuilder::new("1").build(LlmBackendKind::OpenAi, &DialogueHistory::new(4), "Is the post office open?")
}

#[tokio::test]
async fn openai_chat_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "gpt-4o-mini" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [
                { "message": { "role": "assistant", "content": " en: Yes, until 6pm. <user_emotion=Calm><response_emotion=Calm> " } },
                { "message": { "role": "assistant", "content": "ignored" } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let llm = OpenAiChat::new(&format!("{}/v1/", server.uri()), "sk-test", "gpt-4o-mini");
    let reply = llm.generate(&chat_prompt()).await.unwrap();
    assert_eq!(reply, "en: Yes, until 6pm. <user_emotion=Calm><response_emotion=Calm>");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"][1]["content"], "Is the post office open?");
}

#[tokio::test]
async fn openai_error_status_degrades_to_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let llm = OpenAiChat::new(&server.uri(), "sk-test", "gpt-4o-mini");
    assert_eq!(llm.generate(&chat_prompt()).await.unwrap(), "");
}

#[tokio::test]
async fn openai_rejects_text_prompt() {
    let llm = OpenAiChat::new("http://127.0.0.1:9", "sk-test", "gpt-4o-mini");
    assert!(llm.generate(&PromptPayload::Text("hi".to_string())).await.is_err());
}

#[tokio::test]
async fn self_hosted_posts_prompt_and_cleans_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .and(body_partial_json(json!({ "max_tokens": 128 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "text": "lb: Moien! Wéi geet et? <user_emotion=happy><response_emotion=happy>\n<user>\nGutt\n</user>"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut history = DialogueHistory::new(4);
    history.push_user("Salut");
    history.push_assistant("lb: Salut!");
    let prompt = PromptBuilder::new("2").build(LlmBackendKind::LuxLlama, &history, "Moien");

    let llm = SelfHostedLlm::new(&format!("{}/generate", server.uri()), 128);
    let reply = llm.generate(&prompt).await.unwrap();
    assert_eq!(reply, "lb: Moien! Wéi geet et? <user_emotion=Happy><response_emotion=Happy>");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let sent = body["prompt"].as_str().unwrap();
    assert!(sent.starts_with("<system>\n"));
    assert!(sent.ends_with("<user>\nMoien\n</user>\n\n<assistant>\n"));
}

#[tokio::test]
async fn self_hosted_error_status_degrades_to_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let llm = SelfHostedLlm::new(&format!("{}/generate", server.uri()), 128);
    let reply = llm.generate(&PromptPayload::Text("<system>\n</system>\n\n".to_string())).await.unwrap();
    assert_eq!(reply, "");
}

#[tokio::test]
async fn unreachable_backend_degrades_to_empty() {
    let llm = SelfHostedLlm::new("http://127.0.0.1:1/generate", 128);
    let reply = llm.generate(&PromptPayload::Text("hi".to_string())).await.unwrap();
    assert_eq!(reply, "");
}
