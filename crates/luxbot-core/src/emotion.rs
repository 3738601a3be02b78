//! Emotion tags in model output, language prefix splitting, and the emotion → gesture table.
//!
//! The model is asked to end every reply with `<user_emotion=X><response_emotion=Y>`.
//! Nothing guarantees it does; [`extract_emotions`] never fails and reports a
//! `malformed` reading instead, with both labels defaulting to Calm.

use crate::robot::Gesture;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static USER_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<user_emotion\s*=\s*(Happy|Sad|Angry|Calm)\s*>").expect("valid user tag regex")
});
static RESPONSE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<response_emotion\s*=\s*(Happy|Sad|Angry|Calm)\s*>")
        .expect("valid response tag regex")
});
static ANGLE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid markup regex"));
static LANGUAGE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]{2})\s*:\s*").expect("valid language prefix regex"));

/// Closed emotion vocabulary. Anything unrecognised reads as Calm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EmotionLabel {
    Happy,
    Sad,
    Angry,
    #[default]
    Calm,
}

impl EmotionLabel {
    /// Case-insensitive parse; `None` outside the vocabulary.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "happy" => Some(Self::Happy),
            "sad" => Some(Self::Sad),
            "angry" => Some(Self::Angry),
            "calm" => Some(Self::Calm),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Happy => "Happy",
            Self::Sad => "Sad",
            Self::Angry => "Angry",
            Self::Calm => "Calm",
        }
    }

    /// Robot gesture expressing this emotion.
    pub fn gesture(&self) -> Gesture {
        match self {
            Self::Happy => Gesture::new("Smile", 1.0, 1.5),
            Self::Sad => Gesture::new("ExpressSad", 0.8, 1.5),
            Self::Angry => Gesture::new("ExpressAnger", 0.8, 1.2),
            Self::Calm => Gesture::new("Smile", 0.5, 1.0),
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Played while waiting on the model.
pub fn thinking_gesture() -> Gesture {
    Gesture::new("Thoughtful", 0.6, 1.2)
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmotionReading {
    pub user: EmotionLabel,
    pub response: EmotionLabel,
    /// Input with every `<...>` span removed, trimmed.
    pub text: String,
    /// At least one of the two tags was missing or outside the vocabulary.
    pub malformed: bool,
}

fn find_label(re: &Regex, raw: &str) -> Option<EmotionLabel> {
    re.captures(raw)
        .and_then(|c| c.get(1))
        .and_then(|m| EmotionLabel::parse(m.as_str()))
}

/// Parse the two emotion tags out of raw model output. Never fails.
pub fn extract_emotions(raw: &str) -> EmotionReading {
    let user = find_label(&USER_TAG, raw);
    let response = find_label(&RESPONSE_TAG, raw);
    EmotionReading {
        user: user.unwrap_or_default(),
        response: response.unwrap_or_default(),
        text: ANGLE_SPAN.replace_all(raw, "").trim().to_string(),
        malformed: user.is_none() || response.is_none(),
    }
}

/// Split a leading `xx:` language code off spoken text. The code is lowercased;
/// text without a prefix is returned whole with no language.
pub fn split_language_prefix(text: &str) -> (Option<String>, String) {
    match LANGUAGE_PREFIX.captures(text) {
        Some(caps) => {
            let lang = caps[1].to_ascii_lowercase();
            let rest = text[caps[0].len()..].trim().to_string();
            (Some(lang), rest)
        }
        None => (None, text.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_both_tags() {
        let r = extract_emotions("Hello <user_emotion=Happy><response_emotion=Sad>");
        assert_eq!(r.user, EmotionLabel::Happy);
        assert_eq!(r.response, EmotionLabel::Sad);
        assert_eq!(r.text, "Hello");
        assert!(!r.malformed);
    }

    #[test]
    fn untagged_text_is_calm_and_flagged() {
        let r = extract_emotions("  Just words, <b>bold</b> and all ");
        assert_eq!((r.user, r.response), (EmotionLabel::Calm, EmotionLabel::Calm));
        assert_eq!(r.text, "Just words, bold and all");
        assert!(!r.text.contains('<') && !r.text.contains('>'));
        assert!(r.malformed);
    }

    #[test]
    fn tolerates_case_spacing_and_order() {
        let r = extract_emotions("<RESPONSE_EMOTION = calm> Sure thing <user_emotion=ANGRY >");
        assert_eq!(r.user, EmotionLabel::Angry);
        assert_eq!(r.response, EmotionLabel::Calm);
        assert_eq!(r.text, "Sure thing");
    }

    #[test]
    fn out_of_vocabulary_label_defaults_to_calm() {
        let r = extract_emotions("Ok <user_emotion=Excited><response_emotion=Happy>");
        assert_eq!(r.user, EmotionLabel::Calm);
        assert_eq!(r.response, EmotionLabel::Happy);
        assert!(r.malformed);
        assert_eq!(r.text, "Ok");
    }

    #[test]
    fn language_prefix_is_split() {
        assert_eq!(
            split_language_prefix("en: Maybe relax at a cafe."),
            (Some("en".to_string()), "Maybe relax at a cafe.".to_string())
        );
        assert_eq!(
            split_language_prefix("LB:Moien!"),
            (Some("lb".to_string()), "Moien!".to_string())
        );
        assert_eq!(
            split_language_prefix("Time is 10:30"),
            (None, "Time is 10:30".to_string())
        );
    }

    #[test]
    fn gesture_table() {
        assert_eq!(EmotionLabel::Happy.gesture(), Gesture::new("Smile", 1.0, 1.5));
        assert_eq!(EmotionLabel::Sad.gesture().name, "ExpressSad");
        assert_eq!(EmotionLabel::Angry.gesture().name, "ExpressAnger");
        assert_eq!(EmotionLabel::Calm.gesture(), Gesture::new("Smile", 0.5, 1.0));
    }
}
