//! Observer-stream wire events (spec section 6). One broadcast channel per
//! session feeds every connected observer with the same ordered sequence.

use serde::Serialize;

use michael_core::session::{SentimentLabel, SessionStatus, TranscriptEntry};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(rename_all_fields = "camelCase")]
pub enum ObserverEvent {
    SessionState {
        status: SessionStatus,
        transcript: Vec<TranscriptEntry>,
        message_count: usize,
    },
    Status {
        value: &'static str,
    },
    UserSpeechInterim {
        text: String,
    },
    UserSpeech {
        text: String,
        #[serde(rename = "final")]
        is_final: bool,
    },
    MichaelSpeech {
        text: String,
        #[serde(rename = "final")]
        is_final: bool,
    },
    SentimentUpdate {
        score: f32,
        label: SentimentLabel,
    },
    BargeIn {
        count: u64,
    },
    GatekeeperDetected,
    GatekeeperNavigated,
    CallbackRequested,
    VoicemailDetected {
        answered_by: String,
    },
    OptOutDetected,
    LanguageDetected {
        language: String,
    },
    MeetingBooked {
        message: String,
    },
    CallEnded {
        reason: String,
        transcript: Vec<TranscriptEntry>,
        duration: u64,
        scoring: serde_json::Value,
    },
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_event_serializes_with_type_tag() {
        let event = ObserverEvent::Status { value: "listening" };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"status\""));
        assert!(json.contains("\"value\":\"listening\""));
    }

    #[test]
    fn user_speech_renames_is_final_to_final() {
        let event = ObserverEvent::UserSpeech { text: "hi".into(), is_final: true };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"final\":true"));
        assert!(!json.contains("isFinal"));
    }

    #[test]
    fn session_state_uses_camel_case_field_names() {
        let event = ObserverEvent::SessionState {
            status: SessionStatus::Connected,
            transcript: vec![],
            message_count: 3,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"messageCount\":3"));
    }
}
