//! The per-call data model: identity, conversation history, transcript,
//! scoring counters, and the flag set described in spec section 3.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Opaque session identifier, addressable for the call's lifetime plus the
/// post-completion grace window.
pub type SessionId = String;

pub fn new_session_id() -> SessionId {
    Uuid::new_v4().to_string()
}

/// Tone directive, closed set per the Prompt Builder contract. Unknown
/// input on the wire defaults to `Professional`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Friendly,
    Consultative,
    Aggressive,
}

impl Tone {
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(str::to_ascii_lowercase).as_deref() {
            Some("friendly") => Tone::Friendly,
            Some("consultative") => Tone::Consultative,
            Some("aggressive") => Tone::Aggressive,
            Some("professional") => Tone::Professional,
            _ => Tone::Professional,
        }
    }
}

/// Immutable prospect identity supplied at initiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prospect {
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone: String,
}

/// Immutable operator-supplied selling context. Domain-specific copy is
/// treated as opaque configuration, per spec section 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorInput {
    pub company: String,
    pub selling: String,
    #[serde(default)]
    pub tone: Tone,
    pub industry: Option<String>,
    pub target_role: Option<String>,
    #[serde(default)]
    pub value_props: Vec<String>,
    #[serde(default)]
    pub common_objections: Vec<String>,
    pub additional_context: Option<String>,
    pub email: Option<String>,
}

/// Telephony-reported and internally-derived call status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Initiating,
    Ringing,
    Connected,
    Completed,
    Busy,
    NoAnswer,
    Canceled,
    Failed,
}

impl SessionStatus {
    /// A session is either active or terminal; terminal sessions reject
    /// new media events and accept only introspection (invariant, spec §3).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed
                | SessionStatus::Busy
                | SessionStatus::NoAnswer
                | SessionStatus::Canceled
                | SessionStatus::Failed
        )
    }
}

/// Role of a conversation-history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Assistant,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub text: String,
}

/// Display transcript entry. Mirrors conversation history plus non-LLM
/// lines (e.g. a voicemail message), annotated with a speaker label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Sentiment label, derived by thresholding the running score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Hostile,
    Negative,
    Neutral,
    Positive,
    Enthusiastic,
}

impl SentimentLabel {
    /// Thresholds from spec section 4.6.
    pub fn from_score(score: f32) -> Self {
        if score <= -6.0 {
            SentimentLabel::Hostile
        } else if score <= -2.0 {
            SentimentLabel::Negative
        } else if score <= 2.0 {
            SentimentLabel::Neutral
        } else if score <= 6.0 {
            SentimentLabel::Positive
        } else {
            SentimentLabel::Enthusiastic
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentPoint {
    pub turn_index: usize,
    pub score: f32,
    pub label: SentimentLabel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentimentState {
    pub score: f32,
    pub history: Vec<SentimentPoint>,
}

impl SentimentState {
    pub fn label(&self) -> SentimentLabel {
        SentimentLabel::from_score(self.score)
    }
}

/// Budget/Authority/Need/Timeline qualification checklist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bant {
    pub budget: bool,
    pub authority: bool,
    pub need: bool,
    pub timeline: bool,
}

impl Bant {
    pub fn depth(&self) -> u8 {
        self.budget as u8 + self.authority as u8 + self.need as u8 + self.timeline as u8
    }
}

/// Monotonic counters and the BANT checklist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counters {
    pub michael_word_count: u64,
    pub prospect_word_count: u64,
    pub barge_in_count: u64,
    pub objection_count: u64,
    pub bant: Bant,
}

/// The flag set described in spec section 3.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Flags {
    pub speaking: bool,
    pub opening_sent: bool,
    pub opening_cooldown: bool,
    pub gatekeeper: bool,
    pub gatekeeper_navigated: bool,
    pub voicemail: bool,
    pub voicemail_handled: bool,
    pub non_english: bool,
    pub callback_requested: bool,
    pub meeting_booked: bool,
    pub opt_out: bool,
}

/// The per-call data object. Mutated exclusively by the orchestrator's
/// single-writer task (spec section 5); everything else reads a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub call_sid: Option<String>,
    pub stream_sid: Option<String>,
    pub prospect: Prospect,
    pub operator: OperatorInput,
    pub status: SessionStatus,
    pub flags: Flags,
    pub counters: Counters,
    pub sentiment: SentimentState,
    pub conversation: Vec<ConversationEntry>,
    pub transcript: Vec<TranscriptEntry>,
    pub created_at: DateTime<Utc>,
    pub duration_seconds: Option<u64>,
    pub end_reason: Option<String>,
    pub callback_time: Option<String>,
}

impl Session {
    pub fn new(prospect: Prospect, operator: OperatorInput) -> Self {
        Self {
            id: new_session_id(),
            call_sid: None,
            stream_sid: None,
            prospect,
            operator,
            status: SessionStatus::Pending,
            flags: Flags::default(),
            counters: Counters::default(),
            sentiment: SentimentState::default(),
            conversation: Vec::new(),
            transcript: Vec::new(),
            created_at: Utc::now(),
            duration_seconds: None,
            end_reason: None,
            callback_time: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Guards the duplicate-`start`-event invariant: the opening may be
    /// sent exactly once. Returns an error when a second attempt is made.
    pub fn mark_opening_sent(&mut self) -> Result<()> {
        if self.flags.opening_sent {
            return Err(Error::DuplicateStart(self.id.clone()));
        }
        self.flags.opening_sent = true;
        Ok(())
    }

    /// Clears opening cooldown exactly once (duration estimate or the
    /// 15-second safety timer, whichever fires first).
    pub fn clear_opening_cooldown(&mut self) -> Result<()> {
        if !self.flags.opening_cooldown {
            return Err(Error::CooldownAlreadyCleared(self.id.clone()));
        }
        self.flags.opening_cooldown = false;
        Ok(())
    }

    fn word_count(text: &str) -> u64 {
        text.split_whitespace().count() as u64
    }

    /// Appends to conversation history and the display transcript in one
    /// step so the two can never drift (invariant #1 in spec section 8).
    pub fn append_turn(&mut self, role: Role, speaker: &str, text: &str) {
        let count = Self::word_count(text);
        match role {
            Role::Assistant => self.counters.michael_word_count += count,
            Role::User => self.counters.prospect_word_count += count,
        }
        self.conversation.push(ConversationEntry {
            role,
            text: text.to_string(),
        });
        self.transcript.push(TranscriptEntry {
            speaker: speaker.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Appends a transcript-only line (e.g. the voicemail message is
    /// appended to history as assistant speech, but an explicit
    /// `voicemail` tag may be applied by the caller via `speaker`).
    pub fn append_transcript_only(&mut self, speaker: &str, text: &str) {
        self.transcript.push(TranscriptEntry {
            speaker: speaker.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn update_sentiment(&mut self, delta: f32) {
        let next = (self.sentiment.score * 0.85 + delta).clamp(-10.0, 10.0);
        self.sentiment.score = next;
        self.sentiment.history.push(SentimentPoint {
            turn_index: self.conversation.len(),
            score: next,
            label: SentimentLabel::from_score(next),
        });
    }

    pub fn record_barge_in(&mut self) {
        self.counters.barge_in_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> Session {
        Session::new(
            Prospect {
                first_name: "John".into(),
                last_name: None,
                phone: "+15551234567".into(),
            },
            OperatorInput {
                company: "Acme".into(),
                selling: "AI sales automation".into(),
                tone: Tone::Professional,
                industry: None,
                target_role: None,
                value_props: vec![],
                common_objections: vec![],
                additional_context: None,
                email: None,
            },
        )
    }

    #[test]
    fn word_counts_are_exact_sums() {
        let mut s = sample_session();
        s.append_turn(Role::Assistant, "michael", "Hi there, how are you?");
        s.append_turn(Role::User, "prospect", "I'm good thanks");
        assert_eq!(s.counters.michael_word_count, 5);
        assert_eq!(s.counters.prospect_word_count, 3);
    }

    #[test]
    fn history_and_transcript_stay_in_lockstep() {
        let mut s = sample_session();
        s.append_turn(Role::Assistant, "michael", "Hello");
        s.append_turn(Role::User, "prospect", "Hi");
        assert_eq!(s.conversation.len(), s.transcript.len());
        assert_eq!(s.transcript[0].text, "Hello");
        assert_eq!(s.transcript[1].text, "Hi");
    }

    #[test]
    fn sentiment_is_clamped() {
        let mut s = sample_session();
        for _ in 0..50 {
            s.update_sentiment(-20.0);
        }
        assert!(s.sentiment.score >= -10.0);
        for _ in 0..50 {
            s.update_sentiment(20.0);
        }
        assert!(s.sentiment.score <= 10.0);
    }

    #[test]
    fn duplicate_opening_is_rejected() {
        let mut s = sample_session();
        assert!(s.mark_opening_sent().is_ok());
        assert!(s.mark_opening_sent().is_err());
    }

    #[test]
    fn cooldown_clears_at_most_once() {
        let mut s = sample_session();
        s.flags.opening_cooldown = true;
        assert!(s.clear_opening_cooldown().is_ok());
        assert!(s.clear_opening_cooldown().is_err());
    }

    #[test]
    fn bant_depth_sums_channels() {
        let mut b = Bant::default();
        assert_eq!(b.depth(), 0);
        b.budget = true;
        b.timeline = true;
        assert_eq!(b.depth(), 2);
    }
}
