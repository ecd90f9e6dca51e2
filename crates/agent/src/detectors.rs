//! Deterministic, local, pattern-based detectors over prospect utterances
//! (spec section 4.6). Every function here is pure and takes no lock: the
//! orchestrator is the only caller and decides what to do with the result.

use once_cell::sync::Lazy;
use regex::Regex;

const POSITIVE_PATTERNS: &[(&str, f32)] = &[
    ("sounds great", 2.0),
    ("sounds good", 1.5),
    ("that works", 1.5),
    ("i'm interested", 2.0),
    ("im interested", 2.0),
    ("definitely", 1.5),
    ("absolutely", 1.5),
    ("love that", 2.0),
    ("perfect", 1.5),
    ("great", 1.0),
    ("awesome", 1.5),
    ("yes", 0.5),
];

const NEGATIVE_PATTERNS: &[(&str, f32)] = &[
    ("not interested", -2.5),
    ("stop calling", -3.0),
    ("go away", -2.5),
    ("annoying", -2.0),
    ("waste of time", -2.5),
    ("scam", -2.5),
    ("angry", -2.0),
    ("frustrated", -1.5),
    ("no thanks", -1.0),
    ("no thank you", -1.0),
    ("don't", -0.5),
];

/// Running sentiment delta for one utterance (spec section 4.6). Direct
/// pattern matches take priority; an utterance with no pattern hit falls
/// back to a length-based heuristic (short neutral utterances read as
/// disengagement, long ones as engagement).
pub fn sentiment_delta(text: &str) -> f32 {
    let lower = text.to_lowercase();
    let mut delta = 0.0;
    let mut matched = false;
    for (pattern, weight) in POSITIVE_PATTERNS.iter().chain(NEGATIVE_PATTERNS.iter()) {
        if lower.contains(pattern) {
            delta += weight;
            matched = true;
        }
    }
    if matched {
        return delta;
    }

    let word_count = text.split_whitespace().count();
    if word_count <= 2 {
        -0.5
    } else if word_count > 20 {
        1.0
    } else {
        0.0
    }
}

const OPT_OUT_PHRASES: &[&str] = &[
    "stop calling",
    "take me off",
    "don't call",
    "do not call",
    "remove me",
    "no more calls",
];

/// Matches spec section 4.6's opt-out family, including a standalone "stop"
/// at the end of the utterance.
pub fn is_opt_out(text: &str) -> bool {
    let lower = text.to_lowercase();
    if OPT_OUT_PHRASES.iter().any(|p| lower.contains(p)) {
        return true;
    }
    let trimmed = lower.trim_end_matches(|c: char| !c.is_alphanumeric());
    trimmed == "stop" || trimmed.ends_with(" stop")
}

const GATEKEEPER_PHRASES: &[&str] = &[
    "who's calling",
    "who is calling",
    "what's this regarding",
    "what is this regarding",
    "she's in a meeting",
    "he's in a meeting",
    "she's not available",
    "he's not available",
    "let me transfer",
    "front desk",
    "can i take a message",
    "may i take a message",
];

pub fn is_gatekeeper(text: &str) -> bool {
    let lower = text.to_lowercase();
    GATEKEEPER_PHRASES.iter().any(|p| lower.contains(p))
}

const RECOGNITION_CUES: &[&str] = &["speaking", "this is", "hi "];

/// Fires once a later utterance contains both the configured first name and
/// a recognition cue, marking the gatekeeper successfully navigated.
pub fn is_gatekeeper_navigated(text: &str, first_name: &str) -> bool {
    let name = first_name.trim().to_lowercase();
    if name.is_empty() {
        return false;
    }
    let lower = format!("{} ", text.to_lowercase());
    if !lower.contains(&name) {
        return false;
    }
    RECOGNITION_CUES.iter().any(|cue| lower.contains(cue))
}

const CALLBACK_PHRASES: &[&str] = &[
    "call me back",
    "call back",
    "bad time",
    "in a meeting",
    "driving",
    "busy right now",
    "try again later",
    "call later",
    "not a good time",
];

static TIME_ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2}(:\d{2})?\s?(am|pm)|monday|tuesday|wednesday|thursday|friday|saturday|sunday|tomorrow|tonight|this (morning|afternoon|evening)|next week)\b",
    )
    .expect("static time anchor pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackMatch {
    pub requested: bool,
    pub time_anchor: Option<String>,
}

/// Matches spec section 4.6's callback-request family and, when matched,
/// captures any time anchor present in the same utterance.
pub fn detect_callback(text: &str) -> CallbackMatch {
    let lower = text.to_lowercase();
    let requested = CALLBACK_PHRASES.iter().any(|p| lower.contains(p));
    let time_anchor = if requested {
        TIME_ANCHOR_RE.find(&lower).map(|m| m.as_str().trim().to_string())
    } else {
        None
    };
    CallbackMatch { requested, time_anchor }
}

const OBJECTION_PHRASES: &[&str] = &[
    "not interested",
    "too expensive",
    "no budget",
    "send me an email",
    "send an email",
    "how did you get my number",
    "how did you get this number",
    "we already have",
    "not right now",
    "already use",
];

pub fn is_objection(text: &str) -> bool {
    let lower = text.to_lowercase();
    OBJECTION_PHRASES.iter().any(|p| lower.contains(p))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BantSignal {
    pub budget: bool,
    pub authority: bool,
    pub need: bool,
    pub timeline: bool,
}

impl BantSignal {
    pub fn depth(self) -> u8 {
        self.budget as u8 + self.authority as u8 + self.need as u8 + self.timeline as u8
    }
}

const BUDGET_PATTERNS: &[&str] = &["budget", "afford", "cost us", "price point", "how much does"];
const AUTHORITY_PATTERNS: &[&str] =
    &["i'm the decision maker", "i decide", "i'm in charge", "report to me", "i own this"];
const NEED_PATTERNS: &[&str] =
    &["we need", "looking for", "struggling with", "pain point", "problem we have"];
const TIMELINE_PATTERNS: &[&str] =
    &["this quarter", "next month", "by the end of", "asap", "as soon as possible", "this year"];

/// Four independent pattern families, each its own boolean channel (spec
/// section 4.6). An utterance can trip more than one at once.
pub fn detect_bant(text: &str) -> BantSignal {
    let lower = text.to_lowercase();
    BantSignal {
        budget: BUDGET_PATTERNS.iter().any(|p| lower.contains(p)),
        authority: AUTHORITY_PATTERNS.iter().any(|p| lower.contains(p)),
        need: NEED_PATTERNS.iter().any(|p| lower.contains(p)),
        timeline: TIMELINE_PATTERNS.iter().any(|p| lower.contains(p)),
    }
}

static CLOCK_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2}:\d{2}|\d{1,2}\s?[ap]m)\b").expect("valid pattern"));

static DAY_ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday|tomorrow|next (monday|tuesday|wednesday|thursday|friday|saturday|sunday)|january|february|march|april|may|june|july|august|september|october|november|december)\b",
    )
    .expect("valid pattern")
});

const CONFIRMATION_PHRASES: &[&str] = &[
    "sounds good",
    "that works",
    "works for me",
    "perfect",
    "great",
    "yes that's fine",
    "yes that works",
    "book it",
    "let's do it",
];

const SCHEDULING_PHRASES: &[&str] = &[
    "calendar invite",
    "i've got you down",
    "ive got you down",
    "pencil you in",
    "does that work",
    "i'll send over a calendar",
    "you're all set for",
];

/// The three-gate meeting-booked conjunction from spec section 4.6: a
/// specific time anchor and a specific day anchor somewhere in the combined
/// text, a prospect confirmation on the user side, and scheduling language
/// on the assistant side. Missing the day or the time alone does not fire.
pub fn is_meeting_booked(assistant_text: &str, user_text: &str) -> bool {
    let combined = format!("{assistant_text} {user_text}").to_lowercase();
    if !CLOCK_TIME_RE.is_match(&combined) || !DAY_ANCHOR_RE.is_match(&combined) {
        return false;
    }

    let user_lower = user_text.to_lowercase();
    let confirmed = CONFIRMATION_PHRASES.iter().any(|p| user_lower.contains(p));

    let assistant_lower = assistant_text.to_lowercase();
    let scheduled = SCHEDULING_PHRASES.iter().any(|p| assistant_lower.contains(p));

    confirmed && scheduled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_direct_match_wins_over_length_heuristic() {
        let delta = sentiment_delta("that sounds great, definitely interested");
        assert!(delta > 0.0);
    }

    #[test]
    fn sentiment_short_neutral_utterance_is_mildly_negative() {
        assert_eq!(sentiment_delta("ok sure"), -0.5);
    }

    #[test]
    fn sentiment_long_non_negative_utterance_is_positive() {
        let text = "well I think that could potentially work out for our team given everything \
                     going on with our current vendor setup and timeline constraints lately";
        assert_eq!(sentiment_delta(text), 1.0);
    }

    #[test]
    fn opt_out_matches_phrase_family() {
        assert!(is_opt_out("please take me off your list"));
        assert!(is_opt_out("Just stop."));
        assert!(!is_opt_out("stopwatch is broken"));
    }

    #[test]
    fn gatekeeper_detects_third_person_reference() {
        assert!(is_gatekeeper("she's in a meeting right now"));
        assert!(!is_gatekeeper("I'd love to hear more"));
    }

    #[test]
    fn gatekeeper_navigated_requires_name_and_cue() {
        assert!(is_gatekeeper_navigated("Hi, this is John speaking", "John"));
        assert!(!is_gatekeeper_navigated("Hi, who is this?", "John"));
        assert!(!is_gatekeeper_navigated("John is out today", "John"));
    }

    #[test]
    fn callback_captures_time_anchor_when_present() {
        let m = detect_callback("can you call me back tomorrow");
        assert!(m.requested);
        assert_eq!(m.time_anchor.as_deref(), Some("tomorrow"));
    }

    #[test]
    fn callback_without_anchor_has_none() {
        let m = detect_callback("it's a bad time right now");
        assert!(m.requested);
        assert!(m.time_anchor.is_none());
    }

    #[test]
    fn objection_matches_fixed_list() {
        assert!(is_objection("we have no budget for this"));
        assert!(!is_objection("tell me more"));
    }

    #[test]
    fn bant_depth_sums_independent_channels() {
        let signal = detect_bant("our budget is tight and this has to happen by this quarter");
        assert!(signal.budget);
        assert!(signal.timeline);
        assert!(!signal.authority);
        assert_eq!(signal.depth(), 2);
    }

    #[test]
    fn meeting_booked_requires_all_three_gates() {
        let assistant = "Great, I've got you down, does that work for you?";
        let user = "Yes that works, Tuesday at 2pm is perfect";
        assert!(is_meeting_booked(assistant, user));
    }

    #[test]
    fn meeting_booked_missing_day_does_not_fire() {
        let assistant = "I've got you down, does that work?";
        let user = "Yes that works, 2pm is perfect";
        assert!(!is_meeting_booked(assistant, user));
    }

    #[test]
    fn meeting_booked_missing_time_does_not_fire() {
        let assistant = "I've got you down, does that work?";
        let user = "Yes that works, Tuesday is perfect";
        assert!(!is_meeting_booked(assistant, user));
    }

    #[test]
    fn meeting_booked_without_confirmation_does_not_fire() {
        let assistant = "I've got you down, does that work?";
        let user = "Tuesday at 2pm, let me think about it";
        assert!(!is_meeting_booked(assistant, user));
    }
}
