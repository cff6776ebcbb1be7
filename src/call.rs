use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ids::{AccountSid, CallSid, RecordingSid};
use crate::markup::{DialNoun, DialRecord, HttpMethod, Verb};
use crate::timeline::Timeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Provider-compatible terminal/non-terminal call statuses (spec §3, §7).
/// `Canceled` covers a Dial leg that lost a first-answer-wins race (spec §9
/// open question 1) — it never appears as the *parent* call's own status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Queued,
    Ringing,
    InProgress,
    Completed,
    Busy,
    Failed,
    NoAnswer,
    Canceled,
}

impl CallStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallStatus::Completed
                | CallStatus::Busy
                | CallStatus::Failed
                | CallStatus::NoAnswer
                | CallStatus::Canceled
        )
    }
}

/// A call's current location within the engine topology (spec §3 "current
/// endpoint", GLOSSARY "Endpoint").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub enum Endpoint {
    #[default]
    None,
    Queue(String),
    Conference(String),
    Gather,
    Dialing,
}

impl Endpoint {
    /// The wire form used in timeline details and snapshots: `""`,
    /// `queue:<name>`, `conference:<name>`, `gather`, `dialing`.
    pub fn as_wire(&self) -> String {
        match self {
            Endpoint::None => String::new(),
            Endpoint::Queue(name) => format!("queue:{name}"),
            Endpoint::Conference(name) => format!("conference:{name}"),
            Endpoint::Gather => "gather".to_string(),
            Endpoint::Dialing => "dialing".to_string(),
        }
    }
}

/// The fetched-and-parsed markup a call is currently executing, plus where
/// in it execution has reached (spec §4.6 "pending-markup cursor").
#[derive(Debug, Clone, Default)]
pub struct MarkupCursor {
    pub verbs: Vec<Verb>,
    pub index: usize,
}

impl MarkupCursor {
    pub fn replace(&mut self, verbs: Vec<Verb>) {
        self.verbs = verbs;
        self.index = 0;
    }

    pub fn current(&self) -> Option<&Verb> {
        self.verbs.get(self.index)
    }

    pub fn advance(&mut self) {
        self.index += 1;
    }

    pub fn at_end(&self) -> bool {
        self.index >= self.verbs.len()
    }
}

/// State of an in-progress `<Gather>` (spec §4.6).
#[derive(Debug, Clone)]
pub struct GatherState {
    pub action: Option<String>,
    pub method: HttpMethod,
    pub num_digits: Option<u32>,
    pub finish_on_key: String,
    pub digits: String,
}

/// State of an in-progress `<Dial>` (spec §4.6): the full ordered child-noun
/// sequence, which one is currently being tried, and its call leg if it
/// minted one. `child_index` advances on a failed/unanswered leg so
/// `<Dial>` tries each child in order until one answers or the list is
/// exhausted (spec §4.3 "Iterate children in order").
#[derive(Debug, Clone)]
pub struct DialState {
    pub action: Option<String>,
    pub method: HttpMethod,
    pub record: DialRecord,
    pub timeout_secs: u32,
    pub children: Vec<DialNoun>,
    pub child_index: usize,
    pub current_child: Option<CallSid>,
}

/// State of an in-progress `<Record>` (spec §4.6).
#[derive(Debug, Clone)]
pub struct RecordState {
    pub recording_sid: RecordingSid,
    pub action: Option<String>,
    pub method: HttpMethod,
    pub finish_on_key: String,
}

/// Remembers where/how to report `QueueResult`/`QueueTime` once this call is
/// dequeued by a `<Dial><Queue>` elsewhere (spec §4.6 "Enqueue").
#[derive(Debug, Clone)]
pub struct EnqueueState {
    pub action: Option<String>,
    pub method: HttpMethod,
    pub entered_at: Duration,
}

/// A single call leg (spec §3 "Call"). Owns both its static identity and its
/// live execution state — the two aren't split into separate types since
/// nothing else ever holds a call independent of its current progress
/// through markup.
#[derive(Debug, Clone)]
pub struct Call {
    pub sid: CallSid,
    pub account_sid: AccountSid,
    pub from: String,
    pub to: String,
    pub direction: Direction,
    pub status: CallStatus,
    pub start_at: Duration,
    pub answered_at: Option<Duration>,
    pub ended_at: Option<Duration>,
    pub parent_call_sid: Option<CallSid>,
    pub endpoint: Endpoint,
    pub timeline: Timeline,
    pub variables: BTreeMap<String, String>,
    pub answer_url: String,
    pub answer_method: HttpMethod,
    pub status_callback: Option<String>,
    pub status_callback_method: HttpMethod,
    pub fail_reason: Option<String>,
    pub recording_sid: Option<RecordingSid>,
    pub cursor: MarkupCursor,
    pub gather: Option<GatherState>,
    pub dial: Option<DialState>,
    pub record: Option<RecordState>,
    pub enqueue_state: Option<EnqueueState>,
    /// Set once the answer/voice URL has been fetched the first time, so the
    /// execution loop can tell "markup exhausted, fetch initial" apart from
    /// "markup exhausted, hang up" (spec §4.6 execution loop).
    pub fetched_initial: bool,
    /// True while a `<Pause>` verb's timer is outstanding.
    pub pause_pending: bool,
}

impl Call {
    #[allow(clippy::too_many_arguments)]
    fn new(
        sid: CallSid,
        account_sid: AccountSid,
        from: String,
        to: String,
        direction: Direction,
        status: CallStatus,
        answer_url: String,
        answer_method: HttpMethod,
        status_callback: Option<String>,
        status_callback_method: HttpMethod,
        parent_call_sid: Option<CallSid>,
        now: Duration,
    ) -> Self {
        Call {
            sid,
            account_sid,
            from,
            to,
            direction,
            status,
            start_at: now,
            answered_at: None,
            ended_at: None,
            parent_call_sid,
            endpoint: Endpoint::None,
            timeline: Timeline::new(),
            variables: BTreeMap::new(),
            answer_url,
            answer_method,
            status_callback,
            status_callback_method,
            fail_reason: None,
            recording_sid: None,
            cursor: MarkupCursor::default(),
            gather: None,
            dial: None,
            record: None,
            enqueue_state: None,
            fetched_initial: false,
            pause_pending: false,
        }
    }

    /// Outbound call created via the REST/engine surface: starts `Queued`
    /// (spec §4.6 "Initial state selection").
    #[allow(clippy::too_many_arguments)]
    pub fn new_outbound(
        sid: CallSid,
        account_sid: AccountSid,
        from: String,
        to: String,
        answer_url: String,
        answer_method: HttpMethod,
        status_callback: Option<String>,
        status_callback_method: HttpMethod,
        parent_call_sid: Option<CallSid>,
        now: Duration,
    ) -> Self {
        Self::new(
            sid,
            account_sid,
            from,
            to,
            Direction::Outbound,
            CallStatus::Queued,
            answer_url,
            answer_method,
            status_callback,
            status_callback_method,
            parent_call_sid,
            now,
        )
    }

    /// Simulated inbound call: starts `Ringing` (spec §4.6). The engine
    /// auto-answers it immediately afterward via `mark_answered`.
    #[allow(clippy::too_many_arguments)]
    pub fn new_inbound(
        sid: CallSid,
        account_sid: AccountSid,
        from: String,
        to: String,
        answer_url: String,
        answer_method: HttpMethod,
        status_callback: Option<String>,
        status_callback_method: HttpMethod,
        now: Duration,
    ) -> Self {
        Self::new(
            sid,
            account_sid,
            from,
            to,
            Direction::Inbound,
            CallStatus::Ringing,
            answer_url,
            answer_method,
            status_callback,
            status_callback_method,
            None,
            now,
        )
    }

    pub fn push_event(&mut self, now: Duration, kind: impl Into<String>, detail: BTreeMap<String, String>) {
        self.timeline.push(now, kind, detail);
    }

    /// Seconds between answer and end, for `CallDuration` on terminal
    /// status callbacks (spec §4.6).
    pub fn duration_secs(&self) -> Option<u64> {
        match (self.answered_at, self.ended_at) {
            (Some(a), Some(e)) => Some(e.saturating_sub(a).as_secs()),
            _ => None,
        }
    }

    /// Transitions Ringing → InProgress. No-op (returns `false`) if already
    /// answered (spec §8 "`AnswerCall` on an already-answered call is a
    /// no-op").
    pub fn mark_answered(&mut self, now: Duration) -> bool {
        if self.answered_at.is_some() {
            return false;
        }
        self.status = CallStatus::InProgress;
        self.answered_at = Some(now);
        true
    }

    /// Moves the call to a terminal status, clearing execution state. No-op
    /// (returns `false`) if already terminal (spec §8 "`Hangup` on a
    /// completed call is a no-op").
    pub fn mark_ended(&mut self, status: CallStatus, reason: Option<String>, now: Duration) -> bool {
        debug_assert!(status.is_terminal(), "mark_ended requires a terminal status");
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.ended_at = Some(now);
        self.fail_reason = reason;
        self.endpoint = Endpoint::None;
        self.gather = None;
        self.dial = None;
        self.record = None;
        self.enqueue_state = None;
        self.pause_pending = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_call(status: Direction) -> Call {
        match status {
            Direction::Outbound => Call::new_outbound(
                CallSid::generate(),
                AccountSid::generate(),
                "+15551110000".to_string(),
                "+15552220000".to_string(),
                "http://app/voice".to_string(),
                HttpMethod::Post,
                None,
                HttpMethod::Post,
                None,
                Duration::ZERO,
            ),
            Direction::Inbound => Call::new_inbound(
                CallSid::generate(),
                AccountSid::generate(),
                "+15552220000".to_string(),
                "+15551110000".to_string(),
                "http://app/voice".to_string(),
                HttpMethod::Post,
                None,
                HttpMethod::Post,
                Duration::ZERO,
            ),
        }
    }

    #[test]
    fn outbound_starts_queued_inbound_starts_ringing() {
        assert_eq!(new_call(Direction::Outbound).status, CallStatus::Queued);
        assert_eq!(new_call(Direction::Inbound).status, CallStatus::Ringing);
    }

    #[test]
    fn answer_call_is_idempotent() {
        let mut call = new_call(Direction::Outbound);
        assert!(call.mark_answered(Duration::from_secs(1)));
        assert_eq!(call.status, CallStatus::InProgress);
        assert_eq!(call.answered_at, Some(Duration::from_secs(1)));
        assert!(!call.mark_answered(Duration::from_secs(2)));
        assert_eq!(call.answered_at, Some(Duration::from_secs(1)));
    }

    #[test]
    fn hangup_on_completed_call_is_a_no_op() {
        let mut call = new_call(Direction::Outbound);
        call.mark_answered(Duration::from_secs(1));
        assert!(call.mark_ended(CallStatus::Completed, None, Duration::from_secs(5)));
        assert_eq!(call.duration_secs(), Some(4));
        assert!(!call.mark_ended(CallStatus::Failed, Some("x".to_string()), Duration::from_secs(6)));
        assert_eq!(call.status, CallStatus::Completed);
        assert_eq!(call.ended_at, Some(Duration::from_secs(5)));
    }

    #[test]
    fn endpoint_wire_forms() {
        assert_eq!(Endpoint::None.as_wire(), "");
        assert_eq!(Endpoint::Queue("support".to_string()).as_wire(), "queue:support");
        assert_eq!(Endpoint::Conference("room-1".to_string()).as_wire(), "conference:room-1");
        assert_eq!(Endpoint::Gather.as_wire(), "gather");
        assert_eq!(Endpoint::Dialing.as_wire(), "dialing");
    }
}
