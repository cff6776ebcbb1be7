use std::time::{Duration, Instant};

use crate::ids::CallSid;

/// What a fired timer means to the call state machine (spec §4.6 "Timers").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerKind {
    /// A call has been ringing (top-level or a Dial leg) past its deadline
    /// with no `AnswerCall`.
    RingTimeout { call_id: CallSid },
    /// A Gather verb's `timeout` elapsed since the last prompt/digit.
    GatherTimeout { call_id: CallSid },
    /// A Pause verb's `length` elapsed.
    PauseDone { call_id: CallSid },
    /// A Record verb's `maxLength` elapsed with no explicit finish.
    RecordMaxLength { call_id: CallSid },
    /// The overall `<Dial>` verb's `timeout` elapsed (covers Number/Sip ring
    /// and an empty Dial→Queue wait).
    DialTimeout { call_id: CallSid },
}

impl TimerKind {
    pub fn call_id(&self) -> &CallSid {
        match self {
            TimerKind::RingTimeout { call_id }
            | TimerKind::GatherTimeout { call_id }
            | TimerKind::PauseDone { call_id }
            | TimerKind::RecordMaxLength { call_id }
            | TimerKind::DialTimeout { call_id } => call_id,
        }
    }
}

#[derive(Debug, Clone)]
struct TimerEntry {
    deadline: Duration,
    seq: u64,
    kind: TimerKind,
}

/// Monotonic virtual (or real) time source, scoped to a single account
/// (spec §4.1, §4.7 `SetClockForAccount`/`AdvanceForAccount`).
///
/// In virtual mode, time only moves when `advance` is called, and doing so
/// deterministically fires every timer whose deadline has been reached, in
/// deadline order with ties broken by registration order. In real-time mode
/// `now()` reflects wall-clock elapsed time and `advance` is a no-op (timers
/// are expected to be polled/reaped by the caller as wall-clock catches up).
pub struct Clock {
    real_time: bool,
    now: Duration,
    real_epoch: Instant,
    timers: Vec<TimerEntry>,
    next_seq: u64,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new_virtual()
    }
}

impl Clock {
    pub fn new_virtual() -> Self {
        Self {
            real_time: false,
            now: Duration::ZERO,
            real_epoch: Instant::now(),
            timers: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn new_real_time() -> Self {
        Self {
            real_time: true,
            now: Duration::ZERO,
            real_epoch: Instant::now(),
            timers: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn set_real_time(&mut self, real_time: bool) {
        self.real_time = real_time;
        self.real_epoch = Instant::now();
        self.now = Duration::ZERO;
    }

    pub fn is_real_time(&self) -> bool {
        self.real_time
    }

    /// Current virtual time, or elapsed wall-clock time since the clock was
    /// put into real-time mode.
    pub fn now(&self) -> Duration {
        if self.real_time {
            self.real_epoch.elapsed()
        } else {
            self.now
        }
    }

    /// Registers a timer `delay` from now, returning its kind for later
    /// identification (kinds double as handles since a call has at most one
    /// live timer of each kind at a time — the call machine re-registers on
    /// state change rather than tracking opaque timer ids).
    pub fn register(&mut self, delay: Duration, kind: TimerKind) {
        let deadline = self.now() + delay;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.push(TimerEntry { deadline, seq, kind });
    }

    /// Cancels every pending timer belonging to `call_id` (spec §5,
    /// "Hangup cancels... any pending timers").
    pub fn cancel_for_call(&mut self, call_id: &CallSid) {
        self.timers.retain(|t| t.kind.call_id() != call_id);
    }

    pub fn cancel_kind_for_call(&mut self, call_id: &CallSid, predicate: impl Fn(&TimerKind) -> bool) {
        self.timers
            .retain(|t| !(t.kind.call_id() == call_id && predicate(&t.kind)));
    }

    /// Virtual-mode advance: deterministically fires every timer whose
    /// deadline is `<= now + delta`, in deadline order (ties by insertion
    /// order), then sets `now` to `now + delta`.
    ///
    /// No-op in real-time mode; real-time timers are expected to be reaped
    /// by a background poll against `now()` instead.
    pub fn advance(&mut self, delta: Duration) -> Vec<TimerKind> {
        if self.real_time {
            return Vec::new();
        }
        let target = self.now + delta;
        let mut due: Vec<TimerEntry> = Vec::new();
        self.timers.retain(|t| {
            if t.deadline <= target {
                due.push(t.clone());
                false
            } else {
                true
            }
        });
        due.sort_by_key(|t| (t.deadline, t.seq));
        self.now = target;
        due.into_iter().map(|t| t.kind).collect()
    }

    pub fn has_pending_timers(&self) -> bool {
        !self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(s: &str) -> CallSid {
        CallSid(s.to_string())
    }

    #[test]
    fn advance_fires_due_timers_in_deadline_order_with_insertion_tiebreak() {
        let mut clock = Clock::new_virtual();
        clock.register(Duration::from_secs(5), TimerKind::PauseDone { call_id: cid("CA1") });
        clock.register(Duration::from_secs(2), TimerKind::GatherTimeout { call_id: cid("CA2") });
        clock.register(Duration::from_secs(2), TimerKind::RingTimeout { call_id: cid("CA3") });

        let fired = clock.advance(Duration::from_secs(10));
        assert_eq!(fired.len(), 3);
        assert_eq!(fired[0], TimerKind::GatherTimeout { call_id: cid("CA2") });
        assert_eq!(fired[1], TimerKind::RingTimeout { call_id: cid("CA3") });
        assert_eq!(fired[2], TimerKind::PauseDone { call_id: cid("CA1") });
        assert_eq!(clock.now(), Duration::from_secs(10));
    }

    #[test]
    fn advance_leaves_timers_past_target_pending() {
        let mut clock = Clock::new_virtual();
        clock.register(Duration::from_secs(30), TimerKind::DialTimeout { call_id: cid("CA1") });
        let fired = clock.advance(Duration::from_secs(10));
        assert!(fired.is_empty());
        assert!(clock.has_pending_timers());
    }

    #[test]
    fn cancel_for_call_removes_all_its_timers() {
        let mut clock = Clock::new_virtual();
        clock.register(Duration::from_secs(5), TimerKind::PauseDone { call_id: cid("CA1") });
        clock.register(Duration::from_secs(5), TimerKind::RingTimeout { call_id: cid("CA1") });
        clock.register(Duration::from_secs(5), TimerKind::RingTimeout { call_id: cid("CA2") });
        clock.cancel_for_call(&cid("CA1"));
        let fired = clock.advance(Duration::from_secs(10));
        assert_eq!(fired, vec![TimerKind::RingTimeout { call_id: cid("CA2") }]);
    }
}
