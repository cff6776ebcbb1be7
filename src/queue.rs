use std::collections::HashMap;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};
use crate::ids::{CallSid, QueueSid};
use crate::timeline::Timeline;

/// A named FIFO waitlist (spec §3 "Queue", §4.4).
///
/// Queues are created implicitly on first `enqueue` and never explicitly
/// deleted — an empty queue is simply a queue with no members, matching the
/// provider (queue resources persist as long as the account does).
#[derive(Debug, Clone)]
pub struct Queue {
    pub sid: QueueSid,
    pub name: String,
    members: Vec<CallSid>,
    pub timeline: Timeline,
    pub created_at: Duration,
}

impl Queue {
    fn new(name: &str, created_at: Duration) -> Self {
        Queue {
            sid: QueueSid::generate(),
            name: name.to_string(),
            members: Vec::new(),
            timeline: Timeline::new(),
            created_at,
        }
    }

    pub fn members(&self) -> &[CallSid] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn position_of(&self, call_id: &CallSid) -> Option<usize> {
        self.members.iter().position(|c| c == call_id)
    }
}

/// Per-account registry of named queues (spec §4.4). Not thread-safe by
/// itself — callers hold the owning account's mutex for the duration of any
/// mutation, matching the "single mutating worker per account" model (§5).
#[derive(Debug, Clone, Default)]
pub struct QueueRegistry {
    queues: HashMap<String, Queue>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Queue> {
        self.queues.get(name)
    }

    pub fn all(&self) -> impl Iterator<Item = &Queue> {
        self.queues.values()
    }

    /// Appends `call_id` to the tail of `name`, creating the queue on first
    /// use. Returns the queue's sid.
    pub fn enqueue(&mut self, name: &str, call_id: CallSid, now: Duration) -> QueueSid {
        let queue = self
            .queues
            .entry(name.to_string())
            .or_insert_with(|| Queue::new(name, now));
        queue.members.push(call_id.clone());
        queue.timeline.push(
            now,
            "queue.entered",
            crate::detail! {"call_sid" => call_id},
        );
        queue.sid.clone()
    }

    /// Removes and returns the head of `name`'s queue (the longest-waiting
    /// call), or `None` if empty or the queue doesn't exist.
    pub fn dequeue(&mut self, name: &str, now: Duration) -> Option<CallSid> {
        let queue = self.queues.get_mut(name)?;
        if queue.members.is_empty() {
            return None;
        }
        let call_id = queue.members.remove(0);
        queue.timeline.push(
            now,
            "queue.left",
            crate::detail! {"call_sid" => call_id.clone(), "reason" => "dequeued"},
        );
        Some(call_id)
    }

    /// Removes `call_id` from wherever it sits in `name`'s queue (spec §4.4
    /// — used when a queued call hangs up).
    pub fn remove(&mut self, name: &str, call_id: &CallSid, now: Duration) -> EngineResult<()> {
        let queue = self
            .queues
            .get_mut(name)
            .ok_or_else(|| EngineError::not_found(format!("queue {name}")))?;
        let pos = queue
            .position_of(call_id)
            .ok_or_else(|| EngineError::not_found(format!("call {call_id} in queue {name}")))?;
        queue.members.remove(pos);
        queue.timeline.push(
            now,
            "queue.left",
            crate::detail! {"call_sid" => call_id.clone(), "reason" => "removed"},
        );
        Ok(())
    }

    pub fn find_queue_of(&self, call_id: &CallSid) -> Option<&str> {
        self.queues
            .iter()
            .find(|(_, q)| q.position_of(call_id).is_some())
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(s: &str) -> CallSid {
        CallSid(s.to_string())
    }

    #[test]
    fn fifo_order_is_preserved() {
        let mut reg = QueueRegistry::new();
        reg.enqueue("support", cid("CA1"), Duration::ZERO);
        reg.enqueue("support", cid("CA2"), Duration::from_secs(1));
        reg.enqueue("support", cid("CA3"), Duration::from_secs(2));

        assert_eq!(reg.dequeue("support", Duration::from_secs(3)), Some(cid("CA1")));
        assert_eq!(reg.dequeue("support", Duration::from_secs(3)), Some(cid("CA2")));
        assert_eq!(reg.dequeue("support", Duration::from_secs(3)), Some(cid("CA3")));
        assert_eq!(reg.dequeue("support", Duration::from_secs(3)), None);
    }

    #[test]
    fn remove_takes_call_out_of_the_middle() {
        let mut reg = QueueRegistry::new();
        reg.enqueue("support", cid("CA1"), Duration::ZERO);
        reg.enqueue("support", cid("CA2"), Duration::from_secs(1));
        reg.remove("support", &cid("CA1"), Duration::from_secs(2)).unwrap();
        assert_eq!(reg.dequeue("support", Duration::from_secs(3)), Some(cid("CA2")));
    }

    #[test]
    fn dequeue_on_unknown_queue_is_none_not_error() {
        let mut reg = QueueRegistry::new();
        assert_eq!(reg.dequeue("ghost", Duration::ZERO), None);
    }
}
