use std::collections::HashMap;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};
use crate::ids::{CallSid, ConferenceSid, RecordingSid};
use crate::markup::HttpMethod;
use crate::timeline::Timeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConferenceStatus {
    Created,
    InProgress,
    Completed,
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub call_id: CallSid,
    pub muted: bool,
    pub hold: bool,
    pub end_on_exit: bool,
}

/// Join-time configuration (spec §4.5 `Join(account,name,callID,flags)`).
/// Only the first participant to join a freshly created conference sets the
/// conference-wide status-callback/record configuration, the same way the
/// first participant's `record` attribute decides conference recording
/// (§4.5's recording lifecycle note) — later joiners' flags only affect
/// their own `muted`/`endOnExit` membership.
#[derive(Debug, Clone, Default)]
pub struct JoinFlags {
    pub muted: bool,
    pub start_on_enter: bool,
    pub end_on_exit: bool,
    pub beep: bool,
    pub status_callback: Option<String>,
    pub status_callback_method: HttpMethod,
    pub status_callback_events: Vec<String>,
    pub record: bool,
    pub recording_status_callback: Option<String>,
}

/// Conference-level facts produced by a mutation, for the engine to turn
/// into actual webhook deliveries once it has filtered by event mask and
/// assigned a sequence number (spec §4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConferenceFact {
    Started,
    Joined { call_id: CallSid },
    Left { call_id: CallSid },
    Muted { call_id: CallSid, muted: bool },
    Held { call_id: CallSid, hold: bool },
    Ended { recording_sid: Option<RecordingSid> },
}

#[derive(Debug, Clone)]
pub struct Conference {
    pub sid: ConferenceSid,
    pub name: String,
    pub status: ConferenceStatus,
    participants: Vec<Participant>,
    pub created_at: Duration,
    pub ended_at: Option<Duration>,
    pub timeline: Timeline,
    pub status_callback: Option<String>,
    pub status_callback_method: HttpMethod,
    pub status_callback_events: Vec<String>,
    pub recording_sid: Option<RecordingSid>,
    pub recording_status_callback: Option<String>,
    sequence: u64,
}

impl Conference {
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn wants_event(&self, tag: &str) -> bool {
        self.status_callback_events.iter().any(|e| e == tag)
    }

    /// Next monotonically increasing `SequenceNumber` for a delivery on this
    /// conference (spec §5 "Ordering guarantees").
    pub fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

/// Per-account registry of named conferences (spec §4.5). A completed
/// conference's name is released for reuse (spec §3 "Conference"
/// transitions) — tracked here by keeping `by_name` pointing only at *live*
/// conferences while `by_sid` retains history for `FetchConference`.
#[derive(Debug, Clone, Default)]
pub struct ConferenceRegistry {
    by_name: HashMap<String, ConferenceSid>,
    by_sid: HashMap<ConferenceSid, Conference>,
}

impl ConferenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sid: &ConferenceSid) -> Option<&Conference> {
        self.by_sid.get(sid)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Conference> {
        self.by_name.get(name).and_then(|sid| self.by_sid.get(sid))
    }

    pub fn all(&self) -> impl Iterator<Item = &Conference> {
        self.by_sid.values()
    }

    pub fn find_conference_of(&self, call_id: &CallSid) -> Option<&ConferenceSid> {
        self.by_sid
            .values()
            .find(|c| c.participants.iter().any(|p| &p.call_id == call_id))
            .map(|c| &c.sid)
    }

    /// Joins `call_id` to `name`, creating the conference if this is the
    /// first participant. Returns the conference sid and the facts produced
    /// (at minimum a `Joined`; also `Started` if this join brought the
    /// conference from `created` to `in-progress`).
    pub fn join(
        &mut self,
        name: &str,
        call_id: CallSid,
        flags: JoinFlags,
        now: Duration,
    ) -> (ConferenceSid, Vec<ConferenceFact>) {
        let mut facts = Vec::new();

        let sid = match self.by_name.get(name) {
            Some(sid) => sid.clone(),
            None => {
                let sid = ConferenceSid::generate();
                let recording_sid = if flags.record {
                    Some(RecordingSid::generate())
                } else {
                    None
                };
                let conf = Conference {
                    sid: sid.clone(),
                    name: name.to_string(),
                    status: ConferenceStatus::Created,
                    participants: Vec::new(),
                    created_at: now,
                    ended_at: None,
                    timeline: Timeline::new(),
                    status_callback: flags.status_callback.clone(),
                    status_callback_method: flags.status_callback_method,
                    status_callback_events: flags.status_callback_events.clone(),
                    recording_sid,
                    recording_status_callback: flags.recording_status_callback.clone(),
                    sequence: 0,
                };
                self.by_sid.insert(sid.clone(), conf);
                self.by_name.insert(name.to_string(), sid.clone());
                sid
            }
        };

        let conf = self.by_sid.get_mut(&sid).expect("just inserted or looked up");
        conf.participants.push(Participant {
            call_id: call_id.clone(),
            muted: flags.muted,
            hold: false,
            end_on_exit: flags.end_on_exit,
        });
        conf.timeline
            .push(now, "conference.joined", crate::detail! {"call_sid" => call_id.clone()});

        if conf.status == ConferenceStatus::Created && flags.start_on_enter {
            conf.status = ConferenceStatus::InProgress;
            conf.timeline.push(now, "conference.started", crate::detail! {});
            facts.push(ConferenceFact::Started);
        }
        facts.push(ConferenceFact::Joined { call_id });

        (sid, facts)
    }

    /// Removes `call_id` from whatever conference it's in. If it was joined
    /// with `endOnExit`, every remaining participant is ejected first (spec
    /// §3 Conference transitions). Returns the conference sid, the facts
    /// produced, and any *other* participants force-ejected as a side
    /// effect — the caller (engine) is responsible for resuming their call
    /// machines.
    pub fn leave(
        &mut self,
        call_id: &CallSid,
        reason: &str,
        now: Duration,
    ) -> EngineResult<(ConferenceSid, Vec<ConferenceFact>, Vec<CallSid>)> {
        let sid = self
            .find_conference_of(call_id)
            .ok_or_else(|| EngineError::not_found(format!("conference membership of {call_id}")))?
            .clone();

        let conf = self.by_sid.get_mut(&sid).expect("sid came from find_conference_of");
        let idx = conf
            .participants
            .iter()
            .position(|p| &p.call_id == call_id)
            .expect("call_id is a participant");
        let participant = conf.participants.remove(idx);
        conf.timeline.push(
            now,
            "conference.left",
            crate::detail! {"call_sid" => call_id.clone(), "reason" => reason},
        );

        let mut facts = vec![ConferenceFact::Left {
            call_id: call_id.clone(),
        }];
        let mut ejected = Vec::new();

        if participant.end_on_exit && !conf.participants.is_empty() {
            ejected = conf.participants.iter().map(|p| p.call_id.clone()).collect();
            for ej in &ejected {
                conf.timeline.push(
                    now,
                    "conference.left",
                    crate::detail! {"call_sid" => ej.clone(), "reason" => "end_conference_on_exit"},
                );
                facts.push(ConferenceFact::Left { call_id: ej.clone() });
            }
            conf.participants.clear();
        }

        if conf.participants.is_empty() {
            conf.status = ConferenceStatus::Completed;
            conf.ended_at = Some(now);
            conf.timeline.push(now, "conference.ended", crate::detail! {});
            facts.push(ConferenceFact::Ended {
                recording_sid: conf.recording_sid.clone(),
            });
            let name = conf.name.clone();
            self.by_name.remove(&name);
        }

        Ok((sid, facts, ejected))
    }

    /// Mutates mute/hold for a participant (spec §4.5 `UpdateParticipant`).
    pub fn update_participant(
        &mut self,
        call_id: &CallSid,
        muted: Option<bool>,
        hold: Option<bool>,
        now: Duration,
    ) -> EngineResult<(ConferenceSid, Vec<ConferenceFact>)> {
        let sid = self
            .find_conference_of(call_id)
            .ok_or_else(|| EngineError::not_found(format!("conference membership of {call_id}")))?
            .clone();
        let conf = self.by_sid.get_mut(&sid).expect("sid came from find_conference_of");
        let participant = conf
            .participants
            .iter_mut()
            .find(|p| &p.call_id == call_id)
            .expect("call_id is a participant");

        let mut facts = Vec::new();
        if let Some(m) = muted {
            participant.muted = m;
            facts.push(ConferenceFact::Muted {
                call_id: call_id.clone(),
                muted: m,
            });
            conf.timeline.push(
                now,
                "participant.mute",
                crate::detail! {"call_sid" => call_id.clone(), "muted" => m},
            );
        }
        if let Some(h) = hold {
            let conf = self.by_sid.get_mut(&sid).expect("sid came from find_conference_of");
            let participant = conf
                .participants
                .iter_mut()
                .find(|p| &p.call_id == call_id)
                .expect("call_id is a participant");
            participant.hold = h;
            facts.push(ConferenceFact::Held {
                call_id: call_id.clone(),
                hold: h,
            });
            conf.timeline.push(
                now,
                "participant.hold",
                crate::detail! {"call_sid" => call_id.clone(), "hold" => h},
            );
        }

        Ok((sid, facts))
    }

    /// Force-ends a conference (spec §4.7 `UpdateConference`, force-end),
    /// ejecting every remaining participant.
    pub fn force_end(
        &mut self,
        sid: &ConferenceSid,
        now: Duration,
    ) -> EngineResult<(Vec<ConferenceFact>, Vec<CallSid>)> {
        let conf = self
            .by_sid
            .get_mut(sid)
            .ok_or_else(|| EngineError::not_found(format!("conference {sid}")))?;
        if conf.status == ConferenceStatus::Completed {
            return Ok((Vec::new(), Vec::new()));
        }

        let ejected: Vec<CallSid> = conf.participants.iter().map(|p| p.call_id.clone()).collect();
        let mut facts = Vec::new();
        for call_id in &ejected {
            conf.timeline.push(
                now,
                "conference.left",
                crate::detail! {"call_sid" => call_id.clone(), "reason" => "forced_end"},
            );
            facts.push(ConferenceFact::Left {
                call_id: call_id.clone(),
            });
        }
        conf.participants.clear();
        conf.status = ConferenceStatus::Completed;
        conf.ended_at = Some(now);
        conf.timeline.push(now, "conference.ended", crate::detail! {});
        facts.push(ConferenceFact::Ended {
            recording_sid: conf.recording_sid.clone(),
        });
        let name = conf.name.clone();
        self.by_name.remove(&name);

        Ok((facts, ejected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(s: &str) -> CallSid {
        CallSid(s.to_string())
    }

    fn flags() -> JoinFlags {
        JoinFlags {
            start_on_enter: true,
            beep: true,
            ..Default::default()
        }
    }

    #[test]
    fn first_join_starts_conference_second_does_not() {
        let mut reg = ConferenceRegistry::new();
        let (sid1, facts1) = reg.join("room-1", cid("CA1"), flags(), Duration::ZERO);
        assert_eq!(facts1, vec![ConferenceFact::Started, ConferenceFact::Joined { call_id: cid("CA1") }]);

        let (sid2, facts2) = reg.join("room-1", cid("CA2"), flags(), Duration::from_secs(1));
        assert_eq!(sid1, sid2);
        assert_eq!(facts2, vec![ConferenceFact::Joined { call_id: cid("CA2") }]);
        assert_eq!(reg.get(&sid1).unwrap().status, ConferenceStatus::InProgress);
    }

    #[test]
    fn last_leave_completes_conference_and_releases_name() {
        let mut reg = ConferenceRegistry::new();
        let (sid, _) = reg.join("room-1", cid("CA1"), flags(), Duration::ZERO);
        reg.join("room-1", cid("CA2"), flags(), Duration::from_secs(1));

        let (_, facts, ejected) = reg.leave(&cid("CA2"), "hangup", Duration::from_secs(2)).unwrap();
        assert_eq!(facts, vec![ConferenceFact::Left { call_id: cid("CA2") }]);
        assert!(ejected.is_empty());
        assert_eq!(reg.get(&sid).unwrap().status, ConferenceStatus::InProgress);

        let (_, facts, ejected) = reg.leave(&cid("CA1"), "hangup", Duration::from_secs(3)).unwrap();
        assert!(ejected.is_empty());
        assert_eq!(
            facts,
            vec![
                ConferenceFact::Left { call_id: cid("CA1") },
                ConferenceFact::Ended { recording_sid: None }
            ]
        );
        assert_eq!(reg.get(&sid).unwrap().status, ConferenceStatus::Completed);
        assert!(reg.get_by_name("room-1").is_none());

        // Name is released: a fresh join creates a brand new conference.
        let (new_sid, _) = reg.join("room-1", cid("CA3"), flags(), Duration::from_secs(4));
        assert_ne!(new_sid, sid);
    }

    #[test]
    fn end_on_exit_ejects_remaining_participants() {
        let mut reg = ConferenceRegistry::new();
        reg.join("room-1", cid("CA1"), flags(), Duration::ZERO);
        let mut f2 = flags();
        f2.end_on_exit = true;
        reg.join("room-1", cid("CA2"), f2, Duration::from_secs(1));
        reg.join("room-1", cid("CA3"), flags(), Duration::from_secs(2));

        let (_, facts, ejected) = reg.leave(&cid("CA2"), "hangup", Duration::from_secs(3)).unwrap();
        assert_eq!(ejected, vec![cid("CA1"), cid("CA3")]);
        assert!(facts.contains(&ConferenceFact::Ended { recording_sid: None }));
    }

    #[test]
    fn sequence_numbers_are_monotonic_per_conference() {
        let mut reg = ConferenceRegistry::new();
        let (sid, _) = reg.join("room-1", cid("CA1"), flags(), Duration::ZERO);
        let conf = reg.by_sid.get_mut(&sid).unwrap();
        assert_eq!(conf.next_sequence(), 1);
        assert_eq!(conf.next_sequence(), 2);
        assert_eq!(conf.next_sequence(), 3);
    }
}
