//! Read-only, serializable projections of engine state (spec §4.7 `Snapshot`,
//! §6 REST response shapes). Kept separate from the execution-state-heavy
//! `Call`/`Conference`/`Queue` types so internal fields (cursor, gather
//! buffer, dial leg bookkeeping) never leak into a JSON response.

use serde::Serialize;

use crate::account::{Application, PhoneNumber, Recording};
use crate::call::{Call, CallStatus, Direction};
use crate::conference::{Conference, ConferenceStatus};
use crate::queue::Queue;

#[derive(Debug, Clone, Serialize)]
pub struct CallView {
    pub sid: String,
    pub account_sid: String,
    pub from: String,
    pub to: String,
    pub direction: Direction,
    pub status: CallStatus,
    pub start_time: u64,
    pub answered_time: Option<u64>,
    pub end_time: Option<u64>,
    pub parent_call_sid: Option<String>,
    pub current_endpoint: String,
    pub duration: Option<u64>,
}

impl From<&Call> for CallView {
    fn from(call: &Call) -> Self {
        CallView {
            sid: call.sid.to_string(),
            account_sid: call.account_sid.to_string(),
            from: call.from.clone(),
            to: call.to.clone(),
            direction: call.direction,
            status: call.status,
            start_time: call.start_at.as_secs(),
            answered_time: call.answered_at.map(|d| d.as_secs()),
            end_time: call.ended_at.map(|d| d.as_secs()),
            parent_call_sid: call.parent_call_sid.as_ref().map(|s| s.to_string()),
            current_endpoint: call.endpoint.as_wire(),
            duration: call.duration_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueView {
    pub sid: String,
    pub friendly_name: String,
    pub current_size: usize,
    pub members: Vec<String>,
}

impl From<&Queue> for QueueView {
    fn from(q: &Queue) -> Self {
        QueueView {
            sid: q.sid.to_string(),
            friendly_name: q.name.clone(),
            current_size: q.len(),
            members: q.members().iter().map(|m| m.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConferenceView {
    pub sid: String,
    pub friendly_name: String,
    pub status: ConferenceStatusView,
    pub participants: Vec<String>,
    pub date_created: u64,
    pub date_updated: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConferenceStatusView {
    Created,
    InProgress,
    Completed,
}

impl From<ConferenceStatus> for ConferenceStatusView {
    fn from(s: ConferenceStatus) -> Self {
        match s {
            ConferenceStatus::Created => ConferenceStatusView::Created,
            ConferenceStatus::InProgress => ConferenceStatusView::InProgress,
            ConferenceStatus::Completed => ConferenceStatusView::Completed,
        }
    }
}

impl From<&Conference> for ConferenceView {
    fn from(c: &Conference) -> Self {
        ConferenceView {
            sid: c.sid.to_string(),
            friendly_name: c.name.clone(),
            status: c.status.into(),
            participants: c.participants().iter().map(|p| p.call_id.to_string()).collect(),
            date_created: c.created_at.as_secs(),
            date_updated: c.ended_at.map(|d| d.as_secs()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordingView {
    pub sid: String,
    pub call_sid: String,
    pub duration: Option<u32>,
    pub uri: String,
}

impl From<&Recording> for RecordingView {
    fn from(r: &Recording) -> Self {
        RecordingView {
            sid: r.sid.to_string(),
            call_sid: r.call_sid.to_string(),
            duration: r.duration_secs,
            uri: format!("/2010-04-01/Recordings/{}.json", r.sid),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub sid: String,
    pub friendly_name: String,
    pub voice_url: String,
}

impl From<&Application> for ApplicationView {
    fn from(a: &Application) -> Self {
        ApplicationView {
            sid: a.sid.to_string(),
            friendly_name: a.friendly_name.clone(),
            voice_url: a.voice_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PhoneNumberView {
    pub sid: String,
    pub phone_number: String,
    pub application_sid: Option<String>,
}

impl From<&PhoneNumber> for PhoneNumberView {
    fn from(n: &PhoneNumber) -> Self {
        PhoneNumberView {
            sid: n.sid.to_string(),
            phone_number: n.phone_number.clone(),
            application_sid: n.application_sid.as_ref().map(|s| s.to_string()),
        }
    }
}

/// Full mutable state of one account, for test assertions (spec §4.7
/// `Snapshot`).
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub account_sid: String,
    pub calls: Vec<CallView>,
    pub queues: Vec<QueueView>,
    pub conferences: Vec<ConferenceView>,
    pub recordings: Vec<RecordingView>,
}
