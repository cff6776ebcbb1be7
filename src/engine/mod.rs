//! The engine: per-account state plus the façade of operations the REST
//! layer and test-facing surface call into (spec §4.1, §4.7, §5).
//!
//! Concurrency model (spec §5): each account's mutable state sits behind its
//! own `tokio::sync::Mutex`, held across the `.await` points of webhook
//! dispatch for the duration of one call-machine step. Two different
//! accounts never contend with each other; two requests racing the same
//! account serialize on that account's mutex, matching "a single mutating
//! worker per account" without an actual background task.

mod call_machine;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use crate::account::Account;
use crate::call::{Call, CallStatus, Direction};
use crate::clock::Clock;
use crate::conference::ConferenceRegistry;
use crate::error::{EngineError, EngineResult};
use crate::ids::{AccountSid, ApplicationSid, CallSid, ConferenceSid, PhoneNumberSid, RecordingSid};
use crate::markup::HttpMethod;
use crate::queue::QueueRegistry;
use crate::view::{
    ApplicationView, CallView, ConferenceView, PhoneNumberView, QueueView, RecordingView, Snapshot,
};
use crate::webhook::{HttpWebhookTransport, WebhookTransport};

/// Everything that belongs to one account: its provisioning data plus the
/// live calls/queues/conferences running against it, and its own clock
/// (spec §4.1 "per-account clock").
pub struct AccountState {
    pub account: Account,
    pub calls: HashMap<CallSid, Call>,
    pub queues: QueueRegistry,
    pub conferences: ConferenceRegistry,
    pub clock: Clock,
}

impl AccountState {
    fn new(account: Account) -> Self {
        AccountState {
            account,
            calls: HashMap::new(),
            queues: QueueRegistry::new(),
            conferences: ConferenceRegistry::new(),
            clock: Clock::new_virtual(),
        }
    }
}

/// Top-level simulator state (spec §4.1 "Engine"). Cheaply cloneable —
/// `Arc`-backed internals — so it can sit directly in an axum `AppState`.
#[derive(Clone)]
pub struct Engine {
    transport: Arc<dyn WebhookTransport>,
    accounts: Arc<RwLock<HashMap<AccountSid, Arc<Mutex<AccountState>>>>>,
}

impl Engine {
    pub fn new(transport: Arc<dyn WebhookTransport>) -> Self {
        Engine {
            transport,
            accounts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn handle(&self, account_sid: &AccountSid) -> EngineResult<Arc<Mutex<AccountState>>> {
        self.accounts
            .read()
            .await
            .get(account_sid)
            .cloned()
            .ok_or_else(|| EngineError::not_found(format!("account {account_sid}")))
    }

    // ---- Account / provisioning -------------------------------------

    pub async fn create_account(&self, friendly_name: impl Into<String>) -> AccountSid {
        let account = Account::new(friendly_name);
        let sid = account.sid.clone();
        self.accounts
            .write()
            .await
            .insert(sid.clone(), Arc::new(Mutex::new(AccountState::new(account))));
        tracing::info!(account_sid = %sid, "account created");
        sid
    }

    pub async fn list_accounts(&self) -> Vec<AccountSid> {
        self.accounts.read().await.keys().cloned().collect()
    }

    pub async fn fetch_account(&self, account_sid: &AccountSid) -> EngineResult<(AccountSid, String)> {
        let handle = self.handle(account_sid).await?;
        let state = handle.lock().await;
        Ok((state.account.sid.clone(), state.account.friendly_name.clone()))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_application(
        &self,
        account_sid: &AccountSid,
        friendly_name: impl Into<String>,
        voice_url: String,
        voice_method: HttpMethod,
        status_callback: Option<String>,
        status_callback_method: HttpMethod,
    ) -> EngineResult<ApplicationSid> {
        let handle = self.handle(account_sid).await?;
        let mut state = handle.lock().await;
        Ok(state
            .account
            .create_application(friendly_name, voice_url, voice_method, status_callback, status_callback_method))
    }

    pub async fn list_applications(&self, account_sid: &AccountSid) -> EngineResult<Vec<ApplicationView>> {
        let handle = self.handle(account_sid).await?;
        let state = handle.lock().await;
        Ok(state.account.applications().map(ApplicationView::from).collect())
    }

    pub async fn create_incoming_phone_number(
        &self,
        account_sid: &AccountSid,
        phone_number: impl Into<String>,
        application_sid: Option<ApplicationSid>,
    ) -> EngineResult<PhoneNumberSid> {
        let handle = self.handle(account_sid).await?;
        let mut state = handle.lock().await;
        Ok(state.account.create_incoming_phone_number(phone_number, application_sid))
    }

    pub async fn list_incoming_phone_numbers(&self, account_sid: &AccountSid) -> EngineResult<Vec<PhoneNumberView>> {
        let handle = self.handle(account_sid).await?;
        let state = handle.lock().await;
        Ok(state.account.numbers().map(PhoneNumberView::from).collect())
    }

    pub async fn update_incoming_phone_number(
        &self,
        account_sid: &AccountSid,
        number_sid: &PhoneNumberSid,
        application_sid: Option<ApplicationSid>,
    ) -> EngineResult<()> {
        let handle = self.handle(account_sid).await?;
        let mut state = handle.lock().await;
        state.account.update_incoming_phone_number(number_sid, application_sid)
    }

    pub async fn delete_incoming_phone_number(
        &self,
        account_sid: &AccountSid,
        number_sid: &PhoneNumberSid,
    ) -> EngineResult<()> {
        let handle = self.handle(account_sid).await?;
        let mut state = handle.lock().await;
        state.account.delete_incoming_phone_number(number_sid)
    }

    pub async fn put_sip_resource(
        &self,
        account_sid: &AccountSid,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> EngineResult<()> {
        let handle = self.handle(account_sid).await?;
        let mut state = handle.lock().await;
        state.account.put_sip_resource(key, value);
        Ok(())
    }

    pub async fn get_sip_resource(&self, account_sid: &AccountSid, key: &str) -> EngineResult<serde_json::Value> {
        let handle = self.handle(account_sid).await?;
        let state = handle.lock().await;
        state
            .account
            .get_sip_resource(key)
            .cloned()
            .ok_or_else(|| EngineError::not_found(format!("sip resource {key}")))
    }

    pub async fn delete_sip_resource(&self, account_sid: &AccountSid, key: &str) -> EngineResult<()> {
        let handle = self.handle(account_sid).await?;
        let mut state = handle.lock().await;
        state.account.delete_sip_resource(key)
    }

    pub async fn list_sip_resources(&self, account_sid: &AccountSid) -> EngineResult<Vec<(String, serde_json::Value)>> {
        let handle = self.handle(account_sid).await?;
        let state = handle.lock().await;
        Ok(state.account.sip_resources().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    // ---- Call lifecycle -----------------------------------------------

    /// `CreateCall` (spec §4.6 "Initial state selection", outbound branch).
    #[allow(clippy::too_many_arguments)]
    pub async fn create_call(
        &self,
        account_sid: &AccountSid,
        from: String,
        to: String,
        url: String,
        method: HttpMethod,
        status_callback: Option<String>,
        status_callback_method: HttpMethod,
    ) -> EngineResult<CallSid> {
        let handle = self.handle(account_sid).await?;
        let mut state = handle.lock().await;
        let now = state.clock.now();
        let sid = CallSid::generate();
        let mut call = Call::new_outbound(
            sid.clone(),
            account_sid.clone(),
            from,
            to,
            url,
            method,
            status_callback,
            status_callback_method,
            None,
            now,
        );
        // Queued is a bookkeeping-only state; the engine ticks it straight
        // to Ringing since nothing observes the gap (spec §4.6).
        call.status = CallStatus::Ringing;
        call.push_event(now, "call.created", crate::detail! {"direction" => "outbound"});
        state.calls.insert(sid.clone(), call);
        state
            .clock
            .register(Duration::from_secs(30), crate::clock::TimerKind::RingTimeout { call_id: sid.clone() });
        tracing::info!(call_sid = %sid, "outbound call created");
        Ok(sid)
    }

    async fn create_incoming_call_inner(&self, account_sid: &AccountSid, from: String, to: String) -> EngineResult<CallSid> {
        let handle = self.handle(account_sid).await?;
        let mut state = handle.lock().await;
        let now = state.clock.now();
        let app = state.account.resolve_inbound(&to)?;
        let (voice_url, voice_method, status_callback, status_callback_method) = (
            app.voice_url.clone(),
            app.voice_method,
            app.status_callback.clone(),
            app.status_callback_method,
        );

        let sid = CallSid::generate();
        let mut call = Call::new_inbound(
            sid.clone(),
            account_sid.clone(),
            from,
            to,
            voice_url,
            voice_method,
            status_callback,
            status_callback_method,
            now,
        );
        call.push_event(now, "call.created", crate::detail! {"direction" => "inbound"});
        call.mark_answered(now);
        call.push_event(now, "call.answered", crate::detail! {});
        state.calls.insert(sid.clone(), call);
        self.drive(&mut state, sid.clone()).await;
        tracing::info!(call_sid = %sid, "inbound call created");
        Ok(sid)
    }

    /// Simulated inbound call arriving at a provisioned phone number.
    pub async fn create_incoming_call(&self, account_sid: &AccountSid, from: String, to: String) -> EngineResult<CallSid> {
        self.create_incoming_call_inner(account_sid, from, to).await
    }

    /// Simulated inbound call from a softphone client identity (spec §4.7
    /// "CreateIncomingCallFromSoftphone") — same routing as a PSTN inbound
    /// call, only the caller-id convention differs at the REST surface.
    pub async fn create_incoming_call_from_softphone(
        &self,
        account_sid: &AccountSid,
        client_identity: String,
        to: String,
    ) -> EngineResult<CallSid> {
        self.create_incoming_call_inner(account_sid, format!("client:{client_identity}"), to).await
    }

    /// Simulated inbound call from a SIP URI.
    pub async fn create_incoming_call_from_sip(
        &self,
        account_sid: &AccountSid,
        sip_uri: String,
        to: String,
    ) -> EngineResult<CallSid> {
        self.create_incoming_call_inner(account_sid, format!("sip:{sip_uri}"), to).await
    }

    pub async fn fetch_call(&self, account_sid: &AccountSid, call_sid: &CallSid) -> EngineResult<CallView> {
        let handle = self.handle(account_sid).await?;
        let state = handle.lock().await;
        state
            .calls
            .get(call_sid)
            .map(CallView::from)
            .ok_or_else(|| EngineError::not_found(format!("call {call_sid}")))
    }

    pub async fn list_calls(&self, account_sid: &AccountSid) -> EngineResult<Vec<CallView>> {
        let handle = self.handle(account_sid).await?;
        let state = handle.lock().await;
        Ok(state.calls.values().map(CallView::from).collect())
    }

    /// `UpdateCall` (spec §4.7): re-point the call's pending markup URL, or
    /// (when `status` is `Completed`) hang it up — the only status transition
    /// this operation is defined to perform.
    pub async fn update_call(
        &self,
        account_sid: &AccountSid,
        call_sid: &CallSid,
        url: Option<String>,
        method: Option<HttpMethod>,
        status: Option<CallStatus>,
    ) -> EngineResult<()> {
        if status == Some(CallStatus::Completed) {
            return self.hangup(account_sid, call_sid).await;
        }
        let handle = self.handle(account_sid).await?;
        let mut state = handle.lock().await;
        let call = state
            .calls
            .get_mut(call_sid)
            .ok_or_else(|| EngineError::not_found(format!("call {call_sid}")))?;
        if let Some(u) = url {
            call.answer_url = u;
        }
        if let Some(m) = method {
            call.answer_method = m;
        }
        Ok(())
    }

    pub async fn answer_call(&self, account_sid: &AccountSid, call_sid: &CallSid) -> EngineResult<()> {
        let handle = self.handle(account_sid).await?;
        let mut state = handle.lock().await;
        let now = state.clock.now();
        if !state.calls.contains_key(call_sid) {
            return Err(EngineError::not_found(format!("call {call_sid}")));
        }
        let parent = call_machine::dial_parent_of(&state, call_sid);
        let answered = state.calls.get_mut(call_sid).unwrap().mark_answered(now);
        if !answered {
            return Ok(());
        }
        state.calls.get_mut(call_sid).unwrap().push_event(now, "call.answered", crate::detail! {});
        if let Some(parent_sid) = parent {
            state
                .clock
                .cancel_kind_for_call(&parent_sid, |k| matches!(k, crate::clock::TimerKind::DialTimeout { .. }));
        } else {
            state.clock.cancel_kind_for_call(call_sid, |k| matches!(k, crate::clock::TimerKind::RingTimeout { .. }));
            self.drive(&mut state, call_sid.clone()).await;
        }
        Ok(())
    }

    pub async fn set_call_busy(&self, account_sid: &AccountSid, call_sid: &CallSid) -> EngineResult<()> {
        self.end_ringing_call(account_sid, call_sid, CallStatus::Busy, None).await
    }

    pub async fn set_call_failed(&self, account_sid: &AccountSid, call_sid: &CallSid, reason: Option<String>) -> EngineResult<()> {
        self.end_ringing_call(account_sid, call_sid, CallStatus::Failed, reason).await
    }

    async fn end_ringing_call(
        &self,
        account_sid: &AccountSid,
        call_sid: &CallSid,
        status: CallStatus,
        reason: Option<String>,
    ) -> EngineResult<()> {
        let handle = self.handle(account_sid).await?;
        let mut state = handle.lock().await;
        if !state.calls.contains_key(call_sid) {
            return Err(EngineError::not_found(format!("call {call_sid}")));
        }
        let now = state.clock.now();
        if let Some(parent) = call_machine::dial_parent_of(&state, call_sid) {
            self.finish_dial_leg(&mut state, &parent, Some(call_sid.clone()), status, now).await;
        } else {
            self.end_call(&mut state, call_sid, status, reason, now).await;
        }
        Ok(())
    }

    pub async fn hangup(&self, account_sid: &AccountSid, call_sid: &CallSid) -> EngineResult<()> {
        let handle = self.handle(account_sid).await?;
        let mut state = handle.lock().await;
        if !state.calls.contains_key(call_sid) {
            return Err(EngineError::not_found(format!("call {call_sid}")));
        }
        let now = state.clock.now();
        if let Some(parent) = call_machine::dial_parent_of(&state, call_sid) {
            let was_answered = state.calls.get(call_sid).map(|c| c.answered_at.is_some()).unwrap_or(false);
            let status = if was_answered { CallStatus::Completed } else { CallStatus::Canceled };
            self.finish_dial_leg(&mut state, &parent, Some(call_sid.clone()), status, now).await;
        } else {
            if let Some(child) = state.calls.get(call_sid).and_then(|c| c.dial.as_ref()).and_then(|d| d.current_child.clone()) {
                if let Some(c) = state.calls.get_mut(&child) {
                    c.mark_ended(CallStatus::Canceled, None, now);
                    c.push_event(now, "call.ended", crate::detail! {"status" => "canceled"});
                }
                state.clock.cancel_for_call(&child);
            }
            self.end_call(&mut state, call_sid, CallStatus::Completed, None, now).await;
        }
        Ok(())
    }

    /// `SendDigits` (spec §4.7): injects DTMF into whichever of `<Gather>`
    /// or `<Record finishOnKey>` is currently suspending the call.
    pub async fn send_digits(&self, account_sid: &AccountSid, call_sid: &CallSid, digits: &str) -> EngineResult<()> {
        let handle = self.handle(account_sid).await?;
        let mut state = handle.lock().await;
        let has_gather = state.calls.get(call_sid).map(|c| c.gather.is_some()).unwrap_or(false);
        let has_record = state.calls.get(call_sid).map(|c| c.record.is_some()).unwrap_or(false);
        if !has_gather && !has_record {
            return Err(EngineError::precondition(format!(
                "call {call_sid} has no active gather or record"
            )));
        }
        let now = state.clock.now();
        for ch in digits.chars() {
            state
                .calls
                .get_mut(call_sid)
                .unwrap()
                .push_event(now, "dtmf.received", crate::detail! {"digit" => ch.to_string()});

            if has_gather {
                let (finished, finished_on_key) = {
                    let call = state.calls.get_mut(call_sid).unwrap();
                    let gather = call.gather.as_mut().expect("has_gather checked above");
                    gather.digits.push(ch);
                    let is_finish_key = !gather.finish_on_key.is_empty() && gather.finish_on_key.starts_with(ch);
                    let hit_num_digits = gather
                        .num_digits
                        .map(|n| gather.digits.chars().count() as u32 >= n)
                        .unwrap_or(false);
                    (is_finish_key || hit_num_digits, is_finish_key.then(|| ch.to_string()))
                };
                if finished {
                    self.finish_gather(&mut state, call_sid, now, finished_on_key).await;
                    self.drive(&mut state, call_sid.clone()).await;
                    break;
                }
            } else {
                let is_finish_key = {
                    let call = state.calls.get(call_sid).unwrap();
                    let record = call.record.as_ref().expect("has_record checked above");
                    !record.finish_on_key.is_empty() && record.finish_on_key.starts_with(ch)
                };
                if is_finish_key {
                    let recording_sid = state.calls.get(call_sid).and_then(|c| c.recording_sid.clone());
                    self.finish_record(&mut state, call_sid, recording_sid, 0, now).await;
                    self.drive(&mut state, call_sid.clone()).await;
                    break;
                }
            }
        }
        Ok(())
    }

    // ---- Recording ------------------------------------------------------

    pub async fn fetch_recording(&self, account_sid: &AccountSid, recording_sid: &RecordingSid) -> EngineResult<RecordingView> {
        let handle = self.handle(account_sid).await?;
        let state = handle.lock().await;
        state
            .account
            .get_recording(recording_sid)
            .map(RecordingView::from)
            .ok_or_else(|| EngineError::not_found(format!("recording {recording_sid}")))
    }

    pub async fn list_recordings(&self, account_sid: &AccountSid) -> EngineResult<Vec<RecordingView>> {
        let handle = self.handle(account_sid).await?;
        let state = handle.lock().await;
        Ok(state.account.recordings().map(RecordingView::from).collect())
    }

    /// `SetCallRecording`/`SetCallVoicemail` (spec §4.7): inject the
    /// "recorded audio" for a call's active `<Record>` verb or conference
    /// recording, and fire the recording-status callback immediately (the
    /// simulator has no real audio pipeline to wait on).
    pub async fn set_call_recording(
        &self,
        account_sid: &AccountSid,
        call_sid: &CallSid,
        file_path: impl Into<String>,
        duration_secs: u32,
    ) -> EngineResult<()> {
        let handle = self.handle(account_sid).await?;
        let mut state = handle.lock().await;
        let now = state.clock.now();
        let recording_sid = state
            .calls
            .get(call_sid)
            .and_then(|c| c.recording_sid.clone())
            .ok_or_else(|| EngineError::precondition(format!("call {call_sid} has no active recording")))?;
        state.account.set_recording_content(&recording_sid, file_path, duration_secs)?;
        self.finish_record(&mut state, call_sid, Some(recording_sid), duration_secs, now).await;
        self.drive(&mut state, call_sid.clone()).await;
        Ok(())
    }

    /// Same injection, but targeted by conference name rather than a call
    /// in an active `<Record>` (spec §4.7 `SetCallVoicemail` covers both
    /// "answering machine" Record verbs and conference recordings; here we
    /// interpret it narrowly as the Record-verb case and leave conference
    /// recording content injection to `set_call_recording` called against
    /// any one of the conference's participants).
    pub async fn set_call_voicemail(
        &self,
        account_sid: &AccountSid,
        call_sid: &CallSid,
        file_path: impl Into<String>,
        duration_secs: u32,
    ) -> EngineResult<()> {
        self.set_call_recording(account_sid, call_sid, file_path, duration_secs).await
    }

    // ---- Conferences / queues --------------------------------------

    pub async fn fetch_conference(&self, account_sid: &AccountSid, conference_sid: &ConferenceSid) -> EngineResult<ConferenceView> {
        let handle = self.handle(account_sid).await?;
        let state = handle.lock().await;
        state
            .conferences
            .get(conference_sid)
            .map(ConferenceView::from)
            .ok_or_else(|| EngineError::not_found(format!("conference {conference_sid}")))
    }

    pub async fn list_conferences(&self, account_sid: &AccountSid) -> EngineResult<Vec<ConferenceView>> {
        let handle = self.handle(account_sid).await?;
        let state = handle.lock().await;
        Ok(state.conferences.all().map(ConferenceView::from).collect())
    }

    /// `UpdateConference` (spec §4.7): the only supported mutation is a
    /// forced end, ejecting every participant.
    pub async fn force_end_conference(&self, account_sid: &AccountSid, conference_sid: &ConferenceSid) -> EngineResult<()> {
        let handle = self.handle(account_sid).await?;
        let mut state = handle.lock().await;
        let now = state.clock.now();
        let (facts, ejected) = state.conferences.force_end(conference_sid, now)?;
        self.dispatch_conference_facts(&mut state, conference_sid, facts, now).await;
        for ej in ejected {
            if let Some(c) = state.calls.get_mut(&ej) {
                c.endpoint = crate::call::Endpoint::None;
            }
            self.resume_dial(&mut state, &ej, Vec::new(), now).await;
            self.drive(&mut state, ej).await;
        }
        Ok(())
    }

    pub async fn update_participant(
        &self,
        account_sid: &AccountSid,
        call_sid: &CallSid,
        muted: Option<bool>,
        hold: Option<bool>,
    ) -> EngineResult<()> {
        let handle = self.handle(account_sid).await?;
        let mut state = handle.lock().await;
        let now = state.clock.now();
        let (conf_sid, facts) = state.conferences.update_participant(call_sid, muted, hold, now)?;
        self.dispatch_conference_facts(&mut state, &conf_sid, facts, now).await;
        Ok(())
    }

    /// `UpdateParticipant` kick (spec §4.7): removes the call from the
    /// conference without ending the call itself — its `<Dial>` resumes.
    pub async fn kick_participant(&self, account_sid: &AccountSid, call_sid: &CallSid) -> EngineResult<()> {
        let handle = self.handle(account_sid).await?;
        let mut state = handle.lock().await;
        let now = state.clock.now();
        self.leave_conference_if_any(&mut state, call_sid, "kicked", now).await;
        self.resume_dial(&mut state, call_sid, Vec::new(), now).await;
        self.drive(&mut state, call_sid.clone()).await;
        Ok(())
    }

    pub async fn get_queue(&self, account_sid: &AccountSid, name: &str) -> EngineResult<QueueView> {
        let handle = self.handle(account_sid).await?;
        let state = handle.lock().await;
        state
            .queues
            .get(name)
            .map(QueueView::from)
            .ok_or_else(|| EngineError::not_found(format!("queue {name}")))
    }

    pub async fn list_queues(&self, account_sid: &AccountSid) -> EngineResult<Vec<QueueView>> {
        let handle = self.handle(account_sid).await?;
        let state = handle.lock().await;
        Ok(state.queues.all().map(QueueView::from).collect())
    }

    // ---- Time -------------------------------------------------------

    pub async fn set_clock_for_account(&self, account_sid: &AccountSid, real_time: bool) -> EngineResult<()> {
        let handle = self.handle(account_sid).await?;
        let mut state = handle.lock().await;
        state.clock.set_real_time(real_time);
        Ok(())
    }

    /// `AdvanceForAccount` (spec §4.7): moves the account's virtual clock
    /// forward, dispatching every timer that fires in deadline order.
    pub async fn advance_for_account(&self, account_sid: &AccountSid, delta: Duration) -> EngineResult<()> {
        let handle = self.handle(account_sid).await?;
        let mut state = handle.lock().await;
        let fired = state.clock.advance(delta);
        for kind in fired {
            let now = state.clock.now();
            self.handle_timer(&mut state, kind, now).await;
        }
        Ok(())
    }

    pub async fn snapshot(&self, account_sid: &AccountSid) -> EngineResult<Snapshot> {
        let handle = self.handle(account_sid).await?;
        let state = handle.lock().await;
        Ok(Snapshot {
            account_sid: state.account.sid.to_string(),
            calls: state.calls.values().map(CallView::from).collect(),
            queues: state.queues.all().map(QueueView::from).collect(),
            conferences: state.conferences.all().map(ConferenceView::from).collect(),
            recordings: state.account.recordings().map(RecordingView::from).collect(),
        })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(Arc::new(HttpWebhookTransport::default()))
    }
}

/// Needed by the `CallView::from` projection; kept here rather than on
/// `Direction` itself since it's a wire concern, not a domain one.
pub(crate) fn direction_wire(d: Direction) -> &'static str {
    match d {
        Direction::Inbound => "inbound",
        Direction::Outbound => "outbound",
    }
}

pub(crate) fn status_wire(s: CallStatus) -> &'static str {
    match s {
        CallStatus::Queued => "queued",
        CallStatus::Ringing => "ringing",
        CallStatus::InProgress => "in-progress",
        CallStatus::Completed => "completed",
        CallStatus::Busy => "busy",
        CallStatus::Failed => "failed",
        CallStatus::NoAnswer => "no-answer",
        CallStatus::Canceled => "canceled",
    }
}
