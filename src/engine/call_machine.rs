//! The call state machine: driving a call's markup cursor, dispatching
//! webhooks, and threading verb execution through Dial/Gather/Record/Enqueue
//! substates (spec §4.6).
//!
//! `drive` recurses indirectly through `execute_verb` → `dial_queue` (a
//! dequeued call can itself need driving) and so is boxed rather than a
//! plain `async fn`, which Rust can't give a finite size to for indirect
//! async recursion.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::{direction_wire, status_wire, AccountState, Engine};
use crate::call::{Call, CallStatus, DialState, Endpoint, EnqueueState, GatherState, RecordState};
use crate::clock::TimerKind;
use crate::conference::{ConferenceFact, JoinFlags};
use crate::ids::CallSid;
use crate::markup::{ConferenceNoun, Dial, DialNoun, Enqueue, Gather, HttpMethod, Pause, Prompt, Record, Verb};
use crate::webhook::Form;

/// Finds the call, if any, whose `<Dial>` currently has `call_sid` as its
/// ringing/bridged child — i.e. `call_sid` is a Dial *leg*, not the call
/// that issued the Dial.
pub(super) fn dial_parent_of(state: &AccountState, call_sid: &CallSid) -> Option<CallSid> {
    state
        .calls
        .values()
        .find(|c| c.dial.as_ref().and_then(|d| d.current_child.as_ref()) == Some(call_sid))
        .map(|c| c.sid.clone())
}

fn base_form(state: &AccountState, call_sid: &CallSid) -> Form {
    let call = state.calls.get(call_sid).expect("caller holds a valid call_sid");
    vec![
        ("AccountSid".to_string(), call.account_sid.to_string()),
        ("CallSid".to_string(), call.sid.to_string()),
        ("From".to_string(), call.from.clone()),
        ("To".to_string(), call.to.clone()),
        ("Direction".to_string(), direction_wire(call.direction).to_string()),
        ("CallStatus".to_string(), status_wire(call.status).to_string()),
    ]
}

fn build_request(url: &str, method: HttpMethod, form: Form) -> (String, Form) {
    match method {
        HttpMethod::Post => (url.to_string(), form),
        HttpMethod::Get => {
            let qs: String = form
                .iter()
                .map(|(k, v)| {
                    format!(
                        "{}={}",
                        url::form_urlencoded::byte_serialize(k.as_bytes()).collect::<String>(),
                        url::form_urlencoded::byte_serialize(v.as_bytes()).collect::<String>(),
                    )
                })
                .collect::<Vec<_>>()
                .join("&");
            let sep = if url.contains('?') { "&" } else { "?" };
            (format!("{url}{sep}{qs}"), Vec::new())
        }
    }
}

impl Engine {
    /// Drives `call_sid` forward through its pending markup until it
    /// suspends on some external event (Gather/Dial/Record/Pause) or ends.
    /// Boxed because it's reachable from its own call graph through
    /// `execute_verb` → `dial_queue` bridging a second, already-existing
    /// call.
    pub(super) fn drive<'a>(
        &'a self,
        state: &'a mut AccountState,
        call_sid: CallSid,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            loop {
                if !self.step_once(state, &call_sid).await {
                    break;
                }
            }
        })
    }

    /// Executes at most one unit of progress, re-checking suspend/terminal
    /// conditions fresh each time rather than threading a result type
    /// through every verb handler. Returns whether the caller should keep
    /// looping.
    async fn step_once(&self, state: &mut AccountState, call_sid: &CallSid) -> bool {
        let now = state.clock.now();
        let Some(call) = state.calls.get(call_sid) else { return false };

        if call.status.is_terminal() {
            return false;
        }
        if call.status != CallStatus::InProgress {
            return false;
        }
        if call.gather.is_some() || call.dial.is_some() || call.record.is_some() || call.pause_pending || call.enqueue_state.is_some() {
            return false;
        }

        if call.cursor.at_end() {
            if !call.fetched_initial {
                let url = call.answer_url.clone();
                let method = call.answer_method;
                state.calls.get_mut(call_sid).unwrap().fetched_initial = true;
                match self.fetch_and_parse(state, call_sid, &url, method, Vec::new(), now).await {
                    Some(resp) => {
                        if let Some(c) = state.calls.get_mut(call_sid) {
                            c.cursor.replace(resp.verbs);
                        }
                        true
                    }
                    None => false,
                }
            } else {
                self.end_call(state, call_sid, CallStatus::Completed, None, now).await;
                false
            }
        } else {
            let verb = call.cursor.current().unwrap().clone();
            state.calls.get_mut(call_sid).unwrap().cursor.advance();
            self.execute_verb(state, call_sid, verb, now).await;
            true
        }
    }

    async fn execute_verb(&self, state: &mut AccountState, call_sid: &CallSid, verb: Verb, now: Duration) {
        match verb {
            Verb::Say(say) => {
                let call = state.calls.get_mut(call_sid).unwrap();
                call.push_event(now, "say", crate::detail! {"text" => say.text});
            }
            Verb::Play(play) => {
                let call = state.calls.get_mut(call_sid).unwrap();
                call.push_event(now, "play", crate::detail! {"url" => play.url});
            }
            Verb::Pause(pause) => self.execute_pause(state, call_sid, pause, now),
            Verb::Gather(gather) => self.execute_gather(state, call_sid, gather, now),
            Verb::Dial(dial) => self.execute_dial(state, call_sid, dial, now).await,
            Verb::Enqueue(enqueue) => self.execute_enqueue(state, call_sid, enqueue, now),
            Verb::Redirect(redirect) => {
                if let Some(resp) = self
                    .fetch_and_parse(state, call_sid, &redirect.url, redirect.method, Vec::new(), now)
                    .await
                {
                    if let Some(c) = state.calls.get_mut(call_sid) {
                        c.cursor.replace(resp.verbs);
                    }
                }
            }
            Verb::Hangup => {
                self.end_call(state, call_sid, CallStatus::Completed, None, now).await;
            }
            Verb::Record(record) => self.execute_record(state, call_sid, record, now),
        }
    }

    fn execute_pause(&self, state: &mut AccountState, call_sid: &CallSid, pause: Pause, now: Duration) {
        let call = state.calls.get_mut(call_sid).unwrap();
        call.pause_pending = true;
        call.push_event(now, "pause", crate::detail! {"length" => pause.length_secs});
        state.clock.register(
            Duration::from_secs(pause.length_secs as u64),
            TimerKind::PauseDone { call_id: call_sid.clone() },
        );
    }

    fn execute_gather(&self, state: &mut AccountState, call_sid: &CallSid, gather: Gather, now: Duration) {
        for prompt in &gather.prompts {
            let (kind, detail) = match prompt {
                Prompt::Say(s) => ("say", crate::detail! {"text" => s.text.clone()}),
                Prompt::Play(p) => ("play", crate::detail! {"url" => p.url.clone()}),
                Prompt::Pause(p) => ("pause", crate::detail! {"length" => p.length_secs}),
            };
            state.calls.get_mut(call_sid).unwrap().push_event(now, kind, detail);
        }
        let call = state.calls.get_mut(call_sid).unwrap();
        call.endpoint = Endpoint::Gather;
        call.gather = Some(GatherState {
            action: gather.action,
            method: gather.method,
            num_digits: gather.num_digits,
            finish_on_key: gather.finish_on_key,
            digits: String::new(),
        });
        state.clock.register(
            Duration::from_secs(gather.timeout_secs as u64),
            TimerKind::GatherTimeout { call_id: call_sid.clone() },
        );
    }

    fn execute_record(&self, state: &mut AccountState, call_sid: &CallSid, record: Record, now: Duration) {
        let recording_sid = state.account.create_recording(call_sid.clone(), now);
        let call = state.calls.get_mut(call_sid).unwrap();
        call.recording_sid = Some(recording_sid.clone());
        call.push_event(now, "record.started", crate::detail! {"recording_sid" => recording_sid.clone()});
        call.record = Some(RecordState {
            recording_sid,
            action: record.action,
            method: record.method,
            finish_on_key: record.finish_on_key,
        });
        state.clock.register(
            Duration::from_secs(record.max_length_secs as u64),
            TimerKind::RecordMaxLength { call_id: call_sid.clone() },
        );
    }

    fn execute_enqueue(&self, state: &mut AccountState, call_sid: &CallSid, enqueue: Enqueue, now: Duration) {
        let call = state.calls.get_mut(call_sid).unwrap();
        call.endpoint = Endpoint::Queue(enqueue.name.clone());
        call.enqueue_state = Some(EnqueueState {
            action: enqueue.action,
            method: enqueue.method,
            entered_at: now,
        });
        call.push_event(now, "queue.entered", crate::detail! {"name" => enqueue.name.clone()});
        state.queues.enqueue(&enqueue.name, call_sid.clone(), now);
        // wait_url is fetched once on entry rather than truly looped while
        // queued (spec §9 open question: Enqueue wait-music re-fetching).
        let _ = enqueue.wait_url;
    }

    async fn execute_dial(&self, state: &mut AccountState, call_sid: &CallSid, dial: Dial, now: Duration) {
        state.calls.get_mut(call_sid).unwrap().push_event(
            now,
            "dial.started",
            crate::detail! {"children" => dial.children.len()},
        );
        state.calls.get_mut(call_sid).unwrap().endpoint = Endpoint::Dialing;
        state.calls.get_mut(call_sid).unwrap().dial = Some(DialState {
            action: dial.action,
            method: dial.method,
            record: dial.record,
            timeout_secs: dial.timeout_secs,
            children: dial.children,
            child_index: 0,
            current_child: None,
        });
        self.try_dial_child(state, call_sid, now).await;
    }

    /// Tries the child noun at the dial's current `child_index`, minting a
    /// call leg or bridging to a queue/conference. Falls through to
    /// `resume_dial` with `DialCallStatus=no-answer` once `child_index` runs
    /// past the end of the child list (spec §4.3 "Iterate children in
    /// order").
    async fn try_dial_child(&self, state: &mut AccountState, call_sid: &CallSid, now: Duration) {
        let dial = state.calls.get(call_sid).and_then(|c| c.dial.as_ref()).expect("dial in progress");
        let Some(noun) = dial.children.get(dial.child_index).cloned() else {
            self.resume_dial(state, call_sid, vec![("DialCallStatus".to_string(), "no-answer".to_string())], now)
                .await;
            return;
        };
        let timeout_secs = dial.timeout_secs;

        match noun {
            DialNoun::Number(n) | DialNoun::Sip(n) | DialNoun::Client(n) => {
                let parent = state.calls.get(call_sid).unwrap();
                let account_sid = parent.account_sid.clone();
                let to = parent.to.clone();
                let child_sid = CallSid::generate();
                let mut child = Call::new_outbound(
                    child_sid.clone(),
                    account_sid,
                    to,
                    n,
                    String::new(),
                    HttpMethod::Post,
                    None,
                    HttpMethod::Post,
                    Some(call_sid.clone()),
                    now,
                );
                child.status = CallStatus::Ringing;
                child.push_event(now, "call.created", crate::detail! {"direction" => "outbound"});
                state.calls.insert(child_sid.clone(), child);
                state.calls.get_mut(call_sid).unwrap().dial.as_mut().unwrap().current_child = Some(child_sid);
                state
                    .clock
                    .register(Duration::from_secs(timeout_secs as u64), TimerKind::DialTimeout { call_id: call_sid.clone() });
            }
            DialNoun::Queue(q) => {
                self.dial_queue(state, call_sid, &q.name, timeout_secs, now).await;
            }
            DialNoun::Conference(c) => {
                self.dial_conference(state, call_sid, c, now).await;
            }
        }
    }

    /// Advances to the next child noun after a failed/unanswered leg, or
    /// resumes the dialing call's markup with the final `DialCallStatus`
    /// once every child has been tried — "first-answer-wins" (spec §4.3,
    /// §9 open question 1): only the leftmost child that actually answers
    /// keeps the bridge and the recording; every earlier child that came
    /// back busy/failed/unanswered is simply skipped past.
    async fn retry_or_resume_dial(&self, state: &mut AccountState, call_sid: &CallSid, extra: Form, now: Duration) {
        let has_more = state
            .calls
            .get(call_sid)
            .and_then(|c| c.dial.as_ref())
            .map(|d| d.child_index + 1 < d.children.len())
            .unwrap_or(false);
        if has_more {
            let dial = state.calls.get_mut(call_sid).unwrap().dial.as_mut().unwrap();
            dial.child_index += 1;
            dial.current_child = None;
            self.try_dial_child(state, call_sid, now).await;
        } else {
            self.resume_dial(state, call_sid, extra, now).await;
        }
    }

    /// `<Dial><Queue>`: bridges the dialing call to the longest-waiting
    /// member of `queue_name`, if any, rather than minting a new call leg.
    async fn dial_queue(&self, state: &mut AccountState, parent_sid: &CallSid, queue_name: &str, timeout_secs: u32, now: Duration) {
        match state.queues.dequeue(queue_name, now) {
            Some(waiting_sid) => {
                if let Some(w) = state.calls.get_mut(&waiting_sid) {
                    w.endpoint = Endpoint::None;
                }
                self.resolve_enqueue_wait(state, &waiting_sid, now).await;
                self.drive(state, waiting_sid.clone()).await;

                let extra = vec![
                    ("DialCallStatus".to_string(), "completed".to_string()),
                    ("DialCallSid".to_string(), waiting_sid.to_string()),
                ];
                self.resume_dial(state, parent_sid, extra, now).await;
                self.drive(state, parent_sid.clone()).await;
            }
            None => {
                state
                    .clock
                    .register(Duration::from_secs(timeout_secs as u64), TimerKind::DialTimeout { call_id: parent_sid.clone() });
            }
        }
    }

    /// `<Dial><Conference>`: the dialing call itself becomes a participant
    /// — no child call is minted. It stays suspended (its `dial` substate
    /// stays populated) until the conference ends or it's kicked.
    async fn dial_conference(&self, state: &mut AccountState, call_sid: &CallSid, noun: ConferenceNoun, now: Duration) {
        let flags = JoinFlags {
            muted: noun.muted,
            start_on_enter: noun.start_conference_on_enter,
            end_on_exit: noun.end_conference_on_exit,
            beep: noun.beep,
            status_callback: noun.status_callback,
            status_callback_method: noun.status_callback_method,
            status_callback_events: noun.status_callback_event,
            record: noun.record.is_recording(),
            recording_status_callback: noun.recording_status_callback,
        };
        let (conf_sid, facts) = state.conferences.join(&noun.name, call_sid.clone(), flags, now);
        state.calls.get_mut(call_sid).unwrap().endpoint = Endpoint::Conference(noun.name.clone());
        if let Some(rec_sid) = state.conferences.get(&conf_sid).and_then(|c| c.recording_sid.clone()) {
            state.calls.get_mut(call_sid).unwrap().recording_sid = Some(rec_sid);
        }
        self.dispatch_conference_facts(state, &conf_sid, facts, now).await;
    }

    /// `finish_gather`, `finish_record`, `resume_dial` are plain
    /// state-mutating functions; every caller follows them with a fresh
    /// `drive` call rather than threading progress results back up.
    pub(super) async fn finish_gather(&self, state: &mut AccountState, call_sid: &CallSid, now: Duration, finished_on_key: Option<String>) {
        let Some(gather) = state.calls.get_mut(call_sid).and_then(|c| c.gather.take()) else { return };
        state.clock.cancel_kind_for_call(call_sid, |k| matches!(k, TimerKind::GatherTimeout { .. }));
        state.calls.get_mut(call_sid).unwrap().endpoint = Endpoint::None;
        if gather.digits.is_empty() {
            return;
        }
        if let Some(action) = gather.action {
            let mut extra = vec![("Digits".to_string(), gather.digits)];
            if let Some(fok) = finished_on_key {
                extra.push(("FinishedOnKey".to_string(), fok));
            }
            if let Some(resp) = self.fetch_and_parse(state, call_sid, &action, gather.method, extra, now).await {
                if let Some(c) = state.calls.get_mut(call_sid) {
                    c.cursor.replace(resp.verbs);
                }
            }
        }
    }

    pub(super) async fn finish_record(
        &self,
        state: &mut AccountState,
        call_sid: &CallSid,
        recording_sid: Option<crate::ids::RecordingSid>,
        duration_secs: u32,
        now: Duration,
    ) {
        let Some(record) = state.calls.get_mut(call_sid).and_then(|c| c.record.take()) else { return };
        state.clock.cancel_kind_for_call(call_sid, |k| matches!(k, TimerKind::RecordMaxLength { .. }));
        let sid = recording_sid.unwrap_or(record.recording_sid);
        state
            .calls
            .get_mut(call_sid)
            .unwrap()
            .push_event(now, "record.finished", crate::detail! {"recording_sid" => sid.clone(), "duration" => duration_secs});
        if let Some(action) = record.action {
            let extra = vec![
                ("RecordingSid".to_string(), sid.to_string()),
                ("RecordingUrl".to_string(), format!("/2010-04-01/Recordings/{sid}.json")),
                ("RecordingDuration".to_string(), duration_secs.to_string()),
                ("RecordingStatus".to_string(), "completed".to_string()),
            ];
            if let Some(resp) = self.fetch_and_parse(state, call_sid, &action, record.method, extra, now).await {
                if let Some(c) = state.calls.get_mut(call_sid) {
                    c.cursor.replace(resp.verbs);
                }
            }
        }
    }

    pub(super) async fn resume_dial(&self, state: &mut AccountState, call_sid: &CallSid, extra: Form, now: Duration) {
        let Some(dial) = state.calls.get_mut(call_sid).and_then(|c| c.dial.take()) else { return };
        state.clock.cancel_kind_for_call(call_sid, |k| matches!(k, TimerKind::DialTimeout { .. }));
        state.calls.get_mut(call_sid).unwrap().endpoint = Endpoint::None;
        state.calls.get_mut(call_sid).unwrap().push_event(now, "dial.completed", crate::detail! {});
        if let Some(action) = dial.action {
            if let Some(resp) = self.fetch_and_parse(state, call_sid, &action, dial.method, extra, now).await {
                if let Some(c) = state.calls.get_mut(call_sid) {
                    c.cursor.replace(resp.verbs);
                }
            }
        }
    }

    /// Delivers the `QueueResult`/`QueueTime` report to a dequeued call's
    /// own `<Enqueue>` `action` (spec §4.6 component contract — not the
    /// dialing call's `<Dial>` `action`, despite the more colloquial
    /// phrasing of the bridged-call scenario in spec §8).
    pub(super) async fn resolve_enqueue_wait(&self, state: &mut AccountState, call_sid: &CallSid, now: Duration) {
        let Some(enq) = state.calls.get_mut(call_sid).and_then(|c| c.enqueue_state.take()) else { return };
        let elapsed = now.saturating_sub(enq.entered_at).as_secs();
        if let Some(action) = enq.action {
            let extra = vec![
                ("QueueResult".to_string(), "bridged".to_string()),
                ("QueueTime".to_string(), elapsed.to_string()),
            ];
            if let Some(resp) = self.fetch_and_parse(state, call_sid, &action, enq.method, extra, now).await {
                if let Some(c) = state.calls.get_mut(call_sid) {
                    c.cursor.replace(resp.verbs);
                }
            }
        }
    }

    /// Ends `call_sid` outright: leaves any queue/conference it's in,
    /// cancels its timers, marks it terminal, and fires its status
    /// callback. Does not touch a Dial parent/child relationship — callers
    /// that end a Dial *leg* go through `finish_dial_leg` instead.
    pub(super) async fn end_call(
        &self,
        state: &mut AccountState,
        call_sid: &CallSid,
        status: CallStatus,
        reason: Option<String>,
        now: Duration,
    ) {
        if state.calls.get(call_sid).map(|c| c.status.is_terminal()).unwrap_or(true) {
            return;
        }
        if let Some(name) = state.queues.find_queue_of(call_sid).map(|s| s.to_string()) {
            let _ = state.queues.remove(&name, call_sid, now);
        }
        self.leave_conference_if_any(state, call_sid, "hangup", now).await;

        state.clock.cancel_for_call(call_sid);
        let call = state.calls.get_mut(call_sid).unwrap();
        call.mark_ended(status, reason, now);
        call.push_event(now, "call.ended", crate::detail! {"status" => status_wire(status)});
        tracing::info!(call_sid = %call_sid, status = status_wire(status), "call ended");
        self.dispatch_status_callback(state, call_sid, now).await;
    }

    /// Resolves a Dial leg's outcome (answered elsewhere's hangup, busy,
    /// failure, or a ring timeout) and resumes the *parent*'s markup with
    /// `DialCallStatus`/`DialCallSid`.
    pub(super) async fn finish_dial_leg(
        &self,
        state: &mut AccountState,
        parent_sid: &CallSid,
        child_sid: Option<CallSid>,
        status: CallStatus,
        now: Duration,
    ) {
        state.clock.cancel_kind_for_call(parent_sid, |k| matches!(k, TimerKind::DialTimeout { .. }));
        if let Some(child) = &child_sid {
            if let Some(c) = state.calls.get_mut(child) {
                if c.mark_ended(status, None, now) {
                    c.push_event(now, "call.ended", crate::detail! {"status" => status_wire(status)});
                }
            }
            state.clock.cancel_for_call(child);
            self.dispatch_status_callback(state, child, now).await;
        }
        let mut extra = vec![("DialCallStatus".to_string(), status_wire(status).to_string())];
        if let Some(child) = &child_sid {
            extra.push(("DialCallSid".to_string(), child.to_string()));
        }
        if status == CallStatus::Completed {
            self.resume_dial(state, parent_sid, extra, now).await;
        } else {
            self.retry_or_resume_dial(state, parent_sid, extra, now).await;
        }
        self.drive(state, parent_sid.clone()).await;
    }

    pub(super) async fn leave_conference_if_any(&self, state: &mut AccountState, call_sid: &CallSid, reason: &str, now: Duration) {
        if state.conferences.find_conference_of(call_sid).is_none() {
            return;
        }
        let Ok((conf_sid, facts, ejected)) = state.conferences.leave(call_sid, reason, now) else {
            return;
        };
        self.dispatch_conference_facts(state, &conf_sid, facts, now).await;
        for ej in ejected {
            if let Some(c) = state.calls.get_mut(&ej) {
                c.endpoint = Endpoint::None;
            }
            self.resume_dial(state, &ej, Vec::new(), now).await;
            self.drive(state, ej).await;
        }
    }

    /// Turns conference facts into webhook deliveries against the
    /// conference's status callback, filtered by its subscribed event mask
    /// and stamped with a monotonic `SequenceNumber` (spec §4.5, §5
    /// "Ordering guarantees").
    pub(super) async fn dispatch_conference_facts(
        &self,
        state: &mut AccountState,
        conf_sid: &crate::ids::ConferenceSid,
        facts: Vec<ConferenceFact>,
        now: Duration,
    ) {
        let Some((url, method)) = state.conferences.get(conf_sid).map(|c| (c.status_callback.clone(), c.status_callback_method)) else {
            return;
        };
        let Some(url) = url else { return };

        for fact in facts {
            let tag = match &fact {
                ConferenceFact::Started => "start",
                ConferenceFact::Joined { .. } => "join",
                ConferenceFact::Left { .. } => "leave",
                ConferenceFact::Muted { .. } => "mute",
                ConferenceFact::Held { .. } => "hold",
                ConferenceFact::Ended { .. } => "end",
            };
            let wants = state.conferences.get(conf_sid).map(|c| c.wants_event(tag)).unwrap_or(false);
            if !wants {
                continue;
            }
            let seq = state.conferences.get_mut(conf_sid).map(|c| c.next_sequence()).unwrap_or(0);

            let mut form = vec![
                ("ConferenceSid".to_string(), conf_sid.to_string()),
                ("StatusCallbackEvent".to_string(), tag.to_string()),
                ("SequenceNumber".to_string(), seq.to_string()),
                ("Timestamp".to_string(), now.as_secs().to_string()),
            ];
            match &fact {
                ConferenceFact::Joined { call_id } | ConferenceFact::Left { call_id } => {
                    form.push(("CallSid".to_string(), call_id.to_string()));
                }
                ConferenceFact::Muted { call_id, muted } => {
                    form.push(("CallSid".to_string(), call_id.to_string()));
                    form.push(("Muted".to_string(), muted.to_string()));
                }
                ConferenceFact::Held { call_id, hold } => {
                    form.push(("CallSid".to_string(), call_id.to_string()));
                    form.push(("Hold".to_string(), hold.to_string()));
                }
                ConferenceFact::Ended { recording_sid } => {
                    if let Some(rec) = recording_sid {
                        form.push(("RecordingSid".to_string(), rec.to_string()));
                    }
                }
                ConferenceFact::Started => {}
            }

            let (target_url, body_form) = build_request(&url, method, form);
            match self.transport.post(&target_url, &body_form).await {
                Ok(_) => {}
                Err(e) => tracing::warn!(conference_sid = %conf_sid, error = %e, "conference status callback failed"),
            }
        }
    }

    /// Fetches and parses markup at `url`. On transport failure or an
    /// unparseable response, fails the call and returns `None` (spec §7
    /// "webhook failures fail the call, they never panic the engine").
    pub(super) async fn fetch_and_parse(
        &self,
        state: &mut AccountState,
        call_sid: &CallSid,
        url: &str,
        method: HttpMethod,
        extra: Form,
        now: Duration,
    ) -> Option<crate::markup::VoiceResponse> {
        let mut form = base_form(state, call_sid);
        form.extend(extra);
        let (target_url, body_form) = build_request(url, method, form);

        state
            .calls
            .get_mut(call_sid)
            .unwrap()
            .push_event(now, "webhook.request", crate::detail! {"url" => target_url.clone(), "method" => method.as_str()});

        match self.transport.post(&target_url, &body_form).await {
            Ok(resp) => {
                state
                    .calls
                    .get_mut(call_sid)
                    .unwrap()
                    .push_event(now, "webhook.response", crate::detail! {"status" => resp.status});
                match crate::markup::parse_voice_response(&resp.body) {
                    Ok(voice) => Some(voice),
                    Err(e) => {
                        tracing::warn!(call_sid = %call_sid, error = %e, "unparseable webhook response");
                        self.end_call(state, call_sid, CallStatus::Failed, Some("unparseable_response".to_string()), now)
                            .await;
                        None
                    }
                }
            }
            Err(e) => {
                state
                    .calls
                    .get_mut(call_sid)
                    .unwrap()
                    .push_event(now, "webhook.error", crate::detail! {"error" => e.to_string()});
                tracing::warn!(call_sid = %call_sid, error = %e, "webhook dispatch failed");
                self.end_call(state, call_sid, CallStatus::Failed, Some("webhook_error".to_string()), now)
                    .await;
                None
            }
        }
    }

    pub(super) async fn dispatch_status_callback(&self, state: &mut AccountState, call_sid: &CallSid, now: Duration) {
        let Some(call) = state.calls.get(call_sid) else { return };
        let Some(url) = call.status_callback.clone() else { return };
        let method = call.status_callback_method;
        let mut form = vec![
            ("CallSid".to_string(), call.sid.to_string()),
            ("CallStatus".to_string(), status_wire(call.status).to_string()),
            ("Timestamp".to_string(), now.as_secs().to_string()),
        ];
        if let Some(d) = call.duration_secs() {
            form.push(("CallDuration".to_string(), d.to_string()));
        }

        let (target_url, body_form) = build_request(&url, method, form);
        match self.transport.post(&target_url, &body_form).await {
            Ok(_) => {
                if let Some(c) = state.calls.get_mut(call_sid) {
                    c.push_event(now, "statuscallback.delivered", crate::detail! {});
                }
            }
            Err(e) => {
                if let Some(c) = state.calls.get_mut(call_sid) {
                    c.push_event(now, "statuscallback.failed", crate::detail! {"error" => e.to_string()});
                }
            }
        }
    }

    pub(super) async fn handle_timer(&self, state: &mut AccountState, kind: TimerKind, now: Duration) {
        match kind {
            TimerKind::PauseDone { call_id } => {
                if let Some(c) = state.calls.get_mut(&call_id) {
                    c.pause_pending = false;
                }
                self.drive(state, call_id).await;
            }
            TimerKind::GatherTimeout { call_id } => {
                self.finish_gather(state, &call_id, now, None).await;
                self.drive(state, call_id).await;
            }
            TimerKind::RecordMaxLength { call_id } => {
                self.finish_record(state, &call_id, None, 0, now).await;
                self.drive(state, call_id).await;
            }
            TimerKind::RingTimeout { call_id } => self.handle_ring_timeout(state, &call_id, now).await,
            TimerKind::DialTimeout { call_id } => self.handle_dial_timeout(state, &call_id, now).await,
        }
    }

    async fn handle_ring_timeout(&self, state: &mut AccountState, call_sid: &CallSid, now: Duration) {
        if let Some(parent) = dial_parent_of(state, call_sid) {
            self.finish_dial_leg(state, &parent, Some(call_sid.clone()), CallStatus::NoAnswer, now).await;
        } else {
            self.end_call(state, call_sid, CallStatus::NoAnswer, Some("ring_timeout".to_string()), now).await;
        }
    }

    async fn handle_dial_timeout(&self, state: &mut AccountState, call_sid: &CallSid, now: Duration) {
        let child = state.calls.get(call_sid).and_then(|c| c.dial.as_ref()).and_then(|d| d.current_child.clone());
        if let Some(child_sid) = child {
            self.finish_dial_leg(state, call_sid, Some(child_sid), CallStatus::NoAnswer, now).await;
        } else {
            self.retry_or_resume_dial(state, call_sid, vec![("DialCallStatus".to_string(), "no-answer".to_string())], now)
                .await;
            self.drive(state, call_sid.clone()).await;
        }
    }
}
