//! End-to-end scenario tests driving `Engine` through `MockWebhookTransport`,
//! matching the testable properties in the specification.

use std::sync::Arc;
use std::time::Duration;

use twimulator::engine::Engine;
use twimulator::ids::{AccountSid, ApplicationSid};
use twimulator::markup::HttpMethod;
use twimulator::webhook::{MockWebhookTransport, WebhookError};

fn form_value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
    form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// S1 — IVR with gather: a `<Gather numDigits="1">` action receives the
/// collected digit along with standard call identity fields.
#[tokio::test]
async fn s1_ivr_gather_posts_collected_digits() {
    let mock = Arc::new(MockWebhookTransport::new());
    let engine = Engine::new(mock.clone());

    let account_sid = engine.create_account("s1").await;
    engine
        .create_application(
            &account_sid,
            "ivr",
            "http://app/voice".to_string(),
            HttpMethod::Post,
            None,
            HttpMethod::Post,
        )
        .await
        .unwrap();
    let app_sid = engine.list_applications(&account_sid).await.unwrap()[0].sid.clone();
    engine
        .create_incoming_phone_number(&account_sid, "+15551110000", Some(ApplicationSid(app_sid)))
        .await
        .unwrap();

    mock.queue_response(
        "http://app/voice",
        200,
        r#"<Response><Gather numDigits="1" action="http://app/g"><Say>press 1</Say></Gather></Response>"#,
    );

    let call_sid = engine
        .create_incoming_call(&account_sid, "+15552220000".to_string(), "+15551110000".to_string())
        .await
        .unwrap();

    engine.send_digits(&account_sid, &call_sid, "1").await.unwrap();

    let calls = mock.calls_to("http://app/g");
    assert_eq!(calls.len(), 1);
    let form = &calls[0].form;
    assert_eq!(form_value(form, "Digits"), Some("1"));
    assert_eq!(form_value(form, "CallSid"), Some(call_sid.as_ref()));
    assert_eq!(form_value(form, "From"), Some("+15552220000"));
    assert_eq!(form_value(form, "To"), Some("+15551110000"));
    assert_eq!(form_value(form, "Direction"), Some("inbound"));
}

/// S2 — Queue then dial: an enqueued call is bridged by a `<Dial><Queue>`
/// elsewhere and its own `<Enqueue action>` receives the bridge report.
#[tokio::test]
async fn s2_queue_then_dial_bridges_and_reports() {
    let mock = Arc::new(MockWebhookTransport::new());
    let engine = Engine::new(mock.clone());

    let account_sid = engine.create_account("s2").await;
    engine
        .create_application(
            &account_sid,
            "queue-entry",
            "http://app/enqueue".to_string(),
            HttpMethod::Post,
            None,
            HttpMethod::Post,
        )
        .await
        .unwrap();
    let app_sid = engine.list_applications(&account_sid).await.unwrap()[0].sid.clone();
    engine
        .create_incoming_phone_number(&account_sid, "+15551110000", Some(ApplicationSid(app_sid)))
        .await
        .unwrap();

    mock.queue_response(
        "http://app/enqueue",
        200,
        r#"<Response><Enqueue action="http://app/enqueue-result">support</Enqueue></Response>"#,
    );
    let call_a = engine
        .create_incoming_call(&account_sid, "+15553330000".to_string(), "+15551110000".to_string())
        .await
        .unwrap();

    let queue = engine.get_queue(&account_sid, "support").await.unwrap();
    assert_eq!(queue.current_size, 1);

    mock.queue_response(
        "http://app/b-answer",
        200,
        r#"<Response><Dial timeout="10"><Queue>support</Queue></Dial></Response>"#,
    );
    let call_b = engine
        .create_call(
            &account_sid,
            "+15554440000".to_string(),
            "+15555550000".to_string(),
            "http://app/b-answer".to_string(),
            HttpMethod::Post,
            None,
            HttpMethod::Post,
        )
        .await
        .unwrap();
    engine.answer_call(&account_sid, &call_b).await.unwrap();

    let a_view = engine.fetch_call(&account_sid, &call_a).await.unwrap();
    let b_view = engine.fetch_call(&account_sid, &call_b).await.unwrap();
    assert_eq!(a_view.status, twimulator::call::CallStatus::InProgress);
    assert_eq!(b_view.status, twimulator::call::CallStatus::InProgress);

    let report = mock.calls_to("http://app/enqueue-result");
    assert_eq!(report.len(), 1);
    assert_eq!(form_value(&report[0].form, "QueueResult"), Some("bridged"));
    assert_eq!(form_value(&report[0].form, "QueueTime"), Some("0"));
}

/// S3 — Conference start/end events carry monotonic sequence numbers and
/// fire only for the subscribed event mask.
#[tokio::test]
async fn s3_conference_start_join_leave_end_sequence() {
    let mock = Arc::new(MockWebhookTransport::new());
    let engine = Engine::new(mock.clone());
    let account_sid = engine.create_account("s3").await;

    mock.queue_response("http://app/conf", 200, dial_conference_xml());
    let call1 = engine
        .create_call(
            &account_sid,
            "+15551110000".to_string(),
            "+15552220000".to_string(),
            "http://app/conf".to_string(),
            HttpMethod::Post,
            None,
            HttpMethod::Post,
        )
        .await
        .unwrap();
    engine.answer_call(&account_sid, &call1).await.unwrap();

    mock.queue_response("http://app/conf2", 200, dial_conference_xml());
    let call2 = engine
        .create_call(
            &account_sid,
            "+15553330000".to_string(),
            "+15554440000".to_string(),
            "http://app/conf2".to_string(),
            HttpMethod::Post,
            None,
            HttpMethod::Post,
        )
        .await
        .unwrap();
    engine.answer_call(&account_sid, &call2).await.unwrap();

    let events = mock.calls_to("http://cb");
    let tags: Vec<&str> = events.iter().map(|c| form_value(&c.form, "StatusCallbackEvent").unwrap()).collect();
    assert_eq!(tags, vec!["start", "join", "join"]);
    let sequences: Vec<u64> = events
        .iter()
        .map(|c| form_value(&c.form, "SequenceNumber").unwrap().parse().unwrap())
        .collect();
    assert_eq!(sequences, vec![1, 2, 3]);

    engine.hangup(&account_sid, &call2).await.unwrap();

    let events = mock.calls_to("http://cb");
    let tags: Vec<&str> = events.iter().map(|c| form_value(&c.form, "StatusCallbackEvent").unwrap()).collect();
    assert_eq!(tags, vec!["start", "join", "join", "leave"], "no end while one participant remains");

    engine.hangup(&account_sid, &call1).await.unwrap();
    let events = mock.calls_to("http://cb");
    let tags: Vec<&str> = events.iter().map(|c| form_value(&c.form, "StatusCallbackEvent").unwrap()).collect();
    assert_eq!(tags, vec!["start", "join", "join", "leave", "leave", "end"]);
}

fn dial_conference_xml() -> &'static str {
    r#"<Response><Dial><Conference statusCallback="http://cb" statusCallbackEvent="start end join leave">room-1</Conference></Dial></Response>"#
}

/// S4 — Ring timeout: advancing a virtual clock past a `<Dial>` timeout
/// resolves the leg as `no-answer` and resumes the parent.
#[tokio::test]
async fn s4_ring_timeout_resolves_as_no_answer() {
    let mock = Arc::new(MockWebhookTransport::new());
    let engine = Engine::new(mock.clone());
    let account_sid = engine.create_account("s4").await;

    mock.queue_response(
        "http://app/dial",
        200,
        r#"<Response><Dial timeout="30" action="http://app/dial-result"><Number>+15559990000</Number></Dial></Response>"#,
    );
    let call_sid = engine
        .create_call(
            &account_sid,
            "+15551110000".to_string(),
            "+15552220000".to_string(),
            "http://app/dial".to_string(),
            HttpMethod::Post,
            None,
            HttpMethod::Post,
        )
        .await
        .unwrap();
    engine.answer_call(&account_sid, &call_sid).await.unwrap();

    engine.set_clock_for_account(&account_sid, false).await.unwrap();
    engine.advance_for_account(&account_sid, Duration::from_secs(31)).await.unwrap();

    let calls = mock.calls_to("http://app/dial-result");
    assert_eq!(calls.len(), 1);
    assert_eq!(form_value(&calls[0].form, "DialCallStatus"), Some("no-answer"));

    let calls_list = engine.list_calls(&account_sid).await.unwrap();
    let child = calls_list.iter().find(|c| c.sid != call_sid.to_string()).unwrap();
    assert_eq!(child.status, twimulator::call::CallStatus::NoAnswer);
}

/// S5 — Recording callback: injecting recorded content fires the active
/// `<Record action>` with the recording's identity and makes it retrievable.
#[tokio::test]
async fn s5_recording_injection_fires_callback_and_is_retrievable() {
    let mock = Arc::new(MockWebhookTransport::new());
    let engine = Engine::new(mock.clone());
    let account_sid = engine.create_account("s5").await;

    mock.queue_response(
        "http://app/voice",
        200,
        r#"<Response><Record action="http://app/r" finishOnKey="#"/></Response>"#,
    );
    let call_sid = engine
        .create_call(
            &account_sid,
            "+15551110000".to_string(),
            "+15552220000".to_string(),
            "http://app/voice".to_string(),
            HttpMethod::Post,
            None,
            HttpMethod::Post,
        )
        .await
        .unwrap();
    engine.answer_call(&account_sid, &call_sid).await.unwrap();

    engine.set_call_voicemail(&account_sid, &call_sid, "/tmp/vm.wav", 12).await.unwrap();

    let calls = mock.calls_to("http://app/r");
    assert_eq!(calls.len(), 1);
    let recording_sid = form_value(&calls[0].form, "RecordingSid").unwrap().to_string();
    assert_eq!(form_value(&calls[0].form, "RecordingDuration"), Some("12"));

    let recording = engine
        .fetch_recording(&account_sid, &twimulator::ids::RecordingSid(recording_sid))
        .await
        .unwrap();
    assert_eq!(recording.duration, Some(12));
}

/// S6 — Webhook failure: a non-2xx answer URL fails the call and, if a
/// status callback is configured, reports `CallStatus=failed`.
#[tokio::test]
async fn s6_webhook_failure_fails_the_call() {
    let mock = Arc::new(MockWebhookTransport::new());
    let engine = Engine::new(mock.clone());
    let account_sid = engine.create_account("s6").await;

    mock.queue_response("http://app/voice", 500, "internal error");
    let call_sid = engine
        .create_call(
            &account_sid,
            "+15551110000".to_string(),
            "+15552220000".to_string(),
            "http://app/voice".to_string(),
            HttpMethod::Post,
            Some("http://app/status".to_string()),
            HttpMethod::Post,
        )
        .await
        .unwrap();
    engine.answer_call(&account_sid, &call_sid).await.unwrap();

    let call = engine.fetch_call(&account_sid, &call_sid).await.unwrap();
    assert_eq!(call.status, twimulator::call::CallStatus::Failed);

    let status_calls = mock.calls_to("http://app/status");
    assert_eq!(status_calls.len(), 1);
    assert_eq!(form_value(&status_calls[0].form, "CallStatus"), Some("failed"));
}

/// `<Dial>` with more than one child noun tries them in order and only the
/// leg that actually answers gets bridged and reported — first-answer-wins
/// (spec §4.3 "Iterate children in order", §9 open question 1).
#[tokio::test]
async fn dial_retries_next_child_after_busy_and_reports_the_answered_leg() {
    let mock = Arc::new(MockWebhookTransport::new());
    let engine = Engine::new(mock.clone());
    let account_sid = engine.create_account("dial-retry").await;

    mock.queue_response(
        "http://app/dial",
        200,
        r#"<Response><Dial timeout="10" action="http://app/dial-result"><Number>+15551010000</Number><Number>+15551020000</Number></Dial></Response>"#,
    );
    let parent_sid = engine
        .create_call(
            &account_sid,
            "+15551110000".to_string(),
            "+15552220000".to_string(),
            "http://app/dial".to_string(),
            HttpMethod::Post,
            None,
            HttpMethod::Post,
        )
        .await
        .unwrap();
    engine.answer_call(&account_sid, &parent_sid).await.unwrap();

    let first_child = engine
        .list_calls(&account_sid)
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.sid != parent_sid.to_string())
        .unwrap();
    assert_eq!(first_child.to, "+15551010000");

    let first_child_sid = twimulator::ids::CallSid(first_child.sid.clone());
    engine.set_call_busy(&account_sid, &first_child_sid).await.unwrap();

    let second_child = engine
        .list_calls(&account_sid)
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.sid != parent_sid.to_string() && c.sid != first_child.sid)
        .unwrap();
    assert_eq!(second_child.to, "+15551020000");

    let second_child_sid = twimulator::ids::CallSid(second_child.sid.clone());
    engine.answer_call(&account_sid, &second_child_sid).await.unwrap();
    engine.hangup(&account_sid, &second_child_sid).await.unwrap();

    let calls = mock.calls_to("http://app/dial-result");
    assert_eq!(calls.len(), 1);
    assert_eq!(form_value(&calls[0].form, "DialCallStatus"), Some("completed"));
    assert_eq!(form_value(&calls[0].form, "DialCallSid"), Some(second_child.sid.as_str()));

    let first_after = engine.fetch_call(&account_sid, &first_child_sid).await.unwrap();
    assert_eq!(first_after.status, twimulator::call::CallStatus::Busy);
}

#[tokio::test]
async fn unprovisioned_account_is_not_found() {
    let mock = Arc::new(MockWebhookTransport::new());
    let engine = Engine::new(mock);
    let bogus = AccountSid("ACdoesnotexist".to_string());
    let err = engine.fetch_account(&bogus).await.unwrap_err();
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn answering_an_already_answered_call_is_a_no_op() {
    let mock = Arc::new(MockWebhookTransport::new());
    let engine = Engine::new(mock.clone());
    let account_sid = engine.create_account("idempotent").await;

    mock.queue_response("http://app/voice", 200, "<Response><Pause length=\"1\"/></Response>");
    let call_sid = engine
        .create_call(
            &account_sid,
            "+15551110000".to_string(),
            "+15552220000".to_string(),
            "http://app/voice".to_string(),
            HttpMethod::Post,
            None,
            HttpMethod::Post,
        )
        .await
        .unwrap();
    engine.answer_call(&account_sid, &call_sid).await.unwrap();
    engine.answer_call(&account_sid, &call_sid).await.unwrap();

    let calls = mock.calls_to("http://app/voice");
    assert_eq!(calls.len(), 1, "answer is idempotent, voice URL fetched once");

    // CallSid should stay stable and not panic when hung up twice either.
    engine.hangup(&account_sid, &call_sid).await.unwrap();
    engine.hangup(&account_sid, &call_sid).await.unwrap();
}
