//! Thin REST adapter over `Engine` (spec §B.4). Each route deserializes a
//! form/JSON request, calls exactly one `Engine` method, and serializes the
//! result using the provider's canonical JSON shape.

use axum::extract::{Form, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::call::CallStatus;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::ids::{AccountSid, ApplicationSid, CallSid, ConferenceSid, PhoneNumberSid, RecordingSid};
use crate::markup::HttpMethod;

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
}

/// The provider's JSON error envelope (spec §B.2).
#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    code: i32,
    message: String,
    more_info: String,
    status: u16,
}

struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorEnvelope {
            code: self.0.code(),
            message: self.0.to_string(),
            more_info: format!("https://www.twilio.com/docs/errors/{}", self.0.code()),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn method_of(s: Option<String>) -> HttpMethod {
    s.and_then(|s| HttpMethod::parse(&s)).unwrap_or_default()
}

pub fn router(engine: Engine) -> Router {
    let state = AppState { engine };

    let api = Router::new()
        .route("/Accounts.json", post(create_account))
        .route("/Accounts/:account_sid.json", get(fetch_account))
        .route(
            "/Accounts/:account_sid/IncomingPhoneNumbers.json",
            post(create_incoming_phone_number).get(list_incoming_phone_numbers),
        )
        .route(
            "/Accounts/:account_sid/IncomingPhoneNumbers/:sid.json",
            post(update_incoming_phone_number).delete(delete_incoming_phone_number),
        )
        .route("/Accounts/:account_sid/Applications.json", post(create_application))
        .route("/Accounts/:account_sid/Calls.json", post(create_call).get(list_calls))
        .route("/Accounts/:account_sid/Calls/:sid.json", get(fetch_call).post(update_call))
        .route("/Accounts/:account_sid/Conferences.json", get(list_conferences))
        .route(
            "/Accounts/:account_sid/Conferences/:sid.json",
            get(fetch_conference).post(update_conference),
        )
        .route(
            "/Accounts/:account_sid/Conferences/:sid/Participants/:call_sid.json",
            get(fetch_participant).post(update_participant),
        )
        .route("/Accounts/:account_sid/Queues/:name.json", get(get_queue))
        .route("/Accounts/:account_sid/Recordings.json", get(list_recordings))
        .route("/Accounts/:account_sid/Recordings/:sid.json", get(fetch_recording))
        .route(
            "/Accounts/:account_sid/Sip/Domains/:key.json",
            post(put_sip_resource).get(get_sip_resource).delete(delete_sip_resource),
        );

    let app = Router::new().nest("/2010-04-01", api).with_state(state.clone());

    #[cfg(feature = "test-surface")]
    let app = app.nest("/test", test_surface_router().with_state(state));
    #[cfg(not(feature = "test-surface"))]
    let _ = &state;

    app
}

// ---- Account / provisioning ------------------------------------------

#[derive(Debug, Deserialize)]
struct CreateAccountForm {
    friendly_name: String,
}

async fn create_account(State(st): State<AppState>, Form(body): Form<CreateAccountForm>) -> impl IntoResponse {
    let sid = st.engine.create_account(body.friendly_name).await;
    (StatusCode::CREATED, Json(serde_json::json!({ "sid": sid.to_string() })))
}

async fn fetch_account(State(st): State<AppState>, Path(account_sid): Path<String>) -> ApiResult<serde_json::Value> {
    let (sid, friendly_name) = st.engine.fetch_account(&AccountSid(account_sid)).await?;
    Ok(Json(serde_json::json!({ "sid": sid.to_string(), "friendly_name": friendly_name })))
}

#[derive(Debug, Deserialize)]
struct CreateApplicationForm {
    friendly_name: String,
    voice_url: String,
    voice_method: Option<String>,
    status_callback: Option<String>,
    status_callback_method: Option<String>,
}

async fn create_application(
    State(st): State<AppState>,
    Path(account_sid): Path<String>,
    Form(body): Form<CreateApplicationForm>,
) -> ApiResult<serde_json::Value> {
    let sid = st
        .engine
        .create_application(
            &AccountSid(account_sid),
            body.friendly_name,
            body.voice_url,
            method_of(body.voice_method),
            body.status_callback,
            method_of(body.status_callback_method),
        )
        .await?;
    Ok(Json(serde_json::json!({ "sid": sid.to_string() })))
}

#[derive(Debug, Deserialize)]
struct CreateIncomingPhoneNumberForm {
    phone_number: String,
    voice_application_sid: Option<String>,
}

async fn create_incoming_phone_number(
    State(st): State<AppState>,
    Path(account_sid): Path<String>,
    Form(body): Form<CreateIncomingPhoneNumberForm>,
) -> ApiResult<serde_json::Value> {
    let sid = st
        .engine
        .create_incoming_phone_number(&AccountSid(account_sid), body.phone_number, body.voice_application_sid.map(ApplicationSid))
        .await?;
    Ok(Json(serde_json::json!({ "sid": sid.to_string() })))
}

async fn list_incoming_phone_numbers(State(st): State<AppState>, Path(account_sid): Path<String>) -> ApiResult<serde_json::Value> {
    let numbers = st.engine.list_incoming_phone_numbers(&AccountSid(account_sid)).await?;
    Ok(Json(serde_json::json!({ "incoming_phone_numbers": numbers })))
}

#[derive(Debug, Deserialize)]
struct UpdateIncomingPhoneNumberForm {
    voice_application_sid: Option<String>,
}

async fn update_incoming_phone_number(
    State(st): State<AppState>,
    Path((account_sid, sid)): Path<(String, String)>,
    Form(body): Form<UpdateIncomingPhoneNumberForm>,
) -> Result<StatusCode, ApiError> {
    st.engine
        .update_incoming_phone_number(&AccountSid(account_sid), &PhoneNumberSid(sid), body.voice_application_sid.map(ApplicationSid))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_incoming_phone_number(
    State(st): State<AppState>,
    Path((account_sid, sid)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    st.engine.delete_incoming_phone_number(&AccountSid(account_sid), &PhoneNumberSid(sid)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn put_sip_resource(
    State(st): State<AppState>,
    Path((account_sid, key)): Path<(String, String)>,
    Json(body): Json<serde_json::Value>,
) -> Result<StatusCode, ApiError> {
    st.engine.put_sip_resource(&AccountSid(account_sid), key, body).await?;
    Ok(StatusCode::CREATED)
}

async fn get_sip_resource(State(st): State<AppState>, Path((account_sid, key)): Path<(String, String)>) -> ApiResult<serde_json::Value> {
    let value = st.engine.get_sip_resource(&AccountSid(account_sid), &key).await?;
    Ok(Json(value))
}

async fn delete_sip_resource(State(st): State<AppState>, Path((account_sid, key)): Path<(String, String)>) -> Result<StatusCode, ApiError> {
    st.engine.delete_sip_resource(&AccountSid(account_sid), &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- Calls --------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CreateCallForm {
    from: String,
    to: String,
    url: String,
    method: Option<String>,
    status_callback: Option<String>,
    status_callback_method: Option<String>,
}

async fn create_call(
    State(st): State<AppState>,
    Path(account_sid): Path<String>,
    Form(body): Form<CreateCallForm>,
) -> ApiResult<serde_json::Value> {
    let sid = st
        .engine
        .create_call(
            &AccountSid(account_sid),
            body.from,
            body.to,
            body.url,
            method_of(body.method),
            body.status_callback,
            method_of(body.status_callback_method),
        )
        .await?;
    Ok(Json(serde_json::json!({ "sid": sid.to_string() })))
}

async fn list_calls(State(st): State<AppState>, Path(account_sid): Path<String>) -> ApiResult<serde_json::Value> {
    let calls = st.engine.list_calls(&AccountSid(account_sid)).await?;
    Ok(Json(serde_json::json!({ "calls": calls })))
}

async fn fetch_call(State(st): State<AppState>, Path((account_sid, sid)): Path<(String, String)>) -> ApiResult<crate::view::CallView> {
    let call = st.engine.fetch_call(&AccountSid(account_sid), &CallSid(sid)).await?;
    Ok(Json(call))
}

#[derive(Debug, Deserialize)]
struct UpdateCallForm {
    url: Option<String>,
    method: Option<String>,
    status: Option<String>,
}

async fn update_call(
    State(st): State<AppState>,
    Path((account_sid, sid)): Path<(String, String)>,
    Form(body): Form<UpdateCallForm>,
) -> Result<StatusCode, ApiError> {
    let status = match body.status.as_deref() {
        Some("completed") => Some(CallStatus::Completed),
        _ => None,
    };
    st.engine
        .update_call(&AccountSid(account_sid), &CallSid(sid), body.url, body.method.and_then(|m| HttpMethod::parse(&m)), status)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- Conferences / participants / queues --------------------------------

async fn list_conferences(State(st): State<AppState>, Path(account_sid): Path<String>) -> ApiResult<serde_json::Value> {
    let confs = st.engine.list_conferences(&AccountSid(account_sid)).await?;
    Ok(Json(serde_json::json!({ "conferences": confs })))
}

async fn fetch_conference(
    State(st): State<AppState>,
    Path((account_sid, sid)): Path<(String, String)>,
) -> ApiResult<crate::view::ConferenceView> {
    let conf = st.engine.fetch_conference(&AccountSid(account_sid), &ConferenceSid(sid)).await?;
    Ok(Json(conf))
}

#[derive(Debug, Deserialize)]
struct UpdateConferenceForm {
    status: Option<String>,
}

async fn update_conference(
    State(st): State<AppState>,
    Path((account_sid, sid)): Path<(String, String)>,
    Form(body): Form<UpdateConferenceForm>,
) -> Result<StatusCode, ApiError> {
    if body.status.as_deref() == Some("completed") {
        st.engine.force_end_conference(&AccountSid(account_sid), &ConferenceSid(sid)).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_participant(
    State(st): State<AppState>,
    Path((account_sid, conf_sid, call_sid)): Path<(String, String, String)>,
) -> ApiResult<serde_json::Value> {
    let conf = st.engine.fetch_conference(&AccountSid(account_sid), &ConferenceSid(conf_sid)).await?;
    if !conf.participants.iter().any(|p| p == &call_sid) {
        return Err(EngineError::not_found(format!("participant {call_sid}")).into());
    }
    Ok(Json(serde_json::json!({ "call_sid": call_sid })))
}

#[derive(Debug, Deserialize)]
struct UpdateParticipantForm {
    muted: Option<bool>,
    hold: Option<bool>,
    #[serde(default)]
    kick: bool,
}

async fn update_participant(
    State(st): State<AppState>,
    Path((account_sid, _conf_sid, call_sid)): Path<(String, String, String)>,
    Form(body): Form<UpdateParticipantForm>,
) -> Result<StatusCode, ApiError> {
    let account_sid = AccountSid(account_sid);
    let call_sid = CallSid(call_sid);
    if body.kick {
        st.engine.kick_participant(&account_sid, &call_sid).await?;
    } else {
        st.engine.update_participant(&account_sid, &call_sid, body.muted, body.hold).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn get_queue(State(st): State<AppState>, Path((account_sid, name)): Path<(String, String)>) -> ApiResult<crate::view::QueueView> {
    let queue = st.engine.get_queue(&AccountSid(account_sid), &name).await?;
    Ok(Json(queue))
}

// ---- Recordings -----------------------------------------------------

async fn list_recordings(State(st): State<AppState>, Path(account_sid): Path<String>) -> ApiResult<serde_json::Value> {
    let recs = st.engine.list_recordings(&AccountSid(account_sid)).await?;
    Ok(Json(serde_json::json!({ "recordings": recs })))
}

async fn fetch_recording(
    State(st): State<AppState>,
    Path((account_sid, sid)): Path<(String, String)>,
) -> ApiResult<crate::view::RecordingView> {
    let rec = st.engine.fetch_recording(&AccountSid(account_sid), &RecordingSid(sid)).await?;
    Ok(Json(rec))
}

// ---- Test-facing surface (spec §6, §8) ----------------------------------

#[cfg(feature = "test-surface")]
fn test_surface_router() -> Router<AppState> {
    Router::new()
        .route("/Accounts/:account_sid/Advance.json", post(test_advance))
        .route("/Accounts/:account_sid/Clock.json", post(test_set_clock))
        .route("/Accounts/:account_sid/IncomingCalls.json", post(test_incoming_call))
        .route("/Accounts/:account_sid/Calls/:sid/Answer.json", post(test_answer_call))
        .route("/Accounts/:account_sid/Calls/:sid/Busy.json", post(test_set_call_busy))
        .route("/Accounts/:account_sid/Calls/:sid/Fail.json", post(test_set_call_failed))
        .route("/Accounts/:account_sid/Calls/:sid/Digits.json", post(test_send_digits))
        .route("/Accounts/:account_sid/Calls/:sid/Recording.json", post(test_set_call_recording))
        .route("/Accounts/:account_sid/Calls/:sid/Voicemail.json", post(test_set_call_voicemail))
        .route("/Accounts/:account_sid/Snapshot.json", get(test_snapshot))
}

#[cfg(feature = "test-surface")]
#[derive(Debug, Deserialize)]
struct AdvanceForm {
    seconds: u64,
}

#[cfg(feature = "test-surface")]
async fn test_advance(
    State(st): State<AppState>,
    Path(account_sid): Path<String>,
    Form(body): Form<AdvanceForm>,
) -> Result<StatusCode, ApiError> {
    st.engine
        .advance_for_account(&AccountSid(account_sid), std::time::Duration::from_secs(body.seconds))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(feature = "test-surface")]
#[derive(Debug, Deserialize)]
struct SetClockForm {
    real_time: bool,
}

#[cfg(feature = "test-surface")]
async fn test_set_clock(
    State(st): State<AppState>,
    Path(account_sid): Path<String>,
    Form(body): Form<SetClockForm>,
) -> Result<StatusCode, ApiError> {
    st.engine.set_clock_for_account(&AccountSid(account_sid), body.real_time).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(feature = "test-surface")]
#[derive(Debug, Deserialize)]
struct IncomingCallForm {
    from: String,
    to: String,
    #[serde(default)]
    source: IncomingCallSource,
}

#[cfg(feature = "test-surface")]
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
enum IncomingCallSource {
    #[default]
    Pstn,
    Softphone,
    Sip,
}

#[cfg(feature = "test-surface")]
async fn test_incoming_call(
    State(st): State<AppState>,
    Path(account_sid): Path<String>,
    Form(body): Form<IncomingCallForm>,
) -> ApiResult<serde_json::Value> {
    let account_sid = AccountSid(account_sid);
    let sid = match body.source {
        IncomingCallSource::Pstn => st.engine.create_incoming_call(&account_sid, body.from, body.to).await?,
        IncomingCallSource::Softphone => st.engine.create_incoming_call_from_softphone(&account_sid, body.from, body.to).await?,
        IncomingCallSource::Sip => st.engine.create_incoming_call_from_sip(&account_sid, body.from, body.to).await?,
    };
    Ok(Json(serde_json::json!({ "sid": sid.to_string() })))
}

#[cfg(feature = "test-surface")]
async fn test_answer_call(State(st): State<AppState>, Path((account_sid, sid)): Path<(String, String)>) -> Result<StatusCode, ApiError> {
    st.engine.answer_call(&AccountSid(account_sid), &CallSid(sid)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(feature = "test-surface")]
async fn test_set_call_busy(State(st): State<AppState>, Path((account_sid, sid)): Path<(String, String)>) -> Result<StatusCode, ApiError> {
    st.engine.set_call_busy(&AccountSid(account_sid), &CallSid(sid)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(feature = "test-surface")]
#[derive(Debug, Deserialize)]
struct SetCallFailedForm {
    reason: Option<String>,
}

#[cfg(feature = "test-surface")]
async fn test_set_call_failed(
    State(st): State<AppState>,
    Path((account_sid, sid)): Path<(String, String)>,
    Form(body): Form<SetCallFailedForm>,
) -> Result<StatusCode, ApiError> {
    st.engine.set_call_failed(&AccountSid(account_sid), &CallSid(sid), body.reason).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(feature = "test-surface")]
#[derive(Debug, Deserialize)]
struct SendDigitsForm {
    digits: String,
}

#[cfg(feature = "test-surface")]
async fn test_send_digits(
    State(st): State<AppState>,
    Path((account_sid, sid)): Path<(String, String)>,
    Form(body): Form<SendDigitsForm>,
) -> Result<StatusCode, ApiError> {
    st.engine.send_digits(&AccountSid(account_sid), &CallSid(sid), &body.digits).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(feature = "test-surface")]
#[derive(Debug, Deserialize)]
struct SetRecordingForm {
    file_path: String,
    duration_secs: u32,
}

#[cfg(feature = "test-surface")]
async fn test_set_call_recording(
    State(st): State<AppState>,
    Path((account_sid, sid)): Path<(String, String)>,
    Form(body): Form<SetRecordingForm>,
) -> Result<StatusCode, ApiError> {
    st.engine
        .set_call_recording(&AccountSid(account_sid), &CallSid(sid), body.file_path, body.duration_secs)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(feature = "test-surface")]
async fn test_set_call_voicemail(
    State(st): State<AppState>,
    Path((account_sid, sid)): Path<(String, String)>,
    Form(body): Form<SetRecordingForm>,
) -> Result<StatusCode, ApiError> {
    st.engine
        .set_call_voicemail(&AccountSid(account_sid), &CallSid(sid), body.file_path, body.duration_secs)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(feature = "test-surface")]
async fn test_snapshot(State(st): State<AppState>, Path(account_sid): Path<String>) -> ApiResult<crate::view::Snapshot> {
    let snap = st.engine.snapshot(&AccountSid(account_sid)).await?;
    Ok(Json(snap))
}
