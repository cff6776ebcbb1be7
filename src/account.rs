use std::collections::HashMap;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};
use crate::ids::{AccountSid, ApplicationSid, PhoneNumberSid, RecordingSid};
use crate::markup::HttpMethod;

/// A voice application: the answer URL an inbound call to a provisioned
/// number is routed to, plus where its status-callback events go (spec §3
/// "Account, Application, Number, Recording").
#[derive(Debug, Clone)]
pub struct Application {
    pub sid: ApplicationSid,
    pub friendly_name: String,
    pub voice_url: String,
    pub voice_method: HttpMethod,
    pub status_callback: Option<String>,
    pub status_callback_method: HttpMethod,
}

/// A provisioned phone number, at most one application away from an inbound
/// caller (spec §3).
#[derive(Debug, Clone)]
pub struct PhoneNumber {
    pub sid: PhoneNumberSid,
    pub phone_number: String,
    pub application_sid: Option<ApplicationSid>,
}

/// A finished or in-progress recording (spec §3, §4.5 recording lifecycle,
/// §4.7 `SetCallRecording`/`SetCallVoicemail`). `file_path`/`duration_secs`
/// start empty and are filled in by the test-facing injection operations or
/// by the call machine once a Record verb's audio "completes".
#[derive(Debug, Clone)]
pub struct Recording {
    pub sid: RecordingSid,
    pub call_sid: crate::ids::CallSid,
    pub file_path: Option<String>,
    pub duration_secs: Option<u32>,
    pub created_at: Duration,
}

/// Everything owned by a single tenant (spec §3 "Account"). Calls,
/// queues, and conferences live alongside this in `engine::AccountState` —
/// this type holds the provisioning side: auth, numbers, applications,
/// recordings.
#[derive(Debug, Clone)]
pub struct Account {
    pub sid: AccountSid,
    pub friendly_name: String,
    pub auth_token: String,
    numbers: HashMap<PhoneNumberSid, PhoneNumber>,
    applications: HashMap<ApplicationSid, Application>,
    recordings: HashMap<RecordingSid, Recording>,
    /// Opaque SIP-domain/credential-list pass-through resources (spec §4.7
    /// "SIP-domain & credential CRUD (opaque pass-through for the test
    /// surface)"). Keyed by whatever identifier the REST layer assigns;
    /// the engine never interprets their contents.
    sip_resources: HashMap<String, serde_json::Value>,
}

impl Account {
    pub fn new(friendly_name: impl Into<String>) -> Self {
        Account {
            sid: AccountSid::generate(),
            friendly_name: friendly_name.into(),
            auth_token: crate::ids::generate_auth_token(),
            numbers: HashMap::new(),
            applications: HashMap::new(),
            recordings: HashMap::new(),
            sip_resources: HashMap::new(),
        }
    }

    pub fn create_application(
        &mut self,
        friendly_name: impl Into<String>,
        voice_url: String,
        voice_method: HttpMethod,
        status_callback: Option<String>,
        status_callback_method: HttpMethod,
    ) -> ApplicationSid {
        let sid = ApplicationSid::generate();
        self.applications.insert(
            sid.clone(),
            Application {
                sid: sid.clone(),
                friendly_name: friendly_name.into(),
                voice_url,
                voice_method,
                status_callback,
                status_callback_method,
            },
        );
        sid
    }

    pub fn get_application(&self, sid: &ApplicationSid) -> Option<&Application> {
        self.applications.get(sid)
    }

    pub fn applications(&self) -> impl Iterator<Item = &Application> {
        self.applications.values()
    }

    pub fn create_incoming_phone_number(
        &mut self,
        phone_number: impl Into<String>,
        application_sid: Option<ApplicationSid>,
    ) -> PhoneNumberSid {
        let sid = PhoneNumberSid::generate();
        self.numbers.insert(
            sid.clone(),
            PhoneNumber {
                sid: sid.clone(),
                phone_number: phone_number.into(),
                application_sid,
            },
        );
        sid
    }

    pub fn numbers(&self) -> impl Iterator<Item = &PhoneNumber> {
        self.numbers.values()
    }

    pub fn get_number(&self, sid: &PhoneNumberSid) -> Option<&PhoneNumber> {
        self.numbers.get(sid)
    }

    /// Re-points a provisioned number at a (possibly different)
    /// application (spec §4.7 `UpdateIncomingPhoneNumber`).
    pub fn update_incoming_phone_number(
        &mut self,
        sid: &PhoneNumberSid,
        application_sid: Option<ApplicationSid>,
    ) -> EngineResult<()> {
        let number = self
            .numbers
            .get_mut(sid)
            .ok_or_else(|| EngineError::not_found(format!("phone number {sid}")))?;
        number.application_sid = application_sid;
        Ok(())
    }

    pub fn delete_incoming_phone_number(&mut self, sid: &PhoneNumberSid) -> EngineResult<()> {
        self.numbers
            .remove(sid)
            .map(|_| ())
            .ok_or_else(|| EngineError::not_found(format!("phone number {sid}")))
    }

    /// Resolves an inbound call's dialed number to the application that
    /// should answer it (spec §3 "A provisioned number is associated with
    /// at most one application; inbound calls to that number route to that
    /// application's voice URL").
    pub fn resolve_inbound(&self, to: &str) -> EngineResult<&Application> {
        let number = self
            .numbers
            .values()
            .find(|n| n.phone_number == to)
            .ok_or_else(|| EngineError::not_found(format!("phone number {to}")))?;
        let app_sid = number
            .application_sid
            .as_ref()
            .ok_or_else(|| EngineError::precondition(format!("{to} has no application")))?;
        self.applications
            .get(app_sid)
            .ok_or_else(|| EngineError::not_found(format!("application {app_sid}")))
    }

    pub fn create_recording(&mut self, call_sid: crate::ids::CallSid, now: Duration) -> RecordingSid {
        let sid = RecordingSid::generate();
        self.recordings.insert(
            sid.clone(),
            Recording {
                sid: sid.clone(),
                call_sid,
                file_path: None,
                duration_secs: None,
                created_at: now,
            },
        );
        sid
    }

    pub fn get_recording(&self, sid: &RecordingSid) -> Option<&Recording> {
        self.recordings.get(sid)
    }

    pub fn recordings(&self) -> impl Iterator<Item = &Recording> {
        self.recordings.values()
    }

    /// Injects a file path and duration into an existing recording (spec
    /// §4.7 `SetCallRecording`/`SetCallVoicemail`).
    pub fn set_recording_content(
        &mut self,
        sid: &RecordingSid,
        file_path: impl Into<String>,
        duration_secs: u32,
    ) -> EngineResult<()> {
        let recording = self
            .recordings
            .get_mut(sid)
            .ok_or_else(|| EngineError::not_found(format!("recording {sid}")))?;
        recording.file_path = Some(file_path.into());
        recording.duration_secs = Some(duration_secs);
        Ok(())
    }

    pub fn put_sip_resource(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.sip_resources.insert(key.into(), value);
    }

    pub fn get_sip_resource(&self, key: &str) -> Option<&serde_json::Value> {
        self.sip_resources.get(key)
    }

    pub fn delete_sip_resource(&mut self, key: &str) -> EngineResult<()> {
        self.sip_resources
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| EngineError::not_found(format!("sip resource {key}")))
    }

    pub fn sip_resources(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.sip_resources.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_number_resolves_to_its_application() {
        let mut account = Account::new("test");
        let app_sid = account.create_application(
            "ivr",
            "http://app/voice".to_string(),
            HttpMethod::Post,
            None,
            HttpMethod::Post,
        );
        account.create_incoming_phone_number("+15551110000", Some(app_sid.clone()));

        let app = account.resolve_inbound("+15551110000").unwrap();
        assert_eq!(app.sid, app_sid);
        assert_eq!(app.voice_url, "http://app/voice");
    }

    #[test]
    fn unprovisioned_number_is_not_found() {
        let account = Account::new("test");
        assert!(matches!(
            account.resolve_inbound("+15559990000"),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn number_with_no_application_is_precondition_failed() {
        let mut account = Account::new("test");
        account.create_incoming_phone_number("+15551110000", None);
        assert!(matches!(
            account.resolve_inbound("+15551110000"),
            Err(EngineError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn set_recording_content_updates_existing_recording() {
        let mut account = Account::new("test");
        let call_sid = crate::ids::CallSid::generate();
        let rec_sid = account.create_recording(call_sid, Duration::ZERO);
        account.set_recording_content(&rec_sid, "/tmp/vm.wav", 12).unwrap();
        let rec = account.get_recording(&rec_sid).unwrap();
        assert_eq!(rec.file_path.as_deref(), Some("/tmp/vm.wav"));
        assert_eq!(rec.duration_secs, Some(12));
    }
}
