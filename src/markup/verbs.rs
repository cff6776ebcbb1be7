use serde::{Deserialize, Serialize};

/// GET or POST, case-insensitively accepted and normalized to upper on parse
/// (spec §4.3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
}

impl Default for HttpMethod {
    fn default() -> Self {
        HttpMethod::Post
    }
}

impl HttpMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// The root of a fetched markup document (spec §4.3).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VoiceResponse {
    pub verbs: Vec<Verb>,
}

/// A single voice-markup verb. Deliberately a tagged sum rather than a
/// class hierarchy (spec §9 "Polymorphic markup tree").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Verb {
    Say(Say),
    Play(Play),
    Pause(Pause),
    Gather(Gather),
    Dial(Dial),
    Enqueue(Enqueue),
    Redirect(Redirect),
    Hangup,
    Record(Record),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Say {
    pub text: String,
    pub voice: Option<String>,
    pub language: Option<String>,
    pub loop_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Play {
    pub url: String,
    pub loop_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pause {
    pub length_secs: u32,
}

impl Default for Pause {
    fn default() -> Self {
        Pause { length_secs: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GatherInput {
    Dtmf,
    Speech,
    DtmfSpeech,
}

/// A prompt played while a Gather awaits input — only Say/Play/Pause are
/// legal children (spec §4.3).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Prompt {
    Say(Say),
    Play(Play),
    Pause(Pause),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gather {
    pub input: GatherInput,
    pub action: Option<String>,
    pub method: HttpMethod,
    pub timeout_secs: u32,
    pub finish_on_key: String,
    pub num_digits: Option<u32>,
    pub prompts: Vec<Prompt>,
}

/// `record` on `<Dial>` (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DialRecord {
    DoNotRecord,
    RecordFromAnswer,
    RecordFromRinging,
    RecordFromAnswerDual,
    RecordFromRingingDual,
}

impl Default for DialRecord {
    fn default() -> Self {
        DialRecord::DoNotRecord
    }
}

impl DialRecord {
    pub fn is_recording(&self) -> bool {
        !matches!(self, DialRecord::DoNotRecord)
    }

    /// Accepts the canonical values plus the legacy booleans (spec §4.3:
    /// `true`→record-from-answer, `false`→do-not-record).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "do-not-record" => Some(DialRecord::DoNotRecord),
            "record-from-answer" => Some(DialRecord::RecordFromAnswer),
            "record-from-ringing" => Some(DialRecord::RecordFromRinging),
            "record-from-answer-dual" => Some(DialRecord::RecordFromAnswerDual),
            "record-from-ringing-dual" => Some(DialRecord::RecordFromRingingDual),
            "true" => Some(DialRecord::RecordFromAnswer),
            "false" => Some(DialRecord::DoNotRecord),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConferenceNoun {
    pub name: String,
    pub muted: bool,
    pub start_conference_on_enter: bool,
    pub end_conference_on_exit: bool,
    pub beep: bool,
    pub status_callback: Option<String>,
    pub status_callback_method: HttpMethod,
    /// Subset of `start`, `end`, `join`, `leave`, `mute`, `hold`.
    pub status_callback_event: Vec<String>,
    pub wait_url: Option<String>,
    pub wait_method: HttpMethod,
    pub record: DialRecord,
    pub recording_status_callback: Option<String>,
}

impl Default for ConferenceNoun {
    fn default() -> Self {
        ConferenceNoun {
            name: String::new(),
            muted: false,
            start_conference_on_enter: true,
            end_conference_on_exit: false,
            beep: true,
            status_callback: None,
            status_callback_method: HttpMethod::Post,
            status_callback_event: Vec::new(),
            wait_url: None,
            wait_method: HttpMethod::Post,
            record: DialRecord::DoNotRecord,
            recording_status_callback: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueNoun {
    pub name: String,
    pub url: Option<String>,
    pub method: HttpMethod,
    pub reservation_sid: Option<String>,
}

/// One child of `<Dial>` — a heterogeneous ordered sequence (spec §4.3).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DialNoun {
    Number(String),
    Sip(String),
    Client(String),
    Queue(QueueNoun),
    Conference(ConferenceNoun),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dial {
    pub action: Option<String>,
    pub method: HttpMethod,
    pub timeout_secs: u32,
    pub record: DialRecord,
    pub children: Vec<DialNoun>,
}

impl Default for Dial {
    fn default() -> Self {
        Dial {
            action: None,
            method: HttpMethod::Post,
            timeout_secs: 30,
            record: DialRecord::DoNotRecord,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enqueue {
    pub name: String,
    pub action: Option<String>,
    pub method: HttpMethod,
    pub wait_url: Option<String>,
    pub wait_method: HttpMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Redirect {
    pub url: String,
    pub method: HttpMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub action: Option<String>,
    pub method: HttpMethod,
    pub max_length_secs: u32,
    pub play_beep: bool,
    pub timeout_secs: u32,
    pub transcribe: bool,
    pub finish_on_key: String,
}

impl Default for Record {
    fn default() -> Self {
        Record {
            action: None,
            method: HttpMethod::Post,
            max_length_secs: 3600,
            play_beep: true,
            timeout_secs: 5,
            transcribe: false,
            finish_on_key: "#".to_string(),
        }
    }
}
