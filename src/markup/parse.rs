use std::collections::HashMap;

use xml::reader::{EventReader, XmlEvent};

use super::error::{MarkupError, MarkupResult};
use super::verbs::*;

/// A flattened, attribute-validated element: its tag, its attribute map, and
/// its direct children (recursively the same shape), with any text content
/// collected alongside.
struct Element {
    name: String,
    attrs: HashMap<String, String>,
    text: String,
    children: Vec<Element>,
}

/// Parses a complete `<Response>` document into a verb tree, hard-erroring
/// on any unknown verb or attribute (spec §4.3).
pub fn parse_voice_response(xml: &str) -> MarkupResult<VoiceResponse> {
    let root = parse_tree(xml)?;
    if root.name != "Response" {
        return Err(MarkupError::WrongRoot(root.name));
    }
    let verbs = root
        .children
        .iter()
        .map(parse_verb)
        .collect::<MarkupResult<Vec<_>>>()?;
    Ok(VoiceResponse { verbs })
}

/// Builds the raw element tree from the XML event stream. This stage does
/// not know about verb semantics — it only groups start/end/characters
/// events into a tree so the verb-level parser can work with recursion
/// instead of a manual event cursor.
fn parse_tree(xml: &str) -> MarkupResult<Element> {
    let reader = EventReader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    for event in reader {
        match event.map_err(|e| MarkupError::Malformed(e.to_string()))? {
            XmlEvent::StartElement {
                name, attributes, ..
            } => {
                let attrs = attributes
                    .into_iter()
                    .map(|a| (a.name.local_name, a.value))
                    .collect();
                stack.push(Element {
                    name: name.local_name,
                    attrs,
                    text: String::new(),
                    children: Vec::new(),
                });
            }
            XmlEvent::Characters(s) | XmlEvent::CData(s) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&s);
                }
            }
            XmlEvent::EndElement { .. } => {
                let finished = stack
                    .pop()
                    .ok_or_else(|| MarkupError::Malformed("unbalanced end tag".to_string()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(finished),
                    None => root = Some(finished),
                }
            }
            _ => {}
        }
    }

    root.ok_or_else(|| MarkupError::Malformed("empty document".to_string()))
}

fn take_attr(el: &Element, key: &str) -> Option<String> {
    el.attrs.get(key).cloned()
}

/// Hard-errors if `el` carries any attribute outside `allowed`.
fn check_known_attrs(el: &Element, allowed: &[&str]) -> MarkupResult<()> {
    for key in el.attrs.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(MarkupError::UnknownAttribute {
                verb: el.name.clone(),
                attr: key.clone(),
            });
        }
    }
    Ok(())
}

fn parse_method(el: &Element, attr: &str, default: HttpMethod) -> MarkupResult<HttpMethod> {
    match take_attr(el, attr) {
        None => Ok(default),
        Some(v) => HttpMethod::parse(&v).ok_or_else(|| MarkupError::InvalidAttributeValue {
            verb: el.name.clone(),
            attr: attr.to_string(),
            value: v,
        }),
    }
}

fn parse_bool(el: &Element, attr: &str, default: bool) -> MarkupResult<bool> {
    match take_attr(el, attr) {
        None => Ok(default),
        Some(v) if v == "true" => Ok(true),
        Some(v) if v == "false" => Ok(false),
        Some(v) => Err(MarkupError::InvalidAttributeValue {
            verb: el.name.clone(),
            attr: attr.to_string(),
            value: v,
        }),
    }
}

fn parse_u32(el: &Element, attr: &str, default: u32) -> MarkupResult<u32> {
    match take_attr(el, attr) {
        None => Ok(default),
        Some(v) => v.parse::<u32>().map_err(|_| MarkupError::InvalidAttributeValue {
            verb: el.name.clone(),
            attr: attr.to_string(),
            value: v,
        }),
    }
}

fn parse_verb(el: &Element) -> MarkupResult<Verb> {
    match el.name.as_str() {
        "Say" => Ok(Verb::Say(parse_say(el)?)),
        "Play" => Ok(Verb::Play(parse_play(el)?)),
        "Pause" => Ok(Verb::Pause(parse_pause(el)?)),
        "Gather" => Ok(Verb::Gather(parse_gather(el)?)),
        "Dial" => Ok(Verb::Dial(parse_dial(el)?)),
        "Enqueue" => Ok(Verb::Enqueue(parse_enqueue(el)?)),
        "Redirect" => Ok(Verb::Redirect(parse_redirect(el)?)),
        "Hangup" => {
            check_known_attrs(el, &[])?;
            Ok(Verb::Hangup)
        }
        "Record" => Ok(Verb::Record(parse_record(el)?)),
        other => Err(MarkupError::UnknownVerb(other.to_string())),
    }
}

fn parse_say(el: &Element) -> MarkupResult<Say> {
    check_known_attrs(el, &["voice", "language", "loop"])?;
    Ok(Say {
        text: el.text.trim().to_string(),
        voice: take_attr(el, "voice"),
        language: take_attr(el, "language"),
        loop_count: parse_u32(el, "loop", 1)?,
    })
}

fn parse_play(el: &Element) -> MarkupResult<Play> {
    check_known_attrs(el, &["loop"])?;
    Ok(Play {
        url: el.text.trim().to_string(),
        loop_count: parse_u32(el, "loop", 1)?,
    })
}

fn parse_pause(el: &Element) -> MarkupResult<Pause> {
    check_known_attrs(el, &["length"])?;
    Ok(Pause {
        length_secs: parse_u32(el, "length", 1)?,
    })
}

fn parse_prompt(el: &Element) -> MarkupResult<Prompt> {
    match el.name.as_str() {
        "Say" => Ok(Prompt::Say(parse_say(el)?)),
        "Play" => Ok(Prompt::Play(parse_play(el)?)),
        "Pause" => Ok(Prompt::Pause(parse_pause(el)?)),
        other => Err(MarkupError::NestedVerbNotAllowed {
            parent: "Gather".to_string(),
            child: other.to_string(),
        }),
    }
}

fn parse_gather(el: &Element) -> MarkupResult<Gather> {
    check_known_attrs(
        el,
        &["input", "action", "method", "timeout", "finishOnKey", "numDigits"],
    )?;

    let input = match take_attr(el, "input").as_deref() {
        None | Some("dtmf") => GatherInput::Dtmf,
        Some("speech") => GatherInput::Speech,
        Some("dtmf speech") | Some("speech dtmf") => GatherInput::DtmfSpeech,
        Some(other) => {
            return Err(MarkupError::InvalidAttributeValue {
                verb: "Gather".to_string(),
                attr: "input".to_string(),
                value: other.to_string(),
            })
        }
    };

    let finish_on_key = take_attr(el, "finishOnKey").unwrap_or_else(|| "#".to_string());
    validate_finish_on_key(&finish_on_key)?;

    let num_digits = match take_attr(el, "numDigits") {
        None => None,
        Some(v) => Some(v.parse::<u32>().map_err(|_| MarkupError::InvalidAttributeValue {
            verb: "Gather".to_string(),
            attr: "numDigits".to_string(),
            value: v,
        })?),
    };

    let prompts = el
        .children
        .iter()
        .map(parse_prompt)
        .collect::<MarkupResult<Vec<_>>>()?;

    Ok(Gather {
        input,
        action: take_attr(el, "action"),
        method: parse_method(el, "method", HttpMethod::Post)?,
        timeout_secs: parse_u32(el, "timeout", 5)?,
        finish_on_key,
        num_digits,
        prompts,
    })
}

fn validate_finish_on_key(s: &str) -> MarkupResult<()> {
    let ok = s.is_empty()
        || s == "*"
        || s == "#"
        || (s.len() == 1 && s.chars().next().unwrap().is_ascii_digit());
    if ok {
        Ok(())
    } else {
        Err(MarkupError::InvalidAttributeValue {
            verb: "Gather".to_string(),
            attr: "finishOnKey".to_string(),
            value: s.to_string(),
        })
    }
}

fn parse_dial(el: &Element) -> MarkupResult<Dial> {
    check_known_attrs(el, &["action", "method", "timeout", "record"])?;

    let record = match take_attr(el, "record") {
        None => DialRecord::DoNotRecord,
        Some(v) => DialRecord::parse(&v).ok_or_else(|| MarkupError::InvalidAttributeValue {
            verb: "Dial".to_string(),
            attr: "record".to_string(),
            value: v,
        })?,
    };

    // A bare <Dial>number</Dial> with no nested nouns is shorthand for a
    // single <Number>. We special-case it here rather than in the tree
    // stage so unknown attribute checks above already ran.
    let children = if el.children.is_empty() && !el.text.trim().is_empty() {
        vec![DialNoun::Number(el.text.trim().to_string())]
    } else {
        el.children
            .iter()
            .map(parse_dial_noun)
            .collect::<MarkupResult<Vec<_>>>()?
    };

    Ok(Dial {
        action: take_attr(el, "action"),
        method: parse_method(el, "method", HttpMethod::Post)?,
        timeout_secs: parse_u32(el, "timeout", 30)?,
        record,
        children,
    })
}

fn parse_dial_noun(el: &Element) -> MarkupResult<DialNoun> {
    match el.name.as_str() {
        "Number" => {
            check_known_attrs(el, &[])?;
            Ok(DialNoun::Number(el.text.trim().to_string()))
        }
        "Sip" => {
            check_known_attrs(el, &[])?;
            Ok(DialNoun::Sip(el.text.trim().to_string()))
        }
        "Client" => {
            check_known_attrs(el, &[])?;
            Ok(DialNoun::Client(el.text.trim().to_string()))
        }
        "Queue" => {
            check_known_attrs(el, &["url", "method", "reservationSid"])?;
            Ok(DialNoun::Queue(QueueNoun {
                name: el.text.trim().to_string(),
                url: take_attr(el, "url"),
                method: parse_method(el, "method", HttpMethod::Post)?,
                reservation_sid: take_attr(el, "reservationSid"),
            }))
        }
        "Conference" => {
            check_known_attrs(
                el,
                &[
                    "muted",
                    "startConferenceOnEnter",
                    "endConferenceOnExit",
                    "beep",
                    "statusCallback",
                    "statusCallbackMethod",
                    "statusCallbackEvent",
                    "waitUrl",
                    "waitMethod",
                    "record",
                    "recordingStatusCallback",
                ],
            )?;
            let record = match take_attr(el, "record") {
                None => DialRecord::DoNotRecord,
                Some(v) => {
                    DialRecord::parse(&v).ok_or_else(|| MarkupError::InvalidAttributeValue {
                        verb: "Conference".to_string(),
                        attr: "record".to_string(),
                        value: v,
                    })?
                }
            };
            Ok(DialNoun::Conference(ConferenceNoun {
                name: el.text.trim().to_string(),
                muted: parse_bool(el, "muted", false)?,
                start_conference_on_enter: parse_bool(el, "startConferenceOnEnter", true)?,
                end_conference_on_exit: parse_bool(el, "endConferenceOnExit", false)?,
                beep: parse_bool(el, "beep", true)?,
                status_callback: take_attr(el, "statusCallback"),
                status_callback_method: parse_method(el, "statusCallbackMethod", HttpMethod::Post)?,
                status_callback_event: take_attr(el, "statusCallbackEvent")
                    .map(|s| s.split_whitespace().map(str::to_string).collect())
                    .unwrap_or_default(),
                wait_url: take_attr(el, "waitUrl"),
                wait_method: parse_method(el, "waitMethod", HttpMethod::Post)?,
                record,
                recording_status_callback: take_attr(el, "recordingStatusCallback"),
            }))
        }
        other => Err(MarkupError::NestedVerbNotAllowed {
            parent: "Dial".to_string(),
            child: other.to_string(),
        }),
    }
}

fn parse_enqueue(el: &Element) -> MarkupResult<Enqueue> {
    check_known_attrs(el, &["action", "method", "waitUrl", "waitMethod"])?;
    Ok(Enqueue {
        name: el.text.trim().to_string(),
        action: take_attr(el, "action"),
        method: parse_method(el, "method", HttpMethod::Post)?,
        wait_url: take_attr(el, "waitUrl"),
        wait_method: parse_method(el, "waitMethod", HttpMethod::Post)?,
    })
}

fn parse_redirect(el: &Element) -> MarkupResult<Redirect> {
    check_known_attrs(el, &["method"])?;
    let url = el.text.trim().to_string();
    if url.is_empty() {
        return Err(MarkupError::MissingContent("Redirect".to_string()));
    }
    Ok(Redirect {
        url,
        method: parse_method(el, "method", HttpMethod::Post)?,
    })
}

fn parse_record(el: &Element) -> MarkupResult<Record> {
    check_known_attrs(
        el,
        &[
            "action",
            "method",
            "maxLength",
            "playBeep",
            "timeout",
            "transcribe",
            "finishOnKey",
        ],
    )?;
    let finish_on_key = take_attr(el, "finishOnKey").unwrap_or_else(|| "#".to_string());
    validate_finish_on_key(&finish_on_key)?;
    Ok(Record {
        action: take_attr(el, "action"),
        method: parse_method(el, "method", HttpMethod::Post)?,
        max_length_secs: parse_u32(el, "maxLength", 3600)?,
        play_beep: parse_bool(el, "playBeep", true)?,
        timeout_secs: parse_u32(el, "timeout", 5)?,
        transcribe: parse_bool(el, "transcribe", false)?,
        finish_on_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gather_with_say_prompt() {
        let xml = r#"<Response><Gather numDigits="1" action="http://app/g"><Say>press 1</Say></Gather></Response>"#;
        let resp = parse_voice_response(xml).unwrap();
        assert_eq!(resp.verbs.len(), 1);
        match &resp.verbs[0] {
            Verb::Gather(g) => {
                assert_eq!(g.num_digits, Some(1));
                assert_eq!(g.action.as_deref(), Some("http://app/g"));
                assert_eq!(g.prompts.len(), 1);
                assert!(matches!(&g.prompts[0], Prompt::Say(s) if s.text == "press 1"));
            }
            other => panic!("expected Gather, got {other:?}"),
        }
    }

    #[test]
    fn unknown_verb_is_hard_error() {
        let xml = r#"<Response><Frobnicate/></Response>"#;
        let err = parse_voice_response(xml).unwrap_err();
        assert_eq!(err, MarkupError::UnknownVerb("Frobnicate".to_string()));
    }

    #[test]
    fn unknown_attribute_is_hard_error() {
        let xml = r#"<Response><Pause duration="5"/></Response>"#;
        let err = parse_voice_response(xml).unwrap_err();
        assert_eq!(
            err,
            MarkupError::UnknownAttribute {
                verb: "Pause".to_string(),
                attr: "duration".to_string()
            }
        );
    }

    #[test]
    fn dial_with_queue_and_conference_nouns() {
        let xml = r#"<Response><Dial timeout="10"><Queue>support</Queue></Dial></Response>"#;
        let resp = parse_voice_response(xml).unwrap();
        match &resp.verbs[0] {
            Verb::Dial(d) => {
                assert_eq!(d.timeout_secs, 10);
                assert_eq!(d.children.len(), 1);
                assert!(matches!(&d.children[0], DialNoun::Queue(q) if q.name == "support"));
            }
            other => panic!("expected Dial, got {other:?}"),
        }
    }

    #[test]
    fn dial_conference_parses_status_callback_events() {
        let xml = r#"<Response><Dial><Conference statusCallback="http://cb" statusCallbackEvent="start end join leave" endConferenceOnExit="false">room-1</Conference></Dial></Response>"#;
        let resp = parse_voice_response(xml).unwrap();
        match &resp.verbs[0] {
            Verb::Dial(d) => match &d.children[0] {
                DialNoun::Conference(c) => {
                    assert_eq!(c.name, "room-1");
                    assert_eq!(c.status_callback_event, vec!["start", "end", "join", "leave"]);
                    assert!(!c.end_conference_on_exit);
                }
                other => panic!("expected Conference, got {other:?}"),
            },
            other => panic!("expected Dial, got {other:?}"),
        }
    }

    #[test]
    fn defaults_are_applied() {
        let xml = r#"<Response><Pause/><Record/></Response>"#;
        let resp = parse_voice_response(xml).unwrap();
        assert!(matches!(&resp.verbs[0], Verb::Pause(p) if p.length_secs == 1));
        assert!(matches!(&resp.verbs[1], Verb::Record(r) if r.max_length_secs == 3600 && r.play_beep));
    }

    #[test]
    fn legacy_record_booleans_on_dial() {
        let xml = r#"<Response><Dial record="true"><Number>+15551234567</Number></Dial></Response>"#;
        let resp = parse_voice_response(xml).unwrap();
        assert!(matches!(&resp.verbs[0], Verb::Dial(d) if d.record == DialRecord::RecordFromAnswer));
    }

    #[test]
    fn invalid_finish_on_key_rejected() {
        let xml = r#"<Response><Gather finishOnKey="ab"><Say>hi</Say></Gather></Response>"#;
        assert!(parse_voice_response(xml).is_err());
    }

    #[test]
    fn invalid_dial_record_value_is_hard_error() {
        let xml = r#"<Response><Dial record="maybe"><Number>+1</Number></Dial></Response>"#;
        assert!(parse_voice_response(xml).is_err());
    }

    #[test]
    fn non_prompt_verb_inside_gather_is_rejected() {
        let xml = r#"<Response><Gather><Dial><Number>+1</Number></Dial></Gather></Response>"#;
        let err = parse_voice_response(xml).unwrap_err();
        assert_eq!(
            err,
            MarkupError::NestedVerbNotAllowed {
                parent: "Gather".to_string(),
                child: "Dial".to_string()
            }
        );
    }
}
