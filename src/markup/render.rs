use std::io::Write;

use xml::writer::{EventWriter, XmlEvent};

use super::error::MarkupResult;
use super::verbs::*;

/// Renders a verb tree back to XML. Grounded on the teacher pack's TwiML
/// writer (`rwxbytes-rusty_twilio/src/twiml/voice.rs`), which builds an
/// `xml::writer::EventWriter` verb by verb rather than templating strings.
pub fn render_voice_response(resp: &VoiceResponse) -> MarkupResult<String> {
    let buffer = Vec::new();
    let mut writer = EventWriter::new(buffer);
    writer.write(XmlEvent::start_element("Response"))?;
    for verb in &resp.verbs {
        write_verb(&mut writer, verb)?;
    }
    writer.write(XmlEvent::end_element().name("Response"))?;
    Ok(String::from_utf8(writer.into_inner()).expect("xml writer only emits valid utf-8"))
}

fn write_verb<W: Write>(writer: &mut EventWriter<W>, verb: &Verb) -> MarkupResult<()> {
    match verb {
        Verb::Say(s) => write_say(writer, s),
        Verb::Play(p) => write_play(writer, p),
        Verb::Pause(p) => write_pause(writer, p),
        Verb::Gather(g) => write_gather(writer, g),
        Verb::Dial(d) => write_dial(writer, d),
        Verb::Enqueue(e) => write_enqueue(writer, e),
        Verb::Redirect(r) => write_redirect(writer, r),
        Verb::Hangup => {
            writer.write(XmlEvent::start_element("Hangup"))?;
            writer.write(XmlEvent::end_element().name("Hangup"))?;
            Ok(())
        }
        Verb::Record(r) => write_record(writer, r),
    }
}

fn write_say<W: Write>(writer: &mut EventWriter<W>, s: &Say) -> MarkupResult<()> {
    let loop_str = s.loop_count.to_string();
    let mut el = XmlEvent::start_element("Say").attr("loop", &loop_str);
    if let Some(v) = &s.voice {
        el = el.attr("voice", v);
    }
    if let Some(l) = &s.language {
        el = el.attr("language", l);
    }
    writer.write(el)?;
    writer.write(XmlEvent::characters(&s.text))?;
    writer.write(XmlEvent::end_element().name("Say"))?;
    Ok(())
}

fn write_play<W: Write>(writer: &mut EventWriter<W>, p: &Play) -> MarkupResult<()> {
    let loop_str = p.loop_count.to_string();
    writer.write(XmlEvent::start_element("Play").attr("loop", &loop_str))?;
    writer.write(XmlEvent::characters(&p.url))?;
    writer.write(XmlEvent::end_element().name("Play"))?;
    Ok(())
}

fn write_pause<W: Write>(writer: &mut EventWriter<W>, p: &Pause) -> MarkupResult<()> {
    let len = p.length_secs.to_string();
    writer.write(XmlEvent::start_element("Pause").attr("length", &len))?;
    writer.write(XmlEvent::end_element().name("Pause"))?;
    Ok(())
}

fn write_prompt<W: Write>(writer: &mut EventWriter<W>, prompt: &Prompt) -> MarkupResult<()> {
    match prompt {
        Prompt::Say(s) => write_say(writer, s),
        Prompt::Play(p) => write_play(writer, p),
        Prompt::Pause(p) => write_pause(writer, p),
    }
}

fn write_gather<W: Write>(writer: &mut EventWriter<W>, g: &Gather) -> MarkupResult<()> {
    let input = match g.input {
        GatherInput::Dtmf => "dtmf",
        GatherInput::Speech => "speech",
        GatherInput::DtmfSpeech => "dtmf speech",
    };
    let timeout = g.timeout_secs.to_string();
    let num_digits = g.num_digits.map(|n| n.to_string());
    let mut el = XmlEvent::start_element("Gather")
        .attr("input", input)
        .attr("method", g.method.as_str())
        .attr("timeout", &timeout)
        .attr("finishOnKey", &g.finish_on_key);
    if let Some(a) = &g.action {
        el = el.attr("action", a);
    }
    if let Some(n) = &num_digits {
        el = el.attr("numDigits", n);
    }
    writer.write(el)?;
    for prompt in &g.prompts {
        write_prompt(writer, prompt)?;
    }
    writer.write(XmlEvent::end_element().name("Gather"))?;
    Ok(())
}

fn dial_record_str(r: DialRecord) -> &'static str {
    match r {
        DialRecord::DoNotRecord => "do-not-record",
        DialRecord::RecordFromAnswer => "record-from-answer",
        DialRecord::RecordFromRinging => "record-from-ringing",
        DialRecord::RecordFromAnswerDual => "record-from-answer-dual",
        DialRecord::RecordFromRingingDual => "record-from-ringing-dual",
    }
}

fn write_dial<W: Write>(writer: &mut EventWriter<W>, d: &Dial) -> MarkupResult<()> {
    let timeout = d.timeout_secs.to_string();
    let mut el = XmlEvent::start_element("Dial")
        .attr("method", d.method.as_str())
        .attr("timeout", &timeout)
        .attr("record", dial_record_str(d.record));
    if let Some(a) = &d.action {
        el = el.attr("action", a);
    }
    writer.write(el)?;
    for child in &d.children {
        write_dial_noun(writer, child)?;
    }
    writer.write(XmlEvent::end_element().name("Dial"))?;
    Ok(())
}

fn write_dial_noun<W: Write>(writer: &mut EventWriter<W>, noun: &DialNoun) -> MarkupResult<()> {
    match noun {
        DialNoun::Number(n) => {
            writer.write(XmlEvent::start_element("Number"))?;
            writer.write(XmlEvent::characters(n))?;
            writer.write(XmlEvent::end_element().name("Number"))?;
        }
        DialNoun::Sip(s) => {
            writer.write(XmlEvent::start_element("Sip"))?;
            writer.write(XmlEvent::characters(s))?;
            writer.write(XmlEvent::end_element().name("Sip"))?;
        }
        DialNoun::Client(c) => {
            writer.write(XmlEvent::start_element("Client"))?;
            writer.write(XmlEvent::characters(c))?;
            writer.write(XmlEvent::end_element().name("Client"))?;
        }
        DialNoun::Queue(q) => {
            let mut el = XmlEvent::start_element("Queue").attr("method", q.method.as_str());
            if let Some(u) = &q.url {
                el = el.attr("url", u);
            }
            if let Some(r) = &q.reservation_sid {
                el = el.attr("reservationSid", r);
            }
            writer.write(el)?;
            writer.write(XmlEvent::characters(&q.name))?;
            writer.write(XmlEvent::end_element().name("Queue"))?;
        }
        DialNoun::Conference(c) => {
            let events = c.status_callback_event.join(" ");
            let mut el = XmlEvent::start_element("Conference")
                .attr("muted", bool_str(c.muted))
                .attr("startConferenceOnEnter", bool_str(c.start_conference_on_enter))
                .attr("endConferenceOnExit", bool_str(c.end_conference_on_exit))
                .attr("beep", bool_str(c.beep))
                .attr("waitMethod", c.wait_method.as_str())
                .attr("record", dial_record_str(c.record));
            if let Some(cb) = &c.status_callback {
                el = el.attr("statusCallback", cb);
            }
            if !events.is_empty() {
                el = el.attr("statusCallbackEvent", &events);
            }
            if let Some(w) = &c.wait_url {
                el = el.attr("waitUrl", w);
            }
            if let Some(rc) = &c.recording_status_callback {
                el = el.attr("recordingStatusCallback", rc);
            }
            writer.write(el)?;
            writer.write(XmlEvent::characters(&c.name))?;
            writer.write(XmlEvent::end_element().name("Conference"))?;
        }
    }
    Ok(())
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

fn write_enqueue<W: Write>(writer: &mut EventWriter<W>, e: &Enqueue) -> MarkupResult<()> {
    let mut el = XmlEvent::start_element("Enqueue")
        .attr("method", e.method.as_str())
        .attr("waitMethod", e.wait_method.as_str());
    if let Some(a) = &e.action {
        el = el.attr("action", a);
    }
    if let Some(w) = &e.wait_url {
        el = el.attr("waitUrl", w);
    }
    writer.write(el)?;
    writer.write(XmlEvent::characters(&e.name))?;
    writer.write(XmlEvent::end_element().name("Enqueue"))?;
    Ok(())
}

fn write_redirect<W: Write>(writer: &mut EventWriter<W>, r: &Redirect) -> MarkupResult<()> {
    writer.write(XmlEvent::start_element("Redirect").attr("method", r.method.as_str()))?;
    writer.write(XmlEvent::characters(&r.url))?;
    writer.write(XmlEvent::end_element().name("Redirect"))?;
    Ok(())
}

fn write_record<W: Write>(writer: &mut EventWriter<W>, r: &Record) -> MarkupResult<()> {
    let max_length = r.max_length_secs.to_string();
    let timeout = r.timeout_secs.to_string();
    let mut el = XmlEvent::start_element("Record")
        .attr("method", r.method.as_str())
        .attr("maxLength", &max_length)
        .attr("playBeep", bool_str(r.play_beep))
        .attr("timeout", &timeout)
        .attr("transcribe", bool_str(r.transcribe))
        .attr("finishOnKey", &r.finish_on_key);
    if let Some(a) = &r.action {
        el = el.attr("action", a);
    }
    writer.write(el)?;
    writer.write(XmlEvent::end_element().name("Record"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::parse::parse_voice_response;
    use super::*;

    #[test]
    fn render_then_parse_round_trips() {
        let resp = VoiceResponse {
            verbs: vec![
                Verb::Say(Say {
                    text: "hello".to_string(),
                    voice: Some("alice".to_string()),
                    language: None,
                    loop_count: 1,
                }),
                Verb::Pause(Pause { length_secs: 2 }),
                Verb::Hangup,
            ],
        };
        let xml = render_voice_response(&resp).unwrap();
        let parsed = parse_voice_response(&xml).unwrap();
        assert_eq!(parsed, resp);
    }

    #[test]
    fn render_gather_then_parse_round_trips() {
        let resp = VoiceResponse {
            verbs: vec![Verb::Gather(Gather {
                input: GatherInput::Dtmf,
                action: Some("http://app/g".to_string()),
                method: HttpMethod::Post,
                timeout_secs: 5,
                finish_on_key: "#".to_string(),
                num_digits: Some(1),
                prompts: vec![Prompt::Say(Say {
                    text: "press 1".to_string(),
                    voice: None,
                    language: None,
                    loop_count: 1,
                })],
            })],
        };
        let xml = render_voice_response(&resp).unwrap();
        let parsed = parse_voice_response(&xml).unwrap();
        assert_eq!(parsed, resp);
    }
}
