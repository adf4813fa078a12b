//! Parsers for `pjsip show history` output.
//!
//! Two text forms are consumed. The list form, one line per entry:
//! ```text
//! 00123 1770969579 * <== 192.168.1.1:5060     INVITE sip:1001@pbx SIP/2.0
//! 00124 1770969579 * ==> 192.168.1.1:5060     SIP/2.0 200 OK
//! ```
//! and the detail form for a single entry, a header line followed by the raw
//! SIP message:
//! ```text
//! <--- History Entry 0 Received from 192.168.1.1:5060 at 1770969579 --->
//! INVITE sip:1001@pbx SIP/2.0
//! Call-ID: abc123
//! ...
//! ```
//! Both parsers are lenient: lines that do not fit are skipped and a missing
//! detail header degrades to defaults. The only hard failure for a detail
//! body is a message without a Call-ID.

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::error::EntryError;
use crate::models::sip_message::{Direction, SipMessage};
use crate::traits::transport::CommandResponse;

static HISTORY_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{5,})\s+(\d+)\s+(?:\*\s+)?(\S+)\s+(\S+)\s+(.+)$").expect("history line pattern")
});

static ENTRY_HEADER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:<---\s*)?History Entry\s+\d+\s+(Received|Sent|Transmitted)\s+(?:from|to)\s+(\S+)\s+at\s+(\d+)",
    )
    .expect("history entry header pattern")
});

static CALL_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^(?:Call-ID|i)[ \t]*:[ \t]*(.+)$").expect("Call-ID header pattern"));
static FROM_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^(?:From|f)[ \t]*:[ \t]*(.+)$").expect("From header pattern"));
static TO_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^(?:To|t)[ \t]*:[ \t]*(.+)$").expect("To header pattern"));
static CSEQ_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^CSeq[ \t]*:[ \t]*(.+)$").expect("CSeq header pattern"));

/// One line of the history list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub number: u32,
    pub epoch: i64,
    /// `<==` (received), `==>` (sent) or whatever marker the PBX printed.
    pub direction_marker: String,
    pub remote_addr: String,
    pub summary: String,
}

/// Flatten a manager command reply into newline-joined text.
///
/// Accepts a bare string, an object with the text under `Output` (or under
/// `content` when `Output` is missing or empty), each holding a string or a
/// list of lines, or a list of any of those.
pub fn extract_command_output(response: &CommandResponse) -> String {
    let items = match response {
        serde_json::Value::Array(items) => items.as_slice(),
        other => std::slice::from_ref(other),
    };

    let mut parts = Vec::new();
    for item in items {
        match item {
            serde_json::Value::String(s) => parts.push(s.clone()),
            serde_json::Value::Object(map) => {
                let output = map.get("Output").filter(|v| !is_blank(v));
                if let Some(text) = output.or_else(|| map.get("content")) {
                    push_text(&mut parts, text);
                }
            }
            _ => {}
        }
    }
    parts.join("\n")
}

fn is_blank(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn push_text(parts: &mut Vec<String>, value: &serde_json::Value) {
    match value {
        serde_json::Value::Null => {}
        serde_json::Value::String(s) if s.is_empty() => {}
        serde_json::Value::String(s) => parts.push(s.clone()),
        serde_json::Value::Array(lines) => {
            for line in lines {
                match line {
                    serde_json::Value::String(s) => parts.push(s.clone()),
                    other => parts.push(other.to_string()),
                }
            }
        }
        other => parts.push(other.to_string()),
    }
}

/// Parse a single list line. Returns `None` for headers, separators and noise.
pub fn parse_history_line(line: &str) -> Option<HistoryEntry> {
    let caps = HISTORY_LINE_REGEX.captures(line.trim())?;
    Some(HistoryEntry {
        number: caps[1].parse().ok()?,
        epoch: caps[2].parse().ok()?,
        direction_marker: caps[3].to_string(),
        remote_addr: caps[4].to_string(),
        summary: caps[5].trim().to_string(),
    })
}

/// Parse every recognizable entry of a history listing, in listing order.
pub fn parse_history_list(output: &str) -> Vec<HistoryEntry> {
    output.lines().filter_map(parse_history_line).collect()
}

/// Build a message from the output of `pjsip show history entry N`.
///
/// `now` stands in for the timestamp when the header is missing or its
/// epoch is not representable.
pub fn parse_entry_detail(output: &str, now: DateTime<Utc>) -> Result<SipMessage, EntryError> {
    let trimmed = output.trim();
    let lines: Vec<&str> = trimmed.lines().collect();

    let header = lines
        .iter()
        .enumerate()
        .find_map(|(i, line)| ENTRY_HEADER_REGEX.captures(line.trim()).map(|caps| (i, caps)));

    let (direction, remote_addr, timestamp, raw_text) = match header {
        Some((idx, caps)) => {
            let direction = if &caps[1] == "Received" {
                Direction::Received
            } else {
                Direction::Sent
            };
            let timestamp = caps[3]
                .parse::<i64>()
                .ok()
                .and_then(|epoch| Utc.timestamp_opt(epoch, 0).single())
                .unwrap_or(now);
            let raw_text = lines[idx + 1..].join("\n").trim().to_string();
            (direction, caps[2].to_string(), timestamp, raw_text)
        }
        None => (Direction::Received, String::new(), now, trimmed.to_string()),
    };

    if raw_text.is_empty() {
        return Err(EntryError::EmptyBody);
    }

    let (method, status_code) = classify_start_line(raw_text.lines().next().unwrap_or_default());

    let call_id = header_value(&CALL_ID_REGEX, &raw_text);
    if call_id.is_empty() {
        return Err(EntryError::MissingCallId);
    }

    Ok(SipMessage {
        timestamp,
        direction,
        method,
        status_code,
        call_id,
        from_header: header_value(&FROM_REGEX, &raw_text),
        to_header: header_value(&TO_REGEX, &raw_text),
        cseq: header_value(&CSEQ_REGEX, &raw_text),
        raw_text,
        remote_addr,
    })
}

/// Split a SIP start line into (method, status code).
///
/// Responses yield an empty method; an unparseable status stays 0.
fn classify_start_line(line: &str) -> (String, u16) {
    let line = line.trim();
    let mut tokens = line.split_whitespace();
    if line.starts_with("SIP/") {
        let status = tokens.nth(1).and_then(|t| t.parse().ok()).unwrap_or(0);
        (String::new(), status)
    } else {
        (tokens.next().unwrap_or_default().to_string(), 0)
    }
}

fn header_value(regex: &Regex, text: &str) -> String {
    regex
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_default()
}
