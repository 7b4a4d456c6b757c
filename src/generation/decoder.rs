//! Recovery of structured payloads from free-form model output.
//!
//! Models are asked to answer with base64-encoded JSON, but in practice they
//! also return fenced JSON, JSON surrounded by prose, or JSON whose string
//! values contain raw newlines. [`RecoveryChain`] yields every structured value
//! it can salvage, most robust interpretation first, and [`decode_with`] keeps
//! the first one the caller accepts.

use super::validator::ValidationError;
use crate::{Error, Result};
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use regex::Regex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::OnceLock;
use tracing::debug;

/// Shortest standalone token treated as a base64 payload.
const MIN_BASE64_LEN: usize = 20;

/// Standard alphabet; models drop or keep `=` padding at random.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStage {
    /// Bracketed JSON parsed as-is from unfenced text.
    DirectParse,
    /// Base64 token (bare or `{"b64": ...}` wrapped) decoded to JSON.
    Base64,
    /// Bracketed JSON parsed after stripping markdown fences.
    Fenced,
    /// Bracketed JSON parsed after deleting raw newlines and tabs.
    NormalizedWhitespace,
}

impl std::fmt::Display for RecoveryStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecoveryStage::DirectParse => "direct-parse",
            RecoveryStage::Base64 => "base64",
            RecoveryStage::Fenced => "fenced",
            RecoveryStage::NormalizedWhitespace => "normalized-whitespace",
        };
        f.write_str(name)
    }
}

/// A structured value together with the stage that recovered it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPayload {
    pub value: Value,
    pub stage: RecoveryStage,
}

fn fence_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```[A-Za-z0-9_-]*[ \t]*\r?\n?").expect("valid fence regex"))
}

fn b64_wrapper() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""b64"\s*:\s*"([A-Za-z0-9+/=]+)""#).expect("valid b64 wrapper regex")
    })
}

fn standalone_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*([A-Za-z0-9+/=]{20,})[ \t]*\r?$").expect("valid base64 token regex")
    })
}

/// Remove markdown code-fence markers, keeping whatever they wrapped.
pub fn strip_fences(text: &str) -> String {
    fence_marker().replace_all(text, "").trim().to_string()
}

/// Find the base64 payload in `text`, if any.
///
/// A `{"b64": "..."}` wrapper wins; then a text made only of base64 characters
/// (possibly wrapped over several lines); then a token alone on its own line.
pub fn find_base64_token(text: &str) -> Option<String> {
    if let Some(caps) = b64_wrapper().captures(text) {
        return Some(caps[1].to_string());
    }

    let compact: String = text.split_whitespace().collect();
    let only_base64 = compact
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='));
    if only_base64 && compact.len() >= MIN_BASE64_LEN {
        return Some(compact);
    }

    standalone_token()
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// Decode a base64 token and parse the decoded text as JSON.
pub fn decode_base64_json(token: &str) -> Option<Value> {
    let bytes = match LENIENT_BASE64.decode(token) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Base64 token did not decode: {}", e);
            return None;
        }
    };
    let text = String::from_utf8(bytes).ok()?;
    match serde_json::from_str(text.trim()) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Decoded base64 payload is not JSON: {}", e);
            None
        }
    }
}

/// Byte index of the closer matching the opener at `start`.
///
/// Brackets inside string literals are ignored; a mismatched closer ends the
/// scan without a match.
fn matching_close(text: &str, start: usize) -> Option<usize> {
    let mut open = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' => open.push(b']'),
            b'{' => open.push(b'}'),
            b']' | b'}' => {
                if open.pop() != Some(b) {
                    return None;
                }
                if open.is_empty() {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Top-level balanced `[...]` / `{...}` spans of `text`, in order.
///
/// An opener that never closes is skipped and the scan resumes after it.
pub fn json_spans(text: &str) -> impl Iterator<Item = &str> + '_ {
    let mut from = 0;
    std::iter::from_fn(move || {
        while let Some(offset) = text[from..].find(['[', '{']) {
            let start = from + offset;
            match matching_close(text, start) {
                Some(end) => {
                    from = end + 1;
                    return Some(&text[start..=end]);
                }
                None => from = start + 1,
            }
        }
        None
    })
}

/// First balanced bracket or brace span in `text`.
pub fn outermost_json(text: &str) -> Option<&str> {
    json_spans(text).next()
}

/// Delete every literal newline, carriage return and tab.
pub fn strip_raw_whitespace(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\n' | '\r' | '\t'))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Base64,
    Direct,
    Normalized,
    Done,
}

/// Lazy iterator over the values recoverable from one response.
#[derive(Debug)]
pub struct RecoveryChain {
    cleaned: String,
    fenced: bool,
    step: Step,
    /// Spans whose direct parse failed; only these are normalised.
    unparsed: Vec<String>,
    pending: VecDeque<DecodedPayload>,
}

impl RecoveryChain {
    pub fn new(raw: &str) -> Self {
        let cleaned = strip_fences(raw);
        Self {
            fenced: raw.contains("```"),
            cleaned,
            step: Step::Base64,
            unparsed: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    fn try_base64(&self) -> Option<Value> {
        let token = find_base64_token(&self.cleaned)?;
        decode_base64_json(&token)
    }

    fn queue_direct(&mut self) {
        let stage = if self.fenced {
            RecoveryStage::Fenced
        } else {
            RecoveryStage::DirectParse
        };
        for span in json_spans(&self.cleaned) {
            match serde_json::from_str(span) {
                Ok(value) => self.pending.push_back(DecodedPayload { value, stage }),
                Err(e) => {
                    debug!("Direct parse failed: {}", e);
                    self.unparsed.push(span.to_string());
                }
            }
        }
    }

    fn queue_normalized(&mut self) {
        for span in std::mem::take(&mut self.unparsed) {
            match serde_json::from_str(&strip_raw_whitespace(&span)) {
                Ok(value) => self.pending.push_back(DecodedPayload {
                    value,
                    stage: RecoveryStage::NormalizedWhitespace,
                }),
                Err(e) => debug!("Parse after whitespace normalization failed: {}", e),
            }
        }
    }
}

impl Iterator for RecoveryChain {
    type Item = DecodedPayload;

    fn next(&mut self) -> Option<DecodedPayload> {
        loop {
            if let Some(payload) = self.pending.pop_front() {
                return Some(payload);
            }
            match self.step {
                Step::Base64 => {
                    self.step = Step::Direct;
                    if let Some(value) = self.try_base64() {
                        return Some(DecodedPayload {
                            value,
                            stage: RecoveryStage::Base64,
                        });
                    }
                }
                Step::Direct => {
                    self.step = Step::Normalized;
                    self.queue_direct();
                }
                Step::Normalized => {
                    self.step = Step::Done;
                    self.queue_normalized();
                }
                Step::Done => return None,
            }
        }
    }
}

/// First structured value recoverable from `raw`, without validation.
pub fn decode(raw: &str) -> Result<DecodedPayload> {
    RecoveryChain::new(raw)
        .next()
        .ok_or_else(|| Error::Decode(no_payload_message(raw)))
}

/// Walk the recovery chain until `accept` takes a value.
///
/// Returns the accepted result and the stage that produced it. When values
/// were recovered but all rejected, the last rejection is returned as a
/// validation failure; when nothing was recovered, a decode failure.
pub fn decode_with<T, F>(raw: &str, mut accept: F) -> Result<(T, RecoveryStage)>
where
    F: FnMut(&Value) -> std::result::Result<T, ValidationError>,
{
    let mut rejection = None;

    for payload in RecoveryChain::new(raw) {
        match accept(&payload.value) {
            Ok(accepted) => return Ok((accepted, payload.stage)),
            Err(e) => {
                debug!("Value recovered via {} rejected: {}", payload.stage, e);
                rejection = Some(e);
            }
        }
    }

    match rejection {
        Some(e) => Err(Error::Validation(e)),
        None => Err(Error::Decode(no_payload_message(raw))),
    }
}

fn no_payload_message(raw: &str) -> String {
    let preview: String = raw.chars().take(80).collect();
    format!(
        "no structured payload in {} char response (starts with {:?})",
        raw.chars().count(),
        preview
    )
}
