//! JSON payload construction and alert truncation.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::frame::{EncodedFrame, ProtocolVersion};
use crate::notification::{Alert, Sound};
use crate::{Notification, NotificationOptions, PushError, Result};

/// Turns notifications into wire frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadEncoder {
    protocol: ProtocolVersion,
    max_payload_bytes: usize,
    truncate_alert: bool,
}

impl Default for PayloadEncoder {
    fn default() -> Self {
        Self::new(ProtocolVersion::default())
    }
}

impl PayloadEncoder {
    /// Create an encoder using the protocol's full payload capacity.
    pub fn new(protocol: ProtocolVersion) -> Self {
        Self {
            protocol,
            max_payload_bytes: protocol.max_payload_bytes(),
            truncate_alert: false,
        }
    }

    /// Lower the payload limit. Values above the protocol cap are rejected.
    pub fn with_max_payload_bytes(mut self, max: usize) -> Result<Self> {
        if max == 0 || max > self.protocol.max_payload_bytes() {
            return Err(PushError::Config(format!(
                "max payload of {max} bytes is outside 1..={} for the {:?} protocol",
                self.protocol.max_payload_bytes(),
                self.protocol
            )));
        }
        self.max_payload_bytes = max;
        Ok(self)
    }

    /// Shorten the alert instead of failing when the payload is too large.
    pub fn with_truncation(mut self, enabled: bool) -> Self {
        self.truncate_alert = enabled;
        self
    }

    /// Protocol generation frames are written for.
    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Payload limit in bytes.
    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    /// Encoded JSON body size before any truncation.
    pub fn payload_size(&self, notification: &Notification) -> Result<usize> {
        Ok(serde_json::to_vec(&Payload::from_options(notification.options()))?.len())
    }

    /// Encode a notification into a frame.
    pub fn encode(&self, notification: &Notification) -> Result<EncodedFrame> {
        let body = self.encode_body(notification.options())?;
        Ok(EncodedFrame::new(self.protocol, *notification.token(), body))
    }

    /// Parse, validate and encode in one step.
    pub fn encode_token(&self, token: &str, options: NotificationOptions) -> Result<EncodedFrame> {
        self.encode(&Notification::new(token, options)?)
    }

    fn encode_body(&self, options: &NotificationOptions) -> Result<Vec<u8>> {
        let mut payload = Payload::from_options(options);
        let body = serde_json::to_vec(&payload)?;
        if body.len() <= self.max_payload_bytes {
            return Ok(body);
        }

        if !self.truncate_alert {
            return Err(PushError::PayloadTooLarge {
                size: body.len(),
                limit: self.max_payload_bytes,
            });
        }

        self.truncate(&mut payload, body.len())
    }

    fn truncate(&self, payload: &mut Payload<'_>, encoded_len: usize) -> Result<Vec<u8>> {
        let limit = self.max_payload_bytes;
        let too_large = |size| PushError::PayloadTooLarge { size, limit };

        let Some(text) = payload.aps.alert.as_mut().and_then(Alert::truncatable_text_mut) else {
            return Err(too_large(encoded_len));
        };

        let overhead = encoded_len - escaped_len(text);
        if overhead > limit {
            return Err(too_large(overhead));
        }

        let original_chars = text.chars().count();
        truncate_escaped(text, limit - overhead);
        debug!(
            from = original_chars,
            to = text.chars().count(),
            limit,
            "Truncated alert to fit payload"
        );

        let body = serde_json::to_vec(payload)?;
        if body.len() > limit {
            return Err(too_large(body.len()));
        }
        Ok(body)
    }
}

/// Encoded size of `c` inside a JSON string literal.
fn escaped_char_len(c: char) -> usize {
    match c {
        '"' | '\\' | '\n' | '\r' | '\t' | '\u{08}' | '\u{0c}' => 2,
        c if (c as u32) < 0x20 => 6,
        c => c.len_utf8(),
    }
}

/// Encoded size of `text` inside a JSON string literal, without the quotes.
fn escaped_len(text: &str) -> usize {
    text.chars().map(escaped_char_len).sum()
}

/// Cut `text` at a character boundary so its escaped form fits in `budget` bytes.
fn truncate_escaped(text: &mut String, budget: usize) {
    let mut used = 0;
    let mut cut = text.len();
    for (idx, c) in text.char_indices() {
        let width = escaped_char_len(c);
        if used + width > budget {
            cut = idx;
            break;
        }
        used += width;
    }
    text.truncate(cut);
}

#[derive(Serialize)]
struct Payload<'a> {
    aps: Aps,
    #[serde(flatten)]
    custom: &'a BTreeMap<String, Value>,
}

#[derive(Serialize)]
struct Aps {
    #[serde(skip_serializing_if = "Option::is_none")]
    alert: Option<Alert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    badge: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sound: Option<Sound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(rename = "content-available", skip_serializing_if = "Option::is_none")]
    content_available: Option<u8>,
}

impl<'a> Payload<'a> {
    fn from_options(options: &'a NotificationOptions) -> Self {
        Self {
            aps: Aps {
                alert: options.alert.clone(),
                badge: options.badge,
                sound: options.sound.clone(),
                category: options.category.clone(),
                content_available: options.content_available.then_some(1),
            },
            custom: &options.custom,
        }
    }
}
