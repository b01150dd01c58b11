//! Binary frame layouts of the gateway protocol.
//!
//! Notification frame (big-endian):
//!
//! ```text
//! [command=0][0][token length=32][32 bytes token][0][payload length][payload]
//! ```
//!
//! The payload length is one byte wide in the legacy protocol and two bytes
//! wide in the extended protocol. Error responses are six bytes:
//! `[command][status][4 bytes identifier]`.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::token::{DeviceToken, TOKEN_LEN};

/// Command byte of a notification frame.
pub const NOTIFICATION_COMMAND: u8 = 0;

/// Size of an error-response frame.
pub const ERROR_RESPONSE_LEN: usize = 6;

/// Protocol generation, which fixes the payload length field width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    /// One-byte payload length.
    Legacy,
    /// Two-byte big-endian payload length.
    #[default]
    Extended,
}

impl ProtocolVersion {
    /// Largest payload the frame layout can carry.
    pub const fn max_payload_bytes(self) -> usize {
        match self {
            Self::Legacy => 255,
            Self::Extended => 2047,
        }
    }

    /// Width of the payload length field.
    pub const fn length_field_width(self) -> usize {
        match self {
            Self::Legacy => 1,
            Self::Extended => 2,
        }
    }

    /// Bytes in a frame besides the payload.
    pub const fn header_len(self) -> usize {
        3 + TOKEN_LEN + 1 + self.length_field_width()
    }
}

/// A notification encoded for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    protocol: ProtocolVersion,
    token: DeviceToken,
    bytes: Bytes,
}

impl EncodedFrame {
    /// Assemble a frame. The payload must already respect the protocol cap.
    pub(crate) fn new(protocol: ProtocolVersion, token: DeviceToken, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= protocol.max_payload_bytes());

        let mut buf = BytesMut::with_capacity(protocol.header_len() + payload.len());
        buf.put_u8(NOTIFICATION_COMMAND);
        buf.put_u8(0);
        buf.put_u8(TOKEN_LEN as u8);
        buf.put_slice(token.as_bytes());
        buf.put_u8(0);
        match protocol {
            ProtocolVersion::Legacy => buf.put_u8(payload.len() as u8),
            ProtocolVersion::Extended => buf.put_u16(payload.len() as u16),
        }
        buf.put_slice(&payload);

        Self {
            protocol,
            token,
            bytes: buf.freeze(),
        }
    }

    /// Protocol the frame was written for.
    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Device token.
    pub fn token(&self) -> &DeviceToken {
        &self.token
    }

    /// Raw token bytes as they appear in the frame.
    pub fn token_bytes(&self) -> &[u8] {
        &self.bytes[3..3 + TOKEN_LEN]
    }

    /// JSON payload.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[self.protocol.header_len()..]
    }

    /// Whole frame.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Frame length in bytes.
    pub fn total_size(&self) -> usize {
        self.bytes.len()
    }
}

/// Status code carried by a gateway error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatus {
    /// 0
    NoErrors,
    /// 1
    ProcessingError,
    /// 2
    MissingDeviceToken,
    /// 3
    MissingTopic,
    /// 4
    MissingPayload,
    /// 5
    InvalidTokenSize,
    /// 6
    InvalidTopicSize,
    /// 7
    InvalidPayloadSize,
    /// 8
    InvalidToken,
    /// 10
    Shutdown,
    /// 255
    Unknown,
    /// Any code not listed above.
    Other(u8),
}

impl GatewayStatus {
    /// Numeric status code.
    pub fn code(self) -> u8 {
        match self {
            Self::NoErrors => 0,
            Self::ProcessingError => 1,
            Self::MissingDeviceToken => 2,
            Self::MissingTopic => 3,
            Self::MissingPayload => 4,
            Self::InvalidTokenSize => 5,
            Self::InvalidTopicSize => 6,
            Self::InvalidPayloadSize => 7,
            Self::InvalidToken => 8,
            Self::Shutdown => 10,
            Self::Unknown => 255,
            Self::Other(code) => code,
        }
    }
}

impl From<u8> for GatewayStatus {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::NoErrors,
            1 => Self::ProcessingError,
            2 => Self::MissingDeviceToken,
            3 => Self::MissingTopic,
            4 => Self::MissingPayload,
            5 => Self::InvalidTokenSize,
            6 => Self::InvalidTopicSize,
            7 => Self::InvalidPayloadSize,
            8 => Self::InvalidToken,
            10 => Self::Shutdown,
            255 => Self::Unknown,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoErrors => "no errors encountered",
            Self::ProcessingError => "processing error",
            Self::MissingDeviceToken => "missing device token",
            Self::MissingTopic => "missing topic",
            Self::MissingPayload => "missing payload",
            Self::InvalidTokenSize => "invalid token size",
            Self::InvalidTopicSize => "invalid topic size",
            Self::InvalidPayloadSize => "invalid payload size",
            Self::InvalidToken => "invalid token",
            Self::Shutdown => "shutdown",
            Self::Unknown => "unknown error",
            Self::Other(code) => return write!(f, "status {code}"),
        };
        write!(f, "{text} ({})", self.code())
    }
}

/// Decoded error-response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Command byte.
    pub command: u8,
    /// Status code.
    pub status: GatewayStatus,
    /// Identifier of the rejected notification.
    pub identifier: u32,
}

impl ErrorResponse {
    /// Decode a six-byte error response.
    pub fn decode(raw: &[u8; ERROR_RESPONSE_LEN]) -> Self {
        Self {
            command: raw[0],
            status: GatewayStatus::from(raw[1]),
            identifier: u32::from_be_bytes([raw[2], raw[3], raw[4], raw[5]]),
        }
    }
}
