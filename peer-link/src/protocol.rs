use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{TimeZone, Utc};
use keygrid::cache::InvalidationMessage;
use keygrid::domain::CacheKey;

// Command type identifiers
pub const CMD_PING: u8 = 0x00;
pub const CMD_INVALIDATE: u8 = 0x01;

// Response type identifiers
pub const RESP_PONG: u8 = 0x00;
pub const RESP_OK: u8 = 0x01;
pub const RESP_ERROR: u8 = 0x02;

/// Frames are length-delimited by the codec; this caps a single message.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub enum Request {
    Ping,
    Invalidate {
        key: String,
        origin_region: String,
        issued_at_ms: i64,
    },
}

#[derive(Debug, Clone)]
pub enum Response {
    Pong,
    Ok,
    Error { msg: String },
}

impl Request {
    /// Encode a Request into Bytes for transmission
    ///
    /// Format:
    /// - PING: [0x00]
    /// - INVALIDATE: [0x01][key_len: u32][key bytes][region_len: u32][region bytes][issued_at_ms: i64]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();

        match self {
            Request::Ping => {
                buf.put_u8(CMD_PING);
            }
            Request::Invalidate {
                key,
                origin_region,
                issued_at_ms,
            } => {
                buf.put_u8(CMD_INVALIDATE);
                let key_bytes = key.as_bytes();
                buf.put_u32(key_bytes.len() as u32);
                buf.put_slice(key_bytes);
                let region_bytes = origin_region.as_bytes();
                buf.put_u32(region_bytes.len() as u32);
                buf.put_slice(region_bytes);
                buf.put_i64(*issued_at_ms);
            }
        }

        buf.freeze()
    }

    /// Decode a Request from a complete frame extracted by the codec.
    pub fn decode(mut buf: Bytes) -> Result<Self, String> {
        if buf.is_empty() {
            return Err("Empty buffer".to_string());
        }

        let cmd = buf.get_u8();

        match cmd {
            CMD_PING => Ok(Request::Ping),
            CMD_INVALIDATE => {
                let key = read_string(&mut buf, "key")?;
                let origin_region = read_string(&mut buf, "origin_region")?;

                if buf.remaining() < 8 {
                    return Err("Invalid INVALIDATE: missing issued_at".to_string());
                }
                let issued_at_ms = buf.get_i64();

                Ok(Request::Invalidate {
                    key,
                    origin_region,
                    issued_at_ms,
                })
            }
            _ => Err(format!("Unknown command: 0x{:02X}", cmd)),
        }
    }

    pub fn from_message(message: &InvalidationMessage) -> Self {
        Request::Invalidate {
            key: message.key.as_str().to_string(),
            origin_region: message.origin_region.clone(),
            issued_at_ms: message.issued_at.timestamp_millis(),
        }
    }

    /// The invalidation carried by this request, if any.
    pub fn into_message(self) -> Option<InvalidationMessage> {
        match self {
            Request::Ping => None,
            Request::Invalidate {
                key,
                origin_region,
                issued_at_ms,
            } => Some(InvalidationMessage {
                key: CacheKey::from_raw(key),
                origin_region,
                issued_at: Utc
                    .timestamp_millis_opt(issued_at_ms)
                    .single()
                    .unwrap_or_else(Utc::now),
            }),
        }
    }
}

impl Response {
    /// Encode a Response into Bytes for transmission
    ///
    /// Format:
    /// - PONG: [0x00]
    /// - OK: [0x01]
    /// - ERROR: [0x02][msg_len: u32][msg bytes]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();

        match self {
            Response::Pong => {
                buf.put_u8(RESP_PONG);
            }
            Response::Ok => {
                buf.put_u8(RESP_OK);
            }
            Response::Error { msg } => {
                buf.put_u8(RESP_ERROR);
                let msg_bytes = msg.as_bytes();
                buf.put_u32(msg_bytes.len() as u32);
                buf.put_slice(msg_bytes);
            }
        }

        buf.freeze()
    }

    /// Decode a Response from a complete frame.
    pub fn decode(mut buf: Bytes) -> Result<Self, String> {
        if buf.is_empty() {
            return Err("Empty buffer".to_string());
        }

        let resp_type = buf.get_u8();

        match resp_type {
            RESP_PONG => Ok(Response::Pong),
            RESP_OK => Ok(Response::Ok),
            RESP_ERROR => {
                let msg = read_string(&mut buf, "msg")?;
                Ok(Response::Error { msg })
            }
            _ => Err(format!("Unknown response type: 0x{:02X}", resp_type)),
        }
    }
}

fn read_string(buf: &mut Bytes, field: &str) -> Result<String, String> {
    if buf.remaining() < 4 {
        return Err(format!("Invalid frame: missing {field} length"));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(format!(
            "Invalid frame: {field} expected {} bytes, got {}",
            len,
            buf.remaining()
        ));
    }
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|e| format!("Invalid {field} UTF-8: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_encode_decode() {
        let encoded = Request::Ping.encode();
        let decoded = Request::decode(encoded).unwrap();
        assert!(matches!(decoded, Request::Ping));
    }

    #[test]
    fn invalidate_carries_message_fields() {
        let message = InvalidationMessage {
            key: CacheKey::credential("key_1"),
            origin_region: "eu-west".to_string(),
            issued_at: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        };

        let decoded = Request::decode(Request::from_message(&message).encode()).unwrap();
        let recovered = decoded.into_message().unwrap();
        assert_eq!(recovered, message);
    }

    #[test]
    fn truncated_invalidate_is_rejected() {
        let message = InvalidationMessage {
            key: CacheKey::credential("key_1"),
            origin_region: "eu-west".to_string(),
            issued_at: Utc::now(),
        };
        let mut encoded = Request::from_message(&message).encode();
        let truncated = encoded.split_to(encoded.len() - 4);

        assert!(Request::decode(truncated).is_err());
    }

    #[test]
    fn unknown_command_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u8(0x7F);
        assert!(Request::decode(buf.freeze()).is_err());
    }

    #[test]
    fn error_response_round_trips() {
        let encoded = Response::Error {
            msg: "bad frame".to_string(),
        }
        .encode();
        match Response::decode(encoded).unwrap() {
            Response::Error { msg } => assert_eq!(msg, "bad frame"),
            other => panic!("Expected Error, got {other:?}"),
        }
    }
}
