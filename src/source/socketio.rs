//! Engine.IO v4 / Socket.IO v5 text packet codec.
//!
//! Only the text framing used over a WebSocket transport is handled.
//! Binary events are recognized so they can be skipped.
//!
//! ```text
//! 0{"sid":"..","pingInterval":25000}   engine open
//! 2 / 3                               engine ping / pong
//! 40 / 40{"sid":".."}                 socket connect / connect ack
//! 42["nueva_postura",{"postura":..}]  socket event
//! 44{"message":".."}                  socket connect error
//! ```

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Handshake data sent by the server when the transport opens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

impl OpenInfo {
    /// How long the server may stay silent before the session counts as
    /// lost: one ping interval plus the ping timeout. `None` if the server
    /// announced no heartbeat.
    pub fn heartbeat_timeout(&self) -> Option<Duration> {
        let ms = self.ping_interval.saturating_add(self.ping_timeout);
        (ms > 0).then(|| Duration::from_millis(ms))
    }
}

/// Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenInfo),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Upgrade,
    Noop,
}

/// Socket.IO packet carried inside an Engine.IO message.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// Namespace connect (from the server: the ack)
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        ack_id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Option<Value>,
    },
    /// Binary event or ack; attachments are not supported
    Binary,
}

/// Malformed packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketError(pub String);

impl std::fmt::Display for PacketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Malformed packet: {}", self.0)
    }
}

impl std::error::Error for PacketError {}

/// Namespace joined when none is given.
pub const DEFAULT_NAMESPACE: &str = "/";

/// Parse one Engine.IO text packet.
pub fn parse(text: &str) -> Result<EnginePacket, PacketError> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| PacketError("empty packet".to_string()))?;
    let rest = chars.as_str();

    match kind {
        '0' => {
            let info: OpenInfo = serde_json::from_str(rest)
                .map_err(|e| PacketError(format!("open payload: {e}")))?;
            Ok(EnginePacket::Open(info))
        }
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping),
        '3' => Ok(EnginePacket::Pong),
        '4' => parse_socket(rest).map(EnginePacket::Message),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(PacketError(format!("unknown engine packet type '{other}'"))),
    }
}

fn parse_socket(text: &str) -> Result<SocketPacket, PacketError> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| PacketError("empty socket packet".to_string()))?;
    let rest = chars.as_str();

    if kind == '5' || kind == '6' {
        return Ok(SocketPacket::Binary);
    }

    let (namespace, rest) = split_namespace(rest);
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let (id, payload) = rest.split_at(digits);
    let ack_id = if id.is_empty() {
        None
    } else {
        Some(
            id.parse::<u64>()
                .map_err(|e| PacketError(format!("ack id: {e}")))?,
        )
    };
    let data = if payload.is_empty() {
        None
    } else {
        Some(
            serde_json::from_str::<Value>(payload)
                .map_err(|e| PacketError(format!("payload: {e}")))?,
        )
    };

    match kind {
        '0' => Ok(SocketPacket::Connect { namespace, data }),
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => {
            let mut args = match data {
                Some(Value::Array(args)) => args,
                _ => return Err(PacketError("event payload must be an array".to_string())),
            };
            if args.is_empty() {
                return Err(PacketError("event without a name".to_string()));
            }
            let name = match args.remove(0) {
                Value::String(name) => name,
                other => return Err(PacketError(format!("event name {other}"))),
            };
            Ok(SocketPacket::Event {
                namespace,
                ack_id,
                name,
                args,
            })
        }
        '3' => {
            let ack_id = ack_id.ok_or_else(|| PacketError("ack without id".to_string()))?;
            let args = match data {
                Some(Value::Array(args)) => args,
                _ => Vec::new(),
            };
            Ok(SocketPacket::Ack {
                namespace,
                ack_id,
                args,
            })
        }
        '4' => Ok(SocketPacket::ConnectError { namespace, data }),
        other => Err(PacketError(format!("unknown socket packet type '{other}'"))),
    }
}

/// A namespace other than "/" is written as `/name,` before the payload.
fn split_namespace(text: &str) -> (String, &str) {
    if text.starts_with('/') {
        match text.find(',') {
            Some(idx) => (text[..idx].to_string(), &text[idx + 1..]),
            None => (text.to_string(), ""),
        }
    } else {
        (DEFAULT_NAMESPACE.to_string(), text)
    }
}

/// Packet asking to join `namespace`.
pub fn encode_connect(namespace: &str) -> String {
    if namespace == DEFAULT_NAMESPACE || namespace.is_empty() {
        "40".to_string()
    } else {
        format!("40{namespace},")
    }
}

/// Reply to an engine ping.
pub fn encode_pong() -> String {
    "3".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_open() {
        let packet =
            parse(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#)
                .unwrap();
        match packet {
            EnginePacket::Open(info) => {
                assert_eq!(info.sid, "abc");
                assert_eq!(info.ping_interval, 25000);
                assert_eq!(info.heartbeat_timeout(), Some(Duration::from_secs(45)));
            }
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[test]
    fn test_open_without_heartbeat() {
        match parse(r#"0{"sid":"abc"}"#).unwrap() {
            EnginePacket::Open(info) => assert_eq!(info.heartbeat_timeout(), None),
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[test]
    fn test_parse_engine_control() {
        assert_eq!(parse("1").unwrap(), EnginePacket::Close);
        assert_eq!(parse("2").unwrap(), EnginePacket::Ping);
        assert_eq!(parse("3").unwrap(), EnginePacket::Pong);
        assert_eq!(parse("6").unwrap(), EnginePacket::Noop);
        assert!(parse("").is_err());
        assert!(parse("9").is_err());
    }

    #[test]
    fn test_parse_connect_ack() {
        let packet = parse(r#"40{"sid":"xyz"}"#).unwrap();
        assert_eq!(
            packet,
            EnginePacket::Message(SocketPacket::Connect {
                namespace: "/".to_string(),
                data: Some(json!({"sid": "xyz"})),
            })
        );
    }

    #[test]
    fn test_parse_event() {
        let packet = parse(r#"42["nueva_postura",{"postura":"sentado"}]"#).unwrap();
        assert_eq!(
            packet,
            EnginePacket::Message(SocketPacket::Event {
                namespace: "/".to_string(),
                ack_id: None,
                name: "nueva_postura".to_string(),
                args: vec![json!({"postura": "sentado"})],
            })
        );
    }

    #[test]
    fn test_parse_event_with_namespace_and_ack() {
        let packet = parse(r#"42/monitor,7["ping",1]"#).unwrap();
        assert_eq!(
            packet,
            EnginePacket::Message(SocketPacket::Event {
                namespace: "/monitor".to_string(),
                ack_id: Some(7),
                name: "ping".to_string(),
                args: vec![json!(1)],
            })
        );
    }

    #[test]
    fn test_parse_connect_error_and_binary() {
        match parse(r#"44{"message":"Not authorized"}"#).unwrap() {
            EnginePacket::Message(SocketPacket::ConnectError { data, .. }) => {
                assert_eq!(data, Some(json!({"message": "Not authorized"})));
            }
            other => panic!("unexpected packet {other:?}"),
        }
        assert_eq!(
            parse(r#"451-["img",{"_placeholder":true,"num":0}]"#).unwrap(),
            EnginePacket::Message(SocketPacket::Binary)
        );
    }

    #[test]
    fn test_malformed_event() {
        assert!(parse(r#"42{"postura":"sentado"}"#).is_err());
        assert!(parse("42[]").is_err());
        assert!(parse("42[not json").is_err());
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode_connect("/"), "40");
        assert_eq!(encode_connect("/monitor"), "40/monitor,");
        assert_eq!(encode_pong(), "3");
    }
}
