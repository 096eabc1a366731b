//! Chat messages and their JSON wire frame.
//!
//! Every frame on an upgraded connection is one JSON object:
//!
//! ```text
//! { "type": "message" | "system", "username": "...", "content": "...", "time": "<RFC 3339>" }
//! ```
//!
//! Clients may omit everything but `content`; the relay overwrites
//! `username` and `time` and defaults `type` to `"message"`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Rejection;
use crate::name::DisplayName;
use crate::validate::validate;

/// Sender of notices the relay writes itself.
pub const SERVER_NAME: &str = "Server";

/// Distinguishes participant chat from relay-authored notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    #[serde(rename = "message")]
    Chat,
    #[serde(rename = "system")]
    System,
}

impl MessageKind {
    /// Wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Chat => "message",
            MessageKind::System => "system",
        }
    }

    /// Parse a wire name. Unknown names yield `None`.
    pub fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "message" => Some(MessageKind::Chat),
            "system" => Some(MessageKind::System),
            _ => None,
        }
    }
}

/// A message as delivered to every participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(rename = "username")]
    pub sender: String,
    #[serde(rename = "content")]
    pub body: String,
    #[serde(rename = "time", with = "rfc3339")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// A relay-authored notice.
    pub fn system(body: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            kind: MessageKind::System,
            sender: SERVER_NAME.to_string(),
            body: body.into(),
            timestamp: at,
        }
    }

    /// "`<name>` has joined the chat"
    pub fn joined(name: &DisplayName, at: DateTime<Utc>) -> Self {
        Self::system(format!("{name} has joined the chat"), at)
    }

    /// "`<name>` has left the chat"
    pub fn left(name: &DisplayName, at: DateTime<Utc>) -> Self {
        Self::system(format!("{name} has left the chat"), at)
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A frame as sent by a client. Only `content` matters; the rest is either
/// overwritten or defaulted during stamping.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub time: Option<String>,
}

impl InboundFrame {
    /// Parse one text frame. Anything that is not a JSON object of the
    /// expected shape is an error.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        match serde_json::from_str::<Value>(text)? {
            object @ Value::Object(_) => serde_json::from_value(object),
            other => Err(serde::de::Error::invalid_type(
                unexpected(&other),
                &"a JSON object",
            )),
        }
    }

    /// Bind the frame to the connection's identity and the relay clock.
    ///
    /// Whatever `username` and `time` the client sent are discarded.
    pub fn stamp(self, sender: &DisplayName, at: DateTime<Utc>) -> Candidate {
        let kind = match self.kind {
            Some(kind) if !kind.is_empty() => kind,
            _ => MessageKind::Chat.as_str().to_string(),
        };
        Candidate {
            kind,
            sender: sender.to_string(),
            body: self.content,
            timestamp: at,
        }
    }
}

fn unexpected(value: &Value) -> serde::de::Unexpected<'_> {
    use serde::de::Unexpected;
    match value {
        Value::Null => Unexpected::Unit,
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(_) => Unexpected::Other("number"),
        Value::String(s) => Unexpected::Str(s),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
    }
}

/// A stamped message that has not been validated yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub kind: String,
    pub sender: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl Candidate {
    pub fn validate(&self) -> Result<(), Rejection> {
        validate(&self.kind, &self.body)
    }

    /// Validate and convert into a deliverable message.
    pub fn into_message(self) -> Result<ChatMessage, Rejection> {
        self.validate()?;
        let kind = MessageKind::from_wire(&self.kind)
            .ok_or_else(|| Rejection::InvalidType(self.kind.clone()))?;
        Ok(ChatMessage {
            kind,
            sender: self.sender,
            body: self.body,
            timestamp: self.timestamp,
        })
    }
}

/// RFC 3339 in UTC with whole seconds, e.g. `2026-10-19T08:30:00Z`.
mod rfc3339 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap()
    }

    fn alice() -> DisplayName {
        DisplayName::parse("alice").unwrap()
    }

    #[test]
    fn wire_shape() {
        let msg = ChatMessage::joined(&alice(), at());
        let v: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(v["type"], "system");
        assert_eq!(v["username"], "Server");
        assert_eq!(v["content"], "alice has joined the chat");
        assert_eq!(v["time"], "2026-10-19T08:30:00Z");
        assert_eq!(v.as_object().unwrap().len(), 4);
    }

    #[test]
    fn leave_notice_mirrors_join() {
        let msg = ChatMessage::left(&alice(), at());
        assert_eq!(msg.kind, MessageKind::System);
        assert_eq!(msg.sender, SERVER_NAME);
        assert_eq!(msg.body, "alice has left the chat");
    }

    #[test]
    fn timestamps_sort_lexically() {
        let earlier = ChatMessage::system("a", at()).encode().unwrap();
        let later = ChatMessage::system("a", at() + chrono::Duration::seconds(61))
            .encode()
            .unwrap();
        let t = |s: &str| serde_json::from_str::<Value>(s).unwrap()["time"].clone();
        assert!(t(&earlier).as_str().unwrap() < t(&later).as_str().unwrap());
    }

    #[test]
    fn decodes_content_only_frame() {
        let frame = InboundFrame::decode(r#"{"content":"hi"}"#).unwrap();
        assert_eq!(frame.content, "hi");
        assert!(frame.kind.is_none());
    }

    #[test]
    fn missing_content_decodes_as_empty() {
        let frame = InboundFrame::decode(r#"{"type":"message"}"#).unwrap();
        let err = frame.stamp(&alice(), at()).into_message().unwrap_err();
        assert_eq!(err, Rejection::EmptyContent);
    }

    #[test]
    fn malformed_frames_fail_to_decode() {
        assert!(InboundFrame::decode("not json").is_err());
        assert!(InboundFrame::decode(r#"{"content": 42}"#).is_err());
        assert!(InboundFrame::decode(r#"["content"]"#).is_err());
        assert!(InboundFrame::decode("null").is_err());
        assert!(InboundFrame::decode(r#""hi""#).is_err());
    }

    #[test]
    fn array_frames_are_not_read_positionally() {
        let err = InboundFrame::decode(r#"["message","mallory","hi from an array"]"#).unwrap_err();
        assert!(err.to_string().contains("a JSON object"), "{err}");
    }

    #[test]
    fn stamping_overwrites_identity_and_time() {
        let frame = InboundFrame::decode(
            r#"{"content":"hi","username":"mallory","time":"1999-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        let msg = frame.stamp(&alice(), at()).into_message().unwrap();
        assert_eq!(msg.kind, MessageKind::Chat);
        assert_eq!(msg.sender, "alice");
        assert_eq!(msg.body, "hi");
        assert_eq!(msg.timestamp, at());
    }

    #[test]
    fn empty_type_defaults_to_message() {
        let frame = InboundFrame::decode(r#"{"type":"","content":"hi"}"#).unwrap();
        let candidate = frame.stamp(&alice(), at());
        assert_eq!(candidate.kind, "message");
    }

    #[test]
    fn unknown_type_is_rejected() {
        let frame = InboundFrame::decode(r#"{"type":"invalid_type","content":"hi"}"#).unwrap();
        let err = frame.stamp(&alice(), at()).into_message().unwrap_err();
        assert_eq!(err, Rejection::InvalidType("invalid_type".into()));
    }

    #[test]
    fn roundtrip_preserves_message() {
        let msg = ChatMessage::system("maintenance at noon", at());
        let back: ChatMessage = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(back, msg);
    }
}
