use crate::core::{DbError, Result};
use crate::session::SessionId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Request and response tag. Travels on the wire as its number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseType {
    KeepAlive = 0,
    NewDatabase = 1,
    LoadDatabase = 2,
    NewTable = 3,
    FindTable = 4,
    GetMetadata = 5,
    Query = 6,
    ShowTransaction = 7,
    Error = 8,
    SessionExited = 9,
    DropDb = 10,
    Notification = 11,
}

impl ResponseType {
    pub fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => ResponseType::KeepAlive,
            1 => ResponseType::NewDatabase,
            2 => ResponseType::LoadDatabase,
            3 => ResponseType::NewTable,
            4 => ResponseType::FindTable,
            5 => ResponseType::GetMetadata,
            6 => ResponseType::Query,
            7 => ResponseType::ShowTransaction,
            8 => ResponseType::Error,
            9 => ResponseType::SessionExited,
            10 => ResponseType::DropDb,
            11 => ResponseType::Notification,
            other => return Err(DbError::Protocol(format!("Unknown message type {}", other))),
        })
    }
}

impl Serialize for ResponseType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for ResponseType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let tag = u8::deserialize(deserializer)?;
        ResponseType::from_tag(tag).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One frame in either direction: `{"Type":6,"Data":"SELECT 1"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "Type")]
    pub kind: ResponseType,
    #[serde(rename = "Data", default)]
    pub data: String,
}

impl Response {
    pub fn new(kind: ResponseType, data: impl Into<String>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }

    pub fn notification(message: impl Into<String>) -> Self {
        Self::new(ResponseType::Notification, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ResponseType::Error, message)
    }

    /// Newline-terminated JSON line.
    pub fn encode(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn decode(line: &str) -> Result<Self> {
        serde_json::from_str(line.trim())
            .map_err(|e| DbError::Protocol(format!("Malformed frame: {}", e)))
    }
}

/// A frame received from a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub session_id: SessionId,
    pub response: Response,
}

impl Request {
    pub fn new(session_id: SessionId, response: Response) -> Self {
        Self {
            session_id,
            response,
        }
    }

    pub fn kind(&self) -> ResponseType {
        self.response.kind
    }

    pub fn data(&self) -> &str {
        &self.response.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let line = Response::new(ResponseType::Query, "SELECT * FROM t").encode().unwrap();
        assert_eq!(line, "{\"Type\":6,\"Data\":\"SELECT * FROM t\"}\n");
    }

    #[test]
    fn test_decode_accepts_missing_data() {
        let response = Response::decode(r#"{"Type":0}"#).unwrap();
        assert_eq!(response, Response::new(ResponseType::KeepAlive, ""));
    }

    #[test]
    fn test_decode_rejects_unknown_tag_and_garbage() {
        assert!(matches!(Response::decode(r#"{"Type":42,"Data":""}"#), Err(DbError::Protocol(_))));
        assert!(matches!(Response::decode("not json"), Err(DbError::Protocol(_))));
    }

    #[test]
    fn test_tags_cover_all_types() {
        for tag in 0..=11u8 {
            let kind = ResponseType::from_tag(tag).unwrap();
            assert_eq!(kind as u8, tag);
        }
    }
}
