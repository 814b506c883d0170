//! JSON-lines framing.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{ProtoError, ProtoResult};
use crate::request::Request;
use crate::response::{Response, RunEvent};

/// Host → worker frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inbound {
    pub id: u64,
    pub request: Request,
}

impl Inbound {
    pub fn new(id: u64, request: Request) -> Self {
        Self { id, request }
    }
}

/// Worker → host frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// A run event belonging to request `id`.
    Event { id: u64, event: RunEvent },
    /// The final reply to request `id`.
    Reply { id: u64, response: Response },
}

impl Outbound {
    /// Request id this frame belongs to.
    pub fn id(&self) -> u64 {
        match self {
            Outbound::Event { id, .. } | Outbound::Reply { id, .. } => *id,
        }
    }

    /// Reject frames for any request other than `expected`.
    pub fn expect_id(self, expected: u64) -> ProtoResult<Self> {
        let got = self.id();
        if got == expected {
            Ok(self)
        } else {
            Err(ProtoError::IdMismatch { expected, got })
        }
    }
}

/// Encode a frame as a single line (no trailing newline).
pub fn encode_frame<T: Serialize>(frame: &T) -> ProtoResult<String> {
    Ok(serde_json::to_string(frame)?)
}

/// Decode one line into a frame.
pub fn decode_frame<T: DeserializeOwned>(line: &str) -> ProtoResult<T> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtoError::Empty);
    }
    Ok(serde_json::from_str(line)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Source, TargetProfile};

    #[test]
    fn test_outbound_tagging() {
        let frame = Outbound::Event {
            id: 9,
            event: RunEvent::new("01", 2),
        };
        let line = encode_frame(&frame).unwrap();
        assert!(!line.contains('\n'));
        let json: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["event"]["outcome_label"], "01");
    }

    #[test]
    fn test_multiline_source_stays_on_one_line() {
        let frame = Inbound::new(
            1,
            Request::Check {
                sources: vec![Source::new("a.qb", "operation A {\n  h 0;\n}\n")],
                profile: TargetProfile::Base,
            },
        );
        let line = encode_frame(&frame).unwrap();
        assert_eq!(line.lines().count(), 1);
        let back: Inbound = decode_frame(&line).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_frame::<Outbound>("   "),
            Err(ProtoError::Empty)
        ));
        assert!(matches!(
            decode_frame::<Outbound>("{\"type\":\"progress\",\"id\":1}"),
            Err(ProtoError::Malformed(_))
        ));
    }

    #[test]
    fn test_expect_id() {
        let frame = Outbound::Reply {
            id: 3,
            response: Response::RunComplete { shots: 1 },
        };
        assert!(frame.clone().expect_id(3).is_ok());
        assert!(matches!(
            frame.expect_id(4),
            Err(ProtoError::IdMismatch {
                expected: 4,
                got: 3
            })
        ));
    }
}
