//! qbridge wire protocol
//!
//! The closed set of messages that cross the boundary between a qbridge host
//! and a compute worker. Every message is a tagged union, serialized as one
//! JSON object per line.
//!
//! # Frames
//!
//! ```text
//!   host ──▶ worker   {"id":7,"request":{"kind":"run", ...}}
//!   worker ──▶ host   {"type":"event","id":7,"event":{"outcome_label":"01","sequence_index":0}}
//!   worker ──▶ host   {"type":"reply","id":7,"response":{"kind":"run_complete","shots":100}}
//! ```
//!
//! A worker handles one request at a time. Zero or more `event` frames
//! precede exactly one `reply` frame carrying the same id. Replies are
//! checked with [`Response::answers`] before they are handed to callers.
//!
//! # Example
//!
//! ```
//! use qbridge_proto::{Inbound, Request, Source, TargetProfile, decode_frame, encode_frame};
//!
//! let frame = Inbound::new(1, Request::Check {
//!     sources: vec![Source::new("bell.qb", "operation Main { h 0; }")],
//!     profile: TargetProfile::Base,
//! });
//! let line = encode_frame(&frame).unwrap();
//! let back: Inbound = decode_frame(&line).unwrap();
//! assert_eq!(back.id, 1);
//! ```

pub mod circuit;
pub mod error;
pub mod frame;
pub mod request;
pub mod response;

pub use circuit::{CircuitData, CircuitOp, QubitWire, Register, RegisterKind};
pub use error::{ProtoError, ProtoResult};
pub use frame::{Inbound, Outbound, decode_frame, encode_frame};
pub use request::{OperationInfo, Request, RequestKind, Source, TargetProfile};
pub use response::{
    Diagnostic, FaultKind, OperationSummary, Response, RunEvent, Severity, WorkerFault,
};
