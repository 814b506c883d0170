//! qbridge statevector engine
//!
//! Compiles `.qb` gate-list programs and serves them as a worker
//! [`Engine`](qbridge_worker::Engine): checks report diagnostics and the
//! operation list, runs stream one outcome per shot, and circuit requests
//! return diagram data.
//!
//! # Language
//!
//! ```text
//! namespace Demo;
//!
//! @entry
//! operation Bell {
//!     h 0;
//!     cx 0, 1;
//!     measure 0;
//!     measure 1;
//! }
//! ```
//!
//! | Statement | Meaning |
//! |-----------|---------|
//! | `h x y z s sdg t tdg q;` | single-qubit gate |
//! | `rx ry rz p(angle) q;` | rotation, angle may use `pi` and `+ - * /` |
//! | `cx cz swap a, b;` | two-qubit gate (control first) |
//! | `ccx a, b, c;` | Toffoli |
//! | `measure q;` / `reset q;` | measurement, reset to `|0⟩` |
//! | `call Name;` | inline another operation |
//!
//! # Performance
//!
//! | Qubits | Memory |
//! |--------|--------|
//! | 10 | ~16 KB |
//! | 15 | ~512 KB |
//! | 20 | ~16 MB |
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use qbridge_adapter_sim::SimEngine;
//! use qbridge_worker::{LocalSpawner, WorkerPool};
//!
//! let engine = Arc::new(SimEngine::new());
//! let pool = WorkerPool::new(Arc::new(LocalSpawner::new(engine)), 1);
//! ```

pub mod ast;
pub mod circuit;
pub mod engine;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod profile;
pub mod program;
pub mod simulator;
mod statevector;

pub use circuit::build_circuit;
pub use engine::SimEngine;
pub use error::{Location, SimError, SimResult};
pub use parser::parse;
pub use profile::check_profile;
pub use program::{
    DEFAULT_MAX_CALL_DEPTH, DEFAULT_MAX_QUBITS, DEFAULT_MAX_STEPS, Limits, Program, compile,
};
pub use simulator::{EMPTY_OUTCOME, ShotsEnd, Simulator};
