//! Python source parsing: definitions, import bindings, and outgoing calls.

pub mod calls;
pub mod parser;
pub mod paths;

pub use calls::extract_calls;
pub use parser::{ParsedModule, PythonParser};
