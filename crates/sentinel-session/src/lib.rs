//! Stream session controller (C6): the component that drives one request
//! through the tokenizer, validator, tool orchestrator and emitter, from
//! accept to close.

pub mod controller;
pub mod error;

pub use controller::{SessionController, SessionDeps};
pub use error::SessionError;
