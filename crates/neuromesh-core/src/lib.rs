//! Neuromesh Core - shared data model, ids, and error handling

pub mod error;
pub mod intention;
pub mod message;

pub use error::{Error, Result};
pub use intention::*;
pub use message::*;
