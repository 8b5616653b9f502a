//! Batch processing: decoding requests and fanning them out to the generation client.

pub mod decoder;
pub mod dispatcher;
pub mod error;
pub mod types;

pub use decoder::{CALLS_FIELD, decode, decode_str, decode_value};
pub use dispatcher::{BatchDispatcher, compose_instruction};
pub use error::BatchError;
pub use types::{Batch, BatchPhase, WorkItem};
