//! Batch orchestration for Captioner.
//!
//! Turns a batch request into one concurrent generation call per item and
//! joins the replies back into input order.

pub mod batch;

pub use batch::{
    Batch, BatchDispatcher, BatchError, BatchPhase, WorkItem, compose_instruction, decode,
    decode_str, decode_value,
};
