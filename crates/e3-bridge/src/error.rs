//! Bridge error types

use std::io;

use thiserror::Error;

/// Failure to hand a descriptor to the transport
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Publish to '{topic}' rejected: {reason}")]
    Rejected { topic: String, reason: String },

    #[error("Failed to write descriptor: {0}")]
    Io(#[from] io::Error),
}

/// Errors that stop a simulation run
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Failed to read simulation input: {0}")]
    Input(#[source] io::Error),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

pub type PublishResult<T> = Result<T, PublishError>;
pub type BridgeResult<T> = Result<T, BridgeError>;
