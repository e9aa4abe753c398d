//! Error types for the public runtime surface.
//!
//! Kernel-level faults (type mismatches, bad durations, kv misses) are not
//! errors at this level; they flow downstream as
//! [`Message::Error`](crate::Message::Error) values. These enums cover the
//! graph API itself.

use thiserror::Error;

use crate::route::RouteId;
use crate::supervisor::Token;

/// Errors from the block mutation surface.
#[derive(Debug, Error)]
pub enum BlockError {
    /// The block has no input route at this index.
    #[error("no input route {0}")]
    NoSuchRoute(RouteId),

    /// The block has no output at this index.
    #[error("no output {0}")]
    NoSuchOutput(RouteId),

    /// The block's activity has terminated; mutations can no longer be
    /// delivered.
    #[error("block terminated")]
    Terminated,
}

/// Errors from the supervisor surface.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// No supervised block is registered under this token.
    #[error("unknown supervision token {0}")]
    UnknownToken(Token),
}
