//! # Manifold
//!
//! A runtime for executing **dataflow graphs** of small, composable
//! computational units ("blocks") that communicate by passing discrete
//! messages along typed ports.
//!
//! ## Core Concepts
//!
//! ### Blocks
//!
//! A **Block** is one executing unit: a perpetual receive → compute →
//! broadcast → crank cycle driven by its own tokio task. Each cycle
//! gathers one message per input, runs the block's kernel exactly once,
//! and forwards every output to every connected downstream port.
//!
//! ### Kernels
//!
//! A **Kernel** is the pure computation of a block, expressed over
//! index-keyed input/output maps plus a persistent internal scratch map
//! and a shared key-value store. The built-in library ([`library`]) covers
//! plumbing (identity, sink, log, delay), steering (latch, gate), stream
//! surgery (head, tail, append), arithmetic and comparison dyads, random
//! sources, and key-value access.
//!
//! ### Routes and Connections
//!
//! A block's inputs are **Routes**: named, channel-backed endpoints with
//! an extraction [`Path`] and an optional pinned constant. Outputs hold
//! sets of **Connections** — send ends of other blocks' input mailboxes.
//! Channels are capacity-1, so a fast producer is throttled by its
//! slowest consumer.
//!
//! ### Interrupts
//!
//! All mutation of a running block (pinning values, changing paths,
//! wiring and unwiring) travels through its interrupt channel as tagged
//! records. An interrupt preempts any engine wait, is applied atomically
//! under the routing write lock, and the cycle resumes without losing or
//! duplicating deliveries — a per-cycle manifest checkpoints what has
//! already been sent.
//!
//! ### Supervision
//!
//! The [`Supervisor`] runs one activity per block, restarts panicked
//! activities with fresh cycle state (wiring survives), bounds the
//! restart rate, and propagates stop.
//!
//! ## Example
//!
//! ```ignore
//! use manifold::{library, Block, Connection, Message, RouteId, Supervisor};
//!
//! let specs = library::library();
//! let adder = Block::new(specs["+"].clone());
//!
//! let supervisor = Supervisor::new();
//! let token = supervisor.add(adder.clone()).await;
//!
//! // pin both addends and tap the sum
//! let (tap, mut sums) = Connection::tap();
//! adder.connect(RouteId(0), tap).await?;
//! adder.route_value(RouteId(0), Message::Number(2.0)).await?;
//! adder.route_value(RouteId(1), Message::Number(3.0)).await?;
//!
//! assert_eq!(sums.recv().await, Some(Message::Number(5.0)));
//! supervisor.remove(token).await?;
//! ```

pub mod block;
pub mod duration;
pub mod error;
pub mod interrupt;
pub mod library;
pub mod message;
pub mod path;
pub mod route;
pub mod store;
pub mod supervisor;

pub use block::{Block, OutputSnapshot};
pub use duration::{parse_duration, DurationError};
pub use error::{BlockError, SupervisorError};
pub use interrupt::Interrupt;
pub use library::{
    library, library_with, DiagnosticSink, Kernel, KernelContext, MessageMap, Pin, Spec,
};
pub use message::Message;
pub use path::{Path, PathError};
pub use route::{Connection, ConnectionId, Output, Route, RouteId};
pub use store::Store;
pub use supervisor::{ActivityState, Supervisor, SupervisorConfig, Token};
