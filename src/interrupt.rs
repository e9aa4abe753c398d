//! Tagged mutation records delivered through a block's interrupt channel.
//!
//! All observable mutation of a running block flows through one channel as
//! data, giving every wiring edit a single serialization point. The engine
//! applies a record under the routing write lock, so mutators always see a
//! consistent snapshot and never race a running kernel.

use crate::message::Message;
use crate::path::Path;
use crate::route::{Connection, ConnectionId, RouteId};

/// A mutation (or stop request) applied between engine waits.
///
/// A record preempts whatever wait the block is in; after it is applied the
/// cycle resumes exactly where its skip-guards (input map, `processed`
/// flag, manifest) left it. `Stop` terminates the block instead.
#[derive(Clone, Debug)]
pub enum Interrupt {
    /// Pin a constant on an input route.
    SetValue {
        /// Input to pin.
        route: RouteId,
        /// Value fed to every subsequent cycle in place of the mailbox.
        value: Message,
    },

    /// Replace an input route's extraction path. Clears any pinned value.
    SetPath {
        /// Input to repath.
        route: RouteId,
        /// New selector applied to arriving messages.
        path: Path,
    },

    /// Add a connection to an output's set.
    Connect {
        /// Output to extend.
        output: RouteId,
        /// Send end of the downstream mailbox.
        connection: Connection,
    },

    /// Remove a connection from an output's set.
    Disconnect {
        /// Output to shrink.
        output: RouteId,
        /// Identity of the connection to drop.
        connection: ConnectionId,
    },

    /// Terminate the block's activity.
    Stop,
}
