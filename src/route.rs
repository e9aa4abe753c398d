//! Input and output ports and their wiring.
//!
//! A block's inputs ([`Route`]) and outputs ([`Output`]) are addressed by
//! stable zero-based [`RouteId`]s. An output holds a set of
//! [`Connection`]s, each the send end of some other block's input mailbox.

use std::collections::BTreeMap;
use std::fmt;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::BlockError;
use crate::message::Message;
use crate::path::Path;

/// Stable zero-based index of an input or output port within a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteId(pub usize);

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for RouteId {
    fn from(index: usize) -> Self {
        RouteId(index)
    }
}

/// Identity of an input mailbox, minted when its block is created.
///
/// Connections carrying the same id address the same mailbox, which gives
/// an output's connection set its set semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub(crate) fn new() -> Self {
        ConnectionId(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The send end of some other block's input mailbox.
///
/// Obtained from [`Block::connection`](crate::Block::connection) and handed
/// to a source block's `connect`. Cloning yields another handle to the same
/// mailbox.
#[derive(Clone, Debug)]
pub struct Connection {
    id: ConnectionId,
    tx: mpsc::Sender<Message>,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, tx: mpsc::Sender<Message>) -> Self {
        Connection { id, tx }
    }

    /// The identity of the mailbox this connection feeds.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Push a message into the mailbox from outside the graph.
    ///
    /// This is the programmatic ingress for external collaborators; inside
    /// the graph the engine delivers through connections itself. Applies
    /// the same backpressure as any inter-block send.
    pub async fn deliver(&self, message: Message) -> Result<(), BlockError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| BlockError::Terminated)
    }

    pub(crate) fn sender(&self) -> &mpsc::Sender<Message> {
        &self.tx
    }

    /// A free-standing connection backed by a fresh mailbox; the receive
    /// half is returned for the caller to consume. Taps a block's output
    /// from outside the graph.
    pub fn tap() -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(1);
        (Connection::new(ConnectionId::new(), tx), rx)
    }
}

/// An input port: a named endpoint with an extraction path and an optional
/// pinned value.
///
/// If `value` is pinned, it feeds every cycle and the mailbox is not read.
/// The mailbox itself is engine-owned state aligned by index.
#[derive(Clone, Debug)]
pub struct Route {
    /// Human-readable port name from the block's spec.
    pub name: String,
    /// Selector applied to arriving messages before they enter the input
    /// map. Defaults to the identity.
    pub path: Path,
    /// Pinned constant. Set through `SetValue`; cleared by `SetPath`.
    pub value: Option<Message>,
}

impl Route {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Route {
            name: name.into(),
            path: Path::identity(),
            value: None,
        }
    }
}

/// An output port: a name plus the set of outgoing connections.
#[derive(Debug, Default)]
pub struct Output {
    /// Human-readable port name from the block's spec.
    pub name: String,
    connections: BTreeMap<ConnectionId, mpsc::Sender<Message>>,
}

impl Output {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Output {
            name: name.into(),
            connections: BTreeMap::new(),
        }
    }

    /// Add a connection. Idempotent: connecting the same mailbox twice
    /// keeps a single entry.
    pub fn connect(&mut self, connection: Connection) {
        self.connections
            .insert(connection.id, connection.tx);
    }

    /// Remove a connection by id. Returns whether it was present.
    pub fn disconnect(&mut self, id: &ConnectionId) -> bool {
        self.connections.remove(id).is_some()
    }

    /// Number of connections on this output.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether this output has no connections.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Ids of the connections on this output, in id order.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    pub(crate) fn iter(
        &self,
    ) -> impl Iterator<Item = (ConnectionId, &mpsc::Sender<Message>)> {
        self.connections.iter().map(|(id, tx)| (*id, tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_defaults() {
        let route = Route::new("in");
        assert_eq!(route.name, "in");
        assert!(route.path.is_identity());
        assert!(route.value.is_none());
    }

    #[test]
    fn output_set_semantics() {
        let mut output = Output::new("out");
        let (connection, _rx) = Connection::tap();
        let id = connection.id();

        output.connect(connection.clone());
        output.connect(connection);
        assert_eq!(output.len(), 1);

        assert!(output.disconnect(&id));
        assert!(!output.disconnect(&id));
        assert!(output.is_empty());
    }

    #[test]
    fn distinct_taps_are_distinct_connections() {
        let mut output = Output::new("out");
        let (a, _rx_a) = Connection::tap();
        let (b, _rx_b) = Connection::tap();
        assert_ne!(a.id(), b.id());

        output.connect(a);
        output.connect(b);
        assert_eq!(output.len(), 2);
        assert_eq!(output.connection_ids().len(), 2);
    }

    #[tokio::test]
    async fn tap_delivers() {
        let (connection, mut rx) = Connection::tap();
        connection.deliver(Message::Number(4.0)).await.unwrap();
        assert_eq!(rx.recv().await, Some(Message::Number(4.0)));
    }

    #[tokio::test]
    async fn deliver_to_dropped_mailbox_errors() {
        let (connection, rx) = Connection::tap();
        drop(rx);
        assert!(connection.deliver(Message::Null).await.is_err());
    }
}
