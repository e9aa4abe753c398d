//! The block engine: receive → compute → broadcast → crank.
//!
//! A [`Block`] is a cheaply cloneable handle to one executing unit. Its
//! activity is the [`Block::serve`] loop, which gathers one message per
//! input, runs the kernel once, and forwards the outputs to every
//! connection — suspending at each wait to honor interrupts. All mutation
//! of the wiring goes through the interrupt channel and is applied under
//! the routing write lock, so edits never race a running kernel.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};

use crate::error::BlockError;
use crate::interrupt::Interrupt;
use crate::library::{Kernel, KernelContext, MessageMap, Spec};
use crate::message::Message;
use crate::path::Path;
use crate::route::{Connection, ConnectionId, Output, Route, RouteId};
use crate::store::Store;

// Capacity-1 mailboxes are the closest tokio analogue of a rendezvous
// channel: a producer is throttled by its slowest consumer after at most
// one in-flight message per edge.
const MAILBOX_CAPACITY: usize = 1;
const INTERRUPT_CAPACITY: usize = 1;

/// Wiring shared between the engine and the mutation surface.
#[derive(Debug)]
struct Routing {
    inputs: Vec<Route>,
    outputs: Vec<Output>,
}

/// Cycle-local engine state. Only the serving task touches it.
#[derive(Default)]
struct CycleState {
    input_values: MessageMap,
    output_values: MessageMap,
    manifest: BTreeSet<(String, ConnectionId)>,
    processed: bool,
}

impl CycleState {
    fn crank(&mut self) {
        self.input_values.clear();
        self.output_values.clear();
        self.manifest.clear();
        self.processed = false;
    }
}

/// Engine-owned state. Lives behind a mutex rather than inside the serving
/// task so that mailboxes and the internal map survive a kernel panic; the
/// supervisor re-locks it to reset and restart.
struct EngineCore {
    mailboxes: Vec<mpsc::Receiver<Message>>,
    interrupts: mpsc::Receiver<Interrupt>,
    state: CycleState,
    internal: MessageMap,
    kernel: Arc<dyn Kernel>,
    store: Store,
}

impl EngineCore {
    /// Run cycles until a phase yields an interrupt.
    async fn run_cycles(&mut self, routing: &Routing) -> Interrupt {
        loop {
            if let Some(interrupt) = self.receive(routing).await {
                return interrupt;
            }
            if !self.state.processed {
                if let Some(interrupt) = self.compute().await {
                    // processed stays false: an interrupted kernel re-runs
                    // once the mutation is applied
                    return interrupt;
                }
                self.state.processed = true;
            }
            if let Some(interrupt) = self.broadcast(routing).await {
                return interrupt;
            }
            self.state.crank();
        }
    }

    /// Wait until every input index has a value for this cycle.
    async fn receive(&mut self, routing: &Routing) -> Option<Interrupt> {
        for (index, input) in routing.inputs.iter().enumerate() {
            let id = RouteId(index);
            if self.state.input_values.contains_key(&id) {
                continue;
            }
            if let Some(value) = &input.value {
                self.state.input_values.insert(id, value.clone());
                continue;
            }

            let mailbox = &mut self.mailboxes[index];
            let arrival = tokio::select! {
                message = mailbox.recv() => Ok(message),
                interrupt = self.interrupts.recv() => Err(interrupt),
            };
            match arrival {
                Ok(Some(message)) => {
                    self.state
                        .input_values
                        .insert(id, input.path.resolve(&message));
                }
                Ok(None) => {
                    // every sender for this mailbox is gone; only a
                    // mutation or stop can unstick the input
                    let interrupt = self.interrupts.recv().await;
                    return Some(interrupt.unwrap_or(Interrupt::Stop));
                }
                Err(interrupt) => return Some(interrupt.unwrap_or(Interrupt::Stop)),
            }
        }
        None
    }

    /// Invoke the kernel once for this cycle.
    async fn compute(&mut self) -> Option<Interrupt> {
        let kernel = Arc::clone(&self.kernel);
        let ctx = KernelContext {
            inputs: &self.state.input_values,
            outputs: &mut self.state.output_values,
            internal: &mut self.internal,
            store: &self.store,
            interrupts: &mut self.interrupts,
        };
        kernel.execute(ctx).await
    }

    /// Forward the kernel's outputs to every connection on every output.
    async fn broadcast(&mut self, routing: &Routing) -> Option<Interrupt> {
        for (index, output) in routing.outputs.iter().enumerate() {
            if output.is_empty() {
                // nothing to deliver to; park until wiring exists or stop
                // is requested
                let interrupt = self.interrupts.recv().await;
                return Some(interrupt.unwrap_or(Interrupt::Stop));
            }

            let message = self
                .state
                .output_values
                .get(&RouteId(index))
                .cloned()
                .unwrap_or(Message::Null);
            for (connection_id, sender) in output.iter() {
                let served = (output.name.clone(), connection_id);
                if self.state.manifest.contains(&served) {
                    continue;
                }

                let delivery = tokio::select! {
                    result = sender.send(message.clone()) => Ok(result),
                    interrupt = self.interrupts.recv() => Err(interrupt),
                };
                match delivery {
                    Ok(Ok(())) => {
                        self.state.manifest.insert(served);
                    }
                    Ok(Err(_)) => {
                        // receiver dropped; mark it served so a dead
                        // consumer cannot wedge the cycle
                        self.state.manifest.insert(served);
                    }
                    Err(interrupt) => return Some(interrupt.unwrap_or(Interrupt::Stop)),
                }
            }
        }
        None
    }
}

/// Apply a mutation record under the routing write lock. Returns whether
/// the activity should continue.
fn apply_interrupt(interrupt: Interrupt, routing: &mut Routing) -> bool {
    match interrupt {
        Interrupt::SetValue { route, value } => {
            match routing.inputs.get_mut(route.0) {
                Some(input) => input.value = Some(value),
                None => log::warn!("set value on unknown route {}", route),
            }
            true
        }
        Interrupt::SetPath { route, path } => {
            match routing.inputs.get_mut(route.0) {
                Some(input) => {
                    input.path = path;
                    input.value = None;
                }
                None => log::warn!("set path on unknown route {}", route),
            }
            true
        }
        Interrupt::Connect { output, connection } => {
            match routing.outputs.get_mut(output.0) {
                Some(port) => port.connect(connection),
                None => log::warn!("connect on unknown output {}", output),
            }
            true
        }
        Interrupt::Disconnect { output, connection } => {
            match routing.outputs.get_mut(output.0) {
                Some(port) => {
                    port.disconnect(&connection);
                }
                None => log::warn!("disconnect on unknown output {}", output),
            }
            true
        }
        Interrupt::Stop => false,
    }
}

/// A snapshot of one output port's wiring.
#[derive(Clone, Debug)]
pub struct OutputSnapshot {
    /// Port name from the block's spec.
    pub name: String,
    /// Connections currently on the output, in id order.
    pub connections: Vec<ConnectionId>,
}

/// A handle to one executing unit of a dataflow graph.
///
/// Cloning is cheap and every clone addresses the same block. The handle
/// is the graph surface: snapshot getters, mutators (which submit
/// interrupt records), and [`Block::serve`], the activity itself — usually
/// driven by a [`Supervisor`](crate::Supervisor).
#[derive(Clone)]
pub struct Block {
    routing: Arc<RwLock<Routing>>,
    core: Arc<Mutex<EngineCore>>,
    interrupt_tx: mpsc::Sender<Interrupt>,
    mailbox_ids: Arc<Vec<ConnectionId>>,
    mailbox_txs: Arc<Vec<mpsc::Sender<Message>>>,
    output_count: usize,
    store: Store,
}

impl Block {
    /// Create a block from a spec, with a private key-value store.
    pub fn new(spec: Spec) -> Self {
        Self::with_store(spec, Store::new())
    }

    /// Create a block from a spec, sharing the given key-value store.
    pub fn with_store(spec: Spec, store: Store) -> Self {
        let mut inputs = Vec::with_capacity(spec.inputs.len());
        let mut mailboxes = Vec::with_capacity(spec.inputs.len());
        let mut mailbox_ids = Vec::with_capacity(spec.inputs.len());
        let mut mailbox_txs = Vec::with_capacity(spec.inputs.len());
        for pin in &spec.inputs {
            let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
            inputs.push(Route::new(&pin.name));
            mailboxes.push(rx);
            mailbox_ids.push(ConnectionId::new());
            mailbox_txs.push(tx);
        }

        let outputs = spec
            .outputs
            .iter()
            .map(|pin| Output::new(&pin.name))
            .collect::<Vec<_>>();
        let output_count = outputs.len();

        let (interrupt_tx, interrupt_rx) = mpsc::channel(INTERRUPT_CAPACITY);

        Block {
            routing: Arc::new(RwLock::new(Routing { inputs, outputs })),
            core: Arc::new(Mutex::new(EngineCore {
                mailboxes,
                interrupts: interrupt_rx,
                state: CycleState::default(),
                internal: MessageMap::new(),
                kernel: Arc::clone(&spec.kernel),
                store: store.clone(),
            })),
            interrupt_tx,
            mailbox_ids: Arc::new(mailbox_ids),
            mailbox_txs: Arc::new(mailbox_txs),
            output_count,
            store,
        }
    }

    /// Number of input routes.
    pub fn input_count(&self) -> usize {
        self.mailbox_txs.len()
    }

    /// Number of output ports.
    pub fn output_count(&self) -> usize {
        self.output_count
    }

    /// The block's key-value store handle.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Snapshot an input route: name, current path, pinned value.
    pub async fn input(&self, id: RouteId) -> Option<Route> {
        self.routing.read().await.inputs.get(id.0).cloned()
    }

    /// Snapshot an output port's wiring.
    pub async fn output(&self, id: RouteId) -> Option<OutputSnapshot> {
        let routing = self.routing.read().await;
        routing.outputs.get(id.0).map(|output| OutputSnapshot {
            name: output.name.clone(),
            connections: output.connection_ids(),
        })
    }

    /// A connection feeding this block's input `id`, for wiring into some
    /// upstream block's output.
    pub fn connection(&self, id: RouteId) -> Option<Connection> {
        let tx = self.mailbox_txs.get(id.0)?.clone();
        let mailbox_id = *self.mailbox_ids.get(id.0)?;
        Some(Connection::new(mailbox_id, tx))
    }

    /// Pin a constant on an input route.
    pub async fn route_value(&self, id: RouteId, value: Message) -> Result<(), BlockError> {
        self.check_route(id)?;
        self.submit(Interrupt::SetValue { route: id, value }).await
    }

    /// Replace an input route's extraction path, clearing any pinned
    /// value.
    pub async fn route_path(&self, id: RouteId, path: Path) -> Result<(), BlockError> {
        self.check_route(id)?;
        self.submit(Interrupt::SetPath { route: id, path }).await
    }

    /// Add a connection to an output.
    pub async fn connect(&self, id: RouteId, connection: Connection) -> Result<(), BlockError> {
        self.check_output(id)?;
        self.submit(Interrupt::Connect {
            output: id,
            connection,
        })
        .await
    }

    /// Remove a connection from an output.
    pub async fn disconnect(
        &self,
        id: RouteId,
        connection: ConnectionId,
    ) -> Result<(), BlockError> {
        self.check_output(id)?;
        self.submit(Interrupt::Disconnect {
            output: id,
            connection,
        })
        .await
    }

    /// Request termination of the block's activity.
    pub async fn stop(&self) -> Result<(), BlockError> {
        self.submit(Interrupt::Stop).await
    }

    /// Run the block's activity until stopped. Cycles run back to back;
    /// each interrupt is applied under the routing write lock between
    /// waits.
    pub async fn serve(&self) {
        let mut core = self.core.lock().await;
        loop {
            let interrupt = {
                let routing = self.routing.read().await;
                core.run_cycles(&routing).await
            };
            let proceed = {
                let mut routing = self.routing.write().await;
                apply_interrupt(interrupt, &mut routing)
            };
            if !proceed {
                // refuse further mutations; senders see Terminated
                core.interrupts.close();
                return;
            }
        }
    }

    /// Reset cycle-local state after a panic, keeping routing and the
    /// internal map. Used by the supervisor before a restart.
    pub(crate) async fn reset_cycle(&self) {
        let mut core = self.core.lock().await;
        core.state.crank();
    }

    /// Close the interrupt channel of a block that will never serve again.
    pub(crate) async fn seal(&self) {
        let mut core = self.core.lock().await;
        core.interrupts.close();
    }

    async fn submit(&self, interrupt: Interrupt) -> Result<(), BlockError> {
        self.interrupt_tx
            .send(interrupt)
            .await
            .map_err(|_| BlockError::Terminated)
    }

    fn check_route(&self, id: RouteId) -> Result<(), BlockError> {
        if id.0 < self.input_count() {
            Ok(())
        } else {
            Err(BlockError::NoSuchRoute(id))
        }
    }

    fn check_output(&self, id: RouteId) -> Result<(), BlockError> {
        if id.0 < self.output_count {
            Ok(())
        } else {
            Err(BlockError::NoSuchOutput(id))
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("inputs", &self.input_count())
            .field("outputs", &self.output_count)
            .finish_non_exhaustive()
    }
}
