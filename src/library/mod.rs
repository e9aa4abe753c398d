//! The kernel contract and the library of built-in block specs.
//!
//! A [`Spec`] is the static description of a block type: ordered input and
//! output pins plus the [`Kernel`] that computes one cycle. [`library`]
//! returns the full set of built-ins, keyed by name.

pub mod dyads;
pub mod keyvalue;
pub mod mechanisms;
pub mod random;

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::interrupt::Interrupt;
use crate::message::Message;
use crate::route::RouteId;
use crate::store::Store;

/// Per-cycle mapping from port index to message.
pub type MessageMap = BTreeMap<RouteId, Message>;

/// A named port declaration in a [`Spec`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pin {
    /// Human-readable port name.
    pub name: String,
}

impl Pin {
    /// Declare a pin.
    pub fn new(name: impl Into<String>) -> Self {
        Pin { name: name.into() }
    }
}

/// Static description of a block type: input pins, output pins, kernel.
#[derive(Clone)]
pub struct Spec {
    /// Ordered input port declarations.
    pub inputs: Vec<Pin>,
    /// Ordered output port declarations.
    pub outputs: Vec<Pin>,
    /// The computation run once per cycle.
    pub kernel: Arc<dyn Kernel>,
}

impl fmt::Debug for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spec")
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

/// Everything a kernel sees during one invocation.
pub struct KernelContext<'a> {
    /// This cycle's gathered inputs, index → message.
    pub inputs: &'a MessageMap,
    /// Output map the kernel populates, index → message.
    pub outputs: &'a mut MessageMap,
    /// Persistent per-block scratch, retained across cycles.
    pub internal: &'a mut MessageMap,
    /// The block's key-value store.
    pub store: &'a Store,
    /// The block's interrupt channel, for cooperative cancellation during
    /// long suspensions.
    pub interrupts: &'a mut mpsc::Receiver<Interrupt>,
}

static NULL_MESSAGE: Message = Message::Null;

impl KernelContext<'_> {
    /// The message gathered for an input index; null if absent.
    pub fn input(&self, index: usize) -> &Message {
        self.inputs.get(&RouteId(index)).unwrap_or(&NULL_MESSAGE)
    }

    /// Populate an output index.
    pub fn set_output(&mut self, index: usize, message: Message) {
        self.outputs.insert(RouteId(index), message);
    }
}

/// The pure computation of a block.
///
/// A kernel must do exactly one of:
/// - populate every declared output and return `None`;
/// - place an error-typed message on output 0 and return `None`;
/// - return the interrupt it received from `ctx.interrupts`, handing it to
///   the engine (kernels with long internal waits must select on the
///   interrupt channel; a closed channel is returned as
///   [`Interrupt::Stop`]).
///
/// Kernels never panic on malformed input: a failed variant check becomes
/// an error message on output 0.
#[async_trait]
pub trait Kernel: Send + Sync {
    /// Run one cycle's computation.
    async fn execute(&self, ctx: KernelContext<'_>) -> Option<Interrupt>;
}

/// Where the `log` kernel writes its lines.
///
/// Cloning shares the underlying writer. The default sink is stdout; tests
/// capture by handing any [`Write`] to [`DiagnosticSink::from_writer`].
#[derive(Clone)]
pub struct DiagnosticSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl DiagnosticSink {
    /// A sink that writes to stdout.
    pub fn stdout() -> Self {
        Self::from_writer(std::io::stdout())
    }

    /// A sink backed by an arbitrary writer.
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        DiagnosticSink {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Write one line to the sink.
    pub fn emit(&self, line: &str) {
        let mut writer = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = writeln!(writer, "{}", line) {
            log::warn!("diagnostic sink write failed: {}", err);
        }
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        DiagnosticSink::stdout()
    }
}

impl fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DiagnosticSink(..)")
    }
}

/// The set of all built-in block specs, keyed by name. The `log` kernel
/// writes to stdout.
pub fn library() -> BTreeMap<String, Spec> {
    library_with(DiagnosticSink::stdout())
}

/// The set of all built-in block specs with `log` writing to the given
/// sink.
pub fn library_with(diagnostics: DiagnosticSink) -> BTreeMap<String, Spec> {
    let mut specs = BTreeMap::new();
    let mut add = |name: &str, spec: Spec| {
        specs.insert(name.to_string(), spec);
    };

    // mechanisms
    add("identity", mechanisms::identity());
    add("sink", mechanisms::sink());
    add("log", mechanisms::log(diagnostics));
    add("delay", mechanisms::delay());
    add("set", mechanisms::set());
    add("latch", mechanisms::latch());
    add("gate", mechanisms::gate());
    add("head", mechanisms::head());
    add("tail", mechanisms::tail());
    add("append", mechanisms::append());
    // dyads
    add("+", dyads::addition());
    add("-", dyads::subtraction());
    add("×", dyads::multiplication());
    add("÷", dyads::division());
    add("^", dyads::exponentiation());
    add("mod", dyads::modulation());
    add(">", dyads::greater_than());
    add("<", dyads::less_than());
    add("==", dyads::equal_to());
    add("!=", dyads::not_equal_to());
    // random sources
    add("uniform", random::uniform());
    add("normal", random::normal());
    add("Zipf", random::zipf());
    add("Poisson", random::poisson());
    add("Bernoulli", random::bernoulli());
    // keyvalue
    add("kvGet", keyvalue::kv_get());
    add("kvSet", keyvalue::kv_set());
    add("kvClear", keyvalue::kv_clear());
    add("kvDump", keyvalue::kv_dump());
    add("kvDelete", keyvalue::kv_delete());
    // stateful
    add("first", mechanisms::first());

    specs
}
