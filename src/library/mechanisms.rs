//! Mechanism kernels: plumbing, steering, and stream manipulation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::duration::parse_duration;
use crate::interrupt::Interrupt;
use crate::message::Message;
use crate::route::RouteId;

use super::{DiagnosticSink, Kernel, KernelContext, Pin, Spec};

/// Identity emits the inbound message immediately.
pub fn identity() -> Spec {
    Spec {
        inputs: vec![Pin::new("in")],
        outputs: vec![Pin::new("out")],
        kernel: Arc::new(Identity),
    }
}

struct Identity;

#[async_trait]
impl Kernel for Identity {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        let message = ctx.input(0).clone();
        ctx.set_output(0, message);
        None
    }
}

/// Sink discards the inbound message.
pub fn sink() -> Spec {
    Spec {
        inputs: vec![Pin::new("in")],
        outputs: vec![],
        kernel: Arc::new(Sink),
    }
}

struct Sink;

#[async_trait]
impl Kernel for Sink {
    async fn execute(&self, _ctx: KernelContext<'_>) -> Option<Interrupt> {
        None
    }
}

/// Log serializes the inbound message to JSON and writes it to the
/// diagnostic sink, one message per line.
pub fn log(sink: DiagnosticSink) -> Spec {
    Spec {
        inputs: vec![Pin::new("log")],
        outputs: vec![],
        kernel: Arc::new(Log { sink }),
    }
}

struct Log {
    sink: DiagnosticSink,
}

#[async_trait]
impl Kernel for Log {
    async fn execute(&self, ctx: KernelContext<'_>) -> Option<Interrupt> {
        match serde_json::to_string(ctx.input(0)) {
            Ok(line) => self.sink.emit(&line),
            Err(err) => log::warn!("log kernel failed to serialize message: {}", err),
        }
        None
    }
}

/// Delay emits the message on passthrough after the specified duration.
/// The wait honors interrupts; an interrupted delay re-runs from scratch
/// once the mutation is applied.
pub fn delay() -> Spec {
    Spec {
        inputs: vec![Pin::new("passthrough"), Pin::new("duration")],
        outputs: vec![Pin::new("passthrough")],
        kernel: Arc::new(Delay),
    }
}

struct Delay;

#[async_trait]
impl Kernel for Delay {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        let literal = match ctx.input(1).as_str() {
            Some(text) => text.to_string(),
            None => {
                ctx.set_output(0, Message::error("delay requires a duration string"));
                return None;
            }
        };
        let duration = match parse_duration(&literal) {
            Ok(duration) => duration,
            Err(err) => {
                ctx.set_output(0, Message::error(err.to_string()));
                return None;
            }
        };
        let passthrough = ctx.input(0).clone();

        let interrupted = tokio::select! {
            _ = tokio::time::sleep(duration) => None,
            interrupt = ctx.interrupts.recv() => Some(interrupt.unwrap_or(Interrupt::Stop)),
        };
        match interrupted {
            Some(interrupt) => Some(interrupt),
            None => {
                ctx.set_output(0, passthrough);
                None
            }
        }
    }
}

/// Set creates a single-key object from the key and value inputs.
pub fn set() -> Spec {
    Spec {
        inputs: vec![Pin::new("key"), Pin::new("value")],
        outputs: vec![Pin::new("object")],
        kernel: Arc::new(Set),
    }
}

struct Set;

#[async_trait]
impl Kernel for Set {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        let key = match ctx.input(0).as_str() {
            Some(key) => key.to_string(),
            None => {
                ctx.set_output(0, Message::error("set requires a string key"));
                return None;
            }
        };
        let value = ctx.input(1).clone();
        let object = [(key, value)].into_iter().collect();
        ctx.set_output(0, Message::Object(object));
        None
    }
}

/// Latch emits the inbound message on the 0th output if ctrl is true, and
/// the 1st output if ctrl is false; the other output carries null.
pub fn latch() -> Spec {
    Spec {
        inputs: vec![Pin::new("in"), Pin::new("ctrl")],
        outputs: vec![Pin::new("out"), Pin::new("out")],
        kernel: Arc::new(Latch),
    }
}

struct Latch;

#[async_trait]
impl Kernel for Latch {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        let ctrl = match ctx.input(1).as_bool() {
            Some(ctrl) => ctrl,
            None => {
                ctx.set_output(0, Message::error("latch ctrl requires a bool"));
                return None;
            }
        };
        let message = ctx.input(0).clone();
        if ctrl {
            ctx.set_output(0, message);
            ctx.set_output(1, Message::Null);
        } else {
            ctx.set_output(0, Message::Null);
            ctx.set_output(1, message);
        }
        None
    }
}

/// Gate emits the inbound message once a message has also arrived on its
/// trigger. The trigger's value is ignored; it only synchronizes.
pub fn gate() -> Spec {
    Spec {
        inputs: vec![Pin::new("in"), Pin::new("ctrl")],
        outputs: vec![Pin::new("out")],
        kernel: Arc::new(Gate),
    }
}

struct Gate;

#[async_trait]
impl Kernel for Gate {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        let message = ctx.input(0).clone();
        ctx.set_output(0, message);
        None
    }
}

/// Head emits the first element of the inbound array on one output and the
/// rest of the array on the other.
pub fn head() -> Spec {
    Spec {
        inputs: vec![Pin::new("in")],
        outputs: vec![Pin::new("head"), Pin::new("tail")],
        kernel: Arc::new(Head),
    }
}

struct Head;

#[async_trait]
impl Kernel for Head {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        let items = match ctx.input(0).as_array() {
            Some(items) if !items.is_empty() => items.to_vec(),
            Some(_) => {
                ctx.set_output(0, Message::error("head requires a non-empty array"));
                return None;
            }
            None => {
                ctx.set_output(0, Message::error("head requires an array"));
                return None;
            }
        };
        ctx.set_output(0, items[0].clone());
        ctx.set_output(1, Message::Array(items[1..].to_vec()));
        None
    }
}

/// Tail emits the last element of the inbound array on one output and
/// everything before it on the other.
pub fn tail() -> Spec {
    Spec {
        inputs: vec![Pin::new("in")],
        outputs: vec![Pin::new("tail"), Pin::new("head")],
        kernel: Arc::new(Tail),
    }
}

struct Tail;

#[async_trait]
impl Kernel for Tail {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        let items = match ctx.input(0).as_array() {
            Some(items) if !items.is_empty() => items.to_vec(),
            Some(_) => {
                ctx.set_output(0, Message::error("tail requires a non-empty array"));
                return None;
            }
            None => {
                ctx.set_output(0, Message::error("tail requires an array"));
                return None;
            }
        };
        ctx.set_output(0, items[items.len() - 1].clone());
        ctx.set_output(1, Message::Array(items[..items.len() - 1].to_vec()));
        None
    }
}

/// Append appends the supplied element to the supplied array.
pub fn append() -> Spec {
    Spec {
        inputs: vec![Pin::new("element"), Pin::new("array")],
        outputs: vec![Pin::new("array")],
        kernel: Arc::new(Append),
    }
}

struct Append;

#[async_trait]
impl Kernel for Append {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        let mut items = match ctx.input(1).as_array() {
            Some(items) => items.to_vec(),
            None => {
                ctx.set_output(0, Message::error("append requires an array"));
                return None;
            }
        };
        items.push(ctx.input(0).clone());
        ctx.set_output(0, Message::Array(items));
        None
    }
}

/// First emits true on its first invocation and false on every one after,
/// using the block's internal scratch as the marker.
pub fn first() -> Spec {
    Spec {
        inputs: vec![Pin::new("in")],
        outputs: vec![Pin::new("first")],
        kernel: Arc::new(First),
    }
}

struct First;

#[async_trait]
impl Kernel for First {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        let seen = ctx.internal.contains_key(&RouteId(0));
        if !seen {
            ctx.internal.insert(RouteId(0), Message::Bool(true));
        }
        ctx.set_output(0, Message::Bool(!seen));
        None
    }
}
