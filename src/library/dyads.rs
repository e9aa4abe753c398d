//! Dyad kernels: arithmetic over numbers and value comparisons.

use std::sync::Arc;

use async_trait::async_trait;

use crate::interrupt::Interrupt;
use crate::message::Message;

use super::{Kernel, KernelContext, Pin, Spec};

/// A two-number kernel. Inputs failing the numeric check produce an error
/// message on output 0.
struct NumericDyad {
    label: &'static str,
    apply: fn(f64, f64) -> Message,
}

#[async_trait]
impl Kernel for NumericDyad {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        match (ctx.input(0).as_number(), ctx.input(1).as_number()) {
            (Some(lhs), Some(rhs)) => {
                let result = (self.apply)(lhs, rhs);
                ctx.set_output(0, result);
            }
            _ => ctx.set_output(
                0,
                Message::error(format!("{} requires numbers", self.label)),
            ),
        }
        None
    }
}

fn numeric(
    label: &'static str,
    pins: [&str; 3],
    apply: fn(f64, f64) -> Message,
) -> Spec {
    Spec {
        inputs: vec![Pin::new(pins[0]), Pin::new(pins[1])],
        outputs: vec![Pin::new(pins[2])],
        kernel: Arc::new(NumericDyad { label, apply }),
    }
}

/// Addition returns the sum of the addenda.
pub fn addition() -> Spec {
    numeric("addition", ["addend", "addend", "sum"], |a, b| {
        Message::Number(a + b)
    })
}

/// Subtraction returns the difference of the minuend - subtrahend.
pub fn subtraction() -> Spec {
    numeric(
        "subtraction",
        ["minuend", "subtrahend", "difference"],
        |a, b| Message::Number(a - b),
    )
}

/// Multiplication returns the product of the multiplicanda.
pub fn multiplication() -> Spec {
    numeric(
        "multiplication",
        ["multiplicand", "multiplicand", "product"],
        |a, b| Message::Number(a * b),
    )
}

/// Division returns the quotient of the dividend / divisor. Division by
/// zero follows IEEE 754: inf, -inf, or nan.
pub fn division() -> Spec {
    numeric("division", ["dividend", "divisor", "quotient"], |a, b| {
        Message::Number(a / b)
    })
}

/// Exponentiation returns the base raised to the exponent.
pub fn exponentiation() -> Spec {
    numeric("exponentiation", ["base", "exponent", "power"], |a, b| {
        Message::Number(a.powf(b))
    })
}

/// Modulation returns the remainder of the dividend mod divisor.
pub fn modulation() -> Spec {
    numeric("modulation", ["dividend", "divisor", "remainder"], |a, b| {
        Message::Number(a % b)
    })
}

/// GreaterThan returns true if value[0] > value[1] or false otherwise.
pub fn greater_than() -> Spec {
    numeric(">", ["value", "value", "IsGreaterThan"], |a, b| {
        Message::Bool(a > b)
    })
}

/// LessThan returns true if value[0] < value[1] or false otherwise.
pub fn less_than() -> Spec {
    numeric("<", ["value", "value", "IsLessThan"], |a, b| {
        Message::Bool(a < b)
    })
}

/// Structural equality over any pair of messages.
struct Equality {
    negate: bool,
}

#[async_trait]
impl Kernel for Equality {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        let equal = ctx.input(0) == ctx.input(1);
        ctx.set_output(0, Message::Bool(equal != self.negate));
        None
    }
}

/// EqualTo returns true if value[0] == value[1] or false otherwise.
pub fn equal_to() -> Spec {
    Spec {
        inputs: vec![Pin::new("value"), Pin::new("value")],
        outputs: vec![Pin::new("IsEqualTo")],
        kernel: Arc::new(Equality { negate: false }),
    }
}

/// NotEqualTo returns true if value[0] != value[1] or false otherwise.
pub fn not_equal_to() -> Spec {
    Spec {
        inputs: vec![Pin::new("value"), Pin::new("value")],
        outputs: vec![Pin::new("IsNotEqualTo")],
        kernel: Arc::new(Equality { negate: true }),
    }
}
