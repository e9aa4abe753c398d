//! Random-source kernels. Distribution parameters arrive as ordinary
//! inputs, typically pinned as route values.

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Normal, Poisson, Zipf};

use crate::interrupt::Interrupt;
use crate::message::Message;

use super::{Kernel, KernelContext, Pin, Spec};

/// Uniform samples a float in [min, max).
pub fn uniform() -> Spec {
    Spec {
        inputs: vec![Pin::new("min"), Pin::new("max")],
        outputs: vec![Pin::new("sample")],
        kernel: Arc::new(UniformKernel),
    }
}

struct UniformKernel;

#[async_trait]
impl Kernel for UniformKernel {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        let (min, max) = match (ctx.input(0).as_number(), ctx.input(1).as_number()) {
            (Some(min), Some(max)) => (min, max),
            _ => {
                ctx.set_output(0, Message::error("uniform requires numeric min and max"));
                return None;
            }
        };
        if !(min < max) {
            ctx.set_output(0, Message::error("uniform requires min < max"));
            return None;
        }
        let sample = rand::thread_rng().gen_range(min..max);
        ctx.set_output(0, Message::Number(sample));
        None
    }
}

/// Normal samples a normally distributed float.
pub fn normal() -> Spec {
    Spec {
        inputs: vec![Pin::new("mean"), Pin::new("stddev")],
        outputs: vec![Pin::new("sample")],
        kernel: Arc::new(NormalKernel),
    }
}

struct NormalKernel;

#[async_trait]
impl Kernel for NormalKernel {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        let (mean, stddev) = match (ctx.input(0).as_number(), ctx.input(1).as_number()) {
            (Some(mean), Some(stddev)) => (mean, stddev),
            _ => {
                ctx.set_output(0, Message::error("normal requires numeric mean and stddev"));
                return None;
            }
        };
        match Normal::new(mean, stddev) {
            Ok(distribution) => {
                let sample = distribution.sample(&mut rand::thread_rng());
                ctx.set_output(0, Message::Number(sample));
            }
            Err(err) => ctx.set_output(0, Message::error(format!("normal: {}", err))),
        }
        None
    }
}

/// Zipf samples from a Zipf distribution over {1, ..., n}.
pub fn zipf() -> Spec {
    Spec {
        inputs: vec![Pin::new("n"), Pin::new("exponent")],
        outputs: vec![Pin::new("sample")],
        kernel: Arc::new(ZipfKernel),
    }
}

struct ZipfKernel;

#[async_trait]
impl Kernel for ZipfKernel {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        let (n, exponent) = match (ctx.input(0).as_number(), ctx.input(1).as_number()) {
            (Some(n), Some(exponent)) => (n, exponent),
            _ => {
                ctx.set_output(0, Message::error("Zipf requires numeric n and exponent"));
                return None;
            }
        };
        if n < 1.0 {
            ctx.set_output(0, Message::error("Zipf requires n >= 1"));
            return None;
        }
        match Zipf::new(n as u64, exponent) {
            Ok(distribution) => {
                let sample = distribution.sample(&mut rand::thread_rng());
                ctx.set_output(0, Message::Number(sample));
            }
            Err(err) => ctx.set_output(0, Message::error(format!("Zipf: {}", err))),
        }
        None
    }
}

/// Poisson samples an event count with the given rate.
pub fn poisson() -> Spec {
    Spec {
        inputs: vec![Pin::new("lambda")],
        outputs: vec![Pin::new("sample")],
        kernel: Arc::new(PoissonKernel),
    }
}

struct PoissonKernel;

#[async_trait]
impl Kernel for PoissonKernel {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        let lambda = match ctx.input(0).as_number() {
            Some(lambda) => lambda,
            None => {
                ctx.set_output(0, Message::error("Poisson requires a numeric lambda"));
                return None;
            }
        };
        match Poisson::new(lambda) {
            Ok(distribution) => {
                let sample: f64 = distribution.sample(&mut rand::thread_rng());
                ctx.set_output(0, Message::Number(sample));
            }
            Err(err) => ctx.set_output(0, Message::error(format!("Poisson: {}", err))),
        }
        None
    }
}

/// Bernoulli samples a boolean that is true with probability p.
pub fn bernoulli() -> Spec {
    Spec {
        inputs: vec![Pin::new("p")],
        outputs: vec![Pin::new("sample")],
        kernel: Arc::new(BernoulliKernel),
    }
}

struct BernoulliKernel;

#[async_trait]
impl Kernel for BernoulliKernel {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        let p = match ctx.input(0).as_number() {
            Some(p) => p,
            None => {
                ctx.set_output(0, Message::error("Bernoulli requires a numeric p"));
                return None;
            }
        };
        match Bernoulli::new(p) {
            Ok(distribution) => {
                let sample = distribution.sample(&mut rand::thread_rng());
                ctx.set_output(0, Message::Bool(sample));
            }
            Err(err) => ctx.set_output(0, Message::error(format!("Bernoulli: {}", err))),
        }
        None
    }
}
