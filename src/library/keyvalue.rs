//! Key-value kernels over the block-scoped [`Store`](crate::Store).

use std::sync::Arc;

use async_trait::async_trait;

use crate::interrupt::Interrupt;
use crate::message::Message;

use super::{Kernel, KernelContext, Pin, Spec};

/// kvGet looks a key up in the store. A missing key yields an error
/// message.
pub fn kv_get() -> Spec {
    Spec {
        inputs: vec![Pin::new("key")],
        outputs: vec![Pin::new("value")],
        kernel: Arc::new(KvGet),
    }
}

struct KvGet;

#[async_trait]
impl Kernel for KvGet {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        let key = match ctx.input(0).as_str() {
            Some(key) => key.to_string(),
            None => {
                ctx.set_output(0, Message::error("kvGet requires a string key"));
                return None;
            }
        };
        match ctx.store.get(&key) {
            Some(value) => ctx.set_output(0, value),
            None => ctx.set_output(0, Message::error(format!("key not found: {}", key))),
        }
        None
    }
}

/// kvSet stores the value under the key and forwards the stored value.
pub fn kv_set() -> Spec {
    Spec {
        inputs: vec![Pin::new("key"), Pin::new("value")],
        outputs: vec![Pin::new("out")],
        kernel: Arc::new(KvSet),
    }
}

struct KvSet;

#[async_trait]
impl Kernel for KvSet {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        let key = match ctx.input(0).as_str() {
            Some(key) => key.to_string(),
            None => {
                ctx.set_output(0, Message::error("kvSet requires a string key"));
                return None;
            }
        };
        let value = ctx.input(1).clone();
        ctx.store.set(key, value.clone());
        ctx.set_output(0, value);
        None
    }
}

/// kvDelete removes a key, emitting whether it was present.
pub fn kv_delete() -> Spec {
    Spec {
        inputs: vec![Pin::new("key")],
        outputs: vec![Pin::new("out")],
        kernel: Arc::new(KvDelete),
    }
}

struct KvDelete;

#[async_trait]
impl Kernel for KvDelete {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        let key = match ctx.input(0).as_str() {
            Some(key) => key.to_string(),
            None => {
                ctx.set_output(0, Message::error("kvDelete requires a string key"));
                return None;
            }
        };
        let removed = ctx.store.delete(&key);
        ctx.set_output(0, Message::Bool(removed));
        None
    }
}

/// kvClear empties the store on any trigger message, emitting null.
pub fn kv_clear() -> Spec {
    Spec {
        inputs: vec![Pin::new("clear")],
        outputs: vec![Pin::new("out")],
        kernel: Arc::new(KvClear),
    }
}

struct KvClear;

#[async_trait]
impl Kernel for KvClear {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        ctx.store.clear();
        ctx.set_output(0, Message::Null);
        None
    }
}

/// kvDump emits an object copy of the store contents on any trigger
/// message.
pub fn kv_dump() -> Spec {
    Spec {
        inputs: vec![Pin::new("dump")],
        outputs: vec![Pin::new("object")],
        kernel: Arc::new(KvDump),
    }
}

struct KvDump;

#[async_trait]
impl Kernel for KvDump {
    async fn execute(&self, mut ctx: KernelContext<'_>) -> Option<Interrupt> {
        let contents = ctx.store.dump();
        ctx.set_output(0, Message::Object(contents));
        None
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use super::*;

    #[tokio::test]
    async fn set_then_get() {
        let mut harness = Harness::new(vec![Message::from("k"), Message::Number(5.0)]);
        assert!(harness.run(&kv_set()).await.is_none());
        assert_eq!(harness.output(0), &Message::Number(5.0));
        assert_eq!(harness.store.get("k"), Some(Message::Number(5.0)));

        let mut get = Harness::new(vec![Message::from("k")]);
        get.store = harness.store.clone();
        assert!(get.run(&kv_get()).await.is_none());
        assert_eq!(get.output(0), &Message::Number(5.0));
    }

    #[tokio::test]
    async fn get_missing_key_is_an_error() {
        let mut harness = Harness::new(vec![Message::from("absent")]);
        assert!(harness.run(&kv_get()).await.is_none());
        assert!(harness.output(0).is_error());
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let mut harness = Harness::new(vec![Message::from("k")]);
        harness.store.set("k", Message::Bool(true));
        assert!(harness.run(&kv_delete()).await.is_none());
        assert_eq!(harness.output(0), &Message::Bool(true));

        harness.outputs.clear();
        assert!(harness.run(&kv_delete()).await.is_none());
        assert_eq!(harness.output(0), &Message::Bool(false));
    }

    #[tokio::test]
    async fn clear_and_dump() {
        let mut harness = Harness::new(vec![Message::Null]);
        harness.store.set("a", Message::Number(1.0));
        harness.store.set("b", Message::Number(2.0));

        assert!(harness.run(&kv_dump()).await.is_none());
        let dump = harness.output(0).as_object().unwrap();
        assert_eq!(dump.len(), 2);
        assert_eq!(dump.get("a"), Some(&Message::Number(1.0)));

        harness.outputs.clear();
        assert!(harness.run(&kv_clear()).await.is_none());
        assert_eq!(harness.output(0), &Message::Null);
        assert!(harness.store.is_empty());
    }

    #[tokio::test]
    async fn non_string_keys_are_errors() {
        for spec in [kv_get(), kv_delete()] {
            let mut harness = Harness::new(vec![Message::Number(1.0)]);
            assert!(harness.run(&spec).await.is_none());
            assert!(harness.output(0).is_error());
        }

        let mut harness = Harness::new(vec![Message::Null, Message::Null]);
        assert!(harness.run(&kv_set()).await.is_none());
        assert!(harness.output(0).is_error());
    }
}
