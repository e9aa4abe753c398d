//! End-to-end graph scenarios exercising the public surface: wiring,
//! value injection, interrupt interleaving, and clean shutdown.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::timeout;

use manifold::{
    library, library_with, Block, Connection, DiagnosticSink, Message, Path, RouteId,
    Spec, Supervisor,
};

const TICK: Duration = Duration::from_secs(5);

fn spec(name: &str) -> Spec {
    library()[name].clone()
}

fn spawn(block: &Block) -> tokio::task::JoinHandle<()> {
    let runner = block.clone();
    tokio::spawn(async move { runner.serve().await })
}

#[derive(Clone)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn new() -> Self {
        SharedBuffer(Arc::new(Mutex::new(Vec::new())))
    }

    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// `first → latch(ctrl)` with a source feeding both `first.in` and
/// `latch.in`: the first message is steered to out0, later ones to out1.
#[tokio::test]
async fn first_steers_a_latch() {
    let first = Block::new(spec("first"));
    let latch = Block::new(spec("latch"));
    let first_task = spawn(&first);
    let latch_task = spawn(&latch);

    first
        .connect(RouteId(0), latch.connection(RouteId(1)).unwrap())
        .await
        .unwrap();
    let (tap_true, mut out0) = Connection::tap();
    let (tap_false, mut out1) = Connection::tap();
    latch.connect(RouteId(0), tap_true).await.unwrap();
    latch.connect(RouteId(1), tap_false).await.unwrap();

    let trigger = first.connection(RouteId(0)).unwrap();
    let ingress = latch.connection(RouteId(0)).unwrap();

    trigger.deliver(Message::Null).await.unwrap();
    ingress.deliver(Message::Number(42.0)).await.unwrap();
    assert_eq!(
        timeout(TICK, out0.recv()).await.unwrap(),
        Some(Message::Number(42.0))
    );
    assert_eq!(timeout(TICK, out1.recv()).await.unwrap(), Some(Message::Null));

    trigger.deliver(Message::Null).await.unwrap();
    ingress.deliver(Message::Number(43.0)).await.unwrap();
    assert_eq!(timeout(TICK, out0.recv()).await.unwrap(), Some(Message::Null));
    assert_eq!(
        timeout(TICK, out1.recv()).await.unwrap(),
        Some(Message::Number(43.0))
    );

    latch.stop().await.unwrap();
    first.stop().await.unwrap();
    timeout(TICK, latch_task).await.unwrap().unwrap();
    timeout(TICK, first_task).await.unwrap().unwrap();
}

/// `constant 2 → + ← constant 3 → log`: the sum is serialized to the
/// diagnostic sink once per cycle.
#[tokio::test]
async fn constant_addition_reaches_the_log() {
    let buffer = SharedBuffer::new();
    let specs = library_with(DiagnosticSink::from_writer(buffer.clone()));

    let adder = Block::new(specs["+"].clone());
    let logger = Block::new(specs["log"].clone());
    let adder_task = spawn(&adder);
    let logger_task = spawn(&logger);

    adder
        .connect(RouteId(0), logger.connection(RouteId(0)).unwrap())
        .await
        .unwrap();
    adder
        .route_value(RouteId(0), Message::Number(2.0))
        .await
        .unwrap();
    adder
        .route_value(RouteId(1), Message::Number(3.0))
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + TICK;
    loop {
        let contents = buffer.contents();
        if contents.lines().count() >= 2 {
            assert!(contents.lines().all(|line| line == "5.0"));
            break;
        }
        assert!(tokio::time::Instant::now() < deadline);
        tokio::task::yield_now().await;
    }

    adder.stop().await.unwrap();
    logger.stop().await.unwrap();
    timeout(TICK, adder_task).await.unwrap().unwrap();
    timeout(TICK, logger_task).await.unwrap().unwrap();
}

/// `delay(100ms)` driven by a 50ms trigger: observed emissions are spaced
/// by at least the delay duration.
#[tokio::test(start_paused = true)]
async fn delay_paces_a_faster_trigger() {
    let delay = Block::new(spec("delay"));
    let task = spawn(&delay);

    delay
        .route_value(RouteId(1), Message::from("100ms"))
        .await
        .unwrap();
    let (tap, mut rx) = Connection::tap();
    delay.connect(RouteId(0), tap).await.unwrap();

    // five triggers at 50ms: the engine consumes all of them while the
    // tap is read four times, so the driver never wedges on a full
    // mailbox after the stop below
    let ingress = delay.connection(RouteId(0)).unwrap();
    let driver = tokio::spawn(async move {
        for n in 0..5 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if ingress.deliver(Message::Number(n as f64)).await.is_err() {
                return;
            }
        }
    });

    let mut stamps = Vec::new();
    for _ in 0..4 {
        timeout(TICK, rx.recv()).await.unwrap().unwrap();
        stamps.push(tokio::time::Instant::now());
    }
    for pair in stamps.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(100));
    }

    delay.stop().await.unwrap();
    timeout(TICK, task).await.unwrap().unwrap();
    let _ = driver.await;
}

/// A `+` fed a number and a string emits an error message and keeps
/// cycling; repairing the input restores sums.
#[tokio::test]
async fn type_mismatch_is_a_value_not_a_crash() {
    let adder = Block::new(spec("+"));
    let task = spawn(&adder);

    let (tap, mut rx) = Connection::tap();
    adder.connect(RouteId(0), tap).await.unwrap();
    adder
        .route_value(RouteId(0), Message::Number(2.0))
        .await
        .unwrap();
    adder.route_value(RouteId(1), Message::from("x")).await.unwrap();

    let out = timeout(TICK, rx.recv()).await.unwrap().unwrap();
    assert!(out.is_error());

    // the block is still alive: repair the bad addend and sums resume
    adder
        .route_value(RouteId(1), Message::Number(3.0))
        .await
        .unwrap();
    let deadline = tokio::time::Instant::now() + TICK;
    loop {
        let out = timeout(TICK, rx.recv()).await.unwrap().unwrap();
        if out == Message::Number(5.0) {
            break;
        }
        assert!(out.is_error());
        assert!(tokio::time::Instant::now() < deadline);
    }

    adder.stop().await.unwrap();
    timeout(TICK, task).await.unwrap().unwrap();
}

/// `head` fanned out to two consumers, stopped after one cycle: each
/// consumer sees exactly one message and the activity exits.
#[tokio::test]
async fn head_fan_out_then_stop() {
    let head = Block::new(spec("head"));
    let task = spawn(&head);

    let (tap_a, mut rx_a) = Connection::tap();
    let (tap_b, mut rx_b) = Connection::tap();
    head.connect(RouteId(0), tap_a).await.unwrap();
    head.connect(RouteId(0), tap_b).await.unwrap();

    let ingress = head.connection(RouteId(0)).unwrap();
    ingress
        .deliver(Message::from(vec![10.0, 20.0, 30.0]))
        .await
        .unwrap();

    assert_eq!(
        timeout(TICK, rx_a.recv()).await.unwrap(),
        Some(Message::Number(10.0))
    );
    assert_eq!(
        timeout(TICK, rx_b.recv()).await.unwrap(),
        Some(Message::Number(10.0))
    );

    // the tail output is unconnected, so the block is parked there; a
    // stop lands in that wait and the activity exits
    head.stop().await.unwrap();
    timeout(TICK, task).await.unwrap().unwrap();

    // exactly one delivery per consumer for the cycle
    assert!(rx_a.try_recv().is_err());
    assert!(rx_b.try_recv().is_err());
}

/// Disconnecting one of two connections while the block is wedged on a
/// full mailbox: the surviving connection still gets exactly one message
/// per cycle and the block advances.
#[tokio::test]
async fn disconnect_mid_broadcast_releases_the_cycle() {
    let block = Block::new(spec("identity"));
    let task = spawn(&block);

    let (tap_stuck, mut rx_stuck) = Connection::tap();
    let stuck_id = tap_stuck.id();
    let (tap_live, mut rx_live) = Connection::tap();
    block.connect(RouteId(0), tap_stuck).await.unwrap();
    block.connect(RouteId(0), tap_live).await.unwrap();

    let ingress = block.connection(RouteId(0)).unwrap();

    // cycle 1 fills both mailboxes; only the live tap is drained
    ingress.deliver(Message::Number(1.0)).await.unwrap();
    assert_eq!(
        timeout(TICK, rx_live.recv()).await.unwrap(),
        Some(Message::Number(1.0))
    );

    // cycle 2 wedges on the stuck tap's full mailbox (whichever order the
    // engine picks, the stuck connection cannot complete)
    ingress.deliver(Message::Number(2.0)).await.unwrap();
    block.disconnect(RouteId(0), stuck_id).await.unwrap();

    assert_eq!(
        timeout(TICK, rx_live.recv()).await.unwrap(),
        Some(Message::Number(2.0))
    );

    // the block advances to the next cycle
    ingress.deliver(Message::Number(3.0)).await.unwrap();
    assert_eq!(
        timeout(TICK, rx_live.recv()).await.unwrap(),
        Some(Message::Number(3.0))
    );

    // the stuck tap saw only the first cycle's message
    assert_eq!(rx_stuck.try_recv().unwrap(), Message::Number(1.0));
    assert!(rx_stuck.try_recv().is_err());

    block.stop().await.unwrap();
    timeout(TICK, task).await.unwrap().unwrap();
}

/// Round trip: `append` feeding `head` recovers the original first
/// element, with the appended element at the end of the tail.
#[tokio::test]
async fn append_then_head_round_trip() {
    let append = Block::new(spec("append"));
    let head = Block::new(spec("head"));
    let append_task = spawn(&append);
    let head_task = spawn(&head);

    append
        .connect(RouteId(0), head.connection(RouteId(0)).unwrap())
        .await
        .unwrap();
    let (tap_head, mut rx_head) = Connection::tap();
    let (tap_tail, mut rx_tail) = Connection::tap();
    head.connect(RouteId(0), tap_head).await.unwrap();
    head.connect(RouteId(1), tap_tail).await.unwrap();

    append
        .route_value(RouteId(0), Message::Number(9.0))
        .await
        .unwrap();
    let arrays = append.connection(RouteId(1)).unwrap();
    arrays
        .deliver(Message::from(vec![1.0, 2.0]))
        .await
        .unwrap();

    assert_eq!(
        timeout(TICK, rx_head.recv()).await.unwrap(),
        Some(Message::Number(1.0))
    );
    assert_eq!(
        timeout(TICK, rx_tail.recv()).await.unwrap(),
        Some(Message::from(vec![2.0, 9.0]))
    );

    append.stop().await.unwrap();
    head.stop().await.unwrap();
    timeout(TICK, append_task).await.unwrap().unwrap();
    timeout(TICK, head_task).await.unwrap().unwrap();
}

/// Round trip: `set(k, v)` feeding a downstream route with path `.k`
/// yields v.
#[tokio::test]
async fn set_then_path_extraction_round_trip() {
    let set = Block::new(spec("set"));
    let identity = Block::new(spec("identity"));
    let set_task = spawn(&set);
    let identity_task = spawn(&identity);

    set.connect(RouteId(0), identity.connection(RouteId(0)).unwrap())
        .await
        .unwrap();
    identity
        .route_path(RouteId(0), Path::parse(".k").unwrap())
        .await
        .unwrap();
    let (tap, mut rx) = Connection::tap();
    identity.connect(RouteId(0), tap).await.unwrap();

    // make sure the downstream path edit landed before data flows
    let deadline = tokio::time::Instant::now() + TICK;
    while identity.input(RouteId(0)).await.unwrap().path.is_identity() {
        assert!(tokio::time::Instant::now() < deadline);
        tokio::task::yield_now().await;
    }

    set.route_value(RouteId(0), Message::from("k")).await.unwrap();
    let values = set.connection(RouteId(1)).unwrap();
    values.deliver(Message::from("payload")).await.unwrap();

    assert_eq!(
        timeout(TICK, rx.recv()).await.unwrap(),
        Some(Message::from("payload"))
    );

    set.stop().await.unwrap();
    identity.stop().await.unwrap();
    timeout(TICK, set_task).await.unwrap().unwrap();
    timeout(TICK, identity_task).await.unwrap().unwrap();
}

/// Two kv blocks sharing one store observe each other's writes.
#[tokio::test]
async fn shared_store_spans_blocks() {
    let store = manifold::Store::new();
    let writer = Block::with_store(spec("kvSet"), store.clone());
    let reader = Block::with_store(spec("kvGet"), store.clone());
    let writer_task = spawn(&writer);
    let reader_task = spawn(&reader);

    let (ack, mut ack_rx) = Connection::tap();
    writer.connect(RouteId(0), ack).await.unwrap();
    writer.route_value(RouteId(0), Message::from("shared")).await.unwrap();
    writer
        .route_value(RouteId(1), Message::Number(6.0))
        .await
        .unwrap();
    timeout(TICK, ack_rx.recv()).await.unwrap().unwrap();

    let (tap, mut rx) = Connection::tap();
    reader.connect(RouteId(0), tap).await.unwrap();
    let keys = reader.connection(RouteId(0)).unwrap();
    keys.deliver(Message::from("shared")).await.unwrap();
    assert_eq!(
        timeout(TICK, rx.recv()).await.unwrap(),
        Some(Message::Number(6.0))
    );

    writer.stop().await.unwrap();
    reader.stop().await.unwrap();
    timeout(TICK, writer_task).await.unwrap().unwrap();
    timeout(TICK, reader_task).await.unwrap().unwrap();
}

/// A whole graph under supervision shuts down cleanly.
#[tokio::test]
async fn supervised_graph_shuts_down() {
    let supervisor = Supervisor::new();
    let adder = Block::new(spec("+"));
    let sink = Block::new(spec("sink"));

    let adder_token = supervisor.add(adder.clone()).await;
    let sink_token = supervisor.add(sink.clone()).await;

    adder
        .connect(RouteId(0), sink.connection(RouteId(0)).unwrap())
        .await
        .unwrap();
    adder.route_value(RouteId(0), Message::Number(1.0)).await.unwrap();
    adder.route_value(RouteId(1), Message::Number(1.0)).await.unwrap();

    // the graph is spinning; removal stops both activities
    timeout(TICK, supervisor.remove(adder_token))
        .await
        .unwrap()
        .unwrap();
    timeout(TICK, supervisor.remove(sink_token))
        .await
        .unwrap()
        .unwrap();
}
