//! A small pipeline: two pinned constants feed an adder whose sums are
//! logged, then the graph is torn down.

use std::time::Duration;

use manifold::{library, Block, Message, RouteId, Supervisor};

#[tokio::main]
async fn main() {
    let specs = library();
    let adder = Block::new(specs["+"].clone());
    let logger = Block::new(specs["log"].clone());

    let supervisor = Supervisor::new();
    let adder_token = supervisor.add(adder.clone()).await;
    let logger_token = supervisor.add(logger.clone()).await;

    adder
        .connect(RouteId(0), logger.connection(RouteId(0)).unwrap())
        .await
        .expect("wire adder to logger");
    adder
        .route_value(RouteId(0), Message::Number(2.0))
        .await
        .expect("pin first addend");
    adder
        .route_value(RouteId(1), Message::Number(3.0))
        .await
        .expect("pin second addend");

    // let a few sums flow to stdout
    tokio::time::sleep(Duration::from_millis(10)).await;

    supervisor
        .remove(adder_token)
        .await
        .expect("stop the adder");
    supervisor
        .remove(logger_token)
        .await
        .expect("stop the logger");
}
