//! Wires an `enginelink` driver against an in-process `engine-runtime` reference evaluator over
//! a loopback `tokio::io::duplex`, and walks through the end-to-end scenarios.
//!
//! There is no real engine process here: `ToyEvaluator` stands in for one, running on a blocking
//! thread behind a `tokio_util::io::SyncIoBridge` so the rest of the wiring — transport,
//! handles, converters, compile/apply — exercises exactly the same code a real child-process
//! engine would see.

#[macro_use]
extern crate log;

use std::sync::Arc;

use engine_runtime::toy::ToyEvaluator;
use engine_runtime::EngineLoop;
use enginelink::{apply, compile_function, compile_value, BridgeConfiguration, BridgeTransport, Converter};
use flexi_logger::Logger;
use tokio_util::io::SyncIoBridge;

#[tokio::main]
async fn main() {
    let _logger = Logger::try_with_env_or_str("info")
        .expect("logger spec parses")
        .start()
        .expect("logger starts");

    let (driver_side, engine_side) = tokio::io::duplex(64 * 1024);
    let (driver_read, driver_write) = tokio::io::split(driver_side);
    let (engine_read, engine_write) = tokio::io::split(engine_side);

    let engine_thread = tokio::task::spawn_blocking(move || {
        let reader = SyncIoBridge::new(engine_read);
        let writer = SyncIoBridge::new(engine_write);
        let mut engine_loop = EngineLoop::new(ToyEvaluator::new(), reader, writer);
        if let Err(e) = engine_loop.run() {
            error!("engine loop terminated with a framing error: {e}");
        }
    });

    let transport = Arc::new(
        BridgeTransport::connect(driver_read, driver_write, BridgeConfiguration::default())
            .await
            .expect("engine bootstrap succeeds"),
    );

    integer_echo(&transport).await;
    square_via_compiled_function(&transport).await;
    triple_round_trip(&transport).await;
    error_propagation(&transport).await;
    concurrent_ordering(&transport).await;
    disposal(&transport).await;

    drop(transport);
    let _ = engine_thread.await;
}

async fn integer_echo(transport: &Arc<BridgeTransport>) {
    let handle = i64::store(transport, 42).await.expect("store succeeds");
    let value = handle.retrieve().await.expect("retrieve succeeds");
    assert_eq!(value, 42);
    info!("integer echo: store(42) -> retrieve -> {value}");
}

async fn square_via_compiled_function(transport: &Arc<BridgeTransport>) {
    let square = compile_function::<i64, String>(transport, "fn i => string_of_int (i * i)")
        .await
        .expect("compile_function succeeds");
    let argument = i64::store(transport, 123).await.expect("store succeeds");
    let result = apply(&square, &argument).await.expect("apply succeeds");
    let text = result.retrieve().await.expect("retrieve succeeds");
    assert_eq!(text, "15129");
    info!("square via compiled function: 123 * 123 -> {text:?}");
}

async fn triple_round_trip(transport: &Arc<BridgeTransport>) {
    let original = (7_i64, "hi".to_string(), true);
    let handle = <(i64, String, bool)>::store(transport, original.clone())
        .await
        .expect("store succeeds");
    let round_tripped = handle.retrieve().await.expect("retrieve succeeds");
    assert_eq!(original, round_tripped);
    info!("triple round trip: {round_tripped:?}");
}

async fn error_propagation(transport: &Arc<BridgeTransport>) {
    let outcome = compile_value::<i64>(transport, "raise Fail \"nope\"").await;
    match outcome {
        Err(e) => {
            assert!(e.to_string().contains("nope"));
            info!("error propagation: compile_value(\"raise Fail \\\"nope\\\"\") -> {e}");
        }
        Ok(_) => panic!("expected compile_value to surface the raised exception"),
    }
}

async fn concurrent_ordering(transport: &Arc<BridgeTransport>) {
    let stores = (0..100i64).map(|i| i64::store(transport, i));
    let handles = futures::future::try_join_all(stores).await.expect("all stores succeed");
    let mut ids = futures::future::try_join_all(handles.iter().map(|h| h.id()))
        .await
        .expect("all ids resolve");
    let distinct_before = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), distinct_before);
    info!("concurrent ordering: 100 concurrent stores produced {} pairwise distinct ids", ids.len());
}

async fn disposal(transport: &Arc<BridgeTransport>) {
    let handle = i64::store(transport, 99).await.expect("store succeeds");
    let id = handle.id().await.expect("id resolves");
    drop(handle);
    transport.flush_pending_removes();
    info!("disposal: dropped the last handle for {id}, pending-remove buffer flushed");
}
