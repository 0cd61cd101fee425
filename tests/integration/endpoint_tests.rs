//! Integration tests for two endpoints talking over an in-memory duplex
//! stream.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use aterm::{AppError, Endpoint, Object, Record, Value};

fn pair(host: Record, driver: Record) -> (Endpoint, Endpoint) {
    let (a, b) = tokio::io::duplex(64 * 1024);
    let host = Endpoint::spawn(a, Arc::new(host) as Arc<dyn Object>);
    let driver = Endpoint::spawn(b, Arc::new(driver) as Arc<dyn Object>);
    (host, driver)
}

fn calculator() -> Record {
    Record::new()
        .method("add", |args: Vec<Value>| async move {
            let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
            Ok(Value::from(sum))
        })
        .method("echo", |args: Vec<Value>| async move {
            Ok(args.into_iter().next().unwrap_or_default())
        })
        .method("fail", |_args| async { Err(AppError::rejected("nope")) })
        .with("version", 3_i64)
}

// ── Basic calls ─────────────────────────────────────────────────────────────

/// A named method on the peer's root returns its result.
#[tokio::test]
async fn method_call_returns_result() {
    let (host, driver) = pair(calculator(), Record::new());

    let sum = driver
        .root()
        .invoke_method("add", vec![2_i64.into(), 40_i64.into()])
        .await
        .unwrap();

    assert_eq!(sum.as_i64(), Some(42));
    assert_eq!(driver.pending_calls().await, 0);
    host.shutdown();
}

/// Scalars and nested arrays survive the round trip.
#[tokio::test]
async fn structured_values_round_trip() {
    let (_host, driver) = pair(calculator(), Record::new());
    let value = Value::Array(vec![
        Value::Null,
        true.into(),
        "text\nwith newline".into(),
        Value::Array(vec![1.5.into()]),
    ]);

    let echoed = driver
        .root()
        .invoke_method("echo", vec![value.clone()])
        .await
        .unwrap();

    assert_eq!(echoed, value);
}

/// A handler rejection arrives as the rejection value.
#[tokio::test]
async fn handler_rejection_is_delivered() {
    let (_host, driver) = pair(calculator(), Record::new());

    let err = driver.root().invoke_method("fail", Vec::new()).await.unwrap_err();

    assert!(matches!(err, AppError::Rejected(Value::String(ref msg)) if msg == "nope"));
}

/// Unknown and non-callable members are rejected by the peer.
#[tokio::test]
async fn unknown_method_is_rejected() {
    let (_host, driver) = pair(calculator(), Record::new());
    let root = driver.root();

    let unknown = root.invoke_method("missing", Vec::new()).await.unwrap_err();
    let scalar = root.invoke_method("version", Vec::new()).await.unwrap_err();
    let itself = root.invoke_as_function(Vec::new()).await.unwrap_err();

    assert!(matches!(unknown, AppError::Rejected(Value::String(ref m)) if m == "unknown method"));
    assert!(matches!(scalar, AppError::Rejected(Value::String(ref m)) if m == "member is not callable"));
    assert!(matches!(itself, AppError::Rejected(Value::String(ref m)) if m == "object is not callable"));
}

/// Member lookup on a proxy binds without sending; invoking sends.
#[tokio::test]
async fn bound_member_is_callable_later() {
    let (_host, driver) = pair(calculator(), Record::new());
    let add = driver.root().bind("add");

    assert_eq!(driver.pending_calls().await, 0);
    let sum = add.call(vec![1_i64.into(), 1_i64.into()]).await.unwrap();

    assert_eq!(sum.as_i64(), Some(2));
}

// ── Capabilities ────────────────────────────────────────────────────────────

/// A function passed as an argument is called back across the connection.
#[tokio::test]
async fn callback_argument_is_invoked_remotely() {
    let host = Record::new().method("each", |args: Vec<Value>| async move {
        let items = args[0].as_array().map(<[Value]>::to_vec).unwrap_or_default();
        let callback = args[1].clone();
        for item in &items {
            callback.call(vec![item.clone()]).await?;
        }
        Ok(Value::from(items.len() as u64))
    });
    let (_host, driver) = pair(host, Record::new());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback = Value::function(move |args: Vec<Value>| {
        sink.lock().unwrap().push(args[0].clone());
        async { Ok(Value::Unit) }
    });

    let count = driver
        .root()
        .invoke_method(
            "each",
            vec![Value::Array(vec!["a".into(), "b".into()]), callback],
        )
        .await
        .unwrap();

    assert_eq!(count.as_i64(), Some(2));
    assert_eq!(*seen.lock().unwrap(), [Value::from("a"), Value::from("b")]);
}

/// An object returned by the peer is a proxy that can be called further.
#[tokio::test]
async fn returned_object_is_proxied() {
    let counter = Arc::new(Mutex::new(0_i64));
    let state = Arc::clone(&counter);
    let inner = Value::object(Record::new().method("bump", move |_args| {
        let state = Arc::clone(&state);
        async move {
            let mut count = state.lock().unwrap();
            *count += 1;
            Ok(Value::from(*count))
        }
    }));
    let host = Record::new().with("counter", Value::function(move |_args| {
        let inner = inner.clone();
        async move { Ok(inner) }
    }));
    let (host, driver) = pair(host, Record::new());

    let first = driver.root().invoke_method("counter", Vec::new()).await.unwrap();
    let second = driver.root().invoke_method("counter", Vec::new()).await.unwrap();
    first.call_method("bump", Vec::new()).await.unwrap();
    let bumped = second.call_method("bump", Vec::new()).await.unwrap();

    assert!(first.as_proxy().is_some());
    assert_eq!(first, second, "same remote object maps to the same proxy");
    assert_eq!(bumped.as_i64(), Some(2));
    assert_eq!(host.exposed_objects().await, 2, "main plus the counter");
    assert_eq!(driver.proxied_objects().await, 2, "root plus the counter");
}

/// A local object sent out and echoed back is the original object again.
#[tokio::test]
async fn echoed_object_comes_home() {
    let (_host, driver) = pair(calculator(), Record::new());
    let local = Value::object(Record::new());

    let back = driver
        .root()
        .invoke_method("echo", vec![local.clone()])
        .await
        .unwrap();

    assert_eq!(back, local);
    assert!(back.as_proxy().is_none());
}

/// Both sides can call each other's root at the same time.
#[tokio::test]
async fn both_sides_call_concurrently() {
    let (host, driver) = pair(calculator(), calculator());

    let (from_driver, from_host) = tokio::join!(
        driver.root().invoke_method("add", vec![1_i64.into(), 2_i64.into()]),
        host.root().invoke_method("add", vec![3_i64.into(), 4_i64.into()]),
    );

    assert_eq!(from_driver.unwrap().as_i64(), Some(3));
    assert_eq!(from_host.unwrap().as_i64(), Some(7));
}

// ── Lifecycle ───────────────────────────────────────────────────────────────

/// When one side shuts down the other sees the connection close.
#[tokio::test]
async fn peer_shutdown_closes_endpoint() {
    let (host, driver) = pair(calculator(), Record::new());

    host.shutdown();
    drop(host);
    tokio::time::timeout(Duration::from_secs(5), driver.closed())
        .await
        .expect("driver must observe the close");

    assert!(driver.is_closed());
    let err = driver.root().invoke_method("add", Vec::new()).await.unwrap_err();
    assert!(matches!(err, AppError::Closed));
}

/// A clean close ends the decode loop without error.
#[tokio::test]
async fn join_reports_clean_close() {
    let (a, b) = tokio::io::duplex(1024);
    let endpoint = Endpoint::spawn(a, Arc::new(Record::new()) as Arc<dyn Object>);
    drop(b);

    let outcome = tokio::time::timeout(Duration::from_secs(5), endpoint.join())
        .await
        .expect("join must finish");

    assert!(outcome.is_ok());
}
