//! Unit tests for the local value model.

use std::sync::{Arc, Mutex};

use aterm::{AppError, Function, Object, Record, Symbol, Value};

// ── Scalars ─────────────────────────────────────────────────────────────────

/// Conversions land on the expected variants.
#[test]
fn conversions_pick_expected_variants() {
    assert_eq!(Value::from(()), Value::Unit);
    assert_eq!(Value::from(3_i32).as_i64(), Some(3));
    assert_eq!(Value::from(1.5).as_f64(), Some(1.5));
    assert_eq!(Value::from("s").as_str(), Some("s"));
    assert_eq!(Value::from(None::<String>), Value::Null);
    assert_eq!(Value::from(Some(true)).as_bool(), Some(true));
}

/// Non-finite floats have no JSON form.
#[test]
fn non_finite_float_becomes_null() {
    assert_eq!(Value::from(f64::NAN), Value::Null);
    assert_eq!(Value::from(f64::INFINITY), Value::Null);
}

/// Both absent-value variants count as null.
#[test]
fn unit_and_null_are_null() {
    assert!(Value::Null.is_null());
    assert!(Value::Unit.is_null());
    assert!(!Value::from(0_i64).is_null());
}

/// Symbols are equal only to themselves.
#[test]
fn symbols_compare_by_identity() {
    let a = Symbol::new("x");
    let b = Symbol::new("x");

    assert_eq!(a, a.clone());
    assert_ne!(a, b);
    assert_eq!(a.to_string(), "Symbol(x)");
}

/// Display renders arrays element-wise.
#[test]
fn display_renders_arrays() {
    let value = Value::Array(vec![1_i64.into(), "a".into(), Value::Null]);

    assert_eq!(value.to_string(), "[1, a, null]");
}

// ── Objects ─────────────────────────────────────────────────────────────────

/// Objects compare by identity, not structure.
#[test]
fn objects_compare_by_identity() {
    let a = Value::object(Record::new());
    let b = Value::object(Record::new());

    assert_eq!(a, a.clone());
    assert_ne!(a, b);
}

/// A function value runs its closure when called.
#[tokio::test]
async fn function_invokes_closure() {
    let double = Value::function(|args: Vec<Value>| async move {
        let n = args.first().and_then(Value::as_i64).unwrap_or_default();
        Ok(Value::from(n * 2))
    });

    let result = double.call(vec![21_i64.into()]).await.unwrap();

    assert_eq!(result.as_i64(), Some(42));
}

/// The synchronous part of a handler runs at invocation, before awaiting.
#[tokio::test]
async fn function_body_runs_on_invoke() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&log);
    let function = Function::new(move |_args| {
        seen.lock().unwrap().push("invoked");
        async { Ok(Value::Unit) }
    });

    let reply = function.invoke(Vec::new());
    assert_eq!(*log.lock().unwrap(), ["invoked"]);

    assert_eq!(reply.await.unwrap(), Value::Unit);
}

/// Record methods are found by name.
#[tokio::test]
async fn record_method_is_callable() {
    let record = Value::object(
        Record::new()
            .method("greet", |args: Vec<Value>| async move {
                Ok(Value::from(format!("hello {}", args[0])))
            })
            .with("version", 2_i64),
    );

    let greeting = record.call_method("greet", vec!["bob".into()]).await.unwrap();

    assert_eq!(greeting.as_str(), Some("hello bob"));
}

/// Unknown members and non-callable members fail with validation errors.
#[tokio::test]
async fn bad_member_calls_fail() {
    let record = Value::object(Record::new().with("version", 2_i64));

    let unknown = record.call_method("missing", Vec::new()).await.unwrap_err();
    let scalar = record.call_method("version", Vec::new()).await.unwrap_err();

    assert!(matches!(unknown, AppError::Validation(ref msg) if msg == "unknown method"));
    assert!(matches!(scalar, AppError::Validation(ref msg) if msg == "value is not callable"));
}

/// Plain records are not callable themselves.
#[tokio::test]
async fn record_is_not_callable() {
    let record = Value::object(Record::new());

    let err = record.call(Vec::new()).await.unwrap_err();

    assert!(matches!(err, AppError::Validation(ref msg) if msg == "object is not callable"));
}
