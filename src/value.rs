//! Local value model.
//!
//! A [`Value`] is anything that can cross the connection: JSON-like scalars,
//! sequences, and live objects. Objects implement [`Object`]; when one is
//! sent to the peer it is exposed by reference, never copied, and the peer
//! receives a [`Proxy`] it can call back through.

use std::collections::HashMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Number;

use crate::rpc::proxy::Proxy;
use crate::{AppError, Result};

/// Boxed future produced by every invocation, local or remote.
pub type Reply = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'static>>;

/// A live object that can be exposed to the peer.
///
/// Both hooks are synchronous up to the point where they hand back a
/// [`Reply`]; the endpoint calls them inline, in arrival order, and only
/// awaits the returned future afterwards.
pub trait Object: Send + Sync + 'static {
    /// Invoke the object itself as a function (method token `"()"`).
    fn invoke(&self, args: Vec<Value>) -> Reply {
        let _ = args;
        Box::pin(async { Err(AppError::Validation("object is not callable".into())) })
    }

    /// Look up a named member. `None` means the member does not exist.
    fn member(&self, name: &str) -> Option<Value> {
        let _ = name;
        None
    }

    /// Downcast hook for remote stand-ins.
    fn as_proxy(&self) -> Option<&Proxy> {
        None
    }
}

/// Unique atomic value; two symbols are equal only if they are the same
/// symbol. Crosses the wire as its string form.
#[derive(Clone)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Create a fresh symbol with the given description.
    #[must_use]
    pub fn new(description: &str) -> Self {
        Self(Arc::from(description))
    }

    /// The description the symbol was created with.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

impl Debug for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// A value that can be passed to or returned from a remote call.
#[derive(Clone, Default)]
pub enum Value {
    /// JSON `null`.
    #[default]
    Null,
    /// Absence of a value; sent as `null`.
    Unit,
    /// Boolean.
    Bool(bool),
    /// Number.
    Number(Number),
    /// String.
    String(String),
    /// Unique symbol; sent as its string form.
    Symbol(Symbol),
    /// Ordered sequence.
    Array(Vec<Value>),
    /// Live object or function, passed by reference.
    Object(Arc<dyn Object>),
}

impl Value {
    /// Wrap a local object.
    #[must_use]
    pub fn object(object: impl Object) -> Self {
        Self::Object(Arc::new(object))
    }

    /// Wrap an async closure as a callable object.
    #[must_use]
    pub fn function<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self::object(Function::new(f))
    }

    /// `true` for both `Null` and `Unit`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Unit)
    }

    /// Borrow the string contents.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean contents.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Number contents as `i64`, if representable.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Number contents as `f64`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Borrow the sequence contents.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the object, if this is one.
    #[must_use]
    pub fn as_object(&self) -> Option<&Arc<dyn Object>> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Borrow the proxy, if this is a remote stand-in.
    #[must_use]
    pub fn as_proxy(&self) -> Option<&Proxy> {
        self.as_object().and_then(|object| object.as_proxy())
    }

    /// Invoke this value as a function.
    ///
    /// Non-object values yield a future that fails with
    /// [`AppError::Validation`].
    #[must_use]
    pub fn call(&self, args: Vec<Value>) -> Reply {
        match self {
            Self::Object(object) => object.invoke(args),
            _ => Box::pin(async { Err(AppError::Validation("value is not callable".into())) }),
        }
    }

    /// Look up `name` on this value and invoke it.
    ///
    /// On a proxy this is a single remote request; member lookup itself
    /// never touches the connection.
    #[must_use]
    pub fn call_method(&self, name: &str, args: Vec<Value>) -> Reply {
        match self.as_object().and_then(|object| object.member(name)) {
            Some(member) => member.call(args),
            None => Box::pin(async { Err(AppError::Validation("unknown method".into())) }),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) | (Self::Unit, Self::Unit) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Unit => write!(f, "Unit"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::Symbol(s) => write!(f, "Symbol({:?})", s.description()),
            Self::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Self::Object(object) => match object.as_proxy() {
                Some(proxy) => write!(f, "Proxy({:?})", proxy.id()),
                None => write!(f, "Object({:p})", Arc::as_ptr(object).cast::<()>()),
            },
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null | Self::Unit => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Symbol(s) => write!(f, "{s}"),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Object(object) => match object.as_proxy() {
                Some(proxy) => write!(f, "[proxy {}]", proxy.id()),
                None => write!(f, "[object]"),
            },
        }
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::Unit
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON form and become `Null`.
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Symbol> for Value {
    fn from(value: Symbol) -> Self {
        Self::Symbol(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::Array(value)
    }
}

impl From<Arc<dyn Object>> for Value {
    fn from(value: Arc<dyn Object>) -> Self {
        Self::Object(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// ── Building blocks for handlers ─────────────────────────────────────────────

type BoxedFn = Box<dyn Fn(Vec<Value>) -> Reply + Send + Sync>;

/// A callable object backed by an async closure.
pub struct Function {
    f: BoxedFn,
}

impl Function {
    /// Wrap `f`. The closure body runs when the call is dispatched; the
    /// returned future is awaited afterwards.
    #[must_use]
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            f: Box::new(move |args| Box::pin(f(args))),
        }
    }
}

impl Object for Function {
    fn invoke(&self, args: Vec<Value>) -> Reply {
        (self.f)(args)
    }
}

/// An object made of named members, typically methods.
///
/// ```rust,ignore
/// let handler = Record::new().method("ping", |_args| async { Ok("pong".into()) });
/// ```
#[derive(Clone, Default)]
pub struct Record {
    members: HashMap<String, Value>,
}

impl Record {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member and return the record.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.members.insert(name.into(), value.into());
        self
    }

    /// Add an async method and return the record.
    #[must_use]
    pub fn method<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.with(name, Value::function(f))
    }
}

impl Object for Record {
    fn member(&self, name: &str) -> Option<Value> {
        self.members.get(name).cloned()
    }
}
