//! Marshalling registry.
//!
//! Each endpoint keeps two append-only tables:
//!
//! - *exposed*: local objects this endpoint has shown the peer, keyed by the
//!   id the peer uses to call them back.
//! - *proxied*: peer objects this endpoint has been shown, keyed by the
//!   peer's id, each with exactly one cached [`Proxy`].
//!
//! Exposed objects are indexed by identity (the `Arc` data pointer) so the
//! same object always maps to the same id. Proxies are recognised by the
//! endpoint they belong to, so any clone of a proxy travels back as the
//! peer's own id. Entries are never evicted; the `Arc`s held here keep every
//! address stable and unique for the endpoint's lifetime.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::rpc::proxy::Proxy;
use crate::rpc::state::Core;
use crate::value::{Object, Value};
use crate::wire::{MarshallRef, Ser};
use crate::{AppError, Result};

/// Fixed id of the root object on both sides.
pub const ROOT_ID: &str = "main";

/// Identity of the allocation behind an `Arc`.
fn identity<T: ?Sized>(object: &Arc<T>) -> usize {
    Arc::as_ptr(object).cast::<()>() as usize
}

/// Per-endpoint marshalling tables.
pub struct Registry {
    core: Weak<Core>,
    exposed: HashMap<String, Arc<dyn Object>>,
    exposed_ids: HashMap<usize, String>,
    proxies: HashMap<String, Arc<Proxy>>,
    next_id: u64,
}

impl Registry {
    pub(crate) fn new(core: Weak<Core>) -> Self {
        Self {
            core,
            exposed: HashMap::new(),
            exposed_ids: HashMap::new(),
            proxies: HashMap::new(),
            next_id: 0,
        }
    }

    /// A registry with no connection behind it. Proxies it creates fail
    /// every call with [`AppError::Closed`].
    #[must_use]
    pub fn detached() -> Self {
        Self::new(Weak::new())
    }

    /// Expose `object` under a fixed id, replacing whatever held that id.
    pub fn expose_as(&mut self, id: &str, object: Arc<dyn Object>) {
        self.exposed_ids.insert(identity(&object), id.to_owned());
        self.exposed.insert(id.to_owned(), object);
    }

    /// Expose `object`, reusing its id if it was exposed before.
    pub fn expose(&mut self, object: &Arc<dyn Object>) -> String {
        let key = identity(object);
        if let Some(id) = self.exposed_ids.get(&key) {
            return id.clone();
        }
        let id = self.next_id.to_string();
        self.next_id += 1;
        self.exposed_ids.insert(key, id.clone());
        self.exposed.insert(id.clone(), Arc::clone(object));
        id
    }

    /// Look up an exposed object by id.
    #[must_use]
    pub fn exposed(&self, id: &str) -> Option<Arc<dyn Object>> {
        self.exposed.get(id).cloned()
    }

    /// The cached proxy for a peer id, created on first use.
    pub fn proxy(&mut self, id: &str) -> Arc<Proxy> {
        if let Some(proxy) = self.proxies.get(id) {
            return Arc::clone(proxy);
        }
        let proxy = Arc::new(Proxy::new(id.to_owned(), self.core.clone()));
        self.proxies.insert(id.to_owned(), Arc::clone(&proxy));
        proxy
    }

    /// Number of exposed objects.
    #[must_use]
    pub fn exposed_len(&self) -> usize {
        self.exposed.len()
    }

    /// Number of cached proxies.
    #[must_use]
    pub fn proxied_len(&self) -> usize {
        self.proxies.len()
    }

    /// Convert a local value to its wire form, exposing any objects in it.
    pub fn serialize(&mut self, value: &Value) -> Ser {
        match value {
            Value::Null | Value::Unit => Ser::Null,
            Value::Bool(b) => Ser::Bool(*b),
            Value::Number(n) => Ser::Number(n.clone()),
            Value::String(s) => Ser::String(s.clone()),
            Value::Symbol(symbol) => Ser::String(symbol.to_string()),
            Value::Array(items) => Ser::Array(items.iter().map(|v| self.serialize(v)).collect()),
            Value::Object(object) => Ser::Ref(self.marshal(object)),
        }
    }

    /// Convert a wire value back to a local value.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if a `remote: false` reference names
    /// an object this endpoint never exposed.
    pub fn deserialize(&mut self, ser: &Ser) -> Result<Value> {
        Ok(match ser {
            Ser::Null => Value::Null,
            Ser::Bool(b) => Value::Bool(*b),
            Ser::Number(n) => Value::Number(n.clone()),
            Ser::String(s) => Value::String(s.clone()),
            Ser::Array(items) => Value::Array(self.deserialize_all(items)?),
            Ser::Ref(reference) => Value::Object(self.unmarshal(reference)?),
        })
    }

    /// Deserialize a list of wire values, e.g. request arguments.
    ///
    /// # Errors
    ///
    /// Fails on the first element [`deserialize`](Self::deserialize) rejects.
    pub fn deserialize_all(&mut self, items: &[Ser]) -> Result<Vec<Value>> {
        items.iter().map(|item| self.deserialize(item)).collect()
    }

    fn marshal(&mut self, object: &Arc<dyn Object>) -> MarshallRef {
        if let Some(proxy) = object.as_proxy() {
            if proxy.belongs_to(&self.core) {
                return proxy.marshall_ref();
            }
        }
        MarshallRef {
            id: self.expose(object),
            remote: true,
        }
    }

    fn unmarshal(&mut self, reference: &MarshallRef) -> Result<Arc<dyn Object>> {
        if reference.remote {
            let proxy: Arc<dyn Object> = self.proxy(&reference.id);
            return Ok(proxy);
        }
        self.exposed(&reference.id)
            .ok_or_else(|| AppError::Validation("unknown marshalled object".into()))
    }
}
