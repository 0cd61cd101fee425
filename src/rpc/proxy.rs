//! Remote stand-ins for peer-owned objects.

use std::sync::{Arc, Weak};

use crate::rpc::state::Core;
use crate::value::{Object, Reply, Value};
use crate::wire::{MarshallRef, CALL_METHOD};
use crate::AppError;

/// Local handle for an object owned by the peer.
///
/// Proxies are created by the endpoint's registry, one per peer id, and are
/// only meaningful on the endpoint that created them. Member access through
/// [`Object::member`] binds a name without touching the connection; the
/// request is sent when the bound member is invoked.
#[derive(Clone)]
pub struct Proxy {
    id: String,
    core: Weak<Core>,
}

impl Proxy {
    pub(crate) fn new(id: String, core: Weak<Core>) -> Self {
        Self { id, core }
    }

    /// The peer's id for the target object.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The token that hands the target back to its owner.
    #[must_use]
    pub fn marshall_ref(&self) -> MarshallRef {
        MarshallRef {
            id: self.id.clone(),
            remote: false,
        }
    }

    pub(crate) fn belongs_to(&self, core: &Weak<Core>) -> bool {
        Weak::ptr_eq(&self.core, core)
    }

    /// Call the target itself as a function.
    #[must_use]
    pub fn invoke_as_function(&self, args: Vec<Value>) -> Reply {
        self.request(CALL_METHOD.to_owned(), args)
    }

    /// Call the named method on the target.
    #[must_use]
    pub fn invoke_method(&self, name: &str, args: Vec<Value>) -> Reply {
        self.request(name.to_owned(), args)
    }

    /// Bind `name` to a callable value without sending anything.
    #[must_use]
    pub fn bind(&self, name: &str) -> Value {
        Value::object(BoundMethod {
            proxy: self.clone(),
            name: name.to_owned(),
        })
    }

    fn request(&self, method: String, args: Vec<Value>) -> Reply {
        let core = self.core.clone();
        let target = self.marshall_ref();
        Box::pin(async move {
            let core = core.upgrade().ok_or(AppError::Closed)?;
            core.send_request(&method, target, args).await
        })
    }
}

impl Object for Proxy {
    fn invoke(&self, args: Vec<Value>) -> Reply {
        self.invoke_as_function(args)
    }

    fn member(&self, name: &str) -> Option<Value> {
        Some(self.bind(name))
    }

    fn as_proxy(&self) -> Option<&Proxy> {
        Some(self)
    }
}

/// A proxy member bound by name, callable later.
struct BoundMethod {
    proxy: Proxy,
    name: String,
}

impl Object for BoundMethod {
    fn invoke(&self, args: Vec<Value>) -> Reply {
        self.proxy.invoke_method(&self.name, args)
    }
}

/// Convenience for the common case of holding the root proxy.
impl From<Arc<Proxy>> for Value {
    fn from(proxy: Arc<Proxy>) -> Self {
        Value::Object(proxy)
    }
}
