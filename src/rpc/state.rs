//! State shared by an endpoint's decode loop, its reply tasks and its
//! proxies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::rpc::pending::PendingCalls;
use crate::rpc::proxy::Proxy;
use crate::rpc::registry::{Registry, ROOT_ID};
use crate::value::{Object, Value};
use crate::wire::{encode, Envelope, MarshallRef, Request, Ser};
use crate::{AppError, Result};

pub(crate) struct Core {
    pub(crate) registry: Mutex<Registry>,
    pub(crate) pending: PendingCalls,
    pub(crate) root: Arc<Proxy>,
    pub(crate) cancel: CancellationToken,
    outbound: mpsc::UnboundedSender<String>,
    closed: AtomicBool,
}

impl Core {
    /// Build the shared state, exposing `handler` as `"main"` and caching
    /// the proxy for the peer's `"main"`.
    pub(crate) fn new(
        handler: Arc<dyn Object>,
        outbound: mpsc::UnboundedSender<String>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let mut registry = Registry::new(weak.clone());
            registry.expose_as(ROOT_ID, handler);
            let root = registry.proxy(ROOT_ID);
            Self {
                registry: Mutex::new(registry),
                pending: PendingCalls::new(),
                root,
                cancel,
                outbound,
                closed: AtomicBool::new(false),
            }
        })
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Enter the terminal state. Outstanding calls are left as they are.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Encode `envelope` and queue it for the writer task.
    pub(crate) fn send(&self, envelope: &Envelope) -> Result<()> {
        if self.is_closed() {
            return Err(AppError::Closed);
        }
        let line = encode(envelope)?;
        self.outbound.send(line).map_err(|_| AppError::Closed)
    }

    pub(crate) async fn serialize(&self, value: &Value) -> Ser {
        self.registry.lock().await.serialize(value)
    }

    pub(crate) async fn deserialize(&self, ser: &Ser) -> Result<Value> {
        self.registry.lock().await.deserialize(ser)
    }

    /// Wire form of a failure delivered in an Error envelope.
    pub(crate) async fn fault(&self, err: &AppError) -> Ser {
        match err {
            AppError::Rejected(value) => self.serialize(value).await,
            AppError::Validation(msg) => Ser::String(msg.clone()),
            other => Ser::String(other.to_string()),
        }
    }

    /// Send an outgoing request and wait for its reply.
    ///
    /// The pending slot is registered before the line is queued, so a reply
    /// can never overtake its own registration.
    pub(crate) async fn send_request(
        &self,
        method: &str,
        target: MarshallRef,
        args: Vec<Value>,
    ) -> Result<Value> {
        let args = {
            let mut registry = self.registry.lock().await;
            args.iter().map(|arg| registry.serialize(arg)).collect()
        };
        let (id, reply) = self.pending.register().await;
        let envelope = Envelope::Request(Request {
            id: id.clone(),
            method: method.to_owned(),
            target,
            args,
        });
        if let Err(err) = self.send(&envelope) {
            self.pending.discard(&id).await;
            return Err(err);
        }
        debug!(id, method, "rpc: request sent");
        reply.await.map_err(|_| AppError::Closed)?
    }
}
