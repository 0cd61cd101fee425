//! One RPC endpoint over one connection.
//!
//! The decode loop reads lines with [`FramedRead`] over [`LineCodec`] and
//! handles each one before reading the next:
//!
//! | Line                     | Action                                        |
//! |--------------------------|-----------------------------------------------|
//! | not JSON / not an object | Dropped; logged at `DEBUG`                    |
//! | invalid, has string `id` | Error envelope to that id                     |
//! | invalid, no `id`         | Dropped; logged at `WARN`                     |
//! | Request                  | Handler invoked, reply sent from its own task |
//! | Response                 | Pending call resolved                         |
//! | Error                    | Pending call rejected                         |
//!
//! A Response or Error whose id matches no pending call is answered with an
//! Error envelope (`"unknown id"`) carrying that id.
//!
//! Handler lookup and invocation happen inline, so requests are dispatched
//! strictly in arrival order. Each handler's future is then awaited on a
//! spawned task; replies go out whenever they complete, correlated by id.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::rpc::proxy::Proxy;
use crate::rpc::state::Core;
use crate::rpc::writer::run_writer;
use crate::value::{Object, Reply, Value};
use crate::wire::{
    decode, DecodeFailure, Envelope, ErrorReply, LineCodec, MarshallRef, Request, Response, Ser,
    CALL_METHOD,
};
use crate::{AppError, Result};

/// Handle to a running endpoint.
///
/// Dropping the handle does not stop the endpoint; call
/// [`shutdown`](Self::shutdown) for that.
pub struct Endpoint {
    core: Arc<Core>,
    task: JoinHandle<Result<()>>,
}

impl Endpoint {
    /// Start an endpoint over `stream`, exposing `handler` to the peer as
    /// `"main"`.
    ///
    /// Spawns the decode loop and the writer task on the current tokio
    /// runtime.
    #[must_use]
    pub fn spawn<S>(stream: S, handler: Arc<dyn Object>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let core = Core::new(handler, outbound_tx, cancel.clone());

        tokio::spawn(async move {
            if let Err(err) = run_writer(writer, outbound_rx, cancel.clone()).await {
                warn!(%err, "rpc endpoint: writer stopped, closing");
                cancel.cancel();
            }
        });

        let task = tokio::spawn(run_endpoint(Arc::clone(&core), reader));
        Self { core, task }
    }

    /// Proxy for the peer's root object.
    #[must_use]
    pub fn root(&self) -> Arc<Proxy> {
        Arc::clone(&self.core.root)
    }

    /// Whether the connection has closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// Number of outgoing calls still waiting for a reply.
    pub async fn pending_calls(&self) -> usize {
        self.core.pending.len().await
    }

    /// Number of local objects exposed to the peer, including `"main"`.
    pub async fn exposed_objects(&self) -> usize {
        self.core.registry.lock().await.exposed_len()
    }

    /// Number of cached proxies, including the root proxy.
    pub async fn proxied_objects(&self) -> usize {
        self.core.registry.lock().await.proxied_len()
    }

    /// Stop the decode loop and the writer.
    pub fn shutdown(&self) {
        self.core.cancel.cancel();
    }

    /// Wait until the endpoint stops for any reason.
    pub async fn closed(&self) {
        self.core.cancel.cancelled().await;
    }

    /// Wait for the decode loop to finish and return how it ended.
    ///
    /// # Errors
    ///
    /// Returns the fatal or I/O error that terminated the loop, or
    /// [`AppError::Fatal`] if the loop task panicked.
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| AppError::Fatal(format!("endpoint task failed: {e}")))?
    }
}

/// Decode loop. Ends on EOF, read error, cancellation, or a fatal defect.
async fn run_endpoint<R>(core: Arc<Core>, reader: R) -> Result<()>
where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(reader, LineCodec::new());
    let cancel = core.cancel.clone();

    let outcome = loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("rpc endpoint: cancellation received, stopping");
                break Ok(());
            }

            item = framed.next() => match item {
                None => {
                    info!("rpc endpoint: connection closed");
                    break Ok(());
                }
                Some(Err(e)) => {
                    warn!(error = %e, "rpc endpoint: read failed, stopping");
                    break Err(e);
                }
                Some(Ok(line)) => {
                    if let Err(err) = dispatch_line(&core, &line).await {
                        if err.is_fatal() {
                            error!(%err, "rpc endpoint: fatal defect, terminating");
                            break Err(err);
                        }
                        warn!(%err, "rpc endpoint: failed to handle line");
                    }
                }
            }
        }
    };

    core.close();
    cancel.cancel();
    outcome
}

async fn dispatch_line(core: &Arc<Core>, line: &str) -> Result<()> {
    match decode(line) {
        Err(DecodeFailure::Parse(reason)) => {
            debug!(reason, "rpc endpoint: dropping unparseable line");
            Ok(())
        }
        Err(DecodeFailure::Validation {
            id: Some(id),
            reason,
        }) => {
            warn!(id, reason, "rpc endpoint: invalid message");
            reply_error(core, &id, &AppError::Validation(reason)).await
        }
        Err(DecodeFailure::Validation { id: None, reason }) => {
            warn!(reason, raw_line = %line, "rpc endpoint: invalid message without id, dropping");
            Ok(())
        }
        Ok(Envelope::Request(request)) => dispatch_request(core, request).await,
        Ok(Envelope::Response(Response { id, result })) => {
            let outcome = core.deserialize(&result).await;
            let failure = outcome.as_ref().err().cloned();
            match core.pending.complete(&id, outcome).await {
                Err(unknown) => reply_error(core, &id, &unknown).await,
                Ok(()) => match failure {
                    Some(err) => reply_error(core, &id, &err).await,
                    None => Ok(()),
                },
            }
        }
        Ok(Envelope::Error(ErrorReply { id, error })) => {
            let outcome = match core.deserialize(&error).await {
                Ok(value) => Err(AppError::Rejected(value)),
                Err(err) => Err(err),
            };
            match core.pending.complete(&id, outcome).await {
                Ok(()) => Ok(()),
                Err(unknown) => {
                    warn!(id, %unknown, "rpc endpoint: error reply for unknown id");
                    reply_error(core, &id, &unknown).await
                }
            }
        }
    }
}

async fn dispatch_request(core: &Arc<Core>, request: Request) -> Result<()> {
    let Request {
        id,
        method,
        target,
        args,
    } = request;
    debug!(id, method, "rpc endpoint: request received");

    let reply = match resolve_call(core, &method, target, &args).await {
        Ok(reply) => reply,
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => {
            warn!(id, method, %err, "rpc endpoint: rejecting request");
            return reply_error(core, &id, &err).await;
        }
    };

    let core = Arc::clone(core);
    tokio::spawn(async move {
        let envelope = match reply.await {
            Ok(value) => Envelope::Response(Response {
                id,
                result: core.serialize(&value).await,
            }),
            Err(err) => {
                debug!(id, method, %err, "rpc endpoint: handler failed");
                Envelope::Error(ErrorReply {
                    id,
                    error: core.fault(&err).await,
                })
            }
        };
        match core.send(&envelope) {
            Ok(()) => {}
            Err(err) if err.is_fatal() => {
                error!(%err, "rpc endpoint: fatal defect while replying, terminating");
                core.cancel.cancel();
            }
            Err(err) => warn!(id = envelope.id(), %err, "rpc endpoint: reply not sent"),
        }
    });

    Ok(())
}

/// Resolve the target and arguments, then start the invocation.
async fn resolve_call(
    core: &Core,
    method: &str,
    target: MarshallRef,
    args: &[Ser],
) -> Result<Reply> {
    let (target, args) = {
        let mut registry = core.registry.lock().await;
        let target = registry.deserialize(&Ser::Ref(target))?;
        (target, registry.deserialize_all(args)?)
    };

    let Value::Object(object) = target else {
        return Err(AppError::Validation("unknown marshalled object".into()));
    };

    if method == CALL_METHOD {
        return Ok(object.invoke(args));
    }

    match object.member(method) {
        Some(Value::Object(member)) => Ok(member.invoke(args)),
        Some(_) => Err(AppError::Validation("member is not callable".into())),
        None => Err(AppError::Validation("unknown method".into())),
    }
}

async fn reply_error(core: &Core, id: &str, err: &AppError) -> Result<()> {
    let envelope = Envelope::Error(ErrorReply {
        id: id.to_owned(),
        error: core.fault(err).await,
    });
    core.send(&envelope)
}
