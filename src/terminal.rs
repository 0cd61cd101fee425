//! Terminal object served by the host under `"main"`.
//!
//! | Member    | Behaviour                                                  |
//! |-----------|------------------------------------------------------------|
//! | `print`   | Queues its single string argument for output               |
//! | `input`   | Returns the shared [`InputQueue`] by reference              |
//!
//! The queue's `pop` resolves to the next input line, or `null` once the
//! input source is exhausted.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::value::{Object, Record, Value};
use crate::{AppError, Result};

/// Lines typed by the user, handed out one `pop` at a time.
pub struct InputQueue {
    lines: Arc<Mutex<mpsc::Receiver<String>>>,
}

impl InputQueue {
    /// Wrap the receiving end of the input channel.
    #[must_use]
    pub fn new(lines: mpsc::Receiver<String>) -> Self {
        Self {
            lines: Arc::new(Mutex::new(lines)),
        }
    }

    /// Next line, or `None` once every sender is gone.
    pub async fn pop(&self) -> Option<String> {
        self.lines.lock().await.recv().await
    }
}

impl Object for InputQueue {
    fn member(&self, name: &str) -> Option<Value> {
        match name {
            "pop" => {
                let queue = Self {
                    lines: Arc::clone(&self.lines),
                };
                let queue = Arc::new(queue);
                Some(Value::function(move |_args| {
                    let queue = Arc::clone(&queue);
                    async move { Ok(Value::from(queue.pop().await)) }
                }))
            }
            _ => None,
        }
    }
}

/// Build the terminal handler.
///
/// `input` is returned from every `input()` call, so the peer always sees
/// the same remote object. Printed text is pushed to `output`.
#[must_use]
pub fn handler(input: Value, output: mpsc::UnboundedSender<String>) -> Record {
    Record::new()
        .method("print", move |args: Vec<Value>| {
            let output = output.clone();
            async move {
                let Some(text) = args.first().and_then(Value::as_str) else {
                    return Err(AppError::Validation("expect string text".into()));
                };
                output
                    .send(text.to_owned())
                    .map_err(|_| AppError::Io("terminal output is closed".into()))?;
                Ok(Value::Unit)
            }
        })
        .method("input", move |_args| {
            let input = input.clone();
            async move {
                debug!("terminal: input queue requested");
                Ok(input)
            }
        })
}

/// Convenience for hosts: a handler plus the channels that feed it.
///
/// Returns the handler, the sender for input lines, and the receiver of
/// printed text.
#[must_use]
pub fn channel(capacity: usize) -> (Arc<dyn Object>, mpsc::Sender<String>, Output) {
    let (input_tx, input_rx) = mpsc::channel(capacity);
    let (output_tx, output_rx) = mpsc::unbounded_channel();
    let queue = Value::object(InputQueue::new(input_rx));
    let handler: Arc<dyn Object> = Arc::new(handler(queue, output_tx));
    (handler, input_tx, output_rx)
}

/// Receiving end of everything printed through the terminal.
pub type Output = mpsc::UnboundedReceiver<String>;

/// Forward printed text to `writer`, one line each, until the handler is
/// dropped.
///
/// # Errors
///
/// Returns `AppError::Io` if writing fails.
pub async fn drain_output<W>(mut output: Output, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(text) = output.recv().await {
        writer.write_all(text.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}
