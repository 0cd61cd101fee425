//! Endpoint writer task.
//!
//! Receives encoded envelope lines from an unbounded [`mpsc`] queue, frames
//! each with [`LineCodec`], and writes it to the connection. Being the only
//! writer keeps lines whole and in queue order.

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::codec::Encoder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::wire::LineCodec;
use crate::{AppError, Result};

/// Writer task: drains `lines` into `writer` until cancelled or until every
/// sender is dropped.
///
/// # Errors
///
/// - [`AppError::Fatal`] if a queued line contains a newline.
/// - [`AppError::Io`]`("write failed: …")` if the connection rejects a write.
pub async fn run_writer<W>(
    writer: W,
    mut lines: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut writer = writer;
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::new();

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("rpc writer: cancellation received, stopping");
                break;
            }

            line = lines.recv() => {
                let Some(line) = line else {
                    debug!("rpc writer: queue closed, stopping");
                    break;
                };

                codec.encode(line, &mut buf)?;
                let write = async {
                    writer.write_all(&buf).await?;
                    writer.flush().await
                };
                write.await.map_err(|e| {
                    warn!(error = %e, "rpc writer: write failed");
                    AppError::Io(format!("write failed: {e}"))
                })?;
                buf.clear();
            }
        }
    }

    Ok(())
}
