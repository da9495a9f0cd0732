//! Stdin/stdout JSON bridge for the host command channel.
//!
//! Reads newline-delimited JSON `CommandEnvelope` messages from stdin,
//! executes them through a [`HostBridge`], and writes `ResponseEnvelope`
//! and `EventEnvelope` messages as newline-delimited JSON to stdout.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use crate::error::{Result, VoiceError};
use crate::host::bridge::{HostBridge, forward_broadcast};
use crate::host::contract::{CommandEnvelope, CommandName, EventEnvelope, ResponseEnvelope};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;

/// Run the bridge on the process's stdin and stdout until stdin closes or
/// a `runtime.stop` command is received.
pub async fn run_stdio_bridge(bridge: HostBridge) -> Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = BufWriter::new(tokio::io::stdout());
    run_bridge(bridge, reader, writer).await
}

/// Run the bridge over arbitrary line-oriented streams.
///
/// Two tasks operate concurrently:
///
/// 1. **Reader** -- reads newline-delimited JSON, executes each command, and
///    writes the response.
/// 2. **Event forwarder** -- writes every event the bridge emits.
///
/// Both share one writer so lines never interleave.
pub async fn run_bridge<R, W>(mut bridge: HostBridge, mut reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer = Arc::new(Mutex::new(writer));

    let event_writer = Arc::clone(&writer);
    let event_handle = tokio::spawn(forward_broadcast(
        "output",
        bridge.subscribe_events(),
        move |envelope: EventEnvelope| {
            let writer = Arc::clone(&event_writer);
            async move {
                let json = match serde_json::to_string(&envelope) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(error = %e, event = %envelope.event, "unserializable event; skipping");
                        return ControlFlow::Continue(());
                    }
                };
                let mut w = writer.lock().await;
                match write_line(&mut *w, &json).await {
                    Ok(()) => ControlFlow::Continue(()),
                    Err(e) => {
                        tracing::warn!(error = %e, "output closed; no more events will be written");
                        ControlFlow::Break(())
                    }
                }
            }
        },
    ));

    let mut line = String::new();
    let result = loop {
        line.clear();
        let bytes_read = match reader.read_line(&mut line).await {
            Ok(n) => n,
            Err(e) => break Err(VoiceError::Channel(format!("failed to read command: {e}"))),
        };
        if bytes_read == 0 {
            tracing::info!("input closed (EOF); shutting down bridge");
            break Ok(());
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<CommandEnvelope>(trimmed) {
            Ok(envelope) => {
                let is_stop = envelope.command == CommandName::RuntimeStop;
                let response = bridge.handle(envelope).await;
                if is_stop {
                    tracing::info!("runtime.stop received; shutting down bridge");
                    if let Err(e) = send_response(&writer, &response).await {
                        break Err(e);
                    }
                    break Ok(());
                }
                response
            }
            Err(e) => {
                tracing::warn!(error = %e, raw_line = %trimmed, "failed to parse command envelope");
                ResponseEnvelope::error("parse-error", format!("failed to parse command envelope: {e}"))
            }
        };
        if let Err(e) = send_response(&writer, &response).await {
            break Err(e);
        }
    };

    bridge.close_session().await;
    // Let the forwarder drain events emitted during shutdown.
    drop(bridge);
    let _ = event_handle.await;
    result
}

async fn send_response<W: AsyncWrite + Unpin>(
    writer: &Mutex<W>,
    response: &ResponseEnvelope,
) -> Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| VoiceError::Protocol(format!("failed to serialize response envelope: {e}")))?;
    let mut w = writer.lock().await;
    write_line(&mut *w, &json).await
}

/// Write a single JSON line and flush.
async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, json: &str) -> Result<()> {
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| VoiceError::Channel(format!("failed to write line: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| VoiceError::Channel(format!("failed to write newline: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| VoiceError::Channel(format!("failed to flush output: {e}")))?;
    Ok(())
}
