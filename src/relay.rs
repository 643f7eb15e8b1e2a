//! Relay engine: one HTTP POST per inbound message, one response (or none)
//! per outcome.
//!
//! The engine owns the upstream HTTP client and the outcome→response
//! mapping. The serve loop at the bottom wires an input stream of lines to
//! an output stream of lines through the engine: one spawned task per
//! message, so slow upstream calls never block reading the next line. That
//! also means output order is completion order, not input order: JSON-RPC
//! ids, not line positions, correlate requests with responses.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::wire::{self, NormalizedMessage, OutboundMessage};

/// Total per-request timeout on the relay path, in seconds.
pub const RELAY_TIMEOUT_SECS: u64 = 30;

/// User-Agent presented to the DataStore API.
pub const USER_AGENT: &str = "ReportDash-DataStore-MCP/1.0";

/// What one HTTP attempt produced, before JSON-RPC mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    /// The exchange completed; any status, body read in full (possibly empty).
    Response { status: u16, body: String },
    /// Connection-level failure: DNS, refused, reset, TLS, and friends.
    TransportError(String),
    /// The timeout elapsed before the response completed.
    TimedOut,
}

/// Forwards normalized messages to the DataStore endpoint.
pub struct RelayEngine {
    client: reqwest::Client,
    config: Config,
}

impl RelayEngine {
    /// Build an engine with the standard 30-second relay timeout.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_timeout(config, Duration::from_secs(RELAY_TIMEOUT_SECS))
    }

    /// Build an engine with an explicit timeout (tests shorten it).
    pub fn with_timeout(config: Config, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(RelayEngine { client, config })
    }

    /// Relay one message: POST it upstream, map the outcome.
    ///
    /// Returns `None` for notifications: the POST still happens, but every
    /// outcome is discarded, including transport errors. Requests (any
    /// message with an `id` key, even `id: null` or `id: 0`) always map to
    /// exactly one response.
    pub async fn dispatch(&self, message: NormalizedMessage) -> Option<OutboundMessage> {
        let outcome = self.post(message.payload()).await;

        let Some(request_id) = message.id().response_id() else {
            tracing::debug!("Notification relayed, outcome discarded: {:?}", outcome);
            return None;
        };

        Some(response_for(outcome, request_id))
    }

    async fn post(&self, payload: &Value) -> RelayOutcome {
        let result = self
            .client
            .post(self.config.api_url.clone())
            .header("X-Api-Key", &self.config.api_key)
            .json(payload)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(error) if error.is_timeout() => return RelayOutcome::TimedOut,
            Err(error) => return RelayOutcome::TransportError(error_detail(&error)),
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => RelayOutcome::Response { status, body },
            Err(error) if error.is_timeout() => RelayOutcome::TimedOut,
            Err(error) => RelayOutcome::TransportError(error_detail(&error)),
        }
    }
}

/// Map one HTTP outcome to the single response for a request-with-id.
///
/// This is the whole error-code contract of the relay; see the tests for
/// the table. `request_id` is the inbound id verbatim (may be JSON null).
pub fn response_for(outcome: RelayOutcome, request_id: Value) -> OutboundMessage {
    let (status, body) = match outcome {
        RelayOutcome::TimedOut => {
            return OutboundMessage::error(
                request_id,
                -32603,
                format!("Request timeout after {RELAY_TIMEOUT_SECS} seconds"),
            );
        }
        RelayOutcome::TransportError(detail) => {
            return OutboundMessage::error(request_id, -32603, format!("Network error: {detail}"));
        }
        RelayOutcome::Response { status, body } => (status, body),
    };

    let success = (200..300).contains(&status);

    // 204 and blank bodies short-circuit before any parse attempt.
    if status == 204 || body.trim().is_empty() {
        return if success {
            OutboundMessage::result(request_id, json!({}))
        } else {
            OutboundMessage::error(
                request_id,
                i64::from(status),
                format!("API error: {status} (empty body)"),
            )
        };
    }

    let parsed: Value = match serde_json::from_str(&body) {
        Ok(parsed) => parsed,
        Err(_) => {
            return OutboundMessage::error_with_data(
                request_id,
                -32603,
                "API returned non-JSON response",
                json!({ "statusCode": status, "body": body }),
            );
        }
    };

    if !success {
        return OutboundMessage::error_with_data(
            request_id,
            i64::from(status),
            format!("API error: {status}"),
            parsed,
        );
    }

    // A JSON-RPC body passes through, but never with a missing or null id:
    // the caller must always be able to correlate the response.
    if parsed.get("jsonrpc") == Some(&json!("2.0")) {
        let Value::Object(mut object) = parsed else {
            unreachable!("get() returned Some, so parsed is an object");
        };
        match object.get("id") {
            None | Some(Value::Null) => {
                object.insert("id".to_string(), request_id);
            }
            Some(_) => {}
        }
        return OutboundMessage::Passthrough(Value::Object(object));
    }

    OutboundMessage::result(request_id, parsed)
}

/// Flatten a reqwest error and its source chain into one detail string.
fn error_detail(error: &reqwest::Error) -> String {
    let mut detail = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}

/// Run the relay loop: input lines in, output lines out, until input EOF.
///
/// Each decoded message gets its own task, so upstream latency never blocks
/// the reader. All output funnels through one writer task via a channel, so
/// concurrent completions interleave whole lines, never bytes. After EOF
/// the writer drains every in-flight relay before returning.
pub async fn serve<R, W>(engine: RelayEngine, input: R, output: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let engine = Arc::new(engine);
    let (line_tx, line_rx) = mpsc::channel::<String>(64);
    let writer = tokio::spawn(write_lines(output, line_rx));

    let mut lines = BufReader::new(input).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read from input")?
    {
        if line.trim().is_empty() {
            continue;
        }

        let message = match wire::decode(line.trim()) {
            Ok(message) => message,
            Err(error) => {
                tracing::debug!("Undecodable input line: {}", error);
                line_tx
                    .send(wire::encode(&OutboundMessage::parse_error(&error)))
                    .await
                    .context("Output writer stopped")?;
                continue;
            }
        };

        let engine = Arc::clone(&engine);
        let line_tx = line_tx.clone();
        tokio::spawn(async move {
            if let Some(response) = engine.dispatch(message).await {
                // Only fails if the writer is gone, i.e. we are shutting down.
                let _ = line_tx.send(wire::encode(&response)).await;
            }
        });
    }

    tracing::debug!("Input closed, draining in-flight relays");

    // In-flight tasks hold channel clones; the writer exits once the last
    // one finishes.
    drop(line_tx);
    writer
        .await
        .context("Output writer panicked")?
        .context("Failed to write to output")?;

    Ok(())
}

async fn write_lines<W: AsyncWrite + Unpin>(
    mut output: W,
    mut line_rx: mpsc::Receiver<String>,
) -> std::io::Result<()> {
    while let Some(line) = line_rx.recv().await {
        output.write_all(line.as_bytes()).await?;
        output.flush().await?;
    }
    Ok(())
}
