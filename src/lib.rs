//! ReportDash DataStore MCP relay
//!
//! Bridges MCP JSON-RPC over stdio to the ReportDash DataStore HTTP API.
//! An MCP client (Claude Desktop, etc.) writes newline-delimited JSON-RPC
//! requests to our stdin; each line is forwarded as one HTTP POST to the
//! DataStore endpoint, and the response comes back as one JSON line on
//! stdout.
//!
//! Message flow:
//!
//! ```text
//! stdin line → wire::decode → RelayEngine::dispatch → HTTP POST
//!                                      ↓
//! stdout line ← wire::encode ← outcome mapping
//! ```
//!
//! Notifications (messages without an `id` key) are forwarded but never
//! produce an output line. Everything with an `id` key (including `id: 0`
//! and `id: null`) gets exactly one response, whatever the HTTP outcome.
//!
//! Stdout is protocol-only: logging goes to stderr (opt-in via `--log`),
//! and the human-readable connectivity check lives in a separate `test`
//! subcommand that must not run in MCP mode.

pub mod config;
pub mod relay;
pub mod wire;

pub use config::Config;
pub use relay::RelayEngine;
