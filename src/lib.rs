//! Personal memory assistant core: semantic recall of saved facts and reliable
//! time-based reminders.
//!
//! Recollect stores short facts a user tells it ("I parked in lot B5") and
//! answers later questions about them ("where is my car?"), and it schedules
//! one-time and recurring reminders that survive restarts.
//!
//! # Architecture
//!
//! - **Storage**: SQLite for memories, reminders, and the alarm payload cache
//! - **Embeddings**: a remote OpenAI-compatible API or local ONNX Runtime, with
//!   a deterministic hashing embedder behind either one
//! - **Recall**: cosine similarity plus a small recency bonus, falling back to
//!   keyword matching and then to recent memories
//! - **Reminders**: a persisted state machine driven by alarm callbacks and
//!   reconciled against the alarm cache on startup
//! - **Transport**: a CLI, and MCP over stdio or Streamable HTTP
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, migrations, and health checks
//! - [`embedding`]: text-to-vector providers and the degrading [`embedding::Embedder`]
//! - [`memory`]: memory store, similarity search, and the recall fallback chain
//! - [`reminder`]: reminder entity, store, schedule math, and the engine
//! - [`alarm`]: alarm dispatch and notification adapters
//! - [`parser`]: rule-based intent, reminder, and cancel-target parsing
//! - [`assistant`]: routes free text to memory or reminders
//! - [`app`]: service wiring shared by the CLI and the MCP server

pub mod alarm;
pub mod app;
pub mod assistant;
pub mod clock;
pub mod config;
pub mod db;
pub mod embedding;
pub mod memory;
pub mod parser;
pub mod reminder;
