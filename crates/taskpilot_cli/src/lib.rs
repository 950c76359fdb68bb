//! Line-oriented terminal host for the taskpilot pipeline.
//!
//! ## Backend selection
//!
//! - `TASKPILOT_BACKEND=mock` runs against the in-memory scripted backend.
//! - Anything else (the default) talks HTTP to `TASKPILOT_API_URL`.
//!
//! The remaining environment contract (`TASKPILOT_TOKEN`, `TASKPILOT_TIMEZONE`,
//! retry and timeout overrides, `TASKPILOT_PANEL_STATE`) is read by
//! `taskpilot::EnvConfig`. Log output goes to stderr, filtered by
//! `TASKPILOT_LOG`.

pub mod app;
pub mod commands;
