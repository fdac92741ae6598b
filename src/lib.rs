#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Roofline Core
//!
//! Rust core for the Roofline roofing-inspection platform: the offer/report
//! lifecycle state machine paired with its time-triggered notification and
//! delivery pipeline.
//!
//! ## Overview
//!
//! The surrounding product is ordinary CRUD; this crate carries the one
//! subsystem with real invariants, scheduling, and failure handling:
//!
//! - status transitions for reports and offers, enforced by a single
//!   transition table with conditional persisted writes;
//! - an email dispatch pipeline with validation, suppression filtering,
//!   and a restricted/disabled delivery mode gate;
//! - provider webhook ingestion feeding delivery status and the
//!   suppression registry, idempotent under event replay;
//! - a 5-minute retry sweep with exponential backoff over failed sends;
//! - a daily escalation sweep driving follow-up, branch-admin escalation,
//!   and offer expiry.
//!
//! External collaborators (document store, mail provider, identity/claims,
//! notification consumers) stay behind traits; the web layer exposes the
//! webhook, admin, and scheduler-trigger endpoints.
//!
//! ## Module Organization
//!
//! - [`store`] - Document store adapter and in-memory implementation
//! - [`models`] - Offer, mail, suppression, notification records
//! - [`state_machine`] - Lifecycle transition table and conditional writes
//! - [`suppression`] - Suppression registry with append-only audit trail
//! - [`dispatch`] - Email dispatch pipeline and provider seam
//! - [`ingestion`] - Delivery event ingestion and webhook signatures
//! - [`scheduler`] - Retry and escalation sweeps
//! - [`web`] - Webhook, admin, and scheduler-trigger endpoints
//! - [`config`] - Explicit per-process configuration
//! - [`error`] - Structured error handling

pub mod auth;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod ingestion;
pub mod logging;
pub mod models;
pub mod notifications;
pub mod scheduler;
pub mod state_machine;
pub mod store;
pub mod suppression;
pub mod test_utils;
pub mod utils;
pub mod web;

pub use error::{CoreError, Result};
