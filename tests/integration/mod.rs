//! Integration test suite for the orchestration engine.
//!
//! These tests exercise full workflow executions against scripted workers:
//! dependency-ordered completion, retry and backoff policy, cooperative
//! cancellation, and re-attachment of persisted workflows.
//!
//! # Test Categories
//!
//! - `workflow_e2e`: full workflow execution and status/broadcast behavior
//! - `retry_policy`: failure injection, backoff, timeouts
//! - `cancellation`: `stop` semantics and late-result discarding
//! - `recovery`: `resume` after a simulated process restart
//!
//! # CI Compatibility
//!
//! Workers are in-process mocks; no network or external services are
//! required.


mod cancellation;
mod retry_policy;
