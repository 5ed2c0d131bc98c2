//! E2E integration tests for dropwatch-daemon.
//!
//! These tests drive the full daemon wiring (drop monitor → processor →
//! router → exporters) against the in-memory `MockKernel`.
//!
//! # Test Structure
//!
//! - `helpers/` -- Shared test utilities (config, capture sinks, waiting)
//! - `scenarios/` -- Test files organized by scenario
//!
//! # Running
//!
//! ```bash
//! cargo test -p dropwatch-daemon --test e2e
//! ```

mod helpers;
mod scenarios;
