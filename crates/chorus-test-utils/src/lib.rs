// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Chorus integration tests.
//!
//! Provides a scriptable adapter and a harness that assembles a complete
//! daemon over temporary storage, for fast deterministic tests without
//! any platform client installed.
//!
//! # Components
//!
//! - [`MockAdapter`] - platform adapter whose events are injected by the test
//! - [`TestHarness`] - platform manager over a temp store, index and state database
//! - [`fixtures`] - builders for normalized messages

pub mod fixtures;
pub mod harness;
pub mod mock_adapter;

pub use harness::{TestHarness, TestHarnessBuilder, wait_until};
pub use mock_adapter::MockAdapter;
