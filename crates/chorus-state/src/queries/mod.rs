// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed queries against the state database, one module per table group.

pub mod health;
pub mod lifecycle;
pub mod platform_state;
pub mod sync;
