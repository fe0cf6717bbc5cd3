// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions implemented by platform adapters.

pub mod adapter;

pub use adapter::{AdapterMap, PlatformAdapter};
