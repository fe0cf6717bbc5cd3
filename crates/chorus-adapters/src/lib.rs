// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform adapters for the Chorus sync daemon.
//!
//! Every platform is the same composition: a [`PlatformProfile`] that knows
//! how to probe credentials and normalize the platform's records, plus a
//! [`SyncClient`] that produces those records. [`SyncAdapter`] glues the two
//! into a [`PlatformAdapter`](chorus_core::PlatformAdapter), and
//! [`forward_events`] is the shared path from client events to the
//! adapter's event hub.
//!
//! Wire protocols live in external sync clients. The bundled client is a
//! [`Poller`] over a [`SpoolSource`]: those clients drop JSONL records into a
//! per-platform spool directory and the poller picks them up.

pub mod adapter;
pub mod client;
pub mod poller;
pub mod profiles;
pub mod registry;
pub mod spool;

pub use adapter::{PlatformProfile, SyncAdapter};
pub use client::{ClientEvent, SyncClient, forward_events};
pub use poller::{PollBatch, PollSource, Poller, PollerOptions};
pub use registry::build_adapters;
pub use spool::SpoolSource;
