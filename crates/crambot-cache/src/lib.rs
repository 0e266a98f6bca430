// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Caching for the Crambot gateway.
//!
//! `kv` holds the [`DistributedCache`](crambot_core::DistributedCache)
//! backends and `tenant` the read-through tenant snapshot cache built on them.

pub mod kv;
pub mod tenant;

pub use kv::{InMemoryKv, UpstashKv};
pub use tenant::TenantCache;
