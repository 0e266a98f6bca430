// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! External collaborators extend [`PluginAdapter`] and use `#[async_trait]`
//! so they can be held as `Arc<dyn Trait>`.

pub mod adapter;
pub mod business;
pub mod classifier;
pub mod kv;
pub mod storage;
pub mod transport;

pub use adapter::PluginAdapter;
pub use business::BusinessApi;
pub use classifier::{ClassifierContext, IntentClassifier};
pub use kv::DistributedCache;
pub use storage::StorageAdapter;
pub use transport::ChatTransport;
