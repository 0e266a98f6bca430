// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for integration testing.
//!
//! `TestHarness` owns a temp SQLite database, an in-memory KV, a background
//! task tracker and one mock per external collaborator. Higher-level crates
//! build their components on top of it.

use std::sync::Arc;

use chrono::{Duration, Utc};
use crambot_cache::InMemoryKv;
use crambot_config::model::{CrambotConfig, StorageConfig};
use crambot_core::types::{ParentBinding, ParentChild, TenantBinding};
use crambot_core::{
    BackgroundTasks, BusinessApi, ChatTransport, DistributedCache, IntentClassifier,
    StorageAdapter,
};
use crambot_storage::SqliteStorage;

use crate::mock_api::MockBusinessApi;
use crate::mock_classifier::MockClassifier;
use crate::mock_transport::MockTransport;

pub struct TestHarness {
    pub config: CrambotConfig,
    pub storage: Arc<SqliteStorage>,
    pub kv: Arc<InMemoryKv>,
    pub tasks: BackgroundTasks,
    pub admin_transport: Arc<MockTransport>,
    pub parent_transport: Arc<MockTransport>,
    pub classifier: Arc<MockClassifier>,
    pub api: Arc<MockBusinessApi>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Builds a harness with default configuration.
    ///
    /// Panics if the temp database cannot be created.
    pub async fn new() -> Self {
        Self::with_config(CrambotConfig::default()).await
    }

    pub async fn with_config(mut config: CrambotConfig) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("temp dir");
        config.storage = StorageConfig {
            database_path: temp_dir
                .path()
                .join("test.db")
                .to_string_lossy()
                .into_owned(),
            wal_mode: true,
        };
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await.expect("initialize storage");

        Self {
            config,
            storage: Arc::new(storage),
            kv: Arc::new(InMemoryKv::new()),
            tasks: BackgroundTasks::new(),
            admin_transport: Arc::new(MockTransport::new("mock-admin")),
            parent_transport: Arc::new(MockTransport::new("mock-parent")),
            classifier: Arc::new(MockClassifier::new()),
            api: Arc::new(MockBusinessApi::new()),
            _temp_dir: temp_dir,
        }
    }

    pub fn store(&self) -> Arc<dyn StorageAdapter> {
        self.storage.clone()
    }

    pub fn kv(&self) -> Arc<dyn DistributedCache> {
        self.kv.clone()
    }

    pub fn admin(&self) -> Arc<dyn ChatTransport> {
        self.admin_transport.clone()
    }

    pub fn parent(&self) -> Arc<dyn ChatTransport> {
        self.parent_transport.clone()
    }

    pub fn classifier(&self) -> Arc<dyn IntentClassifier> {
        self.classifier.clone()
    }

    pub fn api(&self) -> Arc<dyn BusinessApi> {
        self.api.clone()
    }

    /// Binds an admin user to a tenant and makes it active.
    pub async fn bind_admin(&self, user_id: &str, tenant_id: &str, tenant_name: &str) {
        self.storage
            .add_user_binding(
                user_id,
                &TenantBinding {
                    tenant_id: tenant_id.to_string(),
                    tenant_name: tenant_name.to_string(),
                    role: "admin".to_string(),
                },
            )
            .await
            .expect("bind admin");
    }

    /// Binds a parent to one child of a tenant.
    pub async fn bind_parent(
        &self,
        user_id: &str,
        tenant_id: &str,
        student_id: &str,
        student_name: &str,
    ) {
        let now = Utc::now();
        self.storage
            .put_parent_binding(&ParentBinding {
                user_id: user_id.to_string(),
                tenant_id: tenant_id.to_string(),
                parent_name: "家長".to_string(),
                children: vec![ParentChild {
                    student_id: student_id.to_string(),
                    student_name: student_name.to_string(),
                    relation: "家長".to_string(),
                }],
                created_at: now - Duration::days(1),
                last_active_at: now,
            })
            .await
            .expect("bind parent");
    }
}
