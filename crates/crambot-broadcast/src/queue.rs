// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job submission and lookup.

use std::sync::Arc;

use chrono::Utc;
use crambot_config::model::BroadcastConfig;
use crambot_core::types::{BroadcastJob, BroadcastProgress, JobStatus, SendOptions};
use crambot_core::{CrambotError, StorageAdapter};
use rand::Rng;
use tokio::sync::mpsc;
use tracing::info;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `broadcast_{unix_ms}_{6 base-36 chars}`.
pub fn new_job_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("broadcast_{}_{suffix}", Utc::now().timestamp_millis())
}

#[derive(Clone)]
pub struct BroadcastQueue {
    tx: mpsc::UnboundedSender<String>,
    store: Arc<dyn StorageAdapter>,
    job_ttl: chrono::Duration,
}

impl BroadcastQueue {
    pub(crate) fn new(
        config: &BroadcastConfig,
        store: Arc<dyn StorageAdapter>,
        tx: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            tx,
            store,
            job_ttl: chrono::Duration::from_std(std::time::Duration::from_secs(
                config.job_ttl_hours.saturating_mul(3600),
            ))
            .unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Persists a pending job and queues it behind any earlier jobs.
    pub async fn enqueue(
        &self,
        chat_ids: Vec<String>,
        message: String,
        options: SendOptions,
    ) -> Result<String, CrambotError> {
        if chat_ids.is_empty() {
            return Err(CrambotError::Internal(
                "broadcast needs at least one recipient".into(),
            ));
        }
        let now = Utc::now();
        let job = BroadcastJob {
            id: new_job_id(),
            progress: BroadcastProgress {
                total: u32::try_from(chat_ids.len()).unwrap_or(u32::MAX),
                succeeded: 0,
                failed: 0,
            },
            chat_ids,
            message,
            options,
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            expires_at: now + self.job_ttl,
        };
        self.store.put_broadcast_job(&job).await?;
        self.tx
            .send(job.id.clone())
            .map_err(|_| CrambotError::Internal("broadcast worker has stopped".into()))?;

        metrics::counter!("crambot_broadcast_jobs_total").increment(1);
        info!(job_id = %job.id, recipients = job.progress.total, "broadcast job queued");
        Ok(job.id)
    }

    /// Returns the job unless it is unknown or past its expiry.
    pub async fn get_job(&self, id: &str) -> Result<Option<BroadcastJob>, CrambotError> {
        Ok(self
            .store
            .get_broadcast_job(id)
            .await?
            .filter(|job| job.expires_at >= Utc::now()))
    }

    /// Unexpired jobs, newest first.
    pub async fn list_jobs(&self, limit: u32) -> Result<Vec<BroadcastJob>, CrambotError> {
        let now = Utc::now();
        Ok(self
            .store
            .list_broadcast_jobs(limit)
            .await?
            .into_iter()
            .filter(|job| job.expires_at >= now)
            .collect())
    }
}
