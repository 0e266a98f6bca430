// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The single broadcast worker.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crambot_config::model::BroadcastConfig;
use crambot_core::types::{BroadcastJob, JobStatus};
use crambot_core::{ChatTransport, StorageAdapter};
use crambot_ratelimit::RateLimiter;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct BroadcastWorker {
    rx: mpsc::UnboundedReceiver<String>,
    store: Arc<dyn StorageAdapter>,
    transport: Arc<dyn ChatTransport>,
    limiter: Arc<RateLimiter>,
    pace: Duration,
    flush_every: u32,
}

impl BroadcastWorker {
    pub(crate) fn new(
        config: &BroadcastConfig,
        store: Arc<dyn StorageAdapter>,
        transport: Arc<dyn ChatTransport>,
        limiter: Arc<RateLimiter>,
        rx: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self {
            rx,
            store,
            transport,
            limiter,
            pace: Duration::from_secs(1) / config.sends_per_second.max(1),
            flush_every: config.flush_every.max(1),
        }
    }

    /// Processes jobs in arrival order until `cancel` fires or every queue handle is dropped.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("broadcast worker started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = self.rx.recv() => match next {
                    Some(job_id) => self.process(&job_id, &cancel).await,
                    None => break,
                },
            }
        }
        info!("broadcast worker stopped");
    }

    async fn process(&self, job_id: &str, cancel: &CancellationToken) {
        let mut job = match self.store.get_broadcast_job(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!(job_id, "queued broadcast job not found");
                return;
            }
            Err(e) => {
                error!(job_id, error = %e, "failed to load broadcast job");
                return;
            }
        };

        job.status = JobStatus::Processing;
        self.flush(&mut job).await;
        info!(job_id, recipients = job.chat_ids.len(), "broadcast started");

        let mut ticker = tokio::time::interval(self.pace);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // One attempt per recipient; a failed send is counted, not retried.
        let options = job.options.clone().without_retry();
        let recipients = job.chat_ids.clone();
        for (i, chat_id) in recipients.iter().enumerate() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(job_id, sent = i, "broadcast interrupted by shutdown");
                    self.flush(&mut job).await;
                    return;
                }
                _ = self.admitted_tick(&mut ticker) => {}
            }

            match self
                .transport
                .send_message(chat_id, &job.message, &options)
                .await
            {
                Ok(_) => {
                    job.progress.succeeded += 1;
                    metrics::counter!("crambot_broadcast_sends_total", "outcome" => "succeeded")
                        .increment(1);
                }
                Err(e) => {
                    job.progress.failed += 1;
                    metrics::counter!("crambot_broadcast_sends_total", "outcome" => "failed")
                        .increment(1);
                    debug!(job_id, chat_id = %chat_id, error = %e, "broadcast send failed");
                }
            }

            if job.progress.processed() % self.flush_every == 0 {
                self.flush(&mut job).await;
            }
        }

        job.status = if job.progress.failed == job.progress.total {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };
        self.flush(&mut job).await;
        info!(
            job_id,
            status = %job.status,
            succeeded = job.progress.succeeded,
            failed = job.progress.failed,
            "broadcast finished"
        );
    }

    /// Waits for the local pacing tick, then for a slot under the global ceiling.
    async fn admitted_tick(&self, ticker: &mut tokio::time::Interval) {
        ticker.tick().await;
        self.limiter.wait_global().await;
    }

    async fn flush(&self, job: &mut BroadcastJob) {
        job.updated_at = Utc::now();
        if let Err(e) = self.store.put_broadcast_job(job).await {
            warn!(job_id = %job.id, error = %e, "failed to persist broadcast progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::channel;
    use async_trait::async_trait;
    use crambot_config::model::CrambotConfig;
    use crambot_core::types::{AdapterType, HealthStatus, MessageRef, SendOptions};
    use crambot_core::{CrambotError, PluginAdapter};
    use crambot_test_utils::TestHarness;
    use tokio::sync::Semaphore;

    async fn harness() -> TestHarness {
        let mut config = CrambotConfig::default();
        config.broadcast.sends_per_second = 200;
        config.broadcast.flush_every = 2;
        TestHarness::with_config(config).await
    }

    fn start(h: &TestHarness) -> (crate::BroadcastQueue, CancellationToken) {
        let limiter = Arc::new(RateLimiter::new(
            &h.config.rate_limit,
            h.kv(),
            h.store(),
            h.tasks.clone(),
        ));
        let (queue, worker) = channel(&h.config.broadcast, h.store(), h.admin(), limiter);
        let cancel = CancellationToken::new();
        tokio::spawn(worker.run(cancel.clone()));
        (queue, cancel)
    }

    async fn wait_done(queue: &crate::BroadcastQueue, id: &str) -> BroadcastJob {
        for _ in 0..200 {
            let job = queue.get_job(id).await.unwrap().unwrap();
            if matches!(job.status, JobStatus::Completed | JobStatus::Failed) {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} did not finish");
    }

    fn ids(chats: &[&str]) -> Vec<String> {
        chats.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn partial_failure_completes_with_counts() {
        let h = harness().await;
        h.admin_transport.fail_chat("B").await;
        let (queue, cancel) = start(&h);

        let id = queue
            .enqueue(ids(&["A", "B", "C"]), "停課通知".into(), SendOptions::default())
            .await
            .unwrap();
        let job = wait_done(&queue, &id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress.total, 3);
        assert_eq!(job.progress.succeeded, 2);
        assert_eq!(job.progress.failed, 1);
        let sent: Vec<String> = h
            .admin_transport
            .sent()
            .await
            .into_iter()
            .map(|m| m.chat_id)
            .collect();
        assert_eq!(sent, vec!["A", "C"]);
        cancel.cancel();
    }

    #[tokio::test]
    async fn broadcast_sends_are_single_attempt() {
        let h = harness().await;
        let (queue, cancel) = start(&h);

        let id = queue
            .enqueue(ids(&["A", "B"]), "補課通知".into(), SendOptions::default())
            .await
            .unwrap();
        wait_done(&queue, &id).await;

        let sent = h.admin_transport.sent().await;
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|m| m.options.single_attempt));
        cancel.cancel();
    }

    /// Lets the first `open` sends through, then holds each further send
    /// until a permit is added.
    struct GatedTransport {
        inner: Arc<dyn ChatTransport>,
        open: AtomicU32,
        gate: Semaphore,
    }

    #[async_trait]
    impl PluginAdapter for GatedTransport {
        fn name(&self) -> &str {
            "gated"
        }

        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }

        fn adapter_type(&self) -> AdapterType {
            AdapterType::Transport
        }

        async fn health_check(&self) -> Result<HealthStatus, CrambotError> {
            Ok(HealthStatus::Healthy)
        }

        async fn shutdown(&self) -> Result<(), CrambotError> {
            Ok(())
        }
    }

    #[async_trait]
    impl ChatTransport for GatedTransport {
        async fn send_message(
            &self,
            chat_id: &str,
            text: &str,
            options: &SendOptions,
        ) -> Result<MessageRef, CrambotError> {
            let passed = self
                .open
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if !passed {
                self.gate
                    .acquire()
                    .await
                    .map_err(|e| CrambotError::Transport {
                        message: e.to_string(),
                        source: None,
                    })?
                    .forget();
            }
            self.inner.send_message(chat_id, text, options).await
        }

        async fn edit_message_text(
            &self,
            chat_id: &str,
            message_id: &str,
            text: &str,
            options: &SendOptions,
        ) -> Result<(), CrambotError> {
            self.inner
                .edit_message_text(chat_id, message_id, text, options)
                .await
        }

        async fn answer_callback(
            &self,
            callback_id: &str,
            text: Option<&str>,
        ) -> Result<(), CrambotError> {
            self.inner.answer_callback(callback_id, text).await
        }
    }

    #[tokio::test]
    async fn progress_is_visible_while_the_job_runs() {
        let h = harness().await;
        let gated = Arc::new(GatedTransport {
            inner: h.admin(),
            open: AtomicU32::new(2),
            gate: Semaphore::new(0),
        });
        let limiter = Arc::new(RateLimiter::new(
            &h.config.rate_limit,
            h.kv(),
            h.store(),
            h.tasks.clone(),
        ));
        let (queue, worker) = channel(&h.config.broadcast, h.store(), gated.clone(), limiter);
        let cancel = CancellationToken::new();
        tokio::spawn(worker.run(cancel.clone()));

        let id = queue
            .enqueue(ids(&["A", "B", "C", "D"]), "颱風停課".into(), SendOptions::default())
            .await
            .unwrap();

        let mut midway = None;
        for _ in 0..200 {
            let job = queue.get_job(&id).await.unwrap().unwrap();
            if job.progress.processed() == 2 {
                midway = Some(job);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let midway = midway.expect("first flush after two sends");
        assert_eq!(midway.status, JobStatus::Processing);
        assert_eq!(midway.progress.total, 4);
        assert_eq!(midway.progress.succeeded, 2);
        assert_eq!(midway.progress.failed, 0);

        gated.gate.add_permits(2);
        let done = wait_done(&queue, &id).await;
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress.succeeded, 4);
        cancel.cancel();
    }

    #[tokio::test]
    async fn all_failed_marks_job_failed() {
        let h = harness().await;
        h.admin_transport.fail_chat("A").await;
        h.admin_transport.fail_chat("B").await;
        let (queue, cancel) = start(&h);

        let id = queue
            .enqueue(ids(&["A", "B"]), "test".into(), SendOptions::default())
            .await
            .unwrap();
        let job = wait_done(&queue, &id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress.failed, 2);
        cancel.cancel();
    }

    #[tokio::test]
    async fn jobs_run_in_submission_order() {
        let h = harness().await;
        let (queue, cancel) = start(&h);

        let first = queue
            .enqueue(ids(&["1", "2", "3"]), "first".into(), SendOptions::default())
            .await
            .unwrap();
        let second = queue
            .enqueue(ids(&["4", "5"]), "second".into(), SendOptions::default())
            .await
            .unwrap();
        wait_done(&queue, &first).await;
        wait_done(&queue, &second).await;

        let sent: Vec<(String, String)> = h
            .admin_transport
            .sent()
            .await
            .into_iter()
            .map(|m| (m.chat_id, m.text))
            .collect();
        let chats: Vec<&str> = sent.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(chats, vec!["1", "2", "3", "4", "5"]);
        assert_eq!(sent[3].1, "second");

        let listed = queue.list_jobs(10).await.unwrap();
        assert_eq!(listed.len(), 2);
        cancel.cancel();
    }

    #[tokio::test]
    async fn empty_recipient_list_is_rejected() {
        let h = harness().await;
        let (queue, cancel) = start(&h);
        assert!(
            queue
                .enqueue(vec![], "x".into(), SendOptions::default())
                .await
                .is_err()
        );
        assert!(queue.list_jobs(10).await.unwrap().is_empty());
        cancel.cancel();
    }

    #[tokio::test]
    async fn unknown_job_is_absent() {
        let h = harness().await;
        let (queue, cancel) = start(&h);
        assert!(queue.get_job("broadcast_0_zzzzzz").await.unwrap().is_none());
        cancel.cancel();
    }
}
