//! Background cache writer.
//! Persist jobs are queued on a channel and written by one worker task, so the
//! response path never waits on SQLite. Failures end at the log.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::TranslationCache;
use crate::metrics::{metric_names, MetricsRegistry};
use crate::model::{CacheData, LanguageContext};

/// One generated short-text result waiting to be cached.
#[derive(Debug, Clone)]
pub struct PersistJob {
    pub request_id: String,
    pub text: String,
    pub translation: String,
    pub context: LanguageContext,
    pub data: CacheData,
}

enum WriterMessage {
    Persist(PersistJob),
    Flush(oneshot::Sender<()>),
}

pub struct CacheWriter {
    tx: mpsc::UnboundedSender<WriterMessage>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CacheWriter {
    /// Start the worker on the current Tokio runtime.
    pub fn spawn(cache: TranslationCache, metrics: Arc<MetricsRegistry>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(writer_loop(rx, cache, metrics, cancel.clone()));
        info!("cache writer started");
        Self {
            tx,
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Queue a job. Never blocks.
    pub fn submit(&self, job: PersistJob) {
        let request_id = job.request_id.clone();
        if self.tx.send(WriterMessage::Persist(job)).is_err() {
            warn!(%request_id, "cache writer stopped, dropping persist job");
        }
    }

    /// Wait until every job submitted before this call has been handled.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriterMessage::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    /// Stop accepting work, write what is already queued, and join the worker.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "cache writer task panicked");
            }
        }
    }
}

impl Drop for CacheWriter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn writer_loop(
    mut rx: mpsc::UnboundedReceiver<WriterMessage>,
    cache: TranslationCache,
    metrics: Arc<MetricsRegistry>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(msg) => handle_message(msg, &cache, &metrics).await,
                None => {
                    info!("cache writer exiting (channel closed)");
                    return;
                }
            }
        }
    }

    rx.close();
    let mut drained = 0usize;
    while let Ok(msg) = rx.try_recv() {
        drained += 1;
        handle_message(msg, &cache, &metrics).await;
    }
    info!(drained, "cache writer stopped");
}

async fn handle_message(msg: WriterMessage, cache: &TranslationCache, metrics: &Arc<MetricsRegistry>) {
    match msg {
        WriterMessage::Persist(job) => write_job(job, cache, metrics).await,
        WriterMessage::Flush(done) => {
            let _ = done.send(());
        }
    }
}

async fn write_job(job: PersistJob, cache: &TranslationCache, metrics: &Arc<MetricsRegistry>) {
    let span = metrics.span(metric_names::PERSIST);
    let result = cache
        .persist(&job.text, &job.translation, &job.context, job.data)
        .await;
    let elapsed_us = span.finish();

    match result {
        Ok(outcome) => debug!(
            request_id = %job.request_id,
            inserted = outcome.inserted,
            deduplicated = outcome.deduplicated,
            elapsed_us,
            "cache persist done"
        ),
        Err(e) => error!(
            request_id = %job.request_id,
            text = %job.text,
            error = %e,
            "cache persist failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context_en_es, sample_data, seeded_store, BrokenStore};
    use std::sync::atomic::Ordering;

    fn job(text: &str) -> PersistJob {
        PersistJob {
            request_id: format!("req-{text}"),
            text: text.into(),
            translation: format!("{text}-es"),
            context: context_en_es(),
            data: sample_data(),
        }
    }

    #[tokio::test]
    async fn flush_waits_for_queued_jobs() {
        let (_dir, store) = seeded_store().await;
        let metrics = Arc::new(MetricsRegistry::new());
        let writer = CacheWriter::spawn(
            TranslationCache::new(Arc::new(store.clone())),
            Arc::clone(&metrics),
        );

        writer.submit(job("Eat"));
        writer.flush().await;

        let counts = store.table_counts().await.unwrap();
        // Main pair plus three example pairs.
        assert_eq!(counts.translations, 4);
        assert_eq!(counts.synonyms, 2);
        assert_eq!(counts.example_links, 1);
        assert_eq!(metrics.count(metric_names::PERSIST), 1);
        writer.shutdown().await;
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_worker() {
        let store = Arc::new(BrokenStore::new());
        let writer = CacheWriter::spawn(
            TranslationCache::new(store.clone()),
            Arc::new(MetricsRegistry::new()),
        );

        writer.submit(job("Eat"));
        writer.submit(job("Drink"));
        writer.flush().await;
        assert_eq!(store.persist_calls.load(Ordering::SeqCst), 2);
        writer.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_drains_pending_jobs() {
        let (_dir, store) = seeded_store().await;
        let writer = CacheWriter::spawn(
            TranslationCache::new(Arc::new(store.clone())),
            Arc::new(MetricsRegistry::new()),
        );

        for text in ["Eat", "Drink", "Sleep"] {
            writer.submit(job(text));
        }
        writer.shutdown().await;

        // Example pairs are shared, so only the three main pairs are new.
        assert_eq!(store.table_counts().await.unwrap().translations, 6);
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_dropped() {
        let (_dir, store) = seeded_store().await;
        let writer = CacheWriter::spawn(
            TranslationCache::new(Arc::new(store.clone())),
            Arc::new(MetricsRegistry::new()),
        );
        writer.shutdown().await;

        writer.submit(job("Eat"));
        writer.flush().await;
        assert_eq!(store.table_counts().await.unwrap().translations, 0);
    }
}
