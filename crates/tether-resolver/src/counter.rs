use crate::cached::access_count_key;
use crate::config::ResolverConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{KvCache, LinkStore};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

enum Message {
    Hit(String),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Records cache-hit resolutions without waiting on any I/O.
///
/// Hits are queued for the [`CounterFlusher`] task; when the queue is full
/// or the task has stopped the hit is dropped and logged.
#[derive(Debug, Clone)]
pub struct HitRecorder {
    tx: mpsc::Sender<Message>,
}

impl HitRecorder {
    pub fn record(&self, code: &str) {
        match self.tx.try_send(Message::Hit(code.to_owned())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(code, "Hit queue is full, dropping access count update");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(code, "Counter flusher has stopped, dropping access count update");
            }
        }
    }
}

/// Controls a running [`CounterFlusher`].
#[derive(Debug)]
pub struct FlusherHandle {
    tx: mpsc::Sender<Message>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FlusherHandle {
    /// Writes every pending hit to the store and waits until it is done.
    ///
    /// Returns immediately if the flusher has already stopped.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Message::Flush(ack)).await.is_ok() {
            let _ = done.await;
        }
    }

    /// Flushes pending hits and stops the flusher. Later hits are dropped.
    pub async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Message::Shutdown(ack)).await.is_ok() {
            let _ = done.await;
        }

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Counter flusher task failed");
            }
        }
    }
}

/// Background task that turns cache hits into store access counts.
///
/// Each hit bumps the code's counter in the cache (`access_count:<code>`,
/// given an expiry when first created) and adds one pending hit for the
/// code. Pending hits are written with `add_access_count` when the counter
/// reaches a multiple of `flush_batch`, every `flush_interval`, on
/// [`FlusherHandle::flush`] and on shutdown.
///
/// Cache failures are logged and counting continues. A failed store write
/// keeps its hits pending for the next flush.
pub struct CounterFlusher<S, C> {
    store: Arc<S>,
    cache: Arc<C>,
    counter_ttl: Duration,
    flush_batch: i64,
    pending: HashMap<String, i64>,
}

impl<S: LinkStore, C: KvCache> CounterFlusher<S, C> {
    /// Spawns the flusher on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn(store: Arc<S>, cache: Arc<C>, config: &ResolverConfig) -> (HitRecorder, FlusherHandle) {
        let (tx, rx) = mpsc::channel(config.hit_channel_capacity.max(1));
        let flusher = Self {
            store,
            cache,
            counter_ttl: config.counter_ttl,
            flush_batch: config.flush_batch.max(1),
            pending: HashMap::new(),
        };
        let task = tokio::spawn(flusher.run(rx, config.flush_interval));

        (
            HitRecorder { tx: tx.clone() },
            FlusherHandle {
                tx,
                task: Mutex::new(Some(task)),
            },
        )
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Message>, flush_interval: Duration) {
        let mut ticker = tokio::time::interval(flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some(Message::Hit(code)) => self.on_hit(code).await,
                    Some(Message::Flush(ack)) => {
                        self.flush_all().await;
                        let _ = ack.send(());
                    }
                    Some(Message::Shutdown(ack)) => {
                        self.flush_all().await;
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        self.flush_all().await;
                        break;
                    }
                },
                _ = ticker.tick() => self.flush_all().await,
            }
        }

        if !self.pending.is_empty() {
            warn!(codes = self.pending.len(), "Counter flusher stopped with unflushed hits");
        }
        debug!("Counter flusher stopped");
    }

    async fn on_hit(&mut self, code: String) {
        let key = access_count_key(&code);
        *self.pending.entry(code.clone()).or_insert(0) += 1;

        match self.cache.incr(&key).await {
            Ok(count) => {
                if count == 1 {
                    if let Err(e) = self.cache.expire(&key, self.counter_ttl).await {
                        warn!(code = %code, error = %e, "Failed to set access counter expiry");
                    }
                }
                if count % self.flush_batch == 0 {
                    trace!(code = %code, count, "Access counter reached flush threshold");
                    self.flush(&code).await;
                }
            }
            Err(e) => {
                warn!(code = %code, error = %e, "Failed to increment access counter");
            }
        }
    }

    async fn flush(&mut self, code: &str) {
        let Some(delta) = self.pending.remove(code) else {
            return;
        };

        match self.store.add_access_count(code, delta).await {
            Ok(Some(total)) => trace!(code, delta, total, "Flushed access count"),
            Ok(None) => warn!(code, delta, "Dropping hits for a code the store does not know"),
            Err(e) => {
                warn!(code, delta, error = %e, "Failed to flush access count, keeping hits pending");
                *self.pending.entry(code.to_owned()).or_insert(0) += delta;
            }
        }
    }

    async fn flush_all(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let codes: Vec<String> = self.pending.keys().cloned().collect();
        debug!(codes = codes.len(), "Flushing pending access counts");
        for code in codes {
            self.flush(&code).await;
        }
    }
}
