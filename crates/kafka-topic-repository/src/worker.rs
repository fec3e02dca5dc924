use std::sync::Arc;
use std::time::{Duration, Instant};

use fluvio_future::task::spawn;
use fluvio_future::timer::sleep;
use tracing::{debug, info, instrument};

use crate::error::TopicRepositoryError;
use crate::fetcher::BatchFetcher;
use crate::repository::RepositoryInner;

/// Drains the read queue once per tick and hands it to the fetcher.
///
/// The only consumer of the queue, which coalesces concurrent reads and
/// bounds the rate of batch calls to one cycle per tick.
pub(crate) struct BatchWorker {
    inner: Arc<RepositoryInner>,
    fetcher: BatchFetcher,
}

impl BatchWorker {
    pub fn start(inner: Arc<RepositoryInner>) {
        let fetcher = BatchFetcher::new(inner.client.clone(), &inner.config);
        let worker = Self { inner, fetcher };

        info!(
            tick = ?worker.inner.config.tick_interval,
            batch_size = worker.inner.config.batch_size,
            "starting topic repository worker"
        );
        spawn(worker.dispatch_loop());
    }

    #[instrument(skip(self), name = "TopicRepositoryWorker")]
    async fn dispatch_loop(self) {
        use tokio::select;

        let tick = self.inner.config.tick_interval;
        let mut next_tick = Instant::now() + tick;

        loop {
            if self.inner.stop.is_set() {
                debug!("stop raised, exiting");
                break;
            }

            select! {
                _ = self.inner.stop.listen() => {
                    debug!("stop received");
                    break;
                },
                _ = sleep(next_tick.saturating_duration_since(Instant::now())) => {
                    next_tick = next_tick_after(next_tick, tick, Instant::now());
                    if let Some(queue) = self.inner.withdraw().await {
                        debug!(topics = queue.len(), "drained read queue");
                        self.fetcher.fetch(queue).await;
                    }
                }
            }
        }

        let abandoned = self.inner.close().await;
        if !abandoned.is_empty() {
            debug!(count = abandoned.len(), "failing reads queued at stop");
        }
        for request in abandoned {
            request.send(Err(TopicRepositoryError::Stopped));
        }

        info!("topic repository worker terminated");
    }
}

/// Ticks stay on a fixed grid; ticks missed during a long fetch are skipped.
fn next_tick_after(scheduled: Instant, tick: Duration, now: Instant) -> Instant {
    let next = scheduled + tick;
    if next > now {
        return next;
    }
    let behind = now.duration_since(scheduled).as_nanos() / tick.as_nanos().max(1);
    scheduled + tick * (behind as u32 + 1)
}
