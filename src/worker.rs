use super::{
    errors::{DispatchError, SharedError},
    job::{BoxedJob, Job},
};
use std::{
    panic::AssertUnwindSafe,
    sync::Arc,
};
use futures::FutureExt;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::Instrument;


pub(crate) type JobQueue<T> = Arc<Mutex<mpsc::Receiver<BoxedJob<T>>>>;


/// Воркер: забирает задачи из общей очереди и отдаёт ровно один исход на задачу.
///
/// Воркер не решает, когда пулу остановиться: он завершается, только когда
/// очередь закрыта и пуста.
pub(crate) struct Worker<T> {
    id: usize,
    jobs: JobQueue<T>,
    results: mpsc::UnboundedSender<T>,
    errors: mpsc::UnboundedSender<SharedError>,
}

impl<T: Send + 'static> Worker<T> {
    pub(crate) fn new(
        id: usize,
        jobs: JobQueue<T>,
        results: mpsc::UnboundedSender<T>,
        errors: mpsc::UnboundedSender<SharedError>,
    ) -> Self {
        Self {
            id,
            jobs,
            results,
            errors,
        }
    }

    pub(crate) fn start(self) -> JoinHandle<()> {
        let span = tracing::debug_span!("worker", id = self.id);
        tokio::spawn(self.run().instrument(span))
    }

    async fn run(self) {
        tracing::debug!("worker started");

        loop {
            // Блокировка держится только на время получения задачи
            let job = {
                let mut rx = self.jobs.lock().await;
                rx.recv().await
            };
            let Some(job) = job else {
                break;
            };

            tracing::trace!("executing job");
            let outcome = AssertUnwindSafe(async move { job.execute().await })
                .catch_unwind()
                .await;

            let delivered = match outcome {
                Ok(Ok(value)) => self.results.send(value).is_ok(),
                Ok(Err(err)) => self.errors.send(Arc::from(err)).is_ok(),
                Err(panic_info) => {
                    let err = DispatchError::from_panic(panic_info);
                    tracing::warn!(error = %err, "job panicked, reporting as failure");
                    self.errors.send(err.shared()).is_ok()
                }
            };

            if !delivered {
                tracing::error!("collector is gone, outcome dropped");
                break;
            }
        }

        tracing::debug!("worker stopped");
    }
}
