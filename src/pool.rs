use super::{
    aggregate::Errors,
    errors::{DispatchError, SharedError},
    job::{BoxedJob, Job},
    model::{DispatcherMetrics, DispatcherState},
    worker::{JobQueue, Worker},
};
use std::{
    mem,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
};
use crossbeam::utils::CachePadded;
use tokio::{
    runtime::Handle,
    sync::{mpsc, Notify},
    task::{JoinError, JoinHandle},
};


/// Конфигурация диспетчера
#[derive(Debug, Clone)]
pub struct Config {
    pub max_workers: usize,
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            max_workers: num_cpus * 2, // Для I/O-bound задач
            queue_capacity: num_cpus * 20,
        }
    }
}

impl Config {
    pub fn cpu_bound() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            max_workers: num_cpus,
            queue_capacity: num_cpus * 10,
        }
    }

    pub fn io_bound() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.max_workers < 1 {
            return Err(DispatchError::NO_WORKERS);
        }
        if self.queue_capacity < 1 {
            return Err(DispatchError::ZERO_QUEUE);
        }
        Ok(())
    }
}


#[derive(Default)]
struct Counters {
    pending: CachePadded<AtomicUsize>,
    submitted: CachePadded<AtomicUsize>,
    completed: CachePadded<AtomicUsize>,
    failed: CachePadded<AtomicUsize>,
}

struct Channels<T> {
    jobs: mpsc::Receiver<BoxedJob<T>>,
    results_tx: mpsc::UnboundedSender<T>,
    results_rx: mpsc::UnboundedReceiver<T>,
    errors_tx: mpsc::UnboundedSender<SharedError>,
    errors_rx: mpsc::UnboundedReceiver<SharedError>,
}

struct Tasks<T> {
    workers: Vec<JoinHandle<()>>,
    collector: JoinHandle<Vec<T>>,
}

enum Lifecycle<T> {
    Created(Channels<T>),
    Running(Tasks<T>),
    // Приём закрыт; задачи остаются здесь, пока `wait` их не дождётся
    Draining(Tasks<T>),
    // Какой-то `wait` сейчас дожидается воркеров и сборщика
    Joining,
    Stopped,
}

/// Держит задачи на время join. Если future `wait` бросили,
/// недождавшиеся задачи возвращаются в `Draining`, и `wait` можно повторить.
struct JoinGuard<'a, T> {
    lifecycle: &'a Mutex<Lifecycle<T>>,
    workers: Vec<JoinHandle<()>>,
    collector: Option<JoinHandle<Vec<T>>>,
}

impl<T> Drop for JoinGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(collector) = self.collector.take() {
            let workers = mem::take(&mut self.workers);
            *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner) =
                Lifecycle::Draining(Tasks { workers, collector });
        }
    }
}


/// Диспетчер: ограниченная очередь задач, фиксированный пул воркеров
/// и единственный сборщик результатов.
///
/// Все методы принимают `&self`, поэтому несколько продюсеров могут
/// делить один `Arc<Dispatcher<T>>`.
pub struct Dispatcher<T> {
    config: Config,
    // Пока отправитель жив, очередь открыта
    admission: Mutex<Option<mpsc::Sender<BoxedJob<T>>>>,
    lifecycle: Mutex<Lifecycle<T>>,
    counters: Arc<Counters>,
    drained: Arc<Notify>,
    errors: Errors,
}

impl<T: Send + 'static> Dispatcher<T> {
    pub fn new(max_workers: usize, queue_capacity: usize) -> Result<Self, DispatchError> {
        Self::with_config(Config {
            max_workers,
            queue_capacity,
        })
    }

    pub fn with_config(config: Config) -> Result<Self, DispatchError> {
        config.validate()?;

        let (jobs_tx, jobs_rx) = mpsc::channel(config.queue_capacity);
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();

        Ok(Self {
            admission: Mutex::new(Some(jobs_tx)),
            lifecycle: Mutex::new(Lifecycle::Created(Channels {
                jobs: jobs_rx,
                results_tx,
                results_rx,
                errors_tx,
                errors_rx,
            })),
            counters: Arc::new(Counters::default()),
            drained: Arc::new(Notify::new()),
            errors: Errors::new(),
            config,
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Живой handle на ошибки; тот же, что возвращает `wait`
    #[inline]
    pub fn errors(&self) -> Errors {
        self.errors.clone()
    }

    pub fn state(&self) -> DispatcherState {
        match &*self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner) {
            Lifecycle::Created(_) => DispatcherState::Created,
            Lifecycle::Running(_) => DispatcherState::Running,
            Lifecycle::Draining(_) | Lifecycle::Joining => DispatcherState::Draining,
            Lifecycle::Stopped => DispatcherState::Stopped,
        }
    }

    pub fn metrics(&self) -> DispatcherMetrics {
        let queued = self
            .admission
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|jobs| jobs.max_capacity() - jobs.capacity())
            .unwrap_or(0);

        DispatcherMetrics {
            workers: self.config.max_workers,
            pending: self.counters.pending.load(Ordering::Acquire),
            queued,
            queue_capacity: self.config.queue_capacity,
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Ставит задачу в очередь. Если очередь полна, ждёт, пока воркеры её разгрузят.
    ///
    /// После начала `wait` возвращает `DispatchError::Closed`.
    pub async fn enqueue<J>(&self, job: J) -> Result<(), DispatchError>
    where
        J: Job<Output = T>,
    {
        let jobs = self
            .admission
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(DispatchError::Closed)?;

        // Сначала место в очереди, потом счётчик: между ними нет await,
        // поэтому отмена enqueue не оставит счётчик висеть
        let permit = jobs.reserve().await.map_err(|_| {
            tracing::error!("job queue closed while enqueuing");
            DispatchError::Closed
        })?;
        self.counters.pending.fetch_add(1, Ordering::AcqRel);
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        permit.send(Box::new(job));
        Ok(())
    }

    pub async fn enqueue_all<I>(&self, jobs: I) -> Result<(), DispatchError>
    where
        I: IntoIterator,
        I::Item: Job<Output = T>,
    {
        for job in jobs {
            self.enqueue(job).await?;
        }
        Ok(())
    }

    /// Запускает воркеров и сборщик. Не блокирует; требует контекста tokio runtime.
    ///
    /// Вне runtime возвращает `DispatchError::NoRuntime` и остаётся в `Created`.
    pub fn run(&self) -> Result<(), DispatchError> {
        let runtime = Handle::try_current().map_err(|err| {
            tracing::error!(error = %err, "dispatcher started outside of a tokio runtime");
            DispatchError::NoRuntime
        })?;

        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        let channels = match mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Created(channels) => channels,
            other => {
                *lifecycle = other;
                return Err(DispatchError::AlreadyStarted);
            }
        };

        let Channels {
            jobs,
            results_tx,
            results_rx,
            errors_tx,
            errors_rx,
        } = channels;

        let queue: JobQueue<T> = Arc::new(tokio::sync::Mutex::new(jobs));
        let workers = (0..self.config.max_workers)
            .map(|id| {
                Worker::new(id, queue.clone(), results_tx.clone(), errors_tx.clone()).start()
            })
            .collect();

        let collector = runtime.spawn(collect(
            results_rx,
            errors_rx,
            self.counters.clone(),
            self.drained.clone(),
            self.errors.clone(),
        ));

        *lifecycle = Lifecycle::Running(Tasks { workers, collector });
        tracing::info!(
            workers = self.config.max_workers,
            queue_capacity = self.config.queue_capacity,
            "dispatcher running"
        );
        Ok(())
    }

    /// Ждёт, пока все поставленные задачи дадут исход, затем останавливает пул.
    ///
    /// 1. закрывает приём задач;
    /// 2. ждёт обнуления счётчика ожидающих задач;
    /// 3. дожидается выхода всех воркеров (очередь закрыта и пуста);
    /// 4. дожидается сборщика и забирает у него результаты.
    ///
    /// Future можно бросить (например, по таймауту): состояние остаётся
    /// `Draining`, результаты не теряются, и повторный `wait` их вернёт.
    pub async fn wait(&self) -> Result<(Vec<T>, Errors), DispatchError> {
        {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            match mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Running(tasks) | Lifecycle::Draining(tasks) => {
                    *lifecycle = Lifecycle::Draining(tasks);
                }
                other => {
                    *lifecycle = other;
                    return Err(DispatchError::NotRunning);
                }
            }
        }

        let admission = self
            .admission
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(admission);

        self.wait_drained().await;

        let Tasks { workers, collector } = {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            match mem::replace(&mut *lifecycle, Lifecycle::Joining) {
                Lifecycle::Draining(tasks) => tasks,
                other => {
                    // Другой `wait` уже забрал задачи
                    *lifecycle = other;
                    return Err(DispatchError::NotRunning);
                }
            }
        };
        let mut guard = JoinGuard {
            lifecycle: &self.lifecycle,
            workers,
            collector: Some(collector),
        };

        while let Some(worker) = guard.workers.last_mut() {
            let joined = worker.await;
            guard.workers.pop();
            if let Err(join_err) = joined {
                self.report_join_failure("worker", join_err);
            }
        }

        let joined = match guard.collector.as_mut() {
            Some(collector) => collector.await,
            None => Ok(Vec::new()),
        };
        guard.collector = None;
        drop(guard);

        let results = match joined {
            Ok(results) => results,
            Err(join_err) => {
                self.report_join_failure("collector", join_err);
                Vec::new()
            }
        };

        *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner) = Lifecycle::Stopped;
        tracing::info!(
            results = results.len(),
            errors = self.errors.len(),
            "dispatcher stopped"
        );
        Ok((results, self.errors.clone()))
    }

    async fn wait_drained(&self) {
        loop {
            // Notified создаётся до проверки, чтобы не потерять notify_waiters
            let notified = self.drained.notified();
            if self.counters.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    fn report_join_failure(&self, task: &'static str, join_err: JoinError) {
        tracing::error!(task, error = %join_err, "task failed to join");
        self.errors
            .append(DispatchError::JoinFailed(format!("{task}: {join_err}")));
    }
}


/// Единственный владелец буфера результатов и единственное место, где
/// уменьшается счётчик ожидающих задач.
async fn collect<T>(
    mut results: mpsc::UnboundedReceiver<T>,
    mut failures: mpsc::UnboundedReceiver<SharedError>,
    counters: Arc<Counters>,
    drained: Arc<Notify>,
    errors: Errors,
) -> Vec<T> {
    let mut buffer = Vec::new();

    loop {
        tokio::select! {
            Some(value) = results.recv() => {
                buffer.push(value);
                counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            Some(err) = failures.recv() => {
                errors.append_shared(err);
                counters.failed.fetch_add(1, Ordering::Relaxed);
            }
            else => break,
        }

        match counters
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(1) => drained.notify_waiters(),
            Ok(_) => {}
            Err(_) => {
                tracing::error!("pending counter underflow, outcome without a matching submit");
                errors.append(DispatchError::CounterUnderflow);
            }
        }
    }

    buffer
}
