//! Bounded worker-pool dispatcher поверх tokio
//!
//! # Features
//! - Ограниченная очередь задач с backpressure
//! - Фиксированный пул воркеров и единственный сборщик результатов
//! - Двухфазная остановка без утечки задач
//! - Паника в задаче становится ошибкой этой задачи, пул не теряет воркеров
//! - Потокобезопасный сборщик ошибок с сохранением идентичности
//! - `parallel` / `cancelable_parallel` для разовых параллельных вызовов

pub mod aggregate;
pub mod errors;
pub mod job;
pub mod model;
pub mod parallel;
pub mod pool;
mod worker;

pub use aggregate::{AggregateError, Errors};
pub use errors::{BoxError, DispatchError, JobResult, SharedError};
pub use job::{blocking_job, job_fn, BlockingJob, BoxedJob, FnJob, Job};
pub use model::{DispatcherMetrics, DispatcherState};
pub use parallel::{cancelable_parallel, parallel, CancelableFn, ParallelFn};
pub use pool::{Config, Dispatcher};
