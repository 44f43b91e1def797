use super::errors::{
    BoxError,
    DispatchError,
    JobResult,
};
use std::{
    future::Future,
    marker::PhantomData,
};
use futures::future::{BoxFuture, FutureExt};


/// Единица работы для диспетчера.
///
/// Задача выполняется не более одного раза и ничего не знает о том,
/// какой воркер её взял и в каком порядке относительно других задач.
pub trait Job: Send + 'static {
    type Output: Send + 'static;

    fn execute(self: Box<Self>) -> BoxFuture<'static, JobResult<Self::Output>>;
}

pub type BoxedJob<T> = Box<dyn Job<Output = T>>;

impl<T: Send + 'static> Job for BoxedJob<T> {
    type Output = T;

    #[inline]
    fn execute(self: Box<Self>) -> BoxFuture<'static, JobResult<T>> {
        <dyn Job<Output = T> as Job>::execute(*self)
    }
}


/// Задача из async-замыкания
pub struct FnJob<F, T> {
    f: F,
    _output: PhantomData<fn() -> T>,
}

pub fn job_fn<F, Fut, T, E>(f: F) -> FnJob<F, T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError> + 'static,
{
    FnJob {
        f,
        _output: PhantomData,
    }
}

impl<F, Fut, T, E> Job for FnJob<F, T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError> + 'static,
{
    type Output = T;

    fn execute(self: Box<Self>) -> BoxFuture<'static, JobResult<T>> {
        let this = *self;
        let fut = (this.f)();
        async move { fut.await.map_err(Into::into) }.boxed()
    }
}


/// Синхронная (CPU-bound или блокирующая) задача, выполняется через `spawn_blocking`
pub struct BlockingJob<F, T> {
    f: F,
    _output: PhantomData<fn() -> T>,
}

pub fn blocking_job<F, T, E>(f: F) -> BlockingJob<F, T>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    BlockingJob {
        f,
        _output: PhantomData,
    }
}

impl<F, T, E> Job for BlockingJob<F, T>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    type Output = T;

    fn execute(self: Box<Self>) -> BoxFuture<'static, JobResult<T>> {
        let f = self.f;
        async move {
            let val = tokio::task::spawn_blocking(move || {
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(f))
            })
            .await;

            match val {
                Ok(Ok(res)) => res.map_err(Into::into),
                Ok(Err(panic_info)) => Err(DispatchError::from_panic(panic_info).into()),
                Err(join_err) => Err(DispatchError::JoinFailed(join_err.to_string()).into()),
            }
        }
        .boxed()
    }
}
