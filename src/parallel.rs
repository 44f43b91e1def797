use super::{
    aggregate::Errors,
    errors::{BoxError, DispatchError},
};
use std::{
    future::Future,
    panic::AssertUnwindSafe,
};
use futures::{
    future::BoxFuture,
    FutureExt,
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;


/// Функция для `parallel`, когда в одном списке замыкания разных типов
pub type ParallelFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// Функция для `cancelable_parallel`, когда в одном списке замыкания разных типов
pub type CancelableFn =
    Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Result<(), BoxError>> + Send>;


/// Запускает все функции параллельно и собирает их ошибки.
///
/// Ждёт завершения каждой функции, сколько бы из них ни упало.
/// Паника внутри функции становится `DispatchError::Panic`.
/// Если future вызова бросили, незавершённые задачи прерываются.
pub async fn parallel<I, F, Fut, E>(fns: I) -> Errors
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    let errors = Errors::new();
    let mut tasks = JoinSet::new();

    for f in fns {
        let errors = errors.clone();
        tasks.spawn(async move {
            if let Err(err) = guarded(async move { f().await }).await {
                errors.append(err);
            }
        });
    }

    join_all(&mut tasks, &errors).await;
    errors
}

/// Как `parallel`, но каждая функция получает токен отмены, производный от `token`.
///
/// Первая ошибка отменяет токен, и остальные функции могут выйти раньше.
/// Отмена кооперативная: функция, которая не смотрит на токен, доработает до конца.
/// Вызов всё равно ждёт возврата каждой функции.
/// Брошенный future вызова отменяет токен и прерывает оставшиеся задачи.
pub async fn cancelable_parallel<I, F, Fut, E>(token: &CancellationToken, fns: I) -> Errors
where
    I: IntoIterator<Item = F>,
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    let errors = Errors::new();
    let cancel = token.child_token();
    let mut tasks = JoinSet::new();
    // Объявлен после `tasks`: при drop токен отменяется раньше, чем JoinSet прерывает задачи
    let _cancel_on_exit = cancel.clone().drop_guard();

    for f in fns {
        let errors = errors.clone();
        let cancel = cancel.clone();
        let peer_token = cancel.clone();
        tasks.spawn(async move {
            if let Err(err) = guarded(async move { f(peer_token).await }).await {
                if !cancel.is_cancelled() {
                    tracing::debug!(error = %err, "first failure, cancelling peers");
                }
                cancel.cancel();
                errors.append(err);
            }
        });
    }

    join_all(&mut tasks, &errors).await;
    errors
}


/// Граница отказа: и ошибка, и паника функции превращаются в `BoxError`
async fn guarded<Fut, E>(fut: Fut) -> Result<(), BoxError>
where
    Fut: Future<Output = Result<(), E>>,
    E: Into<BoxError>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res.map_err(Into::into),
        Err(panic_info) => {
            let err = DispatchError::from_panic(panic_info);
            tracing::warn!(error = %err, "parallel function panicked");
            Err(err.into())
        }
    }
}

async fn join_all(tasks: &mut JoinSet<()>, errors: &Errors) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(join_err) = joined {
            tracing::error!(error = %join_err, "parallel task failed to join");
            errors.append(DispatchError::JoinFailed(join_err.to_string()));
        }
    }
}
