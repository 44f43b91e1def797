use std::{
    error::Error as StdError,
    sync::Arc,
};
use thiserror::Error;


/// Ошибка, которую возвращает задача
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Ошибка в агрегаторе: один и тот же экземпляр можно отдавать многим читателям
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

pub type JobResult<T> = Result<T, BoxError>;


#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DispatchError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("job panicked: {0}")]
    Panic(String),
    #[error("dispatcher is not accepting jobs")]
    Closed,
    #[error("dispatcher is already running")]
    AlreadyStarted,
    #[error("dispatcher is not running")]
    NotRunning,
    #[error("no tokio runtime in context")]
    NoRuntime,
    #[error("task failed to join: {0}")]
    JoinFailed(String),
    #[error("pending counter decremented below zero")]
    CounterUnderflow,
}

impl DispatchError {
    pub const NO_WORKERS: Self = Self::InvalidConfiguration("at least one worker required");
    pub const ZERO_QUEUE: Self = Self::InvalidConfiguration("queue capacity must be positive");

    /// Превращает payload паники в читаемое сообщение
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panic(message)
    }

    #[inline]
    pub(crate) fn shared(self) -> SharedError {
        Arc::new(self)
    }
}
