use super::errors::{BoxError, SharedError};
use std::{
    error::Error,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};


/// Потокобезопасный сборщик ошибок.
///
/// Порядок ошибок совпадает с порядком завершения задач, а не с порядком отправки.
/// Клон указывает на тот же буфер, поэтому `Errors` можно отдавать как handle.
#[derive(Clone, Default)]
pub struct Errors {
    all: Arc<RwLock<Vec<SharedError>>>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn append<E>(&self, err: E)
    where
        E: Into<BoxError>,
    {
        self.append_shared(Arc::from(err.into()));
    }

    /// Добавляет уже разделяемую ошибку, сохраняя её идентичность
    pub fn append_shared(&self, err: SharedError) {
        self.all
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(err);
    }

    /// Снимок всех ошибок на момент вызова
    pub fn all(&self) -> Vec<SharedError> {
        self.all
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.all.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Все ошибки одним значением; `None`, если ошибок не было
    pub fn to_error(&self) -> Option<AggregateError> {
        let errors = self.all();
        if errors.is_empty() {
            return None;
        }
        Some(AggregateError { errors })
    }
}

impl fmt::Debug for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.all().iter()).finish()
    }
}


/// Объединённая ошибка. Каждая исходная ошибка остаётся доступной по идентичности и по типу.
#[derive(Clone)]
pub struct AggregateError {
    errors: Vec<SharedError>,
}

impl AggregateError {
    #[inline]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn Error + Send + Sync + 'static)> {
        self.errors.iter().map(|e| e.as_ref())
    }

    /// Тот же самый экземпляр ошибки (сравнение указателей)
    pub fn contains_identical(&self, target: &SharedError) -> bool {
        self.errors.iter().any(|e| Arc::ptr_eq(e, target))
    }

    /// Есть ли ошибка того же типа, равная `target`
    pub fn contains<E>(&self, target: &E) -> bool
    where
        E: Error + PartialEq + 'static,
    {
        self.find::<E>().any(|e| e == target)
    }

    pub fn find<E>(&self) -> impl Iterator<Item = &E>
    where
        E: Error + 'static,
    {
        self.errors.iter().filter_map(|e| e.downcast_ref::<E>())
    }

    pub fn into_inner(self) -> Vec<SharedError> {
        self.errors
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateError")
            .field("errors", &self.errors)
            .finish()
    }
}

impl Error for AggregateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.errors.first().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}
