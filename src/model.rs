#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Created,
    Running,
    Draining,
    Stopped,
}


#[derive(Debug, Clone)]
pub struct DispatcherMetrics {
    pub workers: usize,
    pub pending: usize,
    pub queued: usize,
    pub queue_capacity: usize,
    pub submitted: usize,
    pub completed: usize,
    pub failed: usize,
}

impl DispatcherMetrics {
    /// Доля занятых слотов очереди, от 0.0 до 1.0
    pub fn queue_pressure(&self) -> f64 {
        match self.queue_capacity {
            0 => 0.0,
            capacity => self.queued.min(capacity) as f64 / capacity as f64,
        }
    }

    /// Доля успешных среди завершённых задач; пока ничего не завершилось, 1.0
    pub fn success_rate(&self) -> f64 {
        match self.finished() {
            0 => 1.0,
            finished => self.completed as f64 / finished as f64,
        }
    }

    /// Сколько задач уже дали результат или ошибку
    pub fn finished(&self) -> usize {
        self.completed + self.failed
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(completed: usize, failed: usize) -> DispatcherMetrics {
        DispatcherMetrics {
            workers: 2,
            pending: 0,
            queued: 0,
            queue_capacity: 8,
            submitted: completed + failed,
            completed,
            failed,
        }
    }

    #[test]
    fn success_rate_without_jobs_is_full() {
        assert_eq!(metrics(0, 0).success_rate(), 1.0);
    }

    #[test]
    fn success_rate_counts_failures() {
        let m = metrics(3, 1);
        assert_eq!(m.success_rate(), 0.75);
        assert_eq!(m.finished(), 4);
    }

    #[test]
    fn queue_pressure_is_share_of_capacity() {
        let mut m = metrics(0, 0);
        assert_eq!(m.queue_pressure(), 0.0);

        m.queued = 2;
        assert_eq!(m.queue_pressure(), 0.25);

        m.queued = 8;
        assert_eq!(m.queue_pressure(), 1.0);

        m.queue_capacity = 0;
        assert_eq!(m.queue_pressure(), 0.0);
    }
}
