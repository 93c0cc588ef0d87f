use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for queue and lifecycle traffic
#[derive(Debug, Default)]
pub struct LiveMetrics {
    tasks_pushed: AtomicU64,
    tasks_delivered: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_abandoned: AtomicU64,
    tasks_reclaimed: AtomicU64,
    loop_errors: AtomicU64,
}

impl LiveMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_tasks_pushed(&self) {
        self.tasks_pushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tasks_delivered(&self) {
        self.tasks_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tasks_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tasks_abandoned(&self) {
        self.tasks_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    /// Items returned to the main keyspace by a single drain
    pub fn add_tasks_reclaimed(&self, count: usize) {
        self.tasks_reclaimed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn increment_loop_errors(&self) {
        self.loop_errors.fetch_add(1, Ordering::Relaxed);
    }

    // Getters
    pub fn tasks_pushed(&self) -> u64 {
        self.tasks_pushed.load(Ordering::Relaxed)
    }

    pub fn tasks_delivered(&self) -> u64 {
        self.tasks_delivered.load(Ordering::Relaxed)
    }

    pub fn tasks_completed(&self) -> u64 {
        self.tasks_completed.load(Ordering::Relaxed)
    }

    pub fn tasks_abandoned(&self) -> u64 {
        self.tasks_abandoned.load(Ordering::Relaxed)
    }

    pub fn tasks_reclaimed(&self) -> u64 {
        self.tasks_reclaimed.load(Ordering::Relaxed)
    }

    pub fn loop_errors(&self) -> u64 {
        self.loop_errors.load(Ordering::Relaxed)
    }
}
