//! Compile-time caps and the handful of knobs worth tuning per process.

/// Maximum number of threads live at once (created but not yet joined
/// and reclaimed).
pub const MAX_THREADS: usize = 1000;

/// Maximum number of live mutex ids.
pub const MAX_MUTEXES: usize = 1000;

/// Maximum number of live condition variable ids.
pub const MAX_CONDVARS: usize = 1000;

/// Minimum and default stack size for a user thread.
pub const MIN_THREAD_STACK: usize = 8 * 1024;
pub const DEFAULT_THREAD_STACK: usize = 64 * 1024;

/// Minimum and default stack size for the scheduler's own context.
pub const MIN_SCHEDULER_STACK: usize = 16 * 1024;
pub const DEFAULT_SCHEDULER_STACK: usize = 64 * 1024;

/// Default preemption interval.
pub const DEFAULT_PREEMPT_INTERVAL_MICROS: u64 = 10_000;

/// Tunable parameters for [`crate::init`]: stack sizes and the
/// preemption tick, so a host process can size those per-process
/// instead of rebuilding the crate with different constants.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    pub thread_stack_size: usize,
    pub scheduler_stack_size: usize,
    pub preempt_interval_micros: u64,
    /// When false, the SIGALRM-driven timer is never armed and threads
    /// only rotate on an explicit `thread_yield` or blocking call.
    /// Tests that need deterministic interleavings set this to false.
    pub preemption_enabled: bool,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        RuntimeConfig {
            thread_stack_size: DEFAULT_THREAD_STACK,
            scheduler_stack_size: DEFAULT_SCHEDULER_STACK,
            preempt_interval_micros: DEFAULT_PREEMPT_INTERVAL_MICROS,
            preemption_enabled: true,
        }
    }

    pub fn thread_stack_size(mut self, size: usize) -> Self {
        self.thread_stack_size = size.max(MIN_THREAD_STACK);
        self
    }

    pub fn scheduler_stack_size(mut self, size: usize) -> Self {
        self.scheduler_stack_size = size.max(MIN_SCHEDULER_STACK);
        self
    }

    pub fn preempt_interval_micros(mut self, micros: u64) -> Self {
        self.preempt_interval_micros = micros;
        self
    }

    pub fn without_preemption(mut self) -> Self {
        self.preemption_enabled = false;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}
