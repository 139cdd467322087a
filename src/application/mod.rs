//! Application layer: the supervising control loop.

pub mod convergence_tracker;
pub mod process_supervisor;
pub mod progress_poller;
pub mod sync_driver;
pub mod sync_watcher;

pub use convergence_tracker::{
    Convergence, ConvergencePolicy, ConvergenceTracker, Observation, TrackerState,
};
pub use process_supervisor::{LaunchSpec, ProcessHandle, ProcessSupervisor, TerminationOutcome};
pub use progress_poller::{Exhaustion, PollEvent, ProgressPoller, RetryPolicy};
pub use sync_driver::SyncTestRunner;
pub use sync_watcher::{Cadence, Companion, SyncWatcher};
