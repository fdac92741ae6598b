// Scheduled sweeps, invoked on fixed cadences by an external cron-like
// trigger. Each run is stateless apart from what it reads from and writes
// to the document store; overlapping runs are safe because every status
// write is guarded by the state machine's conditional update.

pub mod escalation;
pub mod retry;

pub use escalation::{EscalationScheduler, EscalationSweepOutcome};
pub use retry::{next_retry_time, RetryScheduler, RetrySweepOutcome};
