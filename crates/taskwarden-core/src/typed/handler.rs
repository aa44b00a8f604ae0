//! TaskHandler - one unit of work, as run by the supervisor.

use async_trait::async_trait;

use crate::domain::WorkError;

/// A unit of work that can report whether it is still making progress.
///
/// `execute` is polled by the supervisor alongside its watchdog; the watchdog
/// only runs while `execute` is suspended at an await point. A handler that
/// blocks the thread delays lease renewal and deadline checks until it yields.
///
/// `is_alive` is called on every watchdog tick and must not block. Return
/// `true` only while there is visible forward progress (a child process still
/// running, a counter still advancing). Returning `false` before `execute`
/// finishes makes the supervisor treat the handler as stuck, which is fatal.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn execute(&self) -> Result<(), WorkError>;

    fn is_alive(&self) -> bool;
}
