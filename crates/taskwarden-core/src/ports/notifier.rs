//! Notifier port - where every recoverable error is reported.
//!
//! The caller supplies the sink (an error tracker, a pager, a test recorder).
//! Reporting never fails from the caller's point of view.

use std::error::Error;

use tracing::error;

use crate::domain::NotifyContext;

pub trait Notifier: Send + Sync {
    fn notify(&self, error: &(dyn Error + 'static), context: &NotifyContext);
}

/// Drops every report. Errors are still logged by the component that raised them.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _error: &(dyn Error + 'static), _context: &NotifyContext) {}
}

/// Reports through `tracing` at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, err: &(dyn Error + 'static), context: &NotifyContext) {
        error!(error = %err, ?context, "notify");
    }
}
