//! Error-reporting hook for failures that have no local caller.
//!
//! Inbound requests are answered to the platform, so decode, publish and
//! precondition failures during dispatch are handed to an `ErrorReporter`
//! supplied with the session (after being logged).

use crate::error::DeviceError;

/// Observer for per-message failures.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &DeviceError);
}

impl<F> ErrorReporter for F
where
    F: Fn(&DeviceError) + Send + Sync,
{
    fn report(&self, error: &DeviceError) {
        self(error)
    }
}

/// Default reporter: failures are only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ErrorReporter for NoopReporter {
    fn report(&self, _error: &DeviceError) {}
}
