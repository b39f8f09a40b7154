//! Recording error reporter for asserting on dispatch failures in tests.

use std::sync::Mutex;

use crate::error::DeviceError;
use crate::report::ErrorReporter;

/// Stores every reported error in order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    errors: Mutex<Vec<DeviceError>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All reported errors, oldest first.
    pub fn errors(&self) -> Vec<DeviceError> {
        self.errors.lock().unwrap().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.lock().unwrap().is_empty()
    }

    /// Number of reported errors matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&DeviceError) -> bool) -> usize {
        self.errors.lock().unwrap().iter().filter(|e| predicate(e)).count()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, error: &DeviceError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}
