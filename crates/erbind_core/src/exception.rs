//! The last-exception side channel.

use crate::error::BindError;
use erbind_native::ReturnCode;
use parking_lot::Mutex;

/// Per-session slot holding the most recent failure.
///
/// Every failing operation records its error here before returning it, and
/// every operation clears it when it starts. Reading the slot never fails.
///
/// Concurrent failing calls race on the slot; the last writer wins.
#[derive(Debug, Default)]
pub struct LastException {
    slot: Mutex<Recorded>,
}

#[derive(Debug, Default, Clone)]
struct Recorded {
    code: ReturnCode,
    message: String,
}

impl LastException {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a failure, replacing any previous one.
    pub fn record(&self, err: &BindError) {
        let mut slot = self.slot.lock();
        slot.code = err.code;
        slot.message.clone_from(&err.message);
    }

    /// Returns the last failure message, empty if none.
    pub fn message(&self) -> String {
        self.slot.lock().message.clone()
    }

    /// Returns the last failure code, zero if none.
    pub fn code(&self) -> ReturnCode {
        self.slot.lock().code
    }

    /// Resets the slot to empty.
    pub fn clear(&self) {
        let mut slot = self.slot.lock();
        slot.code = 0;
        slot.message.clear();
    }
}
