use std::io;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitRequest {
    Shutdown,
    Restart,
}

/// Relaunches the current program. Only returns if relaunching failed.
pub trait ProcessRestarter: Send + Sync {
    fn restart_in_place(&self) -> io::Error;
}

/// Carries an exit request from a command handler to the code driving the client.
///
/// The first request wins; later ones are ignored so a `shutdown` racing a
/// `restart` resolves deterministically.
#[derive(Debug, Clone, Default)]
pub struct ExitSignal {
    slot: Arc<Mutex<Option<ExitRequest>>>,
}

impl ExitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, request: ExitRequest) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(request);
        true
    }

    pub fn requested(&self) -> Option<ExitRequest> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
