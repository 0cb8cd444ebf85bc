//! Call recording and failure injection for the snapshot clients

use crate::clients::{ClientError, ClientResult};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Recorded {
    log: Vec<&'static str>,
    failing: HashSet<&'static str>,
}

/// Shared between clones of a client
#[derive(Clone, Default)]
pub struct CallProbe {
    inner: Arc<Mutex<Recorded>>,
}

impl CallProbe {
    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Log `operation` and fail it if it was marked with [`CallProbe::fail_on`]
    pub fn enter(&self, operation: &'static str) -> ClientResult<()> {
        let mut recorded = self.lock();
        recorded.log.push(operation);
        if recorded.failing.contains(operation) {
            return Err(ClientError::Remote {
                operation,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    pub fn fail_on(&self, operation: &'static str) {
        self.lock().failing.insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.lock().failing.remove(operation);
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.lock().log.iter().filter(|op| **op == operation).count()
    }

    /// Every operation in call order
    pub fn call_log(&self) -> Vec<&'static str> {
        self.lock().log.clone()
    }

    pub fn reset(&self) {
        self.lock().log.clear();
    }
}
