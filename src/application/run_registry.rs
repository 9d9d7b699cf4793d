//! Single-flight guard for pagination runs.
//!
//! One run per target may be in flight. A second request for the same target
//! is rejected; runs for different targets proceed independently.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::domain::{AppError, Result};

/// What a pagination run works on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RunTarget {
    Contacts,
    Conversation(String),
}

impl fmt::Display for RunTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contacts => write!(f, "contacts"),
            Self::Conversation(identity) => write!(f, "conversation with {identity}"),
        }
    }
}

/// Registry of in-flight runs.
#[derive(Debug, Clone, Default)]
pub struct RunRegistry {
    active: Arc<Mutex<HashSet<RunTarget>>>,
}

impl RunRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `target`, returning a guard that releases it on drop.
    ///
    /// # Errors
    /// Returns `RunInProgress` if the target is already claimed.
    pub fn try_acquire(&self, target: RunTarget) -> Result<RunGuard> {
        let mut active = self.active.lock().map_err(|_| AppError::InvalidData {
            message: "run registry lock poisoned".into(),
        })?;

        if !active.insert(target.clone()) {
            return Err(AppError::RunInProgress {
                target: target.to_string(),
            });
        }

        tracing::debug!(run = %target, "Run started");
        Ok(RunGuard {
            active: Arc::clone(&self.active),
            target,
        })
    }
}

/// Releases its target when dropped.
#[derive(Debug)]
pub struct RunGuard {
    active: Arc<Mutex<HashSet<RunTarget>>>,
    target: RunTarget,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(&self.target);
        }
        tracing::debug!(run = %self.target, "Run finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_target_rejected() {
        let registry = RunRegistry::new();
        let _guard = registry.try_acquire(RunTarget::Contacts).unwrap();

        let err = registry.try_acquire(RunTarget::Contacts).unwrap_err();
        assert!(matches!(err, AppError::RunInProgress { ref target } if target == "contacts"));
    }

    #[test]
    fn test_different_targets_allowed() {
        let registry = RunRegistry::new();
        let _a = registry
            .try_acquire(RunTarget::Conversation("alice".into()))
            .unwrap();
        let _b = registry
            .try_acquire(RunTarget::Conversation("bob".into()))
            .unwrap();
        let _c = registry.try_acquire(RunTarget::Contacts).unwrap();
    }

    #[test]
    fn test_drop_releases_target() {
        let registry = RunRegistry::new();
        let target = RunTarget::Conversation("alice".into());

        {
            let _guard = registry.try_acquire(target.clone()).unwrap();
            assert!(registry.try_acquire(target.clone()).is_err());
        }

        registry.try_acquire(target).unwrap();
    }
}
