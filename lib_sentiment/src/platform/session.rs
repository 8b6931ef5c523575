use std::sync::atomic::{AtomicBool, Ordering};

/// Answers whether the user currently holds valid credentials.
pub trait SessionGate: Send + Sync {
    fn has_valid_credentials(&self) -> bool;
}

/// Atomic flag flipped by the login collaborator.
#[derive(Debug, Default)]
pub struct SessionFlag {
    valid: AtomicBool,
}

impl SessionFlag {
    pub fn new(valid: bool) -> Self {
        Self { valid: AtomicBool::new(valid) }
    }

    pub fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::SeqCst);
    }

    pub fn invalidate(&self) {
        self.set_valid(false);
    }
}

impl SessionGate for SessionFlag {
    fn has_valid_credentials(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }
}
