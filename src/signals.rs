//! Ctrl+C state shared between the signal handler and the run loop
//!
//! The handler only flips a flag. The run loop checks it before each
//! request and ends the run early, so reports still cover what already ran.

use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// True once Ctrl+C has been pressed
#[inline]
pub fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

#[inline]
pub fn set_interrupted() {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Clear the flag before starting another run in the same process
#[inline]
pub fn reset_interrupted() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}
