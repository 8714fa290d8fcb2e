//! Thread-local quiet flag
//!
//! While a thread is quiet, the console layer installed by
//! [`crate::logging::init`] only lets ERROR events through for it. The
//! flag is per thread, so the executor captures the caller's value and sets
//! it at the top of every worker.

use std::cell::Cell;

thread_local! {
    static QUIET: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is quiet
pub fn is_quiet() -> bool {
    QUIET.with(Cell::get)
}

/// Set the current thread's quiet flag
pub fn set_quiet(quiet: bool) {
    QUIET.with(|flag| flag.set(quiet));
}

/// Value to hand to a worker thread
pub fn inherit_quiet_state() -> bool {
    is_quiet()
}

/// Make the current thread quiet until the guard is dropped
///
/// Guards nest; dropping one restores whatever was set before it.
///
/// # Example
///
/// ```rust
/// use fanout::quiet::{is_quiet, quiet_mode};
///
/// assert!(!is_quiet());
/// {
///     let _quiet = quiet_mode();
///     assert!(is_quiet());
/// }
/// assert!(!is_quiet());
/// ```
pub fn quiet_mode() -> QuietGuard {
    let previous = is_quiet();
    set_quiet(true);
    QuietGuard { previous }
}

/// Restores the previous quiet flag on drop
#[must_use = "the quiet flag is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct QuietGuard {
    previous: bool,
}

impl Drop for QuietGuard {
    fn drop(&mut self) {
        set_quiet(self.previous);
    }
}
