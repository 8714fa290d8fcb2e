//! Error chain utilities
//!
//! Helpers for walking `source()` chains, used by classification and by the
//! diagnostics kept on failed tasks.

use std::error::Error as StdError;

/// Format an error chain as a multi-line string
///
/// Walks the error chain via `source()` and formats each error
/// on a separate line with indentation.
///
/// # Example
///
/// ```rust
/// use fanout::error::format_error_chain;
///
/// let err = anyhow::Error::new(std::io::Error::other("connection reset"))
///     .context("ListBuckets failed");
/// let text = format_error_chain(err.as_ref());
/// assert_eq!(text, "Error: ListBuckets failed\n  Caused by: connection reset");
/// ```
pub fn format_error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut result = format!("Error: {}", error);
    let mut current = error.source();
    let mut level = 1;

    while let Some(source) = current {
        result.push_str(&format!("\n{:indent$}Caused by: {}", "", source, indent = level * 2));
        current = source.source();
        level += 1;
    }

    result
}

/// Get the root cause of an error chain
pub fn root_cause<'a>(error: &'a (dyn StdError + 'static)) -> &'a (dyn StdError + 'static) {
    let mut current = error;
    while let Some(source) = current.source() {
        current = source;
    }
    current
}

/// Count the number of errors in an error chain (minimum 1)
pub fn error_chain_length(error: &(dyn StdError + 'static)) -> usize {
    let mut count = 1;
    let mut current = error.source();

    while let Some(source) = current {
        count += 1;
        current = source.source();
    }

    count
}

/// Find the first error of type `E` in the chain, outermost first
pub fn find_in_chain<'a, E>(error: &'a (dyn StdError + 'static)) -> Option<&'a E>
where
    E: StdError + 'static,
{
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(found) = err.downcast_ref::<E>() {
            return Some(found);
        }
        current = err.source();
    }
    None
}
