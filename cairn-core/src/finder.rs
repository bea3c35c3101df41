//! Finder helpers
//!
//! Finders wrap a describe/get call. They return the object, or a
//! [`ProviderError`] of kind `NotFound` when it does not exist, so callers can
//! tell "gone" apart from a failed call.

use crate::provider::{ProviderError, ProviderResult};

/// The single element of a describe/list result
pub fn assert_single_value<T>(items: Vec<T>) -> ProviderResult<T> {
    let count = items.len();
    let mut items = items.into_iter();
    match (items.next(), count) {
        (Some(item), 1) => Ok(item),
        (None, _) => Err(ProviderError::not_found("empty result")),
        _ => Err(ProviderError::new(format!(
            "too many results: wanted 1, got {}",
            count
        ))),
    }
}

/// Turn the NotFound sentinel into `Ok(None)`, leaving other errors alone
pub fn not_found_to_none<T>(result: ProviderResult<T>) -> ProviderResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
