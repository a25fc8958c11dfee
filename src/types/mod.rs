//! Command semantics per value type
//!
//! Each submodule is a set of free functions over a [`Keyspace`]; callers
//! hold the keyspace lock for the duration of one call, which is what makes
//! every function here atomic.
//!
//! [`Keyspace`]: crate::store::Keyspace

pub mod hash;
pub mod list;
pub mod set;
pub mod string;

use std::ops::RangeInclusive;

/// Resolve an inclusive `[start, stop]` window over `len` elements.
///
/// Negative indices count from the end. The window is clamped to the valid
/// range; `None` means it selects nothing.
pub(crate) fn clamp_range(len: usize, start: i64, stop: i64) -> Option<RangeInclusive<usize>> {
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start >= len || stop < 0 || start > stop {
        return None;
    }
    Some(start as usize..=stop as usize)
}

/// Resolve a single, possibly negative, index over `len` elements
pub(crate) fn resolve_index(len: usize, index: i64) -> Option<usize> {
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let index = if index < 0 { len + index } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_range() {
        assert_eq!(clamp_range(5, 0, -1), Some(0..=4));
        assert_eq!(clamp_range(5, 1, 2), Some(1..=2));
        assert_eq!(clamp_range(5, -3, -2), Some(2..=3));
        assert_eq!(clamp_range(5, -100, 100), Some(0..=4));
        assert_eq!(clamp_range(5, 3, 1), None);
        assert_eq!(clamp_range(5, 5, 10), None);
        assert_eq!(clamp_range(5, 0, -6), None);
        assert_eq!(clamp_range(0, 0, -1), None);
    }

    #[test]
    fn test_resolve_index() {
        assert_eq!(resolve_index(3, 0), Some(0));
        assert_eq!(resolve_index(3, -1), Some(2));
        assert_eq!(resolve_index(3, 3), None);
        assert_eq!(resolve_index(3, -4), None);
        assert_eq!(resolve_index(0, 0), None);
    }
}
