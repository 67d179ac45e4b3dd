//! Index normalization shared by the list operations.

/// Resolve an inclusive `[start, stop]` pair against a list of `len` elements.
///
/// Negative indices count from the end (-1 is the last element) and both ends
/// are clamped into the list. Returns `None` when the resulting range is empty.
pub fn normalize(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }

    let len = len as i64;
    let mut start = if start < 0 { len + start } else { start };
    let mut stop = if stop < 0 { len + stop } else { stop };

    if start < 0 {
        start = 0;
    }
    if stop >= len {
        stop = len - 1;
    }

    if stop < 0 || start >= len || start > stop {
        return None;
    }

    Some((start as usize, stop as usize))
}

/// Check a single index for a write.
///
/// Writes take no negative-from-end form; the index must lie in `[0, len)`.
pub fn resolve_index(len: usize, index: i64) -> Option<usize> {
    if index < 0 || index >= len as i64 {
        return None;
    }

    Some(index as usize)
}
