/// Move a selection cursor one item down, wrapping to the first item.
pub fn cycle_next(selected: usize, item_count: usize) -> usize {
    if item_count == 0 {
        0
    } else {
        (selected + 1) % item_count
    }
}

/// Whether enough time has passed since the last accepted press.
pub fn debounce_elapsed(last_ms: Option<u64>, now_ms: u64, min_interval_ms: u64) -> bool {
    match last_ms {
        Some(last) => now_ms.saturating_sub(last) >= min_interval_ms,
        None => true,
    }
}
