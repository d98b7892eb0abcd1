//! Slot arithmetic.

/// Start of the first slot strictly after `now_ms`.
pub fn next_slot(now_ms: u64, interval_ms: u64) -> u64 {
    let interval = interval_ms.max(1);
    (now_ms / interval + 1) * interval
}

/// Admission deadline of the slot starting at `slot`: the last two fifths of
/// the interval are left for sealing and propagation.
pub fn end_time(slot: u64, interval_ms: u64) -> u64 {
    slot + interval_ms - 2 * interval_ms / 5
}
