//! Process-wide modification times used to invalidate derived caches.

use atomic_counter::{AtomicCounter, RelaxedCounter};
use lazy_static::lazy_static;

lazy_static! {
    static ref MODIFICATION_COUNTER: RelaxedCounter = RelaxedCounter::new(1);
}

/// Modification time reported for something that has never existed,
/// such as a missing ghost array.
pub const NEVER_MODIFIED: u64 = 0;

/// Returns a new modification time, larger than every time returned before.
pub fn next_modification_time() -> u64 {
    MODIFICATION_COUNTER.inc() as u64
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn modification_times_increase() {
        let first = next_modification_time();
        let second = next_modification_time();
        assert!(first > NEVER_MODIFIED);
        assert!(second > first);
    }
}
