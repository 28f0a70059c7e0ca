//! Item dengan timestamp untuk fan-in realtime -> UI
//!
//! Urutan dan kesetaraan hanya berdasarkan `time`. Registry tidak pernah
//! melihat payload, hanya membandingkan timestamp.

use std::cmp::Ordering;

/// Item ber-timestamp (frame, tick, atau nanoseconds)
#[derive(Debug, Clone, Copy)]
pub struct Stamped<T> {
    pub time: u64,
    pub payload: T,
}

impl<T> Stamped<T> {
    #[inline(always)]
    pub const fn new(time: u64, payload: T) -> Self {
        Self { time, payload }
    }

    #[inline]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    #[inline]
    pub fn into_parts(self) -> (u64, T) {
        (self.time, self.payload)
    }
}

impl<T> PartialEq for Stamped<T> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time
    }
}

impl<T> Eq for Stamped<T> {}

impl<T> PartialOrd for Stamped<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Stamped<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orders_by_time_only() {
        let a = Stamped::new(5, "note-on");
        let b = Stamped::new(5, "note-off");
        let c = Stamped::new(7, "cc");

        assert_eq!(a, b);
        assert!(a < c);
        assert_eq!(c.into_parts(), (7, "cc"));
        assert_eq!(*a.payload(), "note-on");
    }
}
