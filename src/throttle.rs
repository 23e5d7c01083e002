use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Expired entries are swept once the map grows past this.
const PRUNE_THRESHOLD: usize = 256;

/// Cooldown map keyed by normalized plate text. Bounds how often the
/// same plate can be turned into a violation.
#[derive(Debug)]
pub struct PlateThrottle {
    window: Duration,
    seen: HashMap<String, Instant>,
}

impl PlateThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
        }
    }

    /// True when the plate may be processed now. An accepted plate
    /// starts its cooldown; a rejected read does not refresh it.
    pub fn admit(&mut self, plate: &str, now: Instant) -> bool {
        if let Some(&last) = self.seen.get(plate) {
            if now.duration_since(last) < self.window {
                return false;
            }
        }
        if self.seen.len() >= PRUNE_THRESHOLD {
            self.prune(now);
        }
        self.seen.insert(plate.to_string(), now);
        true
    }

    fn prune(&mut self, now: Instant) {
        let window = self.window;
        self.seen
            .retain(|_, last| now.duration_since(*last) < window);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_within_window_is_rejected() {
        let mut throttle = PlateThrottle::new(Duration::from_secs(30));
        let t0 = Instant::now();
        assert!(throttle.admit("51B1-2345", t0));
        assert!(!throttle.admit("51B1-2345", t0 + Duration::from_secs(10)));
        assert!(throttle.admit("51B1-2345", t0 + Duration::from_secs(31)));
    }

    #[test]
    fn rejection_does_not_refresh_the_cooldown() {
        let mut throttle = PlateThrottle::new(Duration::from_secs(30));
        let t0 = Instant::now();
        assert!(throttle.admit("36F-8888", t0));
        // Seen again mid-window: rejected, but the clock still runs
        // from the first acceptance.
        assert!(!throttle.admit("36F-8888", t0 + Duration::from_secs(20)));
        assert!(throttle.admit("36F-8888", t0 + Duration::from_secs(31)));
    }

    #[test]
    fn distinct_plates_do_not_interfere() {
        let mut throttle = PlateThrottle::new(Duration::from_secs(30));
        let t0 = Instant::now();
        assert!(throttle.admit("51B1-2345", t0));
        assert!(throttle.admit("29H1-2345", t0));
        assert!(!throttle.admit("51B1-2345", t0 + Duration::from_secs(1)));
    }

    #[test]
    fn boundary_is_exclusive_inside_the_window() {
        let mut throttle = PlateThrottle::new(Duration::from_secs(30));
        let t0 = Instant::now();
        assert!(throttle.admit("ABC 1234", t0));
        // Exactly on the boundary counts as expired.
        assert!(throttle.admit("ABC 1234", t0 + Duration::from_secs(30)));
    }

    #[test]
    fn expired_entries_are_pruned_past_the_threshold() {
        let mut throttle = PlateThrottle::new(Duration::from_secs(30));
        let t0 = Instant::now();
        for i in 0..PRUNE_THRESHOLD {
            assert!(throttle.admit(&format!("00A-{:05}", i), t0));
        }
        assert_eq!(throttle.len(), PRUNE_THRESHOLD);

        // All previous entries are stale by now, so the next admit
        // sweeps them out.
        assert!(throttle.admit("99Z-00001", t0 + Duration::from_secs(60)));
        assert_eq!(throttle.len(), 1);
    }
}
