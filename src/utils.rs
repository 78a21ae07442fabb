use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stderr progress line for rows scanned, redrawn every `interval` rows.
pub struct ProgressCounter {
    label: &'static str,
    interval: u64,
    count: AtomicU64,
    enabled: bool,
}

impl ProgressCounter {
    pub fn new(label: &'static str, interval: u64, enabled: bool) -> Self {
        let counter = Self {
            label,
            interval: interval.max(1),
            count: AtomicU64::new(0),
            enabled,
        };
        counter.print(0);
        counter
    }

    pub fn inc(&self, delta: u64) {
        let prev = self.count.fetch_add(delta, Ordering::SeqCst);
        let current = prev + delta;
        // Print if we crossed an interval boundary
        if prev / self.interval < current / self.interval {
            self.print(current);
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn finish(&self) {
        if self.enabled {
            self.print(self.count());
            eprintln!();
        }
    }

    fn print(&self, current: u64) {
        if !self.enabled {
            return;
        }
        eprint!("\r{}: {}", self.label, current);
        let _ = std::io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_across_increments() {
        let counter = ProgressCounter::new("rows", 10, false);
        counter.inc(4);
        counter.inc(7);
        assert_eq!(counter.count(), 11);
        counter.finish();
    }
}
