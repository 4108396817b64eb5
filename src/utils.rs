use std::io::Write;

use std::sync::atomic::{AtomicU64, Ordering};

/// Running count on stderr, redrawn each time `interval` is crossed.
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
        if !self.enabled {
            return;
        }
        self.print(self.count());
        eprintln!();
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
    fn counts_across_intervals() {
        let progress = ProgressCounter::new("test", 10, false);
        progress.inc(7);
        progress.inc(7);
        progress.finish();
        assert_eq!(progress.count(), 14);
    }
}
