//! Signal energy estimation over a fixed sliding window.
//!
//! The window is allocated at full size up front and starts zero-filled, so
//! the first variance sample already averages over `capacity` slots. The
//! playing threshold is calibrated against exactly this behaviour.

/// Fixed-capacity ring of the most recent samples with an incrementally
/// maintained running sum.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: Box<[i16]>,
    cursor: usize,
    sum: i64,
}

impl SampleWindow {
    /// Allocate a zero-filled window holding `capacity` samples.
    ///
    /// A zero capacity is bumped to one so the window always has a slot.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0i16; capacity.max(1)].into_boxed_slice(),
            cursor: 0,
            sum: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Sum of every slot currently held in the window.
    #[cfg(test)]
    pub fn running_sum(&self) -> i64 {
        self.sum
    }

    /// Overwrite the oldest slot with `sample`.
    pub fn push(&mut self, sample: i16) {
        let evicted = std::mem::replace(&mut self.samples[self.cursor], sample);
        self.sum += i64::from(sample) - i64::from(evicted);
        self.cursor += 1;
        if self.cursor == self.samples.len() {
            self.cursor = 0;
        }
    }

    /// True right after the write cursor wraps, i.e. once per `capacity` pushes.
    pub fn is_ready(&self) -> bool {
        self.cursor == 0
    }

    /// Squared absolute deviation from the window mean, averaged over all slots.
    pub fn variance(&self) -> f64 {
        let n = self.samples.len() as f64;
        let mean = self.sum as f64 / n;
        let total: f64 = self
            .samples
            .iter()
            .map(|&s| (mean - f64::from(s)).abs().powi(2))
            .sum();
        total / n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_window_has_zero_variance() {
        let mut w = SampleWindow::new(64);
        for _ in 0..64 {
            w.push(1234);
        }
        assert!(w.is_ready());
        assert_eq!(w.variance(), 0.0);

        for _ in 0..64 {
            w.push(-32768);
        }
        assert_eq!(w.variance(), 0.0);
    }

    #[test]
    fn test_running_sum_tracks_last_samples() {
        let capacity = 16;
        let mut w = SampleWindow::new(capacity);
        let mut history = Vec::new();
        let mut x: i32 = 7;
        for i in 0..200 {
            // Cheap deterministic pseudo-random walk across the i16 range.
            x = (x * 1103 + 12345 + i) % 65536;
            let sample = (x - 32768) as i16;
            w.push(sample);
            history.push(sample);

            let start = history.len().saturating_sub(capacity);
            let expected: i64 = history[start..].iter().map(|&s| i64::from(s)).sum();
            assert_eq!(w.running_sum(), expected, "after {} pushes", history.len());
        }
    }

    #[test]
    fn test_ready_once_per_capacity() {
        let mut w = SampleWindow::new(10);
        let mut ready = 0;
        for i in 1..=35 {
            w.push(1);
            if w.is_ready() {
                ready += 1;
                assert_eq!(i % 10, 0);
            }
        }
        assert_eq!(ready, 3);
    }

    #[test]
    fn test_partial_fill_counts_zero_slots() {
        let mut w = SampleWindow::new(4);
        w.push(4);
        w.push(4);
        // mean = 8 / 4 = 2, deviations are 2, 2, 2, 2
        assert_eq!(w.variance(), 4.0);
    }

    #[test]
    fn test_square_wave_variance() {
        let mut w = SampleWindow::new(100);
        assert_eq!(w.capacity(), 100);
        for i in 0..100 {
            w.push(if i % 2 == 0 { 71 } else { -71 });
        }
        assert!(w.is_ready());
        assert_eq!(w.variance(), 5041.0);
    }
}
