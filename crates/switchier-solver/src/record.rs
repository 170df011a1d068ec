//! The waveform record: append-only sampled signals with interpolation
//! and size-bounded decimation.

use std::collections::HashMap;

/// Ordered per-signal series of a transient run.
///
/// Signals are named `V(node)` and `I(element)`. Times are strictly
/// increasing. Once the record exceeds `max_samples`, every other retained
/// sample is dropped and the keep-stride doubles, so the record stays
/// bounded for arbitrarily long runs.
#[derive(Debug, Clone)]
pub struct WaveformRecord {
    signals: Vec<String>,
    index: HashMap<String, usize>,
    times: Vec<f64>,
    data: Vec<Vec<f64>>,
    max_samples: usize,
    keep_stride: usize,
    raw_count: usize,
}

impl WaveformRecord {
    pub fn new(signals: Vec<String>, max_samples: usize) -> Self {
        let index = signals
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        Self {
            signals,
            index,
            times: Vec::new(),
            data: Vec::new(),
            max_samples: max_samples.max(2),
            keep_stride: 1,
            raw_count: 0,
        }
    }

    /// Append a sample. Must be called with strictly increasing times.
    pub fn push(&mut self, t: f64, row: Vec<f64>) {
        debug_assert_eq!(row.len(), self.signals.len());
        let keep = self.raw_count % self.keep_stride == 0;
        self.raw_count += 1;
        if !keep {
            return;
        }
        self.times.push(t);
        self.data.push(row);
        if self.times.len() > self.max_samples {
            self.decimate();
        }
    }

    /// Drop every other retained sample and double the stride.
    fn decimate(&mut self) {
        let mut i = 0;
        self.times.retain(|_| {
            let keep = i % 2 == 0;
            i += 1;
            keep
        });
        let mut i = 0;
        self.data.retain(|_| {
            let keep = i % 2 == 0;
            i += 1;
            keep
        });
        self.keep_stride *= 2;
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn signals(&self) -> &[String] {
        &self.signals
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.data
    }

    /// Series for one signal as (t, value) pairs.
    pub fn series(&self, signal: &str) -> Option<Vec<(f64, f64)>> {
        let col = *self.index.get(signal)?;
        Some(
            self.times
                .iter()
                .zip(self.data.iter())
                .map(|(&t, row)| (t, row[col]))
                .collect(),
        )
    }

    /// Linearly interpolated full row at time `t`, clamped to the record
    /// span.
    pub fn interpolate_at(&self, t: f64) -> Option<Vec<f64>> {
        if self.times.is_empty() {
            return None;
        }
        if t <= self.times[0] {
            return Some(self.data[0].clone());
        }
        let last = self.times.len() - 1;
        if t >= self.times[last] {
            return Some(self.data[last].clone());
        }
        // Binary search for the bracketing interval.
        let i = match self.times.binary_search_by(|probe| probe.total_cmp(&t)) {
            Ok(exact) => return Some(self.data[exact].clone()),
            Err(next) => next - 1,
        };
        let (t0, t1) = (self.times[i], self.times[i + 1]);
        let alpha = (t - t0) / (t1 - t0);
        Some(
            self.data[i]
                .iter()
                .zip(self.data[i + 1].iter())
                .map(|(a, b)| a * (1.0 - alpha) + b * alpha)
                .collect(),
        )
    }

    /// Linearly interpolated value of one signal at time `t`.
    pub fn value_at(&self, signal: &str, t: f64) -> Option<f64> {
        let col = *self.index.get(signal)?;
        self.interpolate_at(t).map(|row| row[col])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(times: &[f64], values: &[f64]) -> WaveformRecord {
        let mut r = WaveformRecord::new(vec!["V(a)".to_string()], 1_000_000);
        for (&t, &v) in times.iter().zip(values.iter()) {
            r.push(t, vec![v]);
        }
        r
    }

    #[test]
    fn test_interpolation() {
        let r = record_with(&[0.0, 1.0, 2.0], &[0.0, 2.0, 4.0]);
        assert_eq!(r.value_at("V(a)", 0.5), Some(1.0));
        assert_eq!(r.value_at("V(a)", 1.5), Some(3.0));
        assert_eq!(r.value_at("V(a)", 1.0), Some(2.0));
        // Clamped outside the span
        assert_eq!(r.value_at("V(a)", -1.0), Some(0.0));
        assert_eq!(r.value_at("V(a)", 5.0), Some(4.0));
        assert_eq!(r.value_at("V(b)", 0.5), None);
    }

    #[test]
    fn test_decimation_bounds_length_and_doubles_stride() {
        let mut r = WaveformRecord::new(vec!["V(a)".to_string()], 4);
        for k in 0..32 {
            r.push(k as f64, vec![k as f64]);
        }
        assert!(r.len() <= 4, "record grew to {}", r.len());
        // Early samples are thinned but the first is always retained.
        assert_eq!(r.times()[0], 0.0);
        // Times stay strictly increasing.
        for w in r.times().windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn test_series_extraction() {
        let r = record_with(&[0.0, 1.0], &[3.0, 5.0]);
        let s = r.series("V(a)").unwrap();
        assert_eq!(s, vec![(0.0, 3.0), (1.0, 5.0)]);
    }
}
