use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationStats {
    pub average_frame_time: f64,
    pub jitter: f64,
    pub min_frame_time: f64,
    pub max_frame_time: f64,
    pub effective_fps: f64,
    pub samples: usize,
}

/// Rolling record of intervals between consecutive presented frames.
///
/// All values are seconds.
#[derive(Debug, Clone)]
pub struct FrameIntervalMonitor {
    last_timestamp: Option<f64>,
    intervals: VecDeque<f64>,
    max_samples: usize,
}

impl FrameIntervalMonitor {
    pub fn new(max_samples: usize) -> Self {
        Self {
            last_timestamp: None,
            intervals: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
        }
    }

    /// Feeds one realized present timestamp.
    pub fn record_present(&mut self, timestamp: f64) {
        if let Some(last) = self.last_timestamp {
            self.record_interval(timestamp - last);
        }
        self.last_timestamp = Some(timestamp);
    }

    pub fn record_interval(&mut self, interval: f64) {
        if self.intervals.len() >= self.max_samples {
            self.intervals.pop_front();
        }
        self.intervals.push_back(interval);
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn reset(&mut self) {
        self.last_timestamp = None;
        self.intervals.clear();
    }

    pub fn calibration_stats(&self) -> CalibrationStats {
        if self.intervals.is_empty() {
            return CalibrationStats {
                average_frame_time: 0.0,
                jitter: 0.0,
                min_frame_time: 0.0,
                max_frame_time: 0.0,
                effective_fps: 0.0,
                samples: 0,
            };
        }
        let n = self.intervals.len() as f64;
        let avg = self.intervals.iter().sum::<f64>() / n;
        let var = self.intervals.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / n;
        let min = self.intervals.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self
            .intervals
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        CalibrationStats {
            average_frame_time: avg,
            jitter: var.sqrt(),
            min_frame_time: min,
            max_frame_time: max,
            effective_fps: if avg > 0.0 { 1.0 / avg } else { 0.0 },
            samples: self.intervals.len(),
        }
    }
}

impl Default for FrameIntervalMonitor {
    fn default() -> Self {
        Self::new(1000)
    }
}
