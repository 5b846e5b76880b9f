//! Windowed RMS input level so the host can render a live recording meter.

use std::sync::{Arc, Mutex};

/// Floor reported for silent or not-yet-measured input.
pub const DB_FLOOR: f32 = -60.0;

/// Aggregates samples over a fixed ~32 ms window and emits dBFS readings.
pub struct LevelMeter {
    window_samples: usize,
    sum_sq: f32,
    count: usize,
}

impl LevelMeter {
    pub fn new(sample_rate: u32) -> Self {
        // Time-based window so the update rate stays stable across devices.
        let window_samples = ((sample_rate as f32 * 0.032).round() as usize).max(128);
        Self {
            window_samples,
            sum_sq: 0.0,
            count: 0,
        }
    }

    /// Feed one normalized sample; returns a dBFS reading each full window.
    pub fn push(&mut self, sample: f32) -> Option<f32> {
        self.sum_sq += sample * sample;
        self.count += 1;
        if self.count < self.window_samples {
            return None;
        }
        let rms = (self.sum_sq / self.count as f32).sqrt();
        self.sum_sq = 0.0;
        self.count = 0;
        Some((20.0 * rms.max(1e-5).log10()).max(DB_FLOOR))
    }
}

/// Last meter reading shared between the stream callback and the session.
#[derive(Clone, Default)]
pub struct SharedLevel(Arc<Mutex<Option<f32>>>);

impl SharedLevel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, db: f32) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(db);
        }
    }

    pub fn get(&self) -> Option<f32> {
        self.0.lock().ok().and_then(|slot| *slot)
    }
}
