// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rates of monotonic hardware counters.

use std::{collections::HashMap, time::Instant};

/// Width of a hardware counter, it wraps to zero after its maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterWidth {
    Bits32,
    Bits64,
}

impl CounterWidth {
    #[must_use]
    pub const fn max(self) -> u64 {
        match self {
            Self::Bits32 => u32::MAX as u64,
            Self::Bits64 => u64::MAX,
        }
    }

    #[must_use]
    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            32 => Some(Self::Bits32),
            64 => Some(Self::Bits64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    value: u64,
    at: Instant,
}

/// Remembers the previous sample of every counter port.
#[derive(Debug, Default)]
pub struct CounterTracker {
    samples: HashMap<String, Sample>,
}

impl CounterTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a sample and returns the rate since the previous one in
    /// counts per second.
    ///
    /// The first sample of a port yields `0`, as does a sample that isn't
    /// later than its predecessor. A value below the previous one is taken
    /// as a single wraparound. 32 bit values are masked to 32 bits.
    pub fn observe(&mut self, port: &str, raw: u64, width: CounterWidth, at: Instant) -> f64 {
        let raw = raw & width.max();
        let sample = Sample { value: raw, at };
        let Some(prev) = self.samples.insert(port.to_owned(), sample) else {
            log::debug!("First sample of counter {port}");
            return 0.0;
        };
        let Some(elapsed) = at.checked_duration_since(prev.at).filter(|d| !d.is_zero()) else {
            log::debug!("Counter {port} sampled twice at the same time");
            return 0.0;
        };
        let delta = if raw >= prev.value {
            raw - prev.value
        } else {
            width.max() - prev.value + raw
        };
        delta as f64 / elapsed.as_secs_f64()
    }

    /// Forgets the previous sample of a port.
    pub fn reset(&mut self, port: &str) {
        self.samples.remove(port);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
