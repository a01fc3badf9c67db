//! Producers of [`Reading`]s.
//!
//! [`ReadingSource`] is the ingestion seam: the synthetic [`RandomSource`]
//! stands in for a device, and a hardware or stream adapter only has to
//! produce the same `Reading` shape to plug into the monitor.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::VitalsError;
use crate::reading::{Channel, Reading};

pub trait ReadingSource {
    /// Produce the next reading. An error means no reading was produced.
    fn next_reading(&mut self) -> Result<Reading, VitalsError>;
}

impl<S: ReadingSource + ?Sized> ReadingSource for Box<S> {
    fn next_reading(&mut self) -> Result<Reading, VitalsError> {
        (**self).next_reading()
    }
}

/// Inclusive `[min, max]` sampling bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRange {
    pub min: f64,
    pub max: f64,
}

impl SampleRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingRanges {
    /// Drawn as whole beats per minute.
    pub heart_rate: SampleRange,
    pub oxygen_level: SampleRange,
    pub body_temp: SampleRange,
    pub acceleration: SampleRange,
}

impl Default for SamplingRanges {
    fn default() -> Self {
        Self {
            heart_rate: SampleRange::new(50.0, 150.0),
            oxygen_level: SampleRange::new(85.0, 100.0),
            body_temp: SampleRange::new(35.5, 40.0),
            acceleration: SampleRange::new(0.0, 10.0),
        }
    }
}

impl SamplingRanges {
    pub fn get(&self, channel: Channel) -> SampleRange {
        match channel {
            Channel::HeartRate => self.heart_rate,
            Channel::OxygenLevel => self.oxygen_level,
            Channel::BodyTemp => self.body_temp,
            Channel::Acceleration => self.acceleration,
        }
    }

    fn validate(&self) -> Result<(), VitalsError> {
        for channel in Channel::ALL {
            let range = self.get(channel);
            let ordered = range.min.is_finite() && range.max.is_finite() && range.min <= range.max;
            // uniform sampling scales the span by just over 1 and panics on overflow
            let span = range.max - range.min;
            let sampleable = (span / (1.0 - f64::EPSILON)).is_finite();
            let has_integer = channel != Channel::HeartRate || range.min.ceil() <= range.max.floor();
            if !ordered || !sampleable || !has_integer {
                return Err(VitalsError::InvalidRange {
                    channel,
                    min: range.min,
                    max: range.max,
                });
            }
        }
        Ok(())
    }

    /// Fails on the first channel that is non-finite or out of bounds.
    pub fn check(&self, reading: &Reading) -> Result<(), VitalsError> {
        reading.ensure_finite()?;
        for channel in Channel::ALL {
            let value = reading.value(channel);
            if !self.get(channel).contains(value) {
                return Err(VitalsError::OutOfRange { channel, value });
            }
        }
        Ok(())
    }
}

/// Synthetic generator drawing each channel independently and uniformly.
pub struct RandomSource {
    rng: StdRng,
    ranges: SamplingRanges,
}

impl RandomSource {
    pub fn new(ranges: SamplingRanges) -> Result<Self, VitalsError> {
        ranges.validate()?;
        Ok(Self {
            rng: StdRng::from_entropy(),
            ranges,
        })
    }

    pub fn seeded(ranges: SamplingRanges, seed: u64) -> Result<Self, VitalsError> {
        ranges.validate()?;
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            ranges,
        })
    }

    pub fn ranges(&self) -> &SamplingRanges {
        &self.ranges
    }

    pub fn generate(&mut self) -> Result<Reading, VitalsError> {
        let timestamp = unix_now()?;
        let hr = self.ranges.heart_rate;
        let heart_rate = self
            .rng
            .gen_range(hr.min.ceil() as i64..=hr.max.floor() as i64) as f64;
        let reading = Reading {
            timestamp,
            heart_rate,
            oxygen_level: self.draw(self.ranges.oxygen_level),
            body_temp: self.draw(self.ranges.body_temp),
            acceleration: self.draw(self.ranges.acceleration),
        };
        self.ranges.check(&reading)?;
        Ok(reading)
    }

    fn draw(&mut self, range: SampleRange) -> f64 {
        self.rng.gen_range(range.min..=range.max)
    }
}

impl ReadingSource for RandomSource {
    fn next_reading(&mut self) -> Result<Reading, VitalsError> {
        self.generate()
    }
}

/// Replays a fixed queue of readings in order.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    queue: VecDeque<Reading>,
}

impl ScriptedSource {
    pub fn new(readings: impl IntoIterator<Item = Reading>) -> Self {
        Self {
            queue: readings.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl ReadingSource for ScriptedSource {
    fn next_reading(&mut self) -> Result<Reading, VitalsError> {
        self.queue.pop_front().ok_or(VitalsError::SourceExhausted)
    }
}

/// Current wall-clock time in seconds since the Unix epoch.
pub fn unix_now() -> Result<f64, VitalsError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_secs_f64())
        .map_err(|_| VitalsError::Clock)
}
