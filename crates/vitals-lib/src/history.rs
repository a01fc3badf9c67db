use std::collections::VecDeque;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::VitalsError;
use crate::reading::{AnomalyFlags, Channel, Reading};

pub const DEFAULT_CAPACITY: usize = 100;

/// Index-aligned copy of the retained history: position `i` of every
/// sequence refers to the same tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub capacity: usize,
    /// Zero-based tick index of the oldest retained entry.
    pub first_tick: u64,
    pub time: Vec<f64>,
    pub heart_rate: Vec<f64>,
    pub oxygen_level: Vec<f64>,
    pub body_temp: Vec<f64>,
    pub acceleration: Vec<f64>,
    pub anomalies_heart_rate: Vec<bool>,
    pub anomalies_oxygen_level: Vec<bool>,
    pub anomalies_body_temp: Vec<bool>,
    pub anomalies_acceleration: Vec<bool>,
}

impl Window {
    fn with_capacity(capacity: usize, len: usize, first_tick: u64) -> Self {
        Self {
            capacity,
            first_tick,
            time: Vec::with_capacity(len),
            heart_rate: Vec::with_capacity(len),
            oxygen_level: Vec::with_capacity(len),
            body_temp: Vec::with_capacity(len),
            acceleration: Vec::with_capacity(len),
            anomalies_heart_rate: Vec::with_capacity(len),
            anomalies_oxygen_level: Vec::with_capacity(len),
            anomalies_body_temp: Vec::with_capacity(len),
            anomalies_acceleration: Vec::with_capacity(len),
        }
    }

    fn push(&mut self, reading: &Reading, flags: &AnomalyFlags) {
        self.time.push(reading.timestamp);
        self.heart_rate.push(reading.heart_rate);
        self.oxygen_level.push(reading.oxygen_level);
        self.body_temp.push(reading.body_temp);
        self.acceleration.push(reading.acceleration);
        self.anomalies_heart_rate.push(flags.heart_rate);
        self.anomalies_oxygen_level.push(flags.oxygen_level);
        self.anomalies_body_temp.push(flags.body_temp);
        self.anomalies_acceleration.push(flags.acceleration);
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn values(&self, channel: Channel) -> &[f64] {
        match channel {
            Channel::HeartRate => &self.heart_rate,
            Channel::OxygenLevel => &self.oxygen_level,
            Channel::BodyTemp => &self.body_temp,
            Channel::Acceleration => &self.acceleration,
        }
    }

    pub fn flags(&self, channel: Channel) -> &[bool] {
        match channel {
            Channel::HeartRate => &self.anomalies_heart_rate,
            Channel::OxygenLevel => &self.anomalies_oxygen_level,
            Channel::BodyTemp => &self.anomalies_body_temp,
            Channel::Acceleration => &self.anomalies_acceleration,
        }
    }

    /// True when all nine sequences share one length within capacity.
    pub fn is_aligned(&self) -> bool {
        let len = self.time.len();
        len <= self.capacity
            && Channel::ALL
                .iter()
                .all(|c| self.values(*c).len() == len && self.flags(*c).len() == len)
    }

    pub fn latest_time(&self) -> Option<f64> {
        self.time.last().copied()
    }

    /// Number of flagged entries on one channel.
    pub fn anomaly_count(&self, channel: Channel) -> usize {
        self.flags(channel).iter().filter(|flag| **flag).count()
    }
}

/// Fixed-capacity FIFO of classified readings. Each slot carries the
/// reading and its flags together, so append-and-evict is one step and
/// the nine window sequences cannot drift apart.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    entries: VecDeque<(Reading, AnomalyFlags)>,
    capacity: usize,
    total_appended: u64,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Result<Self, VitalsError> {
        if capacity == 0 {
            return Err(VitalsError::ZeroCapacity);
        }
        Ok(Self {
            // one extra slot so append never reallocates before evicting
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            total_appended: 0,
        })
    }

    pub fn append(&mut self, reading: Reading, flags: AnomalyFlags) {
        self.entries.push_back((reading, flags));
        self.total_appended += 1;
        if self.entries.len() > self.capacity {
            if let Some((evicted, _)) = self.entries.pop_front() {
                debug!("evicted reading at t={:.3}", evicted.timestamp);
            }
        }
    }

    pub fn snapshot(&self) -> Window {
        let mut window =
            Window::with_capacity(self.capacity, self.entries.len(), self.first_tick());
        for (reading, flags) in &self.entries {
            window.push(reading, flags);
        }
        window
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Readings appended since creation, evicted ones included.
    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }

    pub fn latest(&self) -> Option<&(Reading, AnomalyFlags)> {
        self.entries.back()
    }

    fn first_tick(&self) -> u64 {
        self.total_appended - self.entries.len() as u64
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self {
            entries: VecDeque::with_capacity(DEFAULT_CAPACITY + 1),
            capacity: DEFAULT_CAPACITY,
            total_appended: 0,
        }
    }
}
