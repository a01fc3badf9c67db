use serde::{Deserialize, Serialize};

use crate::error::VitalsError;

/// One monitored vital-sign channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    HeartRate,
    OxygenLevel,
    BodyTemp,
    Acceleration,
}

impl Channel {
    /// Display order used by every consumer.
    pub const ALL: [Channel; 4] = [
        Channel::HeartRate,
        Channel::OxygenLevel,
        Channel::BodyTemp,
        Channel::Acceleration,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Channel::HeartRate => "heart_rate",
            Channel::OxygenLevel => "oxygen_level",
            Channel::BodyTemp => "body_temp",
            Channel::Acceleration => "acceleration",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Channel::HeartRate => "Heart rate",
            Channel::OxygenLevel => "Oxygen level",
            Channel::BodyTemp => "Body temperature",
            Channel::Acceleration => "Acceleration",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Channel::HeartRate => "BPM",
            Channel::OxygenLevel => "%",
            Channel::BodyTemp => "°C",
            Channel::Acceleration => "m/s²",
        }
    }

    /// Fixed y-range for charts of this channel.
    pub fn display_range(&self) -> [f64; 2] {
        match self {
            Channel::HeartRate => [50.0, 150.0],
            Channel::OxygenLevel => [85.0, 100.0],
            Channel::BodyTemp => [35.0, 40.0],
            Channel::Acceleration => [0.0, 10.0],
        }
    }

    fn index(&self) -> usize {
        match self {
            Channel::HeartRate => 0,
            Channel::OxygenLevel => 1,
            Channel::BodyTemp => 2,
            Channel::Acceleration => 3,
        }
    }

    pub fn from_key(key: &str) -> Option<Channel> {
        Channel::ALL.into_iter().find(|c| c.key() == key)
    }
}

/// A single sampled set of vital signs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub heart_rate: f64,
    pub oxygen_level: f64,
    pub body_temp: f64,
    pub acceleration: f64,
}

impl Reading {
    pub fn value(&self, channel: Channel) -> f64 {
        match channel {
            Channel::HeartRate => self.heart_rate,
            Channel::OxygenLevel => self.oxygen_level,
            Channel::BodyTemp => self.body_temp,
            Channel::Acceleration => self.acceleration,
        }
    }

    /// Reject readings carrying NaN or infinities in any field.
    pub fn ensure_finite(&self) -> Result<(), VitalsError> {
        if !self.timestamp.is_finite() {
            return Err(VitalsError::NonFiniteTimestamp);
        }
        for channel in Channel::ALL {
            if !self.value(channel).is_finite() {
                return Err(VitalsError::NonFinite { channel });
            }
        }
        Ok(())
    }
}

/// Per-channel anomaly flags derived from one [`Reading`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyFlags {
    pub heart_rate: bool,
    pub oxygen_level: bool,
    pub body_temp: bool,
    pub acceleration: bool,
}

impl AnomalyFlags {
    pub fn get(&self, channel: Channel) -> bool {
        self.as_array()[channel.index()]
    }

    pub fn set(&mut self, channel: Channel, value: bool) {
        match channel {
            Channel::HeartRate => self.heart_rate = value,
            Channel::OxygenLevel => self.oxygen_level = value,
            Channel::BodyTemp => self.body_temp = value,
            Channel::Acceleration => self.acceleration = value,
        }
    }

    pub fn any(&self) -> bool {
        self.as_array().iter().any(|flag| *flag)
    }

    /// Flagged channels in display order.
    pub fn tripped(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|channel| self.get(*channel))
            .collect()
    }

    fn as_array(&self) -> [bool; 4] {
        [
            self.heart_rate,
            self.oxygen_level,
            self.body_temp,
            self.acceleration,
        ]
    }
}
