use serde::{Deserialize, Serialize};

use crate::reading::{AnomalyFlags, Channel, Reading};

/// Strict outer bounds for one channel: a value is anomalous when it is
/// below `low` or above `high`. A missing bound never trips.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelRule {
    pub channel: Channel,
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl ChannelRule {
    pub const fn new(channel: Channel, low: Option<f64>, high: Option<f64>) -> Self {
        Self {
            channel,
            low,
            high,
        }
    }

    /// Total over f64: NaN compares false against both bounds.
    pub fn is_anomalous(&self, value: f64) -> bool {
        let above = self.high.map_or(false, |high| value > high);
        let below = self.low.map_or(false, |low| value < low);
        above || below
    }
}

/// Static per-channel thresholds, inset from the synthetic sampling ranges
/// so demo data trips occasionally.
pub const DEFAULT_RULES: [ChannelRule; 4] = [
    ChannelRule::new(Channel::HeartRate, Some(51.0), Some(148.0)),
    ChannelRule::new(Channel::OxygenLevel, Some(86.0), None),
    ChannelRule::new(Channel::BodyTemp, Some(35.7), Some(39.9)),
    ChannelRule::new(Channel::Acceleration, None, Some(9.9)),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdClassifier {
    rules: [ChannelRule; 4],
}

impl Default for ThresholdClassifier {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES,
        }
    }
}

impl ThresholdClassifier {
    /// Replace the rule for `rule.channel`, keeping the others.
    pub fn with_rule(mut self, rule: ChannelRule) -> Self {
        if let Some(slot) = self.rules.iter_mut().find(|r| r.channel == rule.channel) {
            *slot = rule;
        }
        self
    }

    pub fn rules(&self) -> &[ChannelRule] {
        &self.rules
    }

    pub fn rule(&self, channel: Channel) -> Option<&ChannelRule> {
        self.rules.iter().find(|rule| rule.channel == channel)
    }

    pub fn classify(&self, reading: &Reading) -> AnomalyFlags {
        let mut flags = AnomalyFlags::default();
        for rule in &self.rules {
            flags.set(rule.channel, rule.is_anomalous(reading.value(rule.channel)));
        }
        flags
    }
}

/// Classify against [`DEFAULT_RULES`].
pub fn classify(reading: &Reading) -> AnomalyFlags {
    ThresholdClassifier::default().classify(reading)
}
