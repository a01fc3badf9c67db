use serde::{Deserialize, Serialize};

use crate::reading::AnomalyFlags;

/// Latest-tick alert surfaced to the display. Nothing is queued: each tick
/// replaces the previous state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
    pub message: String,
    pub active: bool,
}

impl AlertState {
    pub fn from_flags(flags: &AnomalyFlags) -> Self {
        let message = flags
            .tripped()
            .iter()
            .map(|channel| format!("{} anomaly detected!", channel.label()))
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            active: flags.any(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Channel;

    #[test]
    fn quiet_tick_has_no_message() {
        let alert = AlertState::from_flags(&AnomalyFlags::default());
        assert!(!alert.active);
        assert!(alert.message.is_empty());
    }

    #[test]
    fn names_only_tripped_channels() {
        let flags = AnomalyFlags {
            heart_rate: true,
            oxygen_level: false,
            body_temp: true,
            acceleration: false,
        };
        let alert = AlertState::from_flags(&flags);
        assert!(alert.active);
        assert!(alert.message.contains(Channel::HeartRate.label()));
        assert!(alert.message.contains(Channel::BodyTemp.label()));
        assert!(!alert.message.contains(Channel::OxygenLevel.label()));
        assert!(!alert.message.contains(Channel::Acceleration.label()));
        assert_eq!(
            alert.message,
            "Heart rate anomaly detected! Body temperature anomaly detected!"
        );
    }
}
