use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::alert::AlertState;
use crate::detectors::ThresholdClassifier;
use crate::error::VitalsError;
use crate::history::{HistoryStore, Window};
use crate::reading::{AnomalyFlags, Reading};
use crate::source::ReadingSource;

/// Where the orchestrator is within one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickPhase {
    Idle,
    Sampling,
    Classifying,
    Recording,
}

/// Everything the display needs after one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickOutput {
    /// Zero-based index of the recorded tick.
    pub tick: u64,
    pub reading: Reading,
    pub flags: AnomalyFlags,
    pub window: Window,
    pub alert: AlertState,
}

/// Drives sample → classify → record once per external trigger and owns
/// the process-wide history.
pub struct Monitor<S> {
    source: S,
    classifier: ThresholdClassifier,
    history: HistoryStore,
    phase: TickPhase,
    last_alert: AlertState,
}

impl<S: ReadingSource> Monitor<S> {
    pub fn new(
        source: S,
        classifier: ThresholdClassifier,
        capacity: usize,
    ) -> Result<Self, VitalsError> {
        Ok(Self {
            source,
            classifier,
            history: HistoryStore::new(capacity)?,
            phase: TickPhase::Idle,
            last_alert: AlertState::default(),
        })
    }

    /// Advance one tick. On error nothing is recorded and the previous
    /// window stays current.
    pub fn tick(&mut self) -> Result<TickOutput, VitalsError> {
        match self.run_tick() {
            Ok(output) => Ok(output),
            Err(err) => {
                warn!("tick {} aborted: {}", self.history.total_appended(), err);
                self.enter(TickPhase::Idle);
                Err(err)
            }
        }
    }

    fn run_tick(&mut self) -> Result<TickOutput, VitalsError> {
        self.enter(TickPhase::Sampling);
        let reading = self.source.next_reading()?;
        reading.ensure_finite()?;

        self.enter(TickPhase::Classifying);
        let flags = self.classifier.classify(&reading);

        self.enter(TickPhase::Recording);
        let tick = self.history.total_appended();
        self.history.append(reading, flags);
        let alert = AlertState::from_flags(&flags);
        self.last_alert = alert.clone();
        let window = self.history.snapshot();
        self.enter(TickPhase::Idle);

        if alert.active {
            debug!("tick {} alert: {}", tick, alert.message);
        }
        Ok(TickOutput {
            tick,
            reading,
            flags,
            window,
            alert,
        })
    }

    fn enter(&mut self, phase: TickPhase) {
        if self.phase != phase {
            debug!("{:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }

    pub fn window(&self) -> Window {
        self.history.snapshot()
    }

    pub fn last_alert(&self) -> &AlertState {
        &self.last_alert
    }

    pub fn phase(&self) -> TickPhase {
        self.phase
    }

    /// Ticks recorded so far, evicted ones included.
    pub fn ticks(&self) -> u64 {
        self.history.total_appended()
    }

    pub fn capacity(&self) -> usize {
        self.history.capacity()
    }

    pub fn classifier(&self) -> &ThresholdClassifier {
        &self.classifier
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Channel;
    use crate::source::{RandomSource, SamplingRanges, ScriptedSource};

    fn reading(t: f64, hr: f64, ox: f64, temp: f64, acc: f64) -> Reading {
        Reading {
            timestamp: t,
            heart_rate: hr,
            oxygen_level: ox,
            body_temp: temp,
            acceleration: acc,
        }
    }

    fn scripted_five() -> Vec<Reading> {
        vec![
            reading(1.0, 72.0, 98.0, 36.8, 1.2),
            reading(2.0, 149.0, 97.0, 37.0, 2.0),
            reading(3.0, 80.0, 85.5, 40.0, 3.0),
            reading(4.0, 50.0, 99.0, 35.6, 9.95),
            reading(5.0, 148.0, 86.0, 39.9, 9.9),
        ]
    }

    #[test]
    fn scripted_run_matches_hand_computed_flags() {
        let source = ScriptedSource::new(scripted_five());
        let mut monitor = Monitor::new(source, ThresholdClassifier::default(), 100).unwrap();
        let mut last = None;
        for _ in 0..5 {
            last = Some(monitor.tick().unwrap());
        }
        let window = last.unwrap().window;
        assert_eq!(window.len(), 5);
        assert!(window.is_aligned());
        assert_eq!(
            window.anomalies_heart_rate,
            vec![false, true, false, true, false]
        );
        assert_eq!(
            window.anomalies_oxygen_level,
            vec![false, false, true, false, false]
        );
        assert_eq!(
            window.anomalies_body_temp,
            vec![false, false, true, true, false]
        );
        assert_eq!(
            window.anomalies_acceleration,
            vec![false, false, false, true, false]
        );
        assert_eq!(window.time, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn alert_reflects_only_latest_tick() {
        let source = ScriptedSource::new(vec![
            reading(1.0, 160.0, 97.0, 40.5, 1.0),
            reading(2.0, 70.0, 97.0, 36.5, 1.0),
        ]);
        let mut monitor = Monitor::new(source, ThresholdClassifier::default(), 10).unwrap();
        let first = monitor.tick().unwrap();
        assert!(first.alert.active);
        assert!(first.alert.message.contains(Channel::HeartRate.label()));
        assert!(first.alert.message.contains(Channel::BodyTemp.label()));
        assert!(!first.alert.message.contains(Channel::OxygenLevel.label()));
        assert!(!first.alert.message.contains(Channel::Acceleration.label()));

        let second = monitor.tick().unwrap();
        assert!(!second.alert.active);
        assert!(second.alert.message.is_empty());
        assert_eq!(monitor.last_alert(), &second.alert);
    }

    #[test]
    fn eviction_keeps_last_three() {
        let readings = (1..=4).map(|t| reading(t as f64, 70.0, 97.0, 36.5, 1.0));
        let mut monitor =
            Monitor::new(ScriptedSource::new(readings), ThresholdClassifier::default(), 3)
                .unwrap();
        for _ in 0..4 {
            monitor.tick().unwrap();
        }
        let window = monitor.window();
        assert_eq!(window.time, vec![2.0, 3.0, 4.0]);
        assert!(window.is_aligned());
        assert_eq!(window.first_tick, 1);
    }

    #[test]
    fn failed_tick_leaves_window_untouched() {
        let source = ScriptedSource::new(vec![
            reading(1.0, 70.0, 97.0, 36.5, 1.0),
            reading(2.0, f64::NAN, 97.0, 36.5, 1.0),
        ]);
        let mut monitor = Monitor::new(source, ThresholdClassifier::default(), 10).unwrap();
        monitor.tick().unwrap();
        let before = monitor.window();

        assert!(matches!(
            monitor.tick(),
            Err(VitalsError::NonFinite {
                channel: Channel::HeartRate
            })
        ));
        assert_eq!(monitor.window(), before);
        assert_eq!(monitor.ticks(), 1);
        assert_eq!(monitor.phase(), TickPhase::Idle);

        // exhausted source aborts the same way
        assert!(matches!(monitor.tick(), Err(VitalsError::SourceExhausted)));
        assert_eq!(monitor.window(), before);
    }

    #[test]
    fn random_run_is_bounded_and_aligned() {
        let capacity = 100;
        let source = RandomSource::seeded(SamplingRanges::default(), 3).unwrap();
        let mut monitor =
            Monitor::new(source, ThresholdClassifier::default(), capacity).unwrap();
        for tick in 0..250u64 {
            let out = monitor.tick().unwrap();
            assert_eq!(out.tick, tick);
            assert!(out.window.is_aligned());
            assert_eq!(out.window.len(), ((tick + 1) as usize).min(capacity));
            assert_eq!(out.alert.active, out.flags.any());
        }
        let window = monitor.window();
        assert_eq!(window.len(), capacity);
        assert_eq!(window.first_tick, monitor.ticks() - capacity as u64);
    }
}
