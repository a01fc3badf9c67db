use anyhow::{ensure, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use vitals_lib::{
    unix_now, AlertState, Channel, ChannelRule, Monitor, RandomSource, ReadingSource,
    SamplingRanges, ThresholdClassifier, TickOutput, VitalsError, Window, DEFAULT_CAPACITY,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub monitor: MonitorSection,
    pub subject: SubjectInfo,
    pub thresholds: ThresholdOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    /// Readings retained per channel.
    pub capacity: usize,
    /// Period between ticks.
    pub tick_ms: u64,
    /// How long the dashboard keeps an alert banner up.
    pub alert_dismiss_ms: u64,
    /// Fixed seed for reproducible synthetic data.
    pub seed: Option<u64>,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            tick_ms: 3000,
            alert_dismiss_ms: 3000,
            seed: None,
        }
    }
}

/// Read-only metadata about the monitored person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectInfo {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub history: String,
}

impl Default for SubjectInfo {
    fn default() -> Self {
        Self {
            id: "001".into(),
            name: "Demo Subject".into(),
            age: 29,
            history: "No significant cardiovascular history. Non-smoker. Exercises regularly."
                .into(),
        }
    }
}

/// Per-channel bound overrides. A field that is present replaces the
/// default bound; a missing field keeps it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundsSpec {
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdOverrides {
    pub heart_rate: Option<BoundsSpec>,
    pub oxygen_level: Option<BoundsSpec>,
    pub body_temp: Option<BoundsSpec>,
    pub acceleration: Option<BoundsSpec>,
}

impl ThresholdOverrides {
    fn get(&self, channel: Channel) -> Option<BoundsSpec> {
        match channel {
            Channel::HeartRate => self.heart_rate,
            Channel::OxygenLevel => self.oxygen_level,
            Channel::BodyTemp => self.body_temp,
            Channel::Acceleration => self.acceleration,
        }
    }
}

impl MonitorConfig {
    /// Default rules with the `[thresholds]` overrides applied. Every
    /// merged bound must be finite and `low <= high` when both are set.
    pub fn classifier(&self) -> Result<ThresholdClassifier> {
        let mut classifier = ThresholdClassifier::default();
        for channel in Channel::ALL {
            let Some(spec) = self.thresholds.get(channel) else {
                continue;
            };
            let current = classifier
                .rule(channel)
                .copied()
                .unwrap_or(ChannelRule::new(channel, None, None));
            let rule = ChannelRule::new(
                channel,
                spec.low.or(current.low),
                spec.high.or(current.high),
            );
            check_rule(&rule).with_context(|| format!("in [thresholds.{}]", channel.key()))?;
            classifier = classifier.with_rule(rule);
        }
        Ok(classifier)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.monitor.tick_ms.max(1))
    }

    pub fn alert_dismiss(&self) -> Duration {
        Duration::from_millis(self.monitor.alert_dismiss_ms)
    }

    /// Synthetic monitor using the configured capacity, seed and thresholds.
    pub fn build_monitor(&self) -> Result<Monitor<RandomSource>> {
        let ranges = SamplingRanges::default();
        let source = match self.monitor.seed {
            Some(seed) => RandomSource::seeded(ranges, seed),
            None => RandomSource::new(ranges),
        }
        .context("building synthetic source")?;
        Monitor::new(source, self.classifier()?, self.monitor.capacity)
            .context("building monitor")
    }
}

fn check_rule(rule: &ChannelRule) -> Result<()> {
    for bound in [rule.low, rule.high].into_iter().flatten() {
        ensure!(bound.is_finite(), "threshold {} is not finite", bound);
    }
    if let (Some(low), Some(high)) = (rule.low, rule.high) {
        ensure!(low <= high, "low threshold {} is above high threshold {}", low, high);
    }
    Ok(())
}

pub fn parse_config(text: &str) -> Result<MonitorConfig> {
    let config: MonitorConfig = toml::from_str(text).context("parsing monitor config")?;
    config.classifier()?;
    Ok(config)
}

pub fn read_config(path: &Path) -> Result<MonitorConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("in {}", path.display()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub subject: SubjectInfo,
    pub seed: Option<u64>,
    pub capacity: usize,
    /// Ticks recorded, evicted ones included.
    pub ticks: u64,
    /// Ticks aborted by a source or validation error.
    pub skipped_ticks: u64,
    pub window_len: usize,
    pub first_tick: u64,
    /// Flag counts over every recorded tick, keyed by channel.
    pub anomalies: BTreeMap<String, usize>,
    pub alerts_raised: usize,
    pub last_alert: AlertState,
    pub started_unix: f64,
}

pub struct SessionOutcome {
    pub summary: SessionSummary,
    pub window: Window,
}

/// Drive `monitor` for up to `ticks` triggers, handing each recorded tick
/// to `on_tick`. Failed ticks are skipped; an exhausted source ends the
/// session early.
pub fn run_session<S, F>(
    monitor: &mut Monitor<S>,
    ticks: u64,
    subject: &SubjectInfo,
    seed: Option<u64>,
    mut on_tick: F,
) -> Result<SessionOutcome>
where
    S: ReadingSource,
    F: FnMut(&TickOutput) -> Result<()>,
{
    let started_unix = unix_now()?;
    info!(
        "session start: subject={} ticks={} capacity={}",
        subject.id,
        ticks,
        monitor.capacity()
    );
    let mut anomalies: BTreeMap<String, usize> = Channel::ALL
        .iter()
        .map(|channel| (channel.key().to_string(), 0))
        .collect();
    let mut alerts_raised = 0;
    let mut skipped_ticks = 0;
    for _ in 0..ticks {
        match monitor.tick() {
            Ok(output) => {
                for channel in output.flags.tripped() {
                    *anomalies.entry(channel.key().to_string()).or_insert(0) += 1;
                }
                if output.alert.active {
                    alerts_raised += 1;
                }
                on_tick(&output)?;
            }
            Err(VitalsError::SourceExhausted) => {
                info!("source exhausted after {} ticks", monitor.ticks());
                break;
            }
            Err(err) => {
                warn!("skipping tick: {}", err);
                skipped_ticks += 1;
            }
        }
    }
    let window = monitor.window();
    let summary = SessionSummary {
        subject: subject.clone(),
        seed,
        capacity: monitor.capacity(),
        ticks: monitor.ticks(),
        skipped_ticks,
        window_len: window.len(),
        first_tick: window.first_tick,
        anomalies,
        alerts_raised,
        last_alert: monitor.last_alert().clone(),
        started_unix,
    };
    info!(
        "session done: {} ticks, {} alerts",
        summary.ticks, summary.alerts_raised
    );
    Ok(SessionOutcome { summary, window })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use vitals_lib::{Reading, ScriptedSource, DEFAULT_RULES};

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.monitor.capacity, 100);
        assert_eq!(cfg.tick_period(), Duration::from_millis(3000));
        assert_eq!(cfg.alert_dismiss(), Duration::from_millis(3000));
        assert_eq!(cfg.subject, SubjectInfo::default());
        assert_eq!(cfg.classifier().unwrap().rules(), &DEFAULT_RULES[..]);
    }

    #[test]
    fn overrides_keep_unset_bounds() {
        let cfg = parse_config(
            r#"
            [monitor]
            capacity = 20
            seed = 5

            [thresholds.heart_rate]
            high = 170.0

            [thresholds.acceleration]
            high = 12.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.monitor.capacity, 20);
        assert_eq!(cfg.monitor.tick_ms, 3000);
        let classifier = cfg.classifier().unwrap();
        let hr = classifier.rule(Channel::HeartRate).unwrap();
        assert_eq!(hr.low, Some(51.0));
        assert_eq!(hr.high, Some(170.0));
        assert_eq!(
            classifier.rule(Channel::Acceleration).unwrap().high,
            Some(12.0)
        );
        assert_eq!(
            classifier.rule(Channel::BodyTemp),
            Some(&DEFAULT_RULES[2])
        );
    }

    #[test]
    fn rejects_non_finite_thresholds() {
        let err = parse_config("[thresholds.heart_rate]\nhigh = nan\nlow = 500.0\n").unwrap_err();
        assert!(format!("{:#}", err).contains("thresholds.heart_rate"));
        assert!(parse_config("[thresholds.acceleration]\nhigh = inf\n").is_err());
        assert!(parse_config("[thresholds.oxygen_level]\nlow = -inf\n").is_err());
    }

    #[test]
    fn rejects_inverted_thresholds() {
        assert!(parse_config("[thresholds.body_temp]\nlow = 39.0\nhigh = 36.0\n").is_err());
        // merged with the default high of 148
        let err = parse_config("[thresholds.heart_rate]\nlow = 150.0\n").unwrap_err();
        assert!(format!("{:#}", err).contains("above high threshold"));
    }

    #[test]
    fn build_monitor_rejects_bad_overrides() {
        let mut cfg = MonitorConfig::default();
        cfg.thresholds.heart_rate = Some(BoundsSpec {
            low: None,
            high: Some(f64::NAN),
        });
        assert!(cfg.classifier().is_err());
        assert!(cfg.build_monitor().is_err());
    }

    #[test]
    fn reads_config_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[subject]\nid = \"042\"\nname = \"Test Person\"\nage = 51\n"
        )
        .unwrap();
        let cfg = read_config(file.path()).unwrap();
        assert_eq!(cfg.subject.id, "042");
        assert_eq!(cfg.subject.age, 51);
        assert_eq!(cfg.subject.history, SubjectInfo::default().history);
    }

    #[test]
    fn missing_config_is_an_error() {
        assert!(read_config(Path::new("/nonexistent/monitor.toml")).is_err());
    }

    #[test]
    fn zero_capacity_fails_to_build() {
        let cfg = parse_config("[monitor]\ncapacity = 0\n").unwrap();
        assert!(cfg.build_monitor().is_err());
    }

    #[test]
    fn seeded_session_is_bounded() {
        let cfg = parse_config("[monitor]\ncapacity = 10\nseed = 11\n").unwrap();
        let mut monitor = cfg.build_monitor().unwrap();
        let mut seen = 0;
        let outcome = run_session(&mut monitor, 25, &cfg.subject, cfg.monitor.seed, |out| {
            assert!(out.window.is_aligned());
            seen += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, 25);
        assert_eq!(outcome.summary.ticks, 25);
        assert_eq!(outcome.summary.window_len, 10);
        assert_eq!(outcome.summary.first_tick, 15);
        assert_eq!(outcome.window.len(), 10);
        assert_eq!(outcome.summary.skipped_ticks, 0);
    }

    #[test]
    fn session_stops_when_script_runs_out() {
        let readings = vec![
            Reading {
                timestamp: 1.0,
                heart_rate: 149.0,
                oxygen_level: 97.0,
                body_temp: 36.5,
                acceleration: 1.0,
            },
            Reading {
                timestamp: 2.0,
                heart_rate: 70.0,
                oxygen_level: 97.0,
                body_temp: 36.5,
                acceleration: 1.0,
            },
        ];
        let mut monitor = Monitor::new(
            ScriptedSource::new(readings),
            ThresholdClassifier::default(),
            10,
        )
        .unwrap();
        let outcome = run_session(
            &mut monitor,
            50,
            &SubjectInfo::default(),
            None,
            |_| Ok(()),
        )
        .unwrap();
        assert_eq!(outcome.summary.ticks, 2);
        assert_eq!(outcome.summary.alerts_raised, 1);
        assert_eq!(outcome.summary.anomalies["heart_rate"], 1);
        assert_eq!(outcome.summary.anomalies["body_temp"], 0);
        assert!(!outcome.summary.last_alert.active);
    }
}
