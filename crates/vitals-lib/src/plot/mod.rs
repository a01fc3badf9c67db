use serde::{Deserialize, Serialize};

use crate::history::Window;
use crate::reading::Channel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
    pub bounds: [f64; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub const ANOMALY: Color = Color(0xFF2222);

    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub radius: u32,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Markers(MarkerSeries),
}

impl Series {
    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(line) => &line.points,
            Series::Markers(markers) => &markers.points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis {
                label: None,
                bounds: [0.0, 1.0],
            },
            y: Axis {
                label: None,
                bounds: [0.0, 1.0],
            },
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

/// Line colour per channel.
pub fn channel_color(channel: Channel) -> Color {
    match channel {
        Channel::HeartRate => Color(0x3366FF),
        Channel::OxygenLevel => Color(0x22AA44),
        Channel::BodyTemp => Color(0xE6C300),
        Channel::Acceleration => Color(0xFF8800),
    }
}

/// Chart for one channel: the value trace plus red markers on flagged
/// samples. X is seconds relative to the newest sample (so it ends at 0).
pub fn figure_from_window(window: &Window, channel: Channel, max_points: usize) -> Figure {
    let newest = window.latest_time().unwrap_or(0.0);
    let points: Vec<[f64; 2]> = window
        .time
        .iter()
        .zip(window.values(channel))
        .map(|(t, v)| [t - newest, *v])
        .collect();
    let anomalies: Vec<[f64; 2]> = points
        .iter()
        .zip(window.flags(channel))
        .filter(|(_, flagged)| **flagged)
        .map(|(point, _)| *point)
        .collect();
    let oldest = points.first().map(|p| p[0]).unwrap_or(0.0);

    let mut fig = Figure::new(Some(channel.label().to_string()));
    fig.x = Axis {
        label: Some("seconds".into()),
        bounds: if oldest < 0.0 { [oldest, 0.0] } else { [-1.0, 0.0] },
    };
    fig.y = Axis {
        label: Some(channel.unit().into()),
        bounds: channel.display_range(),
    };
    fig.add_series(Series::Line(LineSeries {
        name: channel.label().into(),
        points: decimate_points(&points, max_points),
        style: Style {
            width: 1.6,
            color: channel_color(channel),
        },
    }));
    fig.add_series(Series::Markers(MarkerSeries {
        name: "anomaly".into(),
        points: anomalies,
        radius: 3,
        color: Color::ANOMALY,
    }));
    fig
}

/// One figure per channel in display order.
pub fn figures_from_window(window: &Window, max_points: usize) -> Vec<Figure> {
    Channel::ALL
        .iter()
        .map(|channel| figure_from_window(window, *channel, max_points))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryStore;
    use crate::reading::{AnomalyFlags, Reading};

    #[test]
    fn markers_follow_flags() {
        let mut store = HistoryStore::new(10).unwrap();
        for t in 0..4 {
            let reading = Reading {
                timestamp: 100.0 + t as f64 * 3.0,
                heart_rate: 70.0 + t as f64,
                oxygen_level: 97.0,
                body_temp: 36.5,
                acceleration: 1.0,
            };
            let flags = AnomalyFlags {
                heart_rate: t == 2,
                ..AnomalyFlags::default()
            };
            store.append(reading, flags);
        }
        let figures = figures_from_window(&store.snapshot(), 512);
        assert_eq!(figures.len(), 4);
        let hr = &figures[0];
        assert_eq!(hr.title.as_deref(), Some("Heart rate"));
        assert_eq!(hr.x.bounds, [-9.0, 0.0]);
        assert_eq!(hr.y.bounds, [50.0, 150.0]);
        assert_eq!(hr.series[0].points().len(), 4);
        assert_eq!(hr.series[1].points(), &[[-3.0, 72.0]]);
        assert!(figures[1].series[1].points().is_empty());
    }

    #[test]
    fn empty_window_still_has_bounds() {
        let fig = figure_from_window(&Window::default(), Channel::BodyTemp, 64);
        assert_eq!(fig.x.bounds, [-1.0, 0.0]);
        assert!(fig.series[0].points().is_empty());
    }

    #[test]
    fn decimation_caps_points() {
        let points: Vec<[f64; 2]> = (0..1000).map(|i| [i as f64, 0.0]).collect();
        assert_eq!(decimate_points(&points, 100).len(), 100);
        assert_eq!(decimate_points(&points[..10], 100).len(), 10);
    }

    #[test]
    fn color_splits_into_rgb() {
        assert_eq!(Color(0x3366FF).rgb(), (0x33, 0x66, 0xFF));
    }
}
