//! Turn decoded samples into series worth plotting.
//!
//! Probes log twice per task run: once when the task is activated and once
//! when it completes. Even samples are activations, odd ones completions.

use itertools::Itertools;

use crate::downsample::Point;
use crate::time::{Nanos, NANOS_PER_SEC};

const NANOS_PER_MILLI: f64 = 1_000_000.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JitterSeries {
    /// x in seconds, y in milliseconds
    pub points: Vec<Point>,
    /// Largest y, `None` if there are no points
    pub max: Option<f64>,
}

impl JitterSeries {
    fn from_points(points: Vec<Point>) -> Self {
        let max = points.iter().map(|p| p.y).reduce(f64::max);
        Self { points, max }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn seconds(sample: Nanos) -> f64 {
    sample as f64 / NANOS_PER_SEC as f64
}

fn millis(duration: Nanos) -> f64 {
    duration as f64 / NANOS_PER_MILLI
}

/// Time between consecutive activations, plotted at the later one.
pub fn activation_periods(samples: &[Nanos]) -> JitterSeries {
    let points = samples
        .iter()
        .step_by(2)
        .tuple_windows()
        .map(|(prev, curr)| Point::new(seconds(*curr), millis(curr - prev)))
        .collect();
    JitterSeries::from_points(points)
}

/// How long each run took, plotted at its activation. An activation
/// without completion at the end is ignored.
pub fn run_durations(samples: &[Nanos]) -> JitterSeries {
    let points = samples
        .chunks_exact(2)
        .map(|run| Point::new(seconds(run[0]), millis(run[1] - run[0])))
        .collect();
    JitterSeries::from_points(points)
}
