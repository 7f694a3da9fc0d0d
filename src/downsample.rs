//! Reduce a series to a number of points that can be drawn.
//!
//! [`minmax_reduce`] is cheap and keeps the extremes, [`lttb_reduce`] keeps
//! the visual shape but costs more. [`minmax_lttb`] runs the first as a pre
//! filter for the second which is what you want for very long series.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Seconds
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Can not downsample an empty series")]
    EmptySeries,
    #[error("Threshold ({threshold}) is too small, this algorithm needs at least {minimum}")]
    ThresholdTooSmall { threshold: usize, minimum: usize },
}

pub const MINMAX_MIN_THRESHOLD: usize = 4;
pub const LTTB_MIN_THRESHOLD: usize = 3;
/// How many points per final point [`minmax_lttb`] keeps after its first pass
pub const PREFILTER_FACTOR: usize = 4;

fn check(series: &[Point], threshold: usize, minimum: usize) -> Result<(), Error> {
    if series.is_empty() {
        return Err(Error::EmptySeries);
    }
    if threshold < minimum {
        return Err(Error::ThresholdTooSmall { threshold, minimum });
    }
    Ok(())
}

/// Splits the series in `threshold / 2` buckets and keeps the lowest then
/// the highest point of each. The pair is not reordered by x.
///
/// Returns the series unchanged if it has no more then `threshold` points.
pub fn minmax_reduce(series: &[Point], threshold: usize) -> Result<Vec<Point>, Error> {
    check(series, threshold, MINMAX_MIN_THRESHOLD)?;
    if threshold >= series.len() {
        return Ok(series.to_vec());
    }

    let n_buckets = threshold / 2;
    let bucket_size = series.len() / n_buckets;
    let mut reduced = Vec::with_capacity(2 * n_buckets);
    for bucket in 0..n_buckets {
        let start = bucket * bucket_size;
        // the last bucket takes whatever does not divide evenly
        let end = if bucket == n_buckets - 1 {
            series.len()
        } else {
            start + bucket_size
        };
        let (min, max) = extremes(&series[start..end]);
        reduced.push(min);
        reduced.push(max);
    }
    Ok(reduced)
}

/// On ties the first point wins. `bucket` may not be empty.
fn extremes(bucket: &[Point]) -> (Point, Point) {
    let mut min = bucket[0];
    let mut max = bucket[0];
    for point in &bucket[1..] {
        if point.y < min.y {
            min = *point;
        }
        if point.y > max.y {
            max = *point;
        }
    }
    (min, max)
}

fn triangle_area(a: Point, b: Point, c: Point) -> f64 {
    ((a.x - c.x) * (b.y - a.y) - (a.x - b.x) * (c.y - a.y)).abs() * 0.5
}

fn mean(points: &[Point]) -> Point {
    let n = points.len() as f64;
    let (sum_x, sum_y) = points
        .iter()
        .fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
    Point::new(sum_x / n, sum_y / n)
}

/// Largest Triangle Three Buckets.
///
/// Keeps the first and last point, from each of the `threshold - 2` buckets
/// in between it keeps the point that forms the largest triangle with the
/// previously kept point and the average of the next bucket.
///
/// Returns the series unchanged if it has no more then `threshold` points.
pub fn lttb_reduce(series: &[Point], threshold: usize) -> Result<Vec<Point>, Error> {
    check(series, threshold, LTTB_MIN_THRESHOLD)?;
    let n = series.len();
    if threshold >= n {
        return Ok(series.to_vec());
    }

    let n_buckets = threshold - 2;
    let bucket_size = (n - 2) as f64 / n_buckets as f64;
    let boundary = |bucket: usize| ((bucket as f64 * bucket_size).floor() as usize + 1).min(n);

    let mut sampled = Vec::with_capacity(threshold);
    sampled.push(series[0]);

    let mut prev = 0;
    for bucket in 0..n_buckets {
        let start = boundary(bucket);
        let end = boundary(bucket + 1);

        let anchor = if bucket + 1 < n_buckets {
            mean(&series[end..boundary(bucket + 2)])
        } else {
            series[n - 1]
        };

        let mut selected = start;
        let mut max_area = -1.0;
        for (i, point) in series.iter().enumerate().take(end).skip(start) {
            let area = triangle_area(series[prev], *point, anchor);
            if area > max_area {
                max_area = area;
                selected = i;
            }
        }

        sampled.push(series[selected]);
        prev = selected;
    }

    sampled.push(series[n - 1]);
    Ok(sampled)
}

/// [`minmax_reduce`] to `PREFILTER_FACTOR * threshold` points followed by
/// [`lttb_reduce`] to `threshold`.
pub fn minmax_lttb(series: &[Point], threshold: usize) -> Result<Vec<Point>, Error> {
    let prefiltered = minmax_reduce(series, threshold.saturating_mul(PREFILTER_FACTOR))?;
    lttb_reduce(&prefiltered, threshold)
}
