use itertools::Itertools;
use pretty_assertions::assert_eq;
use rstest::rstest;
use ticktrace::downsample::{lttb_reduce, minmax_lttb, minmax_reduce, Error, Point};
use ticktrace_test_support::noisy_series;

use shared::setup_tracing;

fn line(len: usize) -> Vec<Point> {
    (0..len)
        .map(|i| Point::new(i as f64, i as f64 * 0.5))
        .collect()
}

#[rstest]
#[case(4)]
#[case(10)]
#[case(11)]
#[case(100)]
fn minmax_gives_pair_per_bucket(#[case] threshold: usize) {
    let series = noisy_series(3, 1000, 0.001);
    let reduced = minmax_reduce(&series, threshold).unwrap();
    assert_eq!(reduced.len(), 2 * (threshold / 2));
}

#[rstest]
#[case(3)]
#[case(10)]
#[case(99)]
fn lttb_length_and_endpoints(#[case] threshold: usize) {
    setup_tracing();

    let series = noisy_series(4, 1000, 0.001);
    let reduced = lttb_reduce(&series, threshold).unwrap();
    assert_eq!(reduced.len(), threshold);
    assert_eq!(reduced.first(), series.first());
    assert_eq!(reduced.last(), series.last());
}

#[rstest]
#[case(3)]
#[case(50)]
#[case(500)]
fn minmax_lttb_length(#[case] threshold: usize) {
    let series = noisy_series(5, 100_000, 0.0001);
    let reduced = minmax_lttb(&series, threshold).unwrap();
    assert_eq!(reduced.len(), threshold);
}

#[test]
fn short_series_is_returned_as_is() {
    let series = line(10);
    assert_eq!(minmax_reduce(&series, 10).unwrap(), series);
    assert_eq!(lttb_reduce(&series, 20).unwrap(), series);
    assert_eq!(minmax_lttb(&series, 3).unwrap(), lttb_reduce(&series, 3).unwrap());
}

#[test]
fn minmax_lttb_skips_prefilter_for_short_series() {
    // 4 * 250 >= 1000 so minmax leaves the series alone
    let series = noisy_series(6, 1000, 0.01);
    assert_eq!(
        minmax_lttb(&series, 250).unwrap(),
        lttb_reduce(&series, 250).unwrap()
    );
}

#[test]
fn invalid_arguments() {
    assert_eq!(minmax_reduce(&[], 10), Err(Error::EmptySeries));
    assert_eq!(lttb_reduce(&[], 10), Err(Error::EmptySeries));
    assert_eq!(minmax_lttb(&[], 10), Err(Error::EmptySeries));

    let series = line(100);
    assert_eq!(
        minmax_reduce(&series, 3),
        Err(Error::ThresholdTooSmall {
            threshold: 3,
            minimum: 4
        })
    );
    assert_eq!(
        lttb_reduce(&series, 2),
        Err(Error::ThresholdTooSmall {
            threshold: 2,
            minimum: 3
        })
    );
}

#[test]
fn output_stays_in_input() {
    let series = noisy_series(8, 10_000, 0.001);
    for reduced in [
        minmax_reduce(&series, 64).unwrap(),
        lttb_reduce(&series, 64).unwrap(),
        minmax_lttb(&series, 64).unwrap(),
    ] {
        assert!(reduced.iter().all(|p| series.contains(p)));
    }
}

#[test]
fn lttb_keeps_x_order() {
    let series = noisy_series(9, 5000, 0.001);
    let reduced = lttb_reduce(&series, 100).unwrap();
    assert!(reduced.iter().tuple_windows().all(|(a, b)| a.x < b.x));
}

#[test]
fn minmax_keeps_global_extremes() {
    let series = noisy_series(10, 10_000, 0.001);
    let reduced = minmax_reduce(&series, 20).unwrap();

    let max = |s: &[Point]| s.iter().map(|p| p.y).fold(f64::MIN, f64::max);
    let min = |s: &[Point]| s.iter().map(|p| p.y).fold(f64::MAX, f64::min);
    assert_eq!(max(&reduced), max(&series));
    assert_eq!(min(&reduced), min(&series));
}
