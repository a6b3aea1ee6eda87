//! Temporal gap-filling
//!
//! Missing values (NaN) are filled per pixel along the time axis by carrying
//! the nearest valid observation. Filling runs first inside each time split
//! on that split's data only, then once more over the concatenated series to
//! close gaps at split boundaries.

use chrono::{Datelike, NaiveDate};
use ndarray::{ArrayViewMut1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use lcfuse_core::{Error, Result, TimeSeries};

/// Direction order of the two fill passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillOrder {
    /// Carry earlier values forward, then later values backward
    #[default]
    ForwardThenBackward,
    /// Carry later values backward, then earlier values forward
    BackwardThenForward,
}

fn ffill_lane(mut lane: ArrayViewMut1<'_, f64>) {
    let mut last = f64::NAN;
    for v in lane.iter_mut() {
        if v.is_nan() {
            *v = last;
        } else {
            last = *v;
        }
    }
}

fn bfill_lane(mut lane: ArrayViewMut1<'_, f64>) {
    let mut next = f64::NAN;
    for v in lane.iter_mut().rev() {
        if v.is_nan() {
            *v = next;
        } else {
            next = *v;
        }
    }
}

fn fill_in_place(series: &mut TimeSeries, order: FillOrder) {
    let data = series.data_mut();
    for lane in data.lanes_mut(Axis(0)) {
        let mut lane = lane;
        match order {
            FillOrder::ForwardThenBackward => {
                ffill_lane(lane.view_mut());
                bfill_lane(lane);
            }
            FillOrder::BackwardThenForward => {
                bfill_lane(lane.view_mut());
                ffill_lane(lane);
            }
        }
    }
}

/// Carry the last valid value forward in time, per pixel
pub fn forward_fill(series: &TimeSeries) -> TimeSeries {
    let mut out = series.clone();
    for lane in out.data_mut().lanes_mut(Axis(0)) {
        ffill_lane(lane);
    }
    out
}

/// Carry the next valid value backward in time, per pixel
pub fn backward_fill(series: &TimeSeries) -> TimeSeries {
    let mut out = series.clone();
    for lane in out.data_mut().lanes_mut(Axis(0)) {
        bfill_lane(lane);
    }
    out
}

/// Fill gaps split by split, then across the merged series.
///
/// The output time axis is the concatenation of `splits` in the order given.
/// An empty `splits` fills the whole series in place. A date listed in a split
/// selects every time step carrying it, so repeated dates stay together.
/// Pixels with no valid value anywhere stay NaN.
///
/// # Errors
/// `InvalidParameter` when a split date is not in the series or appears in
/// more than one split.
pub fn fill_gaps(series: &TimeSeries, splits: &[Vec<NaiveDate>], order: FillOrder) -> Result<TimeSeries> {
    let before = series.missing_count();
    if splits.is_empty() {
        let mut whole = series.clone();
        fill_in_place(&mut whole, order);
        tracing::info!("gap-filled {} missing value(s), {} remain", before, whole.missing_count());
        return Ok(whole);
    }

    let mut owner: HashMap<NaiveDate, usize> = HashMap::new();
    let mut parts = Vec::with_capacity(splits.len());
    for (i, split) in splits.iter().enumerate() {
        let mut dates = Vec::with_capacity(split.len());
        for date in split {
            match owner.insert(*date, i) {
                Some(j) if j != i => {
                    return Err(Error::InvalidParameter {
                        name: "time_splits",
                        value: date.to_string(),
                        reason: "date appears in more than one split".into(),
                    })
                }
                Some(_) => {}
                None => dates.push(*date),
            }
        }
        if dates.is_empty() {
            continue;
        }
        let mut part = series.select_times(&dates)?;
        fill_in_place(&mut part, order);
        parts.push(part);
    }

    let mut merged = TimeSeries::concat(&parts)?;
    fill_in_place(&mut merged, order);

    tracing::info!(
        splits = parts.len(),
        "gap-filled {} missing value(s), {} remain",
        before,
        merged.missing_count()
    );
    Ok(merged)
}

/// Group dates by calendar month, keeping time order
pub fn split_by_month(times: &[NaiveDate]) -> Vec<Vec<NaiveDate>> {
    let mut sorted = times.to_vec();
    sorted.sort();
    let mut groups: Vec<Vec<NaiveDate>> = Vec::new();
    for date in sorted {
        match groups.last_mut() {
            Some(group) if same_month(group[0], date) => group.push(date),
            _ => groups.push(vec![date]),
        }
    }
    groups
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

/// Group dates by inclusive `(start, end)` ranges, in range order.
///
/// Dates outside every range are left out; empty groups are dropped.
pub fn split_by_ranges(times: &[NaiveDate], ranges: &[(NaiveDate, NaiveDate)]) -> Vec<Vec<NaiveDate>> {
    ranges
        .iter()
        .map(|&(start, end)| {
            let mut group: Vec<NaiveDate> = times
                .iter()
                .copied()
                .filter(|d| *d >= start && *d <= end)
                .collect();
            group.sort();
            group
        })
        .filter(|g| !g.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lcfuse_core::GeoTransform;
    use ndarray::Array3;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, d).unwrap()
    }

    /// One-pixel series from a list of values
    fn series(values: &[f64]) -> TimeSeries {
        let data = Array3::from_shape_vec((values.len(), 1, 1), values.to_vec()).unwrap();
        let times = (1..=values.len() as u32).map(day).collect();
        TimeSeries::new(data, times, GeoTransform::default(), None).unwrap()
    }

    fn values(ts: &TimeSeries) -> Vec<f64> {
        ts.pixel(0, 0).to_vec()
    }

    #[test]
    fn test_forward_and_backward() {
        let ts = series(&[f64::NAN, 1.0, f64::NAN, 3.0, f64::NAN]);
        let f = values(&forward_fill(&ts));
        assert!(f[0].is_nan());
        assert_eq!(&f[1..], &[1.0, 1.0, 3.0, 3.0]);

        let b = values(&backward_fill(&ts));
        assert_eq!(&b[..4], &[1.0, 1.0, 3.0, 3.0]);
        assert!(b[4].is_nan());
    }

    #[test]
    fn test_fill_order_matters_in_the_middle() {
        let ts = series(&[1.0, f64::NAN, 3.0]);
        let fwd = fill_gaps(&ts, &[], FillOrder::ForwardThenBackward).unwrap();
        let bwd = fill_gaps(&ts, &[], FillOrder::BackwardThenForward).unwrap();
        assert_eq!(values(&fwd), vec![1.0, 1.0, 3.0]);
        assert_eq!(values(&bwd), vec![1.0, 3.0, 3.0]);
    }

    #[test]
    fn test_splits_do_not_leak_in_first_pass() {
        // split A = days 1..=2 has no data at day 2; split B starts with a spike at day 3
        let ts = series(&[1.0, f64::NAN, 100.0, 5.0]);
        let splits = vec![vec![day(1), day(2)], vec![day(3), day(4)]];
        let out = fill_gaps(&ts, &splits, FillOrder::BackwardThenForward).unwrap();
        // backward fill inside A cannot see the spike, forward fill then carries 1.0
        assert_eq!(values(&out), vec![1.0, 1.0, 100.0, 5.0]);
    }

    #[test]
    fn test_boundary_gap_closed_by_second_pass() {
        let ts = series(&[f64::NAN, f64::NAN, 2.0, f64::NAN]);
        let splits = vec![vec![day(1), day(2)], vec![day(3), day(4)]];
        let out = fill_gaps(&ts, &splits, FillOrder::ForwardThenBackward).unwrap();
        assert_eq!(values(&out), vec![2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_output_axis_is_split_concatenation() {
        let ts = series(&[1.0, 2.0, 3.0, 4.0]);
        let splits = vec![vec![day(3), day(4)], vec![day(1)]];
        let out = fill_gaps(&ts, &splits, FillOrder::default()).unwrap();
        assert_eq!(out.times(), &[day(3), day(4), day(1)]);
        assert_eq!(values(&out), vec![3.0, 4.0, 1.0]);
    }

    #[test]
    fn test_all_missing_pixel_stays_nan() {
        let ts = series(&[f64::NAN, f64::NAN]);
        let out = fill_gaps(&ts, &[], FillOrder::default()).unwrap();
        assert!(values(&out).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_idempotent() {
        let ts = series(&[f64::NAN, 1.0, f64::NAN, 4.0]);
        let once = fill_gaps(&ts, &[], FillOrder::default()).unwrap();
        let twice = fill_gaps(&once, &[], FillOrder::default()).unwrap();
        assert_eq!(values(&once), values(&twice));
    }

    #[test]
    fn test_invalid_splits() {
        let ts = series(&[1.0, 2.0]);
        let unknown = vec![vec![day(9)]];
        assert!(matches!(
            fill_gaps(&ts, &unknown, FillOrder::default()),
            Err(Error::InvalidParameter { .. })
        ));
        let overlap = vec![vec![day(1), day(2)], vec![day(2)]];
        assert!(matches!(
            fill_gaps(&ts, &overlap, FillOrder::default()),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_repeated_dates_fill_without_splits() {
        let data = Array3::from_shape_vec((3, 1, 1), vec![f64::NAN, 2.0, f64::NAN]).unwrap();
        let times = vec![day(1), day(1), day(2)];
        let ts = TimeSeries::new(data, times.clone(), GeoTransform::default(), None).unwrap();

        let out = fill_gaps(&ts, &[], FillOrder::default()).unwrap();
        assert_eq!(out.times(), &times[..]);
        assert_eq!(values(&out), vec![2.0, 2.0, 2.0]);

        // a range split lists the repeated date twice
        let split = split_by_ranges(&times, &[(day(1), day(2))]);
        let out = fill_gaps(&ts, &split, FillOrder::default()).unwrap();
        assert_eq!(out.times(), &times[..]);
        assert_eq!(values(&out), vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_split_helpers() {
        let times = vec![
            NaiveDate::from_ymd_opt(2023, 2, 3).unwrap(),
            day(5),
            day(20),
            NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
        ];
        let by_month = split_by_month(&times);
        assert_eq!(by_month.len(), 3);
        assert_eq!(by_month[0], vec![day(5), day(20)]);

        let ranges = [(day(1), day(10)), (day(11), NaiveDate::from_ymd_opt(2023, 2, 28).unwrap())];
        let groups = split_by_ranges(&times, &ranges);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].len(), 2);
    }
}
