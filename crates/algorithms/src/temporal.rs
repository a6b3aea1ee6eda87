//! Temporal aggregation of a time series into period means

use chrono::{Datelike, NaiveDate};
use ndarray::{Array3, Axis};
use serde::{Deserialize, Serialize};

use lcfuse_core::{Error, Result, TimeSeries};

/// Aggregation period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Month,
    Quarter,
    Year,
    /// Collapse the whole series into a single step
    #[default]
    All,
}

impl Period {
    /// First day of the period containing `date`; `None` for [`Period::All`]
    fn start_of(self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Period::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
            Period::Quarter => {
                NaiveDate::from_ymd_opt(date.year(), (date.month0() / 3) * 3 + 1, 1)
            }
            Period::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
            Period::All => None,
        }
    }
}

/// NaN-ignoring mean per period.
///
/// Each output step is labelled by the start of its period ([`Period::All`]
/// uses the first date of the series). Cells with no valid value in a period
/// stay NaN.
pub fn aggregate(series: &TimeSeries, period: Period) -> Result<TimeSeries> {
    let times = series.times();
    let Some(&first) = times.first() else {
        return Err(Error::Algorithm("Cannot aggregate an empty time series".into()));
    };

    // (label, indices) in order of first appearance
    let mut groups: Vec<(NaiveDate, Vec<usize>)> = Vec::new();
    for (i, &date) in times.iter().enumerate() {
        let label = period.start_of(date).unwrap_or(first);
        match groups.iter_mut().find(|(l, _)| *l == label) {
            Some((_, idx)) => idx.push(i),
            None => groups.push((label, vec![i])),
        }
    }
    groups.sort_by_key(|(label, _)| *label);

    let (_, rows, cols) = series.shape();
    let mut data = Array3::<f64>::from_elem((groups.len(), rows, cols), f64::NAN);
    for (g, (_, indices)) in groups.iter().enumerate() {
        let mut sum = ndarray::Array2::<f64>::zeros((rows, cols));
        let mut count = ndarray::Array2::<u32>::zeros((rows, cols));
        for &t in indices {
            let layer = series.data().index_axis(Axis(0), t);
            ndarray::Zip::from(&mut sum)
                .and(&mut count)
                .and(&layer)
                .for_each(|s, c, &v| {
                    if !v.is_nan() {
                        *s += v;
                        *c += 1;
                    }
                });
        }
        ndarray::Zip::from(data.index_axis_mut(Axis(0), g))
            .and(&sum)
            .and(&count)
            .for_each(|out, &s, &c| {
                if c > 0 {
                    *out = s / c as f64;
                }
            });
    }

    let labels = groups.iter().map(|(l, _)| *l).collect();
    TimeSeries::new(data, labels, *series.transform(), series.crs().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lcfuse_core::GeoTransform;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, m, d).unwrap()
    }

    fn series(points: &[(NaiveDate, f64)]) -> TimeSeries {
        let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
        let data = Array3::from_shape_vec((values.len(), 1, 1), values).unwrap();
        let times = points.iter().map(|(d, _)| *d).collect();
        TimeSeries::new(data, times, GeoTransform::default(), None).unwrap()
    }

    #[test]
    fn test_monthly_mean_ignores_nan() {
        let ts = series(&[
            (date(1, 5), 1.0),
            (date(1, 20), f64::NAN),
            (date(1, 25), 3.0),
            (date(2, 2), 10.0),
        ]);
        let out = aggregate(&ts, Period::Month).unwrap();
        assert_eq!(out.times(), &[date(1, 1), date(2, 1)]);
        assert_relative_eq!(out.data()[[0, 0, 0]], 2.0);
        assert_relative_eq!(out.data()[[1, 0, 0]], 10.0);
    }

    #[test]
    fn test_quarter_and_all() {
        let ts = series(&[(date(2, 1), 2.0), (date(4, 1), 4.0), (date(5, 1), f64::NAN)]);
        let q = aggregate(&ts, Period::Quarter).unwrap();
        assert_eq!(q.times(), &[date(1, 1), date(4, 1)]);
        assert_relative_eq!(q.data()[[1, 0, 0]], 4.0);

        let all = aggregate(&ts, Period::All).unwrap();
        assert_eq!(all.n_times(), 1);
        assert_eq!(all.times(), &[date(2, 1)]);
        assert_relative_eq!(all.data()[[0, 0, 0]], 3.0);
    }

    #[test]
    fn test_all_missing_period_is_nan() {
        let ts = series(&[(date(1, 1), f64::NAN), (date(3, 1), 1.0)]);
        let out = aggregate(&ts, Period::Month).unwrap();
        assert!(out.data()[[0, 0, 0]].is_nan());
        assert_relative_eq!(out.data()[[1, 0, 0]], 1.0);
    }
}
