use arrow::compute::{max, min};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::{error::Error, store::Series};

/// Lowest low and highest high over a window of candles
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Extrema {
    pub low: f64,
    pub high: f64,
}

/// Aggregate the candles within the inclusive `[start, end]` window.
///
/// Missing bounds extend the window to the first or the last candle.
pub fn range_extrema(
    series: &Series,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
) -> Result<Extrema, Error> {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(Error::EmptyRange(format!(
                "start {} is after end {}",
                start, end
            )));
        }
    }

    let rows = series.bounds(start, end);
    log::debug!("Aggregate rows {:?} over {} candles", rows, series.len());

    match (min(&series.lows(rows.clone())), max(&series.highs(rows))) {
        (Some(low), Some(high)) => Ok(Extrema { low, high }),
        _ => Err(Error::EmptyRange(format!(
            "no candle between {} and {}",
            start.map_or_else(|| "the first candle".to_string(), |s| s.to_string()),
            end.map_or_else(|| "the last candle".to_string(), |e| e.to_string()),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::technical_analysis::Candle;
    use chrono::Duration;
    use rstest::*;

    fn at(minute: i64) -> NaiveDateTime {
        "2024-01-01T00:00:00".parse::<NaiveDateTime>().unwrap() + Duration::minutes(minute)
    }

    #[fixture]
    fn series() -> Series {
        Series::try_from_candles(&[
            Candle::new(at(0), 10.0, 12.0, 9.0, 11.0, 100.0),
            Candle::new(at(1), 11.0, 13.0, 10.0, 12.0, 200.0),
            Candle::new(at(2), 12.0, 11.0, 9.0, 10.0, 300.0),
            Candle::new(at(3), 10.0, 10.5, 8.0, 9.0, 50.0),
        ])
        .unwrap()
    }

    #[rstest]
    #[case::whole(None, None, 8.0, 13.0)]
    #[case::inclusive(Some(0), Some(2), 9.0, 13.0)]
    #[case::single(Some(2), Some(2), 9.0, 11.0)]
    #[case::open_start(None, Some(1), 9.0, 13.0)]
    #[case::open_end(Some(2), None, 8.0, 11.0)]
    #[case::wider(Some(-60), Some(60), 8.0, 13.0)]
    fn test_range_extrema(
        series: Series,
        #[case] start: Option<i64>,
        #[case] end: Option<i64>,
        #[case] low: f64,
        #[case] high: f64,
    ) {
        let extrema = range_extrema(&series, start.map(at), end.map(at)).unwrap();
        assert_eq!(extrema, Extrema { low, high });
    }

    #[rstest]
    #[case::reversed(Some(2), Some(1))]
    #[case::before(Some(-10), Some(-5))]
    #[case::after(Some(10), None)]
    fn test_empty_range(
        series: Series,
        #[case] start: Option<i64>,
        #[case] end: Option<i64>,
    ) {
        assert!(matches!(
            range_extrema(&series, start.map(at), end.map(at)),
            Err(Error::EmptyRange(_))
        ));
    }

    #[rstest]
    fn test_empty_series() {
        let series = Series::try_from_candles(&[]).unwrap();
        assert!(matches!(
            range_extrema(&series, None, None),
            Err(Error::EmptyRange(_))
        ));
    }
}
