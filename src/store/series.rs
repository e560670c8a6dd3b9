use arrow::{
    array::{Array, Float64Array, TimestampSecondArray},
    record_batch::RecordBatch,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::ops::Range;

use super::schema::{build_candle_batch, column, timestamp_key};
use crate::{error::Error, technical_analysis::Candle};

/// Immutable candle series held as Arrow columns.
///
/// Timestamps are strictly increasing, which is checked when the series is
/// built, so range bounds can be resolved by binary search.
#[derive(Clone, Debug)]
pub struct Series {
    timestamps: TimestampSecondArray,
    open: Float64Array,
    high: Float64Array,
    low: Float64Array,
    close: Float64Array,
    volume: Float64Array,
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T, Error> {
    batch
        .column_by_name(name)
        .and_then(|array| array.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::StoreUnavailable(format!("Missing or invalid column {:?}", name)))
}

fn to_datetime(seconds: i64) -> Option<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp(seconds, 0).map(|dt| dt.naive_utc())
}

impl TryFrom<RecordBatch> for Series {
    type Error = Error;

    fn try_from(batch: RecordBatch) -> Result<Self, Self::Error> {
        let timestamps = column::<TimestampSecondArray>(&batch, column::TIMESTAMP)?.clone();

        if timestamps.null_count() > 0 {
            return Err(Error::StoreUnavailable("Null timestamp in store".to_string()));
        }

        let values: &[i64] = timestamps.values();
        if let Some(position) = values.windows(2).position(|pair| pair[0] >= pair[1]) {
            return Err(Error::StoreUnavailable(format!(
                "Timestamps are not strictly increasing at row {}",
                position + 1
            )));
        }
        if let Some(invalid) = values.iter().find(|&&seconds| to_datetime(seconds).is_none()) {
            return Err(Error::StoreUnavailable(format!(
                "Timestamp {} is out of range",
                invalid
            )));
        }

        Ok(Self {
            timestamps,
            open: column::<Float64Array>(&batch, column::OPEN)?.clone(),
            high: column::<Float64Array>(&batch, column::HIGH)?.clone(),
            low: column::<Float64Array>(&batch, column::LOW)?.clone(),
            close: column::<Float64Array>(&batch, column::CLOSE)?.clone(),
            volume: column::<Float64Array>(&batch, column::VOLUME)?.clone(),
        })
    }
}

impl Series {
    /// Build a series from candles already sorted by timestamp
    pub fn try_from_candles(candles: &[Candle]) -> Result<Self, Error> {
        Self::try_from(build_candle_batch(candles)?)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    fn timestamp(&self, index: usize) -> NaiveDateTime {
        // every value was checked when the series was built
        to_datetime(self.timestamps.value(index)).unwrap_or_default()
    }

    pub fn candle(&self, index: usize) -> Option<Candle> {
        if index >= self.len() {
            return None;
        }

        Some(Candle::new(
            self.timestamp(index),
            self.open.value(index),
            self.high.value(index),
            self.low.value(index),
            self.close.value(index),
            self.volume.value(index),
        ))
    }

    pub fn iter(&self) -> impl Iterator<Item = Candle> + '_ {
        (0..self.len()).filter_map(move |index| self.candle(index))
    }

    /// Candles in ascending order, restricted to the last `limit` ones if given
    pub fn scan(&self, limit: Option<usize>) -> Vec<Candle> {
        let skip = limit.map_or(0, |limit| self.len().saturating_sub(limit));
        self.iter().skip(skip).collect()
    }

    /// Row indices of the candles within the inclusive `[start, end]` window.
    ///
    /// A missing bound leaves that side of the window open.
    pub fn bounds(&self, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Range<usize> {
        let values: &[i64] = self.timestamps.values();

        let from = start
            .map(|start| {
                let key = timestamp_key(&start);
                values.partition_point(|&seconds| seconds < key)
            })
            .unwrap_or(0);
        let to = end
            .map(|end| {
                let key = timestamp_key(&end);
                values.partition_point(|&seconds| seconds <= key)
            })
            .unwrap_or(values.len());

        from..to.max(from)
    }

    pub fn lows(&self, range: Range<usize>) -> Float64Array {
        self.low.slice(range.start, range.len())
    }

    pub fn highs(&self, range: Range<usize>) -> Float64Array {
        self.high.slice(range.start, range.len())
    }
}
