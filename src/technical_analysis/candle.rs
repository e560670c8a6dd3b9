use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use yata::core::{ValueType, OHLCV};

use crate::utils::serde::naive_datetime_from_string;

/// One row of the source file, before ordering.
///
/// Field names are the lowercase column names of the source.
#[derive(Clone, Debug, Deserialize)]
pub struct CandleRecord {
    #[serde(deserialize_with = "naive_datetime_from_string")]
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl From<CandleRecord> for Candle {
    fn from(record: CandleRecord) -> Self {
        Candle::new(
            record.timestamp,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
        )
    }
}

/// A time bucketed trading period.
///
/// OHLC relations (`low <= open, close <= high`) are not enforced, malformed
/// rows are carried as they are.
#[derive(Clone, Debug, Serialize)]
pub struct Candle {
    timestamp: NaiveDateTime,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl Candle {
    pub fn new(
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

impl OHLCV for Candle {
    #[inline]
    fn open(&self) -> ValueType {
        self.open
    }

    #[inline]
    fn high(&self) -> ValueType {
        self.high
    }

    #[inline]
    fn low(&self) -> ValueType {
        self.low
    }

    #[inline]
    fn close(&self) -> ValueType {
        self.close
    }

    #[inline]
    fn volume(&self) -> ValueType {
        self.volume
    }
}

impl PartialEq for Candle {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
            && self.open.to_bits() == other.open().to_bits()
            && self.high.to_bits() == other.high().to_bits()
            && self.low.to_bits() == other.low().to_bits()
            && self.close.to_bits() == other.close().to_bits()
            && self.volume.to_bits() == other.volume().to_bits()
    }
}

impl Eq for Candle {}
