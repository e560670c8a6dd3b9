use arrow::{
    array::{Array, Float64Array, TimestampSecondArray},
    datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit},
    record_batch::RecordBatch,
};
use chrono::NaiveDateTime;
use std::sync::Arc;
use yata::core::OHLCV;

use crate::{error::Error, technical_analysis::Candle};

pub mod column {
    pub const TIMESTAMP: &str = "timestamp";
    pub const OPEN: &str = "open";
    pub const HIGH: &str = "high";
    pub const LOW: &str = "low";
    pub const CLOSE: &str = "close";
    pub const VOLUME: &str = "volume";
}

lazy_static! {
    pub static ref CANDLE_SCHEMA: SchemaRef = {
        let price = |name: &str| Field::new(name, DataType::Float64, false);

        Arc::new(Schema::new(vec![
            Field::new(
                column::TIMESTAMP,
                DataType::Timestamp(TimeUnit::Second, None),
                false,
            ),
            price(column::OPEN),
            price(column::HIGH),
            price(column::LOW),
            price(column::CLOSE),
            price(column::VOLUME),
        ]))
    };
}

/// Seconds since epoch, the resolution of the stored timestamps
pub fn timestamp_key(timestamp: &NaiveDateTime) -> i64 {
    timestamp.and_utc().timestamp()
}

pub fn build_candle_batch(chunk: &[Candle]) -> Result<RecordBatch, Error> {
    let mut timestamps: Vec<i64> = Vec::with_capacity(chunk.len());
    let mut opens = Vec::with_capacity(chunk.len());
    let mut highs = Vec::with_capacity(chunk.len());
    let mut lows = Vec::with_capacity(chunk.len());
    let mut closes = Vec::with_capacity(chunk.len());
    let mut volumes = Vec::with_capacity(chunk.len());

    for candle in chunk.iter() {
        timestamps.push(timestamp_key(&candle.timestamp()));
        opens.push(candle.open());
        highs.push(candle.high());
        lows.push(candle.low());
        closes.push(candle.close());
        volumes.push(candle.volume());
    }

    let arrow_array: Vec<Arc<dyn Array>> = vec![
        Arc::new(TimestampSecondArray::from(timestamps)),
        Arc::new(Float64Array::from(opens)),
        Arc::new(Float64Array::from(highs)),
        Arc::new(Float64Array::from(lows)),
        Arc::new(Float64Array::from(closes)),
        Arc::new(Float64Array::from(volumes)),
    ];

    Ok(RecordBatch::try_new(CANDLE_SCHEMA.clone(), arrow_array)?)
}
