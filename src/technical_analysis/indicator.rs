//! Moving averages and momentum computed in a single forward pass
//!
//! Every value at index `i` only depends on candles `0..=i`.

use chrono::NaiveDateTime;
use yata::{
    core::{Method, PeriodType, ValueType, Window, OHLCV},
    methods::EMA,
};

use super::candle::Candle;
use crate::error::Error;

pub const INDICATOR_PERIOD: PeriodType = 14;

/// Neutral momentum when prices did not move over the window
pub const RSI_FLAT: ValueType = 50.0;
pub const RSI_MAX: ValueType = 100.0;

/// Indicator values aligned with one candle.
///
/// `None` marks the warm-up period of windowed indicators.
#[derive(Clone, Debug, PartialEq)]
pub struct IndicatorRow {
    pub timestamp: NaiveDateTime,
    pub sma_14: Option<ValueType>,
    pub ema_14: ValueType,
    pub rsi_14: Option<ValueType>,
}

/// Relative strength index with Wilder smoothing.
///
/// The averages are seeded with the plain mean of the first `period - 1`
/// deltas, so the first value is available once `period` closes were seen.
#[derive(Clone, Debug)]
pub struct RelativeStrength {
    period: usize,
    previous_close: Option<ValueType>,
    deltas: usize,
    avg_gain: ValueType,
    avg_loss: ValueType,
}

impl RelativeStrength {
    pub fn try_new(period: PeriodType) -> Result<Self, Error> {
        if period < 2 {
            return Err(Error::Config(format!("RSI period {} is too short", period)));
        }

        Ok(Self {
            period: period as usize,
            previous_close: None,
            deltas: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
        })
    }

    pub fn next(&mut self, close: ValueType) -> Option<ValueType> {
        let previous = self.previous_close.replace(close)?;

        let delta = close - previous;
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        self.deltas += 1;

        let seed = self.period - 1;
        if self.deltas <= seed {
            // accumulate sums, divided once the seed window is complete
            self.avg_gain += gain;
            self.avg_loss += loss;

            if self.deltas < seed {
                return None;
            }

            self.avg_gain /= seed as ValueType;
            self.avg_loss /= seed as ValueType;
        } else {
            let smoothing = seed as ValueType;
            let period = self.period as ValueType;
            self.avg_gain = (self.avg_gain * smoothing + gain) / period;
            self.avg_loss = (self.avg_loss * smoothing + loss) / period;
        }

        Some(relative_strength_index(self.avg_gain, self.avg_loss))
    }
}

fn relative_strength_index(avg_gain: ValueType, avg_loss: ValueType) -> ValueType {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            RSI_FLAT
        } else {
            RSI_MAX
        }
    } else {
        RSI_MAX - RSI_MAX / (1.0 + avg_gain / avg_loss)
    }
}

/// Arithmetic mean of the last `period` closes.
///
/// The window is summed again at every step, no running sum is carried over.
#[derive(Clone, Debug)]
pub struct WindowMean {
    window: Window<ValueType>,
}

impl WindowMean {
    pub fn new(period: PeriodType, first: ValueType) -> Self {
        Self {
            window: Window::new(period, first),
        }
    }

    pub fn next(&mut self, close: ValueType) -> ValueType {
        self.window.push(close);

        // deviations from the latest close keep a flat window exact
        let deviation: ValueType = self.window.iter().map(|value| value - close).sum();
        close + deviation / self.window.len() as ValueType
    }
}

/// Streaming state of the SMA, EMA and RSI over one series
pub struct IndicatorEngine {
    sma: WindowMean,
    ema: EMA,
    rsi: RelativeStrength,
    seen: usize,
}

impl IndicatorEngine {
    /// Methods are initialised with the first close, as yata expects.
    pub fn try_new(first: &Candle) -> Result<Self, Error> {
        Ok(Self {
            sma: WindowMean::new(INDICATOR_PERIOD, first.close()),
            ema: EMA::new(INDICATOR_PERIOD, &first.close())?,
            rsi: RelativeStrength::try_new(INDICATOR_PERIOD)?,
            seen: 0,
        })
    }

    pub fn next(&mut self, candle: &Candle) -> IndicatorRow {
        let close = candle.close();
        self.seen += 1;

        let sma = self.sma.next(close);
        let ema = self.ema.next(&close);
        let rsi = self.rsi.next(close);

        IndicatorRow {
            timestamp: candle.timestamp(),
            sma_14: (self.seen >= INDICATOR_PERIOD as usize).then_some(sma),
            ema_14: ema,
            rsi_14: rsi,
        }
    }
}

/// Compute one [`IndicatorRow`] per candle, in the input order.
pub fn compute_all<I>(candles: I) -> Result<Vec<IndicatorRow>, Error>
where
    I: IntoIterator<Item = Candle>,
{
    let mut candles = candles.into_iter().peekable();

    let mut engine = match candles.peek() {
        Some(first) => IndicatorEngine::try_new(first)?,
        None => return Ok(vec![]),
    };

    Ok(candles.map(|candle| engine.next(&candle)).collect())
}
