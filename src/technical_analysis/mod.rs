mod candle;
mod fibonacci;
mod indicator;
mod range;

pub use candle::{Candle, CandleRecord};
pub use fibonacci::{levels, FibLevel, FibResult};
pub use indicator::{compute_all, IndicatorRow};
pub use range::range_extrema;
