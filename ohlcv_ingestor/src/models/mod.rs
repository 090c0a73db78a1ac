pub mod candle;
pub mod date_range;
pub mod timeframe;

pub use candle::{Candle, merge_candles, sort_dedup};
pub use date_range::{DateRange, DateRangeError};
pub use timeframe::{Timeframe, TimeframeError};
