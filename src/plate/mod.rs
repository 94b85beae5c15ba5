//! Plate text path: region extraction, pattern normalization and debouncing.

mod debounce;
mod extract;
mod pattern;

pub use debounce::EventDebouncer;
pub use extract::{PlateExtractor, PreparedPlate, UPSCALE_FACTOR};
pub use pattern::PatternMatcher;
