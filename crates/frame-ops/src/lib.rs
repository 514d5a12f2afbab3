//! Frame preprocessing: near-duplicate reduction and width-bounded downscaling.

pub mod scale;
pub mod similarity;

pub use scale::{scale, scaled_dimensions};
pub use similarity::{frame_distance, kept_count, reduce, SAMPLE_GRID};
