//! Container encoders: serialize quantized, timed frames into an artifact.

use fitgif_types::{FitGifError, QuantizedFrame};
use thiserror::Error;

pub mod command;
pub mod gif89a;
pub mod inspect;
pub mod timing;

pub use command::CommandFilter;
pub use gif89a::GifContainer;
pub use inspect::{inspect_gif, GifInspection};
pub use timing::delays_centiseconds;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("GIF encoding failed: {0}")]
    Gif(#[from] gif::EncodingError),

    #[error("GIF decoding failed: {0}")]
    Decode(#[from] gif::DecodingError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to start '{program}': {source}")]
    ToolSpawn {
        program: String,
        source: std::io::Error,
    },

    #[error("'{program}' failed ({status}): {stderr}")]
    ToolFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("encoding aborted")]
    Aborted,
}

impl From<ContainerError> for FitGifError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::Aborted => FitGifError::Cancelled,
            other => FitGifError::EncodeFailed {
                message: other.to_string(),
            },
        }
    }
}

/// Serializes quantized frames into a byte artifact.
///
/// `progress` is called after every frame with `(written, total)`;
/// returning `false` aborts with [`ContainerError::Aborted`].
pub trait ContainerEncoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn encode(
        &self,
        frames: &[QuantizedFrame],
        loop_count: u16,
        progress: &mut dyn FnMut(usize, usize) -> bool,
    ) -> Result<Vec<u8>, ContainerError>;
}
