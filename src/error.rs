/// Convenience result type used across uvraster.
pub type RenderResult<T> = Result<T, RenderError>;

/// Error taxonomy of the rasterization pipeline.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// Malformed topology or geometry asset, detected at construction time.
    #[error("invalid topology: {0}")]
    Topology(String),

    /// Buffers handed to a call disagree in shape.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Only square output resolutions are supported.
    #[error("unsupported resolution {height}x{width}: output must be square")]
    NonSquare { height: usize, width: usize },

    /// Geometry asset could not be parsed.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Render settings could not be read.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl RenderError {
    /// Build a [`RenderError::Topology`] value.
    pub fn topology(msg: impl Into<String>) -> Self {
        Self::Topology(msg.into())
    }

    /// Build a [`RenderError::ShapeMismatch`] value.
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    /// Build a [`RenderError::Parse`] value.
    pub fn parse(line: usize, msg: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: msg.into(),
        }
    }

    /// Build a [`RenderError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
