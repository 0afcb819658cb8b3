// This is free and unencumbered software released into the public domain.

use crate::shared::{CameraError, Size};
use serde::Deserialize;

/// Clockwise rotation applied to the camera image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, derive_more::Display)]
#[serde(try_from = "u16")]
pub enum Rotation {
    #[default]
    #[display("0")]
    None,
    #[display("90")]
    Cw90,
    #[display("180")]
    Cw180,
    #[display("270")]
    Cw270,
}

impl Rotation {
    pub const fn degrees(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Cw90 => 90,
            Self::Cw180 => 180,
            Self::Cw270 => 270,
        }
    }

    /// True for the quarter turns that swap width and height.
    pub const fn is_transposing(self) -> bool {
        matches!(self, Self::Cw90 | Self::Cw270)
    }

    pub const fn apply(self, size: Size) -> Size {
        if self.is_transposing() {
            size.transposed()
        } else {
            size
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = CameraError;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 | 360 => Ok(Self::None),
            90 => Ok(Self::Cw90),
            180 => Ok(Self::Cw180),
            270 => Ok(Self::Cw270),
            other => Err(CameraError::invalid_config(format!(
                "rotation must be 0, 90, 180 or 270 degrees, got {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Transform {
    pub hflip: bool,
    pub vflip: bool,
}

impl Transform {
    pub const fn new(hflip: bool, vflip: bool) -> Self {
        Self { hflip, vflip }
    }

    pub const fn hflip(flip: bool) -> Self {
        Self::new(flip, false)
    }

    pub const fn is_identity(&self) -> bool {
        !self.hflip && !self.vflip
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum StreamMode {
    #[display("preview")]
    Preview,
    #[display("still")]
    Still,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum StillFormat {
    #[default]
    #[display("jpeg")]
    Jpeg,
    #[display("png")]
    Png,
}

impl StillFormat {
    pub const fn image_format(self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// Device configuration for one stream mode.
///
/// Built once from the requested resolution and orientation. A flip change
/// produces a new value through [`StreamConfig::with_transform`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    mode: StreamMode,
    size: Size,
    transform: Transform,
}

impl StreamConfig {
    pub const fn preview(size: Size, transform: Transform) -> Self {
        Self {
            mode: StreamMode::Preview,
            size,
            transform,
        }
    }

    pub const fn still(size: Size, transform: Transform) -> Self {
        Self {
            mode: StreamMode::Still,
            size,
            transform,
        }
    }

    pub const fn mode(&self) -> StreamMode {
        self.mode
    }

    pub const fn size(&self) -> Size {
        self.size
    }

    pub const fn transform(&self) -> Transform {
        self.transform
    }

    #[must_use]
    pub const fn with_transform(self, transform: Transform) -> Self {
        Self { transform, ..self }
    }
}
