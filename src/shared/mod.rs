// This is free and unencumbered software released into the public domain.

mod adapter;
pub use adapter::*;

mod clock;
pub use clock::*;

mod config;
pub use config::*;

mod device;
pub use device::*;

mod display;
pub use display::*;

pub mod drivers {
    #[cfg(feature = "ffmpeg")]
    pub mod ffmpeg;

    pub mod test_pattern;
}

mod effect;
pub use effect::*;

mod error;
pub use error::*;

mod font;

mod frame;
pub use frame::*;

mod geometry;
pub use geometry::*;

mod open;
pub use open::*;

mod overlay;
pub use overlay::*;

mod preview;
pub(crate) use preview::*;

mod stream;
pub use stream::*;
