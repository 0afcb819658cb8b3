// This is free and unencumbered software released into the public domain.

use std::str::FromStr;

/// Effect names a host may request on capture.
///
/// None of them is applied to the captured image yet; they are recognized so
/// that a known-but-unimplemented effect can be told apart from a typo.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ImageEffect {
    #[display("none")]
    None,
    #[display("blur")]
    Blur,
    #[display("contour")]
    Contour,
    #[display("detail")]
    Detail,
    #[display("edge_enhance")]
    EdgeEnhance,
    #[display("edge_enhance_more")]
    EdgeEnhanceMore,
    #[display("emboss")]
    Emboss,
    #[display("find_edges")]
    FindEdges,
    #[display("smooth")]
    Smooth,
    #[display("smooth_more")]
    SmoothMore,
    #[display("sharpen")]
    Sharpen,
}

impl ImageEffect {
    pub const ALL: [ImageEffect; 11] = [
        Self::None,
        Self::Blur,
        Self::Contour,
        Self::Detail,
        Self::EdgeEnhance,
        Self::EdgeEnhanceMore,
        Self::Emboss,
        Self::FindEdges,
        Self::Smooth,
        Self::SmoothMore,
        Self::Sharpen,
    ];
}

#[derive(Clone, Debug, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("{_0:?} not in capture effects")]
pub struct UnknownEffect(#[error(not(source))] pub String);

impl FromStr for ImageEffect {
    type Err = UnknownEffect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|effect| effect.to_string() == name)
            .ok_or(UnknownEffect(name))
    }
}
