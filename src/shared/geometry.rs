// This is free and unencumbered software released into the public domain.

use serde::Deserialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, derive_more::Display)]
#[display("{width}x{height}")]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn transposed(self) -> Self {
        Self::new(self.height, self.width)
    }

    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Largest size with this size's aspect ratio that fits inside `bounds`.
    pub fn fit_inside(self, bounds: Size) -> Size {
        if self.is_empty() || bounds.is_empty() {
            return Size::default();
        }
        let (w, h) = (self.width as u64, self.height as u64);
        let (bw, bh) = (bounds.width as u64, bounds.height as u64);
        // Compare w/h against bw/bh without floats.
        if w * bh >= bw * h {
            Size::new(bounds.width, ((h * bw) / w).max(1) as u32)
        } else {
            Size::new(((w * bh) / h).max(1) as u32, bounds.height)
        }
    }

    /// Rounds each dimension up to the next multiple of the given block.
    pub const fn align_up(self, block_width: u32, block_height: u32) -> Size {
        Size::new(
            self.width.div_ceil(block_width) * block_width,
            self.height.div_ceil(block_height) * block_height,
        )
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, derive_more::Display)]
#[display("{width}x{height}+{x}+{y}")]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub const fn center(&self) -> (i32, i32) {
        (
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }

    /// A rect of `size` sharing this rect's center.
    pub fn centered(&self, size: Size) -> Rect {
        let (cx, cy) = self.center();
        Rect::new(
            cx - (size.width / 2) as i32,
            cy - (size.height / 2) as i32,
            size.width,
            size.height,
        )
    }

    /// Shrinks the rect by `border` on every side, saturating at zero.
    pub fn inset(&self, border: u32) -> Rect {
        Rect::new(
            self.x + border as i32,
            self.y + border as i32,
            self.width.saturating_sub(border.saturating_mul(2)),
            self.height.saturating_sub(border.saturating_mul(2)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_inside_keeps_aspect_ratio() {
        let res = Size::new(1920, 1080);
        assert_eq!(res.fit_inside(Size::new(800, 800)), Size::new(800, 450));
        assert_eq!(res.fit_inside(Size::new(1600, 450)), Size::new(800, 450));
    }

    #[test]
    fn align_up_rounds_to_blocks() {
        assert_eq!(Size::new(700, 394).align_up(32, 16), Size::new(704, 400));
        assert_eq!(Size::new(704, 400).align_up(32, 16), Size::new(704, 400));
    }

    #[test]
    fn centered_shares_center() {
        let r = Rect::new(0, 0, 800, 480);
        assert_eq!(r.centered(Size::new(400, 240)), Rect::new(200, 120, 400, 240));
        assert_eq!(r.inset(50), Rect::new(50, 50, 700, 380));
    }
}
