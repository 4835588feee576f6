// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use image::Rgba;

/// Opaque RGB color for overlay draw calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    /// Red color.
    pub const RED: Self = Self::from_hex(0xff0000);
    /// Green color.
    pub const GREEN: Self = Self::from_hex(0x00ff00);
    /// Blue color.
    pub const BLUE: Self = Self::from_hex(0x0000ff);

    /// Unpack `0xRRGGBB`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_hex(hex: u32) -> Self {
        Self((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    /// Box color for the `index`-th pose in a frame.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self::from_hex(BOX_PALETTE[index % BOX_PALETTE.len()])
    }

    /// Keypoint/limb color by palette slot.
    #[must_use]
    pub const fn from_pose_index(index: usize) -> Self {
        Self::from_hex(POSE_PALETTE[index % POSE_PALETTE.len()])
    }

    /// CSS color string for 2D canvas contexts.
    #[must_use]
    pub fn to_css(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    /// Opaque pixel for raster canvases.
    #[must_use]
    pub const fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.0, self.1, self.2, 255])
    }
}

/// Bounding box colors, cycled per pose.
const BOX_PALETTE: [u32; 20] = [
    0x042aff, 0x0bdbeb, 0xf3f3f3, 0x00dfb7, 0x111f68, 0xff6fdd, 0xff444f, 0xcced00, 0x00f344,
    0xbd00ff, 0x00b4ff, 0xdd00ba, 0x00ffff, 0x26c000, 0x01ffb3, 0x7d24ff, 0x7b0068, 0xff1b6c,
    0xfc6d2f, 0xa2ff0b,
];

/// Keypoint and limb colors, indexed through the skeleton tables.
const POSE_PALETTE: [u32; 20] = [
    0xff8000, 0xff9933, 0xffb266, 0xe6e600, 0xff99ff, 0x99ccff, 0xff66ff, 0xff33ff, 0x66b2ff,
    0x3399ff, 0xff9999, 0xff6666, 0xff3333, 0x99ff99, 0x66ff66, 0x33ff33, 0x00ff00, 0x0000ff,
    0xff0000, 0xffffff,
];

/// Number of pose palette slots.
pub const POSE_PALETTE_LEN: usize = POSE_PALETTE.len();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_wraps() {
        assert_eq!(Color::from_pose_index(0), Color::from_pose_index(POSE_PALETTE_LEN));
        assert_eq!(Color::from_index(1), Color(11, 219, 235));
        assert_eq!(Color::from_pose_index(0), Color(255, 128, 0));
    }

    #[test]
    fn test_css_and_rgba() {
        assert_eq!(Color::RED.to_css(), "#ff0000");
        assert_eq!(Color::from_hex(0x0bdbeb).to_css(), "#0bdbeb");
        assert_eq!(Color::GREEN.to_rgba(), Rgba([0, 255, 0, 255]));
    }
}
