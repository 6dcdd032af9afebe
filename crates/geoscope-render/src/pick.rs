//! Pick color encoding.
//!
//! During a pick pass every pickable element is drawn in a flat color that
//! encodes a global index. Reading the pixel under the cursor and decoding it
//! recovers which element was hit. Index 0 is reserved for the background.

use glam::Vec3;

/// Largest encodable index (24 bits).
pub const MAX_PICK_INDEX: u32 = 0x00FF_FFFF;

/// Encodes an index as an RGB color with 8 bits per channel.
pub fn index_to_color(index: u32) -> Vec3 {
    let index = index.min(MAX_PICK_INDEX);
    let channel = |shift: u32| ((index >> shift) & 0xFF) as f32 / 255.0;
    Vec3::new(channel(16), channel(8), channel(0))
}

/// Decodes a color produced by [`index_to_color`].
pub fn color_to_index(color: Vec3) -> u32 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
    (channel(color.x) << 16) | (channel(color.y) << 8) | channel(color.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that encoding survives decoding across the range.
    #[test]
    fn test_pick_color_round_trip() {
        for index in [0, 1, 255, 256, 65_535, 1_234_567, MAX_PICK_INDEX] {
            assert_eq!(color_to_index(index_to_color(index)), index);
        }
    }

    /// Test that out-of-range indices saturate.
    #[test]
    fn test_pick_color_saturates() {
        assert_eq!(color_to_index(index_to_color(u32::MAX)), MAX_PICK_INDEX);
    }
}
