use image::Rgba;

use crate::util::Vec3;

/// Largest 24-bit value; encoded depth 1.0 maps here.
pub const DEPTH_SCALE: f32 = 16_777_215.0;

/// Clear color of depth targets: decodes to depth 1.0.
pub const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Pack depth in [0, 1] into 24 bits over R (high), G, B (low).
pub fn encode_depth(depth: f32) -> Rgba<u8> {
    let v = (depth.clamp(0.0, 1.0) * DEPTH_SCALE).round() as u32;
    Rgba([(v >> 16) as u8, (v >> 8) as u8, v as u8, 255])
}

pub fn decode_depth(texel: Rgba<u8>) -> f32 {
    let [r, g, b, _] = texel.0;
    let v = (r as u32) << 16 | (g as u32) << 8 | b as u32;
    v as f32 / DEPTH_SCALE
}

/// Depth at or beyond the far plane means nothing was drawn.
pub fn is_background(depth: f32) -> bool {
    depth >= 1.0
}

/// Unit vector as `n * 0.5 + 0.5`.
pub fn encode_unit_vector(n: Vec3) -> Rgba<u8> {
    encode_color(n * 0.5 + Vec3::splat(0.5))
}

pub fn decode_unit_vector(texel: Rgba<u8>) -> Vec3 {
    decode_color(texel) * 2.0 - Vec3::ONE
}

pub fn encode_color(c: Vec3) -> Rgba<u8> {
    let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgba([q(c.x), q(c.y), q(c.z), 255])
}

pub fn decode_color(texel: Rgba<u8>) -> Vec3 {
    let [r, g, b, _] = texel.0;
    Vec3::new(r as f32, g as f32, b as f32) / 255.0
}

/// World position in `[-extent, extent]³` mapped to [0, 1].
pub fn encode_position(p: Vec3, extent: f32) -> Rgba<u8> {
    encode_color(p / (2.0 * extent) + Vec3::splat(0.5))
}

pub fn decode_position(texel: Rgba<u8>, extent: f32) -> Vec3 {
    (decode_color(texel) - Vec3::splat(0.5)) * (2.0 * extent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_precision() {
        for d in [0.0f32, 0.1234567, 0.5, 0.999, 1.0] {
            assert!((decode_depth(encode_depth(d)) - d).abs() < 1e-6);
        }
        assert_eq!(decode_depth(BACKGROUND), 1.0);
        assert!(is_background(decode_depth(BACKGROUND)));
        assert!(!is_background(decode_depth(encode_depth(0.99))));
    }

    #[test]
    fn test_depth_clamps_out_of_range() {
        assert_eq!(encode_depth(-0.5), encode_depth(0.0));
        assert_eq!(encode_depth(3.0), BACKGROUND);
    }

    #[test]
    fn test_unit_vector_encoding() {
        let n = decode_unit_vector(encode_unit_vector(Vec3::new(0.0, 1.0, 0.0)));
        assert!((n - Vec3::Y).length() < 0.01);
        let m = decode_unit_vector(encode_unit_vector(Vec3::new(-1.0, 0.0, 0.0)));
        assert!((m + Vec3::X).length() < 0.01);
    }

    #[test]
    fn test_position_quantization_bound() {
        let extent = 16.0;
        let p = Vec3::new(3.3, -7.1, 12.0);
        let q = decode_position(encode_position(p, extent), extent);
        // Half a quantization step per axis
        assert!((q - p).abs().max_element() <= extent / 255.0 + 1e-4);
    }
}
