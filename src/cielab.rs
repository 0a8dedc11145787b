//! Packed sRGB (RGB24) to CIE L*a*b* conversion.
//!
//! SLIC is usually run in L*a*b* where euclidean distance is closer to perceived color
//! difference. The result is a three band [`Planar<f32>`] for use with
//! [`crate::color::PlanarModel`].
use crate::arrays::Array2D;
use crate::error::SlicError;
use crate::image::Planar;
use rayon::prelude::*;
use tables::{D65_WHITE, RGB_TO_XYZ, SRGB_LINEAR_TBL};

pub(crate) mod tables {
    use static_init::dynamic;

    /// Reference white for D65 illuminant.
    pub const D65_WHITE: [f32; 3] = [0.95047, 1.0, 1.08883];

    #[rustfmt::skip]
    pub const RGB_TO_XYZ: [f32; 9] = [
        0.412_456_4, 0.357_576_1, 0.180_437_5,
        0.212_672_9, 0.715_152_2, 0.072_175_0,
        0.019_333_9, 0.119_192_0, 0.950_304_1,
    ];

    #[dynamic(lazy)]
    pub static SRGB_LINEAR_TBL: [f32; 256] =
        core::array::from_fn(|i| calculate_xyz_nonlin(i as u8));

    fn calculate_xyz_nonlin(a: u8) -> f32 {
        let v: f64 = a as f64 / 255.0;
        if v <= 0.04045 {
            return (v / 12.92) as f32;
        }
        ((v + 0.055) / 1.055).powf(2.4) as f32
    }
}

#[inline(always)]
fn lab_nonlin(t: f32) -> f32 {
    if t > 0.008856 {
        return t.cbrt();
    }
    7.787 * t + 16.0 / 116.0
}

/// Convert pixel in RGB24 to L*a*b*.
///
/// L is in 0..100, a and b are roughly in -128..128.
#[inline(always)]
pub fn srgb_to_cielab_pixel(rgb: &[u8]) -> [f32; 3] {
    let r = SRGB_LINEAR_TBL[rgb[0] as usize];
    let g = SRGB_LINEAR_TBL[rgb[1] as usize];
    let b = SRGB_LINEAR_TBL[rgb[2] as usize];
    let m = &RGB_TO_XYZ;
    let fx = lab_nonlin((m[0] * r + m[1] * g + m[2] * b) / D65_WHITE[0]);
    let fy = lab_nonlin((m[3] * r + m[4] * g + m[5] * b) / D65_WHITE[1]);
    let fz = lab_nonlin((m[6] * r + m[7] * g + m[8] * b) / D65_WHITE[2]);
    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// Converts a packed RGB24 buffer into a three band L*a*b* image.
pub fn lab_from_srgb(rgb: &[u8], width: usize, height: usize) -> Result<Planar<f32>, SlicError> {
    if rgb.len() != width * height * 3 {
        return Err(SlicError::DimensionMismatch {
            expected: width * height * 3,
            found: rgb.len(),
        });
    }
    let lab: Vec<[f32; 3]> = rgb
        .par_chunks_exact(3)
        .map(srgb_to_cielab_pixel)
        .collect();
    let bands = (0..3)
        .map(|band| Array2D::from_fn(width, height, |x, y| lab[y * width + x][band]))
        .collect();
    Planar::from_bands(bands)
}
