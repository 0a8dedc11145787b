//! Color model adapters.
//!
//! A [`ColorModel`] is the only place where pixel encoding is known. The
//! clustering passes are generic over it and get monomorphized per adapter.

use crate::error::SlicError;
use crate::image::{Gray, ImageHandle, Interleaved, Planar, Sample};

/// Pixel access needed by the segmentation engine.
///
/// `index` arguments are row-major pixel indices as returned by
/// [`ImageHandle::pixel_index`]. All operations are pure.
pub trait ColorModel<I: ImageHandle + ?Sized>: Sync {
    /// Length of the color vectors this model reads and writes.
    fn num_bands(&self) -> usize;

    /// Checks that the image band layout can be represented by this model and that its
    /// storage is consistent with its dimensions.
    fn check(&self, image: &I) -> Result<(), SlicError> {
        image.check_layout()?;
        let found = image.band_count();
        if found == 0 || found != self.num_bands() {
            return Err(SlicError::UnsupportedPixelEncoding {
                expected: self.num_bands(),
                found,
            });
        }
        Ok(())
    }

    /// Writes the color of pixel `(x, y)` into `color`.
    fn read_color(&self, image: &I, x: usize, y: usize, color: &mut [f32]);

    /// Adds `weight` times the color at `index` onto `acc`.
    fn accumulate(&self, acc: &mut [f64], image: &I, index: usize, weight: f64);

    /// Squared euclidean distance between `color` and the pixel at `index`.
    fn color_distance(&self, color: &[f32], image: &I, index: usize) -> f32;

    /// Scalar intensity used to pick low gradient seed positions.
    fn intensity(&self, image: &I, x: usize, y: usize) -> f32;
}

/// Adapter for [`Gray`] images of any sample type.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrayModel;

impl<T: Sample> ColorModel<Gray<T>> for GrayModel {
    fn num_bands(&self) -> usize {
        1
    }

    #[inline(always)]
    fn read_color(&self, image: &Gray<T>, x: usize, y: usize, color: &mut [f32]) {
        color[0] = image.band[(x, y)].to_f32();
    }

    #[inline(always)]
    fn accumulate(&self, acc: &mut [f64], image: &Gray<T>, index: usize, weight: f64) {
        acc[0] += f64::from(image.band.data[index].to_f32()) * weight;
    }

    #[inline(always)]
    fn color_distance(&self, color: &[f32], image: &Gray<T>, index: usize) -> f32 {
        let diff = image.band.data[index].to_f32() - color[0];
        diff * diff
    }

    #[inline(always)]
    fn intensity(&self, image: &Gray<T>, x: usize, y: usize) -> f32 {
        image.band[(x, y)].to_f32()
    }
}

/// Adapter for [`Planar`] images with a fixed number of bands.
#[derive(Debug, Clone, Copy)]
pub struct PlanarModel {
    pub num_bands: usize,
}

impl PlanarModel {
    pub fn new(num_bands: usize) -> Self {
        Self { num_bands }
    }
}

impl<T: Sample> ColorModel<Planar<T>> for PlanarModel {
    fn num_bands(&self) -> usize {
        self.num_bands
    }

    fn read_color(&self, image: &Planar<T>, x: usize, y: usize, color: &mut [f32]) {
        for (c, band) in color.iter_mut().zip(&image.bands) {
            *c = band[(x, y)].to_f32();
        }
    }

    #[inline(always)]
    fn accumulate(&self, acc: &mut [f64], image: &Planar<T>, index: usize, weight: f64) {
        for (a, band) in acc.iter_mut().zip(&image.bands) {
            *a += f64::from(band.data[index].to_f32()) * weight;
        }
    }

    #[inline(always)]
    fn color_distance(&self, color: &[f32], image: &Planar<T>, index: usize) -> f32 {
        color
            .iter()
            .zip(&image.bands)
            .map(|(c, band)| {
                let diff = band.data[index].to_f32() - c;
                diff * diff
            })
            .sum()
    }

    fn intensity(&self, image: &Planar<T>, x: usize, y: usize) -> f32 {
        let total: f32 = image.bands.iter().map(|b| b[(x, y)].to_f32()).sum();
        total / image.bands.len() as f32
    }
}

/// Adapter for [`Interleaved`] images with a fixed number of bands.
#[derive(Debug, Clone, Copy)]
pub struct InterleavedModel {
    pub num_bands: usize,
}

impl InterleavedModel {
    pub fn new(num_bands: usize) -> Self {
        Self { num_bands }
    }
}

impl<T: Sample> ColorModel<Interleaved<T>> for InterleavedModel {
    fn num_bands(&self) -> usize {
        self.num_bands
    }

    fn read_color(&self, image: &Interleaved<T>, x: usize, y: usize, color: &mut [f32]) {
        let pixel = image.pixel(image.pixel_index(x, y));
        for (c, s) in color.iter_mut().zip(pixel) {
            *c = s.to_f32();
        }
    }

    #[inline(always)]
    fn accumulate(&self, acc: &mut [f64], image: &Interleaved<T>, index: usize, weight: f64) {
        for (a, s) in acc.iter_mut().zip(image.pixel(index)) {
            *a += f64::from(s.to_f32()) * weight;
        }
    }

    #[inline(always)]
    fn color_distance(&self, color: &[f32], image: &Interleaved<T>, index: usize) -> f32 {
        color
            .iter()
            .zip(image.pixel(index))
            .map(|(c, s)| {
                let diff = s.to_f32() - c;
                diff * diff
            })
            .sum()
    }

    fn intensity(&self, image: &Interleaved<T>, x: usize, y: usize) -> f32 {
        let pixel = image.pixel(image.pixel_index(x, y));
        let total: f32 = pixel.iter().map(|s| s.to_f32()).sum();
        total / pixel.len() as f32
    }
}
