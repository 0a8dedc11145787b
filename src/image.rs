//! Minimal image containers the bundled color models know how to read.
//!
//! The engine never touches these types directly; it only sees an
//! [`ImageHandle`] and goes through a [`crate::color::ColorModel`] for pixel values.

use crate::arrays::{Array2D, ALIGN};
use crate::error::SlicError;
use aligned_vec::{AVec, ConstAlign};

/// Storage type of a single band sample.
///
/// Samples are widened to `f32` before any arithmetic. Unsigned encodings map
/// onto their natural non-negative range.
pub trait Sample: Copy + Send + Sync + 'static {
    fn to_f32(self) -> f32;
}

impl Sample for u8 {
    #[inline(always)]
    fn to_f32(self) -> f32 {
        f32::from(self)
    }
}

impl Sample for u16 {
    #[inline(always)]
    fn to_f32(self) -> f32 {
        f32::from(self)
    }
}

impl Sample for f32 {
    #[inline(always)]
    fn to_f32(self) -> f32 {
        self
    }
}

/// Geometry every segmentable image exposes.
pub trait ImageHandle {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn band_count(&self) -> usize;

    /// Checks that the sample storage matches `width`, `height` and `band_count`.
    fn check_layout(&self) -> Result<(), SlicError> {
        Ok(())
    }

    /// Pixel index in row-major order, shared by labels and distance buffers.
    #[inline(always)]
    fn pixel_index(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width() && y < self.height());
        y * self.width() + x
    }
}

/// Single band image.
#[derive(Debug, Clone)]
pub struct Gray<T> {
    pub band: Array2D<T>,
}

impl<T: Sample> Gray<T> {
    pub fn from_slice(data: &[T], width: usize, height: usize) -> Result<Self, SlicError> {
        Ok(Self {
            band: Array2D::from_slice(data, width, height)?,
        })
    }

    pub fn from_fn<F: FnMut(usize, usize) -> T>(width: usize, height: usize, f: F) -> Self {
        Self {
            band: Array2D::from_fn(width, height, f),
        }
    }
}

impl<T> ImageHandle for Gray<T> {
    fn width(&self) -> usize {
        self.band.width
    }
    fn height(&self) -> usize {
        self.band.height
    }
    fn band_count(&self) -> usize {
        1
    }
    fn check_layout(&self) -> Result<(), SlicError> {
        check_band(&self.band, self.band.width, self.band.height)
    }
}

fn check_band<T>(band: &Array2D<T>, width: usize, height: usize) -> Result<(), SlicError> {
    if band.width != width || band.height != height || band.data.len() != width * height {
        return Err(SlicError::DimensionMismatch {
            expected: width * height,
            found: band.data.len(),
        });
    }
    Ok(())
}

/// Multi-band image with one separate grid per band.
#[derive(Debug, Clone)]
pub struct Planar<T> {
    pub bands: Vec<Array2D<T>>,
    pub width: usize,
    pub height: usize,
}

impl<T: Sample> Planar<T> {
    /// Builds a planar image from equally sized bands.
    pub fn from_bands(bands: Vec<Array2D<T>>) -> Result<Self, SlicError> {
        let (width, height) = bands
            .first()
            .map(|b| (b.width, b.height))
            .unwrap_or((0, 0));
        for band in &bands {
            if band.width != width || band.height != height {
                return Err(SlicError::DimensionMismatch {
                    expected: width * height,
                    found: band.width * band.height,
                });
            }
        }
        Ok(Self {
            bands,
            width,
            height,
        })
    }

    pub fn from_fn<F>(width: usize, height: usize, num_bands: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize, usize) -> T,
    {
        let bands = (0..num_bands)
            .map(|band| Array2D::from_fn(width, height, |x, y| f(x, y, band)))
            .collect();
        Self {
            bands,
            width,
            height,
        }
    }
}

impl<T> ImageHandle for Planar<T> {
    fn width(&self) -> usize {
        self.width
    }
    fn height(&self) -> usize {
        self.height
    }
    fn band_count(&self) -> usize {
        self.bands.len()
    }
    fn check_layout(&self) -> Result<(), SlicError> {
        self.bands
            .iter()
            .try_for_each(|band| check_band(band, self.width, self.height))
    }
}

/// Multi-band image with samples packed per pixel (e.g. RGB24).
#[derive(Debug, Clone)]
pub struct Interleaved<T> {
    pub data: AVec<T, ConstAlign<ALIGN>>,
    pub width: usize,
    pub height: usize,
    pub num_bands: usize,
}

impl<T: Sample> Interleaved<T> {
    pub fn from_slice(
        data: &[T],
        width: usize,
        height: usize,
        num_bands: usize,
    ) -> Result<Self, SlicError> {
        if data.len() != width * height * num_bands {
            return Err(SlicError::DimensionMismatch {
                expected: width * height * num_bands,
                found: data.len(),
            });
        }
        Ok(Self {
            data: AVec::from_slice(ALIGN, data),
            width,
            height,
            num_bands,
        })
    }

    /// Samples of the pixel at row-major `index`.
    #[inline(always)]
    pub fn pixel(&self, index: usize) -> &[T] {
        let start = index * self.num_bands;
        &self.data[start..start + self.num_bands]
    }
}

impl<T> ImageHandle for Interleaved<T> {
    fn width(&self) -> usize {
        self.width
    }
    fn height(&self) -> usize {
        self.height
    }
    fn band_count(&self) -> usize {
        self.num_bands
    }
    fn check_layout(&self) -> Result<(), SlicError> {
        let expected = self.width * self.height * self.num_bands;
        if self.data.len() != expected {
            return Err(SlicError::DimensionMismatch {
                expected,
                found: self.data.len(),
            });
        }
        Ok(())
    }
}
