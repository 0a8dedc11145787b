use crate::error::SlicError;
use aligned_vec::{AVec, ConstAlign};
use std::ops::{Index, IndexMut};

pub(crate) const ALIGN: usize = 64;

/// Dense row-major grid used for label images, distance buffers and image bands.
#[derive(Debug, Clone)]
pub struct Array2D<T> {
    pub data: AVec<T, ConstAlign<ALIGN>>,
    pub width: usize,
    pub height: usize,
}

impl<T> Array2D<T> {
    pub fn from_slice(data: &[T], width: usize, height: usize) -> Result<Self, SlicError>
    where
        T: Clone,
    {
        if data.len() != width * height {
            return Err(SlicError::DimensionMismatch {
                expected: width * height,
                found: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data: AVec::from_slice(ALIGN, data),
        })
    }

    pub fn from_fill(value: T, width: usize, height: usize) -> Self
    where
        T: Clone + Copy,
    {
        let data: AVec<T, ConstAlign<ALIGN>> =
            AVec::from_iter(ALIGN, (0..width * height).map(|_| value));
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let data: AVec<T, ConstAlign<ALIGN>> = AVec::from_iter(
            ALIGN,
            (0..height).flat_map(|y| (0..width).map(move |x| (x, y))).map(|(x, y)| f(x, y)),
        );
        Self {
            width,
            height,
            data,
        }
    }

    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        self.data.fill(value)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get_row(&self, row: usize) -> &[T] {
        debug_assert!(row < self.height);
        &self.data[(self.width * row)..(self.width * row + self.width)]
    }

    pub fn get_row_mut(&mut self, row: usize) -> &mut [T] {
        debug_assert!(row < self.height);
        &mut self.data[(self.width * row)..(self.width * row + self.width)]
    }

    #[inline(always)]
    pub fn get_index(&self, x: usize, y: usize) -> usize {
        debug_assert!(self.width > x, "Index ({x}, {y}) is out of bounds ({}, {})", self.width, self.height);
        debug_assert!(self.height > y, "Index ({x}, {y}) is out of bounds ({}, {})", self.width, self.height);
        self.width * y + x
    }

    #[inline(always)]
    pub fn get_x_y_index(&self, index: usize) -> (usize, usize) {
        debug_assert!(index < self.data.len());
        (index % self.width, index / self.width)
    }

    pub fn get(&self, x: usize, y: usize) -> Result<&T, SlicError> {
        if x >= self.width || y >= self.height {
            return Err(SlicError::IndexOutOfBounds(x, y));
        }
        Ok(&self.data[self.width * y + x])
    }
}

impl<T> Index<(usize, usize)> for Array2D<T> {
    type Output = T;
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        &self.data[self.get_index(x, y)]
    }
}

impl<T> IndexMut<(usize, usize)> for Array2D<T> {
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut Self::Output {
        let idx = self.get_index(x, y);
        &mut self.data[idx]
    }
}
