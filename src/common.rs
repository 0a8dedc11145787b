use crate::error::SlicError;

/// Which pixels count as adjacent when extracting connected regions.
///
/// The neighbor order is part of the output contract: connectivity enforcement
/// merges an orphaned fragment into the first finalized neighbor it meets in
/// this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectRule {
    /// Left, up, right, down.
    Four,
    /// The four orthogonal neighbors, then up-left, up-right, down-left, down-right.
    Eight,
}

impl ConnectRule {
    pub fn offsets(&self) -> &'static [(isize, isize)] {
        const FOUR: [(isize, isize); 4] = [(-1, 0), (0, -1), (1, 0), (0, 1)];
        const EIGHT: [(isize, isize); 8] = [
            (-1, 0),
            (0, -1),
            (1, 0),
            (0, 1),
            (-1, -1),
            (1, -1),
            (-1, 1),
            (1, 1),
        ];
        match self {
            ConnectRule::Four => &FOUR,
            ConnectRule::Eight => &EIGHT,
        }
    }
}

/// Threading of the assignment and accumulation passes.
///
/// Both strategies walk the image in the same fixed row bands and merge partial
/// results in band order, so they produce bit-identical output.
#[derive(Clone, PartialEq, Eq, Debug, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ThreadingStrategy {
    /// No threading - mostly for tests and very small images.
    SingleThread,
    /// Row bands are processed as rayon tasks.
    RowBased,
}

/// Number of image rows handled by one task.
pub(crate) const ROWS_PER_BAND: usize = 32;

/// Main config for the processing.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Requested number of superpixels (_K_). This directly determines the grid interval
    ///
    /// _S = round(sqrt((image width * height) / num_of_regions))_
    ///
    /// The number of seeds actually placed is the largest near-square grid not exceeding _K_.
    pub num_of_regions: usize,
    /// Weight _m_ of the spatial term. Higher means more compact, square superpixels; lower
    /// means tighter color adherence.
    pub compactness: f32,
    /// Number of assignment + update iterations. There is no convergence test.
    pub iterations: u16,
    /// Adjacency used by connectivity enforcement.
    pub connect_rule: ConnectRule,
    /// Components smaller than `min_size_factor * S * S` pixels are merged into a neighbor.
    pub min_size_factor: f32,
    /// How the assignment and accumulation passes are spread over threads.
    pub threading: ThreadingStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_of_regions: 400,
            compactness: 10f32,
            iterations: 10,
            connect_rule: ConnectRule::Eight,
            min_size_factor: 0.25,
            threading: ThreadingStrategy::RowBased,
        }
    }
}

impl Config {
    /// Checks the config against an image of the given size.
    pub fn validate(&self, width: usize, height: usize) -> Result<(), SlicError> {
        let num_pixels = width * height;
        if num_pixels == 0 {
            return Err(SlicError::InvalidConfiguration(format!(
                "image has zero area ({width}x{height})"
            )));
        }
        if self.num_of_regions == 0 {
            return Err(SlicError::InvalidConfiguration(
                "number of regions must be at least one".into(),
            ));
        }
        if self.num_of_regions > num_pixels {
            return Err(SlicError::InvalidConfiguration(format!(
                "number of regions {} exceeds number of pixels {num_pixels}",
                self.num_of_regions
            )));
        }
        if !self.compactness.is_finite() || self.compactness <= 0.0 {
            return Err(SlicError::InvalidConfiguration(format!(
                "compactness must be positive, got {}",
                self.compactness
            )));
        }
        if !self.min_size_factor.is_finite() || self.min_size_factor < 0.0 {
            return Err(SlicError::InvalidConfiguration(format!(
                "min_size_factor must be non-negative, got {}",
                self.min_size_factor
            )));
        }
        Ok(())
    }
}
