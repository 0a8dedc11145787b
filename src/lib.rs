//! SLIC superpixel segmentation in Rust.
//!
//! The image is partitioned into a requested number of compact, color coherent and connected
//! regions. Pixel encoding is kept out of the clustering core: every pass goes through a
//! [`color::ColorModel`] adapter, so the same engine runs on gray, planar and interleaved
//! images of `u8`, `u16` or `f32` samples.
//!
//! The following example segments a packed RGB24 buffer in L*a*b* space:
//!
//! ```rust
//! use slic_segmentation::cielab::lab_from_srgb;
//! use slic_segmentation::color::PlanarModel;
//! use slic_segmentation::common::{Config, ConnectRule};
//! use slic_segmentation::slic::segment;
//!
//! fn main() -> Result<(), slic_segmentation::SlicError> {
//!     let (width, height) = (64, 48);
//!     // left half red, right half blue
//!     let rgb: Vec<u8> = (0..width * height)
//!         .flat_map(|i| if i % width < width / 2 { [255, 0, 0] } else { [0, 0, 255] })
//!         .collect();
//!     let image = lab_from_srgb(&rgb, width, height)?;
//!     let config = Config {
//!         num_of_regions: 12,
//!         compactness: 10.0,
//!         connect_rule: ConnectRule::Four,
//!         ..Config::default()
//!     };
//!     let result = segment(&image, &PlanarModel::new(3), &config)?;
//!     assert!(result.regions.len() <= 12);
//!     Ok(())
//! }
//! ```
//!
//! The run is deterministic: the number of iterations is fixed and both threading strategies give
//! bit-identical labels. The lower level steps (`Clusters::initialize_clusters()`, `assign()`,
//! `update()`, `enforce_connectivity()`) are public for custom pipelines.

pub mod arrays;
pub mod assign;
pub mod cielab;
pub mod cluster;
pub mod color;
pub mod common;
pub mod connectivity;
pub mod error;
pub mod image;
pub mod slic;

pub use common::{Config, ConnectRule, ThreadingStrategy};
pub use error::SlicError;
pub use slic::{segment, Region, Segmentation};
