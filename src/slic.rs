use crate::arrays::Array2D;
use crate::assign::{assign, objective, UNASSIGNED};
use crate::cluster::Cluster;
use crate::color::ColorModel;
use crate::common::{Config, ThreadingStrategy, ROWS_PER_BAND};
use crate::connectivity::enforce_connectivity;
use crate::error::SlicError;
use crate::image::ImageHandle;
use log::debug;
use rayon::prelude::*;

/// Convenient struct for passing values around.
pub struct Clusters {
    /// For every pixel in image this stores to which cluster it belongs (see `Cluster.number`).
    pub assignments: Array2D<u32>,
    pub clusters: Vec<Cluster>,
}

/// Seed layout derived from the image size and the requested number of regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedGrid {
    /// Grid interval _S_, also the half-width of every search window.
    pub interval: usize,
    pub columns: usize,
    pub rows: usize,
}

impl SeedGrid {
    /// `num_of_regions` must be in `1..=width * height`.
    pub fn new(width: usize, height: usize, num_of_regions: usize) -> Self {
        debug_assert!(num_of_regions >= 1 && num_of_regions <= width * height);
        let interval = ((width * height) as f64 / num_of_regions as f64)
            .sqrt()
            .round()
            .max(1.0) as usize;
        let mut columns = ((width as f64 / interval as f64).round() as usize).clamp(1, width);
        let mut rows = ((height as f64 / interval as f64).round() as usize).clamp(1, height);
        // drop seeds from the denser axis until the grid fits into the request
        while columns * rows > num_of_regions {
            let denser_columns = width * rows < height * columns;
            if (denser_columns && columns > 1) || rows == 1 {
                columns -= 1;
            } else {
                rows -= 1;
            }
        }
        Self {
            interval,
            columns,
            rows,
        }
    }

    pub fn num_seeds(&self) -> usize {
        self.columns * self.rows
    }

    /// Seed positions in row-major order, each at the center of its grid cell.
    pub fn positions(&self, width: usize, height: usize) -> impl Iterator<Item = (usize, usize)> {
        let (columns, rows) = (self.columns, self.rows);
        (0..rows).flat_map(move |j| {
            (0..columns).map(move |i| {
                (
                    ((2 * i + 1) * width) / (2 * columns),
                    ((2 * j + 1) * height) / (2 * rows),
                )
            })
        })
    }
}

/// Moves a seed to the lowest gradient position of its 3x3 neighborhood.
///
/// The gradient is the squared central difference of the model intensity, with samples beyond
/// the border clamped to the edge. Ties keep the first position in row-major order.
pub fn perturb_seed<I, M>(image: &I, model: &M, x: usize, y: usize) -> (usize, usize)
where
    I: ImageHandle + ?Sized,
    M: ColorModel<I>,
{
    let (width, height) = (image.width(), image.height());
    let clamp_x = |x: isize| x.clamp(0, width as isize - 1) as usize;
    let clamp_y = |y: isize| y.clamp(0, height as isize - 1) as usize;
    let mut best = (x, y);
    let mut min = f32::INFINITY;
    for dy in -1isize..=1 {
        for dx in -1isize..=1 {
            let nx = x as isize + dx;
            let ny = y as isize + dy;
            if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
                continue;
            }
            let gx = model.intensity(image, clamp_x(nx + 1), ny as usize)
                - model.intensity(image, clamp_x(nx - 1), ny as usize);
            let gy = model.intensity(image, nx as usize, clamp_y(ny + 1))
                - model.intensity(image, nx as usize, clamp_y(ny - 1));
            let gradient = gx * gx + gy * gy;
            if gradient < min {
                min = gradient;
                best = (nx as usize, ny as usize);
            }
        }
    }
    best
}

impl Clusters {
    /// Default initialize clusters function.
    ///
    /// Places one seed per grid cell, moves it off strong edges with `perturb_seed()` and takes
    /// the color under the refined position. Custom initializers only need to fill `x`, `y`,
    /// `color` and a `number` equal to the table index.
    pub fn initialize_clusters<I, M>(image: &I, model: &M, grid: &SeedGrid) -> Clusters
    where
        I: ImageHandle + ?Sized,
        M: ColorModel<I>,
    {
        let (width, height) = (image.width(), image.height());
        let num_bands = model.num_bands();
        let clusters = grid
            .positions(width, height)
            .enumerate()
            .map(|(number, (x, y))| {
                let (x, y) = perturb_seed(image, model, x, y);
                let mut color = vec![0f32; num_bands];
                model.read_color(image, x, y, &mut color);
                Cluster::new(number as u32, x as f32, y as f32, color)
            })
            .collect::<Vec<_>>();
        debug_assert_eq!(clusters.len(), grid.num_seeds());
        Clusters {
            assignments: Array2D::from_fill(UNASSIGNED, width, height),
            clusters,
        }
    }
}

/// Per-label sums laid out as `[count, sum_x, sum_y, color...]`.
pub(crate) fn accumulate_members<I, M>(
    image: &I,
    model: &M,
    labels: &Array2D<u32>,
    num_labels: usize,
    threading: ThreadingStrategy,
) -> Vec<f64>
where
    I: ImageHandle + Sync + ?Sized,
    M: ColorModel<I>,
{
    let stride = 3 + model.num_bands();
    let width = labels.width;
    let band_len = width * ROWS_PER_BAND;

    let accumulate_band = |(band_no, band): (usize, &[u32])| -> Vec<f64> {
        let mut acc = vec![0f64; num_labels * stride];
        let offset = band_no * band_len;
        for (i, label) in band.iter().enumerate() {
            if *label == UNASSIGNED {
                continue;
            }
            let index = offset + i;
            let entry = &mut acc[*label as usize * stride..][..stride];
            entry[0] += 1.0;
            entry[1] += (index % width) as f64;
            entry[2] += (index / width) as f64;
            model.accumulate(&mut entry[3..], image, index, 1.0);
        }
        acc
    };
    let partials: Vec<Vec<f64>> = match threading {
        ThreadingStrategy::SingleThread => labels
            .data
            .chunks(band_len)
            .enumerate()
            .map(accumulate_band)
            .collect(),
        ThreadingStrategy::RowBased => labels
            .data
            .par_chunks(band_len)
            .enumerate()
            .map(accumulate_band)
            .collect(),
    };

    // merged in band order, so the sums do not depend on scheduling
    let mut total = vec![0f64; num_labels * stride];
    for partial in partials {
        for (t, p) in total.iter_mut().zip(partial) {
            *t += p;
        }
    }
    total
}

/// This function does the update step.
///
/// Clusters left without members keep their previous center and color.
pub fn update<I, M>(clusters: &mut Clusters, image: &I, model: &M, config: &Config)
where
    I: ImageHandle + Sync + ?Sized,
    M: ColorModel<I>,
{
    let stride = 3 + model.num_bands();
    let acc = accumulate_members(
        image,
        model,
        &clusters.assignments,
        clusters.clusters.len(),
        config.threading,
    );
    for cluster in clusters.clusters.iter_mut() {
        let entry = &acc[cluster.number as usize * stride..][..stride];
        let count = entry[0];
        if count == 0.0 {
            cluster.num_members = 0;
            continue;
        }
        cluster.num_members = count as u32;
        cluster.x = (entry[1] / count) as f32;
        cluster.y = (entry[2] / count) as f32;
        for (color, sum) in cluster.color.iter_mut().zip(&entry[3..]) {
            *color = (sum / count) as f32;
        }
    }
}

/// Outcome of `iterate()`.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationSummary {
    /// Distance of every pixel to its own center, summed after every pass. One entry per
    /// assignment pass, measured after the update when iterations are requested.
    pub objective: Vec<f64>,
    /// Distinct labels left after connectivity enforcement.
    pub num_regions: usize,
}

/// This function is the main loop.
///
/// The steps are:
/// - `config.iterations` times
///     - assign
///     - update
/// - one assign if no iteration was requested
/// - enforce_connectivity
///
/// Afterward `clusters.assignments` holds compact labels `0..num_regions`.
pub fn iterate<I, M>(
    image: &I,
    model: &M,
    config: &Config,
    clusters: &mut Clusters,
    grid: &SeedGrid,
) -> IterationSummary
where
    I: ImageHandle + Sync + ?Sized,
    M: ColorModel<I>,
{
    let mut min_distances = Array2D::from_fill(f32::INFINITY, image.width(), image.height());
    let passes = config.iterations.max(1);
    let mut costs = Vec::with_capacity(passes as usize);
    for i in 0..passes {
        assign(image, model, config, clusters, &mut min_distances, grid.interval);
        if config.iterations > 0 {
            update(clusters, image, model, config);
        }
        let cost = objective(image, model, config, clusters, grid.interval);
        debug!("iteration {i}: objective {cost:.3}");
        costs.push(cost);
    }

    let min_size =
        ((grid.interval * grid.interval) as f32 * config.min_size_factor).round() as usize;
    let num_regions = enforce_connectivity(&mut clusters.assignments, config.connect_rule, min_size);
    debug!(
        "{num_regions} regions from {} seeds (min size {min_size})",
        clusters.clusters.len()
    );
    IterationSummary {
        objective: costs,
        num_regions,
    }
}

/// Descriptor of one final superpixel.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Region {
    /// Label value in `Segmentation::labels`
    pub id: u32,
    pub pixel_count: usize,
    pub mean_color: Vec<f32>,
    /// Mean (x, y) position of the members
    pub center: (f32, f32),
}

/// Output of `segment()`.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Region id of every pixel.
    pub labels: Array2D<u32>,
    /// One entry per region, indexed by id.
    pub regions: Vec<Region>,
    /// Sum of pixel to center distances, one entry per assignment pass (see
    /// `IterationSummary`). Never increases between entries, up to the rounding of the f32
    /// distances when a center moves by only a few ulps.
    pub objective: Vec<f64>,
}

/// Aggregates region descriptors from final labels.
pub fn compute_regions<I, M>(
    image: &I,
    model: &M,
    labels: &Array2D<u32>,
    num_regions: usize,
    threading: ThreadingStrategy,
) -> Vec<Region>
where
    I: ImageHandle + Sync + ?Sized,
    M: ColorModel<I>,
{
    let stride = 3 + model.num_bands();
    let acc = accumulate_members(image, model, labels, num_regions, threading);
    acc.chunks_exact(stride)
        .enumerate()
        .map(|(id, entry)| {
            let count = entry[0];
            debug_assert!(count > 0.0, "region {id} has no members");
            let norm = if count > 0.0 { 1.0 / count } else { 0.0 };
            Region {
                id: id as u32,
                pixel_count: count as usize,
                mean_color: entry[3..].iter().map(|c| (c * norm) as f32).collect(),
                center: ((entry[1] * norm) as f32, (entry[2] * norm) as f32),
            }
        })
        .collect()
}

/// Segments `image` into superpixels.
///
/// ```rust
/// use slic_segmentation::color::GrayModel;
/// use slic_segmentation::common::Config;
/// use slic_segmentation::image::Gray;
/// use slic_segmentation::slic::segment;
///
/// let image = Gray::from_fn(32, 32, |x, _| if x < 16 { 20u8 } else { 220 });
/// let config = Config {
///     num_of_regions: 4,
///     ..Config::default()
/// };
/// let result = segment(&image, &GrayModel, &config).unwrap();
/// assert!(result.regions.len() <= 4);
/// ```
pub fn segment<I, M>(image: &I, model: &M, config: &Config) -> Result<Segmentation, SlicError>
where
    I: ImageHandle + Sync + ?Sized,
    M: ColorModel<I>,
{
    let (width, height) = (image.width(), image.height());
    config.validate(width, height)?;
    model.check(image)?;

    let grid = SeedGrid::new(width, height, config.num_of_regions);
    debug!(
        "segmenting {width}x{height}: interval {}, {}x{} seeds for {} requested",
        grid.interval, grid.columns, grid.rows, config.num_of_regions
    );
    let mut clusters = Clusters::initialize_clusters(image, model, &grid);
    let summary = iterate(image, model, config, &mut clusters, &grid);
    let regions = compute_regions(
        image,
        model,
        &clusters.assignments,
        summary.num_regions,
        config.threading,
    );
    Ok(Segmentation {
        labels: clusters.assignments,
        regions,
        objective: summary.objective,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{GrayModel, PlanarModel};
    use crate::image::{Gray, Planar};

    #[test]
    fn seed_grid_never_exceeds_request() {
        for (w, h, k) in [(20, 20, 4), (20, 10, 2), (640, 480, 2000), (7, 3, 5), (100, 1, 9), (5, 5, 25)] {
            let grid = SeedGrid::new(w, h, k);
            assert!(grid.num_seeds() <= k, "{w}x{h} k={k}: {grid:?}");
            assert!(grid.num_seeds() >= 1);
            assert!(grid.positions(w, h).all(|(x, y)| x < w && y < h));
        }
        assert_eq!(
            SeedGrid::new(20, 20, 4),
            SeedGrid {
                interval: 10,
                columns: 2,
                rows: 2
            }
        );
        assert_eq!(SeedGrid::new(5, 5, 25).num_seeds(), 25);
    }

    #[test]
    fn seed_positions_are_cell_centers() {
        let grid = SeedGrid::new(20, 10, 2);
        let positions: Vec<_> = grid.positions(20, 10).collect();
        assert_eq!(positions, vec![(5, 5), (15, 5)]);
    }

    #[test]
    fn perturb_moves_off_edges() {
        // vertical edge between x = 4 and x = 5
        let image = Gray::from_fn(10, 10, |x, _| if x < 5 { 0u8 } else { 200 });
        assert_eq!(perturb_seed(&image, &GrayModel, 5, 5), (6, 4));
        assert_eq!(perturb_seed(&image, &GrayModel, 4, 5), (3, 4));
        // flat image keeps the first neighbor
        let flat = Gray::from_fn(10, 10, |_, _| 9u8);
        assert_eq!(perturb_seed(&flat, &GrayModel, 0, 0), (0, 0));
        assert_eq!(perturb_seed(&flat, &GrayModel, 5, 5), (4, 4));
    }

    #[test]
    fn update_moves_to_centroid_and_keeps_empty_clusters() {
        let image = Gray::from_fn(4, 2, |x, _| (x * 10) as u8);
        let mut clusters = Clusters {
            assignments: Array2D::from_slice(&[0, 0, 1, 1, 0, 0, 1, 1], 4, 2).unwrap(),
            clusters: vec![
                Cluster::new(0, 0.0, 0.0, vec![0.0]),
                Cluster::new(1, 3.0, 1.0, vec![0.0]),
                Cluster::new(2, 2.0, 2.0, vec![42.0]),
            ],
        };
        update(&mut clusters, &image, &GrayModel, &Config::default());
        let c = &clusters.clusters;
        assert_eq!((c[0].x, c[0].y, c[0].color[0], c[0].num_members), (0.5, 0.5, 5.0, 4));
        assert_eq!((c[1].x, c[1].y, c[1].color[0], c[1].num_members), (2.5, 0.5, 25.0, 4));
        assert_eq!((c[2].x, c[2].y, c[2].color[0], c[2].num_members), (2.0, 2.0, 42.0, 0));
    }

    #[test]
    fn initial_colors_come_from_refined_seeds() {
        let image = Planar::from_fn(20, 20, 2, |x, y, b| (x + y * 10 + b) as u8);
        let grid = SeedGrid::new(20, 20, 4);
        let clusters = Clusters::initialize_clusters(&image, &PlanarModel::new(2), &grid);
        assert_eq!(clusters.clusters.len(), 4);
        for c in &clusters.clusters {
            let (x, y) = (c.x as usize, c.y as usize);
            assert_eq!(c.color, vec![(x + y * 10) as f32, (x + y * 10 + 1) as f32]);
            assert_eq!(c.num_members, 0);
        }
        assert!(clusters.assignments.data.iter().all(|l| *l == UNASSIGNED));
    }

    #[test]
    fn segment_rejects_invalid_input() {
        let image = Gray::from_fn(2, 2, |_, _| 0u8);
        let config = Config {
            num_of_regions: 10,
            ..Config::default()
        };
        assert!(matches!(
            segment(&image, &GrayModel, &config),
            Err(SlicError::InvalidConfiguration(_))
        ));
        let planar = Planar::from_fn(4, 4, 1, |_, _, _| 0u8);
        let config = Config {
            num_of_regions: 2,
            ..Config::default()
        };
        assert!(matches!(
            segment(&planar, &PlanarModel::new(3), &config),
            Err(SlicError::UnsupportedPixelEncoding { expected: 3, found: 1 })
        ));
    }

    #[test]
    fn segment_rejects_inconsistent_storage() {
        let planar = Planar {
            bands: vec![Array2D::from_fill(0u8, 4, 4)],
            width: 16,
            height: 16,
        };
        let config = Config {
            num_of_regions: 4,
            ..Config::default()
        };
        assert!(matches!(
            segment(&planar, &PlanarModel::new(1), &config),
            Err(SlicError::DimensionMismatch { expected: 256, found: 16 })
        ));
    }

    #[test]
    fn regions_match_labels() {
        let image = Gray::from_fn(30, 20, |x, y| ((x / 10) * 60 + (y / 10) * 20) as u8);
        let config = Config {
            num_of_regions: 6,
            ..Config::default()
        };
        let result = segment(&image, &GrayModel, &config).unwrap();
        let total: usize = result.regions.iter().map(|r| r.pixel_count).sum();
        assert_eq!(total, 600);
        for region in &result.regions {
            let count = result.labels.data.iter().filter(|l| **l == region.id).count();
            assert_eq!(count, region.pixel_count);
        }
        assert_eq!(result.objective.len(), config.iterations as usize);
    }
}
