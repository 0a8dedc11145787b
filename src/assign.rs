use crate::arrays::Array2D;
use crate::cluster::Cluster;
use crate::color::ColorModel;
use crate::common::{Config, ThreadingStrategy, ROWS_PER_BAND};
use crate::image::ImageHandle;
use crate::slic::Clusters;
use assume::assume;
use log::trace;
use rayon::prelude::*;
use std::ops::Range;

/// Label of a pixel no search window has claimed yet.
pub const UNASSIGNED: u32 = u32::MAX;

/// Weight applied to squared pixel distances: _m² / S²_.
pub fn spatial_weight(config: &Config, search_region_size: usize) -> f32 {
    let s = search_region_size as f32;
    (config.compactness * config.compactness) / (s * s)
}

#[inline(always)]
fn pixel_distance<I, M>(
    model: &M,
    cluster: &Cluster,
    image: &I,
    (x, y): (usize, usize),
    index: usize,
    spatial_weight: f32,
) -> f32
where
    I: ImageHandle + ?Sized,
    M: ColorModel<I>,
{
    model.color_distance(&cluster.color, image, index)
        + cluster.spatial_distance_sq(x, y) * spatial_weight
}

/// This function does the assignment step.
///
/// The label and distance grids are split into bands of `ROWS_PER_BAND` rows. Inside a band,
/// clusters are visited in table order and a pixel is only taken over on a strictly smaller
/// distance, so ties go to the lower cluster number no matter how bands are scheduled.
///
/// A pixel its own center's window no longer reaches is still compared against that center, so
/// no pixel ends up farther from its cluster than before the pass. Pixels without a previous
/// cluster and outside every window are given to the nearest center of the whole table
/// afterward. Returns the number of such pixels.
pub fn assign<I, M>(
    image: &I,
    model: &M,
    config: &Config,
    clusters: &mut Clusters,
    min_distances: &mut Array2D<f32>,
    search_region_size: usize,
) -> usize
where
    I: ImageHandle + Sync + ?Sized,
    M: ColorModel<I>,
{
    let width = image.width();
    let height = image.height();
    debug_assert_eq!(clusters.assignments.width, width);
    debug_assert_eq!(min_distances.height, height);

    let Clusters {
        assignments,
        clusters,
    } = clusters;
    clusters
        .iter_mut()
        .for_each(|c| c.update_window(width, height, search_region_size));
    let clusters: &[Cluster] = clusters;
    let weight = spatial_weight(config, search_region_size);
    let band_len = width * ROWS_PER_BAND;

    let assign_band = |(band_no, (labels, distances)): (usize, (&mut [u32], &mut [f32]))| {
        let row_start = band_no * ROWS_PER_BAND;
        let rows = row_start..row_start + labels.len() / width;
        assign_rows(image, model, clusters, rows, labels, distances, weight)
    };
    match config.threading {
        ThreadingStrategy::SingleThread => assignments
            .data
            .chunks_mut(band_len)
            .zip(min_distances.data.chunks_mut(band_len))
            .enumerate()
            .for_each(assign_band),
        ThreadingStrategy::RowBased => assignments
            .data
            .par_chunks_mut(band_len)
            .zip(min_distances.data.par_chunks_mut(band_len))
            .enumerate()
            .for_each(assign_band),
    }

    let unclaimed = claim_unassigned(image, model, clusters, assignments, min_distances, weight);
    if unclaimed > 0 {
        trace!("{unclaimed} pixels outside every search window");
    }
    unclaimed
}

fn assign_rows<I, M>(
    image: &I,
    model: &M,
    clusters: &[Cluster],
    rows: Range<usize>,
    labels: &mut [u32],
    distances: &mut [f32],
    spatial_weight: f32,
) where
    I: ImageHandle + ?Sized,
    M: ColorModel<I>,
{
    let previous = labels.to_vec();
    labels.fill(UNASSIGNED);
    distances.fill(f32::INFINITY);
    let width = image.width();
    let offset = rows.start * width;
    for cluster in clusters {
        for y in cluster.rows_within(rows.clone()) {
            let row_index = y * width;
            for x in cluster.left..cluster.right {
                let index = row_index + x;
                let local = index - offset;
                assume!(unsafe: local < distances.len(), "local: {local} > {}", distances.len());
                assume!(unsafe: local < labels.len(), "local: {local} > {}", labels.len());
                let distance = pixel_distance(model, cluster, image, (x, y), index, spatial_weight);
                if distance < distances[local] {
                    distances[local] = distance;
                    labels[local] = cluster.number;
                }
            }
        }
    }

    // members whose center window moved away
    for (local, label) in previous.iter().enumerate() {
        let Some(cluster) = clusters.get(*label as usize) else {
            continue;
        };
        let index = offset + local;
        let xy = (index % width, index / width);
        if cluster.covers(xy) {
            continue;
        }
        let distance = pixel_distance(model, cluster, image, xy, index, spatial_weight);
        if distance < distances[local] {
            distances[local] = distance;
            labels[local] = cluster.number;
        }
    }
}

fn claim_unassigned<I, M>(
    image: &I,
    model: &M,
    clusters: &[Cluster],
    assignments: &mut Array2D<u32>,
    min_distances: &mut Array2D<f32>,
    spatial_weight: f32,
) -> usize
where
    I: ImageHandle + ?Sized,
    M: ColorModel<I>,
{
    let width = assignments.width;
    let mut count = 0;
    for (index, (label, distance)) in assignments
        .data
        .iter_mut()
        .zip(min_distances.data.iter_mut())
        .enumerate()
        .filter(|(_, (label, _))| **label == UNASSIGNED)
    {
        let (x, y) = (index % width, index / width);
        let mut best = (clusters[0].number, f32::INFINITY);
        for cluster in clusters {
            let d = pixel_distance(model, cluster, image, (x, y), index, spatial_weight);
            if d < best.1 {
                best = (cluster.number, d);
            }
        }
        (*label, *distance) = best;
        count += 1;
    }
    count
}

/// Sum over all labeled pixels of the distance to the center of their own cluster.
///
/// Bands are summed separately and merged in band order, like the update pass.
pub fn objective<I, M>(
    image: &I,
    model: &M,
    config: &Config,
    clusters: &Clusters,
    search_region_size: usize,
) -> f64
where
    I: ImageHandle + Sync + ?Sized,
    M: ColorModel<I>,
{
    let width = image.width();
    let weight = spatial_weight(config, search_region_size);
    let band_len = width * ROWS_PER_BAND;
    let table = &clusters.clusters;

    let band_cost = |(band_no, labels): (usize, &[u32])| -> f64 {
        let offset = band_no * band_len;
        labels
            .iter()
            .enumerate()
            .filter_map(|(i, label)| {
                let cluster = table.get(*label as usize)?;
                let index = offset + i;
                let xy = (index % width, index / width);
                Some(f64::from(pixel_distance(model, cluster, image, xy, index, weight)))
            })
            .sum()
    };
    let partials: Vec<f64> = match config.threading {
        ThreadingStrategy::SingleThread => clusters
            .assignments
            .data
            .chunks(band_len)
            .enumerate()
            .map(band_cost)
            .collect(),
        ThreadingStrategy::RowBased => clusters
            .assignments
            .data
            .par_chunks(band_len)
            .enumerate()
            .map(band_cost)
            .collect(),
    };
    partials.into_iter().sum()
}
