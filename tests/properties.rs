use slic_segmentation::arrays::Array2D;
use slic_segmentation::color::{GrayModel, InterleavedModel, PlanarModel};
use slic_segmentation::image::{Gray, Interleaved, Planar};
use slic_segmentation::{segment, Config, ConnectRule, Segmentation, SlicError, ThreadingStrategy};

/// Blocky gradient with deterministic noise, so windows compete and fragments appear.
fn noisy_rgb(width: usize, height: usize) -> Interleaved<u8> {
    let mut state = 0x2545_f491u32;
    let mut data = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            for band in 0..3 {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                let noise = ((state >> 16) % 61) as i32 - 30;
                let base = (((x / 7) * 37 + (y / 5) * 53 + band * 71) % 200) as i32 + 28;
                data.push((base + noise).clamp(0, 255) as u8);
            }
        }
    }
    Interleaved::from_slice(&data, width, height, 3).unwrap()
}

fn is_connected(labels: &Array2D<u32>, label: u32, rule: ConnectRule) -> bool {
    let (w, h) = (labels.width, labels.height);
    let total = labels.data.iter().filter(|l| **l == label).count();
    let Some(start) = labels.data.iter().position(|l| *l == label) else {
        return false;
    };
    let offsets: &[(isize, isize)] = match rule {
        ConnectRule::Four => &[(-1, 0), (1, 0), (0, -1), (0, 1)],
        ConnectRule::Eight => &[(-1, 0), (1, 0), (0, -1), (0, 1), (-1, -1), (1, -1), (-1, 1), (1, 1)],
    };
    let mut seen = vec![false; labels.data.len()];
    let mut stack = vec![start];
    seen[start] = true;
    let mut reached = 0;
    while let Some(i) = stack.pop() {
        reached += 1;
        let (x, y) = ((i % w) as isize, (i / w) as isize);
        for (dx, dy) in offsets {
            let (nx, ny) = (x + dx, y + dy);
            if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                continue;
            }
            let n = ny as usize * w + nx as usize;
            if !seen[n] && labels.data[n] == label {
                seen[n] = true;
                stack.push(n);
            }
        }
    }
    reached == total
}

fn assert_valid_partition(result: &Segmentation, rule: ConnectRule, max_regions: usize) {
    let n = result.regions.len();
    assert!(n >= 1);
    assert!(n <= max_regions, "{n} regions for {max_regions} requested");
    assert!(result.labels.data.iter().all(|l| (*l as usize) < n));
    for region in &result.regions {
        assert!(region.pixel_count > 0);
        assert!(
            is_connected(&result.labels, region.id, rule),
            "region {} is not connected",
            region.id
        );
    }
    let total: usize = result.regions.iter().map(|r| r.pixel_count).sum();
    assert_eq!(total, result.labels.data.len());
}

#[test]
fn output_is_deterministic_across_threading() {
    let image = noisy_rgb(96, 64);
    let model = InterleavedModel::new(3);
    let mut config = Config {
        num_of_regions: 24,
        compactness: 5.0,
        iterations: 6,
        threading: ThreadingStrategy::RowBased,
        ..Config::default()
    };
    let a = segment(&image, &model, &config).unwrap();
    let b = segment(&image, &model, &config).unwrap();
    config.threading = ThreadingStrategy::SingleThread;
    let c = segment(&image, &model, &config).unwrap();
    assert_eq!(a.labels.data.as_slice(), b.labels.data.as_slice());
    assert_eq!(a.labels.data.as_slice(), c.labels.data.as_slice());
    assert_eq!(a.regions, c.regions);
    assert_eq!(a.objective, c.objective);
}

#[test]
fn regions_are_connected_for_both_rules() {
    let image = noisy_rgb(80, 60);
    let model = InterleavedModel::new(3);
    for rule in [ConnectRule::Four, ConnectRule::Eight] {
        for compactness in [1.0, 10.0, 40.0] {
            let config = Config {
                num_of_regions: 30,
                compactness,
                connect_rule: rule,
                ..Config::default()
            };
            let result = segment(&image, &model, &config).unwrap();
            assert_valid_partition(&result, rule, 30);
        }
    }
}

#[test]
fn region_descriptors_come_from_final_labels() {
    let image = noisy_rgb(50, 40);
    let model = InterleavedModel::new(3);
    let config = Config {
        num_of_regions: 10,
        compactness: 2.0,
        ..Config::default()
    };
    let result = segment(&image, &model, &config).unwrap();
    for region in &result.regions {
        let members: Vec<usize> = (0..result.labels.data.len())
            .filter(|i| result.labels.data[*i] == region.id)
            .collect();
        assert_eq!(members.len(), region.pixel_count);
        for band in 0..3 {
            let sum: f64 = members.iter().map(|i| image.pixel(*i)[band] as f64).sum();
            let mean = sum / members.len() as f64;
            assert!((mean - region.mean_color[band] as f64).abs() < 1e-3);
        }
    }
}

#[test]
fn objective_does_not_increase_on_flat_image() {
    let image = Gray::from_fn(20, 20, |_, _| 128u8);
    let config = Config {
        num_of_regions: 4,
        iterations: 5,
        ..Config::default()
    };
    let result = segment(&image, &GrayModel, &config).unwrap();
    assert_eq!(result.objective.len(), 5);
    for pair in result.objective.windows(2) {
        assert!(pair[1] <= pair[0], "{:?}", result.objective);
    }
}

#[test]
fn objective_does_not_increase_on_textured_image() {
    let image = noisy_rgb(96, 64);
    let model = InterleavedModel::new(3);
    for compactness in [1.0, 5.0, 10.0, 20.0] {
        for num_of_regions in [24, 60] {
            let config = Config {
                num_of_regions,
                compactness,
                iterations: 10,
                ..Config::default()
            };
            let result = segment(&image, &model, &config).unwrap();
            assert_eq!(result.objective.len(), 10);
            for pair in result.objective.windows(2) {
                assert!(
                    pair[1] <= pair[0],
                    "m={compactness} k={num_of_regions}: {:?}",
                    result.objective
                );
            }
        }
    }
}

#[test]
fn uniform_image_splits_into_quadrants() {
    let image = Gray::from_fn(20, 20, |_, _| 128u8);
    let config = Config {
        num_of_regions: 4,
        iterations: 2,
        ..Config::default()
    };
    let result = segment(&image, &GrayModel, &config).unwrap();
    assert_eq!(result.regions.len(), 4);
    for y in 0..20 {
        for x in 0..20 {
            let expected = (x / 10 + 2 * (y / 10)) as u32;
            assert_eq!(result.labels[(x, y)], expected, "pixel ({x}, {y})");
        }
    }
    for region in &result.regions {
        assert_eq!(region.pixel_count, 100);
        assert_eq!(region.mean_color, vec![128.0]);
    }
}

#[test]
fn two_color_halves_separate_cleanly() {
    let (width, height) = (20, 10);
    let data: Vec<u8> = (0..width * height)
        .flat_map(|i| if i % width < 10 { [10, 200, 30] } else { [220, 40, 90] })
        .collect();
    let image = Interleaved::from_slice(&data, width, height, 3).unwrap();
    let config = Config {
        num_of_regions: 2,
        compactness: 20.0,
        iterations: 10,
        connect_rule: ConnectRule::Four,
        ..Config::default()
    };
    let result = segment(&image, &InterleavedModel::new(3), &config).unwrap();
    assert_eq!(result.regions.len(), 2);
    let left = result.labels[(0, 0)];
    let right = result.labels[(19, 0)];
    assert_ne!(left, right);
    for y in 0..height {
        for x in 0..width {
            let expected = if x < 10 { left } else { right };
            assert_eq!(result.labels[(x, y)], expected, "pixel ({x}, {y})");
        }
    }
    assert_eq!(result.regions[left as usize].mean_color, vec![10.0, 200.0, 30.0]);
    assert_eq!(result.regions[right as usize].mean_color, vec![220.0, 40.0, 90.0]);
    for pair in result.objective.windows(2) {
        assert!(pair[1] <= pair[0], "{:?}", result.objective);
    }
}

#[test]
fn too_many_regions_is_rejected() {
    let image = Gray::from_fn(2, 2, |_, _| 0u8);
    let config = Config {
        num_of_regions: 10,
        ..Config::default()
    };
    assert!(matches!(
        segment(&image, &GrayModel, &config),
        Err(SlicError::InvalidConfiguration(_))
    ));
}

#[test]
fn zero_iterations_still_partition() {
    let image = Planar::from_fn(40, 30, 2, |x, y, b| ((x * 5 + y * 3 + b * 40) % 256) as u8);
    let config = Config {
        num_of_regions: 12,
        iterations: 0,
        connect_rule: ConnectRule::Four,
        ..Config::default()
    };
    let result = segment(&image, &PlanarModel::new(2), &config).unwrap();
    assert_eq!(result.objective.len(), 1);
    assert_valid_partition(&result, ConnectRule::Four, 12);
}

#[test]
fn one_region_per_pixel() {
    let image = Gray::from_fn(3, 2, |x, y| (x * 40 + y * 100) as u8);
    let config = Config {
        num_of_regions: 6,
        ..Config::default()
    };
    let result = segment(&image, &GrayModel, &config).unwrap();
    assert_valid_partition(&result, ConnectRule::Eight, 6);
}

#[test]
fn float_gray_image() {
    let image = Gray::from_fn(32, 32, |x, y| if (x / 16 + y / 16) % 2 == 0 { 0.1f32 } else { 0.9 });
    let config = Config {
        num_of_regions: 4,
        compactness: 0.05,
        ..Config::default()
    };
    let result = segment(&image, &GrayModel, &config).unwrap();
    assert_valid_partition(&result, ConnectRule::Eight, 4);
    for region in &result.regions {
        let c = region.mean_color[0];
        assert!((c - 0.1).abs() < 1e-5 || (c - 0.9).abs() < 1e-5, "{c}");
    }
}

#[test]
fn sixteen_bit_planar_image() {
    let image = Planar::from_fn(24, 24, 2, |x, _, b| {
        if x < 12 {
            [1000u16, 60000][b]
        } else {
            [50000u16, 3000][b]
        }
    });
    let config = Config {
        num_of_regions: 4,
        compactness: 10.0,
        connect_rule: ConnectRule::Four,
        ..Config::default()
    };
    let result = segment(&image, &PlanarModel::new(2), &config).unwrap();
    assert_valid_partition(&result, ConnectRule::Four, 4);
    for y in 0..24 {
        assert_ne!(result.labels[(11, y)], result.labels[(12, y)]);
    }
    for region in &result.regions {
        let c = &region.mean_color;
        assert!(c == &[1000.0, 60000.0] || c == &[50000.0, 3000.0], "{c:?}");
    }
}

#[cfg(feature = "serde")]
#[test]
fn config_deserializes_with_defaults() {
    let config: Config =
        serde_json::from_str(r#"{"num_of_regions": 64, "connect_rule": "Four"}"#).unwrap();
    assert_eq!(config.num_of_regions, 64);
    assert_eq!(config.connect_rule, ConnectRule::Four);
    assert_eq!(config.compactness, Config::default().compactness);
}
