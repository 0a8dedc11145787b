/// Entry of the cluster center table.
///
/// `x`, `y`, `color` and `num_members` are updated by `slic::update()`. `number` is the index
/// into the table and the label written into the assignment grid; it never changes during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// x position of center (column, may be fractional)
    pub x: f32,
    /// y position of center (row, may be fractional)
    pub y: f32,
    /// Mean color, one value per band
    pub color: Vec<f32>,
    /// Number of cluster, used as label
    pub number: u32,
    /// Number of pixels assigned in the last update
    pub num_members: u32,
    // Search window, refreshed in `assign()` using `Cluster::update_window()`.
    pub(crate) top: usize,
    pub(crate) bottom: usize,
    pub(crate) left: usize,
    pub(crate) right: usize,
}

impl Cluster {
    pub fn new(number: u32, x: f32, y: f32, color: Vec<f32>) -> Self {
        Self {
            x,
            y,
            color,
            number,
            num_members: 0,
            top: 0,
            bottom: 0,
            left: 0,
            right: 0,
        }
    }

    /// Clips the square window of half-width `search_region_size` around the center to the
    /// image. `bottom` and `right` are exclusive.
    pub(crate) fn update_window(&mut self, width: usize, height: usize, search_region_size: usize) {
        let cx = self.x.round().max(0.0) as usize;
        let cy = self.y.round().max(0.0) as usize;
        self.top = cy.saturating_sub(search_region_size);
        self.bottom = (cy + search_region_size + 1).min(height);
        self.left = cx.saturating_sub(search_region_size);
        self.right = (cx + search_region_size + 1).min(width);
        debug_assert!(self.top < self.bottom, "{:?} has empty window", self);
        debug_assert!(self.left < self.right, "{:?} has empty window", self);
    }

    /// Rows of `rows` the window overlaps.
    #[inline(always)]
    pub(crate) fn rows_within(&self, rows: std::ops::Range<usize>) -> std::ops::Range<usize> {
        self.top.max(rows.start)..self.bottom.min(rows.end)
    }

    #[inline(always)]
    pub(crate) fn covers(&self, (x, y): (usize, usize)) -> bool {
        (self.left..self.right).contains(&x) && (self.top..self.bottom).contains(&y)
    }

    #[inline(always)]
    pub(crate) fn spatial_distance_sq(&self, x: usize, y: usize) -> f32 {
        let dx = x as f32 - self.x;
        let dy = y as f32 - self.y;
        dx * dx + dy * dy
    }
}
