//! Staged vs visible pixel buffers. Widgets render into `staging`; the
//! refresh planner consumes the diff against `visible`; the driver
//! commits a region back into `visible` once the panel has actually shown
//! it. See `SPEC_FULL.md` §4.7.

use parking_lot::Mutex;

use crate::region::{Region, RegionSet};

struct Inner {
    staging: Vec<u8>,
    visible: Vec<u8>,
}

/// Two pixel buffers of the same dimensions, with access serialized by a
/// single mutex (never held across a driver call — callers take a
/// snapshot or dirty region under the lock, then release it).
pub struct Framebuffer {
    width: u32,
    height: u32,
    inner: Mutex<Inner>,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let size = (width * height) as usize;
        Self {
            width,
            height,
            inner: Mutex::new(Inner { staging: vec![0; size], visible: vec![0; size] }),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    /// A widget render primitive: set one pixel in the staging buffer.
    pub fn set_pixel(&self, x: u32, y: u32, value: u8) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = self.index(x, y);
        self.inner.lock().staging[idx] = value;
    }

    /// Fill a clipped region of the staging buffer with a single value —
    /// the common case for a widget re-render.
    pub fn fill_region(&self, region: Region, value: u8) {
        let region = region.clamp(self.width, self.height);
        let mut inner = self.inner.lock();
        for y in region.y..region.bottom() {
            for x in region.x..region.right() {
                let idx = (y * self.width + x) as usize;
                inner.staging[idx] = value;
            }
        }
    }

    /// The minimal bounding rectangle covering every pixel where staging
    /// and visible currently disagree, or `None` if they match.
    pub fn diff(&self) -> Option<Region> {
        let inner = self.inner.lock();
        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);
        let mut any = false;
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = (y * self.width + x) as usize;
                if inner.staging[idx] != inner.visible[idx] {
                    any = true;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }
        if !any {
            return None;
        }
        Some(Region::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
    }

    /// `diff()` wrapped as the region set the refresh planner consumes.
    pub fn collect_dirty(&self) -> RegionSet {
        match self.diff() {
            Some(region) => RegionSet::from_regions(vec![region]),
            None => RegionSet::new(),
        }
    }

    /// Mark a region as shown on the panel: copy staging into visible for
    /// that area only.
    pub fn commit(&self, region: Region) {
        let region = region.clamp(self.width, self.height);
        let mut inner = self.inner.lock();
        for y in region.y..region.bottom() {
            for x in region.x..region.right() {
                let idx = (y * self.width + x) as usize;
                inner.visible[idx] = inner.staging[idx];
            }
        }
    }

    pub fn visible_snapshot(&self) -> Vec<u8> {
        self.inner.lock().visible.clone()
    }

    pub fn staging_snapshot(&self) -> Vec<u8> {
        self.inner.lock().staging.clone()
    }
}
