use crate::Vec3;

/// Axis-aligned bounding box for spatial acceleration structures (BVH).
///
/// Stored as min/max corners. The empty box has inverted corners so that
/// merging it with anything yields the other operand.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// An empty AABB (contains nothing).
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    /// Create a new AABB from min/max corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB from two arbitrary corner points.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// True if the box has inverted extents on any axis.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Smallest box containing both operands.
    pub fn merge(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Smallest box containing this box and a point.
    pub fn merge_point(&self, p: Vec3) -> Aabb {
        Aabb {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    /// True if `other` lies entirely inside this box.
    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.min.z <= other.min.z
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
            && self.max.z >= other.max.z
    }

    /// Center point of the box.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Per-axis extents.
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Index (0=X, 1=Y, 2=Z) of the axis with the largest extent.
    pub fn longest_axis(&self) -> usize {
        let size = self.size();
        if size.x > size.y && size.x > size.z {
            0
        } else if size.y > size.z {
            1
        } else {
            2
        }
    }

    /// Slab test against a ray with a precomputed reciprocal direction.
    ///
    /// `inv_dir` may contain infinities (zero direction components); the
    /// scalar min/max below ignore the resulting NaNs, so those axes simply
    /// do not constrain the range.
    pub fn intersect(&self, origin: Vec3, inv_dir: Vec3, tmin: f32, tmax: f32) -> bool {
        let mut t0 = tmin;
        let mut t1 = tmax;
        for axis in 0..3 {
            let lo = (self.min[axis] - origin[axis]) * inv_dir[axis];
            let hi = (self.max[axis] - origin[axis]) * inv_dir[axis];
            t0 = t0.max(lo.min(hi));
            t1 = t1.min(lo.max(hi));
        }
        // robustness factor from Ize, "Robust BVH Ray Traversal"
        t0 <= t1 * 1.000_000_24
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}
