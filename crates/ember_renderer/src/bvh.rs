//! Bounding volume hierarchy construction.
//!
//! Two flavors of the same flat tree: a per-shape tree over a shape's own
//! primitives, and a scene-level tree over instance bounding boxes. Both are
//! built top-down with an explicit work queue (bounded stack depth) and a
//! split-at-spatial-midpoint policy with a split-in-half fallback for
//! degenerate primitive distributions.

use std::collections::VecDeque;

use ember_core::{Elements, Scene, Shape};
use ember_math::{Aabb, Mat4, Mat4Ext, Vec3};

use crate::intersect::{line_bounds, point_bounds, triangle_bounds};

/// Maximum number of primitives per leaf node.
pub const BVH_MAX_PRIMS: usize = 4;

/// One node of a flat BVH.
///
/// For internal nodes `start` is the index of the first of two adjacent
/// children (`start` and `start + 1`) and `axis` the split axis; for leaves
/// `start`/`num` delimit a range of the tree's reordered primitive array.
/// Node 0 is always the root.
#[derive(Debug, Clone, Copy)]
pub struct BvhNode {
    pub bbox: Aabb,
    pub start: u32,
    pub num: u16,
    pub axis: u8,
    pub internal: bool,
}

impl Default for BvhNode {
    fn default() -> Self {
        Self {
            bbox: Aabb::EMPTY,
            start: 0,
            num: 0,
            axis: 0,
            internal: false,
        }
    }
}

/// A flat BVH: nodes in construction order plus the permuted primitive
/// indices referenced by leaf ranges.
#[derive(Debug, Clone, Default)]
pub struct BvhTree {
    pub nodes: Vec<BvhNode>,
    pub primitives: Vec<u32>,
}

impl BvhTree {
    /// Bounding box of the whole tree.
    pub fn root_bbox(&self) -> Aabb {
        self.nodes.first().map_or(Aabb::EMPTY, |node| node.bbox)
    }
}

/// Primitive record used while sorting BVH entries.
struct BvhPrimitive {
    bbox: Aabb,
    center: Vec3,
    primitive: u32,
}

/// Split a primitive range at the spatial midpoint of its centroid bounds,
/// along the axis of greatest extent. Returns the split offset and axis.
///
/// Falls back to splitting the range at its numeric midpoint when the
/// centroids have no extent or the partition leaves one side empty, so
/// construction always makes progress.
fn split_middle(primitives: &mut [BvhPrimitive]) -> (usize, usize) {
    let mut axis = 0;
    let mid = primitives.len() / 2;

    let mut cbbox = Aabb::EMPTY;
    for primitive in primitives.iter() {
        cbbox = cbbox.merge_point(primitive.center);
    }
    let csize = cbbox.max - cbbox.min;
    if csize == Vec3::ZERO {
        return (mid, axis);
    }

    // split along largest
    if csize.x >= csize.y && csize.x >= csize.z {
        axis = 0;
    }
    if csize.y >= csize.x && csize.y >= csize.z {
        axis = 1;
    }
    if csize.z >= csize.x && csize.z >= csize.y {
        axis = 2;
    }

    // partition by centroid against the spatial middle
    let middle = cbbox.center()[axis];
    let mut split = 0;
    for i in 0..primitives.len() {
        if primitives[i].center[axis] < middle {
            primitives.swap(split, i);
            split += 1;
        }
    }

    // if we were not able to split, just break the primitives in half
    if split == 0 || split == primitives.len() {
        split = mid;
    }

    (split, axis)
}

/// Build the node array over a primitive list, permuting it in place.
fn build_nodes(primitives: &mut [BvhPrimitive]) -> Vec<BvhNode> {
    let mut nodes = Vec::with_capacity(primitives.len().max(1) * 2);

    // queue up first node
    let mut queue = VecDeque::new();
    queue.push_back((0usize, 0usize, primitives.len()));
    nodes.push(BvhNode::default());

    while let Some((nodeid, start, end)) = queue.pop_front() {
        let mut bbox = Aabb::EMPTY;
        for primitive in &primitives[start..end] {
            bbox = bbox.merge(&primitive.bbox);
        }

        if end - start > BVH_MAX_PRIMS {
            let (offset, axis) = split_middle(&mut primitives[start..end]);
            let mid = start + offset;

            let first_child = nodes.len() as u32;
            nodes[nodeid] = BvhNode {
                bbox,
                start: first_child,
                num: 2,
                axis: axis as u8,
                internal: true,
            };
            nodes.push(BvhNode::default());
            nodes.push(BvhNode::default());
            queue.push_back((first_child as usize, start, mid));
            queue.push_back((first_child as usize + 1, mid, end));
        } else {
            nodes[nodeid] = BvhNode {
                bbox,
                start: start as u32,
                num: (end - start) as u16,
                axis: 0,
                internal: false,
            };
        }
    }

    nodes
}

fn build_tree(mut primitives: Vec<BvhPrimitive>) -> BvhTree {
    let nodes = build_nodes(&mut primitives);
    let primitives = primitives.into_iter().map(|p| p.primitive).collect();
    BvhTree { nodes, primitives }
}

/// Build a BVH over a shape's populated primitive kind.
pub fn build_shape_bvh(shape: &Shape) -> BvhTree {
    let primitives = match &shape.elements {
        Elements::Points(points) => points
            .iter()
            .enumerate()
            .map(|(idx, &p)| {
                let bbox = point_bounds(
                    shape.positions[p as usize],
                    shape.radius[p as usize],
                );
                BvhPrimitive {
                    bbox,
                    center: bbox.center(),
                    primitive: idx as u32,
                }
            })
            .collect(),
        Elements::Lines(lines) => lines
            .iter()
            .enumerate()
            .map(|(idx, l)| {
                let bbox = line_bounds(
                    shape.positions[l[0] as usize],
                    shape.positions[l[1] as usize],
                    shape.radius[l[0] as usize],
                    shape.radius[l[1] as usize],
                );
                BvhPrimitive {
                    bbox,
                    center: bbox.center(),
                    primitive: idx as u32,
                }
            })
            .collect(),
        Elements::Triangles(triangles) => triangles
            .iter()
            .enumerate()
            .map(|(idx, t)| {
                let bbox = triangle_bounds(
                    shape.positions[t[0] as usize],
                    shape.positions[t[1] as usize],
                    shape.positions[t[2] as usize],
                );
                BvhPrimitive {
                    bbox,
                    center: bbox.center(),
                    primitive: idx as u32,
                }
            })
            .collect(),
    };

    build_tree(primitives)
}

/// Acceleration structure over a whole scene.
///
/// Holds one tree per shape (parallel to `scene.shapes`), an instance-level
/// tree over world-space instance bounds, and the cached inverse frame of
/// every instance for local-space ray descent. Built once before sampling;
/// read-only afterwards.
pub struct SceneBvh {
    pub shapes: Vec<BvhTree>,
    pub instances: BvhTree,
    pub inv_frames: Vec<Mat4>,
}

impl SceneBvh {
    /// Build all shape trees and the instance tree.
    pub fn build(scene: &Scene) -> Self {
        let shapes: Vec<BvhTree> = scene.shapes.iter().map(build_shape_bvh).collect();
        let (instances, inv_frames) = build_instance_tree(scene, &shapes);

        log::info!(
            "built scene bvh: {} shapes, {} instances, {} instance nodes",
            shapes.len(),
            scene.instances.len(),
            instances.nodes.len()
        );

        Self {
            shapes,
            instances,
            inv_frames,
        }
    }

    /// Rebuild one shape's tree after its geometry changed.
    ///
    /// The instance tree depends on shape root bounds, so it is rebuilt
    /// along with the shape.
    pub fn rebuild_shape(&mut self, scene: &Scene, shape: usize) {
        self.shapes[shape] = build_shape_bvh(&scene.shapes[shape]);
        let (instances, inv_frames) = build_instance_tree(scene, &self.shapes);
        self.instances = instances;
        self.inv_frames = inv_frames;
    }
}

fn build_instance_tree(scene: &Scene, shapes: &[BvhTree]) -> (BvhTree, Vec<Mat4>) {
    let primitives = scene
        .instances
        .iter()
        .enumerate()
        .map(|(idx, instance)| {
            let root = shapes[instance.shape].root_bbox();
            let bbox = if root.is_empty() {
                Aabb::EMPTY
            } else {
                instance.frame.transform_aabb(&root)
            };
            BvhPrimitive {
                bbox,
                center: bbox.center(),
                primitive: idx as u32,
            }
        })
        .collect();

    let inv_frames = scene
        .instances
        .iter()
        .map(|instance| instance.frame.inverse())
        .collect();

    (build_tree(primitives), inv_frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;
    use rand_pcg::Pcg32;

    fn random_triangle_shape(count: usize, seed: u64) -> Shape {
        let mut rng = Pcg32::new(seed, 1);
        let mut randf = move || (rng.next_u32() >> 8) as f32 / (1 << 24) as f32;

        let mut shape = Shape::default();
        let mut triangles = Vec::new();
        for i in 0..count {
            let base = Vec3::new(
                randf() * 10.0 - 5.0,
                randf() * 10.0 - 5.0,
                randf() * 10.0 - 5.0,
            );
            shape.positions.push(base);
            shape.positions.push(base + Vec3::new(randf(), randf(), randf()));
            shape.positions.push(base + Vec3::new(randf(), randf(), randf()));
            let v = (i * 3) as u32;
            triangles.push([v, v + 1, v + 2]);
        }
        shape.elements = Elements::Triangles(triangles);
        shape
    }

    /// Collect (leaf, range) pairs by walking the tree from the root.
    fn collect_leaf_ranges(tree: &BvhTree) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        if tree.nodes.is_empty() {
            return ranges;
        }
        let mut stack = vec![0usize];
        while let Some(nodeid) = stack.pop() {
            let node = &tree.nodes[nodeid];
            if node.internal {
                stack.push(node.start as usize);
                stack.push(node.start as usize + 1);
            } else {
                ranges.push((node.start as usize, node.start as usize + node.num as usize));
            }
        }
        ranges
    }

    #[test]
    fn test_build_containment_and_coverage() {
        let shape = random_triangle_shape(100, 17);
        let tree = build_shape_bvh(&shape);

        // root bbox contains every primitive bbox
        let root = tree.root_bbox();
        if let Elements::Triangles(triangles) = &shape.elements {
            for t in triangles {
                let bbox = triangle_bounds(
                    shape.positions[t[0] as usize],
                    shape.positions[t[1] as usize],
                    shape.positions[t[2] as usize],
                );
                assert!(root.contains(&bbox));
            }
        }

        // every primitive appears in exactly one leaf
        let mut seen = vec![0usize; 100];
        for (start, end) in collect_leaf_ranges(&tree) {
            assert!(end - start <= BVH_MAX_PRIMS);
            for idx in start..end {
                seen[tree.primitives[idx] as usize] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
    }

    #[test]
    fn test_build_shared_centroid_fallback() {
        // all triangles share one centroid: the midpoint split cannot
        // separate them, yet the fallback must still build a full tree
        let mut shape = Shape::default();
        let mut triangles = Vec::new();
        for i in 0..32u32 {
            let r = 0.5 + i as f32 * 0.1;
            shape.positions.push(Vec3::new(-r, -r, 0.0));
            shape.positions.push(Vec3::new(r, -r, 0.0));
            shape.positions.push(Vec3::new(0.0, 2.0 * r, 0.0));
            triangles.push([i * 3, i * 3 + 1, i * 3 + 2]);
        }
        shape.elements = Elements::Triangles(triangles);

        let tree = build_shape_bvh(&shape);
        let mut seen = vec![0usize; 32];
        for (start, end) in collect_leaf_ranges(&tree) {
            assert!(end - start <= BVH_MAX_PRIMS);
            for idx in start..end {
                seen[tree.primitives[idx] as usize] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
    }

    #[test]
    fn test_empty_shape() {
        let tree = build_shape_bvh(&Shape::default());
        assert!(tree.primitives.is_empty());
        assert!(tree.root_bbox().is_empty());
    }

    #[test]
    fn test_scene_bvh_instance_bounds() {
        let mut scene = Scene::new();
        let shape = scene.add_shape();
        scene.shapes[shape].positions =
            vec![Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];
        scene.shapes[shape].elements = Elements::Triangles(vec![[0, 1, 2]]);
        scene.add_material();

        let a = scene.add_instance();
        scene.instances[a].frame = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let b = scene.add_instance();
        scene.instances[b].frame = Mat4::from_translation(Vec3::new(-10.0, 0.0, 0.0));

        let bvh = SceneBvh::build(&scene);
        let root = bvh.instances.root_bbox();
        assert!(root.min.x < -10.0 + 1.5);
        assert!(root.max.x > 10.0 - 1.5);
        assert_eq!(bvh.inv_frames.len(), 2);
    }

    #[test]
    fn test_rebuild_shape_updates_instance_tree() {
        let mut scene = Scene::new();
        let shape = scene.add_shape();
        scene.shapes[shape].positions =
            vec![Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];
        scene.shapes[shape].elements = Elements::Triangles(vec![[0, 1, 2]]);
        scene.add_material();
        scene.add_instance();

        let mut bvh = SceneBvh::build(&scene);
        let before = bvh.instances.root_bbox();

        // grow the geometry, rebuild, instance bounds must follow
        for p in &mut scene.shapes[shape].positions {
            *p *= 10.0;
        }
        bvh.rebuild_shape(&scene, shape);
        let after = bvh.instances.root_bbox();

        assert!(after.max.x > before.max.x * 5.0);
    }

    #[test]
    fn test_leaf_for_small_sets() {
        let shape = random_triangle_shape(3, 5);
        let tree = build_shape_bvh(&shape);
        assert_eq!(tree.nodes.len(), 1);
        assert!(!tree.nodes[0].internal);
        assert_eq!(tree.nodes[0].num, 3);
    }
}
