//! Ray/primitive tests and BVH traversal.
//!
//! Traversal uses a fixed-size node stack instead of recursion so a query
//! never allocates and its depth is bounded. Every accepted hit shrinks the
//! ray's far bound, which is what makes the box pruning correct for
//! closest-hit queries; any-hit queries short-circuit on the first hit.
//!
//! All primitive tests are written so that NaN comparisons reject, keeping
//! degenerate rays (zero-length directions from total internal reflection)
//! from producing hits at NaN distances.

use ember_core::{Elements, Scene, Shape};
use ember_math::{Aabb, Mat4Ext, Ray, Vec2, Vec3};

use crate::bvh::{BvhTree, SceneBvh};

/// Traversal stack capacity; with leaf size 4 real trees stay far below
/// this depth.
const BVH_STACK_SIZE: usize = 128;

/// Result of a shape-level intersection query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeIntersection {
    pub element: usize,
    pub uv: Vec2,
    pub distance: f32,
}

/// Result of a scene-level intersection query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneIntersection {
    pub instance: usize,
    pub element: usize,
    pub uv: Vec2,
    pub distance: f32,
}

/// Bounds of a sphere-like point primitive.
pub fn point_bounds(p: Vec3, r: f32) -> Aabb {
    Aabb::from_points(p - Vec3::splat(r), p + Vec3::splat(r))
}

/// Bounds of a capsule-like line primitive.
pub fn line_bounds(p0: Vec3, p1: Vec3, r0: f32, r1: f32) -> Aabb {
    point_bounds(p0, r0).merge(&point_bounds(p1, r1))
}

/// Bounds of a triangle.
pub fn triangle_bounds(p0: Vec3, p1: Vec3, p2: Vec3) -> Aabb {
    Aabb::from_points(p0.min(p1).min(p2), p0.max(p1).max(p2))
}

/// Intersect a ray with a sphere-like point. Returns (uv, distance).
pub fn intersect_point(ray: &Ray, p: Vec3, r: f32) -> Option<(Vec2, f32)> {
    // parameter of closest approach, clamped to the ray range
    let w = p - ray.origin;
    let t = w.dot(ray.direction) / ray.direction.dot(ray.direction);
    let t = t.clamp(ray.tmin, ray.tmax);

    let rp = ray.at(t);
    let prp = p - rp;
    if prp.dot(prp) <= r * r {
        Some((Vec2::ZERO, t))
    } else {
        None
    }
}

/// Intersect a ray with a capsule-like line segment. Returns (uv, distance)
/// with u the position along the segment and v the normalized offset from
/// its axis.
pub fn intersect_line(ray: &Ray, p0: Vec3, p1: Vec3, r0: f32, r1: f32) -> Option<(Vec2, f32)> {
    if p0 == p1 {
        return None;
    }

    // closest points between the ray and the segment's supporting line
    let u = ray.direction;
    let v = p1 - p0;
    let w = ray.origin - p0;

    let a = u.dot(u);
    let b = u.dot(v);
    let c = v.dot(v);
    let d = u.dot(w);
    let e = v.dot(w);
    let det = a * c - b * b;
    if det == 0.0 {
        return None;
    }

    let t = ((b * e - c * d) / det).clamp(ray.tmin, ray.tmax);
    let s = ((a * e - b * d) / det).clamp(0.0, 1.0);

    let pr = ray.at(t);
    let pl = p0 + v * s;
    let prl = pr - pl;

    let d2 = prl.dot(prl);
    let r = r0 * (1.0 - s) + r1 * s;
    if d2 <= r * r {
        Some((Vec2::new(s, d2.sqrt() / r), t))
    } else {
        None
    }
}

/// Intersect a ray with a triangle (Moller-Trumbore). Returns the
/// barycentric uv and the distance.
pub fn intersect_triangle(ray: &Ray, p0: Vec3, p1: Vec3, p2: Vec3) -> Option<(Vec2, f32)> {
    let edge1 = p1 - p0;
    let edge2 = p2 - p0;

    let pvec = ray.direction.cross(edge2);
    let det = edge1.dot(pvec);
    if det == 0.0 {
        return None;
    }
    let inv_det = 1.0 / det;

    let tvec = ray.origin - p0;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(edge1);
    let v = ray.direction.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(qvec) * inv_det;
    if t >= ray.tmin && t <= ray.tmax {
        Some((Vec2::new(u, v), t))
    } else {
        None
    }
}

/// Intersect a ray with a shape through its BVH.
///
/// Returns the closest hit, or any hit when `find_any` is set (occlusion
/// queries). An empty tree is a defined miss.
pub fn intersect_shape(
    shape: &Shape,
    tree: &BvhTree,
    ray: &Ray,
    find_any: bool,
) -> Option<ShapeIntersection> {
    if tree.nodes.is_empty() {
        return None;
    }

    let mut stack = [0u32; BVH_STACK_SIZE];
    let mut cursor = 0;
    stack[cursor] = 0;
    cursor += 1;

    let mut hit: Option<ShapeIntersection> = None;

    // copy the ray so accepted hits can shrink its far bound
    let mut ray = *ray;

    // reciprocal direction, evaluated once; infinities are fine
    let inv_dir = Vec3::new(
        1.0 / ray.direction.x,
        1.0 / ray.direction.y,
        1.0 / ray.direction.z,
    );
    let dir_neg = [inv_dir.x < 0.0, inv_dir.y < 0.0, inv_dir.z < 0.0];

    while cursor > 0 {
        cursor -= 1;
        let node = &tree.nodes[stack[cursor] as usize];

        if !node.bbox.intersect(ray.origin, inv_dir, ray.tmin, ray.tmax) {
            continue;
        }

        if node.internal {
            // push children so the side the ray enters first pops first
            if dir_neg[node.axis as usize] {
                stack[cursor] = node.start;
                stack[cursor + 1] = node.start + 1;
            } else {
                stack[cursor] = node.start + 1;
                stack[cursor + 1] = node.start;
            }
            cursor += 2;
        } else {
            let range = node.start as usize..node.start as usize + node.num as usize;
            match &shape.elements {
                Elements::Points(points) => {
                    for idx in range {
                        let element = tree.primitives[idx] as usize;
                        let p = points[element] as usize;
                        if let Some((uv, distance)) =
                            intersect_point(&ray, shape.positions[p], shape.radius[p])
                        {
                            hit = Some(ShapeIntersection {
                                element,
                                uv,
                                distance,
                            });
                            ray.tmax = distance;
                        }
                    }
                }
                Elements::Lines(lines) => {
                    for idx in range {
                        let element = tree.primitives[idx] as usize;
                        let l = lines[element];
                        if let Some((uv, distance)) = intersect_line(
                            &ray,
                            shape.positions[l[0] as usize],
                            shape.positions[l[1] as usize],
                            shape.radius[l[0] as usize],
                            shape.radius[l[1] as usize],
                        ) {
                            hit = Some(ShapeIntersection {
                                element,
                                uv,
                                distance,
                            });
                            ray.tmax = distance;
                        }
                    }
                }
                Elements::Triangles(triangles) => {
                    for idx in range {
                        let element = tree.primitives[idx] as usize;
                        let t = triangles[element];
                        if let Some((uv, distance)) = intersect_triangle(
                            &ray,
                            shape.positions[t[0] as usize],
                            shape.positions[t[1] as usize],
                            shape.positions[t[2] as usize],
                        ) {
                            hit = Some(ShapeIntersection {
                                element,
                                uv,
                                distance,
                            });
                            ray.tmax = distance;
                        }
                    }
                }
            }
        }

        if find_any && hit.is_some() {
            return hit;
        }
    }

    hit
}

/// Intersect a ray with a single instance, in world space.
pub fn intersect_instance(
    scene: &Scene,
    bvh: &SceneBvh,
    instance: usize,
    ray: &Ray,
    find_any: bool,
) -> Option<ShapeIntersection> {
    let shape = scene.instances[instance].shape;
    let local_ray = bvh.inv_frames[instance].transform_ray(ray);
    intersect_shape(&scene.shapes[shape], &bvh.shapes[shape], &local_ray, find_any)
}

/// Intersect a ray with the whole scene through the two-level BVH.
///
/// Instance-level leaves transform the ray into the instance's local space
/// (cached inverse frame) before descending into the shape tree; frames are
/// rigid/affine so local distances compare directly against the world ray's
/// shrinking far bound.
pub fn intersect_scene(
    scene: &Scene,
    bvh: &SceneBvh,
    ray: &Ray,
    find_any: bool,
) -> Option<SceneIntersection> {
    if bvh.instances.nodes.is_empty() {
        return None;
    }

    let mut stack = [0u32; BVH_STACK_SIZE];
    let mut cursor = 0;
    stack[cursor] = 0;
    cursor += 1;

    let mut hit: Option<SceneIntersection> = None;

    let mut ray = *ray;
    let inv_dir = Vec3::new(
        1.0 / ray.direction.x,
        1.0 / ray.direction.y,
        1.0 / ray.direction.z,
    );
    let dir_neg = [inv_dir.x < 0.0, inv_dir.y < 0.0, inv_dir.z < 0.0];

    while cursor > 0 {
        cursor -= 1;
        let node = &bvh.instances.nodes[stack[cursor] as usize];

        if !node.bbox.intersect(ray.origin, inv_dir, ray.tmin, ray.tmax) {
            continue;
        }

        if node.internal {
            if dir_neg[node.axis as usize] {
                stack[cursor] = node.start;
                stack[cursor + 1] = node.start + 1;
            } else {
                stack[cursor] = node.start + 1;
                stack[cursor + 1] = node.start;
            }
            cursor += 2;
        } else {
            for idx in node.start as usize..node.start as usize + node.num as usize {
                let instance_id = bvh.instances.primitives[idx] as usize;
                let instance = &scene.instances[instance_id];
                let local_ray = bvh.inv_frames[instance_id].transform_ray(&ray);
                if let Some(shape_hit) = intersect_shape(
                    &scene.shapes[instance.shape],
                    &bvh.shapes[instance.shape],
                    &local_ray,
                    find_any,
                ) {
                    hit = Some(SceneIntersection {
                        instance: instance_id,
                        element: shape_hit.element,
                        uv: shape_hit.uv,
                        distance: shape_hit.distance,
                    });
                    ray.tmax = shape_hit.distance;
                }
            }
        }

        if find_any && hit.is_some() {
            return hit;
        }
    }

    hit
}
