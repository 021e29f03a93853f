//! N-gon triangulation by ear clipping

use glam::Vec3;

/// Polygon normal by Newell's method (sum of consecutive edge cross products)
///
/// Not normalized; the length is twice the projected polygon area.
pub fn polygon_normal(points: &[Vec3]) -> Vec3 {
    let n = points.len();
    (0..n).fold(Vec3::ZERO, |acc, i| {
        acc + points[i].cross(points[(i + 1) % n])
    })
}

/// Triangulate a planar (or nearly planar) polygon
///
/// Returns triangles as index triples into `polygon`, wound like the input.
/// Ears are clipped against the Newell normal; if a full pass over the
/// remaining vertices finds no ear (self-intersecting or degenerate input)
/// the remainder is fanned from its first vertex.
pub fn triangulate(polygon: &[Vec3]) -> Vec<[usize; 3]> {
    let n = polygon.len();
    if n < 3 {
        return Vec::new();
    }
    if n == 3 {
        return vec![[0, 1, 2]];
    }

    let normal = polygon_normal(polygon);
    let mut remaining: Vec<usize> = (0..n).collect();
    let mut triangles = Vec::with_capacity(n - 2);

    let mut cursor = 0usize;
    let mut misses = 0usize;

    while remaining.len() > 3 {
        let count = remaining.len();
        if misses >= count {
            tracing::debug!(
                "No ear found among {} remaining vertices, using fan fallback",
                count
            );
            for i in 1..count - 1 {
                triangles.push([remaining[0], remaining[i], remaining[i + 1]]);
            }
            return triangles;
        }

        let i = cursor % count;
        let prev = remaining[(i + count - 1) % count];
        let cur = remaining[i];
        let next = remaining[(i + 1) % count];

        if is_ear(polygon, &remaining, [prev, cur, next], normal) {
            triangles.push([prev, cur, next]);
            remaining.remove(i);
            cursor = i;
            misses = 0;
        } else {
            cursor = i + 1;
            misses += 1;
        }
    }

    triangles.push([remaining[0], remaining[1], remaining[2]]);
    triangles
}

fn is_ear(polygon: &[Vec3], remaining: &[usize], tri: [usize; 3], normal: Vec3) -> bool {
    let [a, b, c] = tri.map(|i| polygon[i]);

    // Convex corner w.r.t. the polygon normal
    if (b - a).cross(c - b).dot(normal) <= 0.0 {
        return false;
    }

    !remaining
        .iter()
        .filter(|idx| !tri.contains(idx))
        .any(|&idx| point_in_triangle(polygon[idx], a, b, c, normal))
}

/// Three same-sign cross product tests; points on an edge count as inside
fn point_in_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3, normal: Vec3) -> bool {
    let d1 = (b - a).cross(p - a).dot(normal);
    let d2 = (c - b).cross(p - b).dot(normal);
    let d3 = (a - c).cross(p - c).dot(normal);
    d1 >= 0.0 && d2 >= 0.0 && d3 >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(polygon: &[Vec3], triangles: &[[usize; 3]]) -> f32 {
        triangles
            .iter()
            .map(|t| {
                let [a, b, c] = t.map(|i| polygon[i]);
                (b - a).cross(c - a).length() * 0.5
            })
            .sum()
    }

    fn regular_ngon(n: usize) -> Vec<Vec3> {
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32 * std::f32::consts::TAU;
                Vec3::new(t.cos(), t.sin(), 0.0)
            })
            .collect()
    }

    #[test]
    fn test_fewer_than_three_vertices() {
        assert!(triangulate(&[]).is_empty());
        assert!(triangulate(&[Vec3::ZERO, Vec3::X]).is_empty());
    }

    #[test]
    fn test_single_triangle() {
        let tri = [Vec3::ZERO, Vec3::X, Vec3::Y];
        assert_eq!(triangulate(&tri), vec![[0, 1, 2]]);
    }

    #[test]
    fn test_convex_ngon_covers_polygon() {
        for n in 4..=12 {
            let polygon = regular_ngon(n);
            let triangles = triangulate(&polygon);
            assert_eq!(triangles.len(), n - 2);

            let expected = polygon_normal(&polygon).length() * 0.5;
            assert!((area(&polygon, &triangles) - expected).abs() < 1e-4);

            let mut used = vec![false; n];
            for t in &triangles {
                for &i in t {
                    used[i] = true;
                }
            }
            assert!(used.iter().all(|&u| u));
        }
    }

    #[test]
    fn test_concave_polygon() {
        // L shape, reflex corner at index 3
        let polygon = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(1.0, 2.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        ];
        let triangles = triangulate(&polygon);
        assert_eq!(triangles.len(), 4);
        assert!((area(&polygon, &triangles) - 3.0).abs() < 1e-5);

        let normal = polygon_normal(&polygon);
        for t in &triangles {
            let [a, b, c] = t.map(|i| polygon[i]);
            assert!((b - a).cross(c - a).dot(normal) > 0.0, "flipped triangle {t:?}");
        }
    }

    #[test]
    fn test_non_planar_quad_in_other_plane() {
        let polygon = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        assert_eq!(triangulate(&polygon).len(), 2);
    }

    #[test]
    fn test_self_intersecting_falls_back_to_fan() {
        // Bow tie: Newell normal cancels out, no corner is convex
        let polygon = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        assert_eq!(triangulate(&polygon), vec![[0, 1, 2], [0, 2, 3]]);
    }
}
