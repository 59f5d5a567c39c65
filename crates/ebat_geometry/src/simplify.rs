//! Ramer-Douglas-Peucker polyline simplification.

use crate::shape::Point;

/// Distance from `point` to the infinite line through `start` and `end`.
///
/// A degenerate chord (`start == end`, as in a closed ring) falls back to the
/// distance from `start`.
pub fn perpendicular_distance(point: &Point, start: &Point, end: &Point) -> f32 {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length = (dx * dx + dy * dy).sqrt();
    if length <= f32::EPSILON {
        return point.distance_to(start);
    }
    (dy * point.x - dx * point.y + end.x * start.y - end.y * start.x).abs() / length
}

/// Simplify a polyline, keeping every point whose removal would move the
/// outline by more than `epsilon`.
///
/// Endpoints are always kept. Inputs of two points or fewer come back as-is.
/// The input slice is never modified.
pub fn simplify(points: &[Point], epsilon: f32) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let last = points.len() - 1;
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[last] = true;

    // Explicit stack instead of recursion: freehand strokes can be long.
    let mut stack = vec![(0usize, last)];
    while let Some((start, end)) = stack.pop() {
        if end - start < 2 {
            continue;
        }

        let mut max_dist = 0.0f32;
        let mut max_index = start;
        for i in (start + 1)..end {
            let dist = perpendicular_distance(&points[i], &points[start], &points[end]);
            if dist > max_dist {
                max_dist = dist;
                max_index = i;
            }
        }

        if max_dist > epsilon {
            keep[max_index] = true;
            stack.push((start, max_index));
            stack.push((max_index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}
