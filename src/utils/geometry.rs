/// Geometry utilities: perspective transforms, polygon measures and
/// the shape fitting used by the aligners and the bubble filter
use crate::models::Point;

/// Perspective transformation matrix (3x3)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveTransform {
    a11: f64,
    a12: f64,
    a13: f64,
    a21: f64,
    a22: f64,
    a23: f64,
    a31: f64,
    a32: f64,
    a33: f64,
}

impl PerspectiveTransform {
    /// Create transform from 4 source points to 4 destination points
    pub fn from_points(src: &[Point; 4], dst: &[Point; 4]) -> Option<Self> {
        // Direct linear transform with h33 fixed to 1
        let mut a = [[0.0f64; 8]; 8];
        let mut b = [0.0f64; 8];

        for i in 0..4 {
            let (sx, sy) = (src[i].x as f64, src[i].y as f64);
            let (dx, dy) = (dst[i].x as f64, dst[i].y as f64);

            let row = i * 2;
            a[row] = [sx, sy, 1.0, 0.0, 0.0, 0.0, -dx * sx, -dx * sy];
            b[row] = dx;
            a[row + 1] = [0.0, 0.0, 0.0, sx, sy, 1.0, -dy * sx, -dy * sy];
            b[row + 1] = dy;
        }

        solve_linear_system(&a, &b).map(|solution| Self {
            a11: solution[0],
            a12: solution[1],
            a13: solution[2],
            a21: solution[3],
            a22: solution[4],
            a23: solution[5],
            a31: solution[6],
            a32: solution[7],
            a33: 1.0,
        })
    }

    /// Transform raw coordinates, `None` on the line at infinity
    #[inline]
    pub fn transform_xy(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let denominator = self.a31 * x + self.a32 * y + self.a33;
        if denominator.abs() < 1e-12 {
            return None;
        }
        Some((
            (self.a11 * x + self.a12 * y + self.a13) / denominator,
            (self.a21 * x + self.a22 * y + self.a23) / denominator,
        ))
    }

    /// Transform a point using this perspective matrix
    pub fn transform(&self, p: &Point) -> Point {
        match self.transform_xy(p.x as f64, p.y as f64) {
            Some((x, y)) => Point::new(x as f32, y as f32),
            None => Point::new(0.0, 0.0),
        }
    }
}

/// Solve 8x8 linear system using Gaussian elimination
#[allow(clippy::needless_range_loop)]
fn solve_linear_system(a: &[[f64; 8]; 8], b: &[f64; 8]) -> Option<[f64; 8]> {
    let mut a = *a;
    let mut b = *b;
    let n = 8;

    // Forward elimination
    for i in 0..n {
        // Find pivot
        let mut max_val = a[i][i].abs();
        let mut max_row = i;

        for k in (i + 1)..n {
            if a[k][i].abs() > max_val {
                max_val = a[k][i].abs();
                max_row = k;
            }
        }

        // Check for singular matrix
        if max_val < 1e-12 {
            return None;
        }

        if max_row != i {
            a.swap(i, max_row);
            b.swap(i, max_row);
        }

        for k in (i + 1)..n {
            let factor = a[k][i] / a[i][i];
            b[k] -= factor * b[i];

            for j in i..n {
                a[k][j] -= factor * a[i][j];
            }
        }
    }

    // Back substitution
    let mut x = [0.0f64; 8];
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum -= a[i][j] * x[j];
        }
        x[i] = sum / a[i][i];
    }

    Some(x)
}

/// Order four corners as top-left, top-right, bottom-right, bottom-left.
///
/// TL has the smallest `x + y`, BR the largest; TR has the smallest
/// `y - x` and BL the largest (image coordinates, y pointing down).
pub fn order_points(points: &[Point; 4]) -> [Point; 4] {
    let sum = |p: &Point| p.x + p.y;
    let diff = |p: &Point| p.y - p.x;

    [
        extreme(points, sum, false),
        extreme(points, diff, false),
        extreme(points, sum, true),
        extreme(points, diff, true),
    ]
}

/// First point minimizing (or maximizing) `key`
fn extreme(points: &[Point], key: impl Fn(&Point) -> f32, max: bool) -> Point {
    let mut best = points[0];
    for p in &points[1..] {
        let better = if max {
            key(p) > key(&best)
        } else {
            key(p) < key(&best)
        };
        if better {
            best = *p;
        }
    }
    best
}

/// Perimeter of a closed polygon
pub fn arc_length(points: &[Point]) -> f32 {
    if points.len() < 2 {
        return 0.0;
    }
    let mut length = 0.0;
    for i in 0..points.len() {
        length += points[i].distance(&points[(i + 1) % points.len()]);
    }
    length
}

/// Unsigned area of a closed polygon (shoelace formula)
pub fn polygon_area(points: &[Point]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0f64;
    for i in 0..points.len() {
        let p = points[i];
        let q = points[(i + 1) % points.len()];
        twice += p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
    }
    (twice.abs() / 2.0) as f32
}

fn cross(o: &Point, a: &Point, b: &Point) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// True when the closed polygon turns the same way at every vertex
pub fn is_convex(points: &[Point]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0f32;
    for i in 0..n {
        let c = cross(&points[i], &points[(i + 1) % n], &points[(i + 2) % n]);
        if c.abs() < f32::EPSILON {
            continue;
        }
        if sign == 0.0 {
            sign = c.signum();
        } else if c.signum() != sign {
            return false;
        }
    }
    sign != 0.0
}

fn perpendicular_distance(p: &Point, a: &Point, b: &Point) -> f32 {
    let len = a.distance(b);
    if len < f32::EPSILON {
        return p.distance(a);
    }
    cross(a, b, p).abs() / len
}

/// Douglas-Peucker simplification of an open polyline (endpoints kept)
fn simplify_open(points: &[Point], epsilon: f32) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0usize, points.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let mut max_dist = 0.0;
        let mut index = start;
        for i in (start + 1)..end {
            let d = perpendicular_distance(&points[i], &points[start], &points[end]);
            if d > max_dist {
                max_dist = d;
                index = i;
            }
        }
        if max_dist > epsilon {
            keep[index] = true;
            stack.push((start, index));
            stack.push((index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

/// Index of the point of `points` farthest from `from`
fn farthest_from(points: &[Point], from: &Point) -> usize {
    points
        .iter()
        .enumerate()
        .fold((0usize, 0.0f32), |(bi, bd), (i, p)| {
            let d = p.distance_squared(from);
            if d > bd { (i, d) } else { (bi, bd) }
        })
        .0
}

/// Douglas-Peucker approximation of a closed contour.
///
/// The contour is split at two mutually distant points, each half is
/// simplified separately and the halves are joined again. Both split points
/// are extreme points of the contour, so the trace's starting pixel is never
/// forced into the result.
pub fn approximate_polygon(contour: &[Point], epsilon: f32) -> Vec<Point> {
    if contour.len() < 3 {
        return contour.to_vec();
    }

    let start = farthest_from(contour, &contour[0]);
    let ring: Vec<Point> = contour[start..]
        .iter()
        .chain(&contour[..start])
        .copied()
        .collect();
    let far = farthest_from(&ring, &ring[0]);
    if far == 0 {
        return vec![ring[0]];
    }

    let first_half = simplify_open(&ring[..=far], epsilon);
    let mut second: Vec<Point> = ring[far..].to_vec();
    second.push(ring[0]);
    let second_half = simplify_open(&second, epsilon);

    let mut result = first_half;
    // Both halves share the split point and the closing point.
    result.extend_from_slice(&second_half[1..second_half.len() - 1]);
    result
}

/// Convex hull (Andrew's monotone chain), counter-clockwise in y-up terms
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Point> = Vec::with_capacity(pts.len());
    for p in &pts {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Point> = Vec::with_capacity(pts.len());
    for p in pts.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(*p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Minimum-area bounding rectangle of a point set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    /// Rectangle centre
    pub center: Point,
    /// Extent along the edge direction
    pub width: f32,
    /// Extent across the edge direction
    pub height: f32,
    /// Direction of the `width` edge in degrees, `atan2(dy, dx)` in image coordinates
    pub angle: f32,
}

/// Rotating-calipers search over the hull edges; `None` for an empty set.
pub fn min_area_rect(points: &[Point]) -> Option<RotatedRect> {
    let hull = convex_hull(points);
    match hull.len() {
        0 => return None,
        1 => {
            return Some(RotatedRect {
                center: hull[0],
                width: 0.0,
                height: 0.0,
                angle: 0.0,
            });
        }
        _ => {}
    }

    let mut best: Option<(f32, RotatedRect)> = None;
    for i in 0..hull.len() {
        let a = hull[i];
        let b = hull[(i + 1) % hull.len()];
        let len = a.distance(&b);
        if len < f32::EPSILON {
            continue;
        }
        let (ux, uy) = ((b.x - a.x) / len, (b.y - a.y) / len);

        let (mut min_u, mut max_u, mut min_v, mut max_v) = (f32::MAX, f32::MIN, f32::MAX, f32::MIN);
        for p in &hull {
            let u = p.x * ux + p.y * uy;
            let v = -p.x * uy + p.y * ux;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }

        let area = (max_u - min_u) * (max_v - min_v);
        if best.as_ref().is_none_or(|(best_area, _)| area < *best_area) {
            let (cu, cv) = ((min_u + max_u) / 2.0, (min_v + max_v) / 2.0);
            let rect = RotatedRect {
                center: Point::new(cu * ux - cv * uy, cu * uy + cv * ux),
                width: max_u - min_u,
                height: max_v - min_v,
                angle: uy.atan2(ux).to_degrees(),
            };
            best = Some((area, rect));
        }
    }

    best.map(|(_, rect)| rect)
}

/// Fold an angle in degrees into `(-45, 45]`, using the quarter-turn
/// symmetry of a rectangle
pub fn normalize_quarter_turn(angle: f32) -> f32 {
    let folded = angle - 90.0 * ((angle - 45.0) / 90.0).ceil();
    if folded <= -45.0 { folded + 90.0 } else { folded }
}
