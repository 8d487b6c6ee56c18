// Smooth curve through road points: centripetal Catmull-Rom, open ended.
// Arc length is measured by sampling, the same way an interactive 3D engine does it.

use glam::DVec3;

use crate::kernel_in::GroundPosition;

pub type CurvePoint = DVec3;

static ARC_LENGTH_DIVISIONS: usize = 200;
static MIN_SEGMENT: f64 = 1e-4;

// mirrored neighbour for the open ends
fn extrapolate(end: CurvePoint, inner: CurvePoint) -> CurvePoint {
    2.0 * end - inner
}

/// Cubic for one axis of one segment: c0 + c1 w + c2 w² + c3 w³
#[derive(Clone, Copy, Debug, Default)]
struct CubicPoly {
    c0: f64,
    c1: f64,
    c2: f64,
    c3: f64,
}

impl CubicPoly {
    fn hermite(x0: f64, x1: f64, t0: f64, t1: f64) -> Self {
        Self {
            c0: x0,
            c1: t0,
            c2: -3.0 * x0 + 3.0 * x1 - 2.0 * t0 - t1,
            c3: 2.0 * x0 - 2.0 * x1 + t0 + t1,
        }
    }

    fn non_uniform(x: [f64; 4], dt0: f64, dt1: f64, dt2: f64) -> Self {
        let mut t1 = (x[1] - x[0]) / dt0 - (x[2] - x[0]) / (dt0 + dt1) + (x[2] - x[1]) / dt1;
        let mut t2 = (x[2] - x[1]) / dt1 - (x[3] - x[1]) / (dt1 + dt2) + (x[3] - x[2]) / dt2;
        t1 *= dt1;
        t2 *= dt1;
        Self::hermite(x[1], x[2], t1, t2)
    }

    fn calc(&self, w: f64) -> f64 {
        let w2 = w * w;
        self.c0 + self.c1 * w + self.c2 * w2 + self.c3 * w2 * w
    }
}

#[derive(Clone, Debug)]
pub struct CatmullRomCurve {
    points: Vec<CurvePoint>,
    // cumulative lengths at t = i / ARC_LENGTH_DIVISIONS
    arc_lengths: Vec<f64>,
}

impl CatmullRomCurve {
    /// None for less than 2 points
    pub fn new(points: Vec<CurvePoint>) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        let mut curve = Self {
            points,
            arc_lengths: Vec::new(),
        };
        curve.arc_lengths = curve.lengths(ARC_LENGTH_DIVISIONS);
        Some(curve)
    }

    /// Curve on the ground plane, z = 0
    pub fn through_ground(positions: &[GroundPosition]) -> Option<Self> {
        Self::new(
            positions
                .iter()
                .map(|position| DVec3::new(position.east, position.north, 0.0))
                .collect(),
        )
    }

    /// Position at parameter t in 0..=1, not uniform in length.
    pub fn point(&self, t: f64) -> CurvePoint {
        let count = self.points.len();
        let p = (count - 1) as f64 * t.clamp(0.0, 1.0);
        let mut segment = p.floor() as usize;
        let mut weight = p - segment as f64;
        if segment >= count - 1 {
            segment = count - 2;
            weight = 1.0;
        }

        let p0 = if segment > 0 {
            self.points[segment - 1]
        } else {
            extrapolate(self.points[0], self.points[1])
        };
        let p1 = self.points[segment];
        let p2 = self.points[segment + 1];
        let p3 = if segment + 2 < count {
            self.points[segment + 2]
        } else {
            extrapolate(self.points[count - 1], self.points[count - 2])
        };

        // centripetal: alpha 0.5 on the distance, so the 4th root of the squared distance
        let mut dt0 = p0.distance_squared(p1).powf(0.25);
        let mut dt1 = p1.distance_squared(p2).powf(0.25);
        let mut dt2 = p2.distance_squared(p3).powf(0.25);
        if dt1 < MIN_SEGMENT {
            dt1 = 1.0;
        }
        if dt0 < MIN_SEGMENT {
            dt0 = dt1;
        }
        if dt2 < MIN_SEGMENT {
            dt2 = dt1;
        }

        let axis = |axis: usize| {
            CubicPoly::non_uniform([p0[axis], p1[axis], p2[axis], p3[axis]], dt0, dt1, dt2)
                .calc(weight)
        };
        DVec3::new(axis(0), axis(1), axis(2))
    }

    fn lengths(&self, divisions: usize) -> Vec<f64> {
        let mut lengths = Vec::with_capacity(divisions + 1);
        let mut sum = 0.0;
        let mut last = self.point(0.0);
        lengths.push(0.0);
        for index in 1..=divisions {
            let current = self.point(index as f64 / divisions as f64);
            sum += current.distance(last);
            lengths.push(sum);
            last = current;
        }
        lengths
    }

    pub fn length(&self) -> f64 {
        self.arc_lengths.last().copied().unwrap_or(0.0)
    }

    /// Maps a length fraction u to the parameter t
    pub fn u_to_t(&self, u: f64) -> f64 {
        let lengths = &self.arc_lengths;
        let divisions = lengths.len() - 1;
        let target = u.clamp(0.0, 1.0) * self.length();

        // first index with lengths[index] >= target
        let index = lengths.partition_point(|length| *length < target);
        if index == 0 {
            return 0.0;
        }
        if index > divisions {
            return 1.0;
        }
        let before = lengths[index - 1];
        let segment_length = lengths[index] - before;
        let fraction = if segment_length > 0.0 {
            (target - before) / segment_length
        } else {
            0.0
        };
        (index as f64 - 1.0 + fraction) / divisions as f64
    }

    /// Position at length fraction u in 0..=1
    pub fn point_at(&self, u: f64) -> CurvePoint {
        self.point(self.u_to_t(u))
    }

    /// Unit direction at length fraction u, by a small difference
    pub fn tangent_at(&self, u: f64) -> CurvePoint {
        let delta = 1e-4;
        let (u1, u2) = ((u - delta).max(0.0), (u + delta).min(1.0));
        let d = self.point_at(u2) - self.point_at(u1);
        d.try_normalize().unwrap_or_else(|| {
            // degenerate, fall back to the chord
            let chord = self.points[self.points.len() - 1] - self.points[0];
            chord.with_z(0.0).normalize_or(DVec3::X)
        })
    }
}
