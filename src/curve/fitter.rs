//! Natural cubic spline fitting.
//!
//! Turns an ordered list of knots into the control points of the cubic
//! Bezier segments that interpolate them. The interior B-spline control
//! points come from the tridiagonal system
//!
//! ```text
//! | 4 1         | | S1   |   | 6K1 - K0      |
//! | 1 4 1       | | S2   |   | 6K2           |
//! |   . . .     | | ...  | = | ...           |
//! |       1 4   | | Sn-2 |   | 6Kn-2 - Kn-1  |
//! ```
//!
//! with S0 = K0 and Sn-1 = Kn-1 (zero second derivative at both ends).

use glam::Vec3;

const DIAGONAL: f32 = 4.0;
const OFF_DIAGONAL: f32 = 1.0;

/// Control points of every segment for `knots.len() >= 2`.
///
/// Two knots give a single linear segment. Fewer than two knots give no
/// segments; the caller builds the degenerate patch itself.
pub fn fit_segments(knots: &[Vec3]) -> Vec<Vec<Vec3>> {
    match knots.len() {
        0 | 1 => Vec::new(),
        2 => vec![vec![knots[0], knots[1]]],
        n => {
            let spline_points = spline_control_points(knots);
            (1..n)
                .map(|i| {
                    let s0 = spline_points[i - 1];
                    let s1 = spline_points[i];
                    vec![
                        knots[i - 1],
                        (2.0 / 3.0) * s0 + (1.0 / 3.0) * s1,
                        (1.0 / 3.0) * s0 + (2.0 / 3.0) * s1,
                        knots[i],
                    ]
                })
                .collect()
        }
    }
}

/// The N B-spline control points for N >= 3 knots.
fn spline_control_points(knots: &[Vec3]) -> Vec<Vec3> {
    let n = knots.len();
    debug_assert!(n >= 3);

    let mut rhs: Vec<Vec3> = (1..n - 1).map(|i| 6.0 * knots[i]).collect();
    rhs[0] -= knots[0];
    let last = rhs.len() - 1;
    rhs[last] -= knots[n - 1];

    let interior = solve_tridiagonal(OFF_DIAGONAL, DIAGONAL, OFF_DIAGONAL, &rhs);

    let mut result = Vec::with_capacity(n);
    result.push(knots[0]);
    result.extend(interior);
    result.push(knots[n - 1]);
    result
}

/// Thomas algorithm for a constant-coefficient tridiagonal system.
///
/// Vec3 lanes are independent, so this solves the x, y and z systems in
/// one sweep.
pub(crate) fn solve_tridiagonal(lower: f32, diagonal: f32, upper: f32, rhs: &[Vec3]) -> Vec<Vec3> {
    assert!(
        diagonal.abs() > lower.abs() + upper.abs(),
        "tridiagonal system is not strictly diagonally dominant"
    );

    let n = rhs.len();
    if n == 0 {
        return Vec::new();
    }

    let mut c_prime = vec![0.0f32; n];
    let mut d_prime = vec![Vec3::ZERO; n];

    c_prime[0] = upper / diagonal;
    d_prime[0] = rhs[0] / diagonal;
    for i in 1..n {
        let denom = diagonal - lower * c_prime[i - 1];
        c_prime[i] = upper / denom;
        d_prime[i] = (rhs[i] - lower * d_prime[i - 1]) / denom;
    }

    let mut x = vec![Vec3::ZERO; n];
    x[n - 1] = d_prime[n - 1];
    for i in (0..n - 1).rev() {
        x[i] = d_prime[i] - c_prime[i] * x[i + 1];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn scenario_knots() -> Vec<Vec3> {
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(5.0, 5.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::new(0.0, 15.0, 0.0),
        ]
    }

    #[test]
    fn four_knots_give_three_cubic_segments() {
        let knots = scenario_knots();
        let segments = fit_segments(&knots);
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|segment| segment.len() == 4));
        assert_eq!(segments[0][0], Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(segments[2][3], Vec3::new(0.0, 15.0, 0.0));
    }

    #[test]
    fn segments_share_their_knots() {
        let knots = scenario_knots();
        let segments = fit_segments(&knots);
        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(segment[0], knots[i]);
            assert_eq!(segment[3], knots[i + 1]);
        }
    }

    #[test]
    fn two_knots_give_a_linear_segment() {
        let segments = fit_segments(&[Vec3::ZERO, Vec3::X]);
        assert_eq!(segments, vec![vec![Vec3::ZERO, Vec3::X]]);
    }

    #[test]
    fn fewer_than_two_knots_give_nothing() {
        assert!(fit_segments(&[]).is_empty());
        assert!(fit_segments(&[Vec3::ONE]).is_empty());
    }

    #[test]
    fn thomas_matches_dense_solution() {
        // 3x3 system with diagonal 4 and off-diagonals 1.
        let rhs = [
            Vec3::new(5.0, 1.0, 0.0),
            Vec3::new(6.0, 2.0, 0.0),
            Vec3::new(5.0, 3.0, 0.0),
        ];
        let x = solve_tridiagonal(1.0, 4.0, 1.0, &rhs);
        for i in 0..3 {
            let left = if i > 0 { x[i - 1] } else { Vec3::ZERO };
            let right = if i < 2 { x[i + 1] } else { Vec3::ZERO };
            let row = left + 4.0 * x[i] + right;
            assert_abs_diff_eq!(row.x, rhs[i].x, epsilon = 1e-5);
            assert_abs_diff_eq!(row.y, rhs[i].y, epsilon = 1e-5);
        }
        assert_abs_diff_eq!(x[0].x, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(x[1].x, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(x[2].x, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn collinear_evenly_spaced_knots_stay_on_the_line() {
        let knots: Vec<Vec3> = (0..5).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        for segment in fit_segments(&knots) {
            for point in segment {
                assert_abs_diff_eq!(point.y, 0.0, epsilon = 1e-6);
                assert_abs_diff_eq!(point.z, 0.0, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn interior_derivatives_are_continuous() {
        let knots = scenario_knots();
        let segments = fit_segments(&knots);
        for pair in segments.windows(2) {
            let outgoing = pair[0][3] - pair[0][2];
            let incoming = pair[1][1] - pair[1][0];
            assert_abs_diff_eq!(outgoing.x, incoming.x, epsilon = 1e-4);
            assert_abs_diff_eq!(outgoing.y, incoming.y, epsilon = 1e-4);
            assert_abs_diff_eq!(outgoing.z, incoming.z, epsilon = 1e-4);
        }
    }

    #[test]
    #[should_panic(expected = "diagonally dominant")]
    fn non_dominant_system_is_rejected() {
        solve_tridiagonal(1.0, 2.0, 1.0, &[Vec3::ONE]);
    }
}
