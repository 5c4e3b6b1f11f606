//! Bounded root finding along the interpolation between two module velocities

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use util::maths::{clamp, epsilon_equals, unwrap_angle};

use super::EPSILON;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Iteration budget when limiting the steering rate.
pub const MAX_STEER_ITERATIONS: i32 = 8;

/// Iteration budget when limiting the drive acceleration.
pub const MAX_DRIVE_ITERATIONS: i32 = 10;

/// A guess this close to the root is accepted from either side.
const ROOT_TOLERANCE: f64 = 1e-12;

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Find `s` in [0, 1] such that `func` evaluated at the point `s` of the way from `(x_0, y_0)` to
/// `(x_1, y_1)` is zero, given `f_0` and `f_1`, the values of `func` at the two ends.
///
/// This is regula falsi with the Illinois modification and a fixed iteration budget. The bracket
/// is narrowed around each guess and the guesses are composed back into a position on the
/// original interval. Apart from guesses within `ROOT_TOLERANCE` of the root, the returned `s`
/// always lies on the same side of the root as `s = 0`, so when the budget is spent the feasible
/// end of the bracket is returned rather than the latest guess.
#[allow(clippy::too_many_arguments)]
pub fn find_root<F>(
    func: F,
    x_0: f64,
    y_0: f64,
    f_0: f64,
    x_1: f64,
    y_1: f64,
    f_1: f64,
    max_iterations: i32,
) -> f64
where
    F: Fn(f64, f64) -> f64,
{
    let (mut x_0, mut y_0, mut f_0) = (x_0, y_0, f_0);
    let (mut x_1, mut y_1, mut f_1) = (x_1, y_1, f_1);

    if f_0 == 0.0 {
        return 0.0;
    }
    let feasible_negative = f_0.is_sign_negative();

    // The result is `base + scale * s` where `s` is the root within the current bracket
    let mut base = 0.0;
    let mut scale = 1.0;
    let mut iterations_left = max_iterations;
    let mut last_kept: Option<bool> = None;

    while iterations_left >= 0 {
        let s_guess = clamp(&(-f_0 / (f_1 - f_0)), &0.0, &1.0);

        if epsilon_equals(f_0, f_1, EPSILON) || s_guess.is_nan() {
            break;
        }

        let x_guess = (x_1 - x_0) * s_guess + x_0;
        let y_guess = (y_1 - y_0) * s_guess + y_0;
        let f_guess = func(x_guess, y_guess);

        if f_guess.abs() < ROOT_TOLERANCE {
            return base + scale * s_guess;
        }

        if f_guess.is_sign_negative() == feasible_negative {
            // Root is in the upper bracket
            base += scale * s_guess;
            scale *= 1.0 - s_guess;
            x_0 = x_guess;
            y_0 = y_guess;
            f_0 = f_guess;

            // Upper end kept twice, so pull it towards the root
            if last_kept == Some(true) {
                f_1 *= 0.5;
            }
            last_kept = Some(true);
        } else {
            // Root is in the lower bracket
            scale *= s_guess;
            x_1 = x_guess;
            y_1 = y_guess;
            f_1 = f_guess;

            if last_kept == Some(false) {
                f_0 *= 0.5;
            }
            last_kept = Some(false);
        }

        iterations_left -= 1;
    }

    base
}

/// Largest `s` for which the heading of the interpolated velocity has turned no more than
/// `max_deviation_rad` away from `heading_0_rad`.
pub fn find_steering_max_s(
    x_0: f64,
    y_0: f64,
    heading_0_rad: f64,
    x_1: f64,
    y_1: f64,
    heading_1_rad: f64,
    max_deviation_rad: f64,
) -> f64 {
    let heading_1_rad = unwrap_angle(heading_0_rad, heading_1_rad);
    let diff = heading_1_rad - heading_0_rad;

    if diff.abs() <= max_deviation_rad {
        return 1.0;
    }

    let offset = heading_0_rad + max_deviation_rad.copysign(diff);
    let func = |x: f64, y: f64| unwrap_angle(heading_0_rad, y.atan2(x)) - offset;

    find_root(
        func,
        x_0,
        y_0,
        heading_0_rad - offset,
        x_1,
        y_1,
        heading_1_rad - offset,
        MAX_STEER_ITERATIONS,
    )
}

/// Largest `s` for which the speed of the interpolated velocity differs from the initial speed
/// by no more than `max_vel_step_ms`.
pub fn find_drive_max_s(x_0: f64, y_0: f64, x_1: f64, y_1: f64, max_vel_step_ms: f64) -> f64 {
    let speed_0 = x_0.hypot(y_0);
    let speed_1 = x_1.hypot(y_1);
    let diff = speed_1 - speed_0;

    if diff.abs() <= max_vel_step_ms {
        return 1.0;
    }

    let offset = speed_0 + max_vel_step_ms.copysign(diff);
    let func = |x: f64, y: f64| x.hypot(y) - offset;

    find_root(
        func,
        x_0,
        y_0,
        speed_0 - offset,
        x_1,
        y_1,
        speed_1 - offset,
        MAX_DRIVE_ITERATIONS,
    )
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_find_root_linear() {
        // A linear function is solved exactly by the first guess
        let s = find_root(|x, _| x - 0.25, 0.0, 0.0, -0.25, 1.0, 0.0, 0.75, 10);
        assert!((s - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_find_root_stays_feasible() {
        // Strongly curved function with a tiny budget, the result must not pass the root
        let root = 0.3f64.powi(4);
        for iterations in 0..6 {
            let s = find_root(
                |x, _| x.powi(4) - root,
                0.0,
                0.0,
                -root,
                1.0,
                0.0,
                1.0 - root,
                iterations,
            );
            assert!(s >= 0.0 && s <= 0.3, "s = {} after {} iterations", s, iterations);
        }

        // Decreasing function, the feasible side is positive
        let s = find_root(|x, _| 0.5 - x.sqrt(), 0.0, 0.0, 0.5, 1.0, 0.0, -0.5, 1);
        assert!(0.5 - s.sqrt() >= 0.0);

        // Enough iterations converge from the feasible side
        let s = find_root(|x, _| x.powi(4) - root, 0.0, 0.0, -root, 1.0, 0.0, 1.0 - root, 40);
        assert!(s <= 0.3 && (s - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_drive_no_limit() {
        assert_eq!(find_drive_max_s(1.0, 0.0, 1.5, 0.0, 1.0), 1.0);
    }

    #[test]
    fn test_drive_limited() {
        // Accelerating along a line, the speed is linear in s
        let s = find_drive_max_s(1.0, 0.0, 3.0, 0.0, 0.5);
        assert!((s - 0.25).abs() < 1e-9);

        // Decelerating
        let s = find_drive_max_s(2.0, 0.0, 0.5, 0.0, 0.3);
        assert!((s - 0.2).abs() < 1e-9);

        // Changing direction, the speed along the path is not linear in s
        let s = find_drive_max_s(1.0, 0.0, 0.0, 3.0, 0.5);
        let (x, y) = (1.0 - s, 3.0 * s);
        assert!(s > 0.0 && s < 1.0);
        assert!(x.hypot(y) <= 1.5 + 1e-9);
        assert!((x.hypot(y) - 1.5).abs() < 1e-3);
    }

    #[test]
    fn test_steering_no_limit() {
        assert_eq!(find_steering_max_s(1.0, 0.0, 0.0, 1.0, 0.1, 0.1, 0.2), 1.0);
    }

    #[test]
    fn test_steering_limited() {
        let target = PI / 3.0;
        let (x_1, y_1) = (target.cos(), target.sin());

        let s = find_steering_max_s(1.0, 0.0, 0.0, x_1, y_1, target, 0.2);
        let heading = (y_1 * s).atan2(1.0 + (x_1 - 1.0) * s);

        assert!(s > 0.0 && s < 1.0);
        assert!(heading <= 0.2 + 1e-9);
        assert!((heading - 0.2).abs() < 1e-3);
    }

    #[test]
    fn test_steering_across_pi() {
        // Turning from just below +pi to just above -pi is a small positive rotation
        let h_0 = PI - 0.1;
        let h_1 = -PI + 0.3;
        let (x_0, y_0) = (h_0.cos(), h_0.sin());
        let (x_1, y_1) = (h_1.cos(), h_1.sin());

        let s = find_steering_max_s(x_0, y_0, h_0, x_1, y_1, h_1, 0.2);
        assert!(s > 0.3 && s < 0.7);

        let heading = (y_0 + (y_1 - y_0) * s).atan2(x_0 + (x_1 - x_0) * s);
        assert!(unwrap_angle(h_0, heading) <= h_0 + 0.2 + 1e-9);
        assert!((unwrap_angle(h_0, heading) - (h_0 + 0.2)).abs() < 1e-3);
    }
}
