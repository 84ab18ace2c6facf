//! The α_t root-finder for sugar-bait ("attractive toxic sugar bait",
//! ATSB) style seeking-death interventions (§4.1).
//!
//! Solves `(1 - exp(-(alpha + nu_a) * theta_d)) * alpha / (alpha + nu_a) = pi`
//! for `alpha >= 0` given a target kill probability `pi` in `(0, 1)`.
//!
//! The initial bracket is chosen by doubling from zero until the residual
//! exceeds the target (see DESIGN.md for why this is a safe choice: the
//! open question left the exact bracketing algorithm unspecified, and
//! the residual is monotonically increasing in alpha for all nu_a > 0,
//! theta_d in (0, 1]).

use crate::error::CoreError;

const MAX_BRACKET_DOUBLINGS: u32 = 64;
const MAX_BISECTION_ITERS: u32 = 200;
const TOLERANCE: f64 = 1e-10;

fn residual(alpha: f64, nu_a: f64, theta_d: f64) -> f64 {
    let denom = alpha + nu_a;
    if denom <= 0.0 {
        return 0.0;
    }
    (1.0 - (-(denom) * theta_d).exp()) * alpha / denom
}

/// Solve for `alpha_t` given `nu_a`, `theta_d`, and target probability
/// `pi`. Fails with `CoreError::Numerical` if no bracket or convergence is
/// found within the iteration budget (§5 cancellation/timeouts).
pub fn solve_alpha_t(nu_a: f64, theta_d: f64, pi: f64) -> Result<f64, CoreError> {
    if !(0.0..1.0).contains(&pi) {
        return Err(CoreError::Range {
            message: format!("alpha_t target probability {pi} must be in [0, 1)"),
        });
    }
    if pi == 0.0 {
        return Ok(0.0);
    }

    let mut lo = 0.0;
    let mut hi = 1.0;
    let mut doublings = 0;
    while residual(hi, nu_a, theta_d) < pi {
        hi *= 2.0;
        doublings += 1;
        if doublings > MAX_BRACKET_DOUBLINGS {
            return Err(CoreError::Numerical {
                message: format!(
                    "alpha_t root-finder failed to bracket a root after {MAX_BRACKET_DOUBLINGS} doublings (pi={pi}, nu_a={nu_a}, theta_d={theta_d})"
                ),
                dump_path: None,
            });
        }
    }

    for _ in 0..MAX_BISECTION_ITERS {
        let mid = 0.5 * (lo + hi);
        let r = residual(mid, nu_a, theta_d);
        if (r - pi).abs() < TOLERANCE {
            return Ok(mid);
        }
        if r < pi {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Err(CoreError::Numerical {
        message: format!(
            "alpha_t root-finder did not converge within {MAX_BISECTION_ITERS} iterations (pi={pi}, nu_a={nu_a}, theta_d={theta_d})"
        ),
        dump_path: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn residual_is_monotonic_in_alpha() {
        let nu_a = 0.3;
        let theta_d = 0.3;
        let mut prev = residual(0.0, nu_a, theta_d);
        let mut alpha = 0.01;
        while alpha < 1000.0 {
            let r = residual(alpha, nu_a, theta_d);
            assert!(r >= prev - 1e-12);
            prev = r;
            alpha *= 1.5;
        }
    }

    #[test]
    fn solved_alpha_reproduces_target_probability() {
        let nu_a = 0.5;
        let theta_d = 0.3;
        let pi = 0.4;
        let alpha = solve_alpha_t(nu_a, theta_d, pi).unwrap();
        let achieved = residual(alpha, nu_a, theta_d);
        assert_abs_diff_eq!(achieved, pi, epsilon = 1e-6);
    }

    #[test]
    fn zero_target_probability_yields_zero_alpha() {
        assert_eq!(solve_alpha_t(1.0, 0.3, 0.0).unwrap(), 0.0);
    }

    #[test]
    fn rejects_probability_at_or_above_one() {
        assert!(solve_alpha_t(1.0, 0.3, 1.0).is_err());
    }
}
