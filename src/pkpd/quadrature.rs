//! Adaptive Simpson quadrature used by the conversion-model drug factor
//! (§4.5) and, for uniformity, by every other compartment model's kill
//! integral too (see DESIGN.md for why we didn't special-case the
//! one-compartment ₂F₁ closed form).

use crate::error::CoreError;

const DEFAULT_ABS_TOL: f64 = 1e-3;
const DEFAULT_REL_TOL: f64 = 1e-3;
const MAX_DEPTH: u32 = 20;

fn simpson(a: f64, b: f64, fa: f64, fb: f64, fm: f64) -> f64 {
    (b - a) / 6.0 * (fa + 4.0 * fm + fb)
}

#[allow(clippy::too_many_arguments)]
fn adaptive_step(
    f: &mut dyn FnMut(f64) -> f64,
    a: f64,
    b: f64,
    fa: f64,
    fb: f64,
    fm: f64,
    whole: f64,
    abs_tol: f64,
    rel_tol: f64,
    depth: u32,
) -> Result<f64, CoreError> {
    let mid = (a + b) / 2.0;
    let lm = (a + mid) / 2.0;
    let rm = (mid + b) / 2.0;
    let flm = f(lm);
    let frm = f(rm);
    let left = simpson(a, mid, fa, fm, flm);
    let right = simpson(mid, b, fm, fb, frm);
    let refined = left + right;

    let tol = abs_tol.max(rel_tol * refined.abs());
    if depth >= MAX_DEPTH {
        if (refined - whole).abs() > 15.0 * tol.max(abs_tol) {
            return Err(CoreError::Numerical {
                message: format!(
                    "adaptive quadrature failed to converge after {MAX_DEPTH} levels (residual {:.3e})",
                    (refined - whole).abs()
                ),
                dump_path: None,
            });
        }
        return Ok(refined);
    }
    if (refined - whole).abs() <= 15.0 * tol {
        return Ok(refined + (refined - whole) / 15.0);
    }

    let left_r = adaptive_step(f, a, mid, fa, fm, flm, left, abs_tol / 2.0, rel_tol, depth + 1)?;
    let right_r = adaptive_step(f, mid, b, fm, fb, frm, right, abs_tol / 2.0, rel_tol, depth + 1)?;
    Ok(left_r + right_r)
}

/// Integrate `f` over `[a, b]` with adaptive Simpson quadrature. Returns a
/// `CoreError::Numerical` if the requested tolerance isn't reached within
/// the iteration budget (§7 numerical error; fatal by contract).
pub fn integrate(
    mut f: impl FnMut(f64) -> f64,
    a: f64,
    b: f64,
    abs_tol: Option<f64>,
    rel_tol: Option<f64>,
) -> Result<f64, CoreError> {
    if b <= a {
        return Ok(0.0);
    }
    let abs_tol = abs_tol.unwrap_or(DEFAULT_ABS_TOL);
    let rel_tol = rel_tol.unwrap_or(DEFAULT_REL_TOL);
    let fa = f(a);
    let fb = f(b);
    let mid = (a + b) / 2.0;
    let fm = f(mid);
    let whole = simpson(a, b, fa, fb, fm);
    adaptive_step(&mut f, a, b, fa, fb, fm, whole, abs_tol, rel_tol, 0)
}
