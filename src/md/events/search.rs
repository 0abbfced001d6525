/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use crate::errors::EventError;

/// A sign change of a switching function between two times (in seconds from an arbitrary reference).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bracket {
    pub xa: f64,
    pub ya: f64,
    pub xb: f64,
    pub yb: f64,
}

impl Bracket {
    /// Returns true if the switching function changes sign (or vanishes) within this bracket.
    pub fn is_valid(&self) -> bool {
        self.ya * self.yb <= 0.0
    }
}

/// Outcome of the root search
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RootSearch {
    /// The root, as the bound of the converged bracket which is the furthest along the search direction
    Converged(f64),
    /// The bracket did not shrink below the threshold within the allowed number of iterations
    NotConverged { iterations: usize },
}

/// Find the time where the switching function `g` vanishes within the provided bracket, using a Brent solver.
///
/// The function is expected to be monotone in the provided interval. The search converges when the bracket is
/// smaller than `threshold_s`, and the returned time is on the side of the bracket pointing along `forward`, such
/// that the switching function has already changed sign at that time (unless it is exactly zero).
pub fn brent<F>(
    mut g: F,
    bracket: Bracket,
    threshold_s: f64,
    max_iterations: usize,
    forward: bool,
) -> Result<RootSearch, EventError>
where
    F: FnMut(f64) -> Result<f64, EventError>,
{
    // Helper lambdas, for f64s only
    let has_converged = |xa: f64, xb: f64| (xa - xb).abs() <= threshold_s;
    let arrange = |a: f64, ya: f64, b: f64, yb: f64| {
        if ya.abs() > yb.abs() {
            (a, ya, b, yb)
        } else {
            (b, yb, a, ya)
        }
    };
    let furthest = |a: f64, b: f64| if forward { a.max(b) } else { a.min(b) };

    // Check if we're already at the root
    if bracket.yb == 0.0 {
        return Ok(RootSearch::Converged(bracket.xb));
    } else if bracket.ya == 0.0 {
        return Ok(RootSearch::Converged(bracket.xa));
    }

    let (mut xa, mut ya, mut xb, mut yb) = arrange(bracket.xa, bracket.ya, bracket.xb, bracket.yb);

    // The Brent solver, from the roots crate
    // Source: https://docs.rs/roots/0.0.5/src/roots/numerical/brent.rs.html#57-131
    let (mut xc, mut yc, mut xd) = (xa, ya, xa);
    let mut flag = true;

    for _ in 0..max_iterations {
        if yb == 0.0 {
            return Ok(RootSearch::Converged(xb));
        }
        if has_converged(xa, xb) {
            return Ok(RootSearch::Converged(furthest(xa, xb)));
        }
        let mut s = if (ya - yc).abs() > f64::EPSILON && (yb - yc).abs() > f64::EPSILON {
            // Inverse quadratic interpolation
            xa * yb * yc / ((ya - yb) * (ya - yc))
                + xb * ya * yc / ((yb - ya) * (yb - yc))
                + xc * ya * yb / ((yc - ya) * (yc - yb))
        } else {
            // Secant
            xb - yb * (xb - xa) / (yb - ya)
        };
        let cond1 = (s - xb) * (s - (3.0 * xa + xb) / 4.0) > 0.0;
        let cond2 = flag && (s - xb).abs() >= (xb - xc).abs() / 2.0;
        let cond3 = !flag && (s - xb).abs() >= (xc - xd).abs() / 2.0;
        let cond4 = flag && has_converged(xb, xc);
        let cond5 = !flag && has_converged(xc, xd);
        if cond1 || cond2 || cond3 || cond4 || cond5 {
            s = (xa + xb) / 2.0;
            flag = true;
        } else {
            flag = false;
        }
        let ys = g(s)?;
        xd = xc;
        xc = xb;
        yc = yb;
        if ya * ys < 0.0 {
            // Root bracketed between a and s
            (xa, ya, xb, yb) = arrange(xa, ya, s, ys);
        } else {
            // Root bracketed between s and b
            (xa, ya, xb, yb) = arrange(s, ys, xb, yb);
        }
    }

    if has_converged(xa, xb) {
        return Ok(RootSearch::Converged(furthest(xa, xb)));
    }

    error!("Brent solver failed after {max_iterations} iterations");
    Ok(RootSearch::NotConverged {
        iterations: max_iterations,
    })
}
