//! Increment-model solver: minimum total presses so that every counter's
//! press total matches the target counts exactly.
//!
//! This is an integer program, `min Σx` subject to `A·x = c`, `x ∈ ℤ≥0`.
//! Stages, cheapest first: a two-phase simplex solve of the continuous
//! relaxation, a rounding fast path checked exactly in integer arithmetic,
//! and a branch-and-bound search over bounded relaxations as the fallback
//! that guarantees the optimum.

use miette::*;
use nalgebra::{DMatrix, DVector};

use crate::machine::Machine;
use crate::solve::Outcome;

/// Numerical epsilon for comparing floating point values to zero.
const EPS: f64 = 1e-9;

/// Phase 1 feasibility tolerance, loose enough to absorb float drift when
/// targets reach the 10^13 range.
const FEASIBILITY_TOL: f64 = 1e-4;

/// Tolerance for treating a relaxation value as an integer. Acceptance is
/// always re-checked exactly in `u64` arithmetic.
const INT_TOL: f64 = 1e-3;

/// Tolerance for pruning branches against the incumbent.
const PRUNE_TOL: f64 = 1e-5;

/// Simplex pivot cap per relaxation solve.
const MAX_PIVOTS: usize = 5_000;

/// Branch-and-bound node budget per machine; blowing it fails the machine
/// explicitly rather than hanging.
const MAX_NODES: usize = 100_000;

struct LpSolution {
    x: Vec<f64>,
    cost: f64,
}

/// Dense simplex tableau with an explicit basis column per constraint row.
/// The last row holds reduced costs, the last column the right-hand side.
struct Tableau {
    t: DMatrix<f64>,
    basis: Vec<usize>,
    rows: usize,
    rhs: usize,
}

impl Tableau {
    /// Installs a cost vector and prices out the current basis so the
    /// objective row holds canonical reduced costs.
    fn set_objective(&mut self, cost: &[f64]) {
        for c in 0..self.rhs {
            self.t[(self.rows, c)] = cost[c];
        }
        self.t[(self.rows, self.rhs)] = 0.0;

        for r in 0..self.rows {
            let factor = self.t[(self.rows, self.basis[r])];
            if factor.abs() > EPS {
                for c in 0..=self.rhs {
                    let v = self.t[(r, c)];
                    self.t[(self.rows, c)] -= factor * v;
                }
            }
        }
    }

    fn pivot(&mut self, pr: usize, pc: usize) {
        let inv = 1.0 / self.t[(pr, pc)];
        for c in 0..=self.rhs {
            self.t[(pr, c)] *= inv;
        }

        for r in 0..=self.rows {
            if r == pr {
                continue;
            }
            let factor = self.t[(r, pc)];
            if factor.abs() > EPS {
                for c in 0..=self.rhs {
                    let v = self.t[(pr, c)];
                    self.t[(r, c)] -= factor * v;
                }
            }
        }

        self.basis[pr] = pc;
    }

    /// Pivots to optimality. Entering column is the first with a negative
    /// reduced cost (Bland), leaving row by minimum ratio; only the first
    /// `eligible` columns may enter, which keeps artificials out in phase 2.
    fn optimize(&mut self, eligible: usize) -> Result<()> {
        for _ in 0..MAX_PIVOTS {
            let Some(pc) = (0..eligible).find(|&c| self.t[(self.rows, c)] < -EPS) else {
                return Ok(());
            };

            // Minimum ratio, ties broken by lowest basis column (Bland) so
            // degenerate pivots cannot cycle.
            let mut pr: Option<usize> = None;
            let mut best = f64::INFINITY;
            for r in 0..self.rows {
                let v = self.t[(r, pc)];
                if v > EPS {
                    let ratio = self.t[(r, self.rhs)] / v;
                    let better = match pr {
                        None => true,
                        Some(p) => {
                            ratio < best - EPS
                                || ((ratio - best).abs() <= EPS && self.basis[r] < self.basis[p])
                        }
                    };
                    if better {
                        best = ratio;
                        pr = Some(r);
                    }
                }
            }

            let Some(pr) = pr else {
                bail!("press relaxation is unbounded");
            };
            self.pivot(pr, pc);
        }
        bail!("simplex did not converge within {MAX_PIVOTS} pivots");
    }

    fn value(&self) -> f64 {
        -self.t[(self.rows, self.rhs)]
    }
}

/// Solves `min Σx` subject to `A·x = b` and `lo ≤ x ≤ hi` with a two-phase
/// simplex. `Ok(None)` means the bounded relaxation is infeasible.
fn solve_relaxation(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    lo: &[u64],
    hi: &[Option<u64>],
) -> Result<Option<LpSolution>> {
    let n = a.ncols();

    // Shift by the lower bounds so every variable starts at zero.
    let shift = DVector::from_iterator(n, lo.iter().map(|&v| v as f64));
    let shifted = b - a * &shift;

    // Remaining headroom for the upper-bounded variables.
    let mut caps = Vec::new();
    for j in 0..n {
        if let Some(h) = hi[j] {
            if h < lo[j] {
                return Ok(None);
            }
            caps.push((j, (h - lo[j]) as f64));
        }
    }

    let eq_rows = a.nrows();
    let rows = eq_rows + caps.len();
    let slack = n;
    let arts = n + caps.len();
    let rhs = arts + eq_rows;

    let mut t = DMatrix::zeros(rows + 1, rhs + 1);
    let mut basis = vec![0; rows];

    // Equality rows carry an artificial basis variable; bound rows use
    // their slack directly since their right-hand side is non-negative.
    for r in 0..eq_rows {
        let sign = if shifted[r] < 0.0 { -1.0 } else { 1.0 };
        for c in 0..n {
            t[(r, c)] = sign * a[(r, c)];
        }
        t[(r, arts + r)] = 1.0;
        t[(r, rhs)] = sign * shifted[r];
        basis[r] = arts + r;
    }
    for (i, &(j, cap)) in caps.iter().enumerate() {
        let r = eq_rows + i;
        t[(r, j)] = 1.0;
        t[(r, slack + i)] = 1.0;
        t[(r, rhs)] = cap;
        basis[r] = slack + i;
    }

    let mut tableau = Tableau { t, basis, rows, rhs };

    // Phase 1: minimize the artificial total down to zero.
    let mut phase1 = vec![0.0; rhs];
    for c in arts..rhs {
        phase1[c] = 1.0;
    }
    tableau.set_objective(&phase1);
    tableau.optimize(arts)?;
    if tableau.value() > FEASIBILITY_TOL {
        return Ok(None);
    }

    // Drive leftover zero-valued artificials out of the basis; a row with
    // no eligible pivot is redundant and stays inert.
    for r in 0..rows {
        if tableau.basis[r] >= arts {
            if let Some(pc) = (0..arts).find(|&c| tableau.t[(r, c)].abs() > EPS) {
                tableau.pivot(r, pc);
            }
        }
    }

    // Phase 2: minimize the total press count.
    let mut phase2 = vec![0.0; rhs];
    for c in 0..n {
        phase2[c] = 1.0;
    }
    tableau.set_objective(&phase2);
    tableau.optimize(arts)?;

    let mut x = vec![0.0; n];
    for r in 0..tableau.rows {
        if tableau.basis[r] < n {
            x[tableau.basis[r]] = tableau.t[(r, rhs)].max(0.0);
        }
    }
    for (xj, &l) in x.iter_mut().zip(lo) {
        *xj += l as f64;
    }
    let cost = x.iter().sum();

    Ok(Some(LpSolution { x, cost }))
}

/// Increment matrix and target vector, with multiplicities: a button listing
/// a counter twice adds 2 per press.
fn increment_system(machine: &Machine) -> (DMatrix<f64>, DVector<f64>) {
    let n = machine.counters();
    let mut a = DMatrix::zeros(n, machine.buttons.len());
    for (j, button) in machine.buttons.iter().enumerate() {
        for &i in button {
            a[(i, j)] += 1.0;
        }
    }
    let b = DVector::from_iterator(n, machine.target_counts.iter().map(|&v| v as f64));
    (a, b)
}

/// The most fractional coordinate of a relaxation solution, if any.
fn most_fractional(x: &[f64]) -> Option<(usize, f64)> {
    x.iter()
        .enumerate()
        .map(|(j, &v)| (j, v, (v - v.round()).abs()))
        .filter(|&(_, _, frac)| frac > INT_TOL)
        .max_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(j, v, _)| (j, v))
}

/// Branch coordinate for a point that looks integral but fails exact
/// verification: the variable with the largest rounding residue among those
/// touching a mismatched counter. `None` when no button can move a
/// mismatched counter.
fn drift_split(machine: &Machine, x: &[f64], candidate: &[u64]) -> Option<(usize, f64)> {
    let counts = machine.simulate_counts(candidate);
    let mismatched: Vec<usize> = counts
        .iter()
        .zip(&machine.target_counts)
        .enumerate()
        .filter(|(_, (got, want))| got != want)
        .map(|(i, _)| i)
        .collect();

    machine
        .buttons
        .iter()
        .enumerate()
        .filter(|(_, button)| button.iter().any(|i| mismatched.contains(i)))
        .map(|(j, _)| (j, x[j]))
        .max_by(|a, b| {
            let ra = (a.1 - a.1.round()).abs();
            let rb = (b.1 - b.1.round()).abs();
            ra.total_cmp(&rb)
        })
}

/// Tries nearest, ceiling, and floor of the relaxation point. A candidate is
/// accepted only if it reproduces the targets exactly and meets the
/// relaxation lower bound, which proves it optimal without any search.
fn rounded_candidate(machine: &Machine, x: &[f64], lower_bound: u64) -> Option<u64> {
    let strategies: [fn(f64) -> f64; 3] = [f64::round, f64::ceil, f64::floor];

    for rounder in strategies {
        let candidate: Vec<u64> = x.iter().map(|&v| rounder(v).max(0.0) as u64).collect();
        let total: u64 = candidate.iter().sum();
        if total == lower_bound && machine.simulate_counts(&candidate) == machine.target_counts {
            return Some(total);
        }
    }

    None
}

/// Depth-first branch-and-bound over per-variable integer bounds. Every
/// incumbent is verified exactly in `u64` arithmetic before it is kept.
fn branch_and_bound(machine: &Machine, a: &DMatrix<f64>, b: &DVector<f64>) -> Result<Outcome> {
    let n = a.ncols();
    let mut best: Option<u64> = None;
    let mut nodes = 0usize;
    let mut stack = vec![(vec![0u64; n], vec![None; n])];

    while let Some((lo, hi)) = stack.pop() {
        nodes += 1;
        if nodes > MAX_NODES {
            bail!("integer press search exceeded {MAX_NODES} nodes");
        }

        let Some(sol) = solve_relaxation(a, b, &lo, &hi)? else {
            continue;
        };
        if best.is_some_and(|bv| sol.cost >= bv as f64 - PRUNE_TOL) {
            continue;
        }

        let branch_var = match most_fractional(&sol.x) {
            Some(split) => Some(split),
            None => {
                let candidate: Vec<u64> =
                    sol.x.iter().map(|&v| v.round().max(0.0) as u64).collect();
                if machine.simulate_counts(&candidate) == machine.target_counts {
                    let total = candidate.iter().sum();
                    if best.map_or(true, |bv| total < bv) {
                        best = Some(total);
                    }
                    None
                } else {
                    // Float drift at large magnitudes can make a point look
                    // integral while the exact check disagrees; branch
                    // around the worst coordinate instead of abandoning the
                    // subtree.
                    drift_split(machine, &sol.x, &candidate)
                }
            }
        };

        if let Some((j, v)) = branch_var {
            let split = v.floor().max(0.0) as u64;

            // Only push branches that strictly tighten the box, so a
            // drift-suspect coordinate sitting on an integer cannot respawn
            // the same node forever.
            let below = hi[j].map_or(true, |h| split < h).then(|| {
                let mut node = (lo.clone(), hi.clone());
                node.1[j] = Some(node.1[j].map_or(split, |h: u64| h.min(split)));
                node
            });
            let above = (lo[j] <= split).then(|| {
                let mut node = (lo.clone(), hi.clone());
                node.0[j] = split + 1;
                node
            });

            // Pop the branch nearest the fractional value first.
            let (far, near) = if v - v.floor() < 0.5 {
                (above, below)
            } else {
                (below, above)
            };
            stack.extend(far);
            stack.extend(near);
        }
    }

    tracing::debug!(nodes, "integer press search finished");
    Ok(best.map_or(Outcome::Infeasible, Outcome::Feasible))
}

/// Minimum total press count whose per-counter sums hit `target_counts`
/// exactly.
pub fn min_presses(machine: &Machine) -> Result<Outcome> {
    let (a, b) = increment_system(machine);
    let n = a.ncols();
    let unbounded = (vec![0; n], vec![None; n]);

    let Some(relaxed) = solve_relaxation(&a, &b, &unbounded.0, &unbounded.1)? else {
        return Ok(Outcome::Infeasible);
    };
    let lower_bound = (relaxed.cost - INT_TOL).ceil().max(0.0) as u64;

    if let Some(total) = rounded_candidate(machine, &relaxed.x, lower_bound) {
        return Ok(Outcome::Feasible(total));
    }

    let outcome = branch_and_bound(machine, &a, &b)?;
    if let Outcome::Feasible(total) = outcome {
        debug_assert!(total >= lower_bound);
    }
    Ok(outcome)
}
