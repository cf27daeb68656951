//! Toggle-model solver: minimum number of distinct buttons to press so that
//! every counter's press parity matches the target bits.
//!
//! Presses commute and pressing a button twice cancels, so the problem is
//! `A·x = t` over GF(2) with `x` of minimum Hamming weight. Gaussian
//! elimination yields one particular solution plus a null-space basis; the
//! minimum is found by scanning the particular solution XOR every basis
//! subset.

use bitvec::prelude::*;
use itertools::Itertools;
use miette::*;

use crate::machine::Machine;
use crate::solve::Outcome;

/// Scanning the solution space costs `2^k` for `k` free press variables.
/// Machines beyond this are rejected instead of attempted.
pub const MAX_FREE_VARS: usize = 20;

type Row = BitVec<usize, Lsb0>;

/// Augmented GF(2) system `[A | t]` over the press unknowns, one row per
/// counter equation.
struct Gf2System {
    rows: Vec<Row>,
    unknowns: usize,
    /// Pivot row for each unknown column, filled during elimination.
    pivot_of: Vec<Option<usize>>,
    free: Vec<usize>,
}

impl Gf2System {
    fn build(machine: &Machine) -> Self {
        let unknowns = machine.buttons.len();
        let mut rows = vec![Row::repeat(false, unknowns + 1); machine.counters()];

        for (j, button) in machine.buttons.iter().enumerate() {
            for &i in button {
                // An even number of hits on the same counter cancels out.
                let odd = !rows[i][j];
                rows[i].set(j, odd);
            }
        }
        for i in machine.target_bits.iter_ones() {
            rows[i].set(unknowns, true);
        }

        Self {
            rows,
            unknowns,
            pivot_of: vec![None; unknowns],
            free: Vec::new(),
        }
    }

    /// Reduces the system to reduced row-echelon form with XOR row
    /// operations. Returns `false` when some equation collapses to `0 = 1`.
    fn eliminate(&mut self) -> bool {
        let mut next_row = 0;

        for col in 0..self.unknowns {
            let Some(found) = (next_row..self.rows.len()).find(|&r| self.rows[r][col]) else {
                self.free.push(col);
                continue;
            };
            self.rows.swap(next_row, found);

            let pivot = self.rows[next_row].clone();
            for (r, row) in self.rows.iter_mut().enumerate() {
                if r != next_row && row[col] {
                    *row ^= &pivot;
                }
            }

            self.pivot_of[col] = Some(next_row);
            next_row += 1;
        }

        self.rows[next_row..].iter().all(|row| !row[self.unknowns])
    }

    /// Particular solution with every free variable at zero: in RREF each
    /// pivot variable reads straight off its row's augmented bit.
    fn particular(&self) -> Row {
        let mut x = Row::repeat(false, self.unknowns);
        for (col, &pivot) in self.pivot_of.iter().enumerate() {
            if let Some(r) = pivot {
                if self.rows[r][self.unknowns] {
                    x.set(col, true);
                }
            }
        }
        x
    }

    /// One null-space basis vector per free variable: set it to 1, leave the
    /// other free variables at 0, and read the pivot variables off their
    /// rows (in RREF a pivot row only has entries in free columns).
    fn null_basis(&self) -> Vec<Row> {
        self.free
            .iter()
            .map(|&f| {
                let mut v = Row::repeat(false, self.unknowns);
                v.set(f, true);
                for (col, &pivot) in self.pivot_of.iter().enumerate() {
                    if let Some(r) = pivot {
                        if self.rows[r][f] {
                            v.set(col, true);
                        }
                    }
                }
                v
            })
            .collect()
    }
}

/// Minimum number of distinct buttons whose combined toggles reach
/// `target_bits`.
pub fn min_presses(machine: &Machine) -> Result<Outcome> {
    let mut system = Gf2System::build(machine);
    if !system.eliminate() {
        return Ok(Outcome::Infeasible);
    }

    let base = system.particular();
    let basis = system.null_basis();
    if basis.len() > MAX_FREE_VARS {
        bail!(
            "{} free press variables, solution scan is capped at {MAX_FREE_VARS}",
            basis.len()
        );
    }

    let mut best = base.count_ones();
    for subset in basis.iter().powerset() {
        let mut candidate = base.clone();
        for v in subset {
            candidate ^= v;
        }
        best = best.min(candidate.count_ones());
    }

    Ok(Outcome::Feasible(best as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    use crate::machine::{self, Machine};

    fn machine(line: &str) -> Machine {
        machine::parse(line).unwrap().remove(0)
    }

    /// Exhaustive `2^m` subset scan, simulating the toggles directly.
    fn oracle(machine: &Machine) -> Option<u64> {
        let m = machine.buttons.len();
        assert!(m < 16, "oracle is for small machines only");

        (0u32..1 << m)
            .filter_map(|mask| {
                let presses: Row = (0..m).map(|j| mask & (1 << j) != 0).collect();
                (machine.simulate_toggles(&presses) == machine.target_bits)
                    .then(|| mask.count_ones() as u64)
            })
            .min()
    }

    #[test]
    fn worked_example_machine() -> Result<()> {
        // Pressing (0,2) and (0,1) flips counters 1 and 2 and leaves 0 dark.
        let machine = machine("[.##.] (3) (1,3) (2) (2,3) (0,2) (0,1) {3,5,4,7}");
        assert_eq!(min_presses(&machine)?, Outcome::Feasible(2));
        Ok(())
    }

    #[rstest]
    #[case("[.##.] (3) (1,3) (2) (2,3) (0,2) (0,1) {3,5,4,7}")]
    #[case("[...#.] (0,2,3,4) (2,3) (0,4) (0,1,2) (1,2,3,4) {7,5,12,7,2}")]
    #[case("[.###.#] (0,1,2,3,4) (0,3,4) (0,1,2,4,5) (1,2) {10,11,11,5,10,5}")]
    #[case("[###] (0) (1) (2) (0,1,2) {1,1,1}")]
    #[case("[#..#] (0,3) (1,2) (0,1,2,3) {1,1,1,1}")]
    fn agrees_with_oracle(#[case] line: &str) -> Result<()> {
        let machine = machine(line);
        let expected = oracle(&machine).map_or(Outcome::Infeasible, Outcome::Feasible);
        assert_eq!(min_presses(&machine)?, expected);
        Ok(())
    }

    #[test]
    fn all_dark_target_needs_no_presses() -> Result<()> {
        let machine = machine("[....] (0,1) (2) (1,2,3) {0,0,0,0}");
        assert_eq!(min_presses(&machine)?, Outcome::Feasible(0));
        Ok(())
    }

    #[test]
    fn double_toggle_button_cannot_light_a_counter() -> Result<()> {
        let machine = machine("[#] (0,0) {2}");
        assert_eq!(min_presses(&machine)?, Outcome::Infeasible);
        Ok(())
    }

    #[test]
    fn unreachable_parity_is_infeasible() -> Result<()> {
        // Both buttons flip counters 0 and 1 together; only one can be lit.
        let machine = machine("[#.] (0,1) (0,1) {1,1}");
        assert_eq!(min_presses(&machine)?, Outcome::Infeasible);
        Ok(())
    }

    #[test]
    fn too_many_free_variables_is_an_error_not_a_result() {
        // 22 identical single-counter buttons leave 21 free variables, past
        // the solution-scan cap.
        let line = format!("[.] {}{{0}}", "(0) ".repeat(MAX_FREE_VARS + 2));
        let machine = machine(&line);
        let err = min_presses(&machine).unwrap_err();
        assert!(err.to_string().contains("capped"));
    }

    #[test]
    fn repeated_solves_agree() -> Result<()> {
        let machine = machine("[.##.] (3) (1,3) (2) (2,3) (0,2) (0,1) {3,5,4,7}");
        assert_eq!(min_presses(&machine)?, min_presses(&machine)?);
        Ok(())
    }
}
