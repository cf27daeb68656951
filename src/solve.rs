use miette::*;
use rayon::prelude::*;

use crate::machine::Machine;

/// Per-machine solver verdict. Infeasibility is an explicit value so an
/// unsolvable machine can never leak a placeholder count into a total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Feasible(u64),
    Infeasible,
}

/// Sums the per-machine minima over all machines in parallel.
///
/// A single infeasible machine aborts the whole aggregate with an error
/// naming its position; the policy is the same for both press models.
pub fn total<F>(machines: &[Machine], solver: F) -> Result<u64>
where
    F: Fn(&Machine) -> Result<Outcome> + Sync,
{
    machines
        .par_iter()
        .enumerate()
        .map(|(i, machine)| match solver(machine)? {
            Outcome::Feasible(presses) => Ok(presses),
            Outcome::Infeasible => Err(miette!("machine {} has no solution", i + 1)),
        })
        .try_reduce(|| 0, |a, b| Ok(a + b))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{machine, toggle};

    #[test]
    fn sums_over_machines() -> Result<()> {
        let machines = machine::parse("[#] (0) {1}\n[##] (0) (1) {1,1}")?;
        assert_eq!(total(&machines, toggle::min_presses)?, 3);
        Ok(())
    }

    #[test]
    fn infeasible_machine_aborts_the_total() -> Result<()> {
        // Button (0,0) toggles counter 0 twice, so the lit target is
        // unreachable.
        let machines = machine::parse("[#] (0) {1}\n[#] (0,0) {2}")?;
        let err = total(&machines, toggle::min_presses).unwrap_err();
        assert!(err.to_string().contains("machine 2"));
        Ok(())
    }
}
