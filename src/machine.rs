use bitvec::prelude::*;
use chumsky::prelude::*;
use miette::*;

/// Toggle target bits, index 0 leftmost.
pub type Bits = BitVec<usize, Lsb0>;

/// One machine, parsed from a single input line. Immutable after
/// construction; solvers derive their matrices from the raw button lists.
#[derive(Debug, Clone)]
pub struct Machine {
    /// Target parity per counter (`#` = 1, `.` = 0).
    pub target_bits: Bits,
    /// Target total per counter, index-aligned with `target_bits`.
    pub target_counts: Vec<u64>,
    /// Button `j` lists the counter indices it affects; repeats are allowed
    /// and mean the button hits that counter more than once per press.
    pub buttons: Vec<Vec<usize>>,
}

impl Machine {
    /// Number of indexed counters.
    pub fn counters(&self) -> usize {
        self.target_bits.len()
    }

    /// Per-counter totals after pressing button `j` exactly `presses[j]`
    /// times.
    pub fn simulate_counts(&self, presses: &[u64]) -> Vec<u64> {
        let mut counts = vec![0u64; self.counters()];
        for (button, &times) in self.buttons.iter().zip(presses) {
            for &i in button {
                counts[i] += times;
            }
        }
        counts
    }

    /// Counter parities after pressing each button in `presses` once.
    pub fn simulate_toggles(&self, presses: &BitSlice) -> Bits {
        let mut state = Bits::repeat(false, self.counters());
        for j in presses.iter_ones() {
            for &i in &self.buttons[j] {
                let lit = state[i];
                state.set(i, !lit);
            }
        }
        state
    }

    fn validate(&self, line: usize) -> Result<()> {
        let n = self.counters();
        if self.target_counts.len() != n {
            bail!(
                "machine {line}: {n} counters but {} increment targets",
                self.target_counts.len()
            );
        }
        for (j, button) in self.buttons.iter().enumerate() {
            if let Some(&idx) = button.iter().find(|&&i| i >= n) {
                bail!("machine {line}: button {j} references counter {idx}, machine has {n}");
            }
        }
        Ok(())
    }
}

fn parser<'a>() -> impl Parser<'a, &'a str, Vec<Machine>, extra::Err<Rich<'a, char>>> {
    let hspace = one_of(" \t").repeated();

    let bit = choice((just('.').to(false), just('#').to(true)));

    // [.##.]
    let lights = bit
        .repeated()
        .at_least(1)
        .collect::<Vec<bool>>()
        .map(|v| v.into_iter().collect::<Bits>())
        .delimited_by(just('['), just(']'));

    // (0,2,3)
    let button = text::int(10)
        .from_str::<usize>()
        .unwrapped()
        .separated_by(just(','))
        .at_least(1)
        .collect::<Vec<usize>>()
        .delimited_by(just('('), just(')'));

    let buttons = button.padded_by(hspace).repeated().collect::<Vec<_>>();

    // {3,5,4,7}
    let counts = text::int(10)
        .from_str::<u64>()
        .unwrapped()
        .separated_by(just(','))
        .at_least(1)
        .collect::<Vec<u64>>()
        .delimited_by(just('{'), just('}'));

    let machine = lights
        .then_ignore(hspace)
        .then(buttons)
        .then(counts.padded_by(hspace))
        .map(|((target_bits, buttons), target_counts)| Machine {
            target_bits,
            target_counts,
            buttons,
        });

    machine
        .separated_by(text::newline())
        .allow_trailing()
        .collect()
}

/// Parses one machine per line. Any malformed line, out-of-range button
/// index, or target-length mismatch fails the whole run.
pub fn parse(input: &str) -> Result<Vec<Machine>> {
    let machines = parser()
        .parse(input)
        .into_result()
        .map_err(|e| miette!("Parse failed: {:?}", e))?;

    for (i, machine) in machines.iter().enumerate() {
        machine.validate(i + 1)?;
    }

    Ok(machines)
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[test]
    fn parses_example_line() -> Result<()> {
        let machines = parse("[.##.] (3) (1,3) (2) (2,3) (0,2) (0,1) {3,5,4,7}")?;
        assert_eq!(machines.len(), 1);

        let machine = &machines[0];
        assert_eq!(machine.counters(), 4);
        assert_eq!(machine.target_bits, bitvec![0, 1, 1, 0]);
        assert_eq!(machine.target_counts, vec![3, 5, 4, 7]);
        assert_eq!(machine.buttons.len(), 6);
        assert_eq!(machine.buttons[1], vec![1, 3]);
        assert_eq!(machine.buttons[5], vec![0, 1]);
        Ok(())
    }

    #[test]
    fn parses_multiple_lines() -> Result<()> {
        let input = "[.#] (0) (1) {1,2}\n[#.] (0,1) {3,3}\n";
        let machines = parse(input)?;
        assert_eq!(machines.len(), 2);
        assert_eq!(machines[1].buttons, vec![vec![0, 1]]);
        Ok(())
    }

    #[rstest]
    #[case::index_out_of_range("[..] (5) {0,0}")]
    #[case::count_length_mismatch("[..] (0) {1}")]
    #[case::missing_lights("(0) (1) {1,1}")]
    #[case::garbage("buttons go brrr")]
    fn rejects_invalid(#[case] line: &str) {
        assert!(parse(line).is_err());
    }

    #[test]
    fn simulation_matches_button_multiplicity() -> Result<()> {
        let machines = parse("[..] (0,0,1) (1) {4,3}")?;
        let machine = &machines[0];

        assert_eq!(machine.simulate_counts(&[2, 1]), vec![4, 3]);

        // Double hit on counter 0 cancels out in the toggle model.
        let presses = bitvec![1, 0];
        assert_eq!(machine.simulate_toggles(&presses), bitvec![0, 1]);
        Ok(())
    }
}
