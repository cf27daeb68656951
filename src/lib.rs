//! Minimum-press optimizer for button machines.
//!
//! Each input line describes one machine: a toggle target (`[.##.]`), a list
//! of buttons with the counter indices they affect (`(0,2) (1,3) ...`), and an
//! increment target (`{3,5,4,7}`). Part 1 treats presses as bit toggles and
//! minimizes the number of distinct buttons pressed; part 2 treats presses as
//! `+1` increments and minimizes the total press count.

pub mod counter;
pub mod machine;
pub mod part1;
pub mod part2;
pub mod solve;
pub mod toggle;

/// Three-machine worked example from the puzzle statement; part 1 totals 7,
/// part 2 totals 33. Shared by the acceptance tests and the benches.
pub const EXAMPLE: &str = "\
[.##.] (3) (1,3) (2) (2,3) (0,2) (0,1) {3,5,4,7}
[...#.] (0,2,3,4) (2,3) (0,4) (0,1,2) (1,2,3,4) {7,5,12,7,2}
[.###.#] (0,1,2,3,4) (0,3,4) (0,1,2,4,5) (1,2) {10,11,11,5,10,5}";
