use divan::black_box;

use button_machine::{part1, part2, EXAMPLE};

fn main() {
    divan::main();
}

#[divan::bench]
fn bench_part1() -> String {
    part1::process(black_box(EXAMPLE)).unwrap()
}

#[divan::bench]
fn bench_part2() -> String {
    part2::process(black_box(EXAMPLE)).unwrap()
}
