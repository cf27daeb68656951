use miette::*;

use crate::{machine, solve, toggle};

#[tracing::instrument(skip(input))]
pub fn process(input: &str) -> Result<String> {
    let machines = machine::parse(input)?;
    let total = solve::total(&machines, toggle::min_presses)?;
    Ok(total.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() -> Result<()> {
        assert_eq!("7", process(crate::EXAMPLE)?);
        Ok(())
    }

    #[test]
    fn single_machine() -> Result<()> {
        let input = "[.##.] (3) (1,3) (2) (2,3) (0,2) (0,1) {3,5,4,7}";
        assert_eq!("2", process(input)?);
        Ok(())
    }
}
