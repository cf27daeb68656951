use miette::*;

use crate::{counter, machine, solve};

#[tracing::instrument(skip(input))]
pub fn process(input: &str) -> Result<String> {
    let machines = machine::parse(input)?;
    let total = solve::total(&machines, counter::min_presses)?;
    Ok(total.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() -> Result<()> {
        assert_eq!("33", process(crate::EXAMPLE)?);
        Ok(())
    }
}
