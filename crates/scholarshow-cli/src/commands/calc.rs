use scholarshow_core::calculator::Calculator;

use crate::error::CliError;

pub fn run_calc(keys: &[String]) -> Result<(), CliError> {
    println!("{}", evaluate_keys(keys)?);
    Ok(())
}

pub fn evaluate_keys(keys: &[String]) -> Result<String, CliError> {
    let mut calculator = Calculator::new();
    Ok(calculator.press_all(&keys.concat())?.to_string())
}
