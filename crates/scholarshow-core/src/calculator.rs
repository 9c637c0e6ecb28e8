//! Pocket calculator.
//!
//! Operators chain left to right: `2 + 3 * 4 =` shows `20`.

use crate::error::{Error, Result};

const MAX_DIGITS: usize = 16;
const ERROR_DISPLAY: &str = "Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    fn apply(self, lhs: f64, rhs: f64) -> Option<f64> {
        let result = match self {
            Self::Add => lhs + rhs,
            Self::Subtract => lhs - rhs,
            Self::Multiply => lhs * rhs,
            Self::Divide if rhs == 0.0 => return None,
            Self::Divide => lhs / rhs,
        };
        result.is_finite().then_some(result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Digit(u8),
    Point,
    Clear,
    Negate,
    Percent,
    Operator(Operator),
    Equals,
}

impl Key {
    /// Map a keypad character; both ASCII and keypad symbols are accepted.
    pub fn from_char(ch: char) -> Option<Self> {
        Some(match ch {
            '0'..='9' => Self::Digit(u8::try_from(ch.to_digit(10)?).ok()?),
            '.' | ',' => Self::Point,
            'C' | 'c' => Self::Clear,
            '±' | 'n' | '~' => Self::Negate,
            '%' => Self::Percent,
            '+' => Self::Operator(Operator::Add),
            '-' | '−' => Self::Operator(Operator::Subtract),
            '*' | 'x' | '×' => Self::Operator(Operator::Multiply),
            '/' | '÷' => Self::Operator(Operator::Divide),
            '=' => Self::Equals,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Calculator {
    display: String,
    accumulator: f64,
    pending: Option<Operator>,
    /// The next digit starts a new number.
    overwrite: bool,
    /// An operator was just pressed and no operand has been entered since.
    awaiting_operand: bool,
    error: bool,
}

impl Default for Calculator {
    fn default() -> Self {
        Self {
            display: "0".to_string(),
            accumulator: 0.0,
            pending: None,
            overwrite: true,
            awaiting_operand: false,
            error: false,
        }
    }
}

impl Calculator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    /// Press every key in `keys`, ignoring whitespace.
    pub fn press_all(&mut self, keys: &str) -> Result<&str> {
        for ch in keys.chars().filter(|ch| !ch.is_whitespace()) {
            let key = Key::from_char(ch)
                .ok_or_else(|| Error::Invalid(format!("Unknown calculator key '{ch}'")))?;
            self.press(key);
        }
        Ok(&self.display)
    }

    pub fn press(&mut self, key: Key) {
        if self.error && key != Key::Clear {
            return;
        }

        match key {
            Key::Clear => *self = Self::default(),
            Key::Digit(digit) => self.push_digit(digit),
            Key::Point => self.push_point(),
            Key::Negate => {
                if let Some(positive) = self.display.strip_prefix('-') {
                    self.display = positive.to_string();
                } else if self.value() != 0.0 {
                    self.display.insert(0, '-');
                }
                self.awaiting_operand = false;
            }
            Key::Percent => {
                self.show(self.value() / 100.0);
                self.overwrite = true;
                self.awaiting_operand = false;
            }
            Key::Operator(operator) => {
                if self.pending.is_some() && !self.awaiting_operand && !self.evaluate() {
                    return;
                }
                self.accumulator = self.value();
                self.pending = Some(operator);
                self.overwrite = true;
                self.awaiting_operand = true;
            }
            Key::Equals => {
                if self.pending.is_some() && !self.awaiting_operand && !self.evaluate() {
                    return;
                }
                self.pending = None;
                self.overwrite = true;
                self.awaiting_operand = false;
            }
        }
    }

    fn push_digit(&mut self, digit: u8) {
        let digit = char::from(b'0' + digit.min(9));
        if self.overwrite || self.display == "0" {
            self.display = digit.to_string();
            self.overwrite = false;
        } else if self.display.chars().filter(char::is_ascii_digit).count() < MAX_DIGITS {
            self.display.push(digit);
        }
        self.awaiting_operand = false;
    }

    fn push_point(&mut self) {
        if self.overwrite {
            self.display = "0.".to_string();
            self.overwrite = false;
        } else if !self.display.contains('.') {
            self.display.push('.');
        }
        self.awaiting_operand = false;
    }

    /// Apply the pending operator to the accumulator and the display.
    fn evaluate(&mut self) -> bool {
        let Some(operator) = self.pending.take() else {
            return true;
        };
        match operator.apply(self.accumulator, self.value()) {
            Some(result) => {
                self.show(result);
                true
            }
            None => {
                self.display = ERROR_DISPLAY.to_string();
                self.error = true;
                false
            }
        }
    }

    fn value(&self) -> f64 {
        self.display.parse().unwrap_or(0.0)
    }

    fn show(&mut self, value: f64) {
        self.display = format_number(value);
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_number(value: f64) -> String {
    let rounded = (value * 1e10).round() / 1e10;
    if rounded == 0.0 {
        return "0".to_string();
    }
    if rounded.fract() == 0.0 && rounded.abs() < 1e15 {
        return format!("{}", rounded as i64);
    }
    rounded.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(keys: &str) -> String {
        let mut calculator = Calculator::new();
        calculator.press_all(keys).unwrap().to_string()
    }

    #[test]
    fn operators_chain_left_to_right() {
        assert_eq!(run("2+3*4="), "20");
        assert_eq!(run("10-4/3="), "2");
    }

    #[test]
    fn decimals_and_rounding() {
        assert_eq!(run("0.1+0.2="), "0.3");
        assert_eq!(run(".5*4="), "2");
        assert_eq!(run("1..5"), "1.5");
    }

    #[test]
    fn percent_and_negate() {
        assert_eq!(run("50%"), "0.5");
        assert_eq!(run("8±"), "-8");
        assert_eq!(run("8±±"), "8");
        assert_eq!(run("5-8±="), "13");
        assert_eq!(run("0±"), "0");
    }

    #[test]
    fn division_by_zero_locks_until_clear() {
        let mut calculator = Calculator::new();
        assert_eq!(calculator.press_all("7/0=").unwrap(), "Error");
        assert_eq!(calculator.press_all("5+1=").unwrap(), "Error");
        assert_eq!(calculator.press_all("C").unwrap(), "0");
        assert_eq!(calculator.press_all("5+1=").unwrap(), "6");
    }

    #[test]
    fn changing_operator_before_operand_replaces_it() {
        assert_eq!(run("6+*2="), "12");
    }

    #[test]
    fn result_feeds_next_operation() {
        assert_eq!(run("2+2=*3="), "12");
        assert_eq!(run("2+2=7"), "7");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut calculator = Calculator::new();
        assert!(matches!(calculator.press_all("2?"), Err(Error::Invalid(_))));
    }

    #[test]
    fn symbol_keys_are_accepted() {
        assert_eq!(run("9 ÷ 3 × 2 − 1 ="), "5");
    }
}
