//! Kubernetes resource quantities
//!
//! A [`Quantity`] is a fixed-point number with nano precision plus the
//! suffix family it was written in. Parsing accepts the same grammar as the
//! Kubernetes API (`100m`, `64Mi`, `1.5G`, `12e6`), and the `Display`
//! implementation produces the canonical form the API server would print.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;
use thiserror::Error;

/// Number of nano units in one whole unit
const NANOS_PER_UNIT: i128 = 1_000_000_000;

/// Largest binary exponent with a suffix (Ei = 1024^6)
const MAX_BINARY_STEPS: usize = 6;

/// Largest decimal exponent with a suffix (E = 10^18)
const MAX_DECIMAL_EXPONENT: i32 = 18;

/// Sub-nano digits kept when rounding up; 10^20 exceeds the largest binary
/// multiplier (2^60), so a fractional binary value rounds to the right nano
const SUB_NANO_DIGITS: usize = 20;

const BINARY_SUFFIXES: [&str; MAX_BINARY_STEPS + 1] = ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];

/// Suffix family used when rendering a quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// SI decimal suffixes: `n u m "" k M G T P E`
    #[default]
    DecimalSI,
    /// IEC binary suffixes: `Ki Mi Gi Ti Pi Ei`
    BinarySI,
    /// Scientific notation: `1e3`, `25e-3`
    DecimalExponent,
}

/// Errors returned when parsing a quantity string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityParseError {
    #[error("quantity is empty")]
    Empty,
    #[error("invalid number in quantity {0:?}")]
    InvalidNumber(String),
    #[error("invalid suffix {suffix:?} in quantity {input:?}")]
    InvalidSuffix { input: String, suffix: String },
    #[error("quantity {0:?} is out of range")]
    OutOfRange(String),
}

/// A resource quantity such as `250m` CPU or `128Mi` memory
///
/// Equality and ordering compare the numeric value only; `1Ki` equals `1024`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quantity {
    nanos: i128,
    format: Format,
}

impl Quantity {
    /// The additive identity
    pub const fn zero() -> Self {
        Self {
            nanos: 0,
            format: Format::DecimalSI,
        }
    }

    /// A quantity of `value` whole units
    pub const fn new(value: i64, format: Format) -> Self {
        Self {
            nanos: value as i128 * NANOS_PER_UNIT,
            format,
        }
    }

    pub fn as_nanos(&self) -> i128 {
        self.nanos
    }

    /// Approximate value in whole units (cores, bytes)
    pub fn as_f64(&self) -> f64 {
        self.nanos as f64 / NANOS_PER_UNIT as f64
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn is_zero(&self) -> bool {
        self.nanos == 0
    }

    /// Split into a mantissa and binary suffix, if the value is a whole
    /// number of units with magnitude of at least 1024.
    fn binary_parts(&self) -> Option<(i128, &'static str)> {
        if self.nanos % NANOS_PER_UNIT != 0 {
            return None;
        }
        let mut units = self.nanos / NANOS_PER_UNIT;
        if units.abs() < 1024 {
            return None;
        }

        let mut steps = 0;
        while steps < MAX_BINARY_STEPS && units % 1024 == 0 {
            units /= 1024;
            steps += 1;
        }
        Some((units, BINARY_SUFFIXES[steps]))
    }

    /// Split into a mantissa and a base-10 exponent that is a multiple of 3,
    /// keeping the mantissa as small as possible.
    fn decimal_parts(&self) -> (i128, i32) {
        let mut mantissa = self.nanos;
        let mut exponent: i32 = -9;

        while mantissa % 10 == 0 {
            mantissa /= 10;
            exponent += 1;
        }

        let rem = exponent.rem_euclid(3);
        mantissa *= 10i128.pow(rem as u32);
        exponent -= rem;

        (mantissa, exponent)
    }
}

fn ceil_div(value: i128, divisor: i128) -> i128 {
    let quotient = value / divisor;
    if value % divisor != 0 && value > 0 {
        quotient + 1
    } else {
        quotient
    }
}

fn decimal_suffix(exponent: i32) -> &'static str {
    match exponent {
        -9 => "n",
        -6 => "u",
        -3 => "m",
        3 => "k",
        6 => "M",
        9 => "G",
        12 => "T",
        15 => "P",
        18 => "E",
        _ => "",
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos == 0 {
            return f.write_str("0");
        }

        if self.format == Format::BinarySI {
            if let Some((mantissa, suffix)) = self.binary_parts() {
                return write!(f, "{mantissa}{suffix}");
            }
        }

        let (mut mantissa, mut exponent) = self.decimal_parts();
        match self.format {
            Format::DecimalExponent => {
                if exponent == 0 {
                    write!(f, "{mantissa}")
                } else {
                    write!(f, "{mantissa}e{exponent}")
                }
            }
            Format::DecimalSI | Format::BinarySI => {
                if exponent > MAX_DECIMAL_EXPONENT {
                    mantissa *= 10i128.pow((exponent - MAX_DECIMAL_EXPONENT) as u32);
                    exponent = MAX_DECIMAL_EXPONENT;
                }
                write!(f, "{mantissa}{}", decimal_suffix(exponent))
            }
        }
    }
}

/// Scale applied by a suffix
enum Multiplier {
    Decimal(i32),
    Binary(u32),
}

fn parse_suffix(input: &str, suffix: &str) -> Result<(Multiplier, Format), QuantityParseError> {
    let parsed = match suffix {
        "" => (Multiplier::Decimal(0), Format::DecimalSI),
        "n" => (Multiplier::Decimal(-9), Format::DecimalSI),
        "u" => (Multiplier::Decimal(-6), Format::DecimalSI),
        "m" => (Multiplier::Decimal(-3), Format::DecimalSI),
        "k" => (Multiplier::Decimal(3), Format::DecimalSI),
        "M" => (Multiplier::Decimal(6), Format::DecimalSI),
        "G" => (Multiplier::Decimal(9), Format::DecimalSI),
        "T" => (Multiplier::Decimal(12), Format::DecimalSI),
        "P" => (Multiplier::Decimal(15), Format::DecimalSI),
        "E" => (Multiplier::Decimal(18), Format::DecimalSI),
        "Ki" => (Multiplier::Binary(10), Format::BinarySI),
        "Mi" => (Multiplier::Binary(20), Format::BinarySI),
        "Gi" => (Multiplier::Binary(30), Format::BinarySI),
        "Ti" => (Multiplier::Binary(40), Format::BinarySI),
        "Pi" => (Multiplier::Binary(50), Format::BinarySI),
        "Ei" => (Multiplier::Binary(60), Format::BinarySI),
        other => {
            let exponent = other
                .strip_prefix('e')
                .or_else(|| other.strip_prefix('E'))
                .and_then(|exp| exp.parse::<i32>().ok())
                .ok_or_else(|| QuantityParseError::InvalidSuffix {
                    input: input.to_string(),
                    suffix: other.to_string(),
                })?;
            (Multiplier::Decimal(exponent), Format::DecimalExponent)
        }
    };
    Ok(parsed)
}

impl FromStr for Quantity {
    type Err = QuantityParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.is_empty() {
            return Err(QuantityParseError::Empty);
        }

        let (negative, unsigned) = match input.as_bytes()[0] {
            b'-' => (true, &input[1..]),
            b'+' => (false, &input[1..]),
            _ => (false, input),
        };

        let number_end = unsigned
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(number_end);

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
            return Err(QuantityParseError::InvalidNumber(input.to_string()));
        }

        let (multiplier, format) = parse_suffix(input, suffix)?;
        let out_of_range = || QuantityParseError::OutOfRange(input.to_string());

        let digits = whole
            .chars()
            .chain(fraction.chars())
            .map(|c| c.to_digit(10).map(i128::from))
            .collect::<Option<Vec<i128>>>()
            .ok_or_else(|| QuantityParseError::InvalidNumber(input.to_string()))?;

        if digits.iter().all(|&d| d == 0) {
            return Ok(Self { nanos: 0, format });
        }

        let (binary_shift, decimal_exponent) = match multiplier {
            Multiplier::Decimal(exp) => (0, exp),
            Multiplier::Binary(shift) => (shift, 0),
        };

        // Position of the first digit finer than one nano
        let nano_split = whole.len() as i64 + 9 + i64::from(decimal_exponent);
        let split_at = nano_split.clamp(0, digits.len() as i64) as usize;
        let (above, below) = digits.split_at(split_at);

        let mut whole_nanos: i128 = 0;
        for &digit in above {
            whole_nanos = whole_nanos
                .checked_mul(10)
                .and_then(|u| u.checked_add(digit))
                .ok_or_else(out_of_range)?;
        }
        if nano_split > digits.len() as i64 {
            let zeros =
                u32::try_from(nano_split - digits.len() as i64).map_err(|_| out_of_range())?;
            whole_nanos = 10i128
                .checked_pow(zeros)
                .and_then(|factor| whole_nanos.checked_mul(factor))
                .ok_or_else(out_of_range)?;
        }

        // Sub-nano digits: a fixed window plus a flag for anything further out
        let leading_zeros = usize::try_from(-nano_split).unwrap_or(0);
        let mut window: i128 = 0;
        let mut truncated = false;
        for (i, &digit) in below.iter().enumerate() {
            let position = leading_zeros.saturating_add(i);
            if position < SUB_NANO_DIGITS {
                window += digit * 10i128.pow((SUB_NANO_DIGITS - 1 - position) as u32);
            } else if digit != 0 {
                truncated = true;
            }
        }

        let factor = 1i128 << binary_shift;
        let scale = 10i128.pow(SUB_NANO_DIGITS as u32);
        let scaled_window = window * factor;
        let mut round_up = ceil_div(scaled_window, scale);
        if truncated && scaled_window % scale == 0 {
            round_up += 1;
        }

        let magnitude = whole_nanos
            .checked_mul(factor)
            .and_then(|nanos| nanos.checked_add(round_up))
            .ok_or_else(out_of_range)?;

        Ok(Self {
            nanos: if negative { -magnitude } else { magnitude },
            format,
        })
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(mut self, rhs: Quantity) -> Quantity {
        self += rhs;
        self
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Quantity) {
        // A zero accumulator takes on the suffix family of what is added to it
        if self.nanos == 0 {
            self.format = rhs.format;
        }
        self.nanos = self.nanos.saturating_add(rhs.nanos);
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Self {
        iter.fold(Quantity::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Quantity> for Quantity {
    fn sum<I: Iterator<Item = &'a Quantity>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.nanos == other.nanos
    }
}

impl Eq for Quantity {}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nanos.cmp(&other.nanos)
    }
}

impl Hash for Quantity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nanos.hash(state);
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
