//! Human-readable byte sizes ("200KB", "1.5 MB", "250000").
//!
//! Units are binary: 1 KB = 1024 bytes.

use nom::{
    bytes::complete::take_while1,
    character::complete::{alpha0, space0},
    IResult,
};

use crate::error::ConfigError;

const KIB: u64 = 1024;

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}

/// Parse the numeric part (digits with an optional decimal point)
fn number(input: &str) -> IResult<&str, &str> {
    take_while1(is_number_char)(input)
}

/// Parse an optional unit suffix, allowing whitespace before it
fn unit(input: &str) -> IResult<&str, &str> {
    let (input, _) = space0(input)?;
    alpha0(input)
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    match unit.to_ascii_lowercase().as_str() {
        "" | "b" => Some(1),
        "k" | "kb" | "kib" => Some(KIB),
        "m" | "mb" | "mib" => Some(KIB * KIB),
        "g" | "gb" | "gib" => Some(KIB * KIB * KIB),
        _ => None,
    }
}

/// Parse a size specification into a byte count.
pub fn parse_size(spec: &str) -> Result<u64, ConfigError> {
    let trimmed = spec.trim();

    let (rest, digits) = number(trimmed)
        .map_err(|_| ConfigError::InvalidSize(format!("expected a number, got '{}'", spec)))?;
    let (rest, suffix) = unit(rest)
        .map_err(|_| ConfigError::InvalidSize(format!("invalid unit in '{}'", spec)))?;

    if !rest.trim().is_empty() {
        return Err(ConfigError::InvalidSize(format!(
            "unexpected trailing text '{}' in '{}'",
            rest.trim(),
            spec
        )));
    }

    let value: f64 = digits
        .parse()
        .map_err(|_| ConfigError::InvalidSize(format!("invalid number: {}", digits)))?;
    let multiplier = unit_multiplier(suffix)
        .ok_or_else(|| ConfigError::InvalidSize(format!("unknown unit: {}", suffix)))?;

    let bytes = (value * multiplier as f64).round();
    if !bytes.is_finite() || bytes > u64::MAX as f64 {
        return Err(ConfigError::InvalidSize(format!("size too large: {}", spec)));
    }
    if bytes < 1.0 {
        return Err(ConfigError::InvalidSize(format!(
            "size must be at least one byte: {}",
            spec
        )));
    }

    Ok(bytes as u64)
}

/// Adapter for clap's `value_parser`
pub fn parse_target_size(spec: &str) -> Result<u64, String> {
    parse_size(spec).map_err(|e| e.to_string())
}

/// Format a byte count for display ("512 B", "195.3 KB", "1.20 MB")
pub fn format_size(bytes: u64) -> String {
    if bytes < KIB {
        format!("{} B", bytes)
    } else if bytes < KIB * KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / (KIB * KIB) as f64)
    }
}
