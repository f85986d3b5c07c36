//! Disk size value type
//!
//! Sizes are whole bytes. A single sentinel value represents "unlimited",
//! which is only meaningful as an upper bound (e.g. a volume's max size).

use crate::utils::error::{ProposalError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;
const TIB: u64 = GIB * 1024;
const PIB: u64 = TIB * 1024;

const UNLIMITED_BYTES: u64 = u64::MAX;

static SIZE_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*([kmgtp]?)(i?)(b?)\s*$").ok());

/// A size on disk, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DiskSize {
    bytes: u64,
}

impl DiskSize {
    pub const ZERO: DiskSize = DiskSize { bytes: 0 };

    pub const fn b(bytes: u64) -> Self {
        DiskSize { bytes }
    }

    pub const fn kib(n: u64) -> Self {
        DiskSize { bytes: n * KIB }
    }

    pub const fn mib(n: u64) -> Self {
        DiskSize { bytes: n * MIB }
    }

    pub const fn gib(n: u64) -> Self {
        DiskSize { bytes: n * GIB }
    }

    pub const fn tib(n: u64) -> Self {
        DiskSize { bytes: n * TIB }
    }

    pub const fn unlimited() -> Self {
        DiskSize {
            bytes: UNLIMITED_BYTES,
        }
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn is_unlimited(&self) -> bool {
        self.bytes == UNLIMITED_BYTES
    }

    pub fn is_zero(&self) -> bool {
        self.bytes == 0
    }

    /// Scale by a non-negative factor, rounding down to whole bytes.
    /// Unlimited stays unlimited.
    pub fn mul_f64(self, factor: f64) -> Self {
        if self.is_unlimited() {
            return self;
        }
        if factor.is_nan() || factor <= 0.0 {
            return DiskSize::ZERO;
        }
        let scaled = (self.bytes as f64 * factor).floor();
        if scaled >= UNLIMITED_BYTES as f64 {
            DiskSize::unlimited()
        } else {
            DiskSize::b(scaled as u64)
        }
    }

    /// Get human-readable size (binary units)
    pub fn human(&self) -> String {
        if self.is_unlimited() {
            return "unlimited".to_string();
        }

        let bytes = self.bytes;
        if bytes >= PIB {
            format!("{:.2} PiB", bytes as f64 / PIB as f64)
        } else if bytes >= TIB {
            format!("{:.2} TiB", bytes as f64 / TIB as f64)
        } else if bytes >= GIB {
            format!("{:.2} GiB", bytes as f64 / GIB as f64)
        } else if bytes >= MIB {
            format!("{:.2} MiB", bytes as f64 / MIB as f64)
        } else if bytes >= KIB {
            format!("{:.2} KiB", bytes as f64 / KIB as f64)
        } else {
            format!("{} B", bytes)
        }
    }

    /// Parse a size such as `"10 GiB"`, `"512MiB"`, `"1.5G"`, `"4096"` or
    /// `"unlimited"`.
    ///
    /// Units with an `i` (`KiB`, `MiB`, ...) and bare unit letters (`K`, `M`,
    /// ...) are binary; `KB`, `MB`, ... are decimal.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("unlimited") {
            return Ok(DiskSize::unlimited());
        }

        let caps = SIZE_RE
            .as_ref()
            .and_then(|re| re.captures(trimmed))
            .ok_or_else(|| ProposalError::InvalidSize(input.to_string()))?;

        let number = &caps[1];
        let prefix = caps[2].to_ascii_lowercase();
        let binary = !caps[3].is_empty() || caps[4].is_empty();

        let exponent = match prefix.as_str() {
            "" => 0,
            "k" => 1,
            "m" => 2,
            "g" => 3,
            "t" => 4,
            "p" => 5,
            _ => return Err(ProposalError::InvalidSize(input.to_string())),
        };
        if prefix.is_empty() && !caps[3].is_empty() {
            return Err(ProposalError::InvalidSize(input.to_string()));
        }
        let base: u64 = if binary { 1024 } else { 1000 };
        let multiplier = base.pow(exponent);

        let bytes = if let Ok(whole) = number.parse::<u64>() {
            whole
                .checked_mul(multiplier)
                .ok_or_else(|| ProposalError::InvalidSize(input.to_string()))?
        } else {
            let value: f64 = number
                .parse()
                .map_err(|_| ProposalError::InvalidSize(input.to_string()))?;
            let scaled = (value * multiplier as f64).floor();
            if scaled >= UNLIMITED_BYTES as f64 {
                return Err(ProposalError::InvalidSize(input.to_string()));
            }
            scaled as u64
        };

        if bytes == UNLIMITED_BYTES {
            return Err(ProposalError::InvalidSize(input.to_string()));
        }
        Ok(DiskSize::b(bytes))
    }
}

impl fmt::Display for DiskSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.human())
    }
}

impl FromStr for DiskSize {
    type Err = ProposalError;

    fn from_str(s: &str) -> Result<Self> {
        DiskSize::parse(s)
    }
}

impl Add for DiskSize {
    type Output = DiskSize;

    fn add(self, rhs: DiskSize) -> DiskSize {
        match self.bytes.checked_add(rhs.bytes) {
            Some(bytes) if bytes != UNLIMITED_BYTES => DiskSize::b(bytes),
            _ => DiskSize::unlimited(),
        }
    }
}

impl AddAssign for DiskSize {
    fn add_assign(&mut self, rhs: DiskSize) {
        *self = *self + rhs;
    }
}

impl Sub for DiskSize {
    type Output = DiskSize;

    /// Saturates at zero; unlimited minus a finite size stays unlimited
    fn sub(self, rhs: DiskSize) -> DiskSize {
        if self.is_unlimited() && !rhs.is_unlimited() {
            return self;
        }
        DiskSize::b(self.bytes.saturating_sub(rhs.bytes))
    }
}

impl SubAssign for DiskSize {
    fn sub_assign(&mut self, rhs: DiskSize) {
        *self = *self - rhs;
    }
}

impl Sum for DiskSize {
    fn sum<I: Iterator<Item = DiskSize>>(iter: I) -> DiskSize {
        iter.fold(DiskSize::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a DiskSize> for DiskSize {
    fn sum<I: Iterator<Item = &'a DiskSize>>(iter: I) -> DiskSize {
        iter.copied().sum()
    }
}

impl Serialize for DiskSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.is_unlimited() {
            serializer.serialize_str("unlimited")
        } else {
            serializer.serialize_u64(self.bytes)
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSize {
    Bytes(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for DiskSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match RawSize::deserialize(deserializer)? {
            RawSize::Bytes(bytes) => Ok(DiskSize::b(bytes)),
            RawSize::Text(text) => DiskSize::parse(&text).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_binary_and_decimal_units() {
        assert_eq!(DiskSize::parse("10 GiB").unwrap(), DiskSize::gib(10));
        assert_eq!(DiskSize::parse("512MiB").unwrap(), DiskSize::mib(512));
        assert_eq!(DiskSize::parse("2G").unwrap(), DiskSize::gib(2));
        assert_eq!(DiskSize::parse("1 KB").unwrap(), DiskSize::b(1000));
        assert_eq!(DiskSize::parse("4096").unwrap(), DiskSize::b(4096));
        assert_eq!(DiskSize::parse("1.5 GiB").unwrap(), DiskSize::mib(1536));
        assert!(DiskSize::parse("Unlimited").unwrap().is_unlimited());
    }

    #[test]
    fn rejects_garbage() {
        assert!(DiskSize::parse("ten gigs").is_err());
        assert!(DiskSize::parse("10 XiB").is_err());
        assert!(DiskSize::parse("").is_err());
    }

    #[test]
    fn unlimited_absorbs_arithmetic() {
        let unlimited = DiskSize::unlimited();
        assert!((unlimited + DiskSize::gib(1)).is_unlimited());
        assert!((unlimited - DiskSize::gib(1)).is_unlimited());
        assert!(unlimited.mul_f64(0.5).is_unlimited());
        assert!(DiskSize::gib(1) < unlimited);
    }

    #[test]
    fn subtraction_saturates_at_zero() {
        assert_eq!(DiskSize::gib(1) - DiskSize::gib(2), DiskSize::ZERO);
    }

    #[test]
    fn scaling_rounds_down() {
        assert_eq!(DiskSize::b(10).mul_f64(0.25), DiskSize::b(2));
        assert_eq!(DiskSize::gib(9).mul_f64(0.5), DiskSize::mib(4608));
        assert_eq!(DiskSize::gib(1).mul_f64(0.0), DiskSize::ZERO);
    }

    #[test]
    fn human_formatting() {
        assert_eq!(DiskSize::gib(18).human(), "18.00 GiB");
        assert_eq!(DiskSize::b(512).human(), "512 B");
        assert_eq!(DiskSize::unlimited().to_string(), "unlimited");
    }

    #[test]
    fn deserializes_numbers_and_strings() {
        #[derive(Deserialize)]
        struct Holder {
            a: DiskSize,
            b: DiskSize,
        }
        let holder: Holder = toml::from_str("a = 1024\nb = \"2 MiB\"").unwrap();
        assert_eq!(holder.a, DiskSize::kib(1));
        assert_eq!(holder.b, DiskSize::mib(2));
    }
}
