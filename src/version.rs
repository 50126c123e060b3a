//! Dotted version parsing and the mod-runtime compatibility rule

use std::fmt;

/// A `major.minor.patch` triple. Missing or unparsable parts take their defaults (1.0.0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: i64,
    pub minor: i64,
    pub patch: i64,
}

impl Default for Version {
    fn default() -> Self {
        Self { major: 1, minor: 0, patch: 0 }
    }
}

impl Version {
    /// Lenient parse: never fails, each bad component falls back to its default.
    pub fn parse(version: &str) -> Self {
        let defaults = Self::default();
        let mut parts = version.split('.');
        let mut next = |default: i64| -> i64 {
            parts
                .next()
                .and_then(leading_int)
                .unwrap_or(default)
        };

        Self {
            major: next(defaults.major),
            minor: next(defaults.minor),
            patch: next(defaults.patch),
        }
    }

    /// Same major, and at least `required.minor.patch`. A major bump in
    /// either direction is incompatible.
    pub fn is_compatible_with(&self, required: &Version) -> bool {
        if self.major != required.major {
            return false;
        }
        if self.minor < required.minor {
            return false;
        }
        if self.minor == required.minor && self.patch < required.patch {
            return false;
        }
        true
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Whether a client on `client` may talk to a server requiring `required`.
pub fn is_compatible(client: &str, required: &str) -> bool {
    Version::parse(client).is_compatible_with(&Version::parse(required))
}

/// Integer prefix of a string, the way the record fields are read:
/// leading whitespace and sign allowed, trailing junk ignored ("12abc" -> 12).
/// Values too large for `i64` saturate instead of reading as absent.
pub(crate) fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude = digits[..end].bytes().try_fold(0i64, |acc, b| {
        acc.checked_mul(10)?.checked_add(i64::from(b - b'0'))
    });
    Some(match (magnitude, negative) {
        (Some(value), true) => -value,
        (Some(value), false) => value,
        (None, true) => i64::MIN,
        (None, false) => i64::MAX,
    })
}
