//! Small validated value types shared by the X-Insight crates.
//!
//! - [`NonEmptyText`] for labels and names that must carry content
//! - [`UnitInterval`] for model probabilities and similarity scores in `[0, 1]`

/// Errors raised when a validated value cannot be constructed.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValueError {
    /// The input text was empty or contained only whitespace
    #[error("text cannot be empty")]
    EmptyText,

    /// The number was NaN or outside the closed interval `[0, 1]`
    #[error("value {0} is outside the range [0, 1]")]
    OutOfUnitRange(f64),
}

/// A trimmed string that always contains at least one non-whitespace character.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Trims `input` and wraps it, failing with [`ValueError::EmptyText`] when nothing is left.
    pub fn new(input: impl AsRef<str>) -> Result<Self, ValueError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValueError::EmptyText);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for NonEmptyText {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// A finite number in the closed interval `[0, 1]`.
///
/// Used for per-condition probabilities and the semantic-similarity score returned by the
/// inference service. Deserialisation rejects anything outside the range, so a payload carrying
/// `1.2` fails to parse instead of being clamped.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct UnitInterval(f64);

impl UnitInterval {
    pub fn new(value: f64) -> Result<Self, ValueError> {
        if value.is_nan() || !(0.0..=1.0).contains(&value) {
            return Err(ValueError::OutOfUnitRange(value));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> f64 {
        self.0
    }

    /// The value as a percentage, e.g. `0.914` → `91.4`.
    pub fn as_percent(self) -> f64 {
        self.0 * 100.0
    }
}

impl std::fmt::Display for UnitInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}%", self.as_percent())
    }
}

impl TryFrom<f64> for UnitInterval {
    type Error = ValueError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl serde::Serialize for UnitInterval {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for UnitInterval {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        UnitInterval::new(value).map_err(serde::de::Error::custom)
    }
}
