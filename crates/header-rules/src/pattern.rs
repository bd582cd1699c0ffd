use regex::Regex;
use serde::{Deserialize, Deserializer};

/// An exact header name, case-insensitively compared.
#[derive(Debug, Clone)]
pub struct NamePattern(String);

impl NamePattern {
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.eq_ignore_ascii_case(candidate)
    }
}

/// Either an exact header name or a regex pattern matched against header
/// names, configured in TOML as a plain string (exact) or `{ pattern = ".." }`.
#[derive(Debug, Clone)]
pub enum NameOrPattern {
    Exact(NamePattern),
    Pattern(Regex),
}

impl NameOrPattern {
    pub fn exact(name: &str) -> Self {
        Self::Exact(NamePattern(name.to_string()))
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            NameOrPattern::Exact(pattern) => pattern.matches(candidate),
            NameOrPattern::Pattern(regex) => regex.is_match(candidate),
        }
    }

    /// The literal header name, when this isn't a regex pattern. Used by
    /// forwarding rules that need a concrete outbound name for defaults.
    pub fn literal_name(&self) -> Option<&str> {
        match self {
            NameOrPattern::Exact(pattern) => Some(&pattern.0),
            NameOrPattern::Pattern(_) => None,
        }
    }
}

impl<'de> Deserialize<'de> for NameOrPattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Exact(String),
            Pattern { pattern: String },
        }

        match Repr::deserialize(deserializer)? {
            Repr::Exact(name) => Ok(NameOrPattern::exact(&name)),
            Repr::Pattern { pattern } => {
                let regex = Regex::new(&pattern).map_err(serde::de::Error::custom)?;
                Ok(NameOrPattern::Pattern(regex))
            }
        }
    }
}
