/*
 * This module contains some quality of life structs. Most importantly, it contains the
 * `ScoringConfig` struct, which implements the Default trait. This config can be passed to the
 * `score_label_sequences_conf` function to simplify its arguments.
*/
use crate::schemes::{RepairPolicy, SchemeType};
use std::fmt::Display;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
/// Config struct used to simplify the inputs of parameters to the main scoring function.
/// The scheme and repair policy fields parse from strings through their `FromStr` impls, so
/// callers holding configuration as text get an error for unknown names before any scoring
/// starts.
pub struct ScoringConfig {
    /// The chunk-encoding scheme the label sequences are written in.
    scheme: SchemeType,
    /// How to handle invalid label transitions. `None` rejects invalid sequences with an
    /// error; a policy rewrites them deterministically before decoding.
    repair: Option<RepairPolicy>,
    /// The character separating the prefix from the entity type (ex: `I-PER`, where the type
    /// is `PER` and the prefix is `I`).
    delimiter: char,
}

impl ScoringConfig {
    pub fn scheme(&self) -> SchemeType {
        self.scheme
    }

    pub fn repair(&self) -> Option<RepairPolicy> {
        self.repair
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            scheme: SchemeType::BIO,
            repair: None,
            delimiter: '-',
        }
    }
}

impl Display for ScoringConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let repair = match self.repair {
            Some(policy) => policy.to_string(),
            None => String::from("none"),
        };
        write!(
            f,
            "Scheme: {}\n Repair policy: {}\n Delimiter: {}",
            self.scheme, repair, self.delimiter
        )
    }
}

impl From<ScoringConfig> for (SchemeType, Option<RepairPolicy>, char) {
    fn from(value: ScoringConfig) -> Self {
        (value.scheme, value.repair, value.delimiter)
    }
}

/// This builder can be used to build and customize a `ScoringConfig` structure.
pub struct ScoringConfigBuilder {
    scheme: SchemeType,
    repair: Option<RepairPolicy>,
    delimiter: char,
}

impl Default for ScoringConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoringConfigBuilder {
    pub fn new() -> Self {
        let defaults = ScoringConfig::default();
        Self {
            scheme: defaults.scheme,
            repair: defaults.repair,
            delimiter: defaults.delimiter,
        }
    }

    pub fn scheme(mut self, scheme: SchemeType) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn repair(mut self, repair: Option<RepairPolicy>) -> Self {
        self.repair = repair;
        self
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn build(self) -> ScoringConfig {
        ScoringConfig {
            scheme: self.scheme,
            repair: self.repair,
            delimiter: self.delimiter,
        }
    }
}
