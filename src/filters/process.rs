use regex::Regex;

use super::{Error, Result};

/// Allow-list of process names, given as regular expressions.
#[derive(Debug, Clone, Default)]
pub struct ProcessFilter {
    patterns: Vec<Regex>,
}

impl ProcessFilter {
    /// # Errors
    ///
    /// Returns [`Error::InvalidProcessPattern`] for the first pattern that does not compile.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = super::trimmed(patterns)
            .map(|pattern| {
                Regex::new(&pattern)
                    .map_err(|source| Error::InvalidProcessPattern { pattern, source })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// Returns `true` if no pattern is configured or any pattern matches `name`.
    pub fn enabled(&self, name: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|re| re.is_match(name))
    }
}
