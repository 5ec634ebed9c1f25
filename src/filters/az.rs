use std::collections::HashSet;

/// Allow-list of availability zones.
#[derive(Debug, Clone, Default)]
pub struct AzFilter {
    azs: HashSet<String>,
}

impl AzFilter {
    pub fn new<I, S>(azs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            azs: super::trimmed(azs).collect(),
        }
    }

    /// Returns `true` if no zone is configured or `az` is one of them.
    pub fn enabled(&self, az: &str) -> bool {
        self.azs.is_empty() || self.azs.contains(az)
    }
}
