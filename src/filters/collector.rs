use std::collections::HashSet;

use super::{Error, Result};

pub const DEPLOYMENTS_COLLECTOR: &str = "Deployments";
pub const JOBS_COLLECTOR: &str = "Jobs";
pub const SERVICE_DISCOVERY_COLLECTOR: &str = "ServiceDiscovery";

pub const SUPPORTED_COLLECTORS: [&str; 3] = [
    DEPLOYMENTS_COLLECTOR,
    JOBS_COLLECTOR,
    SERVICE_DISCOVERY_COLLECTOR,
];

/// Allow-list of the collectors to run.
#[derive(Debug, Clone, Default)]
pub struct CollectorFilter {
    collectors: HashSet<String>,
}

impl CollectorFilter {
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCollector`] naming the first entry that is
    /// not one of [`SUPPORTED_COLLECTORS`].
    pub fn new<I, S>(collectors: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let collectors = super::trimmed(collectors)
            .map(|name| {
                if SUPPORTED_COLLECTORS.contains(&name.as_str()) {
                    Ok(name)
                } else {
                    Err(Error::UnsupportedCollector(name))
                }
            })
            .collect::<Result<HashSet<_>>>()?;

        Ok(Self { collectors })
    }

    pub fn enabled(&self, name: &str) -> bool {
        self.collectors.is_empty() || self.collectors.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_enables_everything() {
        let filter = CollectorFilter::new(Vec::<&str>::new()).unwrap();
        for name in SUPPORTED_COLLECTORS {
            assert!(filter.enabled(name));
        }
        assert!(filter.enabled("Anything"));
    }

    #[test]
    fn test_filter_enables_listed_collectors_only() {
        let filter = CollectorFilter::new([" Jobs ", "ServiceDiscovery"]).unwrap();
        assert!(filter.enabled(JOBS_COLLECTOR));
        assert!(filter.enabled(SERVICE_DISCOVERY_COLLECTOR));
        assert!(!filter.enabled(DEPLOYMENTS_COLLECTOR));
    }

    #[test]
    fn test_new_names_first_unsupported_collector() {
        let err = CollectorFilter::new(["Jobs", "Processes", "Errands"]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCollector(ref name) if name == "Processes"));
    }
}
