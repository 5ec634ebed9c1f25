//! Inclusion filters applied to the topology.
//!
//! Every filter is built once at startup from configuration strings and
//! defaults to letting everything through when it is configured empty.
mod az;
mod cidr;
mod collector;
mod deployments;
mod error;
mod process;

pub use az::AzFilter;
pub use cidr::CidrFilter;
pub use collector::{
    CollectorFilter, DEPLOYMENTS_COLLECTOR, JOBS_COLLECTOR, SERVICE_DISCOVERY_COLLECTOR,
    SUPPORTED_COLLECTORS,
};
pub use deployments::{DeploymentsFilter, Selection};
pub use error::{Error, Result};
pub use process::ProcessFilter;

/// Trims every entry, leaving the empty ones out.
fn trimmed<I, S>(entries: I) -> impl Iterator<Item = String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    entries
        .into_iter()
        .map(|entry| entry.as_ref().trim().to_owned())
        .filter(|entry| !entry.is_empty())
}
