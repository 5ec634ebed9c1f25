use std::net::IpAddr;

use ipnet::IpNet;

use super::{Error, Result};

/// Picks the address of an instance that falls into one of the configured networks.
#[derive(Debug, Clone, Default)]
pub struct CidrFilter {
    networks: Vec<IpNet>,
}

impl CidrFilter {
    /// # Errors
    ///
    /// Returns [`Error::InvalidCidr`] for the first entry that is not a valid CIDR.
    pub fn new<I, S>(cidrs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let networks = cidrs
            .into_iter()
            .map(|cidr| {
                let cidr = cidr.as_ref().trim();
                cidr.parse::<IpNet>().map_err(|source| Error::InvalidCidr {
                    cidr: cidr.to_owned(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { networks })
    }

    /// Returns the first address of `ips` inside the first network that contains any of them.
    ///
    /// Networks are tried in configured order and addresses in the given order.
    /// Entries that are not IP addresses are skipped.
    pub fn select<'a, S: AsRef<str>>(&self, ips: &'a [S]) -> Option<&'a str> {
        self.networks.iter().find_map(|network| {
            ips.iter().map(|ip| ip.as_ref()).find(|ip| {
                ip.parse::<IpAddr>()
                    .is_ok_and(|addr| network.contains(&addr))
            })
        })
    }
}
