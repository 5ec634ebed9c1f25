use std::fmt;

/// Topology of one deployment, captured during a single scrape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeploymentSnapshot {
    pub name: String,
    pub instances: Vec<Instance>,
    pub releases: Vec<Release>,
    pub stemcells: Vec<Stemcell>,
}

/// A VM (or container) running one instance group job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instance {
    pub agent_id: String,
    pub vm_id: String,
    /// Name of the instance group job.
    pub name: String,
    pub id: String,
    /// String form of the instance index, empty if the director reported none.
    pub index: String,
    pub bootstrap: bool,
    pub ips: Vec<String>,
    pub az: String,
    pub vm_type: String,
    pub resource_pool: String,
    pub resurrection_paused: bool,
    pub healthy: bool,
    pub processes: Vec<Process>,
    pub vitals: Vitals,
}

/// A process supervised by the agent of an instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Process {
    pub name: String,
    /// Seconds since the process started.
    pub uptime: Option<u64>,
    pub healthy: bool,
    pub cpu_total: Option<f64>,
    pub mem_kb: Option<u64>,
    pub mem_percent: Option<f64>,
}

/// Resource readings of an instance.
///
/// Values are kept exactly as the agent reported them. An empty string means
/// the value was not reported, which is different from zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vitals {
    pub cpu: Cpu,
    pub mem: Memory,
    pub swap: Memory,
    /// Load averages over 1, 5 and 15 minutes.
    pub load: Vec<String>,
    pub disk: Disks,
    pub uptime: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cpu {
    pub sys: String,
    pub user: String,
    pub wait: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memory {
    pub kb: String,
    pub percent: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Disks {
    pub system: Disk,
    pub ephemeral: Disk,
    pub persistent: Disk,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Disk {
    pub inode_percent: String,
    pub percent: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Release {
    pub name: String,
    /// Opaque version, only compared for equality.
    pub version: String,
    pub job_names: Vec<String>,
    pub package_names: Vec<String>,
}

impl Release {
    pub fn has_job(&self, name: &str) -> bool {
        self.job_names.iter().any(|job| job == name)
    }
}

/// Displays as `name/version`.
impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stemcell {
    pub name: String,
    pub version: String,
    pub os_name: String,
}
