//! Records as the director returns them.
//!
//! Every field defaults when missing or `null`: the director omits vitals for
//! stopped VMs and sends `null` for most of a VM that does not exist (yet).
use serde::{Deserialize, Deserializer};

/// Decodes `null` as the type's default.
pub(super) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DirectorInfo {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub uuid: String,
    #[serde(default, deserialize_with = "null_default")]
    pub version: String,
}

/// A reference to one deployment, as returned by the deployment listing or lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeploymentHandle {
    pub name: String,
}

impl DeploymentHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One entry of the full instance listing of a deployment.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct VmInfo {
    #[serde(deserialize_with = "null_default")]
    pub agent_id: String,
    #[serde(rename = "vm_cid", deserialize_with = "null_default")]
    pub vm_id: String,
    #[serde(deserialize_with = "null_default")]
    pub job_name: String,
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    pub index: Option<u32>,
    #[serde(deserialize_with = "null_default")]
    pub bootstrap: bool,
    #[serde(deserialize_with = "null_default")]
    pub ips: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub az: String,
    #[serde(deserialize_with = "null_default")]
    pub vm_type: String,
    #[serde(deserialize_with = "null_default")]
    pub resource_pool: String,
    #[serde(deserialize_with = "null_default")]
    pub resurrection_paused: bool,
    #[serde(deserialize_with = "null_default")]
    pub job_state: String,
    #[serde(deserialize_with = "null_default")]
    pub processes: Vec<ProcessInfo>,
    #[serde(deserialize_with = "null_default")]
    pub vitals: VitalsInfo,
}

impl VmInfo {
    /// The director reports `running` only when every process of the VM is up.
    pub fn is_running(&self) -> bool {
        self.job_state == "running"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProcessInfo {
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub state: String,
    #[serde(deserialize_with = "null_default")]
    pub uptime: UptimeInfo,
    #[serde(deserialize_with = "null_default")]
    pub cpu: ProcessCpuInfo,
    #[serde(deserialize_with = "null_default")]
    pub mem: ProcessMemInfo,
}

impl ProcessInfo {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UptimeInfo {
    pub secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProcessCpuInfo {
    pub total: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProcessMemInfo {
    pub kb: Option<u64>,
    pub percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VitalsInfo {
    #[serde(deserialize_with = "null_default")]
    pub cpu: CpuInfo,
    #[serde(deserialize_with = "null_default")]
    pub mem: MemInfo,
    #[serde(deserialize_with = "null_default")]
    pub swap: MemInfo,
    #[serde(deserialize_with = "null_default")]
    pub load: LoadInfo,
    #[serde(deserialize_with = "null_default")]
    pub disk: DisksInfo,
    #[serde(deserialize_with = "null_default")]
    pub uptime: UptimeInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CpuInfo {
    #[serde(deserialize_with = "null_default")]
    pub sys: String,
    #[serde(deserialize_with = "null_default")]
    pub user: String,
    #[serde(deserialize_with = "null_default")]
    pub wait: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MemInfo {
    #[serde(deserialize_with = "null_default")]
    pub kb: String,
    #[serde(deserialize_with = "null_default")]
    pub percent: String,
}

/// Load averages over 1, 5 and 15 minutes, in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct LoadInfo(pub Vec<String>);

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DisksInfo {
    #[serde(deserialize_with = "null_default")]
    pub system: DiskInfo,
    #[serde(deserialize_with = "null_default")]
    pub ephemeral: DiskInfo,
    #[serde(deserialize_with = "null_default")]
    pub persistent: DiskInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DiskInfo {
    #[serde(deserialize_with = "null_default")]
    pub inode_percent: String,
    #[serde(deserialize_with = "null_default")]
    pub percent: String,
}

/// A release used by a deployment, with the jobs and packages it ships.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub name: String,
    pub version: String,
    pub job_names: Vec<String>,
    pub package_names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StemcellInfo {
    pub name: String,
    pub version: String,
    pub os_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vm_info_decodes_partial_record() {
        let raw = r#"{"agent_id":"a1","vm_cid":"vm-1","job_name":"router","index":null,"ips":["10.0.0.1"],"job_state":"running"}"#;
        let vm: VmInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(vm.vm_id, "vm-1");
        assert_eq!(vm.index, None);
        assert!(vm.is_running());
        assert!(vm.processes.is_empty());
        assert_eq!(vm.vitals, VitalsInfo::default());
    }

    #[test]
    fn test_vm_info_decodes_null_fields() {
        let raw = r#"{"agent_id":null,"vm_cid":null,"job_name":"smoke-tests","id":"e1","index":0,
            "bootstrap":null,"ips":null,"az":null,"vm_type":null,"resurrection_paused":null,
            "job_state":null,"processes":null,"vitals":null}"#;
        let vm: VmInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(vm.vm_id, "");
        assert_eq!(vm.job_name, "smoke-tests");
        assert_eq!(vm.az, "");
        assert!(vm.ips.is_empty());
        assert!(!vm.is_running());
        assert_eq!(vm.vitals, VitalsInfo::default());

        let raw = r#"{"vm_cid":"vm-1","az":null,"job_state":"running",
            "processes":[{"name":"gorouter","state":null,"uptime":null}],
            "vitals":{"cpu":null,"load":null,"disk":{"system":null,"persistent":{"percent":null}}}}"#;
        let vm: VmInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(vm.vm_id, "vm-1");
        assert!(vm.is_running());
        assert!(!vm.processes[0].is_running());
        assert_eq!(vm.processes[0].uptime.secs, None);
        assert!(vm.vitals.load.0.is_empty());
        assert_eq!(vm.vitals.disk.persistent.percent, "");
    }

    #[test]
    fn test_vm_info_decodes_vitals_and_processes() {
        let raw = r#"{
            "vm_cid": "vm-2",
            "index": 3,
            "job_state": "failing",
            "processes": [
                {"name": "gorouter", "state": "running", "uptime": {"secs": 42},
                 "cpu": {"total": 1.5}, "mem": {"kb": 2048, "percent": 0.3}},
                {"name": "metron", "state": "failing"}
            ],
            "vitals": {
                "cpu": {"sys": "1.2", "user": "3.4", "wait": "0.1"},
                "mem": {"kb": "1024", "percent": "12"},
                "load": ["0.1", "0.2", "0.3"],
                "disk": {"system": {"inode_percent": "5", "percent": "40"}},
                "uptime": {"secs": 3600}
            }
        }"#;
        let vm: VmInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(vm.index, Some(3));
        assert!(!vm.is_running());
        assert_eq!(vm.processes.len(), 2);
        assert!(vm.processes[0].is_running());
        assert_eq!(vm.processes[0].uptime.secs, Some(42));
        assert_eq!(vm.processes[0].mem.kb, Some(2048));
        assert!(!vm.processes[1].is_running());
        assert_eq!(vm.processes[1].cpu.total, None);
        assert_eq!(vm.vitals.cpu.user, "3.4");
        assert_eq!(vm.vitals.load.0, vec!["0.1", "0.2", "0.3"]);
        assert_eq!(vm.vitals.disk.system.percent, "40");
        assert_eq!(vm.vitals.disk.persistent.percent, "");
        assert_eq!(vm.vitals.uptime.secs, Some(3600));
    }
}
