//! Wire shapes of the inventory API.
//!
//! Every field is optional on the wire; anything missing deserializes to its
//! `Default` so the mapper never has to fail on a sparse property bag.

use serde::Deserialize;

/// One entry of `GET /api/inventory/vms`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VmListEntry {
    pub uuid: Option<String>,
    pub name: Option<String>,
}

/// A custom field definition from `GET /api/inventory/custom-fields`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CustomFieldDef {
    pub key: i64,
    pub name: String,
}

/// The property bag of `GET /api/inventory/vms/{uuid}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VmProperties {
    /// Managed object reference, e.g. `vm-42`.
    pub moref: String,
    pub summary: Summary,
    pub config: VmConfig,
    pub guest: GuestInfo,
    pub snapshot: Option<serde_json::Value>,
    pub custom_value: Vec<CustomValue>,
    pub parent: Option<Box<ParentEntity>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Summary {
    pub config: SummaryConfig,
    pub runtime: Runtime,
    pub guest: Option<SummaryGuest>,
    pub storage: Storage,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SummaryConfig {
    pub name: String,
    pub uuid: Option<String>,
    pub instance_uuid: String,
    pub vm_path_name: String,
    pub num_cpu: i64,
    pub cpu_reservation: i64,
    #[serde(rename = "memorySizeMB")]
    pub memory_size_mb: i64,
    pub memory_reservation: i64,
    pub guest_full_name: String,
    pub guest_id: String,
    pub num_ethernet_cards: i64,
    pub num_virtual_disks: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Runtime {
    pub host: Option<HostRef>,
    pub power_state: String,
    pub connection_state: String,
    pub consolidation_needed: bool,
    pub das_vm_protection: Option<DasProtection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostRef {
    pub name: String,
    /// The compute resource (cluster) the host belongs to.
    pub parent: Option<NamedRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NamedRef {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DasProtection {
    pub das_protected: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SummaryGuest {
    pub host_name: String,
    pub tools_status: String,
    pub tools_version_status: String,
    pub ip_address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Storage {
    /// Bytes.
    pub committed: i64,
    /// Bytes.
    pub uncommitted: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VmConfig {
    pub version: String,
    pub cpu_allocation: Allocation,
    pub memory_allocation: Allocation,
    pub cpu_hot_add_enabled: bool,
    pub memory_hot_add_enabled: bool,
    pub datastore_url: Vec<DatastoreUrl>,
    pub extra_config: Vec<OptionValue>,
    pub managed_by: Option<serde_json::Value>,
    pub tools: ToolsConfig,
    pub hardware: Hardware,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Allocation {
    pub limit: i64,
    pub reservation: i64,
    pub shares: Option<Shares>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Shares {
    pub level: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatastoreUrl {
    pub name: String,
    pub url: String,
}

/// An `extraConfig` entry. Values are strings on the wire but some
/// appliances send bare numbers or booleans.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OptionValue {
    pub key: String,
    pub value: serde_json::Value,
}

impl OptionValue {
    /// The value rendered as text, with strings unquoted.
    #[must_use]
    pub fn value_text(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolsConfig {
    pub tools_version: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Hardware {
    pub device: Vec<Device>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Device {
    /// Managed type name, e.g. `VirtualDisk` or `ParaVirtualSCSIController`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "capacityInKB")]
    pub capacity_in_kb: i64,
    pub backing: Option<DiskBacking>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiskBacking {
    pub thin_provisioned: Option<bool>,
    /// Present only on raw device mappings.
    pub compatibility_mode: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GuestInfo {
    pub guest_family: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CustomValue {
    pub key: i64,
    pub value: String,
}

/// One link of the parent chain: `Folder`, `Datacenter`, `VirtualApp`, ...
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParentEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub parent: Option<Box<ParentEntity>>,
}
