//! Field extraction: raw vSphere property bag to [`VmRecord`].

use vms_core::ids::synthetic_key;
use vms_core::provider::RawItem;
use vms_core::{MapError, VmRecord};

use crate::model::{CustomFieldDef, Device, ParentEntity, VmProperties};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const KB_PER_GB: f64 = 1024.0 * 1024.0;

const UNKNOWN_DATACENTER: &str = "Unknown";
const NO_DATASTORE: &str = "None Found";

/// Device types that are SCSI controllers.
const SCSI_CONTROLLERS: &[&str] = &[
    "VirtualSCSIController",
    "VirtualLsiLogicController",
    "VirtualLsiLogicSASController",
    "VirtualBusLogicController",
    "ParaVirtualSCSIController",
];

/// Result of looking up a named custom attribute on one VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeLookup {
    Found(String),
    /// The field is not defined, or the VM carries no value for it.
    NotFound,
}

/// Device counts gathered in one pass over the hardware list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceSummary {
    pub floppy: bool,
    pub thin_disks: i64,
    pub thin_capacity_kb: i64,
    pub flat_disks: i64,
    pub raw_virtual: i64,
    pub raw_physical: i64,
    pub scsi_controllers: i64,
}

impl DeviceSummary {
    #[must_use]
    pub fn scan(devices: &[Device]) -> Self {
        let mut summary = Self::default();
        for device in devices {
            match device.kind.as_str() {
                "VirtualFloppy" => summary.floppy = true,
                "VirtualDisk" => summary.add_disk(device),
                kind if SCSI_CONTROLLERS.contains(&kind) => summary.scsi_controllers += 1,
                _ => {}
            }
        }
        summary
    }

    fn add_disk(&mut self, disk: &Device) {
        let Some(backing) = &disk.backing else {
            self.flat_disks += 1;
            return;
        };
        if backing.thin_provisioned == Some(true) {
            self.thin_disks += 1;
            self.thin_capacity_kb = self.thin_capacity_kb.saturating_add(disk.capacity_in_kb);
        }
        match backing.compatibility_mode.as_deref() {
            Some("virtualMode") => self.raw_virtual += 1,
            Some("physicalMode") => self.raw_physical += 1,
            _ => self.flat_disks += 1,
        }
    }
}

/// Maps raw property bags for one scope.
#[derive(Debug, Clone)]
pub struct VsphereMapper {
    scope: String,
    vcenter: String,
    custom_attribute: String,
    custom_fields: Vec<CustomFieldDef>,
}

impl VsphereMapper {
    pub fn new(
        scope: impl Into<String>,
        vcenter: impl Into<String>,
        custom_attribute: impl Into<String>,
        custom_fields: Vec<CustomFieldDef>,
    ) -> Self {
        Self {
            scope: scope.into(),
            vcenter: vcenter.into(),
            custom_attribute: custom_attribute.into(),
            custom_fields,
        }
    }

    /// Build a fully populated record from one raw item.
    ///
    /// # Errors
    ///
    /// Returns `MapError` only when the property bag is not a JSON object.
    pub fn map(&self, raw: &RawItem) -> Result<VmRecord, MapError> {
        if !raw.properties.is_object() {
            return Err(MapError::new(&raw.identifier, "property bag is not an object"));
        }
        let mut bag = raw.properties.clone();
        strip_nulls(&mut bag);
        let props: VmProperties = serde_json::from_value(bag)
            .map_err(|e| MapError::new(&raw.identifier, e.to_string()))?;

        let summary = &props.summary;
        let config = &props.config;
        let devices = DeviceSummary::scan(&config.hardware.device);
        let guest = summary.guest.clone().unwrap_or_default();
        let host = summary.runtime.host.clone().unwrap_or_default();

        let vm_uuid = self.resolve_key(raw, &props);
        let extra = |key: &str| config.extra_config.iter().find(|o| o.key == key);
        let shares = |alloc: &crate::model::Allocation| {
            alloc
                .shares
                .as_ref()
                .map(|s| s.level.clone())
                .filter(|level| !level.is_empty())
                .unwrap_or_else(|| "normal".to_string())
        };

        Ok(VmRecord {
            vm_uuid,
            scope: self.scope.clone(),
            name: summary.config.name.clone(),
            vcenter: self.vcenter.clone(),
            cloud_name: match self.custom_attribute(&props) {
                AttributeLookup::Found(value) => value,
                AttributeLookup::NotFound => String::new(),
            },
            dns_name: guest.host_name.clone(),
            vm_host: host.name.clone(),
            parent_id: props.moref.clone(),
            vc_cluster: host.parent.map(|p| p.name).unwrap_or_default(),
            vc_datacenter: datacenter_of(props.parent.as_deref()),
            attribute_uuid: summary.config.instance_uuid.clone(),
            powerstate: summary.runtime.power_state.clone(),
            connectionstate: summary.runtime.connection_state.clone(),
            datastorecluster: first_datastore(&props),
            haprotected: summary
                .runtime
                .das_vm_protection
                .as_ref()
                .is_some_and(|d| d.das_protected),
            numcpu: summary.config.num_cpu,
            cpulimit: config.cpu_allocation.limit,
            cpureservation: summary.config.cpu_reservation,
            cpushares: shares(&config.cpu_allocation),
            cpuhotaddenabled: config.cpu_hot_add_enabled,
            memorymb: summary.config.memory_size_mb,
            memlimit: config.memory_allocation.limit,
            memreservation: summary.config.memory_reservation,
            memshares: shares(&config.memory_allocation),
            memhotaddenabled: config.memory_hot_add_enabled,
            hardwareversion: config.version.clone(),
            vmpath: summary.config.vm_path_name.clone(),
            vmpathname: vm_path_id(&summary.config.vm_path_name).unwrap_or_default(),
            snapshot: props.snapshot.is_some(),
            consolidationneeded: summary.runtime.consolidation_needed,
            sanreplicated: false,
            srmreplicated: extra("hbr_filter.destination").is_some(),
            srmplaceholder: config.managed_by.is_some(),
            toolsstatus: guest.tools_status.clone(),
            toolsversionstatus: if guest.tools_version_status.is_empty() {
                guest.tools_status.clone()
            } else {
                guest.tools_version_status.clone()
            },
            toolsversion: config.tools.tools_version,
            guestfamily: props.guest.guest_family.clone(),
            guestfullname: summary.config.guest_full_name.clone(),
            osconfigfullname: summary.config.guest_full_name.clone(),
            osconfigid: summary.config.guest_id.clone(),
            floppydrive: devices.floppy,
            networkcount: summary.config.num_ethernet_cards,
            ipaddress: guest.ip_address.clone(),
            vmdkcount: summary.config.num_virtual_disks,
            vmdktotalgb: bytes_to_gb(
                summary.storage.committed.saturating_add(summary.storage.uncommitted),
            ),
            sizeondiskgb: bytes_to_gb(summary.storage.committed),
            provisioning: if devices.thin_disks > 0 { "Thin" } else { "Thick" }.to_string(),
            thindisks: devices.thin_disks,
            thinprovisionedgb: kb_to_gb(devices.thin_capacity_kb),
            datastorecount: i64::try_from(config.datastore_url.len()).unwrap_or(i64::MAX),
            scsicontrollers: devices.scsi_controllers,
            diskformattedflat: devices.flat_disks,
            diskformatrawvirtual: devices.raw_virtual,
            diskformatrawphysical: devices.raw_physical,
            diskenableuuid: extra("disk.enableUUID").is_some_and(|o| o.value_text() == "1"),
        })
    }

    /// Look up the configured custom attribute by name, then by key.
    #[must_use]
    pub fn custom_attribute(&self, props: &VmProperties) -> AttributeLookup {
        let Some(field) = self
            .custom_fields
            .iter()
            .find(|f| f.name == self.custom_attribute)
        else {
            return AttributeLookup::NotFound;
        };
        props
            .custom_value
            .iter()
            .find(|v| v.key == field.key)
            .map_or(AttributeLookup::NotFound, |v| {
                AttributeLookup::Found(v.value.clone())
            })
    }

    /// The identifier the item was fetched by, then the native uuid, then a
    /// synthetic key built from stable attributes.
    ///
    /// Discovery never hands out blank identifiers, so the fallbacks only
    /// apply to direct callers of [`VsphereMapper::map`].
    fn resolve_key(&self, raw: &RawItem, props: &VmProperties) -> String {
        if !raw.identifier.trim().is_empty() {
            return raw.identifier.clone();
        }
        if let Some(uuid) = props.summary.config.uuid.as_deref()
            && !uuid.trim().is_empty()
        {
            return uuid.to_string();
        }
        synthetic_key(
            &self.scope,
            &props.summary.config.name,
            &props.summary.config.vm_path_name,
            &props.moref,
        )
    }
}

/// Walk the parent chain to the owning datacenter.
#[must_use]
pub fn datacenter_of(parent: Option<&ParentEntity>) -> String {
    let mut current = parent;
    while let Some(entity) = current {
        match entity.kind.as_str() {
            "Datacenter" => return entity.name.clone(),
            "Folder" => current = entity.parent.as_deref(),
            _ => break,
        }
    }
    UNKNOWN_DATACENTER.to_string()
}

/// Name of the first datastore the VM lives on.
#[must_use]
pub fn first_datastore(props: &VmProperties) -> String {
    props
        .config
        .datastore_url
        .first()
        .map(|ds| ds.name.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(NO_DATASTORE)
        .to_string()
}

/// The directory id in a datastore path such as
/// `[ds01] 5f0e8a2c-1b2d-4c5e-9f00-aabbccddeeff/web01.vmx`.
///
/// The id is the run of lowercase hex digits and dashes between a closing
/// `"] "` and the next `/`; the last such run wins.
#[must_use]
pub fn vm_path_id(path: &str) -> Option<String> {
    path.rmatch_indices("] ").find_map(|(idx, _)| {
        if !path[..idx].contains('[') {
            return None;
        }
        let rest = &path[idx + 2..];
        let end = rest.find('/')?;
        let id = &rest[..end];
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c) || c == '-');
        valid.then(|| id.to_string())
    })
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn bytes_to_gb(bytes: i64) -> i64 {
    (bytes as f64 / BYTES_PER_GB).round() as i64
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn kb_to_gb(kb: i64) -> i64 {
    (kb as f64 / KB_PER_GB).round() as i64
}

/// Remove `null` object entries so they fall back to field defaults.
fn strip_nulls(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}
