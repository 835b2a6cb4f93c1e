//! The normalized record for one virtual machine.
//!
//! The field list is declared exactly once, in the `vm_record!` invocation
//! below. That single declaration produces the struct, its defaults, the
//! ordered column list used by the persistence layer, and the conversions
//! to and from an ordered list of [`FieldValue`]s. Every column is always
//! populated: a record is never partially assigned.

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// A single column value in storage-neutral form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
}

/// Rust types that may appear as a record column.
pub trait ColumnType: Sized {
    fn to_field(&self) -> FieldValue;
    fn from_field(value: FieldValue) -> Option<Self>;
}

impl ColumnType for String {
    fn to_field(&self) -> FieldValue {
        FieldValue::Text(self.clone())
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Text(s) => Some(s),
            FieldValue::Null => Some(Self::new()),
            FieldValue::Integer(_) => None,
        }
    }
}

impl ColumnType for i64 {
    fn to_field(&self) -> FieldValue {
        FieldValue::Integer(*self)
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Integer(n) => Some(n),
            FieldValue::Null => Some(0),
            FieldValue::Text(_) => None,
        }
    }
}

// SQLite has no boolean storage class; booleans travel as 0/1.
impl ColumnType for bool {
    fn to_field(&self) -> FieldValue {
        FieldValue::Integer(i64::from(*self))
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Integer(n) => Some(n != 0),
            FieldValue::Null => Some(false),
            FieldValue::Text(_) => None,
        }
    }
}

fn take_field<T: ColumnType>(
    values: &mut impl Iterator<Item = FieldValue>,
    column: &str,
) -> Result<T, CoreError> {
    let value = values
        .next()
        .ok_or_else(|| CoreError::Validation(format!("missing value for column '{column}'")))?;
    T::from_field(value.clone()).ok_or_else(|| {
        CoreError::Validation(format!("column '{column}' has incompatible value {value:?}"))
    })
}

macro_rules! vm_record {
    ($( $(#[doc = $doc:literal])* $field:ident : $ty:ty = $default:expr ),+ $(,)?) => {
        /// One virtual machine, flattened to a single row.
        ///
        /// `vm_uuid` is the identity key. `scope` tags the inventory source
        /// that produced the row so deletes never cross scopes.
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct VmRecord {
            $( $(#[doc = $doc])* pub $field: $ty, )+
        }

        impl Default for VmRecord {
            fn default() -> Self {
                Self { $( $field: $default, )+ }
            }
        }

        impl VmRecord {
            /// Column names in declaration order. Index 0 is the key.
            pub const COLUMNS: &'static [&'static str] = &[ $( stringify!($field), )+ ];

            /// All column values in [`Self::COLUMNS`] order.
            #[must_use]
            pub fn to_fields(&self) -> Vec<FieldValue> {
                vec![ $( ColumnType::to_field(&self.$field), )+ ]
            }

            /// Rebuild a record from values in [`Self::COLUMNS`] order.
            ///
            /// # Errors
            ///
            /// Returns `CoreError::Validation` if a value is missing or has
            /// the wrong storage class for its column.
            pub fn from_fields(values: Vec<FieldValue>) -> Result<Self, CoreError> {
                let mut values = values.into_iter();
                Ok(Self { $( $field: take_field(&mut values, stringify!($field))?, )+ })
            }
        }
    };
}

vm_record! {
    /// Identity key: the VM's UUID, or a synthetic key (see [`crate::ids`]).
    vm_uuid: String = String::new(),
    /// Inventory source that owns this row.
    scope: String = String::new(),
    name: String = String::new(),
    vcenter: String = String::new(),
    /// Value of the configured custom attribute (e.g. `cloud_instance_name`).
    cloud_name: String = String::new(),
    dns_name: String = String::new(),
    vm_host: String = String::new(),
    parent_id: String = String::new(),
    vc_cluster: String = String::new(),
    vc_datacenter: String = String::new(),
    attribute_uuid: String = String::new(),
    powerstate: String = String::new(),
    connectionstate: String = String::new(),
    datastorecluster: String = String::new(),
    haprotected: bool = false,
    numcpu: i64 = 0,
    cpulimit: i64 = 0,
    cpureservation: i64 = 0,
    cpushares: String = "normal".to_string(),
    cpuhotaddenabled: bool = false,
    memorymb: i64 = 0,
    memlimit: i64 = 0,
    memreservation: i64 = 0,
    memshares: String = "normal".to_string(),
    memhotaddenabled: bool = false,
    hardwareversion: String = String::new(),
    vmpath: String = String::new(),
    /// Id portion of the datastore path, `[ds] <id>/file.vmx`.
    vmpathname: String = String::new(),
    snapshot: bool = false,
    consolidationneeded: bool = false,
    sanreplicated: bool = false,
    srmreplicated: bool = false,
    srmplaceholder: bool = false,
    toolsstatus: String = String::new(),
    toolsversionstatus: String = String::new(),
    toolsversion: i64 = 0,
    guestfamily: String = String::new(),
    guestfullname: String = String::new(),
    osconfigfullname: String = String::new(),
    osconfigid: String = String::new(),
    floppydrive: bool = false,
    networkcount: i64 = 0,
    ipaddress: String = String::new(),
    vmdkcount: i64 = 0,
    vmdktotalgb: i64 = 0,
    sizeondiskgb: i64 = 0,
    provisioning: String = "Thick".to_string(),
    thindisks: i64 = 0,
    thinprovisionedgb: i64 = 0,
    datastorecount: i64 = 0,
    scsicontrollers: i64 = 0,
    diskformattedflat: i64 = 0,
    diskformatrawvirtual: i64 = 0,
    diskformatrawphysical: i64 = 0,
    diskenableuuid: bool = false,
}

impl VmRecord {
    /// Start a defaulted record with its identity and scope set.
    #[must_use]
    pub fn new(vm_uuid: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            vm_uuid: vm_uuid.into(),
            scope: scope.into(),
            ..Self::default()
        }
    }

    /// Whether the identity key was generated rather than reported by the source.
    #[must_use]
    pub fn has_synthetic_key(&self) -> bool {
        crate::ids::is_synthetic_key(&self.vm_uuid)
    }
}
