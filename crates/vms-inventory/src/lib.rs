//! # vms-inventory
//!
//! vSphere-style REST inventory provider for vmsync.
//!
//! Endpoints used, relative to the configured host:
//! - `POST /api/session` (basic auth) returns a session token, sent as
//!   `vmware-api-session-id` on every later call
//! - `GET /api/inventory/vms` lists `{ "uuid": ... }` entries
//! - `GET /api/inventory/vms/{uuid}` returns one property bag, 404 when the
//!   VM is gone
//! - `GET /api/inventory/custom-fields` lists custom attribute definitions
//! - `DELETE /api/session` on close
//!
//! [`VsphereMapper`] turns a property bag into a [`vms_core::VmRecord`].

mod client;
mod error;
mod http;
pub mod mapper;
pub mod model;

pub use client::{VsphereProvider, VsphereSession};
pub use error::InventoryError;
pub use mapper::{AttributeLookup, VsphereMapper};
