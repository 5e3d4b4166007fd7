//! Endpoint wrappers, one module per resource family.

mod ceph;
mod interfaces;
mod nodes;
mod notifications;

pub use interfaces::find_by_mac;
