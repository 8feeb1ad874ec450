//! Provider adapters, registry, and cloud credential vendor.
//!
//! `adapter` holds C3 (the per-protocol adapters and the uniform trait),
//! `registry` holds C4 (name-keyed lookup, address resolution, fan-out,
//! and construction from a kind tag), `cloud` holds C5 (AWS credential
//! vending).

pub mod adapter;
pub mod cloud;
pub mod registry;

pub use adapter::{AdapterKind, ProviderAdapter, ProviderInfo};
pub use cloud::CloudCredentialVendor;
pub use registry::bootstrap::register_all;
pub use registry::ProviderRegistry;
