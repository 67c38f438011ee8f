//! Public portfolio hosting on `<slug>.<base-domain>`.

pub mod host;
pub mod middleware;
pub mod render;

pub use host::TenantHosts;
pub use middleware::subdomain_router;
