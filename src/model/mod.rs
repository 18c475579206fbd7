// ABOUTME: Topology value types: clusters, stages, slots, nodes and endpoints.
// ABOUTME: Host names and ids derived here are pure functions of their inputs.

mod cluster;
mod endpoint;
mod node;
mod slot;
mod stage;

pub use cluster::{Cluster, HealthConfig};
pub use endpoint::Endpoint;
pub use node::ClusterNode;
pub use slot::{DEFAULT_HTTP_PORT, DEFAULT_HTTPS_PORT, Slot};
pub use stage::{DEFAULT_PATH, Stage};
