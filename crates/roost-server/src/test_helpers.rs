//! Test helpers for roost-server
//!
//! Provides a boot service over an in-memory store with a small task set.

use crate::provisioning::BootService;
use crate::store::{MemoryStore, Store};
use roost_ipxe::{KernelTask, MicrokernelConfig, TaskRegistry};
use roost_policy::{Policy, PolicyRepository};
use std::sync::Arc;

pub const TEST_SERVER_URL: &str = "http://192.168.1.1:8150";

/// Built-in tasks plus a `centos` kernel task
pub fn test_tasks() -> TaskRegistry {
    let mut tasks = TaskRegistry::with_builtin();
    tasks.register(Arc::new(
        KernelTask::new("centos", "vmlinuz", "initrd.img")
            .with_kernel_args("ks={{ server_url }}/ks/{{ node_id }}"),
    ));
    tasks
}

/// Create a boot service over a fresh in-memory store
pub fn create_test_service(policies: Vec<Policy>) -> Arc<BootService> {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    Arc::new(BootService::new(
        store,
        PolicyRepository::from_policies(policies).expect("test policies must be valid"),
        test_tasks(),
        MicrokernelConfig::new(format!("{}/microkernel", TEST_SERVER_URL)),
        TEST_SERVER_URL,
    ))
}

/// Create a test router with all routes
pub fn create_test_router(policies: Vec<Policy>) -> axum::Router {
    crate::api::router(create_test_service(policies))
}
