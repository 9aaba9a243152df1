//! Test utilities for unit testing reconcilers
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::config::RequeuePolicy;
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use crds::{MyApp, MyAppSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use platform_client::{MockPlatformClient, ObjectKey};

/// Helper to create a test MyApp CRD without status
pub fn create_test_app(name: &str, namespace: &str, image: &str, replicas: i32, port: i32) -> MyApp {
    MyApp {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{}", name)),
            ..Default::default()
        },
        spec: MyAppSpec {
            image: image.to_string(),
            replicas,
            port,
        },
        status: None,
    }
}

/// Reconciler over a mock platform, with a handle to the same mock for assertions
pub fn create_test_reconciler() -> (Reconciler, MockPlatformClient) {
    let mock = MockPlatformClient::new();
    let metrics = Metrics::new(&prometheus::Registry::new()).expect("metrics registration");
    let reconciler = Reconciler::new(mock.clone(), RequeuePolicy::default(), metrics);
    (reconciler, mock)
}

/// Reconciler plus a `web` MyApp (`app:v1`, 3 replicas, port 8080) already stored in the mock
pub fn setup_web_app() -> (Reconciler, MockPlatformClient, ObjectKey) {
    let (reconciler, mock) = create_test_reconciler();
    let key = mock.add_app(create_test_app("web", "default", "app:v1", 3, 8080));
    (reconciler, mock, key)
}

/// Key of the Service owned by the MyApp at `key`
pub fn service_key(key: &ObjectKey) -> ObjectKey {
    ObjectKey::new(key.namespace.clone(), crate::builder::service_name(&key.name))
}
