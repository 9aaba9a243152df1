//! MyApp CRD
//!
//! Declares a containerized application: which image to run, how many
//! replicas, and which port the container listens on. The controller derives
//! a Deployment and a ClusterIP Service from it and reports progress in the
//! status subresource.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "example.com",
    version = "v1",
    kind = "MyApp",
    namespaced,
    status = "MyAppStatus",
    shortname = "myapp",
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Ready","type":"integer","jsonPath":".status.readyReplicas"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MyAppSpec {
    /// Container image reference
    pub image: String,

    /// Desired number of pod replicas
    #[schemars(range(min = 0))]
    pub replicas: i32,

    /// Port the container listens on (exposed as port 80 by the Service)
    #[schemars(range(min = 1, max = 65535))]
    pub port: i32,
}

/// Observed state, written only by the controller.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MyAppStatus {
    /// Lifecycle phase; absent until the first reconciliation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<AppPhase>,

    /// Human-readable progress message
    #[serde(default)]
    pub message: String,

    /// Ready replicas reported by the owned Deployment
    #[serde(default)]
    pub ready_replicas: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
/// Application phase
///
/// Serializes as PascalCase ("Pending", "Running").
#[serde(rename_all = "PascalCase")]
pub enum AppPhase {
    /// Child resources are being created or replicas are not all ready
    Pending,

    /// Every desired replica is ready
    Running,
}

impl std::fmt::Display for AppPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppPhase::Pending => f.write_str("Pending"),
            AppPhase::Running => f.write_str("Running"),
        }
    }
}

impl MyApp {
    /// Current phase, or `None` if the resource has never been reconciled.
    pub fn phase(&self) -> Option<AppPhase> {
        self.status.as_ref().and_then(|s| s.phase)
    }
}
