//! MyApp CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the MyApp controller.

pub mod myapp;

pub use myapp::*;
