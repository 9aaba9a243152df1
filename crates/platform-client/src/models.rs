//! Identity and versioning types shared by every client operation.

use crate::error::PlatformError;
use kube::Resource;
use std::fmt;

/// Namespaced identity of an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an object from its metadata. Both name and namespace are required.
    pub fn of<K: Resource>(obj: &K) -> Result<Self, PlatformError> {
        let meta = obj.meta();
        let name = meta
            .name
            .clone()
            .ok_or_else(|| PlatformError::InvalidObject("object has no metadata.name".to_string()))?;
        let namespace = meta.namespace.clone().ok_or_else(|| {
            PlatformError::InvalidObject(format!("object {} has no metadata.namespace", name))
        })?;
        Ok(Self { namespace, name })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Opaque optimistic-concurrency token (the object's `resourceVersion`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An object together with the version token it was read at.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub object: T,
    pub version: VersionToken,
}

impl<K: Resource> Versioned<K> {
    /// Wraps an object read from the platform, taking its `resourceVersion` as the token.
    pub fn from_object(object: K) -> Result<Self, PlatformError> {
        let version = object
            .meta()
            .resource_version
            .clone()
            .map(VersionToken)
            .ok_or_else(|| {
                PlatformError::InvalidObject(format!(
                    "object {} has no metadata.resourceVersion",
                    object.meta().name.as_deref().unwrap_or("<unnamed>")
                ))
            })?;
        Ok(Self { object, version })
    }
}
