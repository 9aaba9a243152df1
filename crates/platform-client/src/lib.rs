//! Platform Client
//!
//! The narrow slice of the Kubernetes API the MyApp controller consumes:
//! versioned reads, creates, replica updates and status updates for the
//! `MyApp` resource and its owned Deployment and Service.
//!
//! # Example
//!
//! ```no_run
//! use platform_client::{KubePlatformClient, ObjectKey, PlatformClientTrait};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubePlatformClient::new(kube::Client::try_default().await?);
//!
//! let key = ObjectKey::new("default", "web");
//! let app = client.get_app(&key).await?;
//! println!("{} at version {}", key, app.version);
//! # Ok(())
//! # }
//! ```
//!
//! Every write takes the [`VersionToken`] returned by the read it is based on,
//! so a write against a stale copy fails with [`PlatformError::Conflict`]
//! instead of silently overwriting a newer object.

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod platform_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::KubePlatformClient;
pub use error::PlatformError;
pub use models::*;
pub use platform_trait::PlatformClientTrait;
#[cfg(feature = "test-util")]
pub use mock::{Failure, MockPlatformClient, Operation};
