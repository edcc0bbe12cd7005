//! Configuration for PeerLink.
//!
//! Loading composes a TOML file, an optional `.env`, and environment
//! overrides into a [`Config`], collecting non-fatal [`ConfigWarnings`] on the
//! way. At runtime the federation part of the configuration lives in a
//! [`FederationConfigStore`], which persists accepted writes and notifies the
//! merge scheduler.

pub mod loader;
pub mod models;
pub mod sources;
pub mod store;
pub mod util;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    AdminToken, AuthConfig, Config, ConfigMetadata, FederationSettings,
    MergeSettings, ServerConfig,
};
pub use store::{ConfigStoreError, FederationConfigStore};
pub use validation::{ConfigWarning, ConfigWarnings};
