//! Ambient runtime pieces shared by the Relata crates: layered configuration
//! and tracing setup.

pub mod config;
pub mod layers;

pub use config::{
    ConfigError, ConfigValue, DefaultSecretResolver, FromConfigValue, RelataConfig,
    SecretResolver,
};
pub use layers::{init_tracing, init_tracing_with};
