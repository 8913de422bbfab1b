//! Shared types, error model, and configuration for vaultdown.
//!
//! This crate is the foundation depended on by all other vaultdown crates.
//! It provides:
//! - [`VaultdownError`], [`StageError`], [`TransformError`]: the error model
//! - [`DocumentMeta`]: auxiliary output of the body pipeline
//! - Configuration ([`AppConfig`], [`ConvertConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AnchorStyle, AppConfig, ConvertConfig, DEFAULT_CONCURRENCY, EngineConfig, Preset, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, StageError, TransformError, VaultdownError};
pub use types::DocumentMeta;
