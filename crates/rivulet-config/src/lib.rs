//! Engine settings for the rivulet audio graph.
//!
//! Settings live in a small TOML file. Every field is optional in the file and
//! validated after parsing, so a typo in a block size is reported with the
//! field name instead of surfacing as a device error later.
//!
//! # Features
//!
//! - **Engine settings**: [`EngineConfig`] load/save, converted into
//!   [`ContextOptions`](rivulet_core::ContextOptions)
//! - **Validation**: range checks that collect every failure
//! - **Paths**: platform-specific settings location (`std` feature)
//!
//! # Example
//!
//! ```rust,no_run
//! use rivulet_config::{EngineConfig, paths};
//! use rivulet_core::Context;
//!
//! let config = EngineConfig::load_or_default(paths::default_engine_path()).unwrap();
//! let ctx = Context::new(config.into_context_options());
//! assert!(ctx.frames_per_block() >= 16);
//! ```

mod engine;
mod error;

/// Platform-specific paths for settings files.
#[cfg(feature = "std")]
pub mod paths;

/// Range checks for engine settings.
pub mod validation;

pub use engine::EngineConfig;
pub use error::ConfigError;
pub use validation::{ValidationError, ValidationResult};
