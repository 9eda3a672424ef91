//! # Particle Kernel
//!
//! A time-stepped 2D particle simulation kernel with declarative templates.
//!
//! ## Features
//!
//! - **Curves**: piecewise-linear evaluation and integration over `[0,1]`
//! - **Parameters**: `initial + value × curve(life)` with per-step drift and clamping
//! - **Controllers**: motion (velocity, acceleration, facing, target seeking), color (RGB/HSV tint), visual descriptors
//! - **Emitter**: object pool, batch emission with zones and repeat scheduling, child emission, gravity wells
//! - **Templates**: JSON/TOML particle definitions parsed with serde
//!
//! ## Architecture Design
//!
//! The kernel owns no pixels and issues no draw calls. Rendering and spawn
//! geometry are external collaborators reached through two narrow traits:
//! [`particles::ParticleRenderer`] and [`particles::Zone`].
//!
//! ### Example
//!
//! ```ignore
//! use particle_kernel::config::KernelConfig;
//! use particle_kernel::particles::Emitter;
//!
//! let config = KernelConfig::load_or_default();
//! particle_kernel::core::init_logging(&config.logging);
//! let mut emitter = Emitter::with_config(config.emitter)?;
//! emitter.load_templates_json(include_str!("fireworks.json"))?;
//! emitter.spawn("rocket", 320.0, 480.0, None);
//! emitter.update(16.0);
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Errors, logging and shared macros
//! - [`config`]: Kernel configuration
//! - [`particles`]: Simulation kernel

/// Errors, logging setup and shared macros
pub mod core;
/// Configuration system
pub mod config;
/// Particle simulation kernel
pub mod particles;

pub use crate::core::{ParticleError, ParticleResult};
