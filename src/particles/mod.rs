//! 粒子模拟内核
//!
//! 固定步长驱动的 2D 粒子模拟：曲线求值、参数、三个属性控制器、
//! 粒子状态机，以及负责池化、生成、子粒子发射和引力井的发射器。
//!
//! ## 架构设计
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       Emitter                            │
//! ├─────────────────────────────────────────────────────────┤
//! │  pool ◀──── kill ────── active ◀──── spawn / emit_batch  │
//! │                           │                              │
//! │                   update(dt) per particle                │
//! │     scroll ─▶ gravity wells ─▶ Particle::step            │
//! │                           │                              │
//! │          Motion / Color / Visual controllers             │
//! │                 (Parameter + Curve)                      │
//! ├─────────────────────────────────────────────────────────┤
//! │  ParticleRenderer: add / update / kill / destroy         │
//! │  Zone:             random_point / emit                   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 使用示例
//!
//! ```
//! use particle_kernel::particles::{BatchConfig, Emitter, Template};
//!
//! let mut emitter = Emitter::new();
//! emitter.add_template(
//!     "spark",
//!     Template::from_json_str(r#"{"lifespan": 500, "vy": {"min": -2, "max": -1}}"#).unwrap(),
//! );
//! emitter.emit_batch("spark", 100.0, 100.0, BatchConfig::new(20));
//! emitter.update(16.0);
//! assert_eq!(emitter.alive_count(), 20);
//! ```

pub mod batch;
pub mod color;
pub mod curve;
pub mod emitter;
pub mod gravity_well;
pub mod math;
pub mod motion;
pub mod parameter;
pub mod particle;
pub mod renderer;
pub mod template;
pub mod visual;
pub mod zone;


pub use batch::{BatchConfig, Radiate, RadiateFrom, Repeat, ZoneDistribution};
pub use color::ColorController;
pub use curve::{Curve, CurvePoint};
pub use emitter::{Emitter, EmitterEvents, EmitterStats};
pub use gravity_well::{GravityWell, GravityWellId};
pub use motion::{MotionController, TargetPath, VectorParameter};
pub use parameter::Parameter;
pub use particle::{Particle, ParticleId, StepOutcome};
pub use renderer::{ParticleRenderer, VisualHandle};
pub use template::{EmitSpec, InheritFlags, ParamSpec, Template, TemplateLibrary};
pub use visual::{Animation, SpawnHints, VisualController, ZOrder};
pub use zone::Zone;
