//! 渲染器接口
//!
//! 内核不持有像素、不发出绘制调用，只在状态机转换点调用这四个钩子：
//!
//! - `add`：粒子生成时恰好一次，返回不透明句柄
//! - `update`：每帧对每个存活粒子一次
//! - `kill`：粒子回到池时
//! - `destroy`：发射器销毁时一次

use super::particle::Particle;

/// 渲染器返回的不透明句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisualHandle(pub u64);

/// 外部渲染后端
pub trait ParticleRenderer {
    /// 粒子生成；`particle.visual().spawn_hints()` 此时可用
    fn add(&mut self, particle: &Particle) -> Option<VisualHandle>;

    /// 每帧更新
    fn update(&mut self, particle: &Particle);

    /// 粒子死亡
    fn kill(&mut self, particle: &Particle);

    /// 释放渲染资源
    fn destroy(&mut self);
}
