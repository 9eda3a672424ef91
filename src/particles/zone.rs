//! 区域接口
//!
//! 区域是外部几何提供者，内核只通过这个窄接口获取生成坐标。

use super::batch::{BatchConfig, ZoneDistribution};
use super::emitter::Emitter;
use super::particle::ParticleId;
use glam::Vec2;
use rand::RngCore;

/// 生成坐标提供者
pub trait Zone {
    /// 区域内的随机点（相对发射原点）
    fn random_point(&self, rng: &mut dyn RngCore) -> Vec2;

    /// 完整遍历区域的点，`step` 为采样间隔；默认不支持遍历
    fn points(&self, _step: usize) -> Vec<Vec2> {
        Vec::new()
    }

    /// 沿路径百分比处的点；默认不支持路径
    fn point_at(&self, _percent: f32) -> Option<Vec2> {
        None
    }

    /// 按分布在区域内生成粒子，回调 [`Emitter::spawn`]
    fn emit(
        &self,
        emitter: &mut Emitter,
        key: &str,
        origin: Vec2,
        config: &BatchConfig,
    ) -> Vec<ParticleId> {
        let points: Vec<Vec2> = match config.distribution {
            ZoneDistribution::Random => (0..config.total)
                .map(|_| self.random_point(emitter.rng_mut()))
                .collect(),
            ZoneDistribution::Full { step } => self.points(step.max(1)),
            ZoneDistribution::Percent(percent) => match self.point_at(percent.clamp(0.0, 1.0)) {
                Some(point) => vec![point],
                None => vec![self.random_point(emitter.rng_mut())],
            },
        };

        points
            .into_iter()
            .enumerate()
            .filter_map(|(i, point)| {
                let position = origin + point + config.step_offset(i);
                emitter.spawn(key, position.x, position.y, None)
            })
            .collect()
    }
}
