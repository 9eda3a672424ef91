//! 引力井
//!
//! 点力源，每步把所属发射器的粒子拉向自身，力按距离平方反比衰减，
//! 并以最小距离下限避免奇点。

use super::particle::Particle;
use crate::core::{ParticleError, ParticleResult};
use glam::Vec2;

/// 引力井标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GravityWellId(pub(crate) u32);

/// 引力井
#[derive(Debug, Clone, PartialEq)]
pub struct GravityWell {
    pub position: Vec2,
    pub active: bool,
    power: f32,
    epsilon: f32,
    min_distance_sq: f32,
}

impl GravityWell {
    /// 创建引力井
    ///
    /// # 参数
    ///
    /// * `position` - 位置
    /// * `power` - 强度，负值为斥力
    /// * `epsilon` - 最小距离
    pub fn new(position: Vec2, power: f32, epsilon: f32) -> ParticleResult<Self> {
        if !position.is_finite() || !power.is_finite() {
            return Err(ParticleError::InvalidArgument(
                "gravity well position and power must be finite".to_string(),
            ));
        }
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(ParticleError::InvalidArgument(format!(
                "gravity well epsilon must be a non-negative number, got {}",
                epsilon
            )));
        }
        Ok(Self {
            position,
            active: true,
            power,
            epsilon,
            min_distance_sq: epsilon * epsilon,
        })
    }

    pub fn power(&self) -> f32 {
        self.power
    }

    pub fn set_power(&mut self, power: f32) {
        self.power = power;
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f32) {
        self.epsilon = epsilon.max(0.0);
        self.min_distance_sq = self.epsilon * self.epsilon;
    }

    /// 对位于 `target` 的粒子在 `elapsed` 毫秒内产生的速度增量
    ///
    /// `factor = power × elapsed / (d² × d)`，`d² = max(真实距离², 最小距离²)`；
    /// 真实距离为零时返回零。
    pub fn velocity_delta(&self, target: Vec2, elapsed: f32) -> Vec2 {
        let offset = self.position - target;
        let distance_sq = offset.length_squared();
        if distance_sq == 0.0 {
            return Vec2::ZERO;
        }
        let clamped_sq = distance_sq.max(self.min_distance_sq);
        let factor = self.power * elapsed / (clamped_sq * clamped_sq.sqrt());
        offset * factor
    }

    /// 把引力施加到粒子速度上；只读取井的状态
    pub fn apply(&self, particle: &mut Particle, elapsed: f32) {
        if !self.active {
            return;
        }
        let delta = self.velocity_delta(particle.position(), elapsed);
        if delta != Vec2::ZERO {
            particle.motion_mut().add_velocity(delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attracts_toward_well() {
        let well = GravityWell::new(Vec2::ZERO, 10.0, 0.0).unwrap();
        let delta = well.velocity_delta(Vec2::new(100.0, 0.0), 16.0);
        assert!(delta.x < 0.0);
        assert_eq!(delta.y, 0.0);
        // 10 * 16 / (10000 * 100) * -100
        assert!((delta.x + 0.016).abs() < 1e-6);
    }

    #[test]
    fn test_singularity_guard() {
        let well = GravityWell::new(Vec2::ZERO, 10.0, 0.0).unwrap();
        assert_eq!(well.velocity_delta(Vec2::ZERO, 16.0), Vec2::ZERO);
    }

    #[test]
    fn test_min_distance_floor() {
        let well = GravityWell::new(Vec2::ZERO, 10.0, 50.0).unwrap();
        let near = well.velocity_delta(Vec2::new(1.0, 0.0), 1.0);
        // d² 被夹到 2500
        let expected = -10.0 / (2500.0 * 50.0);
        assert!((near.x - expected).abs() < 1e-9);
    }

    #[test]
    fn test_inactive_well_is_ignored() {
        let mut well = GravityWell::new(Vec2::ZERO, 10.0, 0.0).unwrap();
        well.active = false;
        let mut particle = Particle::new();
        particle.set_position(Vec2::new(10.0, 0.0));
        well.apply(&mut particle, 16.0);
        assert_eq!(particle.motion().velocity.x.initial, 0.0);
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(GravityWell::new(Vec2::ZERO, 1.0, -1.0).is_err());
        assert!(GravityWell::new(Vec2::new(f32::NAN, 0.0), 1.0, 0.0).is_err());
        assert!(GravityWell::new(Vec2::ZERO, f32::INFINITY, 0.0).is_err());
    }
}
