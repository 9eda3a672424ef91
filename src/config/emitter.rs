use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 发射器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// 预分配的粒子池大小
    pub initial_pool_size: usize,

    /// 同时存活的粒子上限（0表示不限）
    pub max_particles: usize,

    /// 随机种子（None表示使用系统熵）
    pub seed: Option<u64>,

    /// 全局力，每步叠加到粒子速度
    pub force: [f32; 2],

    /// 滚动速度，每步叠加到粒子位置
    pub scroll_speed: [f32; 2],
}

impl_default!(EmitterConfig {
    initial_pool_size: 0,
    max_particles: 0,
    seed: None,
    force: [0.0, 0.0],
    scroll_speed: [0.0, 0.0],
});

impl EmitterConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_particles != 0 && self.initial_pool_size > self.max_particles {
            return Err(ConfigError::ValidationError(
                "initial_pool_size exceeds max_particles".to_string(),
            ));
        }
        if !self.force.iter().chain(self.scroll_speed.iter()).all(|v| v.is_finite()) {
            return Err(ConfigError::ValidationError(
                "force and scroll_speed must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_larger_than_cap_is_rejected() {
        let config = EmitterConfig {
            initial_pool_size: 64,
            max_particles: 16,
            ..EmitterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_finite_force_is_rejected() {
        let config = EmitterConfig {
            force: [f32::NAN, 0.0],
            ..EmitterConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
