//! 统一错误处理模块
//!
//! 提供粒子内核范围内的统一错误类型定义
//!
//! ## 错误分类
//!
//! - **创作错误**（模板中的未知子键、格式错误的范围）：不会产生错误，降级为默认值并记录日志
//! - **契约违规**（曲线缺少 x=0/x=1 端点、负的生命周期）：在校验阶段返回 `ParticleError`
//! - **池耗尽**：不是错误，池会按需增长
//!
//! 每帧执行的路径（曲线求值、粒子步进、发射器更新）永远不返回错误。

use crate::config::ConfigError;
use thiserror::Error;

/// 粒子内核错误类型
#[derive(Error, Debug)]
pub enum ParticleError {
    #[error("Invalid curve: {0}")]
    InvalidCurve(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Template parse error: {0}")]
    TemplateParse(String),

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 粒子内核结果类型别名
pub type ParticleResult<T> = Result<T, ParticleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let config_err = ConfigError::ValidationError("bad pool size".to_string());
        let err: ParticleError = config_err.into();
        assert!(matches!(err, ParticleError::Config(_)));
    }

    #[test]
    fn test_error_display() {
        let err = ParticleError::InvalidCurve("first point must be at x=0".to_string());
        assert_eq!(err.to_string(), "Invalid curve: first point must be at x=0");
    }
}
