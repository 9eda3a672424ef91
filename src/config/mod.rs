/// 统一配置系统
///
/// 提供TOML/JSON配置文件、环境变量和运行时动态调整
use crate::impl_default;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod emitter;

pub use emitter::EmitterConfig;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 内核主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KernelConfig {
    /// 发射器配置
    #[serde(default)]
    pub emitter: EmitterConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl KernelConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 保存为JSON文件
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("PARTICLES_POOL_SIZE") {
            if let Ok(size) = val.parse() {
                self.emitter.initial_pool_size = size;
            }
        }
        if let Ok(val) = env::var("PARTICLES_MAX_PARTICLES") {
            if let Ok(max) = val.parse() {
                self.emitter.max_particles = max;
            }
        }
        if let Ok(val) = env::var("PARTICLES_SEED") {
            if let Ok(seed) = val.parse() {
                self.emitter.seed = Some(seed);
            }
        }
        if let Ok(val) = env::var("PARTICLES_FORCE_X") {
            if let Ok(x) = val.parse() {
                self.emitter.force[0] = x;
            }
        }
        if let Ok(val) = env::var("PARTICLES_FORCE_Y") {
            if let Ok(y) = val.parse() {
                self.emitter.force[1] = y;
            }
        }
        if let Ok(val) = env::var("PARTICLES_LOG_LEVEL") {
            if let Some(level) = LogLevel::parse(&val) {
                self.logging.level = level;
            }
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.emitter.validate()?;
        Ok(())
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./particles.toml
    /// 2. ./particles.json
    /// 3. ~/.config/particle_kernel/particles.toml
    /// 4. 使用默认配置
    pub fn load_or_default() -> Self {
        if let Ok(config) = Self::from_toml_file("particles.toml") {
            tracing::info!(target: "config", "Loaded config from particles.toml");
            return config;
        }

        if let Ok(config) = Self::from_json_file("particles.json") {
            tracing::info!(target: "config", "Loaded config from particles.json");
            return config;
        }

        if let Some(home) = env::var_os("HOME") {
            let config_path = PathBuf::from(home)
                .join(".config")
                .join("particle_kernel")
                .join("particles.toml");

            if let Ok(config) = Self::from_toml_file(&config_path) {
                tracing::info!(target: "config", "Loaded config from {:?}", config_path);
                return config;
            }
        }

        tracing::info!(target: "config", "Using default configuration");
        Self::default()
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,

    /// 是否输出到控制台
    pub log_to_console: bool,
}

impl_default!(LoggingConfig {
    level: LogLevel::Info,
    log_to_console: true,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

impl LogLevel {
    /// 从字符串解析（不区分大小写）
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KernelConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_serialization() {
        let config = KernelConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: KernelConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(
            config.emitter.initial_pool_size,
            parsed.emitter.initial_pool_size
        );
    }

    #[test]
    fn test_partial_toml() {
        let parsed = KernelConfig::from_toml_str(
            r#"
            [emitter]
            initial_pool_size = 32
            seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(parsed.emitter.initial_pool_size, 32);
        assert_eq!(parsed.emitter.seed, Some(7));
        assert_eq!(parsed.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_json_serialization() {
        let config = KernelConfig::default();
        let json_str = serde_json::to_string(&config).unwrap();
        let parsed: KernelConfig = serde_json::from_str(&json_str).unwrap();
        assert_eq!(config.emitter.max_particles, parsed.emitter.max_particles);
    }

    #[test]
    fn test_invalid_json() {
        let err = KernelConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars = [
            ("PARTICLES_POOL_SIZE", "12"),
            ("PARTICLES_MAX_PARTICLES", "34"),
            ("PARTICLES_SEED", "56"),
            ("PARTICLES_FORCE_X", "0.25"),
            ("PARTICLES_FORCE_Y", "-1.5"),
            ("PARTICLES_LOG_LEVEL", "Debug"),
        ];
        for (key, value) in vars {
            env::set_var(key, value);
        }
        let mut config = KernelConfig::default();
        config.apply_env_overrides();
        for (key, _) in vars {
            env::remove_var(key);
        }

        assert_eq!(config.emitter.initial_pool_size, 12);
        assert_eq!(config.emitter.max_particles, 34);
        assert_eq!(config.emitter.seed, Some(56));
        assert_eq!(config.emitter.force, [0.25, -1.5]);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_file_round_trip() {
        let path = env::temp_dir().join(format!(
            "particle_kernel_config_{}.toml",
            std::process::id()
        ));
        let mut config = KernelConfig::default();
        config.emitter.initial_pool_size = 24;
        config.emitter.seed = Some(9);
        config.emitter.scroll_speed = [1.0, 0.0];
        config.logging.level = LogLevel::Warn;

        config.save_toml(&path).unwrap();
        let loaded = KernelConfig::from_toml_file(&path);
        std::fs::remove_file(&path).unwrap();
        let loaded = loaded.unwrap();

        assert_eq!(loaded.emitter.initial_pool_size, 24);
        assert_eq!(loaded.emitter.seed, Some(9));
        assert_eq!(loaded.emitter.scroll_speed, [1.0, 0.0]);
        assert_eq!(loaded.logging.level, LogLevel::Warn);

        assert!(matches!(
            KernelConfig::from_toml_file(&path),
            Err(ConfigError::FileError(_))
        ));
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
    }
}
