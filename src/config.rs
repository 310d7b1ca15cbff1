use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 分测验 TOML 文件存放目录
    pub subtest_folder: String,
    /// 会话日志文件
    pub session_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 每个会话通道的缓冲容量
    pub channel_capacity: usize,
    /// 重新订阅的初始退避（毫秒）
    pub reconnect_initial_ms: u64,
    /// 重新订阅的最大退避（毫秒）
    pub reconnect_max_ms: u64,
    /// 非朗读分测验未指定时的计时上限（秒）；朗读计时固定 60 秒
    pub item_time_limit_seconds: u32,
    // --- 持久层 REST 配置 ---
    pub store_base_url: String,
    pub store_api_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            subtest_folder: "subtests".to_string(),
            session_log_file: "session_log.txt".to_string(),
            verbose_logging: false,
            channel_capacity: 64,
            reconnect_initial_ms: 250,
            reconnect_max_ms: 8_000,
            item_time_limit_seconds: 60,
            store_base_url: "http://localhost:54321/rest/v1".to_string(),
            store_api_key: String::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            subtest_folder: std::env::var("SUBTEST_FOLDER").unwrap_or(default.subtest_folder),
            session_log_file: std::env::var("SESSION_LOG_FILE").unwrap_or(default.session_log_file),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            channel_capacity: std::env::var("CHANNEL_CAPACITY").ok().and_then(|v| v.parse().ok()).unwrap_or(default.channel_capacity),
            reconnect_initial_ms: std::env::var("RECONNECT_INITIAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.reconnect_initial_ms),
            reconnect_max_ms: std::env::var("RECONNECT_MAX_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.reconnect_max_ms),
            item_time_limit_seconds: std::env::var("ITEM_TIME_LIMIT_SECONDS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.item_time_limit_seconds),
            store_base_url: std::env::var("STORE_BASE_URL").unwrap_or(default.store_base_url),
            store_api_key: std::env::var("STORE_API_KEY").unwrap_or(default.store_api_key),
        }
    }

    /// 从 TOML 文件加载配置，缺失的字段使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn reconnect_initial_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config = Config::from_toml_str(
            r#"
            subtest_folder = "fixtures/subtests"
            verbose_logging = true
            "#,
        )
        .unwrap();

        assert_eq!(config.subtest_folder, "fixtures/subtests");
        assert!(config.verbose_logging);
        assert_eq!(config.channel_capacity, 64);
        assert_eq!(config.item_time_limit_seconds, 60);
    }

    #[test]
    fn test_reconnect_delays() {
        let config = Config::default();
        assert_eq!(config.reconnect_initial_delay(), Duration::from_millis(250));
        assert_eq!(config.reconnect_max_delay(), Duration::from_secs(8));
    }
}
