//! 重新订阅的指数退避
//!
//! - 初始延迟：250ms（可配置）
//! - 每次翻倍，上限 8s（可配置）
//! - 向下抖动：乘以 [0.75, 1.0] 的随机系数

use std::time::Duration;

use crate::config::Config;

/// 退避配置
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// 向下抖动比例（0.25 = 最多减少 25%）
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
            jitter_factor: 0.25,
        }
    }
}

impl BackoffConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial_delay: config.reconnect_initial_delay(),
            max_delay: config.reconnect_max_delay(),
            ..Self::default()
        }
    }
}

/// 计算第 `attempt` 次重试前的延迟（从 0 开始）
pub fn reconnect_delay(attempt: u32, config: &BackoffConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt.min(30) as i32);
    let capped = base.min(config.max_delay.as_secs_f64());
    let jitter = 1.0 - rand::random::<f64>() * config.jitter_factor;
    Duration::from_secs_f64(capped * jitter)
}
