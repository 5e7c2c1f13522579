//! 后台任务配置与校验
//!
//! 配置非法时从不报错：记录一条 warning 并回退到安全默认值。

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::common::{OlapError, Result};
use crate::interval::GarbageSweepBounds;

/// FD cache 清理间隔的安全默认值（秒）
pub const DEFAULT_FD_CACHE_CLEAN_INTERVAL_SECS: u64 = 3600;
/// 磁盘巡检 / 无用索引清理间隔的安全默认值（秒）
pub const DEFAULT_MONITOR_INTERVAL_SECS: u64 = 1;
/// compaction 检查间隔的安全默认值（秒）
pub const DEFAULT_COMPACTION_CHECK_INTERVAL_SECS: f64 = 1.0;

/// 与 be.conf 中同名的配置项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub base_compaction_num_threads:                  i32,
    pub cumulative_compaction_num_threads:            i32,
    pub base_compaction_check_interval_seconds:       f64,
    pub cumulative_compaction_check_interval_seconds: f64,
    pub file_descriptor_cache_clean_interval:         i64,
    pub max_garbage_sweep_interval:                   i64,
    pub min_garbage_sweep_interval:                   i64,
    pub disk_stat_monitor_interval:                   i64,
    pub unused_index_monitor_interval:                i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_compaction_num_threads:                  1,
            cumulative_compaction_num_threads:            1,
            base_compaction_check_interval_seconds:       60.0,
            cumulative_compaction_check_interval_seconds: 10.0,
            file_descriptor_cache_clean_interval:         3600,
            max_garbage_sweep_interval:                   43200,
            min_garbage_sweep_interval:                   180,
            disk_stat_monitor_interval:                   5,
            unused_index_monitor_interval:                30,
        }
    }
}

impl EngineConfig {
    /// 从 JSON 解析，缺省字段取默认值，未知字段忽略
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| OlapError::Config(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// 校验全部配置项，非法值逐项告警并替换
    pub fn validated(&self) -> WorkerSettings {
        WorkerSettings {
            base_compaction_threads: checked_thread_num(
                "base_compaction_num_threads", self.base_compaction_num_threads,
            ),
            cumulative_compaction_threads: checked_thread_num(
                "cumulative_compaction_num_threads", self.cumulative_compaction_num_threads,
            ),
            base_compaction_interval: checked_check_interval(
                "base_compaction_check_interval_seconds",
                self.base_compaction_check_interval_seconds,
            ),
            cumulative_compaction_interval: checked_check_interval(
                "cumulative_compaction_check_interval_seconds",
                self.cumulative_compaction_check_interval_seconds,
            ),
            fd_cache_clean_interval: checked_interval(
                "file_descriptor_cache_clean_interval",
                self.file_descriptor_cache_clean_interval,
                DEFAULT_FD_CACHE_CLEAN_INTERVAL_SECS,
            ),
            disk_stat_monitor_interval: checked_interval(
                "disk_stat_monitor_interval",
                self.disk_stat_monitor_interval,
                DEFAULT_MONITOR_INTERVAL_SECS,
            ),
            unused_index_monitor_interval: checked_interval(
                "unused_index_monitor_interval",
                self.unused_index_monitor_interval,
                DEFAULT_MONITOR_INTERVAL_SECS,
            ),
            garbage_sweep: GarbageSweepBounds::validate(
                self.min_garbage_sweep_interval,
                self.max_garbage_sweep_interval,
            ),
        }
    }
}

/// 校验后的后台任务参数，字段全部合法
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerSettings {
    pub base_compaction_threads:        usize,
    pub cumulative_compaction_threads:  usize,
    pub base_compaction_interval:       Duration,
    pub cumulative_compaction_interval: Duration,
    pub fd_cache_clean_interval:        Duration,
    pub disk_stat_monitor_interval:     Duration,
    pub unused_index_monitor_interval:  Duration,
    pub garbage_sweep:                  GarbageSweepBounds,
}

/// 整数秒间隔：必须为正，否则回退到 `default_secs`
pub fn checked_interval(name: &str, configured: i64, default_secs: u64) -> Duration {
    if configured <= 0 {
        warn!(
            config = name, value = configured, fallback = default_secs,
            "config of interval is illegal, force set to default"
        );
        return Duration::from_secs(default_secs);
    }
    Duration::from_secs(configured as u64)
}

/// compaction 检查间隔：以秒为单位，允许小数（微秒精度）
pub fn checked_check_interval(name: &str, configured: f64) -> Duration {
    match Duration::try_from_secs_f64(configured) {
        Ok(d) if configured > 0.0 && d >= Duration::from_micros(1) => d,
        _ => {
            warn!(
                config = name, value = configured,
                fallback = DEFAULT_COMPACTION_CHECK_INTERVAL_SECS,
                "compaction check interval config is illegal, force set to default"
            );
            Duration::from_secs_f64(DEFAULT_COMPACTION_CHECK_INTERVAL_SECS)
        }
    }
}

/// 线程数：负数视为 0（不启动该类 worker）
pub fn checked_thread_num(name: &str, configured: i32) -> usize {
    if configured < 0 {
        warn!(config = name, value = configured, "thread num config is illegal, force set to 0");
        return 0;
    }
    configured as usize
}
