//! 自适应的 trash / snapshot 清理任务
//!
//! 磁盘使用率越高清理越频繁：每轮用上一次清理后的使用率计算下一次休眠时间，
//! 启动时假设磁盘已满（usage = 1.0），因此第一轮在 min 间隔后触发。

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::collaborator::StorageMaintenance;
use crate::common::Result;
use crate::interval::{sweep_interval, GarbageSweepBounds};
use crate::worker::{MaintenanceTask, StartPolicy};

pub struct GarbageSweepTask {
    bounds:      GarbageSweepBounds,
    usage:       f64,
    maintenance: Arc<dyn StorageMaintenance>,
}

impl GarbageSweepTask {
    pub fn new(bounds: GarbageSweepBounds, maintenance: Arc<dyn StorageMaintenance>) -> Self {
        Self { bounds, usage: 1.0, maintenance }
    }

    /// 最近一次成功清理后的磁盘使用率
    pub fn usage(&self) -> f64 { self.usage }
}

impl MaintenanceTask for GarbageSweepTask {
    fn name(&self) -> &str { "garbage-sweeper" }

    fn start_policy(&self) -> StartPolicy { StartPolicy::SleepFirst }

    fn next_interval(&mut self) -> Duration {
        sweep_interval(self.usage, self.bounds)
    }

    /// 清理失败时保留上一次的使用率，不提前重试
    fn run_once(&mut self) -> Result<()> {
        let usage = self.maintenance.sweep_trash()?;
        self.usage = if usage.is_finite() {
            usage.clamp(0.0, 1.0)
        } else {
            warn!(usage, "trash sweep reported a non-finite disk usage, assume disk is full");
            1.0
        };
        debug!(usage = self.usage, "trash sweep finished");
        Ok(())
    }
}
