//! 后台任务的休眠间隔策略
//!
//! garbage sweep 的间隔随磁盘使用率自适应：
//! 使用率 < 60% 时 ratio 接近 1，间隔接近 max；
//! 60% ~ 75% 之间 ratio 从约 0.85 急速降到约 0.2；
//! 使用率 > 75% 后 ratio 缓慢趋近 0，间隔退化为 min。

use std::f64::consts::PI;
use std::time::Duration;

use tracing::{info, warn};

/// 校验后的 garbage sweep 间隔上下界（秒），保证 `max_secs >= min_secs >= 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GarbageSweepBounds {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl GarbageSweepBounds {
    pub fn validate(min_interval: i64, max_interval: i64) -> Self {
        if max_interval >= min_interval && min_interval > 0 {
            return Self { min_secs: min_interval as u64, max_secs: max_interval as u64 };
        }
        warn!(
            max = max_interval, min = min_interval,
            "garbage sweep interval config is illegal"
        );
        let min_secs = 1u64;
        let max_secs = if max_interval > 0 { (max_interval as u64).max(min_secs) } else { min_secs };
        info!(max = max_secs, min = min_secs, "force reset garbage sweep interval");
        Self { min_secs, max_secs }
    }
}

/// 磁盘使用率（百分比，0~100）对应的间隔缩放比例，取值 [0, 1)，随 `p` 单调不增
pub fn sweep_ratio(p: f64) -> f64 {
    let ratio = (1.1 * (PI / 2.0 - (p / 5.0 - 14.0).atan()) - 0.28) / PI;
    ratio.max(0.0)
}

/// 由上一轮清理后的磁盘使用率（0~1）计算下一次清理前的休眠时间
///
/// 非法的 usage（NaN）按 1.0 处理，即假设磁盘已满。
pub fn sweep_interval(usage: f64, bounds: GarbageSweepBounds) -> Duration {
    let usage = if usage.is_nan() { 1.0 } else { usage.clamp(0.0, 1.0) };
    let ratio = sweep_ratio(usage * 100.0);
    let scaled = (bounds.max_secs as f64 * ratio) as u64;
    Duration::from_secs(scaled.max(bounds.min_secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ratio_reference_points() {
        assert!(sweep_ratio(30.0) > 0.9);
        assert!(sweep_ratio(90.0) < 0.02);
        assert!(sweep_ratio(60.0) > 0.8 && sweep_ratio(60.0) < 0.9);
        assert!(sweep_ratio(75.0) > 0.15 && sweep_ratio(75.0) < 0.3);
        assert!(sweep_ratio(0.0) < 1.0);
    }

    #[test]
    fn ratio_is_clamped_to_exact_zero() {
        // p = 100 时原式为负
        let raw = (1.1 * (PI / 2.0 - (100.0f64 / 5.0 - 14.0).atan()) - 0.28) / PI;
        assert!(raw < 0.0);
        assert_eq!(sweep_ratio(100.0), 0.0);
        assert_eq!(sweep_ratio(90.0), 0.0);
    }

    #[test]
    fn illegal_bounds_are_reset() {
        assert_eq!(
            GarbageSweepBounds::validate(0, 3600),
            GarbageSweepBounds { min_secs: 1, max_secs: 3600 }
        );
        assert_eq!(
            GarbageSweepBounds::validate(10, 5),
            GarbageSweepBounds { min_secs: 1, max_secs: 5 }
        );
        assert_eq!(
            GarbageSweepBounds::validate(-5, -10),
            GarbageSweepBounds { min_secs: 1, max_secs: 1 }
        );
        assert_eq!(
            GarbageSweepBounds::validate(180, 43200),
            GarbageSweepBounds { min_secs: 180, max_secs: 43200 }
        );
    }

    #[test]
    fn full_disk_sweeps_at_min_interval() {
        let bounds = GarbageSweepBounds::validate(1, 3600);
        let expected = ((3600.0 * sweep_ratio(100.0)) as u64).max(1);
        assert_eq!(sweep_interval(1.0, bounds), Duration::from_secs(expected));
        assert_eq!(sweep_interval(1.0, bounds), Duration::from_secs(1));
    }

    #[test]
    fn idle_disk_sweeps_near_max_interval() {
        let bounds = GarbageSweepBounds::validate(1, 3600);
        assert!(sweep_interval(0.2, bounds) > Duration::from_secs(3400));
        assert_eq!(sweep_interval(f64::NAN, bounds), Duration::from_secs(1));
    }

    proptest! {
        #[test]
        fn ratio_is_non_increasing(a in 0.0f64..=100.0, b in 0.0f64..=100.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(sweep_ratio(lo) >= sweep_ratio(hi));
        }

        #[test]
        fn interval_stays_within_bounds(
            usage in 0.0f64..=1.0,
            min in any::<i32>(),
            max in any::<i32>(),
        ) {
            let bounds = GarbageSweepBounds::validate(min as i64, max as i64);
            prop_assert!(bounds.min_secs >= 1);
            prop_assert!(bounds.max_secs >= bounds.min_secs);

            let d = sweep_interval(usage, bounds);
            prop_assert!(d >= Duration::from_secs(bounds.min_secs));
            prop_assert!(d <= Duration::from_secs(bounds.max_secs));
        }
    }
}
