//! 通用周期任务框架
//!
//! 每个后台任务独占一个 OS 线程，循环执行：
//! ```text
//!   ┌──► 检查 stop ──► 休眠 interval（可被 stop 唤醒）──► 检查 stop ──► run_once ──┐
//!   └────────────────────────────────────────────────────────────────────────────┘
//! ```
//! `run_once` 返回的错误与 panic 都只记录日志，不会终止循环。

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::common::{OlapError, Result};

// ── 停止信号 ──────────────────────────────────────────────────────────────────

/// 所有后台线程共享的停止信号，休眠时阻塞在 Condvar 上而不是忙等
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    stopped: Mutex<bool>,
    cond:    Condvar,
}

impl ShutdownSignal {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn stop(&self) {
        *self.stopped.lock() = true;
        self.cond.notify_all();
    }

    pub fn is_stopped(&self) -> bool { *self.stopped.lock() }

    /// 休眠至多 `timeout`；期间收到停止信号则提前返回 true
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut stopped = self.stopped.lock();
        while !*stopped {
            match deadline {
                Some(deadline) => {
                    if self.cond.wait_until(&mut stopped, deadline).timed_out() {
                        break;
                    }
                }
                // 超出 Instant 可表示范围，等同于无限等待
                None => self.cond.wait(&mut stopped),
            }
        }
        *stopped
    }
}

// ── 任务定义 ──────────────────────────────────────────────────────────────────

/// 第一次执行前是否先休眠
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPolicy {
    /// 先休眠一个间隔再执行（garbage sweep / fd cache 清理）
    SleepFirst,
    /// 启动后立即执行一次，之后每次执行完再休眠
    ActFirst,
}

/// 一个周期性后台任务
pub trait MaintenanceTask: Send + 'static {
    fn name(&self) -> &str;

    fn start_policy(&self) -> StartPolicy { StartPolicy::SleepFirst }

    /// 下一次休眠时长，每轮调用一次
    fn next_interval(&mut self) -> Duration;

    /// 执行一轮工作
    fn run_once(&mut self) -> Result<()>;
}

/// 固定间隔的任务：间隔在构造时已校验，动作是一个闭包
pub struct FixedIntervalTask<F> {
    name:     String,
    interval: Duration,
    policy:   StartPolicy,
    action:   F,
}

impl<F> FixedIntervalTask<F>
where
    F: FnMut() -> Result<()> + Send + 'static,
{
    pub fn new(name: impl Into<String>, interval: Duration, policy: StartPolicy, action: F) -> Self {
        Self { name: name.into(), interval, policy, action }
    }
}

impl<F> MaintenanceTask for FixedIntervalTask<F>
where
    F: FnMut() -> Result<()> + Send + 'static,
{
    fn name(&self) -> &str { &self.name }

    fn start_policy(&self) -> StartPolicy { self.policy }

    fn next_interval(&mut self) -> Duration { self.interval }

    fn run_once(&mut self) -> Result<()> { (self.action)() }
}

// ── 线程主循环 ────────────────────────────────────────────────────────────────

/// 在独立命名线程中运行 `task`，直到 `signal` 被触发
pub fn spawn_worker<T: MaintenanceTask>(
    mut task: T,
    signal:   Arc<ShutdownSignal>,
) -> Result<JoinHandle<()>> {
    let name = task.name().to_string();
    let thread_name = name.clone();
    thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            info!(worker = %name, "background worker started");
            run_loop(&mut task, &signal);
            info!(worker = %name, "background worker stopped");
        })
        .map_err(|source| OlapError::Spawn { name: thread_name, source })
}

/// 任务主循环，调用方所在线程直接执行，便于测试
pub fn run_loop<T: MaintenanceTask>(task: &mut T, signal: &ShutdownSignal) {
    let mut skip_sleep = task.start_policy() == StartPolicy::ActFirst;
    loop {
        if signal.is_stopped() {
            break;
        }
        if !skip_sleep {
            let interval = task.next_interval();
            debug!(worker = task.name(), interval_ms = interval.as_millis() as u64, "sleep");
            if signal.wait_for(interval) {
                break;
            }
        }
        skip_sleep = false;
        if signal.is_stopped() {
            break;
        }
        run_guarded(task);
    }
}

fn run_guarded<T: MaintenanceTask>(task: &mut T) {
    match panic::catch_unwind(AssertUnwindSafe(|| task.run_once())) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(worker = task.name(), error = %e, "background task failed, continue next loop"),
        Err(payload) => {
            let msg = payload.downcast_ref::<&str>().map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(worker = task.name(), panic = %msg, "background task panicked, continue next loop");
        }
    }
}
