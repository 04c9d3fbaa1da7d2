//! 阶段运行统计.

use lung_berry::report::UnitReport;
use std::time::{Duration, Instant};

/// 阶段计时器.
#[derive(Clone, Debug)]
struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器, 并立即开始计时.
    #[inline]
    fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: Instant::now(),
        }
    }

    /// 以已经测得的时长初始化, 不再计时.
    #[inline]
    fn measured(consumed: Duration) -> Self {
        Self {
            consumed,
            since: Instant::now(),
        }
    }

    /// 结束计时, 并将这一区间的时间累加. 返回本轮计时时长.
    ///
    /// # 注意
    ///
    /// 每个计时器只应结束一次.
    #[inline]
    fn elapsed(&mut self) -> Duration {
        let d = self.since.elapsed();
        self.consumed += d;
        d
    }

    /// 获得总共累计下来的时间 (以毫秒为单位).
    #[inline]
    fn get_total_ms(&self) -> u64 {
        self.consumed.as_millis() as u64
    }
}

/// 单个阶段的统计.
#[derive(Clone, Debug)]
pub struct StageProfile {
    /// 成功的 unit 个数.
    succeeded: u64,

    /// 失败的 unit 个数.
    failed: u64,

    /// 阶段总耗时 (包括 IO 与外部进程).
    real_time: AccTimer,

    /// 附加说明, 如被跳过的病人或各结局 AUC.
    notes: Vec<String>,
}

impl StageProfile {
    /// 初始化, 同时开始计时.
    #[inline]
    pub fn new() -> Self {
        Self {
            succeeded: 0,
            failed: 0,
            real_time: AccTimer::new(),
            notes: Vec::new(),
        }
    }

    /// 由已知的计数和耗时构建, 用于整体运行后的汇总.
    pub fn measured(succeeded: usize, total: usize, real_time: Duration) -> Self {
        let succeeded = succeeded.min(total) as u64;
        Self {
            succeeded,
            failed: total as u64 - succeeded,
            real_time: AccTimer::measured(real_time),
            notes: Vec::new(),
        }
    }

    /// 记录一批 unit 报告.
    pub fn count_reports(&mut self, reports: &[UnitReport]) {
        for r in reports {
            self.count(r.is_success());
        }
    }

    /// 记录一个 unit.
    #[inline]
    pub fn count(&mut self, success: bool) {
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    /// 添加一条说明.
    #[inline]
    pub fn note<S: Into<String>>(&mut self, note: S) {
        self.notes.push(note.into());
    }

    /// 结束计时.
    #[inline]
    pub fn finish(mut self) -> Self {
        self.real_time.elapsed();
        self
    }

    /// 成功个数.
    #[inline]
    pub fn get_succeeded(&self) -> u64 {
        self.succeeded
    }

    /// 总个数.
    #[inline]
    pub fn get_total(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// 成功率. 没有 unit 时为 `None`.
    #[inline]
    pub fn get_success_rate(&self) -> Option<f64> {
        match self.get_total() {
            0 => None,
            total => Some(self.succeeded as f64 / total as f64),
        }
    }

    /// 以毫秒为单位获得阶段总耗时.
    #[inline]
    pub fn get_real_time_ms(&self) -> u64 {
        self.real_time.get_total_ms()
    }

    /// 附加说明.
    #[inline]
    pub fn notes(&self) -> &[String] {
        &self.notes
    }
}

impl Default for StageProfile {
    fn default() -> Self {
        Self::new()
    }
}
