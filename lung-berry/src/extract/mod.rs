//! 特征提取阶段.
//!
//! 真正的影像组学特征由外部程序计算. 本模块只负责编排: 检查前置条件,
//! 为每个 unit 调用一次提取器, 把结果整理为报告, 并合并各 unit 的特征表.
//!
//! 提取器以 [`FeatureExtractor`] trait 抽象, 流水线的其余部分不关心它是子进程,
//! 进程内实现还是测试用的替身.

mod command;
mod orchestrator;

pub use command::CommandExtractor;
#[cfg(feature = "rayon")]
pub use orchestrator::par_extract_all;
pub use orchestrator::{extract_all, extract_unit, ExtractionRun};

use crate::report::UnitKey;
use std::io;
use std::path::PathBuf;

/// 一次提取调用的输入输出位置.
///
/// 提取器须在 `output_root` 下写出 [`FEATURE_FILE_NAME`](crate::consts::FEATURE_FILE_NAME),
/// 调用方只检查这一固定路径.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionRequest {
    /// 规范化影像根目录.
    pub image_root: PathBuf,

    /// 掩膜根目录.
    pub mask_root: PathBuf,

    /// 该 unit 的输出目录, 调用前已创建.
    pub output_root: PathBuf,
}

/// 一次提取调用的结果.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionOutcome {
    /// 退出码. 被信号终止等没有退出码的情况为 `None`, 视为失败.
    pub exit_code: Option<i32>,

    /// 捕获的标准错误输出.
    pub stderr: String,
}

impl ExtractionOutcome {
    /// 退出码是否为 0.
    #[inline]
    pub fn exited_ok(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// 为单个 unit 计算特征的能力.
///
/// 实现必须只处理 `key` 指定的 unit. 返回 `Err` 表示提取器根本无法启动;
/// 能启动但失败的情况应体现在 [`ExtractionOutcome::exit_code`] 中.
pub trait FeatureExtractor {
    /// 处理 `key`.
    fn extract(&self, key: &UnitKey, request: &ExtractionRequest) -> io::Result<ExtractionOutcome>;
}

impl<T: FeatureExtractor + ?Sized> FeatureExtractor for &T {
    #[inline]
    fn extract(&self, key: &UnitKey, request: &ExtractionRequest) -> io::Result<ExtractionOutcome> {
        (**self).extract(key, request)
    }
}

impl<T: FeatureExtractor + ?Sized> FeatureExtractor for Box<T> {
    #[inline]
    fn extract(&self, key: &UnitKey, request: &ExtractionRequest) -> io::Result<ExtractionOutcome> {
        (**self).extract(key, request)
    }
}
