//! 单个 unit 的处理结果与运行报告.

use crate::error::{IoResultExt, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// `(patient_id, study_id, series_id)` 三元组, 各阶段的最小工作单元标识.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitKey {
    /// 病人标识.
    pub patient_id: String,

    /// 检查标识.
    pub study_id: String,

    /// 序列标识.
    pub series_id: String,
}

impl UnitKey {
    /// 构建.
    pub fn new(
        patient_id: impl Into<String>,
        study_id: impl Into<String>,
        series_id: impl Into<String>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            study_id: study_id.into(),
            series_id: series_id.into(),
        }
    }

    /// 相对路径 `patient/study/series`.
    pub fn rel_path(&self) -> PathBuf {
        [&self.patient_id, &self.study_id, &self.series_id]
            .iter()
            .collect()
    }

    /// 外部程序识别的过滤值 `"patient/study/series"`. 与平台路径分隔符无关.
    pub fn filter_value(&self) -> String {
        format!("{}/{}/{}", self.patient_id, self.study_id, self.series_id)
    }

    /// 扁平化名称 `patient_study_series`, 用作特征输出目录名.
    pub fn flat_name(&self) -> String {
        format!("{}_{}_{}", self.patient_id, self.study_id, self.series_id)
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filter_value())
    }
}

/// 失败类别. 供测试和下游按类别区分, 而不必解析文本.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// 影像目录中没有可解码的序列.
    NoSeries,

    /// 掩膜目录不存在或为空.
    NoMasks,

    /// 外部程序以非零状态退出.
    ExitStatus,

    /// 外部程序成功退出, 但没有生成约定的输出文件.
    MissingOutput,

    /// 外部程序无法启动.
    Launch,

    /// 其它内部错误 (I/O, 图像编码等).
    Internal,
}

/// 单个 unit 在某一阶段的处理结果.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnitOutcome {
    /// 成功, 附带人类可读的描述.
    Succeeded {
        /// 描述.
        message: String,
    },

    /// 失败, 附带类别和人类可读的细节.
    Failed {
        /// 类别.
        reason: FailureReason,
        /// 细节.
        detail: String,
    },
}

impl UnitOutcome {
    /// 成功.
    #[inline]
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self::Succeeded {
            message: message.into(),
        }
    }

    /// 失败.
    #[inline]
    pub fn failed(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self::Failed {
            reason,
            detail: detail.into(),
        }
    }

    /// 是否成功.
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// 失败类别. 成功时为 `None`.
    #[inline]
    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            Self::Succeeded { .. } => None,
            Self::Failed { reason, .. } => Some(*reason),
        }
    }

    /// 人类可读的描述.
    #[inline]
    pub fn message(&self) -> &str {
        match self {
            Self::Succeeded { message } => message,
            Self::Failed { detail, .. } => detail,
        }
    }
}

/// 单个 unit 的报告条目.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitReport {
    /// unit 标识.
    pub key: UnitKey,

    /// 处理结果.
    pub outcome: UnitOutcome,
}

impl UnitReport {
    /// 构建.
    #[inline]
    pub fn new(key: UnitKey, outcome: UnitOutcome) -> Self {
        Self { key, outcome }
    }

    /// 是否成功.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// 报告在 JSON 中的扁平表示.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRecord {
    /// unit 标识.
    #[serde(flatten)]
    pub key: UnitKey,

    /// 是否成功.
    pub success: bool,

    /// 描述.
    pub message: String,

    /// 失败类别.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
}

impl From<&UnitReport> for ReportRecord {
    fn from(r: &UnitReport) -> Self {
        Self {
            key: r.key.clone(),
            success: r.is_success(),
            message: r.outcome.message().to_owned(),
            reason: r.outcome.reason(),
        }
    }
}

/// 成功的 unit 个数.
#[inline]
pub fn success_count(reports: &[UnitReport]) -> usize {
    reports.iter().filter(|r| r.is_success()).count()
}

/// 将整批报告以 JSON 数组写入 `path`. 无论成败, 每个 unit 都有一条记录.
pub fn write_reports<P: AsRef<Path>>(path: P, reports: &[UnitReport]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }
    let records: Vec<ReportRecord> = reports.iter().map(ReportRecord::from).collect();
    let text = serde_json::to_string_pretty(&records)?;
    fs::write(path, text).at(path)
}

/// 读取 [`write_reports`] 写出的报告.
pub fn read_reports<P: AsRef<Path>>(path: P) -> Result<Vec<ReportRecord>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).at(path)?;
    Ok(serde_json::from_str(&text)?)
}
