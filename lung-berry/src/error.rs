//! 运行时错误.

use std::io;
use std::path::{Path, PathBuf};

/// 流水线各阶段共用的错误类型.
///
/// 单个 unit 的失败不会以 `Err` 形式逃出批处理循环, 而是在 unit 边界处被转换为
/// [`crate::report::UnitOutcome::Failed`]. 这里的错误只描述 "单个操作" 失败的原因.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 底层 I/O 错误, 附带出错路径.
    #[error("I/O error at `{}`: {source}", path.display())]
    Io {
        /// 出错路径.
        path: PathBuf,
        /// 原始错误.
        #[source]
        source: io::Error,
    },

    /// 清单文件不存在. 这是整个流水线唯一的致命错误.
    #[error("no patient manifest found at `{}`", .0.display())]
    ManifestMissing(PathBuf),

    /// 清单文件无法解析.
    #[error("malformed manifest `{}`: {source}", path.display())]
    Manifest {
        /// 清单路径.
        path: PathBuf,
        /// 原始错误.
        #[source]
        source: serde_json::Error,
    },

    /// 清单中出现重复的 `(patient_id, study_id, series_id)`.
    #[error("duplicate unit `{0}` in manifest")]
    DuplicateUnit(String),

    /// 目录下没有可解码的 DICOM 序列.
    #[error("No DICOM files found")]
    NoSeries(PathBuf),

    /// 同一序列的切片形状不一致.
    #[error("slice `{}` has shape {found:?}, expected {expected:?}", path.display())]
    InconsistentSlices {
        /// 形状不一致的文件.
        path: PathBuf,
        /// 期望的 (高, 宽).
        expected: (usize, usize),
        /// 实际的 (高, 宽).
        found: (usize, usize),
    },

    /// 掩膜图像写入失败.
    #[error("failed to write mask `{}`: {source}", path.display())]
    Image {
        /// 掩膜路径.
        path: PathBuf,
        /// 原始错误.
        #[source]
        source: image::ImageError,
    },

    /// CSV 读写失败.
    #[error("CSV error in `{}`: {source}", path.display())]
    Csv {
        /// 表格路径.
        path: PathBuf,
        /// 原始错误.
        #[source]
        source: csv::Error,
    },

    /// 表格没有表头 (空文件).
    #[error("table `{}` has no header row", .0.display())]
    EmptyTable(PathBuf),

    /// 表格中缺少所需的列.
    #[error("column `{0}` not found")]
    MissingColumn(String),

    /// 样本数不足以完成划分或训练.
    ///
    /// 第一个参数代表目前已有的样本, 第二个参数代表实际需要的最少样本数.
    #[error("too few samples: got {0}, need at least {1}")]
    TooFewSamples(usize, usize),

    /// JSON 序列化失败.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// 本 crate 的 `Result` 别名.
pub type Result<T> = std::result::Result<T, Error>;

/// 给 `io::Result` 补充出错路径.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    #[inline]
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })
    }
}
