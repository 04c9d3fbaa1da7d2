//! 流水线磁盘布局.
//!
//! 所有阶段之间只通过文件传递数据. [`Layout`] 集中描述这些文件的位置,
//! 各阶段只依赖它, 不自行拼接路径.

use crate::consts::FEATURE_FILE_NAME;
use crate::report::UnitKey;
use std::path::{Path, PathBuf};

/// 一次批处理运行涉及的全部路径.
///
/// 目录结构为:
///
/// ```text
/// <data>/source_dicom/<patient>/...                 原始影像 (只读)
/// <data>/dicom_data/<p>/<s>/<se>/NNNNNN.dcm         规范化影像
/// <data>/segmentation_data/<p>/<s>/<se>/NNN.png     肺部掩膜
/// <data>/patient_list.json                          清单
/// <results>/segmentation_results.json
/// <results>/feature_extraction_results.json
/// <results>/patient_features/<p>_<s>_<se>/final_merge_feature.csv
/// <results>/all_patients_features.csv
/// <results>/complete_covid_triage_all_predictions.csv
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    /// 原始影像根目录.
    pub source_root: PathBuf,

    /// 规范化影像根目录.
    pub image_root: PathBuf,

    /// 掩膜根目录.
    pub mask_root: PathBuf,

    /// 清单文件.
    pub manifest_path: PathBuf,

    /// 结果根目录.
    pub results_root: PathBuf,
}

impl Layout {
    /// 以 `data` 和 `results` 两个根目录构建默认布局.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(data: P, results: Q) -> Self {
        let data = data.as_ref();
        Self {
            source_root: data.join("source_dicom"),
            image_root: data.join("dicom_data"),
            mask_root: data.join("segmentation_data"),
            manifest_path: data.join("patient_list.json"),
            results_root: results.as_ref().to_owned(),
        }
    }

    /// 某个 unit 的规范化影像目录.
    #[inline]
    pub fn image_dir(&self, key: &UnitKey) -> PathBuf {
        self.image_root.join(key.rel_path())
    }

    /// 某个 unit 的掩膜目录.
    #[inline]
    pub fn mask_dir(&self, key: &UnitKey) -> PathBuf {
        self.mask_root.join(key.rel_path())
    }

    /// 所有 unit 特征输出目录的父目录.
    #[inline]
    pub fn features_root(&self) -> PathBuf {
        self.results_root.join("patient_features")
    }

    /// 某个 unit 的特征输出目录.
    #[inline]
    pub fn unit_feature_dir(&self, key: &UnitKey) -> PathBuf {
        self.features_root().join(key.flat_name())
    }

    /// 某个 unit 期望的特征表路径.
    #[inline]
    pub fn unit_feature_file(&self, key: &UnitKey) -> PathBuf {
        self.unit_feature_dir(key).join(FEATURE_FILE_NAME)
    }

    /// 合并特征表.
    #[inline]
    pub fn combined_features_path(&self) -> PathBuf {
        self.results_root.join("all_patients_features.csv")
    }

    /// 分割阶段的运行报告.
    #[inline]
    pub fn segmentation_report_path(&self) -> PathBuf {
        self.results_root.join("segmentation_results.json")
    }

    /// 特征提取阶段的运行报告.
    #[inline]
    pub fn extraction_report_path(&self) -> PathBuf {
        self.results_root.join("feature_extraction_results.json")
    }

    /// 预测结果表.
    #[inline]
    pub fn predictions_path(&self) -> PathBuf {
        self.results_root
            .join("complete_covid_triage_all_predictions.csv")
    }
}
