//! 病人清单 (`patient_list.json`).
//!
//! 清单是各阶段之间唯一的 "工作列表". 它是一个 JSON 数组, 每个元素描述一个
//! `(patient_id, study_id, series_id)` unit. 顺序即后续所有报告的顺序.

use crate::error::{Error, IoResultExt, Result};
use crate::report::UnitKey;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// 清单中的一个 unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientUnit {
    /// 病人标识, 即原始目录名.
    pub patient_id: String,

    /// 检查标识. 没有 study 层级时为占位值.
    pub study_id: String,

    /// 序列标识. 没有 series 层级时为占位值.
    pub series_id: String,

    /// 原始影像文件, 按路径排序.
    #[serde(default)]
    pub source_files: Vec<PathBuf>,

    /// `source_files` 的个数.
    #[serde(default)]
    pub dicom_count: usize,
}

impl PatientUnit {
    /// 由 unit 标识和原始文件构建. `dicom_count` 自动填写.
    pub fn new(key: UnitKey, source_files: Vec<PathBuf>) -> Self {
        Self {
            patient_id: key.patient_id,
            study_id: key.study_id,
            series_id: key.series_id,
            dicom_count: source_files.len(),
            source_files,
        }
    }

    /// 该 unit 的标识.
    #[inline]
    pub fn key(&self) -> UnitKey {
        UnitKey::new(&self.patient_id, &self.study_id, &self.series_id)
    }
}

/// 有序且无重复的 unit 列表.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    units: Vec<PatientUnit>,
}

impl Manifest {
    /// 构建清单.
    ///
    /// # 注意
    ///
    /// 出现重复的 `(patient_id, study_id, series_id)` 时返回 [`Error::DuplicateUnit`].
    pub fn new(units: Vec<PatientUnit>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(units.len());
        for u in units.iter() {
            let key = u.key();
            if !seen.insert(key.clone()) {
                return Err(Error::DuplicateUnit(key.to_string()));
            }
        }
        Ok(Self { units })
    }

    /// 读取清单文件.
    ///
    /// # 注意
    ///
    /// 1. 文件不存在时返回 [`Error::ManifestMissing`], 调用方应视为致命错误.
    /// 2. 文件无法解析时返回 [`Error::Manifest`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::ManifestMissing(path.to_owned()));
        }
        let text = fs::read_to_string(path).at(path)?;
        let units: Vec<PatientUnit> =
            serde_json::from_str(&text).map_err(|source| Error::Manifest {
                path: path.to_owned(),
                source,
            })?;
        Self::new(units)
    }

    /// 以带缩进的 JSON 数组写出清单, 必要时创建父目录.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }
        let text = serde_json::to_string_pretty(&self.units)?;
        fs::write(path, text).at(path)
    }

    /// 按清单顺序迭代 unit.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, PatientUnit> {
        self.units.iter()
    }

    /// unit 个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// 清单是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// 按清单顺序收集所有 unit 标识.
    pub fn keys(&self) -> Vec<UnitKey> {
        self.units.iter().map(PatientUnit::key).collect()
    }

    /// 获取底层 unit 列表.
    #[inline]
    pub fn units(&self) -> &[PatientUnit] {
        &self.units
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a PatientUnit;
    type IntoIter = std::slice::Iter<'a, PatientUnit>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
