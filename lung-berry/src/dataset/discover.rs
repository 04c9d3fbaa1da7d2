//! 病人发现: 扫描原始影像目录, 生成清单, 并将影像复制为规范化布局.
//!
//! 原始目录的每个直接子目录都被视为一个病人. 目录内可能嵌套任意层级,
//! 所有候选影像文件 (见 [`is_image_candidate`]) 被合并为单个 unit,
//! 使用占位的 study / series 标识.

use crate::consts::{is_image_candidate, PLACEHOLDER_SERIES, PLACEHOLDER_STUDY};
use crate::dataset::{Manifest, PatientUnit};
use crate::error::{IoResultExt, Result};
use crate::report::UnitKey;
use itertools::Itertools;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 一次发现的结果.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Discovery {
    /// 有影像的病人组成的清单, 按病人目录名排序.
    pub manifest: Manifest,

    /// 没有任何候选影像文件而被跳过的病人目录名.
    pub skipped: Vec<String>,
}

/// 病人发现器.
#[derive(Clone, Debug)]
pub struct Discoverer {
    source_root: PathBuf,
    target_root: PathBuf,
}

impl Discoverer {
    /// `source_root` 为原始影像根目录, `target_root` 为规范化影像根目录.
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(source_root: P, target_root: Q) -> Self {
        Self {
            source_root: source_root.into(),
            target_root: target_root.into(),
        }
    }

    /// 原始影像根目录.
    #[inline]
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// 规范化影像根目录.
    #[inline]
    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    /// 扫描原始目录, 生成清单. 不修改任何文件.
    ///
    /// # 注意
    ///
    /// 1. 原始根目录不存在或无法读取时返回错误.
    /// 2. 没有候选影像的病人不会出现在清单中, 而是记录在 [`Discovery::skipped`].
    pub fn discover(&self) -> Result<Discovery> {
        let root = self.source_root.as_path();
        let mut patients = Vec::new();
        for entry in fs::read_dir(root).at(root)? {
            // 跟随符号链接.
            let path = entry.at(root)?.path();
            if path.is_dir() {
                patients.push(path);
            }
        }
        patients.sort();

        let mut units = Vec::with_capacity(patients.len());
        let mut skipped = Vec::new();
        for dir in patients {
            let patient_id = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let files = candidate_files(&dir);
            if files.is_empty() {
                warn!("patient `{patient_id}` has no image files, skipped");
                skipped.push(patient_id);
                continue;
            }
            debug!("patient `{patient_id}`: {} files", files.len());
            let key = UnitKey::new(patient_id, PLACEHOLDER_STUDY, PLACEHOLDER_SERIES);
            units.push(PatientUnit::new(key, files));
        }

        info!(
            "discovered {} patients ({} skipped) under `{}`",
            units.len(),
            skipped.len(),
            root.display()
        );
        Ok(Discovery {
            manifest: Manifest::new(units)?,
            skipped,
        })
    }

    /// 将清单中每个 unit 的原始文件依次复制为
    /// `<target>/<patient>/<study>/<series>/{i:06}.dcm`, `i` 从 1 开始.
    ///
    /// 原始文件不会被修改. 重复运行会覆盖同名文件.
    pub fn prepare(&self, manifest: &Manifest) -> Result<()> {
        for unit in manifest {
            let dir = self.target_root.join(unit.key().rel_path());
            fs::create_dir_all(&dir).at(&dir)?;
            for (i, src) in unit.source_files.iter().enumerate() {
                let dst = dir.join(canonical_name(i + 1));
                fs::copy(src, &dst).at(src)?;
            }
            debug!(
                "prepared {} files for `{}`",
                unit.source_files.len(),
                unit.key()
            );
        }
        Ok(())
    }

    /// 发现并复制.
    pub fn run(&self) -> Result<Discovery> {
        let discovery = self.discover()?;
        self.prepare(&discovery.manifest)?;
        Ok(discovery)
    }
}

/// 规范化文件名: 6 位补零序号 + `.dcm`.
#[inline]
pub fn canonical_name(index: usize) -> String {
    format!("{index:06}.dcm")
}

/// 递归列出 `dir` 下的候选影像文件, 按路径排序. 跟随符号链接,
/// 无法访问的条目 (包括链接成环) 被跳过.
fn candidate_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(err) => {
                debug!("walk error under `{}`: {err}", dir.display());
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| is_image_candidate(p))
        .sorted()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name(1), "000001.dcm");
        assert_eq!(canonical_name(123456), "123456.dcm");
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("source");
        touch(&src.join("p2/scan/b.DCM"), b"b");
        touch(&src.join("p2/scan/a.dcm"), b"a");
        touch(&src.join("p2/IM0001"), b"c");
        touch(&src.join("p2/readme.txt"), b"x");
        touch(&src.join("p1/x.ima"), b"d");
        touch(&src.join("p3/notes.txt"), b"x");
        touch(&src.join("stray.dcm"), b"not a patient");

        let d = Discoverer::new(&src, dir.path().join("target"))
            .discover()
            .unwrap();
        assert_eq!(d.skipped, ["p3"]);

        let units = d.manifest.units();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].patient_id, "p1");
        assert_eq!(units[1].patient_id, "p2");
        assert_eq!(units[1].study_id, PLACEHOLDER_STUDY);
        assert_eq!(units[1].series_id, PLACEHOLDER_SERIES);
        assert_eq!(units[1].dicom_count, 3);
        assert_eq!(
            units[1].source_files,
            [
                src.join("p2/IM0001"),
                src.join("p2/scan/a.dcm"),
                src.join("p2/scan/b.DCM"),
            ]
        );
    }

    #[test]
    fn test_prepare_copies_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("source");
        let dst = dir.path().join("target");
        touch(&src.join("p/b.dcm"), b"second");
        touch(&src.join("p/a.dcm"), b"first");

        let d = Discoverer::new(&src, &dst).run().unwrap();
        assert_eq!(d.manifest.len(), 1);

        let out = dst.join("p").join(PLACEHOLDER_STUDY).join(PLACEHOLDER_SERIES);
        assert_eq!(fs::read(out.join("000001.dcm")).unwrap(), b"first");
        assert_eq!(fs::read(out.join("000002.dcm")).unwrap(), b"second");
        // 原始文件保持不变.
        assert_eq!(fs::read(src.join("p/a.dcm")).unwrap(), b"first");
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_follows_symlinks() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("source");
        let elsewhere = dir.path().join("elsewhere");
        touch(&elsewhere.join("p1/scan/a.dcm"), b"a");
        touch(&elsewhere.join("loose.dcm"), b"b");
        fs::create_dir_all(src.join("p2")).unwrap();
        symlink(elsewhere.join("p1"), src.join("p1")).unwrap();
        symlink(elsewhere.join("loose.dcm"), src.join("p2/img.dcm")).unwrap();
        // 指向自身所在目录的链接不会导致死循环.
        symlink(src.join("p2"), src.join("p2/loop")).unwrap();

        let d = Discoverer::new(&src, dir.path().join("target"))
            .discover()
            .unwrap();
        assert!(d.skipped.is_empty());
        let units = d.manifest.units();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].patient_id, "p1");
        assert_eq!(units[0].source_files, [src.join("p1/scan/a.dcm")]);
        assert_eq!(units[1].patient_id, "p2");
        assert_eq!(units[1].source_files, [src.join("p2/img.dcm")]);
    }

    #[test]
    fn test_missing_source_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Discoverer::new(dir.path().join("nope"), dir.path())
            .discover()
            .is_err());
    }
}
