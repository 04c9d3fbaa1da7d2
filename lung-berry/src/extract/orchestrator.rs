//! 逐 unit 调用提取器, 整理报告, 合并特征表.

use super::{ExtractionRequest, FeatureExtractor};
use crate::config::Layout;
use crate::dataset::Manifest;
use crate::error::{IoResultExt, Result};
use crate::report::{success_count, write_reports, FailureReason, UnitKey, UnitOutcome, UnitReport};
use crate::table::FeatureTable;
use log::{info, warn};
use std::fs;
use std::path::Path;

/// 一次批量提取的结果.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractionRun {
    /// 每个 unit 一条报告, 按清单顺序.
    pub reports: Vec<UnitReport>,

    /// 所有成功且可读取的特征表的纵向拼接, 按清单顺序. 没有任何可读表时为 `None`.
    pub combined: Option<FeatureTable>,
}

impl ExtractionRun {
    /// 合并表的行数.
    #[inline]
    pub fn feature_rows(&self) -> usize {
        self.combined.as_ref().map_or(0, FeatureTable::len)
    }

    /// 写出合并特征表 (若有) 和运行报告 (总是).
    ///
    /// # 注意
    ///
    /// 没有合并表时, 删除上一次运行留下的合并表, 以免预测阶段读到过期数据.
    pub fn persist(&self, layout: &Layout) -> Result<()> {
        let path = layout.combined_features_path();
        match self.combined.as_ref() {
            Some(table) => {
                table.write_csv(&path)?;
                info!("combined {} feature rows into `{}`", table.len(), path.display());
            }
            None if path.is_file() => {
                fs::remove_file(&path).at(&path)?;
                warn!("no feature rows, removed stale `{}`", path.display());
            }
            None => {}
        }
        write_reports(layout.extraction_report_path(), &self.reports)
    }
}

/// 对单个 unit 运行提取器.
///
/// 流程:
///
/// 1. 掩膜目录不存在或为空时直接失败, 不调用提取器;
/// 2. 创建该 unit 的输出目录;
/// 3. 调用提取器, 根据退出码和 [`Layout::unit_feature_file`] 是否存在判定成败;
/// 4. 成功时读取特征表, 并写入 `patient_id`, `study_id`, `series_id` 三列.
///    读取失败仅记录警告, 报告仍为成功, 但不贡献任何行.
pub fn extract_unit<E: FeatureExtractor + ?Sized>(
    layout: &Layout,
    extractor: &E,
    key: &UnitKey,
) -> (UnitReport, Option<FeatureTable>) {
    let (outcome, table) = run_unit(layout, extractor, key);
    match &outcome {
        UnitOutcome::Succeeded { message } => info!("{key}: {message}"),
        UnitOutcome::Failed { detail, .. } => warn!("{key}: {detail}"),
    }
    (UnitReport::new(key.clone(), outcome), table)
}

fn run_unit<E: FeatureExtractor + ?Sized>(
    layout: &Layout,
    extractor: &E,
    key: &UnitKey,
) -> (UnitOutcome, Option<FeatureTable>) {
    if !has_masks(&layout.mask_dir(key)) {
        let outcome = UnitOutcome::failed(FailureReason::NoMasks, "No segmentation masks found");
        return (outcome, None);
    }

    let output_root = layout.unit_feature_dir(key);
    let output_file = layout.unit_feature_file(key);
    if let Err(e) = fs::create_dir_all(&output_root).at(&output_root) {
        let outcome = UnitOutcome::failed(FailureReason::Internal, format!("Error: {e}"));
        return (outcome, None);
    }

    let request = ExtractionRequest {
        image_root: layout.image_root.clone(),
        mask_root: layout.mask_root.clone(),
        output_root,
    };
    let out = match extractor.extract(key, &request) {
        Ok(out) => out,
        Err(e) => {
            let outcome = UnitOutcome::failed(
                FailureReason::Launch,
                format!("Error running feature extraction: {e}"),
            );
            return (outcome, None);
        }
    };

    if !out.exited_ok() {
        let outcome = UnitOutcome::failed(
            FailureReason::ExitStatus,
            format!("Feature extraction failed: {}", out.stderr),
        );
        return (outcome, None);
    }
    if !output_file.is_file() {
        let outcome = UnitOutcome::failed(
            FailureReason::MissingOutput,
            "Feature extraction completed but no output file found",
        );
        return (outcome, None);
    }

    let outcome = UnitOutcome::succeeded(format!(
        "Features extracted to {}",
        output_file.display()
    ));
    let table = match FeatureTable::read_csv(&output_file) {
        Ok(mut t) => {
            t.set_constant_column("patient_id", &key.patient_id);
            t.set_constant_column("study_id", &key.study_id);
            t.set_constant_column("series_id", &key.series_id);
            Some(t)
        }
        Err(e) => {
            warn!("{key}: could not load features: {e}");
            None
        }
    };
    (outcome, table)
}

/// 掩膜目录存在且至少包含一个条目.
fn has_masks(dir: &Path) -> bool {
    fs::read_dir(dir).is_ok_and(|mut it| it.next().is_some())
}

fn collect<I: IntoIterator<Item = (UnitReport, Option<FeatureTable>)>>(it: I) -> ExtractionRun {
    let (reports, tables): (Vec<UnitReport>, Vec<Option<FeatureTable>>) = it.into_iter().unzip();
    info!(
        "feature extraction: {}/{} units successful",
        success_count(&reports),
        reports.len()
    );
    ExtractionRun {
        reports,
        combined: FeatureTable::concat(tables.into_iter().flatten()),
    }
}

/// 按清单顺序逐个提取.
pub fn extract_all<E: FeatureExtractor + ?Sized>(
    layout: &Layout,
    extractor: &E,
    manifest: &Manifest,
) -> ExtractionRun {
    collect(
        manifest
            .keys()
            .iter()
            .map(|key| extract_unit(layout, extractor, key)),
    )
}

/// 同 [`extract_all`], 但各 unit 并行处理. 报告和合并表仍按清单顺序排列.
#[cfg(feature = "rayon")]
pub fn par_extract_all<E: FeatureExtractor + Sync + ?Sized>(
    layout: &Layout,
    extractor: &E,
    manifest: &Manifest,
) -> ExtractionRun {
    use rayon::prelude::*;

    let results: Vec<_> = manifest
        .keys()
        .par_iter()
        .map(|key| extract_unit(layout, extractor, key))
        .collect();
    collect(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::FEATURE_FILE_NAME;
    use crate::dataset::PatientUnit;
    use crate::extract::ExtractionOutcome;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 记录调用的替身提取器. 对 `fail` 中的病人以退出码 1 失败,
    /// 对 `silent` 中的病人成功退出但不写文件, 对 `elsewhere` 中的病人
    /// 把特征写到约定路径之外, 其余写出一行特征.
    #[derive(Default)]
    struct Recording {
        calls: AtomicUsize,
        seen: Mutex<Vec<(UnitKey, ExtractionRequest)>>,
        fail: Vec<&'static str>,
        silent: Vec<&'static str>,
        garbage: Vec<&'static str>,
        elsewhere: Vec<&'static str>,
    }

    impl FeatureExtractor for Recording {
        fn extract(&self, key: &UnitKey, request: &ExtractionRequest) -> io::Result<ExtractionOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((key.clone(), request.clone()));
            let output_file = request.output_root.join(FEATURE_FILE_NAME);
            let p = key.patient_id.as_str();
            if self.fail.contains(&p) {
                return Ok(ExtractionOutcome {
                    exit_code: Some(1),
                    stderr: "boom".into(),
                });
            }
            if self.elsewhere.contains(&p) {
                let other = request.output_root.join("other.csv");
                fs::write(other, "patient_id,lung_volume\nx,1\n")?;
            } else if self.garbage.contains(&p) {
                fs::write(&output_file, "")?;
            } else if !self.silent.contains(&p) {
                fs::write(
                    &output_file,
                    format!("patient_id,lung_volume\nstale,{}\n", p.len()),
                )?;
            }
            Ok(ExtractionOutcome {
                exit_code: Some(0),
                stderr: String::new(),
            })
        }
    }

    struct Unlaunchable;

    impl FeatureExtractor for Unlaunchable {
        fn extract(&self, _: &UnitKey, _: &ExtractionRequest) -> io::Result<ExtractionOutcome> {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such program"))
        }
    }

    fn setup(ids: &[&str], with_masks: &[&str]) -> (tempfile::TempDir, Layout, Manifest) {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path().join("data"), dir.path().join("results"));
        let units = ids
            .iter()
            .map(|p| PatientUnit::new(UnitKey::new(*p, "study_1", "series_1"), vec![]))
            .collect();
        let manifest = Manifest::new(units).unwrap();
        for key in manifest.keys() {
            if with_masks.contains(&key.patient_id.as_str()) {
                let masks = layout.mask_dir(&key);
                fs::create_dir_all(&masks).unwrap();
                fs::write(masks.join("000.png"), b"png").unwrap();
            }
        }
        (dir, layout, manifest)
    }

    #[test]
    fn test_no_masks_short_circuits() {
        let (_dir, layout, manifest) = setup(&["a", "b"], &[]);
        // 空目录同样视为没有掩膜.
        fs::create_dir_all(layout.mask_dir(&manifest.keys()[1])).unwrap();

        let ext = Recording::default();
        let run = extract_all(&layout, &ext, &manifest);
        assert_eq!(ext.calls.load(Ordering::SeqCst), 0);
        assert_eq!(run.reports.len(), 2);
        for r in run.reports.iter() {
            assert_eq!(r.outcome.reason(), Some(FailureReason::NoMasks));
            assert_eq!(r.outcome.message(), "No segmentation masks found");
        }
        assert!(run.combined.is_none());
    }

    #[test]
    fn test_outcomes_and_combination() {
        let ids = ["ok1", "fail", "silent", "none", "garbage", "ok22"];
        let (_dir, layout, manifest) = setup(&ids, &["ok1", "fail", "silent", "garbage", "ok22"]);
        let ext = Recording {
            fail: vec!["fail"],
            silent: vec!["silent"],
            garbage: vec!["garbage"],
            ..Default::default()
        };

        let run = extract_all(&layout, &ext, &manifest);
        assert_eq!(ext.calls.load(Ordering::SeqCst), 5);

        let reasons: Vec<_> = run.reports.iter().map(|r| r.outcome.reason()).collect();
        assert_eq!(
            reasons,
            [
                None,
                Some(FailureReason::ExitStatus),
                Some(FailureReason::MissingOutput),
                Some(FailureReason::NoMasks),
                None,
                None,
            ]
        );
        assert_eq!(run.reports[1].outcome.message(), "Feature extraction failed: boom");
        assert_eq!(
            run.reports[2].outcome.message(),
            "Feature extraction completed but no output file found"
        );
        assert!(run.reports[0]
            .outcome
            .message()
            .starts_with("Features extracted to "));

        // 无法读取的特征表不贡献行, 但报告仍为成功.
        let combined = run.combined.as_ref().unwrap();
        assert_eq!(combined.len(), 2);
        assert_eq!(run.feature_rows(), 2);
        let ids: Vec<_> = combined.column("patient_id").unwrap().collect();
        assert_eq!(ids, ["ok1", "ok22"]);
        assert_eq!(combined.column("series_id").unwrap().collect::<Vec<_>>(), ["series_1"; 2]);
    }

    #[test]
    fn test_request_and_output_dir() {
        let (_dir, layout, manifest) = setup(&["p"], &["p"]);
        let ext = Recording::default();
        let key = &manifest.keys()[0];
        let (report, table) = extract_unit(&layout, &ext, key);
        assert!(report.is_success());
        assert!(table.is_some());

        let seen = ext.seen.lock().unwrap();
        let (k, req) = &seen[0];
        assert_eq!(k, key);
        assert_eq!(req.image_root, layout.image_root);
        assert_eq!(req.mask_root, layout.mask_root);
        assert_eq!(req.output_root, layout.unit_feature_dir(key));
        assert!(req.output_root.is_dir());
    }

    #[test]
    fn test_launch_failure() {
        let (_dir, layout, manifest) = setup(&["p"], &["p"]);
        let (report, table) = extract_unit(&layout, &Unlaunchable, &manifest.keys()[0]);
        assert_eq!(report.outcome.reason(), Some(FailureReason::Launch));
        assert!(report
            .outcome
            .message()
            .starts_with("Error running feature extraction: "));
        assert!(table.is_none());
    }

    #[test]
    fn test_persist() {
        let (_dir, layout, manifest) = setup(&["a", "b"], &["a"]);
        let run = extract_all(&layout, &Recording::default(), &manifest);
        run.persist(&layout).unwrap();

        let back = FeatureTable::read_csv(layout.combined_features_path()).unwrap();
        assert_eq!(back.len(), 1);
        let reports = crate::report::read_reports(layout.extraction_report_path()).unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports[0].success);
        assert!(!reports[1].success);

        // 没有合并表时只写报告.
        let (_dir2, layout2, manifest2) = setup(&["x"], &[]);
        let run = extract_all(&layout2, &Recording::default(), &manifest2);
        run.persist(&layout2).unwrap();
        assert!(!layout2.combined_features_path().exists());
        assert!(layout2.extraction_report_path().is_file());
    }

    #[test]
    fn test_persist_removes_stale_combined_table() {
        let (_dir, layout, manifest) = setup(&["a"], &["a"]);
        extract_all(&layout, &Recording::default(), &manifest)
            .persist(&layout)
            .unwrap();
        assert!(layout.combined_features_path().is_file());

        let failing = Recording {
            fail: vec!["a"],
            ..Default::default()
        };
        let run = extract_all(&layout, &failing, &manifest);
        assert!(run.combined.is_none());
        run.persist(&layout).unwrap();
        assert!(!layout.combined_features_path().exists());
        let reports = crate::report::read_reports(layout.extraction_report_path()).unwrap();
        assert!(!reports[0].success);
    }

    #[test]
    fn test_output_outside_expected_path_is_missing() {
        let (_dir, layout, manifest) = setup(&["p"], &["p"]);
        let ext = Recording {
            elsewhere: vec!["p"],
            ..Default::default()
        };
        let (report, table) = extract_unit(&layout, &ext, &manifest.keys()[0]);
        assert_eq!(report.outcome.reason(), Some(FailureReason::MissingOutput));
        assert!(table.is_none());
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_parallel_matches_serial() {
        let ids: Vec<String> = (0..24).map(|i| format!("p{i:02}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (_dir, layout, manifest) = setup(&refs, &refs[..12]);

        let ext = Recording::default();
        let par = par_extract_all(&layout, &ext, &manifest);
        assert_eq!(ext.calls.load(Ordering::SeqCst), 12);
        let serial = extract_all(&layout, &Recording::default(), &manifest);
        assert_eq!(par, serial);
    }
}
