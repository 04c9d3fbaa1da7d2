//! 程序运行函数.

use crate::profile::StageProfile;
use crate::result::TriageResult;
use crate::Stage;
use anyhow::Context;
use lung_berry::predict::OutcomeScore;
use lung_berry::prelude::*;

/// 实际运行.
///
/// `all` 由 [`Driver::run`] 完成, 发现和预测阶段的失败只记录在结果中;
/// 单独运行某个阶段时, 任何阶段错误都会返回.
pub fn run<E: FeatureExtractor + Sync>(
    driver: &Driver<E>,
    stage: &Stage,
) -> anyhow::Result<TriageResult> {
    let mut result = TriageResult::default();
    match stage {
        Stage::All => {
            let summary = driver.run().context("Running all stages")?;
            summarize(driver, &summary, &mut result);
        }
        Stage::Discover => result.push("discover", discover(driver)?),
        Stage::Segment => {
            let manifest = driver.manifest().context("Loading patient manifest")?;
            result.push("segment", segment(driver, &manifest)?);
        }
        Stage::Extract => {
            let manifest = driver.manifest().context("Loading patient manifest")?;
            result.push("extract", extract(driver, &manifest)?);
        }
        Stage::Predict => result.push("predict", predict(driver)?),
    }
    Ok(result)
}

/// 把整体运行的摘要拆成各阶段的统计.
fn summarize<E: FeatureExtractor + Sync>(
    driver: &Driver<E>,
    s: &RunSummary,
    result: &mut TriageResult,
) {
    let mut p = StageProfile::measured(0, 0, s.times.discover);
    note_skipped(&mut p, &s.skipped);
    if let Some(e) = s.discovery_error.as_ref() {
        p.note(format!("Discovery failed: {e}"));
    }
    p.note(format!("Units in manifest: {}", s.units));
    result.push("discover", p);

    result.push(
        "segment",
        StageProfile::measured(s.segmented, s.units, s.times.segment),
    );

    let mut p = StageProfile::measured(s.extracted, s.units, s.times.extract);
    p.note(format!("Combined feature rows: {}", s.feature_rows));
    result.push("extract", p);

    let mut p = StageProfile::measured(0, 0, s.times.predict);
    match s.prediction_error.as_ref() {
        Some(e) => p.note(format!("Prediction failed: {e}")),
        None => note_scores(&mut p, driver, s.predictions.as_deref()),
    }
    result.push("predict", p);
}

fn note_skipped(p: &mut StageProfile, skipped: &[String]) {
    for patient in skipped {
        p.note(format!("Skipped patient `{patient}`: no image files"));
    }
}

fn note_scores<E: FeatureExtractor + Sync>(
    p: &mut StageProfile,
    driver: &Driver<E>,
    scores: Option<&[OutcomeScore]>,
) {
    let Some(scores) = scores else {
        p.note("Skipped: no combined feature table or clinical table");
        return;
    };
    for s in scores {
        let auc = s
            .auc
            .map_or_else(|| "/".to_string(), |auc| format!("{auc:.6}"));
        p.note(format!(
            "{}: AUC {auc} (train {}, test {}, positive {})",
            s.outcome, s.train_rows, s.test_rows, s.positives
        ));
    }
    p.note(format!(
        "Predictions saved to {}",
        driver.layout().predictions_path().display()
    ));
}

fn discover<E: FeatureExtractor + Sync>(driver: &Driver<E>) -> anyhow::Result<StageProfile> {
    let mut p = StageProfile::new();
    let skipped = driver.discover().context("Discovering patients")?;
    note_skipped(&mut p, &skipped);
    let manifest = driver.manifest().context("Loading patient manifest")?;
    p.note(format!("Units in manifest: {}", manifest.len()));
    Ok(p.finish())
}

fn segment<E: FeatureExtractor + Sync>(
    driver: &Driver<E>,
    manifest: &Manifest,
) -> anyhow::Result<StageProfile> {
    let mut p = StageProfile::new();
    let reports = driver.segment(manifest).context("Segmenting lungs")?;
    p.count_reports(&reports);
    Ok(p.finish())
}

fn extract<E: FeatureExtractor + Sync>(
    driver: &Driver<E>,
    manifest: &Manifest,
) -> anyhow::Result<StageProfile> {
    let mut p = StageProfile::new();
    let run = driver.extract(manifest).context("Extracting features")?;
    p.count_reports(&run.reports);
    p.note(format!("Combined feature rows: {}", run.feature_rows()));
    Ok(p.finish())
}

fn predict<E: FeatureExtractor + Sync>(driver: &Driver<E>) -> anyhow::Result<StageProfile> {
    let mut p = StageProfile::new();
    let scores = driver.predict().context("Predicting outcomes")?;
    note_scores(&mut p, driver, scores.as_deref());
    Ok(p.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn driver(dir: &std::path::Path) -> Driver<CommandExtractor> {
        let layout = Layout::new(dir.join("data"), dir.join("results"));
        Driver::new(layout, CommandExtractor::new("does-not-exist-extractor"))
    }

    #[test]
    fn test_stage_without_manifest_fails() {
        let dir = tempfile::tempdir().unwrap();
        let d = driver(dir.path());
        assert!(run(&d, &Stage::Segment).is_err());
        assert!(run(&d, &Stage::Discover).is_err());
        assert!(run(&d, &Stage::All).is_err());
    }

    #[test]
    fn test_predict_without_inputs_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(&driver(dir.path()), &Stage::Predict).unwrap();
        assert_eq!(result.stages().collect::<Vec<_>>(), ["predict"]);
    }

    #[test]
    fn test_all_stages_reported() {
        let dir = tempfile::tempdir().unwrap();
        let d = driver(dir.path());
        let p1 = d.layout().source_root.join("p1");
        fs::create_dir_all(&p1).unwrap();
        fs::write(p1.join("a.dcm"), b"not dicom").unwrap();

        let result = run(&d, &Stage::All).unwrap();
        assert_eq!(
            result.stages().collect::<Vec<_>>(),
            ["discover", "segment", "extract", "predict"]
        );

        let mut out = Vec::new();
        result.analyze_into(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Units in manifest: 1"));
        assert!(text.contains("0/1 units successful"));
        assert!(text.contains("Skipped: no combined feature table or clinical table"));
    }
}
