//! 按清单批量分割. 单个 unit 的错误在此处被转换为报告, 不会中断批处理.

use super::LungSegmenter;
use crate::config::Layout;
use crate::dataset::{volume_loader, Manifest};
use crate::error::{Error, Result};
use crate::report::{success_count, FailureReason, UnitKey, UnitOutcome, UnitReport};
use crate::CtVolume;
use log::{info, warn};

/// 分割单个 unit: 读取 `layout.image_dir(key)`, 写出到 `layout.mask_dir(key)`.
///
/// 成功时消息为 `Created N masks`. 影像目录没有可读序列时消息为
/// `No DICOM files found`, 其它错误消息为 `Error: ...`.
pub fn segment_unit(layout: &Layout, segmenter: &LungSegmenter, key: &UnitKey) -> UnitReport {
    let volume = CtVolume::open_series(layout.image_dir(key));
    finish(layout, segmenter, key.clone(), volume)
}

/// 按清单顺序逐个分割, 每个 unit 恰好对应一条报告.
pub fn segment_all(layout: &Layout, segmenter: &LungSegmenter, manifest: &Manifest) -> Vec<UnitReport> {
    let reports: Vec<UnitReport> = volume_loader(layout, manifest.keys())
        .map(|(key, volume)| finish(layout, segmenter, key, volume))
        .collect();
    summarize(&reports);
    reports
}

/// 同 [`segment_all`], 但各 unit 并行处理. 报告仍按清单顺序排列.
#[cfg(feature = "rayon")]
pub fn par_segment_all(
    layout: &Layout,
    segmenter: &LungSegmenter,
    manifest: &Manifest,
) -> Vec<UnitReport> {
    use rayon::prelude::*;

    let reports: Vec<UnitReport> = manifest
        .keys()
        .into_par_iter()
        .map(|key| segment_unit(layout, segmenter, &key))
        .collect();
    summarize(&reports);
    reports
}

fn finish(
    layout: &Layout,
    segmenter: &LungSegmenter,
    key: UnitKey,
    volume: Result<CtVolume>,
) -> UnitReport {
    let written =
        volume.and_then(|v| segmenter.segment_volume(&v, layout.mask_dir(&key)));
    let outcome = match written {
        Ok(n) => {
            info!("{key}: created {n} masks");
            UnitOutcome::succeeded(format!("Created {n} masks"))
        }
        Err(e @ Error::NoSeries(_)) => {
            warn!("{key}: {e}");
            UnitOutcome::failed(FailureReason::NoSeries, e.to_string())
        }
        Err(e) => {
            warn!("{key}: segmentation failed: {e}");
            UnitOutcome::failed(FailureReason::Internal, format!("Error: {e}"))
        }
    };
    UnitReport::new(key, outcome)
}

fn summarize(reports: &[UnitReport]) {
    info!(
        "segmentation: {}/{} units successful",
        success_count(reports),
        reports.len()
    );
}
