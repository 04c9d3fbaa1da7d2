//! 端到端场景: 合成 DICOM 序列, 从原始目录一路运行到预测结果.

use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_object::{FileMetaTableBuilder, InMemDicomObject};
use lung_berry::prelude::*;
use lung_berry::report::read_reports;
use std::fs;
use std::path::Path;

/// 存储值 324 在 intercept -1024 下为 -700 HU (肺组织).
const LUNG: u16 = 324;

/// 存储值 1064 在 intercept -1024 下为 40 HU (软组织).
const SOFT: u16 = 1064;

fn init_logger() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init();
}

/// 写出单帧 64 * 64 CT 切片, 所有像素为同一存储值.
fn write_slice(path: &Path, instance: i32, stored: u16) {
    const SIDE: u16 = 64;
    let sop_instance = format!("1.2.826.0.1.3680043.10.1.{instance}.{stored}");
    let put = |obj: &mut InMemDicomObject, tag: Tag, vr: VR, value: PrimitiveValue| {
        obj.put(DataElement::new(tag, vr, value));
    };

    let mut obj = InMemDicomObject::new_empty();
    put(&mut obj, tags::SOP_CLASS_UID, VR::UI, uids::CT_IMAGE_STORAGE.into());
    put(&mut obj, tags::SOP_INSTANCE_UID, VR::UI, sop_instance.as_str().into());
    put(&mut obj, tags::MODALITY, VR::CS, "CT".into());
    put(&mut obj, tags::INSTANCE_NUMBER, VR::IS, instance.to_string().into());
    put(&mut obj, tags::SAMPLES_PER_PIXEL, VR::US, 1_u16.into());
    put(&mut obj, tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2".into());
    put(&mut obj, tags::ROWS, VR::US, SIDE.into());
    put(&mut obj, tags::COLUMNS, VR::US, SIDE.into());
    put(&mut obj, tags::BITS_ALLOCATED, VR::US, 16_u16.into());
    put(&mut obj, tags::BITS_STORED, VR::US, 16_u16.into());
    put(&mut obj, tags::HIGH_BIT, VR::US, 15_u16.into());
    put(&mut obj, tags::PIXEL_REPRESENTATION, VR::US, 0_u16.into());
    put(&mut obj, tags::RESCALE_INTERCEPT, VR::DS, "-1024".into());
    put(&mut obj, tags::RESCALE_SLOPE, VR::DS, "1".into());

    let pixels: Vec<u8> = std::iter::repeat(stored.to_le_bytes())
        .take(usize::from(SIDE) * usize::from(SIDE))
        .flatten()
        .collect();
    put(&mut obj, tags::PIXEL_DATA, VR::OW, pixels.into());

    let file = obj
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
                .media_storage_sop_instance_uid(sop_instance.as_str()),
        )
        .unwrap();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    file.write_to_file(path).unwrap();
}

/// 原始目录:
/// - `p1`: 单张肺组织切片;
/// - `p2`: 只有文本文件, 应被跳过;
/// - `p3`: 两张切片, 文件名顺序与 `InstanceNumber` 相反.
fn source_tree(layout: &Layout) {
    let src = &layout.source_root;
    write_slice(&src.join("p1").join("scan").join("IM0001"), 1, LUNG);
    fs::create_dir_all(src.join("p2")).unwrap();
    fs::write(src.join("p2").join("notes.txt"), b"no images here").unwrap();
    write_slice(&src.join("p3").join("a.dcm"), 2, SOFT);
    write_slice(&src.join("p3").join("b.dcm"), 1, LUNG);
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

#[test]
fn discovery_skips_empty_patients_and_is_idempotent() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path().join("data"), dir.path().join("results"));
    source_tree(&layout);

    let discoverer = Discoverer::new(&layout.source_root, &layout.image_root);
    let first = discoverer.run().unwrap();
    assert_eq!(first.skipped, ["p2"]);
    let ids: Vec<_> = first.manifest.iter().map(|u| u.patient_id.as_str()).collect();
    assert_eq!(ids, ["p1", "p3"]);

    let unit_dir = layout.image_dir(&UnitKey::new("p3", "study_1", "series_1"));
    let before = fs::read(unit_dir.join("000002.dcm")).unwrap();

    let second = discoverer.run().unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read(unit_dir.join("000002.dcm")).unwrap(), before);
    assert_eq!(file_names(&unit_dir), ["000001.dcm", "000002.dcm"]);
}

#[test]
fn single_lung_slice_gives_exactly_one_mask() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path().join("data"), dir.path().join("results"));
    source_tree(&layout);
    let manifest = Discoverer::new(&layout.source_root, &layout.image_root)
        .run()
        .unwrap()
        .manifest;

    let reports = lung_berry::segment::segment_all(&layout, &LungSegmenter::default(), &manifest);
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(UnitReport::is_success));
    assert_eq!(reports[0].outcome.message(), "Created 1 masks");

    let p1 = layout.mask_dir(&reports[0].key);
    assert_eq!(file_names(&p1), ["000.png"]);
    let img = image::open(p1.join("000.png")).unwrap().to_luma8();
    assert!(img.pixels().all(|p| p.0[0] == 255));

    // 切片按 InstanceNumber 排序, 肺组织切片排在第 0 位.
    let p3 = layout.mask_dir(&reports[1].key);
    assert_eq!(file_names(&p3), ["000.png"]);
}

#[test]
fn five_slice_patient_and_empty_patient() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path().join("data"), dir.path().join("results"));
    let src = &layout.source_root;
    // 只有 InstanceNumber 为 1 的切片含肺组织.
    for i in 1..=5 {
        let stored = if i == 1 { LUNG } else { SOFT };
        write_slice(&src.join("with_images").join(format!("slice{i}.dcm")), i, stored);
    }
    fs::create_dir_all(src.join("empty")).unwrap();
    fs::write(src.join("empty").join("readme.txt"), b"nothing").unwrap();

    let discovery = Discoverer::new(&layout.source_root, &layout.image_root)
        .run()
        .unwrap();
    assert_eq!(discovery.skipped, ["empty"]);
    let units = discovery.manifest.units();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].patient_id, "with_images");
    assert_eq!(units[0].dicom_count, 5);
    assert_eq!(file_names(&layout.image_dir(&units[0].key())).len(), 5);

    let reports = lung_berry::segment::segment_all(
        &layout,
        &LungSegmenter::default(),
        &discovery.manifest,
    );
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].outcome.message(), "Created 1 masks");
    assert_eq!(file_names(&layout.mask_dir(&reports[0].key)), ["000.png"]);
}

#[cfg(unix)]
#[test]
fn failing_extractor_is_reported_with_stderr() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path().join("data"), dir.path().join("results"));
    source_tree(&layout);

    let extractor = CommandExtractor::new("sh").args([
        "-c",
        "echo 'radiomics exploded' >&2; exit 1",
        "sh",
    ]);
    let summary = Driver::new(layout.clone(), extractor).run().unwrap();
    assert_eq!(summary.units, 2);
    assert_eq!(summary.segmented, 2);
    assert_eq!(summary.extracted, 0);
    assert_eq!(summary.feature_rows, 0);
    assert!(summary.predictions.is_none());

    let reports = read_reports(layout.extraction_report_path()).unwrap();
    assert_eq!(reports.len(), 2);
    for r in reports {
        assert!(!r.success);
        assert_eq!(r.reason, Some(FailureReason::ExitStatus));
        assert!(r.message.starts_with("Feature extraction failed: "));
        assert!(r.message.contains("radiomics exploded"));
    }
    assert!(!layout.combined_features_path().exists());
}

#[cfg(unix)]
#[test]
fn full_run_produces_predictions() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path().join("data"), dir.path().join("results"));
    source_tree(&layout);

    // $6 为 --save_root 的值.
    let script = r#"printf 'patient_id,covid_risk_score,lung_volume,ground_glass_opacity\nwhoever,0.7,3100,\n' > "$6/final_merge_feature.csv""#;
    let extractor = CommandExtractor::new("sh").args(["-c", script, "sh"]);

    let clinical = dir.path().join("clinical.csv");
    fs::write(
        &clinical,
        "to_patient_id,is_icu,was_ventilated,last.status\n\
         p1,1,Yes,deceased\n\
         p3,0,No,discharged\n\
         p9,1,Yes,deceased\n",
    )
    .unwrap();

    let summary = Driver::new(layout.clone(), extractor)
        .clinical(&clinical)
        .parallel(true)
        .run()
        .unwrap();
    assert_eq!(summary.extracted, 2);
    assert_eq!(summary.feature_rows, 2);
    let scores = summary.predictions.unwrap();
    assert_eq!(scores.len(), 3);

    let combined = FeatureTable::read_csv(layout.combined_features_path()).unwrap();
    let ids: Vec<_> = combined.column("patient_id").unwrap().collect();
    assert_eq!(ids, ["p1", "p3"]);

    let predictions = FeatureTable::read_csv(layout.predictions_path()).unwrap();
    assert_eq!(predictions.len(), 2);
    for col in [
        "icu_admission_probability",
        "mechanical_ventilation_probability",
        "death_probability",
    ] {
        assert!(predictions.column_index(col).is_some(), "{col}");
    }

    let seg = read_reports(layout.segmentation_report_path()).unwrap();
    assert!(seg.iter().all(|r| r.success));
}
