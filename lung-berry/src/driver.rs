//! 端到端批处理驱动: 发现 -> 分割 -> 特征提取 -> 预测.

use crate::config::Layout;
use crate::dataset::{Discoverer, Manifest};
use crate::error::Result;
use crate::extract::{self, ExtractionRun, FeatureExtractor};
use crate::predict::{OutcomeScore, PredictionPipeline};
use crate::report::{success_count, write_reports, UnitReport};
use crate::segment::{self, LungSegmenter};
use log::{info, warn};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// 一次完整运行的摘要.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    /// 清单中的 unit 个数.
    pub units: usize,

    /// 没有影像而被跳过的病人.
    pub skipped: Vec<String>,

    /// 发现阶段的错误. 此时沿用了磁盘上已有的清单.
    pub discovery_error: Option<String>,

    /// 分割成功的 unit 个数.
    pub segmented: usize,

    /// 特征提取成功的 unit 个数.
    pub extracted: usize,

    /// 合并特征表的行数.
    pub feature_rows: usize,

    /// 预测评估结果. 预测阶段被跳过或失败时为 `None`.
    pub predictions: Option<Vec<OutcomeScore>>,

    /// 预测阶段的错误.
    pub prediction_error: Option<String>,

    /// 各阶段耗时.
    pub times: StageTimes,

    /// 总耗时.
    pub elapsed: Duration,
}

/// 各阶段耗时.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageTimes {
    /// 发现 (含读取清单).
    pub discover: Duration,
    /// 分割.
    pub segment: Duration,
    /// 特征提取.
    pub extract: Duration,
    /// 预测.
    pub predict: Duration,
}

/// 流水线驱动.
///
/// 阶段之间只通过 [`Layout`] 描述的文件交换数据. 单个 unit 的失败只体现在报告中,
/// 只有清单缺失会终止运行.
pub struct Driver<E> {
    layout: Layout,
    extractor: E,
    segmenter: LungSegmenter,
    prediction: PredictionPipeline,
    clinical: Option<PathBuf>,
    parallel: bool,
}

impl<E: FeatureExtractor + Sync> Driver<E> {
    /// 以默认分割器和预测配置构建. 默认串行, 不运行预测.
    pub fn new(layout: Layout, extractor: E) -> Self {
        Self {
            layout,
            extractor,
            segmenter: LungSegmenter::default(),
            prediction: PredictionPipeline::default(),
            clinical: None,
            parallel: false,
        }
    }

    /// 设置临床表路径. 设置后才会运行预测阶段.
    pub fn clinical<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.clinical = Some(path.into());
        self
    }

    /// 是否并行处理各 unit. 未启用 `rayon` 特性时忽略.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// 替换分割器.
    pub fn segmenter(mut self, segmenter: LungSegmenter) -> Self {
        self.segmenter = segmenter;
        self
    }

    /// 替换预测流程.
    pub fn prediction(mut self, prediction: PredictionPipeline) -> Self {
        self.prediction = prediction;
        self
    }

    /// 磁盘布局.
    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// 发现病人, 复制影像, 写出清单.
    pub fn discover(&self) -> Result<Vec<String>> {
        let discovery =
            Discoverer::new(&self.layout.source_root, &self.layout.image_root).run()?;
        discovery.manifest.save(&self.layout.manifest_path)?;
        Ok(discovery.skipped)
    }

    /// 读取清单. 清单缺失是致命错误.
    #[inline]
    pub fn manifest(&self) -> Result<Manifest> {
        Manifest::load(&self.layout.manifest_path)
    }

    /// 分割清单中的所有 unit, 写出分割报告.
    pub fn segment(&self, manifest: &Manifest) -> Result<Vec<UnitReport>> {
        let reports = if self.parallel {
            par_or_serial_segment(&self.layout, &self.segmenter, manifest)
        } else {
            segment::segment_all(&self.layout, &self.segmenter, manifest)
        };
        write_reports(self.layout.segmentation_report_path(), &reports)?;
        Ok(reports)
    }

    /// 对清单中的所有 unit 提取特征, 写出合并特征表和报告.
    pub fn extract(&self, manifest: &Manifest) -> Result<ExtractionRun> {
        let run = if self.parallel {
            par_or_serial_extract(&self.layout, &self.extractor, manifest)
        } else {
            extract::extract_all(&self.layout, &self.extractor, manifest)
        };
        run.persist(&self.layout)?;
        Ok(run)
    }

    /// 在合并特征表和临床表都存在时运行预测, 否则返回 `None`.
    pub fn predict(&self) -> Result<Option<Vec<OutcomeScore>>> {
        let features = self.layout.combined_features_path();
        if !features.is_file() {
            warn!("no combined feature table, prediction skipped");
            return Ok(None);
        }
        let Some(clinical) = self.clinical.as_ref() else {
            info!("no clinical table configured, prediction skipped");
            return Ok(None);
        };
        let prediction =
            self.prediction
                .run_files(&features, clinical, self.layout.predictions_path())?;
        Ok(Some(prediction.scores))
    }

    /// 依次运行所有阶段.
    pub fn run(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let mut times = StageTimes::default();

        // 发现失败时沿用磁盘上已有的清单, 清单也不存在才终止.
        let mut lap = Instant::now();
        let (skipped, discovery_error) = match self.discover() {
            Ok(skipped) => (skipped, None),
            Err(e) => {
                warn!("patient discovery failed: {e}");
                (Vec::new(), Some(e.to_string()))
            }
        };
        let manifest = self.manifest()?;
        info!("processing {} units", manifest.len());
        times.discover = lap.elapsed();

        lap = Instant::now();
        let seg = self.segment(&manifest)?;
        times.segment = lap.elapsed();

        lap = Instant::now();
        let run = self.extract(&manifest)?;
        times.extract = lap.elapsed();

        // 预测失败不影响已经写出的分割和特征结果.
        lap = Instant::now();
        let (predictions, prediction_error) = match self.predict() {
            Ok(p) => (p, None),
            Err(e) => {
                warn!("prediction failed: {e}");
                (None, Some(e.to_string()))
            }
        };
        times.predict = lap.elapsed();

        Ok(RunSummary {
            units: manifest.len(),
            skipped,
            discovery_error,
            segmented: success_count(&seg),
            extracted: success_count(&run.reports),
            feature_rows: run.feature_rows(),
            predictions,
            prediction_error,
            times,
            elapsed: start.elapsed(),
        })
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        fn par_or_serial_segment(
            layout: &Layout,
            segmenter: &LungSegmenter,
            manifest: &Manifest,
        ) -> Vec<UnitReport> {
            segment::par_segment_all(layout, segmenter, manifest)
        }

        fn par_or_serial_extract<E: FeatureExtractor + Sync>(
            layout: &Layout,
            extractor: &E,
            manifest: &Manifest,
        ) -> ExtractionRun {
            extract::par_extract_all(layout, extractor, manifest)
        }
    } else {
        fn par_or_serial_segment(
            layout: &Layout,
            segmenter: &LungSegmenter,
            manifest: &Manifest,
        ) -> Vec<UnitReport> {
            segment::segment_all(layout, segmenter, manifest)
        }

        fn par_or_serial_extract<E: FeatureExtractor + Sync>(
            layout: &Layout,
            extractor: &E,
            manifest: &Manifest,
        ) -> ExtractionRun {
            extract::extract_all(layout, extractor, manifest)
        }
    }
}
