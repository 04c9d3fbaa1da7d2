//! 临床结局预测.
//!
//! 将影像组学特征表与临床表按病人内连接, 对每个结局分别训练随机森林,
//! 在留出集上评估 AUC, 并为连接后的 **所有** 行输出预测概率.
//!
//! # 注意
//!
//! 概率列覆盖训练行, 因此训练行上的概率是乐观的. 这是有意保留的行为,
//! 下游只应把留出集 AUC 当作模型质量的指标.

mod forest;
mod metrics;
mod outcome;
mod split;

pub use forest::{ForestParams, MaxFeatures, RandomForest};
pub use metrics::roc_auc;
pub use outcome::{LabelRule, OutcomeSpec};
pub use split::{train_test_split, Split};

use crate::error::{Error, Result};
use crate::table::FeatureTable;
use log::{info, warn};
use ndarray::{Array2, Axis};
use std::path::Path;

/// 预测流程参数. `Default` 即流水线使用的固定配置.
#[derive(Clone, Debug, PartialEq)]
pub struct PredictionConfig {
    /// 特征表中的病人列.
    pub feature_key: String,

    /// 临床表中的病人列.
    pub clinical_key: String,

    /// 预测变量列.
    pub predictors: Vec<String>,

    /// 待预测的结局.
    pub outcomes: Vec<OutcomeSpec>,

    /// 测试集比例.
    pub test_fraction: f64,

    /// 划分和森林共用的随机种子.
    pub seed: u64,

    /// 森林参数.
    pub forest: ForestParams,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            feature_key: "patient_id".into(),
            clinical_key: "to_patient_id".into(),
            predictors: vec![
                "covid_risk_score".into(),
                "lung_volume".into(),
                "ground_glass_opacity".into(),
            ],
            outcomes: OutcomeSpec::defaults(),
            test_fraction: 0.2,
            seed: 42,
            forest: ForestParams::default(),
        }
    }
}

/// 单个结局的评估结果.
#[derive(Clone, Debug, PartialEq)]
pub struct OutcomeScore {
    /// 结局名.
    pub outcome: String,

    /// 留出集 AUC. 留出集只有一类时为 `None`.
    pub auc: Option<f64>,

    /// 训练行数.
    pub train_rows: usize,

    /// 测试行数.
    pub test_rows: usize,

    /// 连接后阳性行数.
    pub positives: usize,
}

/// 预测结果.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    /// 连接后的表, 末尾追加了每个结局的 `<outcome>_probability` 列.
    pub table: FeatureTable,

    /// 按配置顺序排列的评估结果.
    pub scores: Vec<OutcomeScore>,
}

/// 预测流程.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PredictionPipeline {
    config: PredictionConfig,
}

impl PredictionPipeline {
    /// 以给定参数构建.
    #[inline]
    pub fn new(config: PredictionConfig) -> Self {
        Self { config }
    }

    /// 参数.
    #[inline]
    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }

    /// 由临床表派生结局列, 只保留病人列和结局列.
    fn clinical_outcomes(&self, clinical: &FeatureTable) -> Result<FeatureTable> {
        let cfg = &self.config;
        let mut table = clinical.clone();
        for o in cfg.outcomes.iter() {
            let labels: Vec<String> = table
                .column(&o.source)?
                .map(|cell| if o.rule.label(cell) { "1" } else { "0" }.to_owned())
                .collect();
            table.set_column(&o.name, labels);
        }
        let mut keep = vec![cfg.clinical_key.as_str()];
        keep.extend(cfg.outcomes.iter().map(|o| o.name.as_str()));
        table.select(&keep)
    }

    /// 运行整个流程.
    ///
    /// # 注意
    ///
    /// 1. 临床表缺少病人列或结局来源列, 或连接后缺少预测变量列时返回
    ///   [`Error::MissingColumn`].
    /// 2. 连接后不足 2 行时返回 [`Error::TooFewSamples`].
    pub fn run(&self, features: &FeatureTable, clinical: &FeatureTable) -> Result<Prediction> {
        let cfg = &self.config;
        let outcomes = self.clinical_outcomes(clinical)?;
        let mut joined = features.inner_join(&outcomes, &cfg.feature_key, &cfg.clinical_key)?;
        info!(
            "joined {} feature rows with {} clinical rows: {} rows",
            features.len(),
            clinical.len(),
            joined.len()
        );
        if joined.len() < 2 {
            return Err(Error::TooFewSamples(joined.len(), 2));
        }

        let predictors: Vec<&str> = cfg.predictors.iter().map(String::as_str).collect();
        let x = joined.numeric_matrix(&predictors)?;
        let split = train_test_split(joined.len(), cfg.test_fraction, cfg.seed)?;
        let x_train = x.select(Axis(0), &split.train);
        let x_test = x.select(Axis(0), &split.test);

        let mut scores = Vec::with_capacity(cfg.outcomes.len());
        for o in cfg.outcomes.iter() {
            // 与特征列同名时结局列在连接后带 `_y` 后缀.
            let column = if features.column_index(&o.name).is_some() {
                format!("{}_y", o.name)
            } else {
                o.name.clone()
            };
            let y: Vec<bool> = joined.column(&column)?.map(|c| c == "1").collect();
            let (score, proba) = self.fit_outcome(o, &x, &x_train, &x_test, &y, &split)?;
            joined.set_column(
                &o.probability_column(),
                proba.iter().map(|p| p.to_string()).collect(),
            );
            scores.push(score);
        }
        Ok(Prediction {
            table: joined,
            scores,
        })
    }

    fn fit_outcome(
        &self,
        o: &OutcomeSpec,
        x: &Array2<f64>,
        x_train: &Array2<f64>,
        x_test: &Array2<f64>,
        y: &[bool],
        split: &Split,
    ) -> Result<(OutcomeScore, ndarray::Array1<f64>)> {
        let cfg = &self.config;
        let y_train: Vec<bool> = split.train.iter().map(|&i| y[i]).collect();
        let y_test: Vec<bool> = split.test.iter().map(|&i| y[i]).collect();

        let model = RandomForest::fit(x_train.view(), &y_train, &cfg.forest, cfg.seed)?;
        let test_proba = model.predict_proba(x_test.view());
        let auc = roc_auc(&test_proba.to_vec(), &y_test);
        match auc {
            Some(v) => info!("{} AUC: {v:.3}", o.name),
            None => warn!("{} AUC undefined: held-out labels are a single class", o.name),
        }

        let score = OutcomeScore {
            outcome: o.name.clone(),
            auc,
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            positives: y.iter().filter(|&&l| l).count(),
        };
        Ok((score, model.predict_proba(x.view())))
    }

    /// 读取特征表和临床表, 运行流程, 并把结果表写入 `output`.
    pub fn run_files<P, Q, R>(&self, features: P, clinical: Q, output: R) -> Result<Prediction>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        R: AsRef<Path>,
    {
        let features = FeatureTable::read_csv(features)?;
        let clinical = FeatureTable::read_csv(clinical)?;
        let prediction = self.run(&features, &clinical)?;
        prediction.table.write_csv(output.as_ref())?;
        info!(
            "saved {} predictions to `{}`",
            prediction.table.len(),
            output.as_ref().display()
        );
        Ok(prediction)
    }
}
