//! `triage`: 批量肺部 CT 分诊流水线命令行入口.

mod profile;
mod result;
mod runner;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{info, LevelFilter};
use lung_berry::prelude::*;
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use utils::loader;

/// 批量肺部 CT 分诊: 发现病人, 分割肺部, 提取影像组学特征, 预测临床结局.
#[derive(Debug, Parser)]
#[command(name = "triage", version, about)]
struct Cli {
    /// 数据根目录, 包含 `source_dicom/`.
    #[arg(long, env = "TRIAGE_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// 结果根目录.
    #[arg(long, env = "TRIAGE_RESULTS_DIR", global = true)]
    results_dir: Option<PathBuf>,

    /// 临床表 (CSV). 缺省时跳过预测.
    #[arg(long, env = "TRIAGE_CLINICAL_CSV", global = true)]
    clinical: Option<PathBuf>,

    /// 并行线程数. 1 为串行, 0 为全部核心.
    #[arg(short, long, default_value_t = 1, global = true)]
    jobs: usize,

    /// 外部特征提取程序. 缺省为 `python proc_radiomic_feature.py`.
    #[arg(long, global = true)]
    extractor: Option<String>,

    /// 传给外部特征提取程序的前置参数, 可重复.
    #[arg(long = "extractor-arg", global = true, allow_hyphen_values = true)]
    extractor_args: Vec<String>,

    /// 外部特征提取程序的工作目录.
    #[arg(long, global = true)]
    extractor_dir: Option<PathBuf>,

    #[command(subcommand)]
    stage: Option<Stage>,
}

/// 运行阶段.
#[derive(Clone, Debug, PartialEq, Eq, Subcommand)]
pub enum Stage {
    /// 依次运行所有阶段 (缺省).
    All,
    /// 发现病人并写出清单.
    Discover,
    /// 按清单分割肺部.
    Segment,
    /// 按清单提取特征.
    Extract,
    /// 以合并特征表和临床表预测结局.
    Predict,
}

impl Cli {
    fn layout(&self) -> anyhow::Result<Layout> {
        let data = match &self.data_dir {
            Some(d) => d.clone(),
            None => loader::data_dir_from_env_or_home()
                .context("Cannot determine data directory, use --data-dir")?,
        };
        let results = match &self.results_dir {
            Some(d) => d.clone(),
            None => loader::results_dir_from_env_or_home()
                .context("Cannot determine results directory, use --results-dir")?,
        };
        Ok(Layout::new(data, results))
    }

    fn extractor(&self) -> CommandExtractor {
        let ans = match &self.extractor {
            Some(program) => CommandExtractor::new(program).args(&self.extractor_args),
            None => CommandExtractor::default().args(&self.extractor_args),
        };
        match &self.extractor_dir {
            Some(dir) => ans.current_dir(dir),
            None => ans,
        }
    }
}

fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
        .context("Installing logger")?;

    let cli = Cli::parse();
    let layout = cli.layout()?;
    let jobs = utils::resolve_jobs(cli.jobs);
    let mut driver = Driver::new(layout, cli.extractor()).parallel(jobs > 1);
    if let Some(clinical) = cli.clinical.clone().or_else(loader::clinical_from_env_or_home) {
        driver = driver.clinical(clinical);
    }

    let stage = cli.stage.clone().unwrap_or(Stage::All);
    info!("running `{stage:?}` with {jobs} job(s)");
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("Building thread pool")?;
    let result = pool.install(|| runner::run(&driver, &stage))?;
    info!("finished {} stage(s)", result.stages().count());

    result.analyze().context("Writing summary")?;
    Ok(())
}
