//! 对 `lung-berry::config` 的更一层封装. 从环境变量或用户主目录推断运行路径.

use lung_berry::dataset::home_triage_dir_with;
use std::env;
use std::path::PathBuf;

/// 读取非空环境变量.
fn non_empty_env(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// 获取数据根目录.
///
/// 1. 若环境变量 `$TRIAGE_DATA_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/covid-triage/data`.
///
/// 两者都无法确定时返回 `None`.
pub fn data_dir_from_env_or_home() -> Option<PathBuf> {
    non_empty_env("TRIAGE_DATA_DIR").or_else(|| home_triage_dir_with(["data"]))
}

/// 获取结果根目录.
///
/// 1. 若环境变量 `$TRIAGE_RESULTS_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/covid-triage/results`.
pub fn results_dir_from_env_or_home() -> Option<PathBuf> {
    non_empty_env("TRIAGE_RESULTS_DIR").or_else(|| home_triage_dir_with(["results"]))
}

/// 获取临床表路径.
///
/// 1. 若环境变量 `$TRIAGE_CLINICAL_CSV` 非空, 则返回其值;
/// 2. 否则, 若 `$HOME/dataset/covid-triage/COVID_NY_SBU_clinical.csv` 存在, 返回该路径;
/// 3. 否则返回 `None`, 预测阶段将被跳过.
pub fn clinical_from_env_or_home() -> Option<PathBuf> {
    non_empty_env("TRIAGE_CLINICAL_CSV").or_else(|| {
        home_triage_dir_with(["COVID_NY_SBU_clinical.csv"]).filter(|p| p.is_file())
    })
}
