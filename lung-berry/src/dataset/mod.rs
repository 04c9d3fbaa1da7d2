//! 数据集操作: 病人发现, 清单, 以及按清单迭代的体数据加载器.

use std::path::{Path, PathBuf};

pub mod discover;
mod loader;
pub mod manifest;

pub use discover::{Discoverer, Discovery};
pub use loader::{volume_loader, VolumeLoader};
pub use manifest::{Manifest, PatientUnit};

/// 获取 `{用户主目录}/dataset/covid-triage` 目录.
pub fn home_triage_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    ans.push("covid-triage");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset/covid-triage` 目录下给定继续项组成的全路径.
pub fn home_triage_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_triage_dir()?;
    ans.extend(it);
    Some(ans)
}
