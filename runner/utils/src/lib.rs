//! 命令行工具依赖的通用组件.

use std::io;

pub mod loader;

const SEP: &str = "--------------------------------------------------------";

/// 向 `w` 写一条简单分隔线.
#[inline]
pub fn sep_to<W: io::Write>(mut w: W) -> io::Result<()> {
    writeln!(&mut w, "{SEP}")
}

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// 将 `--jobs` 参数解析为线程数: 0 代表全部核心.
#[inline]
pub fn resolve_jobs(jobs: usize) -> usize {
    match jobs {
        0 => cpus(),
        n => n,
    }
}
