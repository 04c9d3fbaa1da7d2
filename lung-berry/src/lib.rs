#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供批量肺部 CT 分诊流水线: 病人发现, 肺部分割, 特征提取编排,
//! 以及临床结局预测.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 各阶段之间只通过文件交换数据, 所有路径由 [`config::Layout`] 统一描述.
//!   因此任意阶段都可以单独重跑.
//! 2. 批处理中单个 unit 的失败不会以 `Err` 返回, 而是记录在报告中.
//!   只有清单缺失会终止整个运行.
//! 3. 影像组学特征由外部程序计算, 本 crate 只负责调用和整理结果.
//!
//! # 开发计划
//!
//! ### 病人发现与影像规范化 ✅
//!
//! 原始目录的每个子目录视为一个病人, 影像复制为 `NNNNNN.dcm`.
//!
//! 实现位于 `lung-berry/src/dataset`.
//!
//! ### DICOM 序列读取 ✅
//!
//! 应用 modality LUT 得到 HU 值, 按 `InstanceNumber` 排序.
//!
//! 实现位于 `lung-berry/src/data/series.rs`.
//!
//! ### 二维形态学操作 ✅
//!
//! 3 * 3 方形结构元的腐蚀, 膨胀, 开运算和闭运算. 图像外的邻居被忽略.
//!
//! 实现位于 `lung-berry/src/data/morph_2d`.
//!
//! ### 肺部分割 ✅
//!
//! HU 阈值 `(-1000, -400)` -> 开运算 -> 闭运算 -> 像素数过滤.
//!
//! 实现位于 `lung-berry/src/segment`.
//!
//! ### 特征提取编排 ✅
//!
//! 提取器抽象为 trait, 默认实现为子进程. 合并各 unit 的特征表.
//!
//! 实现位于 `lung-berry/src/extract`.
//!
//! ### 结局预测 ✅
//!
//! 内连接临床表, 随机森林 + 留出集 AUC. 森林为纯 Rust 实现.
//!
//! 实现位于 `lung-berry/src/predict`.
//!
//! ### 提取器超时 ⌛️
//!
//! 外部程序可能挂起, 目前没有超时机制.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// CT 体数据与掩膜的基础数据结构.
mod data;

pub use data::{
    CtVolume, HuBand, ImgWriteMask, Kernel, MaskSlice, MorphOp, ScanSlice,
};

pub mod config;
pub mod consts;
pub mod dataset;
pub mod driver;
mod error;
pub mod extract;
pub mod predict;
pub mod prelude;
pub mod report;
pub mod segment;
pub mod table;

pub use error::{Error, Result};
