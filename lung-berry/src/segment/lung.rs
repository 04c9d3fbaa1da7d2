//! 基于 HU 阈值与形态学的逐切片肺部分割.

use crate::consts::{MIN_MASK_PIXELS, MORPH_ITERATIONS};
use crate::data::{HuBand, ImgWriteMask, Kernel, MorphOp};
use crate::error::{Error, IoResultExt, Result};
use crate::{CtVolume, MaskSlice, ScanSlice};
use log::debug;
use std::fs;
use std::path::Path;

/// 肺部分割器.
///
/// 对每张水平切片依次执行:
///
/// 1. HU 阈值化, 严格落在 `band` 内的像素为前景;
/// 2. 开运算 (去除小噪点);
/// 3. 闭运算 (填补小空隙);
/// 4. 前景像素个数 **严格大于** `min_pixels` 时保留该切片的掩膜.
///
/// 默认参数: 区间 `(-1000, -400)`, 3 * 3 方形结构元, 各迭代 2 次, 下界 1000.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LungSegmenter {
    band: HuBand,
    kernel: Kernel,
    iterations: u32,
    min_pixels: usize,
}

impl Default for LungSegmenter {
    fn default() -> Self {
        Self {
            band: HuBand::lung(),
            kernel: Kernel::square3(),
            iterations: MORPH_ITERATIONS,
            min_pixels: MIN_MASK_PIXELS,
        }
    }
}

impl LungSegmenter {
    /// 替换 HU 区间.
    #[inline]
    pub fn with_band(mut self, band: HuBand) -> Self {
        self.band = band;
        self
    }

    /// 替换结构元.
    #[inline]
    pub fn with_kernel(mut self, kernel: Kernel) -> Self {
        self.kernel = kernel;
        self
    }

    /// 替换开/闭运算的迭代次数.
    #[inline]
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// 替换保留掩膜所需的前景像素下界 (不含).
    #[inline]
    pub fn with_min_pixels(mut self, min_pixels: usize) -> Self {
        self.min_pixels = min_pixels;
        self
    }

    /// 分割单张切片. 前景像素不足时返回 `None`.
    pub fn mask_slice(&self, slice: &ScanSlice) -> Option<MaskSlice> {
        let mask = slice
            .threshold(self.band)
            .morphology(MorphOp::Open, self.kernel, self.iterations)
            .morphology(MorphOp::Close, self.kernel, self.iterations);
        (mask.count_on() > self.min_pixels).then_some(mask)
    }

    /// 分割整个体数据, 把保留下来的掩膜写入 `out_dir/{z:03}.png`, 返回写出的掩膜个数.
    ///
    /// `z` 是切片在体数据中的序号, 因此被丢弃的切片会在文件名序列中留下空缺.
    pub fn segment_volume<P: AsRef<Path>>(&self, volume: &CtVolume, out_dir: P) -> Result<usize> {
        let out_dir = out_dir.as_ref();
        fs::create_dir_all(out_dir).at(out_dir)?;

        let mut written = 0;
        for (z, slice) in volume.slice_iter().enumerate() {
            let Some(mask) = self.mask_slice(&slice) else {
                debug!("slice {z}: below pixel threshold, dropped");
                continue;
            };
            let path = out_dir.join(mask_file_name(z));
            mask.save_mask(&path)
                .map_err(|source| Error::Image { path, source })?;
            written += 1;
        }
        Ok(written)
    }
}

/// 掩膜文件名: 3 位补零切片序号 + `.png`.
#[inline]
pub fn mask_file_name(z: usize) -> String {
    format!("{z:03}.png")
}
