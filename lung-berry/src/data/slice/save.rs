//! 掩膜的持久化存储.

use crate::consts::gray::persisted;
use crate::MaskSlice;
use image::ImageResult;
use std::path::Path;

/// 表明一个可以以二值灰度图持久化存储的掩膜对象.
///
/// 前景像素以 255 写出, 背景像素以 0 写出. 图像格式由 `path` 的扩展名决定,
/// 流水线中固定为 PNG.
pub trait ImgWriteMask {
    /// 将掩膜保存到 `path` 路径.
    fn save_mask<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

impl ImgWriteMask for MaskSlice {
    fn save_mask<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let (height, width) = self.shape();
        let mut buf = image::GrayImage::new(width as u32, height as u32);
        for ((h, w), &pix) in self.data.indexed_iter() {
            buf.put_pixel(w as u32, h as u32, image::Luma([persisted(pix)]));
        }
        buf.save(path)
    }
}
