use crate::consts::gray::*;
use crate::data::HuBand;
use crate::Idx2d;
use ndarray::iter::Iter;
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Ix2};
use std::ops::{Index, IndexMut};

/// 不可变、借用的二维水平 CT 扫描切片.
pub struct ScanSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::CtVolume`].
    data: ArrayView2<'a, f32>,
}

impl Index<Idx2d> for ScanSlice<'_> {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl<'a> ScanSlice<'a> {
    /// 直接初始化.
    #[inline]
    pub(crate) fn new(data: ArrayView2<'a, f32>) -> Self {
        Self { data }
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView2<f32> {
        self.data.view()
    }

    /// 获取可以迭代图像像素的迭代器.
    #[inline]
    pub fn iter(&self) -> Iter<'_, f32, Ix2> {
        self.data.iter()
    }

    /// 获取给定位置 (高, 宽) 的 HU 值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<&f32> {
        self.data.get(pos)
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 图像的像素个数.
    #[inline]
    pub fn size(&self) -> usize {
        let (h, w) = self.shape();
        h * w
    }

    /// 以行优先规则, 获取能迭代图像所有 `(索引, CT HU 值)` 的迭代器.
    #[inline]
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &f32)> {
        self.data.indexed_iter()
    }

    /// 逐像素阈值化. HU 值严格落在 `band` 内的像素为前景, 其余为背景.
    ///
    /// 这是一个与上下文无关的逐像素规则, 不做任何连通域或解剖学推断.
    pub fn threshold(&self, band: HuBand) -> MaskSlice {
        MaskSlice {
            data: self.data.map(|&hu| band.eval(hu).pixel()),
        }
    }
}

/// 拥有所有权的二维二值掩膜切片.
///
/// 像素只有 [`MASK_OFF`] 和 [`MASK_ON`] 两种取值. 持久化时分别映射为 0 和 255.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskSlice {
    pub(crate) data: Array2<u8>,
}

impl Index<Idx2d> for MaskSlice {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx2d> for MaskSlice {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl MaskSlice {
    /// 创建全背景掩膜.
    #[inline]
    pub fn background(shape: Idx2d) -> Self {
        Self {
            data: Array2::from_elem(shape, MASK_OFF),
        }
    }

    /// 由任意 `u8` 数组创建. 非零像素视为前景.
    pub fn from_raw(data: Array2<u8>) -> Self {
        Self {
            data: data.mapv(|p| if is_on(p) { MASK_ON } else { MASK_OFF }),
        }
    }

    /// 获得 **底层** 数据的一份不可变 shallow copy.
    #[inline]
    pub fn array_view(&self) -> ArrayView2<u8> {
        self.data.view()
    }

    /// 获得 **底层** 数据的一份可变 shallow copy.
    #[inline]
    pub fn array_view_mut(&mut self) -> ArrayViewMut2<u8> {
        self.data.view_mut()
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array2<u8> {
        self.data
    }

    /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<&u8> {
        self.data.get(pos)
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 获得图像的高.
    #[inline]
    pub fn height(&self) -> usize {
        self.shape().0
    }

    /// 获得图像的宽.
    #[inline]
    pub fn width(&self) -> usize {
        self.shape().1
    }

    /// 统计前景像素个数.
    #[inline]
    pub fn count_on(&self) -> usize {
        self.data.iter().filter(|p| is_on(**p)).count()
    }

    /// 该图是否为全背景图?
    #[inline]
    pub fn is_background(&self) -> bool {
        self.data.iter().copied().all(is_off)
    }

    /// 将 `it` 中的每个索引对应的像素设为前景.
    pub fn fill_on<I: IntoIterator<Item = Idx2d>>(&mut self, it: I) {
        for pos in it.into_iter() {
            self[pos] = MASK_ON;
        }
    }
}
