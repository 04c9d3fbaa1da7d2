use std::ops::Index;

use ndarray::{Array2, Array3, ArrayView, Axis, Ix3};

use crate::{Idx2d, Idx3d};

pub mod band;
pub mod morph_2d;
mod series;
pub mod slice;

pub use band::HuBand;
pub use morph_2d::{Kernel, MorphOp};
pub use slice::{ImgWriteMask, MaskSlice, ScanSlice};

/// 3D CT 体数据, 以 `(z, H, W)` 顺序保存 HU 值 (`f32`).
///
/// 第 0 维为切片序号, 顺序即序列中切片的排列顺序.
#[derive(Debug, Clone)]
pub struct CtVolume {
    data: Array3<f32>,
}

impl Index<Idx3d> for CtVolume {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl CtVolume {
    /// 直接由 `(z, H, W)` 数组构建.
    #[inline]
    pub fn from_array(data: Array3<f32>) -> Self {
        Self { data }
    }

    /// 由一组形状一致的水平切片构建. 切片列表为空或形状不一致时返回 `None`.
    pub fn from_slices(slices: &[Array2<f32>]) -> Option<Self> {
        let first = slices.first()?;
        let (h, w) = first.dim();
        if slices.iter().any(|s| s.dim() != (h, w)) {
            return None;
        }
        let mut data = Array3::<f32>::zeros((slices.len(), h, w));
        for (mut dst, src) in data.axis_iter_mut(Axis(0)).zip(slices) {
            dst.assign(src);
        }
        Some(Self { data })
    }

    /// 获取数据形状大小 `(z, H, W)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 获取数据水平切片形状大小.
    #[inline]
    pub fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取水平切片个数.
    #[inline]
    pub fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取数据体素个数.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 获取 z 空间的第 `z_index` 层切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ScanSlice<'_> {
        ScanSlice::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 获取能按升序迭代水平切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ScanSlice> {
        self.data.axis_iter(Axis(0)).map(ScanSlice::new)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix3> {
        self.data.view()
    }
}
