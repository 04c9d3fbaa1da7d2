//! 2D 二值形态学操作.
//!
//! 语义与常见图像库的 `morphologyEx` 一致: 开运算为 "先腐蚀 `n` 次, 再膨胀 `n` 次",
//! 闭运算为 "先膨胀 `n` 次, 再腐蚀 `n` 次". 图像外的邻居一律忽略,
//! 即腐蚀不会从图像边缘向内侵蚀, 膨胀也不会从图像外引入前景.

use crate::consts::gray::*;
use crate::consts::KERNEL_SIZE;
use crate::MaskSlice;
use ndarray::{s, Array2};

/// 以中心为锚点的矩形结构元.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Kernel {
    /// 垂直方向半径.
    rh: usize,

    /// 水平方向半径.
    rw: usize,
}

impl Kernel {
    /// 构建 `height * width` 的矩形结构元. 两个边长都必须是正奇数, 否则返回 `None`.
    pub fn rect(height: usize, width: usize) -> Option<Kernel> {
        let odd = |v: usize| v % 2 == 1;
        (odd(height) && odd(width)).then_some(Self {
            rh: height / 2,
            rw: width / 2,
        })
    }

    /// 3 * 3 方形结构元.
    #[inline]
    pub const fn square3() -> Kernel {
        Self {
            rh: KERNEL_SIZE / 2,
            rw: KERNEL_SIZE / 2,
        }
    }

    /// 结构元的 (高, 宽).
    #[inline]
    pub fn size(&self) -> (usize, usize) {
        (self.rh * 2 + 1, self.rw * 2 + 1)
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::square3()
    }
}

/// 形态学操作类型.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MorphOp {
    /// 腐蚀.
    Erode,

    /// 膨胀.
    Dilate,

    /// 开运算 (腐蚀后膨胀), 去除小噪点.
    Open,

    /// 闭运算 (膨胀后腐蚀), 填补小空隙.
    Close,
}

/// 单次腐蚀或膨胀. `all` 为 `true` 时是腐蚀 (窗口内全为前景才保留), 否则是膨胀.
fn sweep(src: &Array2<u8>, k: Kernel, all: bool) -> Array2<u8> {
    let (h, w) = src.dim();
    Array2::from_shape_fn((h, w), |(i, j)| {
        let window = src.slice(s![
            i.saturating_sub(k.rh)..(i + k.rh + 1).min(h),
            j.saturating_sub(k.rw)..(j + k.rw + 1).min(w)
        ]);
        let hit = if all {
            window.iter().all(|&p| is_on(p))
        } else {
            window.iter().any(|&p| is_on(p))
        };
        if hit {
            MASK_ON
        } else {
            MASK_OFF
        }
    })
}

/// 形态学实现块
impl MaskSlice {
    /// 以 `kernel` 腐蚀 `iterations` 次.
    pub fn erode(&self, kernel: Kernel, iterations: u32) -> MaskSlice {
        let mut data = self.data.clone();
        for _ in 0..iterations {
            data = sweep(&data, kernel, true);
        }
        MaskSlice { data }
    }

    /// 以 `kernel` 膨胀 `iterations` 次.
    pub fn dilate(&self, kernel: Kernel, iterations: u32) -> MaskSlice {
        let mut data = self.data.clone();
        for _ in 0..iterations {
            data = sweep(&data, kernel, false);
        }
        MaskSlice { data }
    }

    /// 开运算: 腐蚀 `iterations` 次, 再膨胀 `iterations` 次.
    #[inline]
    pub fn open(&self, kernel: Kernel, iterations: u32) -> MaskSlice {
        self.erode(kernel, iterations).dilate(kernel, iterations)
    }

    /// 闭运算: 膨胀 `iterations` 次, 再腐蚀 `iterations` 次.
    #[inline]
    pub fn close(&self, kernel: Kernel, iterations: u32) -> MaskSlice {
        self.dilate(kernel, iterations).erode(kernel, iterations)
    }

    /// 统一入口.
    pub fn morphology(&self, op: MorphOp, kernel: Kernel, iterations: u32) -> MaskSlice {
        match op {
            MorphOp::Erode => self.erode(kernel, iterations),
            MorphOp::Dilate => self.dilate(kernel, iterations),
            MorphOp::Open => self.open(kernel, iterations),
            MorphOp::Close => self.close(kernel, iterations),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Idx2d;

    fn block(shape: Idx2d, top: Idx2d, size: Idx2d) -> MaskSlice {
        let mut m = MaskSlice::background(shape);
        let (t, l) = top;
        let (bh, bw) = size;
        m.fill_on((t..t + bh).flat_map(|h| (l..l + bw).map(move |w| (h, w))));
        m
    }

    #[test]
    fn test_kernel_sizes() {
        assert_eq!(Kernel::square3().size(), (3, 3));
        assert_eq!(Kernel::rect(5, 3).map(|k| k.size()), Some((5, 3)));
        assert!(Kernel::rect(2, 3).is_none());
        assert!(Kernel::rect(0, 0).is_none());
    }

    #[test]
    fn test_single_erode_dilate() {
        let k = Kernel::square3();
        let m = block((7, 7), (2, 2), (3, 3));
        let e = m.erode(k, 1);
        assert_eq!(e.count_on(), 1);
        assert_eq!(e[(3, 3)], MASK_ON);

        let d = e.dilate(k, 1);
        assert_eq!(d, m);
    }

    #[test]
    fn test_border_is_not_eroded() {
        let full = MaskSlice::from_raw(Array2::from_elem((5, 6), 1));
        assert_eq!(full.erode(Kernel::square3(), 2), full);

        // 图像外不会引入前景.
        let empty = MaskSlice::background((5, 6));
        assert_eq!(empty.dilate(Kernel::square3(), 2), empty);
    }

    #[test]
    fn test_open_removes_small_specks() {
        let k = Kernel::square3();
        // 4 * 4 的斑点经两次腐蚀后消失.
        let mut m = block((40, 40), (5, 5), (4, 4));
        // 20 * 20 的大块经开运算后保持不变.
        m.fill_on((15..35).flat_map(|h| (15..35).map(move |w| (h, w))));
        let opened = m.open(k, 2);
        assert_eq!(opened.count_on(), 400);
        assert_eq!(opened, block((40, 40), (15, 15), (20, 20)));
    }

    #[test]
    fn test_close_fills_small_gaps() {
        let k = Kernel::square3();
        let mut m = block((30, 30), (5, 5), (20, 20));
        m[(10, 10)] = MASK_OFF;
        m[(15, 16)] = MASK_OFF;
        let closed = m.morphology(MorphOp::Close, k, 2);
        assert_eq!(closed, block((30, 30), (5, 5), (20, 20)));
    }

    #[test]
    fn test_open_then_close_order_matters() {
        let k = Kernel::square3();
        // 两个 2 像素宽的条带, 间隔 1 像素.
        let mut m = block((20, 20), (2, 2), (16, 2));
        m.fill_on((2..18).flat_map(|h| (5..7).map(move |w| (h, w))));

        let open_first = m.open(k, 2).close(k, 2);
        assert!(open_first.is_background());

        let close_first = m.close(k, 2).open(k, 2);
        assert!(!close_first.is_background());
    }
}
