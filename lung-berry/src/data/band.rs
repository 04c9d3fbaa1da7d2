use crate::consts::{hu, ElemType};

/// CT HU 开区间 `(lower, upper)`.
///
/// 落在区间内 (两端都不含) 的像素被视为前景. 该区间是只读的.
/// 若要修改参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HuBand {
    lower: f32,
    upper: f32,
}

impl HuBand {
    /// 构建 HU 区间.
    ///
    /// `lower` 和 `upper` 必须有限且 `lower < upper`, 否则返回 `None`.
    pub fn new(lower: f32, upper: f32) -> Option<HuBand> {
        if lower.is_finite() && upper.is_finite() && lower < upper {
            Some(Self { lower, upper })
        } else {
            None
        }
    }

    /// 含气肺组织的特征区间 `(-1000, -400)`.
    #[inline]
    pub const fn lung() -> HuBand {
        Self {
            lower: hu::LUNG_LOWER,
            upper: hu::LUNG_UPPER,
        }
    }

    /// 区间下界 (不含).
    #[inline]
    pub fn lower(&self) -> f32 {
        self.lower
    }

    /// 区间上界 (不含).
    #[inline]
    pub fn upper(&self) -> f32 {
        self.upper
    }

    /// `value` 是否严格落在区间内. NaN 永远不在区间内.
    #[inline]
    pub fn contains(&self, value: f32) -> bool {
        value > self.lower && value < self.upper
    }

    /// 求 `value` 对应的像素类型.
    #[inline]
    pub fn eval(&self, value: f32) -> ElemType {
        if self.contains(value) {
            ElemType::Foreground
        } else {
            ElemType::Background
        }
    }
}

impl Default for HuBand {
    fn default() -> Self {
        Self::lung()
    }
}
