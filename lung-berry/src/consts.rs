//! 通用常量.

/// 单通道颜色.
pub mod gray {
    /// 内存中掩膜的背景像素值.
    pub const MASK_OFF: u8 = 0;

    /// 内存中掩膜的前景 (肺组织) 像素值.
    pub const MASK_ON: u8 = 1;

    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// 像素是否是前景?
    #[inline]
    pub const fn is_on(p: u8) -> bool {
        p != MASK_OFF
    }

    /// 像素是否是背景?
    #[inline]
    pub const fn is_off(p: u8) -> bool {
        p == MASK_OFF
    }

    /// 掩膜像素持久化时的灰度值. 前景为白色, 背景为黑色.
    #[inline]
    pub const fn persisted(p: u8) -> u8 {
        if is_on(p) {
            WHITE
        } else {
            BLACK
        }
    }
}

/// CT HU 值常量.
pub mod hu {
    /// 含气肺组织 HU 区间下界 (不含).
    pub const LUNG_LOWER: f32 = -1000.0;

    /// 含气肺组织 HU 区间上界 (不含).
    pub const LUNG_UPPER: f32 = -400.0;
}

/// 形态学结构元边长.
pub const KERNEL_SIZE: usize = 3;

/// 开/闭运算的迭代次数.
pub const MORPH_ITERATIONS: u32 = 2;

/// 一张切片掩膜被保留所需的前景像素个数 **下界 (不含)**.
pub const MIN_MASK_PIXELS: usize = 1000;

/// 没有 study 层级时使用的占位 study 标识.
pub const PLACEHOLDER_STUDY: &str = "study_1";

/// 没有 series 层级时使用的占位 series 标识.
pub const PLACEHOLDER_SERIES: &str = "series_1";

/// 被视为医学影像文件的扩展名 (小写). 无扩展名的文件同样被接受.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["dcm", "ima", "dicom"];

/// 外部特征提取程序在输出目录下写入的特征表文件名.
pub const FEATURE_FILE_NAME: &str = "final_merge_feature.csv";

/// 外部特征提取程序识别的单 unit 过滤环境变量.
pub const PATIENT_FILTER_ENV: &str = "PATIENT_FILTER";

/// 像素类型.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ElemType {
    /// `MASK_OFF`, 代表背景.
    Background,

    /// `MASK_ON`, 代表前景.
    Foreground,
}

impl ElemType {
    /// 是否为前景.
    #[inline]
    pub fn is_foreground(&self) -> bool {
        matches!(self, Self::Foreground)
    }

    /// 是否为背景.
    #[inline]
    pub fn is_background(&self) -> bool {
        !self.is_foreground()
    }

    /// 转为内存中的掩膜像素值.
    #[inline]
    pub fn pixel(&self) -> u8 {
        match self {
            Self::Foreground => gray::MASK_ON,
            Self::Background => gray::MASK_OFF,
        }
    }
}

/// 判断 `path` 是否可能是医学影像文件.
///
/// 扩展名 (忽略大小写) 属于 [`IMAGE_EXTENSIONS`], 或者根本没有扩展名.
pub fn is_image_candidate(path: &std::path::Path) -> bool {
    match path.extension() {
        None => true,
        Some(ext) => ext
            .to_str()
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str())),
    }
}
