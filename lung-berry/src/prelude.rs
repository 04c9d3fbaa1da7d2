//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Error, Idx2d, Idx3d, Result};

pub use crate::data::{CtVolume, HuBand, ImgWriteMask, Kernel, MaskSlice, MorphOp, ScanSlice};

pub use crate::consts::gray::{MASK_OFF, MASK_ON};
pub use crate::consts::ElemType;

pub use crate::config::Layout;
pub use crate::dataset::{self, Discoverer, Manifest, PatientUnit};
pub use crate::driver::{Driver, RunSummary, StageTimes};
pub use crate::extract::{CommandExtractor, ExtractionOutcome, ExtractionRequest, FeatureExtractor};
pub use crate::predict::{PredictionConfig, PredictionPipeline};
pub use crate::report::{FailureReason, UnitKey, UnitOutcome, UnitReport};
pub use crate::segment::LungSegmenter;
pub use crate::table::FeatureTable;
