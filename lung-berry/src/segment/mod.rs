//! 肺部分割阶段.

mod batch;
mod lung;

#[cfg(feature = "rayon")]
pub use batch::par_segment_all;
pub use batch::{segment_all, segment_unit};
pub use lung::{mask_file_name, LungSegmenter};
