//! CT 扫描切片与二值掩膜切片的操作.

mod core;
mod save;

pub use core::{MaskSlice, ScanSlice};

pub use save::ImgWriteMask;
