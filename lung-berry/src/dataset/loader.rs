//! 按清单顺序加载规范化影像的迭代器.

use crate::config::Layout;
use crate::report::UnitKey;
use crate::{CtVolume, Result};

/// 为 `keys` 中每个 unit 创建 [`CtVolume`] 加载器, 影像目录由 `layout` 决定.
///
/// # 注意
///
/// 加载器本身不会失败. 单个 unit 的读取错误在迭代时以 `Result::Err` 返回,
/// 不影响后续 unit.
pub fn volume_loader<I: IntoIterator<Item = UnitKey>>(layout: &Layout, keys: I) -> VolumeLoader {
    let mut keys: Vec<UnitKey> = keys.into_iter().collect();
    keys.reverse();

    VolumeLoader {
        layout: layout.clone(),
        keys_rev: keys,
    }
}

/// 3D CT 体数据加载器.
#[derive(Debug)]
pub struct VolumeLoader {
    layout: Layout,
    keys_rev: Vec<UnitKey>,
}

impl Iterator for VolumeLoader {
    type Item = (UnitKey, Result<CtVolume>);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.keys_rev.pop()?;
        let data = CtVolume::open_series(self.layout.image_dir(&key));
        Some((key, data))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.keys_rev.len();
        (n, Some(n))
    }
}

impl ExactSizeIterator for VolumeLoader {
    #[inline]
    fn len(&self) -> usize {
        self.keys_rev.len()
    }
}
