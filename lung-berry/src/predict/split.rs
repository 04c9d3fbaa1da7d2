//! 训练集/测试集划分.

use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// 行索引划分结果.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Split {
    /// 训练行.
    pub train: Vec<usize>,

    /// 测试行.
    pub test: Vec<usize>,
}

/// 以固定种子打乱 `0..n`, 取前 `ceil(test_fraction * n)` 个作为测试集, 其余为训练集.
///
/// 测试集大小被限制在 `[1, n - 1]`, 保证两侧都非空. 同样的 `(n, test_fraction, seed)`
/// 总是得到同样的划分.
///
/// # 注意
///
/// 1. `n < 2` 时返回 [`Error::TooFewSamples`].
/// 2. `test_fraction` 必须在 `(0, 1)` 内, 否则程序 panic.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Result<Split> {
    assert!(test_fraction > 0.0 && test_fraction < 1.0);
    if n < 2 {
        return Err(Error::TooFewSamples(n, 2));
    }
    let n_test = ((test_fraction * n as f64).ceil() as usize).clamp(1, n - 1);

    let mut perm: Vec<usize> = (0..n).collect();
    perm.shuffle(&mut StdRng::seed_from_u64(seed));
    let train = perm.split_off(n_test);
    Ok(Split { train, test: perm })
}
