//! 随机森林二分类器.
//!
//! 每棵树是以 Gini 不纯度生长的 CART 决策树, 在 bootstrap 样本上训练,
//! 每个结点随机抽取一部分特征寻找最佳划分. 叶结点保存阳性样本比例,
//! 森林的概率输出为所有树叶结点比例的平均值.

use crate::error::{Error, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 每个结点参与划分搜索的特征个数.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MaxFeatures {
    /// `max(1, floor(sqrt(p)))`.
    Sqrt,

    /// 全部特征.
    All,

    /// 固定个数, 超过特征总数时取全部.
    Count(usize),
}

impl MaxFeatures {
    fn resolve(&self, p: usize) -> usize {
        let k = match self {
            Self::Sqrt => (p as f64).sqrt().floor() as usize,
            Self::All => p,
            Self::Count(k) => *k,
        };
        k.clamp(1, p.max(1))
    }
}

/// 森林参数.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ForestParams {
    /// 树的个数.
    pub n_trees: usize,

    /// 最大深度. `None` 表示生长到叶结点纯净或无法再划分.
    pub max_depth: Option<usize>,

    /// 结点继续划分所需的最少样本数.
    pub min_samples_split: usize,

    /// 每个结点的候选特征个数.
    pub max_features: MaxFeatures,

    /// 是否在 bootstrap 样本上训练每棵树.
    pub bootstrap: bool,
}

impl Default for ForestParams {
    /// 100 棵完全生长的树, `sqrt(p)` 候选特征, bootstrap.
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Node {
    Leaf {
        p: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// 单棵决策树. 结点 0 为根.
#[derive(Clone, Debug, PartialEq)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn predict(&self, row: ArrayView1<f64>) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes[id] {
                Node::Leaf { p } => return p,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

/// 训练好的随机森林.
#[derive(Clone, Debug, PartialEq)]
pub struct RandomForest {
    trees: Vec<Tree>,
    n_features: usize,
}

impl RandomForest {
    /// 在 `x` (`(样本, 特征)`) 和标签 `y` 上训练. 同样的输入和 `seed` 总是得到同样的森林.
    ///
    /// # 注意
    ///
    /// 1. 没有样本时返回 [`Error::TooFewSamples`].
    /// 2. `x` 的行数与 `y` 的长度不同时程序 panic.
    /// 3. 训练样本只有一类时, 森林对任何输入都输出该类的概率 (0 或 1).
    pub fn fit(x: ArrayView2<f64>, y: &[bool], params: &ForestParams, seed: u64) -> Result<Self> {
        let (n, p) = x.dim();
        assert_eq!(n, y.len());
        if n == 0 {
            return Err(Error::TooFewSamples(0, 1));
        }

        // 先由主种子派生每棵树的种子, 使结果与是否并行无关.
        let mut rng = StdRng::seed_from_u64(seed);
        let seeds: Vec<u64> = (0..params.n_trees.max(1)).map(|_| rng.gen()).collect();
        let k = params.max_features.resolve(p);

        let grow_one = |s: &u64| {
            let mut rng = StdRng::seed_from_u64(*s);
            let idx: Vec<usize> = if params.bootstrap {
                (0..n).map(|_| rng.gen_range(0..n)).collect()
            } else {
                (0..n).collect()
            };
            grow(x, y, idx, k, params, &mut rng)
        };

        Ok(Self {
            trees: grow_all(&seeds, grow_one),
            n_features: p,
        })
    }

    /// 树的个数.
    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// 单个样本为阳性的概率.
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        assert_eq!(row.len(), self.n_features);
        let sum: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        sum / self.trees.len() as f64
    }

    /// 每一行为阳性的概率.
    ///
    /// # 注意
    ///
    /// `x` 的列数必须与训练时相同, 否则程序 panic.
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Array1<f64> {
        x.rows().into_iter().map(|r| self.predict_row(r)).collect()
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        fn grow_all<F: Fn(&u64) -> Tree + Sync + Send>(seeds: &[u64], grow_one: F) -> Vec<Tree> {
            use rayon::prelude::*;

            seeds.par_iter().map(grow_one).collect()
        }
    } else {
        fn grow_all<F: Fn(&u64) -> Tree>(seeds: &[u64], grow_one: F) -> Vec<Tree> {
            seeds.iter().map(grow_one).collect()
        }
    }
}

#[inline]
fn gini(pos: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let q = pos as f64 / n as f64;
    2.0 * q * (1.0 - q)
}

/// 以显式栈生长一棵树, 避免深树导致的递归过深.
fn grow(
    x: ArrayView2<f64>,
    y: &[bool],
    idx: Vec<usize>,
    k: usize,
    params: &ForestParams,
    rng: &mut StdRng,
) -> Tree {
    let mut nodes = vec![Node::Leaf { p: 0.0 }];
    let mut stack = vec![(0usize, idx, 0usize)];

    while let Some((id, idx, depth)) = stack.pop() {
        let pos = idx.iter().filter(|&&i| y[i]).count();
        let p = pos as f64 / idx.len() as f64;
        let pure = pos == 0 || pos == idx.len();
        let too_deep = params.max_depth.is_some_and(|d| depth >= d);
        if pure || too_deep || idx.len() < params.min_samples_split.max(2) {
            nodes[id] = Node::Leaf { p };
            continue;
        }

        let Some((feature, threshold)) = best_split(x, y, &idx, pos, k, rng) else {
            nodes[id] = Node::Leaf { p };
            continue;
        };
        let (l, r): (Vec<usize>, Vec<usize>) =
            idx.into_iter().partition(|&i| x[(i, feature)] <= threshold);

        let left = nodes.len();
        let right = left + 1;
        nodes.push(Node::Leaf { p });
        nodes.push(Node::Leaf { p });
        nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        stack.push((right, r, depth + 1));
        stack.push((left, l, depth + 1));
    }
    Tree { nodes }
}

/// 在随机抽取的 `k` 个特征中寻找加权 Gini 最小的划分 `(特征, 阈值)`.
/// 所有候选特征在该结点上都取常数时返回 `None`.
fn best_split(
    x: ArrayView2<f64>,
    y: &[bool],
    idx: &[usize],
    total_pos: usize,
    k: usize,
    rng: &mut StdRng,
) -> Option<(usize, f64)> {
    let n = idx.len();
    if x.ncols() == 0 {
        return None;
    }
    let mut best: Option<(f64, usize, f64)> = None;
    let mut column: Vec<(f64, bool)> = Vec::with_capacity(n);

    for f in rand::seq::index::sample(rng, x.ncols(), k).iter() {
        column.clear();
        column.extend(idx.iter().map(|&i| (x[(i, f)], y[i])));
        column.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_pos = 0;
        for s in 1..n {
            if column[s - 1].1 {
                left_pos += 1;
            }
            let (a, b) = (column[s - 1].0, column[s].0);
            if a >= b {
                continue;
            }
            let impurity = (s as f64 * gini(left_pos, s)
                + (n - s) as f64 * gini(total_pos - left_pos, n - s))
                / n as f64;
            if best.map_or(true, |(bi, _, _)| impurity < bi) {
                best = Some((impurity, f, midpoint(a, b)));
            }
        }
    }
    best.map(|(_, f, t)| (f, t))
}

/// `a < b` 之间的划分阈值, 保证 `a <= t < b`.
#[inline]
fn midpoint(a: f64, b: f64) -> f64 {
    let t = a + (b - a) / 2.0;
    if t < b {
        t
    } else {
        a
    }
}
