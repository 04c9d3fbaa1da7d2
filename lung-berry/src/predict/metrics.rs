//! 二分类评估指标.

/// ROC 曲线下面积.
///
/// 以 Mann-Whitney U 统计量计算, 并列分数取平均秩. `labels` 只有一类时 AUC
/// 无定义, 返回 `None`.
///
/// # 注意
///
/// `scores` 和 `labels` 长度必须相同, 否则程序 panic.
pub fn roc_auc(scores: &[f64], labels: &[bool]) -> Option<f64> {
    assert_eq!(scores.len(), labels.len());
    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // 秩从 1 开始, 并列组取平均秩.
    let mut pos_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        let pos_in_group = order[start..end].iter().filter(|&&i| labels[i]).count();
        pos_rank_sum += avg_rank * pos_in_group as f64;
        start = end;
    }

    let (p, n) = (n_pos as f64, n_neg as f64);
    Some((pos_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}
