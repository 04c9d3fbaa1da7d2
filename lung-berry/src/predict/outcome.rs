//! 临床结局标签.

/// 把临床表中的一个单元格转为二值标签的规则.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelRule {
    /// 真值判定: 向零取整后非零的数值, 或 (忽略大小写) `true` / `yes`.
    /// 因此 `0.5` 为阴性, `1.5` 为阳性.
    Truthy,

    /// 与给定字符串完全相等 (区分大小写, 忽略首尾空白).
    Equals(String),
}

impl LabelRule {
    /// `cell` 是否为阳性.
    pub fn label(&self, cell: &str) -> bool {
        let cell = cell.trim();
        match self {
            Self::Truthy => match cell.parse::<f64>() {
                Ok(v) => !v.is_nan() && v.trunc() != 0.0,
                Err(_) => {
                    cell.eq_ignore_ascii_case("true") || cell.eq_ignore_ascii_case("yes")
                }
            },
            Self::Equals(s) => cell == s,
        }
    }
}

/// 一个待预测的结局: 由临床表的 `source` 列经 `rule` 派生出名为 `name` 的 0/1 列.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutcomeSpec {
    /// 结局名, 也是派生列名. 概率列为 `<name>_probability`.
    pub name: String,

    /// 临床表中的原始列.
    pub source: String,

    /// 标签规则.
    pub rule: LabelRule,
}

impl OutcomeSpec {
    /// 构建.
    pub fn new(name: impl Into<String>, source: impl Into<String>, rule: LabelRule) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            rule,
        }
    }

    /// 概率列名.
    #[inline]
    pub fn probability_column(&self) -> String {
        format!("{}_probability", self.name)
    }

    /// 三个默认结局: ICU 入院, 机械通气, 死亡.
    pub fn defaults() -> Vec<OutcomeSpec> {
        vec![
            Self::new("icu_admission", "is_icu", LabelRule::Truthy),
            Self::new(
                "mechanical_ventilation",
                "was_ventilated",
                LabelRule::Equals("Yes".into()),
            ),
            Self::new("death", "last.status", LabelRule::Equals("deceased".into())),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthy() {
        let r = LabelRule::Truthy;
        for yes in ["1", "1.0", " 2 ", "1.5", "-1", "True", "true", "YES"] {
            assert!(r.label(yes), "{yes}");
        }
        for no in ["0", "0.0", "0.5", "-0.9", "", "False", "no", "nan", "maybe"] {
            assert!(!r.label(no), "{no}");
        }
    }

    #[test]
    fn test_equals() {
        let r = LabelRule::Equals("Yes".into());
        assert!(r.label("Yes"));
        assert!(r.label(" Yes "));
        assert!(!r.label("yes"));
        assert!(!r.label("No"));
    }

    #[test]
    fn test_defaults() {
        let d = OutcomeSpec::defaults();
        let names: Vec<_> = d.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["icu_admission", "mechanical_ventilation", "death"]);
        assert_eq!(d[2].source, "last.status");
        assert_eq!(d[0].probability_column(), "icu_admission_probability");
    }
}
