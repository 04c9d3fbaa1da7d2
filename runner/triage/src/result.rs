//! 运行结果.

use crate::profile::StageProfile;
use std::io::{self, Write};

/// 将 `profile` 的结果写进 `w` 中.
fn describe_into<W: Write>(name: &str, p: &StageProfile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn rate_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{:.2}%", f * 100.0),
            None => "/".to_string(),
        }
    }

    writeln!(w, "Stage `{name}`:")?;
    if p.get_total() > 0 {
        writeln!(
            w,
            "{S4}{}/{} units successful",
            p.get_succeeded(),
            p.get_total()
        )?;
        writeln!(w, "{S4}Success rate: {}", rate_to_display(p.get_success_rate()))?;
    }
    for note in p.notes() {
        writeln!(w, "{S4}{note}")?;
    }
    write!(w, "{S4}Total machine time: {} ms", p.get_real_time_ms())?;
    Ok(())
}

/// 所有运行阶段的结果, 按运行顺序排列.
#[derive(Debug, Default)]
pub struct TriageResult {
    data: Vec<(&'static str, StageProfile)>,
}

impl TriageResult {
    /// 记录一个阶段.
    #[inline]
    pub fn push(&mut self, stage: &'static str, profile: StageProfile) {
        self.data.push((stage, profile));
    }

    /// 已记录的阶段名.
    pub fn stages(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.data.iter().map(|(s, _)| *s)
    }

    /// 将运行结果写入 `w`, 各阶段以分隔线隔开.
    pub fn analyze_into<W: Write>(&self, mut w: W) -> io::Result<()> {
        utils::sep_to(&mut w)?;
        for (key, profile) in self.data.iter() {
            describe_into(key, profile, &mut w)?;
            writeln!(w)?;
            utils::sep_to(&mut w)?;
        }
        Ok(())
    }

    /// 在标准输出打印运行结果.
    pub fn analyze(&self) -> io::Result<()> {
        self.analyze_into(io::stdout().lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_into() {
        let mut seg = StageProfile::new();
        seg.count(true);
        seg.count(false);
        let mut predict = StageProfile::new();
        predict.note("death: AUC 0.750000");

        let mut result = TriageResult::default();
        result.push("segment", seg.finish());
        result.push("predict", predict.finish());
        assert_eq!(result.stages().collect::<Vec<_>>(), ["segment", "predict"]);

        let mut buf = Vec::new();
        result.analyze_into(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Stage `segment`:\n    1/2 units successful\n"));
        assert!(text.contains("Success rate: 50.00%"));
        assert!(text.contains("    death: AUC 0.750000\n"));
        // predict 阶段没有 unit, 不打印计数.
        assert_eq!(text.matches("units successful").count(), 1);
    }
}
