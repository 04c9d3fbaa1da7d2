//! 以子进程运行外部特征提取程序.

use super::{ExtractionOutcome, ExtractionRequest, FeatureExtractor};
use crate::consts::PATIENT_FILTER_ENV;
use crate::report::UnitKey;
use log::debug;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// 外部特征提取程序.
///
/// 调用形式为
///
/// ```text
/// <program> <args..> --dicom_root <image_root> --lesion_mask_root <mask_root> --save_root <output_root>
/// ```
///
/// 并通过环境变量 `PATIENT_FILTER=patient/study/series` 将处理范围限定为单个 unit.
/// 程序应在 `<output_root>/final_merge_feature.csv` 写出特征表.
///
/// # 注意
///
/// 调用是阻塞的, 没有超时. 标准输出被丢弃, 标准错误被完整捕获.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandExtractor {
    program: OsString,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
}

impl Default for CommandExtractor {
    /// `python proc_radiomic_feature.py`.
    fn default() -> Self {
        Self::new("python").arg("proc_radiomic_feature.py")
    }
}

impl CommandExtractor {
    /// 以程序名或路径构建, 不带任何前置参数.
    pub fn new<S: Into<OsString>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// 追加一个前置参数 (位于 `--dicom_root` 之前).
    pub fn arg<S: Into<OsString>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// 追加多个前置参数.
    pub fn args<S: Into<OsString>, I: IntoIterator<Item = S>>(mut self, args: I) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// 设置子进程工作目录.
    pub fn current_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    fn command(&self, key: &UnitKey, request: &ExtractionRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--dicom_root")
            .arg(&request.image_root)
            .arg("--lesion_mask_root")
            .arg(&request.mask_root)
            .arg("--save_root")
            .arg(&request.output_root)
            .env(PATIENT_FILTER_ENV, key.filter_value())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        if let Some(dir) = self.current_dir.as_ref() {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl FeatureExtractor for CommandExtractor {
    fn extract(&self, key: &UnitKey, request: &ExtractionRequest) -> io::Result<ExtractionOutcome> {
        let mut cmd = self.command(key, request);
        debug!("{key}: running {cmd:?}");
        let output = cmd.output()?;
        Ok(ExtractionOutcome {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
