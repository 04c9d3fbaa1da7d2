//! DICOM 序列读取.
//!
//! 这里只做最少的事情: 枚举目录下的文件, 解码像素, 应用 modality LUT
//! 得到 HU 值, 并按 `InstanceNumber` 排序. 无法解码的文件被直接跳过.

use super::CtVolume;
use crate::consts::is_image_candidate;
use crate::error::{Error, IoResultExt, Result};
use dicom_object::open_file;
use dicom_pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder};
use log::debug;
use ndarray::Array2;
use std::fs;
use std::path::{Path, PathBuf};

/// 单个 DICOM 文件解码后的内容.
struct DecodedFile {
    path: PathBuf,
    instance: Option<i32>,
    frames: Vec<Array2<f32>>,
}

impl CtVolume {
    /// 读取 `dir` 下的整个 DICOM 序列.
    ///
    /// 目录下所有可能是影像的文件 (见 [`is_image_candidate`]) 都会被尝试解码, 失败的文件被跳过.
    /// 多帧文件的每一帧都作为一张切片. 切片按 `InstanceNumber` 升序排列,
    /// 缺失该字段的文件排在最后并保持文件名顺序.
    ///
    /// # 错误
    ///
    /// - 目录不存在, 或没有任何可解码的文件: [`Error::NoSeries`];
    /// - 切片形状不一致: [`Error::InconsistentSlices`].
    pub fn open_series<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let files = series_files(dir)?;

        let mut decoded: Vec<DecodedFile> = files
            .into_iter()
            .filter_map(|path| match decode_file(&path) {
                Ok(d) => Some(d),
                Err(e) => {
                    debug!("skipping `{}`: {e}", path.display());
                    None
                }
            })
            .filter(|d| !d.frames.is_empty())
            .collect();

        if decoded.is_empty() {
            return Err(Error::NoSeries(dir.to_owned()));
        }

        // 稳定排序, 相同序号 (或都缺失) 时保持文件名顺序.
        decoded.sort_by_key(|d| (d.instance.is_none(), d.instance));

        let expected = decoded[0].frames[0].dim();
        for d in decoded.iter() {
            if let Some(bad) = d.frames.iter().find(|f| f.dim() != expected) {
                return Err(Error::InconsistentSlices {
                    path: d.path.clone(),
                    expected,
                    found: bad.dim(),
                });
            }
        }

        let slices: Vec<Array2<f32>> = decoded.into_iter().flat_map(|d| d.frames).collect();
        // 上面已检查过形状, 这里不会失败.
        CtVolume::from_slices(&slices).ok_or_else(|| Error::NoSeries(dir.to_owned()))
    }
}

/// 按文件名排序, 列出 `dir` 下的候选影像文件. 目录不存在时视为没有序列.
fn series_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::NoSeries(dir.to_owned()));
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).at(dir)? {
        let path = entry.at(dir)?.path();
        if path.is_file() && is_image_candidate(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// 解码单个文件, 应用 modality LUT (rescale slope/intercept) 得到 HU 值.
fn decode_file(path: &Path) -> std::result::Result<DecodedFile, BoxedError> {
    let obj = open_file(path)?;
    let instance = obj
        .element_by_name("InstanceNumber")
        .ok()
        .and_then(|e| e.to_int::<i32>().ok());

    let decoded = obj.decode_pixel_data()?;
    let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::Default);
    let values: Vec<f32> = decoded.to_vec_with_options::<f32>(&options)?;

    let rows = decoded.rows() as usize;
    let cols = decoded.columns() as usize;
    let frames = decoded.number_of_frames().max(1) as usize;
    let spp = usize::from(decoded.samples_per_pixel().max(1));
    let frame_len = rows * cols * spp;
    if values.len() < frames * frame_len {
        return Err(format!(
            "pixel data too short: {} values for {frames}x{rows}x{cols}x{spp}",
            values.len()
        )
        .into());
    }

    // 多通道时只取第一个采样.
    let frames = (0..frames)
        .map(|f| {
            let base = f * frame_len;
            Array2::from_shape_fn((rows, cols), |(r, c)| values[base + (r * cols + c) * spp])
        })
        .collect();

    Ok(DecodedFile {
        path: path.to_owned(),
        instance,
        frames,
    })
}
