//! 字符串单元格组成的简单表格, 以及流水线用到的少量关系操作.
//!
//! 特征表的列集合由外部程序决定, 事先未知, 因此这里不使用强类型的行结构,
//! 而是保留原始字符串, 在需要时再转为数值矩阵.

use crate::error::{Error, IoResultExt, Result};
use ndarray::Array2;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// 带表头的二维字符串表格.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl FeatureTable {
    /// 以给定表头创建空表.
    pub fn new<S: Into<String>, I: IntoIterator<Item = S>>(columns: I) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// 追加一行.
    ///
    /// # 注意
    ///
    /// `row` 的长度必须与列数相同, 否则程序 panic.
    pub fn push_row<S: Into<String>, I: IntoIterator<Item = S>>(&mut self, row: I) {
        let row: Vec<String> = row.into_iter().map(Into::into).collect();
        assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    /// 读取带表头的 CSV 文件.
    ///
    /// # 注意
    ///
    /// 1. 空文件 (没有表头) 返回 [`Error::EmptyTable`].
    /// 2. 各行字段数与表头不一致时返回 [`Error::Csv`].
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let csv_err = |source| Error::Csv {
            path: path.to_owned(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(csv_err)?;

        let columns: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(str::to_owned)
            .collect();
        if columns.is_empty() {
            return Err(Error::EmptyTable(path.to_owned()));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            rows.push(record.iter().map(str::to_owned).collect());
        }
        Ok(Self { columns, rows })
    }

    /// 写出为带表头的 CSV 文件, 必要时创建父目录.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }
        let csv_err = |source| Error::Csv {
            path: path.to_owned(),
            source,
        };
        let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
        writer.write_record(&self.columns).map_err(csv_err)?;
        for row in self.rows.iter() {
            writer.write_record(row).map_err(csv_err)?;
        }
        writer.flush().at(path)
    }

    /// 表头.
    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 所有数据行.
    #[inline]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// 行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否没有数据行.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 列 `name` 的位置.
    #[inline]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| Error::MissingColumn(name.to_owned()))
    }

    /// 按行序迭代列 `name` 的单元格.
    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &str> + '_> {
        let idx = self.require(name)?;
        Ok(self.rows.iter().map(move |r| r[idx].as_str()))
    }

    /// 将列 `name` 的每个单元格设为 `value`. 列不存在时追加到末尾.
    pub fn set_constant_column(&mut self, name: &str, value: &str) {
        let n = self.rows.len();
        self.set_column(name, vec![value.to_owned(); n]);
    }

    /// 用 `values` 覆盖列 `name`. 列不存在时追加到末尾.
    ///
    /// # 注意
    ///
    /// `values` 的长度必须与行数相同, 否则程序 panic.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) {
        assert_eq!(values.len(), self.rows.len());
        match self.column_index(name) {
            Some(idx) => {
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row[idx] = v;
                }
            }
            None => {
                self.columns.push(name.to_owned());
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row.push(v);
                }
            }
        }
    }

    /// 仅保留 `names` 中的列, 按 `names` 的顺序排列.
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        let idx = names
            .iter()
            .map(|n| self.require(n))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            columns: names.iter().map(|s| (*s).to_owned()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| idx.iter().map(|&i| r[i].clone()).collect())
                .collect(),
        })
    }

    /// 纵向拼接. 输出列为所有表列的并集 (按首次出现的顺序), 缺失的单元格为空串.
    ///
    /// `tables` 为空时返回 `None`.
    pub fn concat<I: IntoIterator<Item = FeatureTable>>(tables: I) -> Option<Self> {
        let tables: Vec<FeatureTable> = tables.into_iter().collect();
        if tables.is_empty() {
            return None;
        }

        let mut columns: Vec<String> = Vec::new();
        let mut lookup: HashMap<String, usize> = HashMap::new();
        for t in tables.iter() {
            for c in t.columns.iter() {
                if !lookup.contains_key(c) {
                    lookup.insert(c.clone(), columns.len());
                    columns.push(c.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(tables.iter().map(FeatureTable::len).sum());
        for t in tables {
            let targets: Vec<usize> = t.columns.iter().map(|c| lookup[c]).collect();
            for row in t.rows {
                let mut out = vec![String::new(); columns.len()];
                for (cell, &dst) in row.into_iter().zip(targets.iter()) {
                    out[dst] = cell;
                }
                rows.push(out);
            }
        }
        Some(Self { columns, rows })
    }

    /// 内连接 `self.left_key == right.right_key`.
    ///
    /// 输出包含每一对键相同的 (左行, 右行), 先按左行顺序, 再按右行顺序.
    /// 输出列为左表列加右表列; 若两个键同名, 则只保留一份. 其余同名列分别加
    /// `_x` (左) 和 `_y` (右) 后缀. 键为空串的行不参与匹配. 没有匹配的行被丢弃.
    pub fn inner_join(&self, right: &FeatureTable, left_key: &str, right_key: &str) -> Result<Self> {
        let lk = self.require(left_key)?;
        let rk = right.require(right_key)?;
        let shared_key = left_key == right_key;

        // 右表参与输出的列.
        let right_cols: Vec<usize> = (0..right.columns.len())
            .filter(|&i| !(shared_key && i == rk))
            .collect();

        let mut columns = Vec::with_capacity(self.columns.len() + right_cols.len());
        for c in self.columns.iter() {
            if right_cols.iter().any(|&j| &right.columns[j] == c) {
                columns.push(format!("{c}_x"));
            } else {
                columns.push(c.clone());
            }
        }
        for &j in right_cols.iter() {
            let c = &right.columns[j];
            if self.columns.contains(c) {
                columns.push(format!("{c}_y"));
            } else {
                columns.push(c.clone());
            }
        }

        let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, row) in right.rows.iter().enumerate() {
            let key = row[rk].as_str();
            if !key.is_empty() {
                index.entry(key).or_default().push(i);
            }
        }

        let mut rows = Vec::new();
        for left in self.rows.iter() {
            let Some(matches) = index.get(left[lk].as_str()) else {
                continue;
            };
            for &m in matches {
                let mut out = left.clone();
                out.extend(right_cols.iter().map(|&j| right.rows[m][j].clone()));
                rows.push(out);
            }
        }
        Ok(Self { columns, rows })
    }

    /// 将 `names` 中的列转为 `(行数, 列数)` 的数值矩阵.
    /// 空单元格或无法解析的单元格视为 0.
    pub fn numeric_matrix(&self, names: &[&str]) -> Result<Array2<f64>> {
        let idx = names
            .iter()
            .map(|n| self.require(n))
            .collect::<Result<Vec<_>>>()?;
        Ok(Array2::from_shape_fn((self.rows.len(), idx.len()), |(r, c)| {
            parse_or_zero(&self.rows[r][idx[c]])
        }))
    }
}

/// 解析数值单元格. 空串, 非法值和 NaN 均视为 0.
#[inline]
pub fn parse_or_zero(cell: &str) -> f64 {
    match cell.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}
