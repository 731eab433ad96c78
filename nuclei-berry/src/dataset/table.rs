//! 元数据表: 每张图像一行, 记录名称、放大倍率与类别.

use crate::error::{ConfigError, LookupError};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// 显微镜物镜放大倍率, 如 `"20x"`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Magnification(u32);

impl Magnification {
    /// 创建放大倍率. `0` 无意义, 返回 `None`.
    #[inline]
    pub const fn new(value: u32) -> Option<Self> {
        if value == 0 {
            None
        } else {
            Some(Self(value))
        }
    }

    /// 倍率数值.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// 从本倍率缩放到 `target` 的比例因子, 即 `target / self`.
    #[inline]
    pub fn factor_to(&self, target: Magnification) -> f64 {
        target.0 as f64 / self.0 as f64
    }
}

/// 要求末尾恰好有一个 `x` 或 `X`.
impl FromStr for Magnification {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidMagnification(s.to_string());
        let digits = s
            .trim()
            .strip_suffix(['x', 'X'])
            .ok_or_else(invalid)?;
        let value: u32 = digits.parse().map_err(|_| invalid())?;
        Self::new(value).ok_or_else(invalid)
    }
}

impl fmt::Display for Magnification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

impl<'de> Deserialize<'de> for Magnification {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// 元数据表中的一行. 其余列被忽略.
///
/// 同一字段允许多种列名同时出现, 按以下优先级取第一个非空值:
///
/// - 名称: `name`, `Image_Name`, `image_name`;
/// - 放大倍率: `magnification`, `Magnification`;
/// - 类别: `class`, `Testset class`, `class_label`.
#[derive(Clone, Debug, PartialEq)]
pub struct MetaRow {
    /// 图像名称, 与图像/掩码的键一致.
    pub name: String,

    /// 拍摄时的放大倍率.
    pub magnification: Magnification,

    /// 类别标签, 用于分组计算 mAP.
    pub class: String,
}

/// 按列名原样读入的一行.
#[derive(Deserialize)]
struct RawRow {
    name: Option<String>,
    #[serde(rename = "Image_Name")]
    image_name_title: Option<String>,
    image_name: Option<String>,

    magnification: Option<Magnification>,
    #[serde(rename = "Magnification")]
    magnification_title: Option<Magnification>,

    class: Option<String>,
    #[serde(rename = "Testset class")]
    testset_class: Option<String>,
    class_label: Option<String>,
}

impl RawRow {
    fn resolve(self) -> Result<MetaRow, String> {
        let missing = |field: &str| format!("missing column for `{field}`");
        Ok(MetaRow {
            name: self
                .name
                .or(self.image_name_title)
                .or(self.image_name)
                .ok_or_else(|| missing("name"))?,
            magnification: self
                .magnification
                .or(self.magnification_title)
                .ok_or_else(|| missing("magnification"))?,
            class: self
                .class
                .or(self.testset_class)
                .or(self.class_label)
                .ok_or_else(|| missing("class"))?,
        })
    }
}

impl<'de> Deserialize<'de> for MetaRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawRow::deserialize(deserializer)?
            .resolve()
            .map_err(serde::de::Error::custom)
    }
}

/// 元数据表. 行顺序不影响任何计算结果.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetaTable {
    rows: Vec<MetaRow>,
    /// 名称 -> 行号. 名称重复时以第一行为准.
    index: BTreeMap<String, usize>,
}

impl FromIterator<MetaRow> for MetaTable {
    fn from_iter<I: IntoIterator<Item = MetaRow>>(iter: I) -> Self {
        let rows: Vec<MetaRow> = iter.into_iter().collect();
        let mut index = BTreeMap::new();
        for (i, row) in rows.iter().enumerate() {
            index.entry(row.name.clone()).or_insert(i);
        }
        Self { rows, index }
    }
}

impl MetaTable {
    /// 从 CSV 读取. 第一行必须是表头.
    pub fn from_reader<R: Read>(reader: R) -> crate::Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let rows = rdr.deserialize().collect::<Result<Vec<MetaRow>, csv::Error>>()?;
        Ok(rows.into_iter().collect())
    }

    /// 从 CSV 文件读取.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// 行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否为空表.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 遍历所有行.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, MetaRow> {
        self.rows.iter()
    }

    /// 是否含有名为 `name` 的行.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 按名称查找.
    pub fn row(&self, name: &str) -> Result<&MetaRow, LookupError> {
        self.index
            .get(name)
            .map(|&i| &self.rows[i])
            .ok_or_else(|| LookupError::MetaRow(name.to_string()))
    }

    /// 按名称查找放大倍率.
    #[inline]
    pub fn magnification(&self, name: &str) -> Result<Magnification, LookupError> {
        self.row(name).map(|r| r.magnification)
    }

    /// 按类别分组, 类别按字典序排列, 组内保持表中出现顺序.
    pub fn groups_by_class(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for row in self.rows.iter() {
            groups
                .entry(row.class.as_str())
                .or_default()
                .push(row.name.as_str());
        }
        groups
    }

    /// 只保留名称满足 `keep` 的行.
    pub fn filtered(&self, mut keep: impl FnMut(&str) -> bool) -> MetaTable {
        self.rows
            .iter()
            .filter(|r| keep(&r.name))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
Image_Name,Magnification,Testset class,organ
a,20x,tissue,liver
b,40x,cell,brain
c,40X,tissue,kidney
";

    #[test]
    fn test_parse_magnification() {
        assert_eq!("20x".parse::<Magnification>().unwrap().value(), 20);
        assert_eq!(" 40X ".parse::<Magnification>().unwrap().value(), 40);
        assert!("x20".parse::<Magnification>().is_err());
        assert!("20".parse::<Magnification>().is_err());
        assert!("0x".parse::<Magnification>().is_err());
        let m20 = Magnification::new(20).unwrap();
        assert_eq!(m20.factor_to(Magnification::new(40).unwrap()), 2.0);
        assert_eq!(m20.to_string(), "20x");
    }

    #[test]
    fn test_read_csv_with_aliases() {
        let table = MetaTable::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.magnification("b").unwrap().value(), 40);
        assert_eq!(table.row("c").unwrap().class, "tissue");
        assert_eq!(table.row("zzz"), Err(LookupError::MetaRow("zzz".into())));
    }

    #[test]
    fn test_groups_sorted_by_class() {
        let table = MetaTable::from_reader(CSV.as_bytes()).unwrap();
        let groups = table.groups_by_class();
        let keys: Vec<_> = groups.keys().copied().collect();
        assert_eq!(keys, ["cell", "tissue"]);
        assert_eq!(groups["tissue"], ["a", "c"]);
    }

    #[test]
    fn test_read_csv_with_both_spellings() {
        let csv = "\
name,Image_Name,magnification,Magnification,Testset class
img1,img1,20x,20x,tissue
img2,img2,40x,40x,cell
";
        let table = MetaTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.magnification("img1").unwrap().value(), 20);
        assert_eq!(table.row("img2").unwrap().class, "cell");
    }

    #[test]
    fn test_spelling_precedence() {
        let csv = "Image_Name,name,class_label,class,magnification\nlegacy,a,old,new,20x\n";
        let table = MetaTable::from_reader(csv.as_bytes()).unwrap();
        let row = table.row("a").unwrap();
        assert_eq!(row.class, "new");
        assert!(!table.contains("legacy"));
    }

    #[test]
    fn test_missing_column_fails() {
        let csv = "name,class\na,x\n";
        assert!(MetaTable::from_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_bad_magnification_row_fails() {
        let csv = "name,magnification,class\na,twenty,x\n";
        assert!(MetaTable::from_reader(csv.as_bytes()).is_err());
    }
}
