//! 图像/掩码文件加载器.
//!
//! 提供迭代器风格的数据集获取模式. 目录布局:
//!
//! ```text
//! <split>/
//! ├── images/<name>.<ext>
//! ├── masks/<name>.<ext>
//! └── metadata.csv
//! ```

use super::{MetaTable, SplitRecord};
use crate::data::{InstanceMask, NucleiImage};
use crate::error::{LookupError, Result, ShapeError};
use image::{DynamicImage, ImageBuffer, Pixel};
use ndarray::{Array2, Array3, Axis};
use ndarray_npy::{read_npy, ReadNpyError};
use num::ToPrimitive;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 图像子目录名.
pub const IMAGES_DIR: &str = "images";
/// 掩码子目录名.
pub const MASKS_DIR: &str = "masks";
/// 元数据表文件名.
pub const METADATA_FILE: &str = "metadata.csv";

/// 列出目录下所有文件, 以不含扩展名的文件名为键.
///
/// 同名不同扩展名时, 按完整路径字典序取第一个.
pub(crate) fn index_dir(dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut ans = BTreeMap::new();
    for path in paths {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            ans.entry(stem.to_string()).or_insert(path);
        }
    }
    Ok(ans)
}

/// 把 `ImageBuffer` 的子像素原样转为 `f32`, 不做值域缩放.
fn buffer_to_array<P>(buf: &ImageBuffer<P, Vec<P::Subpixel>>) -> Array3<f32>
where
    P: Pixel,
    P::Subpixel: Into<f32>,
{
    let (w, h) = buf.dimensions();
    let c = P::CHANNEL_COUNT as usize;
    Array3::from_shape_fn((h as usize, w as usize, c), |(y, x, k)| {
        buf.get_pixel(x as u32, y as u32).channels()[k].into()
    })
}

/// 灰度图得到 `(H, W)`, 彩色图得到 `(H, W, C)`. 灰度图的透明通道被丢弃.
fn dynamic_to_image(img: DynamicImage) -> NucleiImage {
    let gray = |arr: Array3<f32>| NucleiImage::from_gray(arr.index_axis_move(Axis(2), 0));
    match img {
        DynamicImage::ImageLuma8(buf) => gray(buffer_to_array(&buf)),
        DynamicImage::ImageLuma16(buf) => gray(buffer_to_array(&buf)),
        DynamicImage::ImageLumaA8(buf) => gray(buffer_to_array(&buf)),
        DynamicImage::ImageLumaA16(buf) => gray(buffer_to_array(&buf)),
        DynamicImage::ImageRgb8(buf) => NucleiImage::from_channels(buffer_to_array(&buf)),
        DynamicImage::ImageRgba8(buf) => NucleiImage::from_channels(buffer_to_array(&buf)),
        DynamicImage::ImageRgb16(buf) => NucleiImage::from_channels(buffer_to_array(&buf)),
        DynamicImage::ImageRgba16(buf) => NucleiImage::from_channels(buffer_to_array(&buf)),
        DynamicImage::ImageRgb32F(buf) => NucleiImage::from_channels(buffer_to_array(&buf)),
        DynamicImage::ImageRgba32F(buf) => NucleiImage::from_channels(buffer_to_array(&buf)),
        other => NucleiImage::from_channels(buffer_to_array(&other.to_rgb32f())),
    }
}

impl NucleiImage {
    /// 从图像文件读取, 保留原始像素值.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let img = image::open(path)?;
        Ok(dynamic_to_image(img))
    }
}

/// 读取 `.npy` 标签数组. 依次尝试 `u32`, `u16`, `u8`, `i32`, `i64`.
/// 负标签按背景处理.
fn read_npy_labels(path: &Path) -> Result<Array2<u32>> {
    fn signed(arr: Array2<i64>, path: &Path) -> Array2<u32> {
        if arr.iter().any(|&v| v < 0) {
            log::warn!("negative labels in {path:?} are treated as background");
        }
        arr.mapv(|v| v.to_u32().unwrap_or(0))
    }

    match read_npy::<_, Array2<u32>>(path) {
        Err(ReadNpyError::WrongDescriptor(_)) => {}
        r => return Ok(r?),
    }
    match read_npy::<_, Array2<u16>>(path) {
        Err(ReadNpyError::WrongDescriptor(_)) => {}
        r => return Ok(r?.mapv(u32::from)),
    }
    match read_npy::<_, Array2<u8>>(path) {
        Err(ReadNpyError::WrongDescriptor(_)) => {}
        r => return Ok(r?.mapv(u32::from)),
    }
    match read_npy::<_, Array2<i32>>(path) {
        Err(ReadNpyError::WrongDescriptor(_)) => {}
        r => return Ok(signed(r?.mapv(i64::from), path)),
    }
    Ok(signed(read_npy::<_, Array2<i64>>(path)?, path))
}

impl InstanceMask {
    /// 从 `.npy` 文件或单通道图像文件 (8/16 位) 读取实例掩码.
    ///
    /// 彩色或带透明通道的图像返回 [`ShapeError::UnsupportedChannels`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let is_npy = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("npy"));
        if is_npy {
            return Ok(Self::new(read_npy_labels(path)?));
        }

        let luma = match image::open(path)? {
            DynamicImage::ImageLuma8(buf) => buffer_to_array(&buf),
            DynamicImage::ImageLuma16(buf) => buffer_to_array(&buf),
            other => {
                let channels = other.color().channel_count() as usize;
                return Err(ShapeError::UnsupportedChannels(channels).into());
            }
        };
        Ok(Self::new(
            luma.index_axis_move(Axis(2), 0).mapv(|v| v as u32),
        ))
    }
}

/// 从名称和目录创建图像/掩码对加载器. 名称按给定顺序迭代.
///
/// # 注意
///
/// `image_dir` 和 `mask_dir` 必须是可读目录, 否则返回 `Err`.
/// 某个名称缺少图像或掩码文件时, 加载器在迭代到该名称时返回 `Err`.
pub fn pair_loader<I, P>(names: I, image_dir: P, mask_dir: P) -> Result<PairLoader>
where
    I: IntoIterator<Item = String>,
    P: AsRef<Path>,
{
    let mut names_rev: Vec<String> = names.into_iter().collect();
    names_rev.reverse();

    Ok(PairLoader {
        images: index_dir(image_dir.as_ref())?,
        masks: index_dir(mask_dir.as_ref())?,
        names_rev,
    })
}

/// 图像/掩码对加载器, 在内部自动查找文件.
#[derive(Debug)]
pub struct PairLoader {
    images: BTreeMap<String, PathBuf>,
    masks: BTreeMap<String, PathBuf>,
    names_rev: Vec<String>,
}

impl PairLoader {
    fn load(&self, name: &str) -> Result<(NucleiImage, InstanceMask)> {
        let image = self
            .images
            .get(name)
            .ok_or_else(|| LookupError::Image(name.to_string()))?;
        let mask = self
            .masks
            .get(name)
            .ok_or_else(|| LookupError::Mask(name.to_string()))?;
        Ok((NucleiImage::open(image)?, InstanceMask::open(mask)?))
    }
}

impl Iterator for PairLoader {
    type Item = (String, Result<(NucleiImage, InstanceMask)>);

    fn next(&mut self) -> Option<Self::Item> {
        let name = self.names_rev.pop()?;
        let data = self.load(&name);
        Some((name, data))
    }
}

impl ExactSizeIterator for PairLoader {
    #[inline]
    fn len(&self) -> usize {
        self.names_rev.len()
    }
}

/// 加载一个划分目录. 名称取自 `images/` 下的文件名.
///
/// 任何一对加载失败, 或加载结果不满足 [`SplitRecord::validate`], 都返回 `Err`.
pub fn load_split<P: AsRef<Path>>(dir: P) -> Result<SplitRecord> {
    let dir = dir.as_ref();
    let table = MetaTable::open(dir.join(METADATA_FILE))?;
    let image_dir = dir.join(IMAGES_DIR);
    let names: Vec<String> = index_dir(&image_dir)?.into_keys().collect();
    log::debug!("loading {} pairs from {dir:?}", names.len());

    let mut images = BTreeMap::new();
    let mut masks = BTreeMap::new();
    for (name, pair) in pair_loader(names, image_dir, dir.join(MASKS_DIR))? {
        let (image, mask) = pair?;
        images.insert(name.clone(), image);
        masks.insert(name, mask);
    }
    SplitRecord::new(images, masks, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
    use ndarray_npy::write_npy;

    fn scratch(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("nuclei-berry-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join(IMAGES_DIR)).unwrap();
        fs::create_dir_all(dir.join(MASKS_DIR)).unwrap();
        dir
    }

    #[test]
    fn test_image_keeps_raw_values() {
        let dir = scratch("raw");
        let path = dir.join("gray.png");
        GrayImage::from_fn(3, 2, |x, y| Luma([(y * 3 + x) as u8 * 10])).save(&path).unwrap();
        let image = NucleiImage::open(&path).unwrap();
        assert_eq!(image.shape(), &[2, 3]);
        assert_eq!(image[&[1, 2][..]], 50.0);

        let path = dir.join("color.png");
        RgbImage::from_pixel(4, 1, Rgb([1, 2, 3])).save(&path).unwrap();
        let image = NucleiImage::open(&path).unwrap();
        assert_eq!(image.shape(), &[1, 4, 3]);
        assert_eq!(image[&[0, 3, 2][..]], 3.0);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_mask_from_png16_and_npy() {
        let dir = scratch("mask");
        let png = dir.join("m.png");
        let buf: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_fn(2, 2, |x, y| Luma([if x == y { 300 } else { 0 }]));
        buf.save(&png).unwrap();
        let mask = InstanceMask::open(&png).unwrap();
        assert_eq!(mask[(1, 1)], 300);
        assert_eq!(mask[(0, 1)], 0);

        let npy = dir.join("m.npy");
        write_npy(&npy, &ndarray::arr2(&[[0i32, 2], [-1, 7]])).unwrap();
        let mask = InstanceMask::open(&npy).unwrap();
        assert_eq!(mask.array_view(), ndarray::arr2(&[[0u32, 2], [0, 7]]).view());
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_color_mask_rejected() {
        let dir = scratch("rgbmask");
        let png = dir.join("m.png");
        RgbImage::from_pixel(2, 2, Rgb([0, 1, 2])).save(&png).unwrap();
        assert!(matches!(
            InstanceMask::open(&png),
            Err(crate::Error::Shape(ShapeError::UnsupportedChannels(3)))
        ));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_load_split() {
        let dir = scratch("split");
        fs::write(
            dir.join(METADATA_FILE),
            "Image_Name,Magnification,Testset class\na,20x,tissue\nb,40x,cell\n",
        )
        .unwrap();
        for name in ["a", "b"] {
            GrayImage::from_pixel(4, 3, Luma([9]))
                .save(dir.join(IMAGES_DIR).join(format!("{name}.png")))
                .unwrap();
            write_npy(
                dir.join(MASKS_DIR).join(format!("{name}.npy")),
                &Array2::<u32>::ones((3, 4)),
            )
            .unwrap();
        }

        let split = load_split(&dir).unwrap();
        assert_eq!(split.names().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(split.mask("b").unwrap().n_instances(), 1);

        // 缺掩码.
        fs::remove_file(dir.join(MASKS_DIR).join("b.npy")).unwrap();
        assert!(load_split(&dir).is_err());
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_loader_len() {
        let dir = scratch("len");
        let mut loader = pair_loader(vec!["x".to_string(), "y".to_string()], dir.join(IMAGES_DIR), dir.join(MASKS_DIR)).unwrap();
        assert_eq!(loader.len(), 2);
        let (name, res) = loader.next().unwrap();
        assert_eq!(name, "x");
        assert!(res.is_err());
        assert_eq!(loader.len(), 1);
        fs::remove_dir_all(dir).unwrap();
    }
}
