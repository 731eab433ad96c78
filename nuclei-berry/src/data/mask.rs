use crate::consts::label::*;
use crate::error::ShapeError;
use crate::Idx2d;
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Axis};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ops::{Index, IndexMut};

#[cfg(feature = "serde-array")]
use serde::{Deserialize, Serialize};

/// 实例的外接矩形, 左闭右开: `[top, bottom) × [left, right)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BoundingBox {
    /// 最小行索引.
    pub top: usize,
    /// 最大行索引 + 1.
    pub bottom: usize,
    /// 最小列索引.
    pub left: usize,
    /// 最大列索引 + 1.
    pub right: usize,
}

impl BoundingBox {
    /// 从单个像素创建.
    #[inline]
    fn from_pos((h, w): Idx2d) -> Self {
        Self {
            top: h,
            bottom: h + 1,
            left: w,
            right: w + 1,
        }
    }

    /// 扩展使其包含 `(h, w)`.
    #[inline]
    fn include(&mut self, (h, w): Idx2d) {
        self.top = self.top.min(h);
        self.bottom = self.bottom.max(h + 1);
        self.left = self.left.min(w);
        self.right = self.right.max(w + 1);
    }

    /// 高.
    #[inline]
    pub fn height(&self) -> usize {
        self.bottom - self.top
    }

    /// 宽.
    #[inline]
    pub fn width(&self) -> usize {
        self.right - self.left
    }
}

/// 拥有所有权的二维实例掩码.
///
/// `0` 为背景, 每个正整数代表一个独立的细胞核实例. 标签不要求连续.
#[cfg_attr(feature = "serde-array", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceMask {
    data: Array2<u32>,
}

impl From<Array2<u32>> for InstanceMask {
    #[inline]
    fn from(data: Array2<u32>) -> Self {
        Self { data }
    }
}

impl Index<Idx2d> for InstanceMask {
    type Output = u32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx2d> for InstanceMask {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl InstanceMask {
    /// 直接初始化.
    #[inline]
    pub fn new(data: Array2<u32>) -> Self {
        Self { data }
    }

    /// 创建全背景掩码.
    #[inline]
    pub fn background(shape: Idx2d) -> Self {
        Self {
            data: Array2::zeros(shape),
        }
    }

    /// 获得底层数据的不可变视图.
    #[inline]
    pub fn array_view(&self) -> ArrayView2<u32> {
        self.data.view()
    }

    /// 获得底层数据的可变视图.
    #[inline]
    pub fn array_view_mut(&mut self) -> ArrayViewMut2<u32> {
        self.data.view_mut()
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array2<u32> {
        self.data
    }

    /// 掩码的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 掩码的高.
    #[inline]
    pub fn height(&self) -> usize {
        self.shape().0
    }

    /// 掩码的宽.
    #[inline]
    pub fn width(&self) -> usize {
        self.shape().1
    }

    /// 获取给定位置 (高, 宽) 的标签. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<&u32> {
        self.data.get(pos)
    }

    /// 判断一个索引是否合法 (未越界).
    #[inline]
    pub fn check(&self, (h, w): Idx2d) -> bool {
        let (h_len, w_len) = self.shape();
        h < h_len && w < w_len
    }

    /// 是否为全背景?
    #[inline]
    pub fn is_background(&self) -> bool {
        self.data.iter().copied().all(is_background)
    }

    /// 以行优先规则, 获取能迭代所有 `(索引, 标签)` 的迭代器.
    #[inline]
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &u32)> {
        self.data.indexed_iter()
    }

    /// 所有出现过的实例标签 (不含背景), 升序.
    pub fn labels(&self) -> BTreeSet<u32> {
        self.data.iter().copied().filter(|&p| is_instance(p)).collect()
    }

    /// 实例个数.
    #[inline]
    pub fn n_instances(&self) -> usize {
        self.labels().len()
    }

    /// 统计值为 `label` 的像素总数.
    #[inline]
    pub fn count(&self, label: u32) -> usize {
        self.data.iter().filter(|&&p| p == label).count()
    }

    /// 沿轴 `axis` (0 为行, 1 为列) 翻转. 不复制数据.
    #[inline]
    pub fn flip(&mut self, axis: usize) {
        debug_assert!(axis < 2);
        self.data.invert_axis(Axis(axis));
    }

    /// 按 `perm` 置换两个轴. `[1, 0]` 即转置.
    #[inline]
    pub fn permuted(self, perm: [usize; 2]) -> Self {
        Self {
            data: self.data.permuted_axes(perm),
        }
    }

    /// 检查两个掩码形状是否一致.
    pub fn check_same_shape(&self, other: &InstanceMask) -> Result<(), ShapeError> {
        if self.shape() != other.shape() {
            let (h0, w0) = self.shape();
            let (h1, w1) = other.shape();
            return Err(ShapeError::LabelMismatch(vec![h0, w0], vec![h1, w1]));
        }
        Ok(())
    }

    /// 将标签重新编号为 `1..=n` (保持原有相对顺序), 背景仍为 0.
    ///
    /// 返回重新编号后的数组和实例数 `n`.
    pub fn relabel_sequential(&self) -> (Array2<usize>, usize) {
        let lookup: BTreeMap<u32, usize> = self
            .labels()
            .into_iter()
            .enumerate()
            .map(|(i, l)| (l, i + 1))
            .collect();
        let n = lookup.len();
        let data = self
            .data
            .mapv(|p| if is_background(p) { 0 } else { lookup[&p] });
        (data, n)
    }

    /// 每个实例的外接矩形.
    pub fn bounding_boxes(&self) -> BTreeMap<u32, BoundingBox> {
        let mut ans: BTreeMap<u32, BoundingBox> = BTreeMap::new();
        for (pos, &label) in self.indexed_iter().filter(|(_, p)| is_instance(**p)) {
            ans.entry(label)
                .and_modify(|b| b.include(pos))
                .or_insert_with(|| BoundingBox::from_pos(pos));
        }
        ans
    }

    /// 判断 `(h, w)` 的 4-邻域 (越界视为背景) 是否存在不等于自身标签的像素.
    /// 即判断该像素是否位于某实例的轮廓上. 背景像素返回 `false`.
    pub fn is_contour(&self, (h, w): Idx2d) -> bool {
        let me = self[(h, w)];
        if is_background(me) {
            return false;
        }
        let differs = |p: Option<&u32>| p.map_or(true, |&v| v != me);
        differs(self.get((h.wrapping_sub(1), w)))
            || differs(self.get((h.saturating_add(1), w)))
            || differs(self.get((h, w.wrapping_sub(1))))
            || differs(self.get((h, w.saturating_add(1))))
    }

    /// 填补每个实例内部的背景空洞.
    ///
    /// 对每个实例, 在其外接矩形外扩一圈的范围内, 从外围出发以 4-邻接规则泛洪;
    /// 无法从外围到达、又不属于该实例的像素即为空洞, 被填充为该实例标签.
    /// 实例按标签升序写入, 所以若两个实例的填充区域重叠, 标签大的覆盖标签小的.
    pub fn fill_label_holes(&self) -> InstanceMask {
        let mut out = InstanceMask::background(self.shape());
        for (label, bbox) in self.bounding_boxes() {
            // 局部网格四周各多一圈虚拟背景.
            let (gh, gw) = (bbox.height() + 2, bbox.width() + 2);
            let is_me = |(y, x): Idx2d| {
                y >= 1
                    && x >= 1
                    && y <= bbox.height()
                    && x <= bbox.width()
                    && self[(bbox.top + y - 1, bbox.left + x - 1)] == label
            };

            let mut outside = Array2::from_elem((gh, gw), false);
            let mut q = VecDeque::from([(0usize, 0usize)]);
            outside[(0, 0)] = true;
            while let Some((y, x)) = q.pop_front() {
                let neighbours = [
                    (y > 0).then(|| (y - 1, x)),
                    (y + 1 < gh).then_some((y + 1, x)),
                    (x > 0).then(|| (y, x - 1)),
                    (x + 1 < gw).then_some((y, x + 1)),
                ];
                for n in neighbours.into_iter().flatten() {
                    if !outside[n] && !is_me(n) {
                        outside[n] = true;
                        q.push_back(n);
                    }
                }
            }

            for y in 1..=bbox.height() {
                for x in 1..=bbox.width() {
                    if !outside[(y, x)] {
                        out[(bbox.top + y - 1, bbox.left + x - 1)] = label;
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::InstanceMask;
    use ndarray::array;

    #[test]
    fn test_fill_single_hole() {
        let mask = InstanceMask::new(array![
            [0, 0, 0, 0, 0],
            [0, 1, 1, 1, 0],
            [0, 1, 0, 1, 0],
            [0, 1, 1, 1, 0],
            [0, 0, 0, 0, 0],
        ]);
        let filled = mask.fill_label_holes();
        assert_eq!(filled[(2, 2)], 1);
        assert_eq!(filled.count(1), 9);
        assert_eq!(filled.count(0), 16);
    }

    #[test]
    fn test_open_region_untouched() {
        // 缺口与外部相连, 不是空洞.
        let mask = InstanceMask::new(array![
            [1, 1, 1, 0],
            [1, 0, 0, 0],
            [1, 1, 1, 0],
        ]);
        assert_eq!(mask.fill_label_holes(), mask);
    }

    #[test]
    fn test_hole_at_image_border() {
        // 实例贴着图像边缘也能正确识别空洞.
        let mask = InstanceMask::new(array![
            [2, 2, 2],
            [2, 0, 2],
            [2, 2, 2],
        ]);
        let filled = mask.fill_label_holes();
        assert_eq!(filled.count(2), 9);
    }

    #[test]
    fn test_enclosed_instance_higher_label_survives() {
        let mask = InstanceMask::new(array![
            [1, 1, 1],
            [1, 5, 1],
            [1, 1, 1],
        ]);
        // 1 先把中心当作空洞填充, 5 随后覆盖回来.
        assert_eq!(mask.fill_label_holes(), mask);
    }

    #[test]
    fn test_relabel_sequential() {
        let mask = InstanceMask::new(array![[0, 7, 7], [3, 0, 9]]);
        let (data, n) = mask.relabel_sequential();
        assert_eq!(n, 3);
        assert_eq!(data, array![[0, 2, 2], [1, 0, 3]]);
    }

    #[test]
    fn test_contour_and_bbox() {
        let mask = InstanceMask::new(array![
            [1, 1, 0, 2],
            [1, 1, 0, 2],
            [0, 0, 0, 0],
        ]);
        assert!(mask.is_contour((0, 0)));
        assert!(!mask.is_contour((2, 2)));
        assert_eq!(mask.bounding_boxes()[&2].height(), 2);
    }
}
