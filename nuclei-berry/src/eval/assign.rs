//! 矩形代价矩阵上的最优一对一指派 (匈牙利算法, 势函数形式, `O(n^2 m)`).

use ndarray::ArrayView2;

/// 求代价之和最小的一组 (行, 列) 配对, 配对数为 `min(行数, 列数)`.
///
/// 返回值按行号升序排列. 代价必须是有限值.
pub fn linear_sum_assignment(cost: ArrayView2<f64>) -> Vec<(usize, usize)> {
    let (rows, cols) = cost.dim();
    if rows == 0 || cols == 0 {
        return Vec::new();
    }
    if rows > cols {
        let mut ans: Vec<_> = solve(cost.reversed_axes())
            .into_iter()
            .map(|(c, r)| (r, c))
            .collect();
        ans.sort_unstable();
        return ans;
    }
    solve(cost)
}

/// 要求 `rows <= cols`. 内部下标从 1 开始, 第 0 列为虚拟列.
fn solve(cost: ArrayView2<f64>) -> Vec<(usize, usize)> {
    let (n, m) = cost.dim();
    debug_assert!(n <= m);

    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; m + 1];
    // p[j]: 第 j 列当前匹配的行 (0 表示未匹配).
    let mut p = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0;
        let mut minv = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];
        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;
            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let cur = cost[(i0 - 1, j - 1)] - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            for j in 0..=m {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }
        // 沿增广路翻转.
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut ans: Vec<(usize, usize)> = (1..=m)
        .filter(|&j| p[j] != 0)
        .map(|j| (p[j] - 1, j - 1))
        .collect();
    ans.sort_unstable();
    ans
}

/// 一组配对的总代价.
pub fn assignment_cost(cost: ArrayView2<f64>, pairs: &[(usize, usize)]) -> f64 {
    pairs.iter().map(|&pos| cost[pos]).sum()
}
