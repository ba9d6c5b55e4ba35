use crate::index::packed::PackedIntArray;
use crate::util::dna::SIGMA;

const EMPTY: u32 = u32::MAX;
const UNSET: u32 = u32::MAX;

/// 后缀排序结果：完整 SA 以及相邻后缀的 LCP。
/// `lcp[i]` 为 SA[i-1] 与 SA[i] 的最长公共前缀；`lcp[0]` 没有前驱，置 0。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixArray {
    pub sa: Vec<u32>,
    pub lcp: Vec<u32>,
}

/// 由 LMS 后缀诱导构建后缀数组，顺带得到 LCP。
/// 输入为数值化文本（0:$,1:N,2:A,3:C,4:G,5:T），必须以唯一的 0 结尾。
pub fn build_sa_lcp(text: &PackedIntArray) -> SuffixArray {
    let n = text.len();
    debug_assert!(n >= 1 && text.get(n - 1) == 0, "text must end with a unique terminator");

    let mut counts = [0usize; SIGMA];
    for i in 0..n {
        counts[text.get(i) as usize] += 1;
    }
    let mut bucket_start = [0usize; SIGMA];
    let mut bucket_end = [0usize; SIGMA];
    let mut acc = 0usize;
    for c in 0..SIGMA {
        bucket_start[c] = acc;
        acc += counts[c];
        bucket_end[c] = acc;
    }

    let (types, mut lms) = collect_lms(text);
    let lms_lcp = sort_lms(text, &mut lms);
    induce(text, &types, &lms, &lms_lcp, &bucket_start, &bucket_end)
}

/// 一次逆向扫描完成 S/L 分类并收集 LMS 位置（按位置递减顺序）。
/// 返回的类型数组中 1 表示 S 型。
pub fn collect_lms(text: &PackedIntArray) -> (PackedIntArray, Vec<u32>) {
    let n = text.len();
    let mut types = PackedIntArray::new(n, 1);
    let mut lms = Vec::new();
    types.set(n - 1, 1);
    let mut next_is_s = true;
    for i in (0..n - 1).rev() {
        let a = text.get(i);
        let b = text.get(i + 1);
        let is_s = a < b || (a == b && next_is_s);
        if is_s {
            types.set(i, 1);
        } else if next_is_s {
            lms.push((i + 1) as u32);
        }
        next_is_s = is_s;
    }
    (types, lms)
}

/// 按首字母分桶后逐层细分，直到每个桶只剩一个后缀。
/// 用显式任务栈 (start, end, depth) 代替递归；返回每个 LMS 后缀与排序后前一个的 LCP。
pub fn sort_lms(text: &PackedIntArray, lms: &mut [u32]) -> Vec<u32> {
    let m = lms.len();
    let mut lcp = vec![0u32; m];
    let mut scratch = vec![0u32; m];
    let mut tasks: Vec<(usize, usize, u32)> = Vec::new();
    if m > 1 {
        tasks.push((0, m, 0));
    }

    while let Some((start, end, depth)) = tasks.pop() {
        let mut counts = [0usize; SIGMA];
        for &p in &lms[start..end] {
            counts[text.get((p + depth) as usize) as usize] += 1;
        }
        let mut next = [0usize; SIGMA];
        let mut acc = start;
        for c in 0..SIGMA {
            next[c] = acc;
            acc += counts[c];
        }
        let offsets = next;

        scratch[start..end].copy_from_slice(&lms[start..end]);
        for &p in &scratch[start..end] {
            let c = text.get((p + depth) as usize) as usize;
            lms[next[c]] = p;
            next[c] += 1;
        }

        // 同一桶内相邻子桶之间恰好在 depth 处分开
        let mut first = true;
        for c in 0..SIGMA {
            if counts[c] == 0 {
                continue;
            }
            let s = offsets[c];
            if !first {
                lcp[s] = depth;
            }
            first = false;
            if counts[c] > 1 {
                tasks.push((s, s + counts[c], depth + 1));
            }
        }
    }
    lcp
}

#[inline]
fn common_prefix(text: &PackedIntArray, a: u32, b: u32) -> u32 {
    // 终止符唯一，两个不同后缀必在其之前失配
    let (a, b) = (a as usize, b as usize);
    let mut k = 0usize;
    while text.get(a + k) == text.get(b + k) {
        k += 1;
    }
    k as u32
}

#[inline]
fn fold_min(min_since: &mut [u32; SIGMA], v: u32) {
    for m in min_since.iter_mut() {
        *m = (*m).min(v);
    }
}

fn induce(
    text: &PackedIntArray,
    types: &PackedIntArray,
    lms: &[u32],
    lms_lcp: &[u32],
    bucket_start: &[usize; SIGMA],
    bucket_end: &[usize; SIGMA],
) -> SuffixArray {
    let n = text.len();
    let mut sa = vec![EMPTY; n];
    let mut lcp = vec![0u32; n];

    // 已排序的 LMS 后缀放到各自桶尾
    let mut tail = *bucket_end;
    for (i, &p) in lms.iter().enumerate().rev() {
        let c = text.get(p as usize) as usize;
        tail[c] -= 1;
        sa[tail[c]] = p;
        lcp[tail[c]] = lms_lcp[i];
    }
    let lms_start = tail;

    // L 型：自左向右。min_since[c] 记录自上次放入桶 c 以来扫过位置的最小 LCP
    let mut head = *bucket_start;
    let mut min_since = [UNSET; SIGMA];
    for i in 0..n {
        let j = sa[i];
        if j == EMPTY {
            continue;
        }
        let ju = j as usize;
        let lcp_prev = if types.get(ju) == 0 {
            lcp[i]
        } else {
            let c = text.get(ju) as usize;
            if i == lms_start[c] {
                // 桶内第一个 LMS，与同桶最后一个 L 型后缀直接比较
                if head[c] > bucket_start[c] { common_prefix(text, sa[head[c] - 1], j) } else { 0 }
            } else {
                lcp[i]
            }
        };
        fold_min(&mut min_since, lcp_prev);

        if ju > 0 && types.get(ju - 1) == 0 {
            let c = text.get(ju - 1) as usize;
            let p = head[c];
            head[c] += 1;
            sa[p] = j - 1;
            lcp[p] = if p == bucket_start[c] { 0 } else { min_since[c] + 1 };
            min_since[c] = UNSET;
        }
    }

    // S 型：清空 S 区后自右向左重新诱导（包括 LMS 本身）
    let s_start = head;
    for c in 1..SIGMA {
        for slot in &mut sa[s_start[c]..bucket_end[c]] {
            *slot = EMPTY;
        }
    }
    let mut tail = *bucket_end;
    let mut min_since = [UNSET; SIGMA];
    for i in (0..n).rev() {
        let j = sa[i];
        debug_assert_ne!(j, EMPTY, "slot {} not filled by induction", i);
        let ju = j as usize;
        if ju > 0 && types.get(ju - 1) == 1 {
            let c = text.get(ju - 1) as usize;
            tail[c] -= 1;
            let p = tail[c];
            sa[p] = j - 1;
            if p + 1 < bucket_end[c] {
                lcp[p + 1] = min_since[c] + 1;
            }
            min_since[c] = UNSET;
            if p == s_start[c] {
                lcp[p] = if p > bucket_start[c] { common_prefix(text, sa[p - 1], j - 1) } else { 0 };
            }
        }
        fold_min(&mut min_since, lcp[i]);
    }

    lcp[0] = 0;
    SuffixArray { sa, lcp }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(ids: &[u8]) -> PackedIntArray {
        let mut t = PackedIntArray::new(ids.len() + 1, 5);
        for (i, &c) in ids.iter().enumerate() {
            t.set(i, u64::from(c));
        }
        t
    }

    fn naive_sa(text: &[u8]) -> Vec<u32> {
        let n = text.len();
        let mut suffixes: Vec<(usize, &[u8])> = (0..n).map(|i| (i, &text[i..])).collect();
        suffixes.sort_by(|a, b| a.1.cmp(b.1));
        suffixes.into_iter().map(|(i, _)| i as u32).collect()
    }

    fn naive_lcp(text: &[u8], sa: &[u32]) -> Vec<u32> {
        let mut lcp = vec![0u32; sa.len()];
        for i in 1..sa.len() {
            let a = &text[sa[i - 1] as usize..];
            let b = &text[sa[i] as usize..];
            lcp[i] = a.iter().zip(b).take_while(|(x, y)| x == y).count() as u32;
        }
        lcp
    }

    fn make_text(len: usize, seed: u32, sigma: u32) -> Vec<u8> {
        let mut x: u32 = seed;
        let mut v = Vec::with_capacity(len);
        for _ in 0..len {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            v.push(2 + ((x >> 16) % sigma) as u8);
        }
        v
    }

    fn check(ids: &[u8]) {
        let mut with_term = ids.to_vec();
        with_term.push(0);
        let res = build_sa_lcp(&pack(ids));
        let expected = naive_sa(&with_term);
        assert_eq!(res.sa, expected, "sa mismatch on {:?}", ids);
        assert_eq!(res.lcp, naive_lcp(&with_term, &expected), "lcp mismatch on {:?}", ids);
    }

    #[test]
    fn sa_basic() {
        // 文本：A C G T A C G T $
        let res = build_sa_lcp(&pack(&[2, 3, 4, 5, 2, 3, 4, 5]));
        assert_eq!(res.sa, vec![8, 4, 0, 5, 1, 6, 2, 7, 3]);
        assert_eq!(res.lcp, vec![0, 0, 4, 0, 3, 0, 2, 0, 1]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unique terminator")]
    fn text_without_terminator_is_rejected_in_debug_builds() {
        let mut text = PackedIntArray::new(3, 5);
        for i in 0..3 {
            text.set(i, 2);
        }
        build_sa_lcp(&text);
    }

    #[test]
    fn lms_classification() {
        // A C G T A C G T $ : S S S L S S S L S
        let text = pack(&[2, 3, 4, 5, 2, 3, 4, 5]);
        let (types, lms) = collect_lms(&text);
        let t: Vec<u64> = (0..9).map(|i| types.get(i)).collect();
        assert_eq!(t, vec![1, 1, 1, 0, 1, 1, 1, 0, 1]);
        assert_eq!(lms, vec![8, 4]);
    }

    #[test]
    fn runs_of_one_symbol() {
        check(&[2]);
        check(&[2, 2, 2, 2]);
        check(&[5; 40]);
        check(&[1, 1, 1, 2, 1, 1]);
    }

    #[test]
    fn periodic_texts() {
        let ac: Vec<u8> = (0..200).map(|i| if i % 2 == 0 { 2 } else { 3 }).collect();
        check(&ac);
        let acg: Vec<u8> = (0..301).map(|i| 2 + (i % 3) as u8).collect();
        check(&acg);
    }

    #[test]
    fn matches_naive_on_small_random_texts() {
        for len in 1..=60 {
            check(&make_text(len, 1_234_567 + len as u32, 4));
        }
    }

    #[test]
    fn matches_naive_with_n_symbols() {
        for seed in 0..20u32 {
            let mut ids = make_text(150, seed, 4);
            for i in (0..ids.len()).step_by(7 + seed as usize) {
                ids[i] = 1;
            }
            check(&ids);
        }
    }

    #[test]
    fn long_repeats_keep_exact_lcp() {
        let unit = make_text(300, 99, 4);
        let mut ids = unit.clone();
        ids.extend_from_slice(&make_text(17, 5, 4));
        ids.extend_from_slice(&unit);
        check(&ids);
        let res = build_sa_lcp(&pack(&ids));
        assert!(res.lcp.iter().any(|&v| v >= 300));
    }
}
