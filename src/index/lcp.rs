use anyhow::{bail, ensure, Result};
use tracing::{debug, info};

use crate::index::fm::FMIndex;
use crate::index::text::ReferenceText;
use crate::util::progress;

/// 每个 LCP 采样块的槽位数
pub const SAMPLES_PER_BLOCK: usize = 64;
const HALF_BLOCK: usize = SAMPLES_PER_BLOCK / 2;

/// LCP 字节 255 表示真实值在 `big_lcps` 中（包括 -1 与 >= 255 的值）
const BIG_LCP: u8 = u8::MAX;
/// 父指针字节 0 表示真实距离在 `big_links` 中
const BIG_LINK: i8 = 0;

/// 64 个连续采样：截断的 LCP 值与单字节父指针距离（以采样槽位计）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcpBlock {
    /// 本块第一个采样所在的 BWT 位置
    pub base_bwt_pos: u32,
    /// 之前各块中超长 LCP 的个数
    pub big_lcps_before: u32,
    /// 之前各块中超长父指针的个数
    pub big_links_before: u32,
    pub lcps: [u8; SAMPLES_PER_BLOCK],
    pub links: [i8; SAMPLES_PER_BLOCK],
}

/// 采样 LCP 数组 + 父指针。
///
/// 只在 LCP 值发生变化的位置（游程末尾）保存采样，游程内的位置共享其后第一个采样的值。
/// 顶角（下一个采样更深）指向上方最近的更浅顶角；底角（下一个采样更浅）指向
/// 下方第一个"下一个值"更浅的底角。借助这两类指针，包含区间的查询只需沿指针跳跃。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledLcp {
    bwt_len: u32,
    num_samples: u32,
    /// 每 64 个 BWT 位置一个字，置位表示该位置是采样点
    marks: Vec<u64>,
    /// marks[w] 之前的采样数
    marks_before: Vec<u32>,
    blocks: Vec<LcpBlock>,
    big_lcps: Vec<i64>,
    big_links: Vec<i64>,
}

impl SampledLcp {
    /// 压缩 FM 索引构建时得到的 LCP 字节数组，同时计算父指针。
    /// 字节为 255 的位置借助文本与 `position_in_text` 从第 255 个字符起重新比较得到精确值。
    /// `min_lcp` 只影响统计输出（深度不小于它的采样个数）。
    pub fn build(
        text: &ReferenceText,
        fm: &FMIndex,
        lcp_bytes: &[u8],
        min_lcp: u32,
        verbose: bool,
    ) -> Result<Self> {
        let bwt_len = fm.bwt_len();
        let n = bwt_len as usize;
        ensure!(
            lcp_bytes.len() == n,
            "LCP array has {} entries but the BWT has {} positions",
            lcp_bytes.len(),
            n
        );

        let exact_lcp = |p: usize| -> i64 {
            if p == 0 || p >= n {
                return -1;
            }
            let b = lcp_bytes[p];
            if b != BIG_LCP {
                return i64::from(b);
            }
            let a = fm.position_in_text(p as u32 - 1);
            let c = fm.position_in_text(p as u32);
            let mut k = u32::from(BIG_LCP);
            while text.char_id_at(a + k) == text.char_id_at(c + k) {
                k += 1;
            }
            i64::from(k)
        };

        let pb = progress::bar(verbose, n as u64, "sampling LCP array");
        let mut marks = vec![0u64; n / 64 + 1];
        let mut values: Vec<i64> = Vec::new();
        let mut links: Vec<i64> = Vec::new();
        let mut base_positions: Vec<u32> = Vec::new();
        // (采样序号, 自身 LCP)
        let mut open_tops: Vec<(usize, i64)> = Vec::new();
        // (采样序号, 下一个采样的 LCP)
        let mut open_bottoms: Vec<(usize, i64)> = Vec::new();

        let mut cur = -1i64;
        for p in 0..n {
            let next = exact_lcp(p + 1);
            if cur != next {
                let k = values.len();
                marks[p / 64] |= 1u64 << (p % 64);
                if k % SAMPLES_PER_BLOCK == 0 {
                    base_positions.push(p as u32);
                }
                values.push(cur);
                links.push(0);
                if next > cur {
                    if let Some(&(j, _)) = open_tops.last() {
                        links[k] = j as i64 - k as i64;
                    }
                    open_tops.push((k, cur));
                } else {
                    while let Some(&(j, v)) = open_bottoms.last() {
                        if v <= next {
                            break;
                        }
                        links[j] = k as i64 - j as i64;
                        open_bottoms.pop();
                    }
                    open_bottoms.push((k, next));
                    while open_tops.last().is_some_and(|&(_, v)| v >= next) {
                        open_tops.pop();
                    }
                }
            }
            cur = next;
            if p % 65_536 == 0 {
                pb.set_position(p as u64);
            }
        }
        pb.finish_and_clear();

        if !open_tops.is_empty() || open_bottoms.len() != 1 {
            bail!(
                "bad corners connection: {} open top corners and {} open bottom corners left",
                open_tops.len(),
                open_bottoms.len()
            );
        }

        let mut marks_before = Vec::with_capacity(marks.len());
        let mut acc = 0u32;
        for &w in &marks {
            marks_before.push(acc);
            acc += w.count_ones();
        }

        let mut blocks = Vec::with_capacity(values.len() / SAMPLES_PER_BLOCK + 1);
        let mut big_lcps = Vec::new();
        let mut big_links = Vec::new();
        for (bi, chunk) in values.chunks(SAMPLES_PER_BLOCK).enumerate() {
            let mut block = LcpBlock {
                base_bwt_pos: base_positions[bi],
                big_lcps_before: big_lcps.len() as u32,
                big_links_before: big_links.len() as u32,
                lcps: [0; SAMPLES_PER_BLOCK],
                links: [0; SAMPLES_PER_BLOCK],
            };
            for (slot, &v) in chunk.iter().enumerate() {
                if (0..i64::from(BIG_LCP)).contains(&v) {
                    block.lcps[slot] = v as u8;
                } else {
                    block.lcps[slot] = BIG_LCP;
                    big_lcps.push(v);
                }
                let d = links[bi * SAMPLES_PER_BLOCK + slot];
                if d != 0 && d > i64::from(i8::MIN) && d <= i64::from(i8::MAX) {
                    block.links[slot] = d as i8;
                } else {
                    block.links[slot] = BIG_LINK;
                    big_links.push(d);
                }
            }
            blocks.push(block);
        }

        let lcp = Self {
            bwt_len,
            num_samples: values.len() as u32,
            marks,
            marks_before,
            blocks,
            big_lcps,
            big_links,
        };
        if verbose {
            let deep = values.iter().filter(|&&v| v >= i64::from(min_lcp)).count();
            info!(
                "sampled LCP: {} samples ({:.2}% of {} positions), {:.2} MB, {} samples at depth >= {}",
                lcp.num_samples,
                100.0 * lcp.num_samples as f64 / n as f64,
                n,
                lcp.size_in_bytes() as f64 / (1 << 20) as f64,
                deep,
                min_lcp
            );
            debug!("oversized values: {} LCPs, {} parent pointers", lcp.big_lcps.len(), lcp.big_links.len());
        }
        Ok(lcp)
    }

    pub fn num_samples(&self) -> u32 {
        self.num_samples
    }

    pub fn blocks(&self) -> &[LcpBlock] {
        &self.blocks
    }

    /// 超长 LCP 与超长父指针的条目数
    pub fn oversized_counts(&self) -> (usize, usize) {
        (self.big_lcps.len(), self.big_links.len())
    }

    pub fn size_in_bytes(&self) -> usize {
        self.marks.len() * std::mem::size_of::<u64>()
            + self.marks_before.len() * std::mem::size_of::<u32>()
            + self.blocks.len() * std::mem::size_of::<LcpBlock>()
            + (self.big_lcps.len() + self.big_links.len()) * std::mem::size_of::<i64>()
    }

    /// 位置 pos 所在游程的采样序号（即 pos 之前的采样个数）
    #[inline]
    fn sample_index(&self, pos: u32) -> u32 {
        let p = pos as usize;
        let below = (1u64 << (p % 64)) - 1;
        self.marks_before[p / 64] + (self.marks[p / 64] & below).count_ones()
    }

    /// 在块内定位超长值在侧表中的下标；后半块从下一块的计数往回数
    fn side_index(
        &self,
        k: usize,
        is_big: impl Fn(&LcpBlock, usize) -> bool,
        before: impl Fn(&LcpBlock) -> u32,
    ) -> usize {
        let bi = k / SAMPLES_PER_BLOCK;
        let slot = k % SAMPLES_PER_BLOCK;
        let block = &self.blocks[bi];
        if slot >= HALF_BLOCK {
            if let Some(next) = self.blocks.get(bi + 1) {
                let after = (slot..SAMPLES_PER_BLOCK).filter(|&s| is_big(block, s)).count();
                return before(next) as usize - after;
            }
        }
        before(block) as usize + (0..slot).filter(|&s| is_big(block, s)).count()
    }

    #[inline]
    fn sample_value(&self, k: u32) -> i64 {
        let k = k as usize;
        let b = self.blocks[k / SAMPLES_PER_BLOCK].lcps[k % SAMPLES_PER_BLOCK];
        if b != BIG_LCP {
            return i64::from(b);
        }
        let i = self.side_index(k, |blk, s| blk.lcps[s] == BIG_LCP, |blk| blk.big_lcps_before);
        self.big_lcps[i]
    }

    #[inline]
    fn sample_link(&self, k: u32) -> i64 {
        let k = k as usize;
        let d = self.blocks[k / SAMPLES_PER_BLOCK].links[k % SAMPLES_PER_BLOCK];
        if d != BIG_LINK {
            return i64::from(d);
        }
        let i = self.side_index(k, |blk, s| blk.links[s] == BIG_LINK, |blk| blk.big_links_before);
        self.big_links[i]
    }

    #[inline]
    fn next_value(&self, k: u32) -> i64 {
        if k + 1 >= self.num_samples {
            -1
        } else {
            self.sample_value(k + 1)
        }
    }

    #[inline]
    fn follow_link(&self, k: u32) -> u32 {
        (i64::from(k) + self.sample_link(k)) as u32
    }

    /// 第 k 个采样的 BWT 位置：从所在块的基准位置开始在累计计数上二分，再在字内定位。
    pub fn sample_position(&self, k: u32) -> u32 {
        let block = &self.blocks[k as usize / SAMPLES_PER_BLOCK];
        let first_word = block.base_bwt_pos as usize / 64;
        let w = first_word + self.marks_before[first_word..].partition_point(|&c| c <= k) - 1;
        let mut bits = self.marks[w];
        for _ in 0..(k - self.marks_before[w]) {
            bits &= bits - 1;
        }
        (w * 64) as u32 + bits.trailing_zeros()
    }

    /// BWT 位置 pos 与 pos-1 两个后缀的 LCP；位置 0 与虚拟位置 bwt_len 为 -1。
    #[inline]
    pub fn lcp(&self, pos: u32) -> i64 {
        if pos >= self.bwt_len {
            return -1;
        }
        self.sample_value(self.sample_index(pos))
    }

    /// 最大的 t <= pos 使 LCP[t] < depth（要求 LCP[pos] >= depth）。
    fn interval_top(&self, pos: u32, depth: i64) -> u32 {
        let mut k = self.sample_index(pos);
        loop {
            if self.next_value(k) > self.sample_value(k) {
                // 顶角：父指针跳过的位置 LCP 都不小于当前值
                let j = self.follow_link(k);
                if self.sample_value(j) < depth {
                    return self.sample_position(j);
                }
                k = j;
            } else {
                k -= 1;
                if self.sample_value(k) < depth {
                    return self.sample_position(k);
                }
            }
        }
    }

    /// 最大的 b >= pos-1 使 LCP[pos..=b] 都不小于 depth（要求 LCP[pos] >= depth）。
    fn interval_bottom(&self, pos: u32, depth: i64) -> u32 {
        let mut k = self.sample_index(pos);
        loop {
            let next = self.next_value(k);
            if next < depth {
                return self.sample_position(k);
            }
            if next < self.sample_value(k) {
                k = self.follow_link(k);
            } else {
                k += 1;
            }
        }
    }

    /// 把闭区间 `[top, bottom]`（可以只含一个位置）原地替换为包含它的最小的更浅区间，
    /// 返回该区间的深度。已经是整个 BWT 时返回 -1，区间为 `[0, bwt_len-1]`。
    pub fn enclosing_interval(&self, top: &mut u32, bottom: &mut u32) -> i64 {
        let top_lcp = self.lcp(*top);
        let below_lcp = self.lcp(*bottom + 1);
        let depth = top_lcp.max(below_lcp);
        if depth < 0 {
            *top = 0;
            *bottom = self.bwt_len - 1;
            return -1;
        }
        if top_lcp >= depth {
            *top = self.interval_top(*top, depth);
        }
        if below_lcp >= depth {
            *bottom = self.interval_bottom(*bottom + 1, depth);
        }
        depth
    }
}
