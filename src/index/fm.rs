use anyhow::{bail, Result};
use tracing::info;

use crate::index::bwt::build_bwt;
use crate::index::packed::PackedIntArray;
use crate::index::sa::{build_sa_lcp, SuffixArray};
use crate::index::text::{Contig, ReferenceText};
use crate::util::dna::{SIGMA, TERMINATOR};
use crate::util::progress;

/// 每个索引块覆盖的 BWT 位置数
pub const BLOCK_LEN: usize = 32;

/// 一个索引块：32 个 BWT 字符按位平面存储，外加块前累计计数与一个文本位置采样。
///
/// 字符编码：special 平面为 1 表示 `$`/N（low 位区分：$=0, N=1）；
/// 否则 low/high 两位给出 A=00, C=01, G=10, T=11。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexBlock {
    pub bwt_low_bits: u32,
    pub bwt_high_bits: u32,
    pub special_letters_mask: u32,
    /// N/A/C/G/T 在本块之前的出现次数（不含本块）
    pub letter_counts: [u32; SIGMA - 1],
    /// 本块第一个位置对应的文本偏移
    pub text_pos_sample: u32,
}

impl IndexBlock {
    #[inline]
    fn letter_mask(&self, c: u8) -> u32 {
        let (plane, code) = if c < 2 {
            (self.special_letters_mask, c)
        } else {
            (!self.special_letters_mask, c - 2)
        };
        let low = if code & 1 != 0 { self.bwt_low_bits } else { !self.bwt_low_bits };
        let high = if code & 2 != 0 { self.bwt_high_bits } else { !self.bwt_high_bits };
        plane & low & high
    }

    #[inline]
    fn letter_at(&self, offset: usize) -> u8 {
        let code = ((self.bwt_low_bits >> offset) & 1) | (((self.bwt_high_bits >> offset) & 1) << 1);
        if (self.special_letters_mask >> offset) & 1 != 0 {
            code as u8
        } else {
            code as u8 + 2
        }
    }

    fn push_letter(&mut self, offset: usize, c: u8) {
        let bit = 1u32 << offset;
        let code = if c < 2 {
            self.special_letters_mask |= bit;
            c
        } else {
            c - 2
        };
        if code & 1 != 0 {
            self.bwt_low_bits |= bit;
        }
        if code & 2 != 0 {
            self.bwt_high_bits |= bit;
        }
    }
}

/// 分块 FM 索引：
/// - 字母表固定为 {$, N, A, C, G, T}，编码 0..6；
/// - 每 32 个 BWT 位置一个 [`IndexBlock`]，末尾额外一个只含总计数的块，
///   使 `occ(c, bwt_len)` 也能直接查块；
/// - 不保存完整 SA，文本位置通过 LF 回溯到最近的块首采样恢复。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FMIndex {
    /// C[i] = 文本（含终止符）中字母 < i 的累计数量
    c: [u32; SIGMA],
    blocks: Vec<IndexBlock>,
    bwt_len: u32,
    /// contig 元信息（起始偏移、长度），单序列时只有一项
    contigs: Vec<Contig>,
}

impl FMIndex {
    /// 从参考文本构建索引，同时返回每个 BWT 位置的 LCP 字节数组（超过 254 的记为 255，
    /// 位置 0 没有前驱，同样记为 255）。
    pub fn build(text: &ReferenceText, verbose: bool) -> Result<(Self, Vec<u8>)> {
        let len = text.len();
        if len == 0 {
            bail!("cannot index an empty text");
        }
        if len == u32::MAX {
            bail!("text of {} characters is too large to index", len);
        }
        let n = len as usize + 1;

        let pb = progress::spinner(verbose, "staging text");
        let mut packed = PackedIntArray::new(n, (SIGMA - 1) as u64);
        for i in 0..len {
            packed.set(i as usize, u64::from(text.char_id_at(i)));
        }
        pb.set_message("sorting suffixes");
        let SuffixArray { sa, lcp } = build_sa_lcp(&packed);
        pb.set_message("building BWT");
        let bwt = build_bwt(&packed, &sa);
        drop(packed);
        let mut lcp_bytes: Vec<u8> = lcp.iter().map(|&v| v.min(u32::from(u8::MAX)) as u8).collect();
        lcp_bytes[0] = u8::MAX;
        drop(lcp);
        pb.finish_and_clear();

        let fm = Self::from_bwt(&bwt, &sa, text.contigs(), verbose);
        if verbose {
            let mut runs = 1usize;
            for i in 1..n {
                if bwt.get(i) != bwt.get(i - 1) {
                    runs += 1;
                }
            }
            info!(
                "FM index: {} BWT positions, {} blocks, {:.2} MB, avg run length {:.2}",
                n,
                fm.blocks.len(),
                fm.size_in_bytes() as f64 / (1 << 20) as f64,
                n as f64 / runs as f64
            );
        }
        Ok((fm, lcp_bytes))
    }

    /// 由暂存的 BWT 与 SA 填充索引块；块计数在处理完块首位置之前就已确定。
    pub fn from_bwt(bwt: &PackedIntArray, sa: &[u32], contigs: Vec<Contig>, verbose: bool) -> Self {
        let n = sa.len();
        let num_blocks = n / BLOCK_LEN + 1;
        let pb = progress::bar(verbose, num_blocks as u64, "filling index blocks");

        let mut freq = [0u32; SIGMA];
        let mut blocks = Vec::with_capacity(num_blocks);
        for bi in 0..num_blocks {
            let start = bi * BLOCK_LEN;
            let end = (start + BLOCK_LEN).min(n);
            let mut block = IndexBlock {
                letter_counts: [freq[1], freq[2], freq[3], freq[4], freq[5]],
                text_pos_sample: if start < n { sa[start] } else { 0 },
                ..IndexBlock::default()
            };
            for p in start..end {
                let ch = bwt.get(p) as u8;
                block.push_letter(p - start, ch);
                freq[ch as usize] += 1;
            }
            blocks.push(block);
            pb.inc(1);
        }
        pb.finish_and_clear();

        let mut c = [0u32; SIGMA];
        let mut acc = 0u32;
        for i in 0..SIGMA {
            c[i] = acc;
            acc += freq[i];
        }
        Self { c, blocks, bwt_len: n as u32, contigs }
    }

    /// BWT 长度（文本长度 + 1）
    #[inline]
    pub fn bwt_len(&self) -> u32 {
        self.bwt_len
    }

    /// 最后一个 BWT 位置；完整区间为 `[0, bwt_size()]`
    #[inline]
    pub fn bwt_size(&self) -> u32 {
        self.bwt_len - 1
    }

    pub fn contigs(&self) -> &[Contig] {
        &self.contigs
    }

    pub fn blocks(&self) -> &[IndexBlock] {
        &self.blocks
    }

    pub fn size_in_bytes(&self) -> usize {
        self.blocks.len() * std::mem::size_of::<IndexBlock>()
            + self.contigs.len() * std::mem::size_of::<Contig>()
    }

    #[inline]
    pub fn char_at(&self, pos: u32) -> u8 {
        let p = pos as usize;
        self.blocks[p / BLOCK_LEN].letter_at(p % BLOCK_LEN)
    }

    #[inline]
    pub fn occ(&self, c: u8, pos: u32) -> u32 {
        // 返回 BWT[0..pos) 中 c 的出现次数（c 不能是终止符）
        let p = pos as usize;
        let block = &self.blocks[p / BLOCK_LEN];
        let below = (1u32 << (p % BLOCK_LEN)) - 1;
        block.letter_counts[c as usize - 1] + (block.letter_mask(c) & below).count_ones()
    }

    /// LF 映射：位置 pos 的后缀左移一个字符后所在的 BWT 位置；BWT[pos] 为终止符时返回 None。
    #[inline]
    pub fn lf(&self, pos: u32) -> Option<u32> {
        let ch = self.char_at(pos);
        if ch == TERMINATOR {
            return None;
        }
        Some(self.c[ch as usize] + self.occ(ch, pos))
    }

    /// 在闭区间 `[top, bottom]` 前扩展字符 `c`。成功时原地更新区间并返回新区间大小；
    /// 失败（含 `c` 为终止符）返回 0，区间保持不变。
    #[inline]
    pub fn follow_letter(&self, c: u8, top: &mut u32, bottom: &mut u32) -> u32 {
        if c == TERMINATOR || c as usize >= SIGMA {
            return 0;
        }
        let base = self.c[c as usize];
        let new_top = base + self.occ(c, *top);
        let new_end = base + self.occ(c, *bottom + 1);
        if new_end <= new_top {
            return 0;
        }
        *top = new_top;
        *bottom = new_end - 1;
        new_end - new_top
    }

    /// 反向搜索精确匹配，pat 已经是编码后的字母表，返回闭区间
    pub fn backward_search(&self, pat: &[u8]) -> Option<(u32, u32)> {
        let mut top = 0u32;
        let mut bottom = self.bwt_size();
        for &a in pat.iter().rev() {
            if self.follow_letter(a, &mut top, &mut bottom) == 0 {
                return None;
            }
        }
        Some((top, bottom))
    }

    /// BWT 位置对应的文本偏移：沿 LF 回溯到最近经过的块首位置，加上该块的文本位置采样。
    pub fn position_in_text(&self, pos: u32) -> u32 {
        let mut pos = pos;
        let mut steps = 0u32;
        while pos as usize % BLOCK_LEN != 0 {
            match self.lf(pos) {
                Some(next) => pos = next,
                None => return steps,
            }
            steps += 1;
        }
        self.blocks[pos as usize / BLOCK_LEN].text_pos_sample + steps
    }

    /// 闭区间 `[top, bottom]` 内各字母的出现次数，按字母编码索引
    pub fn char_counts(&self, top: u32, bottom: u32) -> [u32; SIGMA] {
        let mut counts = [0u32; SIGMA];
        let mut letters = 0u32;
        for c in 1..SIGMA as u8 {
            let k = self.occ(c, bottom + 1) - self.occ(c, top);
            counts[c as usize] = k;
            letters += k;
        }
        counts[TERMINATOR as usize] = bottom - top + 1 - letters;
        counts
    }

    /// 将文本位置映射到 (contig_index, contig_offset)。若落在分隔符位置，则返回 None。
    pub fn map_text_pos(&self, pos: u32) -> Option<(usize, u32)> {
        if self.contigs.is_empty() {
            return None;
        }
        let mut lo = 0usize;
        let mut hi = self.contigs.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let c = &self.contigs[mid];
            if pos < c.offset {
                hi = mid;
            } else if pos >= c.offset + c.len {
                lo = mid + 1;
            } else {
                return Some((mid, pos - c.offset));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::dna;

    fn make_reference(len: usize, seed: u32) -> Vec<u8> {
        let bases = [b'A', b'C', b'G', b'T'];
        let mut x: u32 = seed;
        (0..len)
            .map(|_| {
                x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                bases[(x >> 16) as usize % 4]
            })
            .collect()
    }

    fn build_test_fm(seq: &[u8]) -> (FMIndex, Vec<u8>) {
        let text = ReferenceText::new(vec![seq.to_vec()]).unwrap();
        FMIndex::build(&text, false).unwrap()
    }

    fn naive_sa(seq: &[u8]) -> Vec<u32> {
        let mut ids: Vec<u8> = seq.iter().map(|&b| dna::to_alphabet(b)).collect();
        ids.push(0);
        let mut sa: Vec<u32> = (0..ids.len() as u32).collect();
        sa.sort_by(|&a, &b| ids[a as usize..].cmp(&ids[b as usize..]));
        sa
    }

    fn occurrences(seq: &[u8], pat: &[u8]) -> Vec<u32> {
        (0..=seq.len() - pat.len())
            .filter(|&i| &seq[i..i + pat.len()] == pat)
            .map(|i| i as u32)
            .collect()
    }

    #[test]
    fn bwt_chars_and_positions_match_naive() {
        for &len in &[1usize, 5, 31, 32, 33, 100, 257] {
            let seq = make_reference(len, 7 + len as u32);
            let (fm, _) = build_test_fm(&seq);
            let sa = naive_sa(&seq);
            assert_eq!(fm.bwt_len() as usize, len + 1);
            for (i, &p) in sa.iter().enumerate() {
                let expected = if p == 0 { 0 } else { dna::to_alphabet(seq[p as usize - 1]) };
                assert_eq!(fm.char_at(i as u32), expected, "char at {} (len {})", i, len);
                assert_eq!(fm.position_in_text(i as u32), p, "position at {} (len {})", i, len);
            }
        }
    }

    #[test]
    fn trailing_block_holds_totals() {
        // 31 个字符 + 终止符 = 32 个位置，末尾块从 32 开始
        let seq = make_reference(31, 3);
        let (fm, _) = build_test_fm(&seq);
        assert_eq!(fm.blocks().len(), 2);
        let last = fm.blocks()[1];
        let total: u32 = last.letter_counts.iter().sum();
        assert_eq!(total, 31);
        for c in 1..SIGMA as u8 {
            assert_eq!(fm.occ(c, fm.bwt_len()), last.letter_counts[c as usize - 1]);
        }
    }

    #[test]
    fn backward_search_round_trip() {
        let seq = make_reference(300, 11);
        let (fm, _) = build_test_fm(&seq);
        for start in (0..280).step_by(13) {
            for len in [1usize, 2, 5, 12, 20] {
                let pat = &seq[start..start + len];
                let ids: Vec<u8> = pat.iter().map(|&b| dna::to_alphabet(b)).collect();
                let (top, bottom) = fm.backward_search(&ids).expect("substring must be found");
                let mut found: Vec<u32> = (top..=bottom).map(|p| fm.position_in_text(p)).collect();
                found.sort_unstable();
                assert_eq!(found, occurrences(&seq, pat));
            }
        }
    }

    #[test]
    fn follow_letter_rejects_terminator_and_absent_letters() {
        let (fm, _) = build_test_fm(b"ACGTACGT");
        let (mut top, mut bottom) = (0, fm.bwt_size());
        assert_eq!(fm.follow_letter(TERMINATOR, &mut top, &mut bottom), 0);
        assert_eq!(fm.follow_letter(dna::N, &mut top, &mut bottom), 0);
        assert_eq!((top, bottom), (0, fm.bwt_size()));
        assert_eq!(fm.follow_letter(dna::to_alphabet(b'T'), &mut top, &mut bottom), 2);
        assert_eq!(fm.follow_letter(dna::to_alphabet(b'G'), &mut top, &mut bottom), 2);
        assert_eq!(fm.follow_letter(dna::to_alphabet(b'A'), &mut top, &mut bottom), 0);
    }

    #[test]
    fn char_counts_over_interval() {
        let (fm, _) = build_test_fm(b"AANCGTTN");
        let counts = fm.char_counts(0, fm.bwt_size());
        assert_eq!(counts, [1, 2, 2, 1, 1, 2]);
        let (top, bottom) = fm.backward_search(&[dna::to_alphabet(b'T')]).unwrap();
        let counts = fm.char_counts(top, bottom);
        // 两个 T 之前分别是 G 与 T
        assert_eq!(counts[dna::to_alphabet(b'G') as usize], 1);
        assert_eq!(counts[dna::to_alphabet(b'T') as usize], 1);
    }

    #[test]
    fn lcp_bytes_are_capped() {
        let unit = make_reference(400, 5);
        let mut seq = unit.clone();
        seq.extend_from_slice(b"NN");
        seq.extend_from_slice(&unit);
        let (fm, lcp) = build_test_fm(&seq);
        assert_eq!(lcp.len(), fm.bwt_len() as usize);
        assert_eq!(lcp[0], u8::MAX);
        assert!(lcp[1..].iter().any(|&v| v == u8::MAX));
        assert!(lcp[1..].iter().any(|&v| v < 10));
    }

    #[test]
    fn rebuild_is_identical() {
        let seq = make_reference(1000, 21);
        let (a, la) = build_test_fm(&seq);
        let (b, lb) = build_test_fm(&seq);
        assert_eq!(a.blocks(), b.blocks());
        assert_eq!(a, b);
        assert_eq!(la, lb);
    }

    #[test]
    fn concatenated_text_maps_back_to_contigs() {
        let seqs = vec![b"ACGTT".to_vec(), b"GGA".to_vec(), b"TTAC".to_vec()];
        let text = ReferenceText::new(seqs).unwrap();
        let (fm, _) = FMIndex::build(&text, false).unwrap();
        assert_eq!(fm.bwt_len(), 5 + 1 + 3 + 1 + 4 + 1);
        let ids: Vec<u8> = b"GGA".iter().map(|&b| dna::to_alphabet(b)).collect();
        let (top, bottom) = fm.backward_search(&ids).unwrap();
        assert_eq!(top, bottom);
        let pos = fm.position_in_text(top);
        assert_eq!(pos, 6);
        assert_eq!(fm.map_text_pos(pos), Some((1, 0)));
        assert_eq!(fm.map_text_pos(5), None);
        assert_eq!(fm.map_text_pos(13), Some((2, 3)));
    }

    #[test]
    fn empty_text_is_an_error() {
        let text = ReferenceText::Plain(Vec::new());
        assert!(FMIndex::build(&text, false).is_err());
    }
}
