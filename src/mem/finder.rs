use anyhow::Result;

use crate::index::fm::FMIndex;
use crate::index::lcp::SampledLcp;
use crate::index::text::ReferenceText;
use crate::util::dna;

/// 一个最大精确匹配：参考与查询上的 0-based 起点及长度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Mem {
    pub ref_pos: u32,
    pub query_pos: u32,
    pub len: u32,
}

/// 当前参考序列的全部检索结构：FM 索引 + 采样 LCP。
/// 构建完成后参考文本即被释放，查询只依赖这两个结构。
#[derive(Debug)]
pub struct ReferenceIndex {
    name: String,
    fm: FMIndex,
    lcp: SampledLcp,
}

impl ReferenceIndex {
    /// 为单条（已规范化的）参考序列建索引。`min_lcp` 只影响构建日志中的统计。
    pub fn build(name: impl Into<String>, seq: Vec<u8>, min_lcp: u32, verbose: bool) -> Result<Self> {
        let text = ReferenceText::new(vec![seq])?;
        Self::from_text(name, &text, min_lcp, verbose)
    }

    pub fn from_text(name: impl Into<String>, text: &ReferenceText, min_lcp: u32, verbose: bool) -> Result<Self> {
        let (fm, lcp_bytes) = FMIndex::build(text, verbose)?;
        let lcp = SampledLcp::build(text, &fm, &lcp_bytes, min_lcp, verbose)?;
        Ok(Self { name: name.into(), fm, lcp })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fm(&self) -> &FMIndex {
        &self.fm
    }

    pub fn lcp(&self) -> &SampledLcp {
        &self.lcp
    }

    /// 从右向左扫描查询（字母表编码），对长度不小于 `min_len` 的每个 MEM 调用一次 `emit`，
    /// 按发现顺序输出。
    ///
    /// 每一步在当前区间前扩展一个字符；失败时借助父指针退到更浅的包含区间重试，
    /// 退到根仍失败（字符在参考中不存在）则从根重新开始。匹配深度达到阈值后，
    /// 当前区间及其所有深度不小于阈值的祖先区间中，尚未在更深一层输出过、
    /// 且左侧字符与查询左侧字符不同的位置，各构成一个 MEM。
    pub fn find_mems<F: FnMut(Mem)>(&self, query: &[u8], min_len: u32, mut emit: F) {
        let fm = &self.fm;
        let lcp = &self.lcp;
        let min_len = i64::from(min_len.max(1));

        let mut top = 0u32;
        let mut bottom = fm.bwt_size();
        let mut depth = 0i64;
        for j in (0..query.len()).rev() {
            while fm.follow_letter(query[j], &mut top, &mut bottom) == 0 {
                depth = lcp.enclosing_interval(&mut top, &mut bottom);
                if depth == -1 {
                    break;
                }
            }
            depth += 1;
            if depth < min_len {
                continue;
            }

            let (saved_top, saved_bottom) = (top, bottom);
            // 查询中的 `$` 不与参考首位之前的终止符相等
            let left = j.checked_sub(1).map(|k| query[k]).filter(|&c| c != dna::TERMINATOR);
            // 第一层区间整体输出
            let (mut inner_top, mut inner_bottom) = (bottom + 1, bottom);
            let mut mem_len = depth;
            while mem_len >= min_len {
                for n in (top..inner_top).chain((inner_bottom + 1..=bottom).rev()) {
                    if Some(fm.char_at(n)) != left {
                        emit(Mem { ref_pos: fm.position_in_text(n), query_pos: j as u32, len: mem_len as u32 });
                    }
                }
                inner_top = top;
                inner_bottom = bottom;
                mem_len = lcp.enclosing_interval(&mut top, &mut bottom);
            }
            top = saved_top;
            bottom = saved_bottom;
        }
    }

    /// 便捷接口：输入原始碱基，返回按发现顺序排列的 MEM 列表
    pub fn collect_mems(&self, query: &[u8], min_len: u32) -> Vec<Mem> {
        let ids: Vec<u8> = query.iter().map(|&b| dna::to_alphabet(b)).collect();
        let mut mems = Vec::new();
        self.find_mems(&ids, min_len, |m| mems.push(m));
        mems
    }
}
