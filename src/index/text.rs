use anyhow::{bail, Result};

use crate::util::dna::{self, N, TERMINATOR};

/// 拼接文本中每条序列的起始偏移与长度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contig {
    pub len: u32,
    pub offset: u32,
}

/// 建索引用的参考文本。单条序列直接使用；多条序列之间插入一个 N 分隔，
/// 字符在构建时按需取出，避免再复制一份拼接后的文本。
#[derive(Debug, Clone)]
pub enum ReferenceText {
    Plain(Vec<u8>),
    Concatenated { seqs: Vec<Vec<u8>>, contigs: Vec<Contig> },
}

impl ReferenceText {
    /// 由一条或多条（已规范化的）序列构造文本；空文本或长度超出 u32 范围时报错。
    pub fn new(mut seqs: Vec<Vec<u8>>) -> Result<Self> {
        if seqs.iter().all(|s| s.is_empty()) {
            bail!("cannot index an empty text");
        }
        let total: u64 = seqs.iter().map(|s| s.len() as u64).sum::<u64>() + seqs.len() as u64 - 1;
        if total >= u64::from(u32::MAX) {
            bail!("text of {} characters is too large to index (limit {})", total, u32::MAX - 1);
        }
        if seqs.len() == 1 {
            return Ok(ReferenceText::Plain(seqs.remove(0)));
        }
        let mut contigs = Vec::with_capacity(seqs.len());
        let mut offset = 0u32;
        for s in &seqs {
            contigs.push(Contig { len: s.len() as u32, offset });
            offset += s.len() as u32 + 1;
        }
        Ok(ReferenceText::Concatenated { seqs, contigs })
    }

    /// 全局文本长度 L（不含终止符）
    pub fn len(&self) -> u32 {
        match self {
            ReferenceText::Plain(s) => s.len() as u32,
            ReferenceText::Concatenated { contigs, .. } => {
                contigs.last().map_or(0, |c| c.offset + c.len)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 位置 `pos` 的字母编码；`pos == len()` 处为终止符
    #[inline]
    pub fn char_id_at(&self, pos: u32) -> u8 {
        match self {
            ReferenceText::Plain(s) => s.get(pos as usize).map_or(TERMINATOR, |&b| text_id(b)),
            ReferenceText::Concatenated { seqs, contigs } => {
                if pos >= self.len() {
                    return TERMINATOR;
                }
                let i = contigs.partition_point(|c| c.offset <= pos) - 1;
                let local = (pos - contigs[i].offset) as usize;
                seqs[i].get(local).map_or(N, |&b| text_id(b))
            }
        }
    }

    pub fn contigs(&self) -> Vec<Contig> {
        match self {
            ReferenceText::Plain(s) => vec![Contig { len: s.len() as u32, offset: 0 }],
            ReferenceText::Concatenated { contigs, .. } => contigs.clone(),
        }
    }
}

/// 文本内容中的 `$` 视为 N，保证终止符唯一
#[inline]
fn text_id(b: u8) -> u8 {
    match dna::to_alphabet(b) {
        TERMINATOR => N,
        id => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_ends_with_terminator() {
        let t = ReferenceText::new(vec![b"ACGT".to_vec()]).unwrap();
        assert!(matches!(t, ReferenceText::Plain(_)));
        assert_eq!(t.len(), 4);
        let ids: Vec<u8> = (0..=4).map(|p| t.char_id_at(p)).collect();
        assert_eq!(ids, vec![2, 3, 4, 5, 0]);
    }

    #[test]
    fn stray_terminators_in_content_become_n() {
        let t = ReferenceText::new(vec![b"A$C".to_vec()]).unwrap();
        assert_eq!(t.char_id_at(1), N);
        assert_eq!(t.char_id_at(3), TERMINATOR);
    }

    #[test]
    fn concatenated_text_uses_n_separators() {
        let t = ReferenceText::new(vec![b"AC".to_vec(), b"G".to_vec(), b"TT".to_vec()]).unwrap();
        assert_eq!(t.len(), 7);
        let ids: Vec<u8> = (0..=7).map(|p| t.char_id_at(p)).collect();
        assert_eq!(ids, vec![2, 3, 1, 4, 1, 5, 5, 0]);
        assert_eq!(
            t.contigs(),
            vec![
                Contig { len: 2, offset: 0 },
                Contig { len: 1, offset: 3 },
                Contig { len: 2, offset: 5 },
            ]
        );
    }

    #[test]
    fn empty_text_is_rejected() {
        assert!(ReferenceText::new(vec![Vec::new()]).is_err());
        assert!(ReferenceText::new(vec![Vec::new(), Vec::new()]).is_err());
    }
}
