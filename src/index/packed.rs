/// 定长位宽的整数压缩数组，按 64 位字存储，单个值可跨越两个相邻字。
/// 仅用于构建期暂存文本与 BWT 符号，不做越界检查以外的校验。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedIntArray {
    bits: u32,
    len: usize,
    words: Vec<u64>,
}

impl PackedIntArray {
    /// 分配可容纳 `count` 个取值不超过 `max_value` 的整数的数组，初始全为 0。
    pub fn new(count: usize, max_value: u64) -> Self {
        let bits = (64 - max_value.leading_zeros()).max(1);
        let total_bits = count * bits as usize;
        let num_words = (total_bits + 63) / 64;
        Self { bits, len: count, words: vec![0u64; num_words.max(1)] }
    }

    #[inline]
    pub fn bits(&self) -> u32 {
        self.bits
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn mask(&self) -> u64 {
        if self.bits == 64 { u64::MAX } else { (1u64 << self.bits) - 1 }
    }

    #[inline]
    pub fn get(&self, i: usize) -> u64 {
        let bit = i * self.bits as usize;
        let w = bit / 64;
        let off = (bit % 64) as u32;
        let mut v = self.words[w] >> off;
        if off + self.bits > 64 {
            v |= self.words[w + 1] << (64 - off);
        }
        v & self.mask()
    }

    #[inline]
    pub fn set(&mut self, i: usize, value: u64) {
        let mask = self.mask();
        let value = value & mask;
        let bit = i * self.bits as usize;
        let w = bit / 64;
        let off = (bit % 64) as u32;
        self.words[w] = (self.words[w] & !(mask << off)) | (value << off);
        if off + self.bits > 64 {
            let spill = 64 - off;
            self.words[w + 1] = (self.words[w + 1] & !(mask >> spill)) | (value >> spill);
        }
    }

    pub fn size_in_bytes(&self) -> usize {
        self.words.len() * std::mem::size_of::<u64>()
    }
}
