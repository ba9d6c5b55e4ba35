use crate::index::packed::PackedIntArray;
use crate::util::dna::{SIGMA, TERMINATOR};

/// 由文本与 SA 构建 BWT：BWT[i] = T[SA[i]-1]（SA[i]=0 时为终止符），按 3 位宽压缩暂存。
pub fn build_bwt(text: &PackedIntArray, sa: &[u32]) -> PackedIntArray {
    let mut bwt = PackedIntArray::new(sa.len(), (SIGMA - 1) as u64);
    for (i, &p) in sa.iter().enumerate() {
        let ch = if p == 0 { u64::from(TERMINATOR) } else { text.get(p as usize - 1) };
        bwt.set(i, ch);
    }
    bwt
}
