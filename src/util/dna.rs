pub const SIGMA: usize = 6; // {0:$, 1:N, 2:A, 3:C, 4:G, 5:T}

/// 终止符 `$` 的编码，整个 BWT 中只出现一次
pub const TERMINATOR: u8 = 0;
/// 非 ACGT 字符统一编码为 N
pub const N: u8 = 1;

#[inline]
pub fn to_alphabet(b: u8) -> u8 {
    match b.to_ascii_uppercase() {
        0 | b'$' => TERMINATOR,
        b'A' => 2,
        b'C' => 3,
        b'G' => 4,
        b'T' | b'U' => 5,
        _ => N, // map others to N
    }
}

#[inline]
pub fn from_alphabet(a: u8) -> u8 {
    match a {
        0 => b'$',
        2 => b'A',
        3 => b'C',
        4 => b'G',
        5 => b'T',
        _ => b'N',
    }
}

/// 规范化序列：ACGT 转大写，U 视为 T；其余字母转为 N（`acgt_only` 时直接丢弃）；
/// 非字母字符一律丢弃。
pub fn normalize_seq(seq: &[u8], acgt_only: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(seq.len());
    for &b in seq {
        if !b.is_ascii_alphabetic() {
            continue;
        }
        match b.to_ascii_uppercase() {
            b'A' => out.push(b'A'),
            b'C' => out.push(b'C'),
            b'G' => out.push(b'G'),
            b'T' | b'U' => out.push(b'T'),
            _ if acgt_only => {}
            _ => out.push(b'N'),
        }
    }
    out
}

#[inline]
pub fn complement(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' | b'U' => b'A',
        _ => b'N',
    }
}

pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    let mut out = seq.to_vec();
    revcomp_in_place(&mut out);
    out
}

/// 原地反向互补，用于查询序列的反链扫描
pub fn revcomp_in_place(seq: &mut [u8]) {
    seq.reverse();
    for b in seq.iter_mut() {
        *b = complement(*b);
    }
}
