use anyhow::{anyhow, bail, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::warn;

use crate::util::dna;

/// 清理后 FASTA 的行宽
pub const CLEAN_LINE_WIDTH: usize = 100;

#[derive(Debug, Clone)]
pub struct FastaRecord {
    /// `>` 之后的完整头部（去掉首尾空白）
    pub name: String,
    pub seq: Vec<u8>,
}

pub struct FastaReader<R: BufRead> {
    reader: R,
    buf: String,
    done: bool,
    peek_header: Option<String>,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            done: false,
            peek_header: None,
        }
    }

    /// 读取下一条记录；序列去掉空白并转大写，其余字符原样保留
    pub fn next_record(&mut self) -> Result<Option<FastaRecord>> {
        if self.done {
            return Ok(None);
        }

        let name = if let Some(h) = self.peek_header.take() {
            h
        } else {
            loop {
                self.buf.clear();
                let n = self.reader.read_line(&mut self.buf)?;
                if n == 0 {
                    self.done = true;
                    return Ok(None);
                }
                if let Some(h) = self.buf.strip_prefix('>') {
                    break h.trim().to_string();
                }
            }
        };

        let mut seq: Vec<u8> = Vec::new();
        loop {
            self.buf.clear();
            let n = self.reader.read_line(&mut self.buf)?;
            if n == 0 {
                self.done = true;
                break;
            }
            if let Some(h) = self.buf.strip_prefix('>') {
                self.peek_header = Some(h.trim().to_string());
                break;
            }
            seq.extend(self.buf.bytes().filter(|b| !b.is_ascii_whitespace()).map(|b| b.to_ascii_uppercase()));
        }

        Ok(Some(FastaRecord { name, seq }))
    }
}

fn open_fasta(path: &Path) -> Result<FastaReader<BufReader<File>>> {
    let fh = File::open(path).map_err(|e| anyhow!("cannot open FASTA file '{}': {}", path.display(), e))?;
    Ok(FastaReader::new(BufReader::new(fh)))
}

/// 读入文件中的全部序列并规范化（`acgt_only` 时丢弃非 ACGT 字母，否则转为 N）。
/// 规范化后为空的记录跳过并给出警告。
pub fn load_sequences(path: &Path, acgt_only: bool) -> Result<Vec<FastaRecord>> {
    let mut reader = open_fasta(path)?;
    let mut records = Vec::new();
    while let Some(rec) = reader.next_record()? {
        let seq = dna::normalize_seq(&rec.seq, acgt_only);
        if seq.is_empty() {
            warn!("skipping empty sequence \"{}\" in '{}'", rec.name, path.display());
            continue;
        }
        records.push(FastaRecord { name: rec.name, seq });
    }
    Ok(records)
}

/// FASTA 清理的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanStats {
    /// 保留的 ACGT 字符数
    pub chars: usize,
    /// 删除的非 ACGT 字符数
    pub removed: usize,
    /// 合并的序列条数
    pub sequences: usize,
}

/// 只保留 ACGT（转大写），所有记录合并为一条，以输入文件名作为头部，每行 100 个字符。
pub fn clean_fasta(input: &Path, output: &Path) -> Result<CleanStats> {
    let mut reader = open_fasta(input)?;
    let fh = File::create(output).map_err(|e| anyhow!("cannot create '{}': {}", output.display(), e))?;
    let mut out = BufWriter::new(fh);
    writeln!(out, ">{}", input.display())?;

    let mut stats = CleanStats::default();
    let mut line = Vec::with_capacity(CLEAN_LINE_WIDTH);
    while let Some(rec) = reader.next_record()? {
        stats.sequences += 1;
        for &b in &rec.seq {
            if !matches!(b, b'A' | b'C' | b'G' | b'T') {
                stats.removed += 1;
                continue;
            }
            line.push(b);
            stats.chars += 1;
            if line.len() == CLEAN_LINE_WIDTH {
                out.write_all(&line)?;
                out.write_all(b"\n")?;
                line.clear();
            }
        }
    }
    if stats.sequences == 0 {
        bail!("'{}' is not a FASTA file (no '>' header found)", input.display());
    }
    if !line.is_empty() {
        out.write_all(&line)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(stats)
}
