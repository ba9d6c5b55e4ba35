//! MEM 文本流：每条查询（及其反链）一个 `>name` / `>name Reverse` 头，
//! 之后每行一个匹配 `参考位置\t查询位置\t长度`，位置为 1-based。

use anyhow::{anyhow, bail, Result};
use std::io::{BufRead, Write};

use crate::mem::finder::Mem;

/// 反链头部的名字后缀
pub const REVERSE_SUFFIX: &str = " Reverse";

pub struct MemsWriter<W: Write> {
    out: W,
}

impl<W: Write> MemsWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write_header(&mut self, name: &str, reverse: bool) -> Result<()> {
        if reverse {
            writeln!(self.out, ">{}{}", name, REVERSE_SUFFIX)?;
        } else {
            writeln!(self.out, ">{}", name)?;
        }
        Ok(())
    }

    #[inline]
    pub fn write_mem(&mut self, mem: &Mem) -> Result<()> {
        writeln!(self.out, "{}\t{}\t{}", u64::from(mem.ref_pos) + 1, u64::from(mem.query_pos) + 1, mem.len)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// 一个头部及其下的全部匹配（位置已转回 0-based）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemBlock {
    /// 头部文本（不含 `>`），反链头部保留 ` Reverse` 后缀
    pub header: String,
    pub mems: Vec<Mem>,
}

/// 读取整个 MEM 流。空行忽略；格式错误时报告出错的行号。
pub fn read_mems<R: BufRead>(reader: R) -> Result<Vec<MemBlock>> {
    let mut blocks: Vec<MemBlock> = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = i + 1;
        let text = line.trim_end();
        if text.trim().is_empty() {
            continue;
        }
        if let Some(header) = text.strip_prefix('>') {
            blocks.push(MemBlock { header: header.trim().to_string(), mems: Vec::new() });
            continue;
        }
        let Some(block) = blocks.last_mut() else {
            bail!("line {}: match record before any '>' header", line_no);
        };
        block.mems.push(parse_record(text, line_no)?);
    }
    Ok(blocks)
}

fn parse_record(text: &str, line_no: usize) -> Result<Mem> {
    let mut fields = text.split_whitespace();
    let mut next = |what: &str| -> Result<u32> {
        let field = fields.next().ok_or_else(|| anyhow!("line {}: missing {}", line_no, what))?;
        field
            .parse::<u32>()
            .map_err(|e| anyhow!("line {}: invalid {} '{}': {}", line_no, what, field, e))
    };
    let ref_pos = next("reference position")?;
    let query_pos = next("query position")?;
    let len = next("match length")?;
    if fields.next().is_some() {
        bail!("line {}: expected 3 fields", line_no);
    }
    if ref_pos == 0 || query_pos == 0 {
        bail!("line {}: positions are 1-based", line_no);
    }
    Ok(Mem { ref_pos: ref_pos - 1, query_pos: query_pos - 1, len })
}
