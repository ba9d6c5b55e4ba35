pub mod finder;
pub mod sort;

use anyhow::{anyhow, bail, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::io::fasta::{self, FastaRecord};
use crate::io::mems::MemsWriter;
use crate::util::{dna, progress};

pub use finder::{Mem, ReferenceIndex};

/// MEM 查找选项
#[derive(Debug, Clone, Copy)]
pub struct MemOpt {
    /// 最小 MEM 长度
    pub min_len: u32,
    /// 同时处理查询的反向互补链
    pub both_strands: bool,
    /// 载入时丢弃非 ACGT 字母（否则转为 N）
    pub acgt_only: bool,
    /// 输出构建统计与进度条
    pub verbose: bool,
}

impl Default for MemOpt {
    fn default() -> Self {
        Self {
            min_len: 50,
            both_strands: false,
            acgt_only: false,
            verbose: false,
        }
    }
}

/// 一条查询链的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StrandStats {
    pub num_mems: u64,
    pub total_len: u64,
}

impl StrandStats {
    pub fn avg_len(&self) -> u64 {
        if self.num_mems == 0 { 0 } else { self.total_len / self.num_mems }
    }
}

/// 用一个参考索引匹配全部查询，按 查询 × 链 的顺序写出 MEM 流。
/// 返回每条链的统计，顺序与写出顺序一致。
pub fn match_queries<W: Write>(
    index: &ReferenceIndex,
    queries: &[FastaRecord],
    writer: &mut MemsWriter<W>,
    opt: &MemOpt,
) -> Result<Vec<StrandStats>> {
    let pb = progress::bar(opt.verbose, queries.len() as u64, "matching queries");
    let mut all = Vec::with_capacity(queries.len() * if opt.both_strands { 2 } else { 1 });
    for query in queries {
        let mut ids: Vec<u8> = query.seq.iter().map(|&b| dna::to_alphabet(b)).collect();
        for reverse in [false, true] {
            if reverse {
                if !opt.both_strands {
                    break;
                }
                let mut bases = query.seq.clone();
                dna::revcomp_in_place(&mut bases);
                ids = bases.iter().map(|&b| dna::to_alphabet(b)).collect();
            }

            writer.write_header(&query.name, reverse)?;
            let mut stats = StrandStats::default();
            let mut status = Ok(());
            index.find_mems(&ids, opt.min_len, |mem| {
                if status.is_ok() {
                    status = writer.write_mem(&mem);
                }
                stats.num_mems += 1;
                stats.total_len += u64::from(mem.len);
            });
            status?;

            info!(
                "\"{}{}\" ({} MEMs ; avg size = {} bp)",
                query.name,
                if reverse { crate::io::mems::REVERSE_SUFFIX } else { "" },
                stats.num_mems,
                stats.avg_len()
            );
            all.push(stats);
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(all)
}

/// 完整流程：载入参考与查询，逐条参考建索引并匹配全部查询，写出到 `output`。
pub fn run_mems(reference: &Path, query_files: &[PathBuf], output: &Path, opt: &MemOpt) -> Result<()> {
    let references = fasta::load_sequences(reference, opt.acgt_only)?;
    if references.is_empty() {
        bail!("no valid reference sequences found in '{}'", reference.display());
    }
    if query_files.is_empty() {
        bail!("no query files provided");
    }
    let mut queries = Vec::new();
    for path in query_files {
        queries.extend(fasta::load_sequences(path, opt.acgt_only)?);
    }
    if queries.is_empty() {
        bail!("no valid query sequences found");
    }
    info!(
        "{} reference{} and {} quer{} successfully loaded",
        references.len(),
        if references.len() == 1 { "" } else { "s" },
        queries.len(),
        if queries.len() == 1 { "y" } else { "ies" }
    );
    info!("using options: minimum MEM length = {}", opt.min_len);

    let fh = File::create(output).map_err(|e| anyhow!("cannot create output file '{}': {}", output.display(), e))?;
    let mut writer = MemsWriter::new(BufWriter::new(fh));

    for record in references {
        info!("processing reference sequence \"{}\" ...", record.name);
        // 上一条参考的索引在此之前已释放
        let index = ReferenceIndex::build(record.name, record.seq, opt.min_len, opt.verbose)?;
        info!("matching query sequences against index ...");
        let stats = match_queries(&index, &queries, &mut writer, opt)?;
        if queries.len() > 1 {
            let total_mems: u64 = stats.iter().map(|s| s.num_mems).sum();
            let total_avg: u64 = stats.iter().map(StrandStats::avg_len).sum();
            let n = queries.len() as u64;
            info!("average {} MEMs found per sequence (avg size = {} bp)", total_mems / n, total_avg / n);
        }
    }
    writer.flush()?;
    info!("MEMs saved to '{}'", output.display());
    Ok(())
}
