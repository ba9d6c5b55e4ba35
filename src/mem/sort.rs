use anyhow::{anyhow, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::io::append_to_basename;
use crate::io::mems::{read_mems, MemBlock, MemsWriter};

/// 每个头部下的匹配按参考位置升序排列（再按查询位置、长度）
pub fn sort_blocks(blocks: &mut [MemBlock]) {
    for block in blocks.iter_mut() {
        block.mems.sort_unstable();
    }
}

/// 排序 MEM 文件，写到 `<basename>-sorted.txt` 并返回该路径
pub fn sort_mems_file(path: &Path) -> Result<PathBuf> {
    let fh = File::open(path).map_err(|e| anyhow!("cannot open MEMs file '{}': {}", path.display(), e))?;
    let mut blocks = read_mems(BufReader::new(fh))
        .map_err(|e| anyhow!("invalid MEMs file '{}': {}", path.display(), e))?;
    sort_blocks(&mut blocks);

    let out_path = append_to_basename(path, "-sorted.txt");
    let out = File::create(&out_path).map_err(|e| anyhow!("cannot create '{}': {}", out_path.display(), e))?;
    let mut writer = MemsWriter::new(BufWriter::new(out));
    for block in &blocks {
        info!("'{}' ({} MEMs)", block.header, block.mems.len());
        writer.write_header(&block.header, false)?;
        for mem in &block.mems {
            writer.write_mem(mem)?;
        }
    }
    writer.flush()?;
    Ok(out_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::finder::Mem;

    #[test]
    fn sorts_each_block_independently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out-mems.txt");
        std::fs::write(&path, ">q1\n30\t1\t20\n5\t9\t20\n5\t2\t25\n>q1 Reverse\n7\t1\t20\n2\t4\t20\n").unwrap();

        let sorted_path = sort_mems_file(&path).unwrap();
        assert_eq!(sorted_path, dir.path().join("out-mems-sorted.txt"));
        let text = std::fs::read_to_string(&sorted_path).unwrap();
        assert_eq!(text, ">q1\n5\t2\t25\n5\t9\t20\n30\t1\t20\n>q1 Reverse\n2\t4\t20\n7\t1\t20\n");
    }

    #[test]
    fn ties_break_on_query_then_length() {
        let mut blocks = vec![MemBlock {
            header: "q".to_string(),
            mems: vec![
                Mem { ref_pos: 3, query_pos: 1, len: 9 },
                Mem { ref_pos: 3, query_pos: 1, len: 5 },
                Mem { ref_pos: 3, query_pos: 0, len: 7 },
            ],
        }];
        sort_blocks(&mut blocks);
        let lens: Vec<u32> = blocks[0].mems.iter().map(|m| m.len).collect();
        assert_eq!(lens, vec![7, 5, 9]);
    }

    #[test]
    fn malformed_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, ">q\n1\tx\t3\n").unwrap();
        let err = sort_mems_file(&path).unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(!dir.path().join("bad-sorted.txt").exists());
    }
}
