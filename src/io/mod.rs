pub mod fasta;
pub mod mems;

use std::path::{Path, PathBuf};

/// 去掉文件名的扩展名后追加 `extra`：`data/ref.fa` + `-mems.txt` -> `data/ref-mems.txt`
pub fn append_to_basename(path: &Path, extra: &str) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    path.with_file_name(format!("{}{}", stem, extra))
}
