//! # slamem-rs
//!
//! 基于分块 FM 索引与采样 LCP 数组的 DNA 最大精确匹配（MEM）查找工具。
//!
//! 本 crate 提供：
//!
//! - **索引构建**：LMS 后缀诱导排序（顺带得到 LCP）→ BWT → 每 32 位置一块的 FM 索引
//! - **采样 LCP**：只保存 LCP 游程边界，配合父指针在 O(1) 摊还时间内求包含区间
//! - **MEM 查找**：从右向左扫描查询，失配时沿父指针退到更浅的区间，输出全部长度达标的 MEM
//! - **文件工具**：MEM 文件排序、FASTA 清理
//!
//! ## 快速示例
//!
//! ```rust
//! use slamem_rs::mem::ReferenceIndex;
//!
//! let index = ReferenceIndex::build("ref", b"ACGTACGT".to_vec(), 4, false)?;
//! let mut mems = index.collect_mems(b"ACGT", 4);
//! mems.sort_unstable();
//! assert_eq!(mems.len(), 2);
//! assert_eq!((mems[0].ref_pos, mems[1].ref_pos), (0, 4));
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## 模块说明
//!
//! - [`io`]：FASTA 读取 / 清理，MEM 文本流读写
//! - [`index`]：后缀排序、BWT、FM 索引与采样 LCP
//! - [`mem`]：MEM 查找、批量驱动与结果排序
//! - [`util`]：DNA 编码 / 反向互补，进度条

pub mod index;
pub mod io;
pub mod mem;
pub mod util;
