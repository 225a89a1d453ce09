//! # 磁盘数据结构层
//!
//! tinyfs 的磁盘布局：
//! 超级块 | inode 表 | 数据块 × N
//!
//! 每个文件恰好占用一个数据块。

mod super_block;
pub use super_block::{DATA_BITMAP_OFFSET, SuperBlock};

mod bitmap;
pub use bitmap::{Bitmap, BlockState};

mod inode;
pub use inode::{FileName, InodeTable};
