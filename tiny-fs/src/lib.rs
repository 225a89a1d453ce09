#![no_std]

extern crate alloc;

/* tinyfs 的整体架构，自上而下 */

// 文件操作层：打开、读写、定位、删除、重命名
mod file;
pub use file::BlockState;

// 碎片整理：把空闲数据块挪到卷尾
mod defrag;

// 会话表：句柄到打开文件状态的映射
mod session;
pub use session::FileHandle;

// 卷管理层：格式化、挂载与卸载
mod tfs;
pub use tfs::TinyFileSystem;

// 磁盘数据结构层：超级块、位图、inode 表
mod layout;

// 块缓存层：挂载期间常驻内存的元数据块
mod block_cache;

// 内存块设备，供测试及无盘环境使用
mod ram_disk;
pub use ram_disk::{RamDisk, RamStore};

mod error;
pub use error::{Error, Result};

pub use block_dev::{BlockDevice, BlockStore, DeviceError};

/// 超级块第 0 字节的格式标记
pub const MAGIC: u8 = 0x5A;
pub const BLOCK_SIZE: usize = 256;
/// 单个 inode 记录的字节数
pub const INODE_SIZE: usize = 16;
/// inode 表恰好占满一个块
pub const INODE_COUNT: usize = BLOCK_SIZE / INODE_SIZE;
/// 文件名最长字节数
pub const NAME_LEN: usize = 8;
/// 超级块 + inode 表 + 至少一个数据块
pub const MIN_BLOCKS: usize = 3;
/// 第一个数据块在块设备上的编号
pub const FIRST_DATA_BLOCK: usize = 2;
/// 超级块中数据块位图能容纳的项数
pub const MAX_DATA_BLOCKS: usize = BLOCK_SIZE - layout::DATA_BITMAP_OFFSET;
/// 文件指针等于此值即为文件尾
pub const EOF_CURSOR: usize = BLOCK_SIZE - 1;

type DataBlock = [u8; BLOCK_SIZE];
