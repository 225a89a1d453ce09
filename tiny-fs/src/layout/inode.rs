use alloc::string::String;
use core::fmt;

use crate::{Error, INODE_COUNT, NAME_LEN, Result};

/// 定长文件名，不足补零
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct FileName([u8; NAME_LEN]);

impl FileName {
    pub const EMPTY: Self = Self([0; NAME_LEN]);

    /// 超出 [`NAME_LEN`] 的部分被截去（不会截断多字节字符）。
    /// 空名与含 `\0` 的名字不合法。
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() || name.contains('\0') {
            return Err(Error::BadRequest);
        }

        let mut len = name.len().min(NAME_LEN);
        while !name.is_char_boundary(len) {
            len -= 1;
        }

        let mut raw = [0; NAME_LEN];
        raw[..len].copy_from_slice(&name.as_bytes()[..len]);
        Ok(Self(raw))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        let len = self.0.iter().position(|&c| c == 0).unwrap_or(NAME_LEN);
        &self.0[..len]
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Debug for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.as_bytes()))
    }
}

/// inode 记录，16 字节
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DiskInode {
    name: FileName,
    _reserved: [u8; 4],
    /// 数据块编号，[`DiskInode::NO_BLOCK`] 表示未分配
    block: u8,
    _pad: [u8; 3],
}

impl DiskInode {
    pub const NO_BLOCK: u8 = 255;

    const FREE: Self = Self {
        name: FileName::EMPTY,
        _reserved: [0; 4],
        block: Self::NO_BLOCK,
        _pad: [0; 3],
    };

    /// 重置为空闲槽位
    #[inline]
    pub fn init(&mut self) {
        *self = Self::FREE;
    }

    #[inline]
    pub fn occupy(&mut self, name: FileName, block: usize) {
        debug_assert!(block < Self::NO_BLOCK as usize);

        *self = Self {
            name,
            block: block as u8,
            ..Self::FREE
        };
    }

    #[inline]
    pub fn is_used(&self) -> bool {
        !self.name.is_empty() && self.block != Self::NO_BLOCK
    }

    #[inline]
    pub fn name(&self) -> &FileName {
        &self.name
    }

    #[inline]
    pub fn rename(&mut self, name: FileName) {
        self.name = name;
    }

    #[inline]
    pub fn block(&self) -> usize {
        self.block as usize
    }
}

/// inode 表，恰好占满一个块
#[derive(Debug)]
#[repr(transparent)]
pub struct InodeTable([DiskInode; INODE_COUNT]);

impl InodeTable {
    #[inline]
    pub fn init(&mut self) {
        self.0.fill(DiskInode::FREE);
    }

    #[inline]
    pub fn get(&self, slot: usize) -> &DiskInode {
        &self.0[slot]
    }

    #[inline]
    pub fn get_mut(&mut self, slot: usize) -> &mut DiskInode {
        &mut self.0[slot]
    }

    /// 按名字查找使用中的 inode，返回其槽位。
    /// 所有按名查找都经过这里。
    pub fn find(&self, name: &FileName) -> Option<usize> {
        self.0
            .iter()
            .position(|inode| inode.is_used() && inode.name() == name)
    }

    pub fn iter_used(&self) -> impl Iterator<Item = (usize, &DiskInode)> {
        self.0.iter().enumerate().filter(|(_, inode)| inode.is_used())
    }

    /// 数据块 `l` 与 `r` 互换了位置，指向二者的 inode 随之对调
    pub fn remap_blocks(&mut self, l: usize, r: usize) {
        for inode in self.0.iter_mut().filter(|inode| inode.is_used()) {
            if inode.block() == l {
                inode.block = r as u8;
            } else if inode.block() == r {
                inode.block = l as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::{DiskInode, FileName, InodeTable};
    use crate::Error;
    use crate::block_cache::BlockCache;

    fn table() -> BlockCache {
        let mut cache = BlockCache::zeroed(1);
        cache.map_mut(0, |table: &mut InodeTable| table.init());
        cache
    }

    #[test]
    fn file_name() {
        assert_eq!(FileName::new(""), Err(Error::BadRequest));
        assert_eq!(FileName::new("a\0b"), Err(Error::BadRequest));

        let name = FileName::new("abcdefghij").unwrap();
        assert_eq!(name.as_bytes(), b"abcdefgh");
        assert_eq!(name, FileName::new("abcdefgh").unwrap());
        assert_eq!(name.to_string(), "abcdefgh");

        // 7 字节 + 一个 2 字节字符，整个字符被截去
        let name = FileName::new("abcdefgé").unwrap();
        assert_eq!(name.as_bytes(), b"abcdefg");
    }

    #[test]
    fn free_slots_are_unused() {
        let cache = table();
        let table: &InodeTable = cache.get(0);

        assert_eq!(table.iter_used().count(), 0);
        assert_eq!(table.get(0).block(), DiskInode::NO_BLOCK as usize);
        assert_eq!(table.find(&FileName::new("file0").unwrap()), None);
    }

    #[test]
    fn find_and_remap() {
        let mut cache = table();
        let table: &mut InodeTable = cache.get_mut(0);
        let a = FileName::new("a").unwrap();
        let b = FileName::new("b").unwrap();

        table.get_mut(3).occupy(a, 0);
        table.get_mut(5).occupy(b, 7);
        assert_eq!(table.find(&a), Some(3));
        assert_eq!(table.find(&b), Some(5));

        table.remap_blocks(0, 7);
        assert_eq!(table.get(3).block(), 7);
        assert_eq!(table.get(5).block(), 0);
        // 空闲槽位不受影响
        assert_eq!(table.get(0).block(), DiskInode::NO_BLOCK as usize);

        table.get_mut(3).init();
        assert_eq!(table.find(&a), None);
        assert_eq!(table.iter_used().count(), 1);
    }
}
