//! # 块缓存层
//!
//! 挂载期间，超级块与 inode 表常驻内存，是元数据的权威副本。
//! 修改先落在缓存上，由 [`BlockCache::sync`] 写回块设备；
//! 未修改过的块不会被写回。

use alloc::sync::Arc;
use core::mem;

use block_dev::BlockDevice;

use crate::{BLOCK_SIZE, DataBlock, Result};

/// 内存中的块缓存
#[derive(Clone)]
pub struct BlockCache {
    /// 缓存的数据
    data: DataBlock,
    /// 对应的块ID
    block_id: usize,
    /// 是否为脏块
    modified: bool,
}

impl BlockCache {
    pub fn load(block_id: usize, block_device: &Arc<dyn BlockDevice>) -> Result<Self> {
        let mut data = [0; BLOCK_SIZE];
        block_device.read_block(block_id, &mut data)?;

        Ok(Self {
            data,
            block_id,
            modified: false,
        })
    }

    /// 全零的新块，尚未写入设备，故视为脏块
    pub fn zeroed(block_id: usize) -> Self {
        Self {
            data: [0; BLOCK_SIZE],
            block_id,
            modified: true,
        }
    }

    pub fn sync(&mut self, block_device: &Arc<dyn BlockDevice>) -> Result<()> {
        if self.modified {
            block_device.write_block(self.block_id, &self.data)?;
            self.modified = false;
        }
        Ok(())
    }

    /// 强制标记为脏块，下次同步一定写回
    #[inline]
    pub fn touch(&mut self) {
        self.modified = true;
    }

    pub fn get<T: Sized>(&self, offset: usize) -> &T {
        Self::check::<T>(offset);
        let addr = self.data[offset..].as_ptr().cast::<T>();
        unsafe { &*addr }
    }

    pub fn get_mut<T: Sized>(&mut self, offset: usize) -> &mut T {
        Self::check::<T>(offset);
        self.modified = true;
        let addr = self.data[offset..].as_mut_ptr().cast::<T>();
        unsafe { &mut *addr }
    }

    #[inline]
    pub fn map<T: Sized, V>(&self, offset: usize, f: impl FnOnce(&T) -> V) -> V {
        f(self.get(offset))
    }

    #[inline]
    pub fn map_mut<T: Sized, V>(&mut self, offset: usize, f: impl FnOnce(&mut T) -> V) -> V {
        f(self.get_mut(offset))
    }
}

impl BlockCache {
    /// 磁盘结构全部由字节组成，对齐为 1，且不得越过块边界
    #[inline]
    fn check<T: Sized>(offset: usize) {
        assert!(mem::size_of::<T>() + offset <= BLOCK_SIZE);
        assert_eq!(mem::align_of::<T>(), 1);
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use block_dev::{BlockDevice, BlockStore};

    use super::BlockCache;
    use crate::{BLOCK_SIZE, RamStore};

    #[test]
    fn sync_writes_only_dirty_blocks() {
        let store = RamStore::new();
        let dev: Arc<dyn BlockDevice> = store.open("disk", 4 * BLOCK_SIZE).unwrap();

        let mut cache = BlockCache::load(1, &dev).unwrap();
        assert_eq!(*cache.get::<u8>(7), 0);

        // 只读访问不会弄脏缓存
        store.set_faulty("disk", true);
        cache.map(0, |byte: &u8| assert_eq!(*byte, 0));
        assert!(cache.sync(&dev).is_ok());

        cache.map_mut(7, |byte: &mut u8| *byte = 0xAB);
        assert!(cache.sync(&dev).is_err());

        store.set_faulty("disk", false);
        cache.sync(&dev).unwrap();

        let mut buf = [0; BLOCK_SIZE];
        dev.read_block(1, &mut buf).unwrap();
        assert_eq!(buf[7], 0xAB);
    }

    #[test]
    #[should_panic]
    fn out_of_block_access() {
        let cache = BlockCache::zeroed(0);
        cache.get::<[u8; 16]>(BLOCK_SIZE - 8);
    }
}
