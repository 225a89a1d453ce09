use crate::layout::{Bitmap, BlockState};
use crate::{Error, INODE_COUNT, MAGIC, MAX_DATA_BLOCKS, Result};

/// inode 位图在超级块内的偏移
pub const INODE_BITMAP_OFFSET: usize = 8;
/// 数据块位图在超级块内的偏移
pub const DATA_BITMAP_OFFSET: usize = INODE_BITMAP_OFFSET + INODE_COUNT;

/// 超级块：
/// - 提供文件系统合法性校验；
/// - 记录 inode 与数据块的分配情况
#[derive(Debug, Clone)]
#[repr(C)]
pub struct SuperBlock {
    /// 魔数：用于校验文件系统合法性
    magic: u8,
    /// 数据块个数，即数据块位图的有效长度
    data_blocks: u8,
    _reserved: [u8; INODE_BITMAP_OFFSET - 2],
    inode_bitmap: [u8; INODE_COUNT],
    data_bitmap: [u8; MAX_DATA_BLOCKS],
}

impl SuperBlock {
    /// 全部 inode 与数据块均为空闲
    pub fn init(&mut self, data_blocks: usize) {
        assert!((1..=MAX_DATA_BLOCKS).contains(&data_blocks));

        *self = Self {
            magic: MAGIC,
            data_blocks: data_blocks as u8,
            _reserved: [0; INODE_BITMAP_OFFSET - 2],
            inode_bitmap: [BlockState::Free as u8; INODE_COUNT],
            data_bitmap: [0; MAX_DATA_BLOCKS],
        };
        self.data_bitmap[..data_blocks].fill(BlockState::Free as u8);
    }

    /// 除标记字节外还要求偏移 1 处记录了合法的数据块数；
    /// 该字节为 0 的镜像无法得知卷的大小，按未格式化处理。
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC && (1..=MAX_DATA_BLOCKS).contains(&self.data_blocks())
    }

    #[inline]
    pub fn data_blocks(&self) -> usize {
        self.data_blocks as usize
    }

    #[inline]
    pub fn inode_bitmap(&self) -> &[u8] {
        &self.inode_bitmap
    }

    #[inline]
    pub fn data_bitmap(&self) -> &[u8] {
        &self.data_bitmap[..self.data_blocks()]
    }

    /// 分别在两张位图中首次适配一个空闲槽位，返回 `(inode, 数据块)`。
    pub fn find_free_inode_and_block(&self) -> Result<(usize, usize)> {
        let inode = self.inode_bitmap().first_free();
        let block = self.data_bitmap().first_free();

        inode.zip(block).ok_or(Error::OutOfMemory)
    }

    /// 两个槽位同时标记为已用
    pub fn claim(&mut self, inode: usize, block: usize) {
        debug_assert!(self.inode_bitmap().is_free(inode) && self.data_bitmap().is_free(block));

        self.inode_bitmap.set(inode, BlockState::Used);
        self.data_bitmap_mut().set(block, BlockState::Used);
    }

    /// 两个槽位同时标记为空闲
    pub fn release(&mut self, inode: usize, block: usize) {
        self.inode_bitmap.set(inode, BlockState::Free);
        self.data_bitmap_mut().set(block, BlockState::Free);
    }

    #[inline]
    pub fn swap_data_slots(&mut self, l: usize, r: usize) {
        self.data_bitmap_mut().swap(l, r);
    }
}

impl SuperBlock {
    #[inline]
    fn data_bitmap_mut(&mut self) -> &mut [u8] {
        let data_blocks = self.data_blocks();
        &mut self.data_bitmap[..data_blocks]
    }
}

#[cfg(test)]
mod tests {
    use super::SuperBlock;
    use crate::block_cache::BlockCache;
    use crate::layout::{Bitmap, BlockState};
    use crate::{Error, INODE_COUNT, MAGIC, MAX_DATA_BLOCKS};

    fn formatted(data_blocks: usize) -> BlockCache {
        let mut cache = BlockCache::zeroed(0);
        cache.map_mut(0, |sb: &mut SuperBlock| sb.init(data_blocks));
        cache
    }

    #[test]
    fn init_marks_everything_free() {
        let cache = formatted(38);
        let sb: &SuperBlock = cache.get(0);

        assert!(sb.is_valid());
        assert_eq!(sb.magic, MAGIC);
        assert_eq!(sb.inode_bitmap().len(), INODE_COUNT);
        assert_eq!(sb.data_bitmap().len(), 38);
        assert!(sb.inode_bitmap().iter().all(|&raw| raw == 1));
        assert!(sb.data_bitmap().iter().all(|&raw| raw == 1));
        assert!(sb.data_bitmap[38..].iter().all(|&raw| raw == 0));
    }

    #[test]
    fn unformatted_is_invalid() {
        let cache = BlockCache::zeroed(0);
        assert!(!cache.get::<SuperBlock>(0).is_valid());
    }

    #[test]
    fn marker_without_block_count_is_invalid() {
        let mut cache = BlockCache::zeroed(0);
        cache.map_mut(0, |sb: &mut SuperBlock| sb.magic = MAGIC);
        assert!(!cache.get::<SuperBlock>(0).is_valid());

        cache.map_mut(0, |sb: &mut SuperBlock| sb.data_blocks = MAX_DATA_BLOCKS as u8 + 1);
        assert!(!cache.get::<SuperBlock>(0).is_valid());
    }

    #[test]
    fn claim_and_release() {
        let mut cache = formatted(3);
        let sb: &mut SuperBlock = cache.get_mut(0);
        assert_eq!(sb.find_free_inode_and_block(), Ok((0, 0)));

        sb.claim(0, 0);
        sb.claim(1, 1);
        assert_eq!(sb.find_free_inode_and_block(), Ok((2, 2)));

        sb.release(0, 0);
        assert_eq!(sb.find_free_inode_and_block(), Ok((0, 0)));
        assert_eq!(sb.data_bitmap().state(1), BlockState::Used);
    }

    #[test]
    fn out_of_data_blocks() {
        let mut cache = formatted(2);
        let sb: &mut SuperBlock = cache.get_mut(0);
        sb.claim(0, 0);
        sb.claim(1, 1);

        assert_eq!(sb.find_free_inode_and_block(), Err(Error::OutOfMemory));
    }

    #[test]
    fn out_of_inodes() {
        let mut cache = formatted(20);
        let sb: &mut SuperBlock = cache.get_mut(0);
        for slot in 0..INODE_COUNT {
            sb.claim(slot, slot);
        }

        assert_eq!(sb.find_free_inode_and_block(), Err(Error::OutOfMemory));
    }
}
