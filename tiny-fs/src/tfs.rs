//! # 卷管理层
//!
//! [`TinyFileSystem`] 是调用者持有的文件系统上下文，同一时刻至多挂载一个卷。
//! 挂载时把超级块与 inode 表读入内存，此后内存副本即为权威；
//! 修改元数据的操作以“暂存-提交”的方式写回，卸载时再整体刷回一次。

use alloc::string::{String, ToString};
use alloc::sync::Arc;

use block_dev::{BlockDevice, BlockStore};

use crate::block_cache::BlockCache;
use crate::layout::{Bitmap, InodeTable, SuperBlock};
use crate::session::SessionTable;
use crate::{BLOCK_SIZE, DataBlock, Error, FIRST_DATA_BLOCK, MAX_DATA_BLOCKS, MIN_BLOCKS, Result};

const SUPER_BLOCK_ID: usize = 0;
const INODE_TABLE_ID: usize = 1;

pub struct TinyFileSystem {
    store: Arc<dyn BlockStore>,
    volume: Option<Volume>,
    sessions: SessionTable,
}

/// 已挂载的卷
pub(crate) struct Volume {
    name: String,
    pub device: Arc<dyn BlockDevice>,
    pub meta: Metadata,
}

/// 内存中的超级块与 inode 表
#[derive(Clone)]
pub(crate) struct Metadata {
    super_block: BlockCache,
    inode_table: BlockCache,
}

impl TinyFileSystem {
    pub fn new(store: Arc<dyn BlockStore>) -> Self {
        Self {
            store,
            volume: None,
            sessions: SessionTable::default(),
        }
    }

    /// 在名为 `name` 的块设备上创建 `size` 字节的空文件系统
    pub fn mkfs(&self, name: &str, size: usize) -> Result<()> {
        let total_blocks = size / BLOCK_SIZE;
        if total_blocks < MIN_BLOCKS {
            log::warn!("mkfs {name}: {size} bytes is too small");
            return Err(Error::BadRequest);
        }
        let data_blocks = total_blocks - FIRST_DATA_BLOCK;
        if data_blocks > MAX_DATA_BLOCKS {
            log::warn!("mkfs {name}: {data_blocks} data blocks exceed the bitmap");
            return Err(Error::BadRequest);
        }
        if self.volume.as_ref().is_some_and(|volume| volume.name == name) {
            log::warn!("mkfs {name}: volume is mounted");
            return Err(Error::BadRequest);
        }

        let device = self.store.open(name, size)?;
        let mut meta = Metadata::format(data_blocks);
        let synced = meta.sync(&device);
        let closed = device.close();
        synced?;
        closed?;

        log::info!("mkfs {name}: {total_blocks} blocks, {data_blocks} for data");
        Ok(())
    }

    pub fn mount(&mut self, name: &str) -> Result<()> {
        if let Some(volume) = &self.volume {
            log::warn!("mount {name}: {} already mounted", volume.name);
            return Err(Error::BadRequest);
        }

        let device = self.store.open(name, 0)?;
        let meta = Metadata::load(&device).and_then(|meta| {
            if !meta.super_block().is_valid() {
                log::warn!("mount {name}: file system not formatted");
                Err(Error::BadRequest)
            } else if !meta.is_consistent() {
                log::warn!("mount {name}: inode table disagrees with bitmaps");
                Err(Error::BadRequest)
            } else {
                Ok(meta)
            }
        });
        let meta = match meta {
            Ok(meta) => meta,
            Err(err) => {
                if let Err(close_err) = device.close() {
                    log::warn!("mount {name}: closing device failed: {close_err}");
                }
                return Err(err);
            }
        };

        log::info!(
            "mount {name}: {} data blocks",
            meta.super_block().data_blocks()
        );
        self.sessions.clear();
        self.volume = Some(Volume {
            name: name.to_string(),
            device,
            meta,
        });
        Ok(())
    }

    /// 刷回元数据并关闭设备。刷回失败时卷保持挂载。
    pub fn unmount(&mut self) -> Result<()> {
        let mut volume = self.volume.take().ok_or(Error::BadRequest)?;
        if let Err(err) = volume.meta.sync(&volume.device) {
            self.volume = Some(volume);
            return Err(err);
        }

        self.sessions.clear();
        volume.device.close()?;

        log::info!("unmount {}", volume.name);
        Ok(())
    }

    #[inline]
    pub fn is_mounted(&self) -> bool {
        self.volume.is_some()
    }

    /// 当前打开的文件数
    pub fn open_files(&self) -> Result<usize> {
        self.volume()?;
        Ok(self.sessions.len())
    }

    /// 已挂载卷的数据块个数
    pub fn data_blocks(&self) -> Result<usize> {
        Ok(self.volume()?.meta.super_block().data_blocks())
    }
}

impl TinyFileSystem {
    #[inline]
    pub(crate) fn volume(&self) -> Result<&Volume> {
        self.volume.as_ref().ok_or(Error::BadRequest)
    }

    #[inline]
    pub(crate) fn mounted(&mut self) -> Result<(&mut Volume, &mut SessionTable)> {
        let volume = self.volume.as_mut().ok_or(Error::BadRequest)?;
        Ok((volume, &mut self.sessions))
    }
}

impl Volume {
    pub fn read_data(&self, block: usize) -> Result<DataBlock> {
        let mut data = [0; BLOCK_SIZE];
        self.device.read_block(FIRST_DATA_BLOCK + block, &mut data)?;
        Ok(data)
    }

    pub fn write_data(&self, block: usize, data: &DataBlock) -> Result<()> {
        self.device.write_block(FIRST_DATA_BLOCK + block, data)?;
        Ok(())
    }
}

impl Metadata {
    fn format(data_blocks: usize) -> Self {
        let mut meta = Self {
            super_block: BlockCache::zeroed(SUPER_BLOCK_ID),
            inode_table: BlockCache::zeroed(INODE_TABLE_ID),
        };
        meta.super_block
            .map_mut(0, |super_block: &mut SuperBlock| super_block.init(data_blocks));
        meta.inode_table
            .map_mut(0, |inode_table: &mut InodeTable| inode_table.init());
        meta
    }

    fn load(block_device: &Arc<dyn BlockDevice>) -> Result<Self> {
        Ok(Self {
            super_block: BlockCache::load(SUPER_BLOCK_ID, block_device)?,
            inode_table: BlockCache::load(INODE_TABLE_ID, block_device)?,
        })
    }

    /// 每个使用中的 inode 都占着 inode 位图，且独占一个范围内、已标记为使用的数据块
    fn is_consistent(&self) -> bool {
        let super_block = self.super_block();
        let data_bitmap = super_block.data_bitmap();
        let mut seen = [false; MAX_DATA_BLOCKS];

        self.inode_table().iter_used().all(|(slot, inode)| {
            let block = inode.block();
            let ok = !super_block.inode_bitmap().is_free(slot)
                && block < data_bitmap.len()
                && !data_bitmap.is_free(block)
                && !seen[block];
            if ok {
                seen[block] = true;
            }
            ok
        })
    }

    #[inline]
    pub fn super_block(&self) -> &SuperBlock {
        self.super_block.get(0)
    }

    #[inline]
    pub fn inode_table(&self) -> &InodeTable {
        self.inode_table.get(0)
    }

    pub fn sync(&mut self, block_device: &Arc<dyn BlockDevice>) -> Result<()> {
        self.super_block.sync(block_device)?;
        self.inode_table.sync(block_device)
    }

    /// 在内存副本上执行 `f`，不写回也不回滚；两个块都被标记为脏
    pub fn stage<V>(&mut self, f: impl FnOnce(&mut SuperBlock, &mut InodeTable) -> V) -> V {
        f(self.super_block.get_mut(0), self.inode_table.get_mut(0))
    }

    /// 在内存副本上执行 `f` 并立即写回。
    ///
    /// 写回失败时内存副本回滚到执行前的状态，并被标记为脏，
    /// 以便下次同步覆盖设备上可能写了一半的元数据。
    pub fn commit<V>(
        &mut self,
        block_device: &Arc<dyn BlockDevice>,
        f: impl FnOnce(&mut SuperBlock, &mut InodeTable) -> V,
    ) -> Result<V> {
        let snapshot = self.clone();
        let value = self.stage(f);

        if let Err(err) = self.sync(block_device) {
            *self = snapshot;
            self.super_block.touch();
            self.inode_table.touch();
            return Err(err);
        }
        Ok(value)
    }
}
