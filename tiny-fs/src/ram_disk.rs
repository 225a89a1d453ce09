//! # 内存块设备
//!
//! [`RamStore`] 按名字保存若干段内存介质，克隆出的仓库共享同一批介质，
//! 因此卸载后可以重新挂载。介质可被标记为故障，此后写入一律失败。

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use block_dev::{BlockDevice, BlockStore, DeviceError};
use spin::Mutex;

#[derive(Debug, Default)]
struct Medium {
    bytes: Vec<u8>,
    faulty: bool,
    /// 写入这些块时失败
    faulty_blocks: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct RamStore {
    media: Arc<Mutex<BTreeMap<String, Arc<Mutex<Medium>>>>>,
}

impl RamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 介质的完整拷贝
    pub fn snapshot(&self, name: &str) -> Option<Vec<u8>> {
        self.media
            .lock()
            .get(name)
            .map(|medium| medium.lock().bytes.clone())
    }

    /// 只有写入 `blocks` 中的块会失败，传入空切片即恢复
    pub fn set_faulty_blocks(&self, name: &str, blocks: &[usize]) {
        if let Some(medium) = self.media.lock().get(name) {
            medium.lock().faulty_blocks = blocks.to_vec();
        }
    }

    /// 标记介质故障与否；介质不存在时什么也不做
    pub fn set_faulty(&self, name: &str, faulty: bool) {
        if let Some(medium) = self.media.lock().get(name) {
            medium.lock().faulty = faulty;
        }
    }
}

impl BlockStore for RamStore {
    fn open(&self, name: &str, size_hint: usize) -> Result<Arc<dyn BlockDevice>, DeviceError> {
        let medium = self
            .media
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone();

        if size_hint > 0 {
            let mut medium = medium.lock();
            medium.bytes.clear();
            medium.bytes.resize(size_hint, 0);
        }

        Ok(Arc::new(RamDisk {
            medium,
            closed: AtomicBool::new(false),
        }))
    }
}

/// 打开的内存介质
#[derive(Debug)]
pub struct RamDisk {
    medium: Arc<Mutex<Medium>>,
    closed: AtomicBool,
}

impl RamDisk {
    #[inline]
    fn ensure_open(&self) -> Result<(), DeviceError> {
        if self.closed.load(Ordering::Acquire) {
            Err(DeviceError::Closed)
        } else {
            Ok(())
        }
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        self.ensure_open()?;
        let medium = self.medium.lock();

        let start = (block_id * buf.len()).min(medium.bytes.len());
        let end = (start + buf.len()).min(medium.bytes.len());
        let (head, tail) = buf.split_at_mut(end - start);
        head.copy_from_slice(&medium.bytes[start..end]);
        // 从未写入过的区域读出全零
        tail.fill(0);

        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        self.ensure_open()?;
        let mut medium = self.medium.lock();
        if medium.faulty || medium.faulty_blocks.contains(&block_id) {
            return Err(DeviceError::Io);
        }

        let start = block_id * buf.len();
        let end = start + buf.len();
        if medium.bytes.len() < end {
            medium.bytes.resize(end, 0);
        }
        medium.bytes[start..end].copy_from_slice(buf);

        Ok(())
    }

    fn close(&self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
