
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use block_dev::{BlockDevice, BlockStore, DeviceError};

/// 以宿主机上的普通文件模拟块设备
#[derive(Debug)]
pub struct BlockFile(Mutex<Option<File>>);

impl BlockFile {
    pub fn new(fd: File) -> Self {
        Self(Mutex::new(Some(fd)))
    }

    fn with_file<T>(&self, f: impl FnOnce(&mut File) -> io::Result<T>) -> Result<T, DeviceError> {
        let mut file = self.0.lock().map_err(|_| DeviceError::Io)?;
        let file = file.as_mut().ok_or(DeviceError::Closed)?;
        f(file).map_err(io_error)
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        self.with_file(|file| {
            file.seek(SeekFrom::Start((block_id * buf.len()) as u64))?;

            // 文件尾之后视为从未写入，读出全零
            let mut filled = 0;
            while filled < buf.len() {
                match file.read(&mut buf[filled..]) {
                    Ok(0) => break,
                    Ok(n) => filled += n,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => return Err(err),
                }
            }
            buf[filled..].fill(0);

            Ok(())
        })
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        self.with_file(|file| {
            file.seek(SeekFrom::Start((block_id * buf.len()) as u64))?;
            file.write_all(buf)
        })
    }

    fn close(&self) -> Result<(), DeviceError> {
        let file = self
            .0
            .lock()
            .map_err(|_| DeviceError::Io)?
            .take()
            .ok_or(DeviceError::Closed)?;
        file.sync_all().map_err(io_error)
    }
}

/// 以目录为仓库，目录下的每个文件都是一个块设备
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    #[inline]
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl BlockStore for FileStore {
    fn open(&self, name: &str, size_hint: usize) -> Result<Arc<dyn BlockDevice>, DeviceError> {
        let open = || -> io::Result<File> {
            let fd = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(self.path(name))?;
            if size_hint > 0 {
                fd.set_len(0)?;
                fd.set_len(size_hint as u64)?;
            }
            Ok(fd)
        };

        let fd = open().map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => DeviceError::NotFound,
            _ => io_error(err),
        })?;
        log::debug!("open {:?}, size_hint={size_hint}", self.path(name));

        Ok(Arc::new(BlockFile::new(fd)))
    }
}

fn io_error(err: io::Error) -> DeviceError {
    log::error!("block file: {err}");
    DeviceError::Io
}
