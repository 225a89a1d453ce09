//! # 文件操作层
//!
//! 调用者只接触句柄，不接触块编号。
//! 每个文件占一个数据块，写入总是整块覆盖，读取则逐字节推进读指针。

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::layout::FileName;
use crate::session::Session;
use crate::tfs::Volume;
use crate::{BLOCK_SIZE, EOF_CURSOR, Error, FileHandle, Result, TinyFileSystem};

pub use crate::layout::BlockState;

impl TinyFileSystem {
    /// 打开文件，不存在则创建。
    ///
    /// 同名文件已经打开时，返回已有的句柄。
    pub fn open(&mut self, name: &str) -> Result<FileHandle> {
        let (volume, sessions) = self.mounted()?;
        let name = FileName::new(name)?;

        if let Some(handle) = sessions.find_by_name(&name) {
            return Ok(handle);
        }

        let inode_table = volume.meta.inode_table();
        let (inode, block) = match inode_table.find(&name) {
            Some(inode) => (inode, inode_table.get(inode).block()),
            None => volume.create(name)?,
        };

        let handle = sessions.insert(Session::new(inode, name, block))?;
        log::debug!("open {name}: handle={handle}, inode={inode}, block={block}");
        Ok(handle)
    }

    pub fn close(&mut self, handle: FileHandle) -> Result<()> {
        let (_, sessions) = self.mounted()?;
        sessions.remove(handle)?;
        Ok(())
    }

    /// 以 `data` 覆盖整个文件，不足一块的部分补零，并把读指针移回开头。
    /// 超过一块的数据会被拒绝。
    pub fn write(&mut self, handle: FileHandle, data: &[u8]) -> Result<()> {
        let (volume, sessions) = self.mounted()?;
        let session = sessions.get_mut(handle)?;

        if data.len() > BLOCK_SIZE {
            log::warn!(
                "write {}: {} bytes exceed one block",
                session.name,
                data.len()
            );
            return Err(Error::BadRequest);
        }

        let mut block = [0; BLOCK_SIZE];
        block[..data.len()].copy_from_slice(data);
        volume.write_data(session.block, &block)?;
        session.cursor = 0;

        Ok(())
    }

    /// 读出读指针处的一个字节，并把读指针后移一位。
    /// 读指针已在文件尾时报错，且读指针不动。
    pub fn read_byte(&mut self, handle: FileHandle) -> Result<u8> {
        let (volume, sessions) = self.mounted()?;
        let session = sessions.get_mut(handle)?;

        if session.cursor >= EOF_CURSOR {
            return Err(Error::EndOfFile);
        }

        let block = volume.read_data(session.block)?;
        let byte = block[session.cursor];
        session.cursor += 1;

        Ok(byte)
    }

    /// 读出从读指针到文件尾的全部字节
    pub fn read_to_end(&mut self, handle: FileHandle) -> Result<Vec<u8>> {
        let (volume, sessions) = self.mounted()?;
        let session = sessions.get_mut(handle)?;

        let cursor = session.cursor.min(EOF_CURSOR);
        let block = volume.read_data(session.block)?;
        session.cursor = EOF_CURSOR;

        Ok(block[cursor..EOF_CURSOR].to_vec())
    }

    /// 把读指针移到 `offset`，超出文件尾的偏移落在文件尾
    pub fn seek(&mut self, handle: FileHandle, offset: usize) -> Result<()> {
        let (_, sessions) = self.mounted()?;
        sessions.get_mut(handle)?.cursor = offset.min(EOF_CURSOR);
        Ok(())
    }

    /// 删除文件：释放 inode 与数据块，并立即写回元数据
    pub fn delete(&mut self, handle: FileHandle) -> Result<()> {
        let (volume, sessions) = self.mounted()?;
        let &Session {
            inode, name, block, ..
        } = sessions.get(handle)?;

        volume.meta.commit(&volume.device, |super_block, inode_table| {
            inode_table.get_mut(inode).init();
            super_block.release(inode, block);
        })?;
        sessions.remove(handle)?;

        log::debug!("delete {name}: inode={inode}, block={block}");
        Ok(())
    }

    /// 重命名文件。新名字已被另一个文件占用时报错。
    pub fn rename(&mut self, handle: FileHandle, new_name: &str) -> Result<()> {
        let (volume, sessions) = self.mounted()?;
        let session = sessions.get_mut(handle)?;
        let new_name = FileName::new(new_name)?;

        let inode = session.inode;
        if volume
            .meta
            .inode_table()
            .find(&new_name)
            .is_some_and(|other| other != inode)
        {
            log::warn!("rename {}: {new_name} already exists", session.name);
            return Err(Error::BadRequest);
        }

        volume.meta.commit(&volume.device, |_, inode_table| {
            inode_table.get_mut(inode).rename(new_name)
        })?;

        log::debug!("rename {} -> {new_name}", session.name);
        session.name = new_name;
        Ok(())
    }

    /// 名为 `name` 的文件是否存在
    pub fn exists(&self, name: &str) -> Result<bool> {
        let volume = self.volume()?;
        let name = FileName::new(name)?;
        Ok(volume.meta.inode_table().find(&name).is_some())
    }

    /// 列出全部文件名
    pub fn list_names(&self) -> Result<Vec<String>> {
        let volume = self.volume()?;
        Ok(volume
            .meta
            .inode_table()
            .iter_used()
            .map(|(_, inode)| inode.name().to_string())
            .collect())
    }

    /// 数据块的分配图，按编号排列
    pub fn fragments(&self) -> Result<Vec<BlockState>> {
        let volume = self.volume()?;
        Ok(volume
            .meta
            .super_block()
            .data_bitmap()
            .iter()
            .map(|&raw| BlockState::from(raw))
            .collect())
    }
}

impl Volume {
    /// 分配 inode 与数据块并登记新文件，返回 `(inode, 数据块)`。
    ///
    /// 先清零数据块，再一次性提交两张位图与 inode 记录，
    /// 任何一步失败都不会留下“已标记未写入”的槽位。
    fn create(&mut self, name: FileName) -> Result<(usize, usize)> {
        let (inode, block) = self.meta.super_block().find_free_inode_and_block()?;

        self.write_data(block, &[0; BLOCK_SIZE])?;
        self.meta.commit(&self.device, |super_block, inode_table| {
            super_block.claim(inode, block);
            inode_table.get_mut(inode).occupy(name, block);
        })?;

        log::debug!("create {name}: inode={inode}, block={block}");
        Ok((inode, block))
    }
}
