//! # 会话表
//!
//! 打开文件后得到的句柄对应一个会话，记录文件所在 inode、
//! 数据块编号与读指针。会话只存在于内存中，卸载时全部丢弃。

use alloc::collections::BTreeMap;

use derive_more::Display;

use crate::layout::FileName;
use crate::{Error, Result};

/// 打开文件的句柄。
///
/// 由单调递增的计数器分配，在同一个文件系统实例中永不重复。
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display(fmt = "{}", _0)]
pub struct FileHandle(u32);

#[derive(Debug)]
pub struct Session {
    /// inode 槽位
    pub inode: usize,
    pub name: FileName,
    /// 数据块编号
    pub block: usize,
    /// 读指针
    pub cursor: usize,
}

impl Session {
    #[inline]
    pub fn new(inode: usize, name: FileName, block: usize) -> Self {
        Self {
            inode,
            name,
            block,
            cursor: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: BTreeMap<FileHandle, Session>,
    next_handle: u32,
}

impl SessionTable {
    /// 句柄计数器耗尽时返回 [`Error::OutOfMemory`]
    pub fn insert(&mut self, session: Session) -> Result<FileHandle> {
        let handle = FileHandle(self.next_handle);
        self.next_handle = self.next_handle.checked_add(1).ok_or(Error::OutOfMemory)?;
        self.sessions.insert(handle, session);
        Ok(handle)
    }

    pub fn find_by_name(&self, name: &FileName) -> Option<FileHandle> {
        self.sessions
            .iter()
            .find_map(|(&handle, session)| (session.name == *name).then_some(handle))
    }

    #[inline]
    pub fn get(&self, handle: FileHandle) -> Result<&Session> {
        self.sessions.get(&handle).ok_or(Error::NotFound)
    }

    #[inline]
    pub fn get_mut(&mut self, handle: FileHandle) -> Result<&mut Session> {
        self.sessions.get_mut(&handle).ok_or(Error::NotFound)
    }

    #[inline]
    pub fn remove(&mut self, handle: FileHandle) -> Result<Session> {
        self.sessions.remove(&handle).ok_or(Error::NotFound)
    }

    /// 丢弃全部会话，但不重置句柄计数器
    #[inline]
    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn remap_blocks(&mut self, l: usize, r: usize) {
        for session in self.sessions.values_mut() {
            if session.block == l {
                session.block = r;
            } else if session.block == r {
                session.block = l;
            }
        }
    }
}
