//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备；
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! [`BlockStore`] 则按名字打开（或创建）块设备，
//! 相当于一个装着许多块设备的“仓库”。

#![no_std]

extern crate alloc;

use alloc::sync::Arc;
use core::any::Any;

use derive_more::Display;

/// 块设备驱动特质
///
/// 块大小即调用者传入缓冲区的长度，第 `block_id` 块位于
/// `block_id * buf.len()` 字节处。从未写入过的区域读出全零。
pub trait BlockDevice: Send + Sync + Any {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError>;
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError>;
    /// 关闭设备，此后的任何读写都返回 [`DeviceError::Closed`]
    fn close(&self) -> Result<(), DeviceError>;
}

/// 块设备仓库特质
pub trait BlockStore: Send + Sync {
    /// 打开名为 `name` 的块设备。
    ///
    /// - `size_hint == 0`：打开已有设备，不改变其大小（不存在则创建空设备）；
    /// - `size_hint > 0`：创建或截断设备，使其恰好为 `size_hint` 字节且全为零。
    fn open(&self, name: &str, size_hint: usize) -> Result<Arc<dyn BlockDevice>, DeviceError>;
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    #[display(fmt = "device already closed")]
    Closed,
    #[display(fmt = "no such device")]
    NotFound,
    #[display(fmt = "device i/o failure")]
    Io,
}

impl core::error::Error for DeviceError {}
