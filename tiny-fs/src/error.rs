use block_dev::DeviceError;
use derive_more::Display;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// 未挂载、重复挂载、卷未格式化、参数不合法
    #[display(fmt = "bad request")]
    BadRequest,
    /// 句柄或文件不存在
    #[display(fmt = "not found")]
    NotFound,
    /// 没有空闲的 inode 或数据块
    #[display(fmt = "out of memory")]
    OutOfMemory,
    /// 文件指针已在文件尾
    #[display(fmt = "end of file")]
    EndOfFile,
    /// 底层块设备出错
    #[display(fmt = "internal error")]
    Internal,
}

pub type Result<T> = core::result::Result<T, Error>;

impl From<DeviceError> for Error {
    fn from(err: DeviceError) -> Self {
        log::debug!("device error: {err}");
        Error::Internal
    }
}

impl core::error::Error for Error {}
