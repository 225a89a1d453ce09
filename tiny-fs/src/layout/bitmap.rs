//! 位图：每个槽位一个字节，1 表示空闲，0 表示已用。

/// 位图项的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockState {
    Used = 0,
    Free = 1,
}

impl From<u8> for BlockState {
    fn from(raw: u8) -> Self {
        if raw == BlockState::Free as u8 {
            BlockState::Free
        } else {
            BlockState::Used
        }
    }
}

/// 以字节切片表示的位图
pub trait Bitmap {
    fn state(&self, index: usize) -> BlockState;

    fn set(&mut self, index: usize, state: BlockState);

    /// 首次适配：返回第一个空闲槽位
    fn first_free(&self) -> Option<usize>;

    #[inline]
    fn is_free(&self, index: usize) -> bool {
        self.state(index) == BlockState::Free
    }
}

impl Bitmap for [u8] {
    #[inline]
    fn state(&self, index: usize) -> BlockState {
        self[index].into()
    }

    #[inline]
    fn set(&mut self, index: usize, state: BlockState) {
        self[index] = state as u8;
    }

    fn first_free(&self) -> Option<usize> {
        self.iter()
            .position(|&raw| BlockState::from(raw) == BlockState::Free)
    }
}
