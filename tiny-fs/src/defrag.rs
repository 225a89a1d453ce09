//! # 碎片整理
//!
//! 交换数据块，使所有空闲块连续地排在卷尾，文件内容不变。
//!
//! 用双指针划分数据块位图得到交换计划：`l` 从头、`r` 从尾向中间移动，
//! `l` 空闲且 `r` 已用时记下一次交换。每个块至多参与一次交换，
//! 因此 inode 中的块编号只需按交换对调一遍。

use alloc::vec::Vec;

use crate::layout::{Bitmap, BlockState};
use crate::tfs::Volume;
use crate::{Result, TinyFileSystem};

/// 计算交换计划，每项 `(l, r)` 满足 `l < r`，`l` 空闲而 `r` 已用
pub fn plan_swaps(bitmap: &[u8]) -> Vec<(usize, usize)> {
    let mut swaps = Vec::new();
    if bitmap.is_empty() {
        return swaps;
    }

    let (mut l, mut r) = (0, bitmap.len() - 1);
    while l < r {
        match (bitmap.state(l), bitmap.state(r)) {
            (BlockState::Free, BlockState::Used) => {
                swaps.push((l, r));
                l += 1;
                r -= 1;
            }
            (BlockState::Used, BlockState::Free) => {
                l += 1;
                r -= 1;
            }
            (BlockState::Used, BlockState::Used) => l += 1,
            (BlockState::Free, BlockState::Free) => r -= 1,
        }
    }

    swaps
}

impl TinyFileSystem {
    /// 整理碎片，返回交换的次数。
    ///
    /// 某次交换中途出错时，已完成的交换仍会写回元数据，随后报错。
    /// 元数据写回失败时，内存副本保持交换后的状态并留待下次同步。
    pub fn defrag(&mut self) -> Result<usize> {
        let (volume, sessions) = self.mounted()?;
        let swaps = plan_swaps(volume.meta.super_block().data_bitmap());

        let mut outcome = Ok(());
        let mut done = 0;
        for &(l, r) in &swaps {
            if let Err(err) = volume.swap_blocks(l, r) {
                outcome = Err(err);
                break;
            }
            log::debug!("defrag: block {r} -> {l}");
            done += 1;
        }

        // 数据块已经搬动，元数据无论能否写回都必须随之更新
        let applied = &swaps[..done];
        volume.meta.stage(|super_block, inode_table| {
            for &(l, r) in applied {
                super_block.swap_data_slots(l, r);
                inode_table.remap_blocks(l, r);
            }
        });
        for &(l, r) in applied {
            sessions.remap_blocks(l, r);
        }
        volume.meta.sync(&volume.device)?;
        outcome?;

        log::info!("defrag: {done} blocks moved");
        Ok(done)
    }
}

impl Volume {
    fn swap_blocks(&self, l: usize, r: usize) -> Result<()> {
        let left = self.read_data(l)?;
        let right = self.read_data(r)?;
        self.write_data(l, &right)?;
        self.write_data(r, &left)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::plan_swaps;

    const F: u8 = 1;
    const U: u8 = 0;

    /// 按计划交换后，空闲块应全部位于尾部
    fn apply(bitmap: &[u8]) -> Vec<u8> {
        let mut bitmap = bitmap.to_vec();
        for (l, r) in plan_swaps(&bitmap) {
            assert!(l < r);
            assert_eq!((bitmap[l], bitmap[r]), (F, U));
            bitmap.swap(l, r);
        }
        bitmap
    }

    fn is_compacted(bitmap: &[u8]) -> bool {
        let used = bitmap.iter().take_while(|&&raw| raw == U).count();
        bitmap[used..].iter().all(|&raw| raw == F)
    }

    #[test]
    fn plan() {
        assert_eq!(plan_swaps(&[]), vec![]);
        assert_eq!(plan_swaps(&[F]), vec![]);
        assert_eq!(plan_swaps(&[U, U, F, F]), vec![]);
        assert_eq!(plan_swaps(&[F, U]), vec![(0, 1)]);
        assert_eq!(plan_swaps(&[F, U, F, U, U]), vec![(0, 4), (2, 3)]);
    }

    #[test]
    fn every_layout_ends_compacted() {
        // 穷举长度不超过 8 的全部位图
        for len in 0..=8 {
            for bits in 0..(1u32 << len) {
                let bitmap: Vec<u8> = (0..len).map(|i| ((bits >> i) & 1) as u8).collect();
                let compacted = apply(&bitmap);

                assert!(is_compacted(&compacted), "{bitmap:?} -> {compacted:?}");
                let frees = |b: &[u8]| b.iter().filter(|&&raw| raw == F).count();
                assert_eq!(frees(&bitmap), frees(&compacted));
            }
        }
    }
}
