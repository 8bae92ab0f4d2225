//! Read-through overlays that splice proposed update blocks onto a local chain.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::chain::{Block, Chain};

/// Shared validity check used by both [`ChainView::is_valid`] and
/// [`crate::chain::Chain::update`], so a chain never has to build a
/// throwaway `ChainView` just to validate a splice before committing it.
///
/// `base_height` is -1 for an empty chain. `updates` must be strictly
/// ascending and contiguous in `number`; the first update's number is either
/// 0 (a full replacement, only allowed if the base chain is empty or has no
/// committed blocks) or in `(last_committed_height, base_height + 1]`.
pub(crate) fn validity_rules(
    base_height: i64,
    last_committed_height: i64,
    base_is_fully_replaceable: bool,
    updates: &[Block],
) -> bool {
    if updates.is_empty() {
        return true;
    }

    let u0 = &updates[0];
    if u0.number() == 0 {
        if !base_is_fully_replaceable {
            return false;
        }
    } else {
        let n0 = u0.number() as i64;
        if n0 > base_height + 1 || n0 <= last_committed_height {
            return false;
        }
    }

    updates
        .windows(2)
        .all(|w| w[1].number() == w[0].number() + 1)
}

/// A read-through overlay: a base chain plus an ordered list of proposed
/// update blocks. Modelled as an immutable pair `(base, updates)` with a pure
/// `get_block`; the only mutable cell is the validity memo (`spec.md` §9).
#[derive(Debug)]
pub struct ChainView {
    base: Arc<Chain>,
    updates: Vec<Block>,
    valid: OnceCell<bool>,
}

impl ChainView {
    pub fn new(base: Arc<Chain>, updates: Vec<Block>) -> Self {
        Self {
            base,
            updates,
            valid: OnceCell::new(),
        }
    }

    /// Returns the block at chain-height `n`, consulting the update list
    /// first if its range covers `n`, otherwise the base chain.
    pub fn get_block(&self, n: u64) -> Option<Block> {
        if let Some(first) = self.updates.first() {
            let first_n = first.number();
            let last_n = self.updates.last().map(Block::number).unwrap_or(first_n);
            if n >= first_n && n <= last_n {
                return self.updates.get((n - first_n) as usize).cloned();
            }
        }
        self.base.get_block(n)
    }

    /// Yields blocks in number order starting from block 0. Consistent
    /// within one `ChainView` instance, which is the only guarantee
    /// `spec.md` §4.1 requires of `iterator()`.
    pub fn iter(&self) -> impl Iterator<Item = Block> + '_ {
        let height = self.height();
        (0..=height).filter_map(move |n| self.get_block(n as u64))
    }

    fn height(&self) -> i64 {
        self.updates
            .last()
            .map(|b| b.number() as i64)
            .unwrap_or_else(|| self.base.height())
    }

    /// Memoizes the validity computation the first time it's called.
    pub fn is_valid(&self) -> bool {
        *self.valid.get_or_init(|| {
            validity_rules(
                self.base.height(),
                self.base.last_committed_number(),
                self.base.is_fully_replaceable(),
                &self.updates,
            )
        })
    }
}

/// The narrower, read-only variant used during source relinking
/// ([`crate::proof::Proof::decode`] Pass B): no validation, just
/// `get_block(n)` returning from `updates` if covered, else `base`.
#[derive(Debug, Clone, Copy)]
pub struct LightView<'a> {
    base: &'a Chain,
    updates: &'a [Block],
}

impl<'a> LightView<'a> {
    pub fn new(base: &'a Chain, updates: &'a [Block]) -> Self {
        Self { base, updates }
    }

    pub fn get_block(&self, n: u64) -> Option<Block> {
        if let Some(first) = self.updates.first() {
            let first_n = first.number();
            let last_n = self.updates.last().map(Block::number).unwrap_or(first_n);
            if n >= first_n && n <= last_n {
                return self.updates.get((n - first_n) as usize).cloned();
            }
        }
        self.base.get_block(n)
    }
}
