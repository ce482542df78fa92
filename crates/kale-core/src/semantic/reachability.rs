//! Unreachable block detection over a lowered function.

use tracing::debug;

use crate::diagnostic::{CheckErrorKind, Diagnostic, Severity};
use crate::ir::{BlockId, FunctionIr};

/// Fixed-size set of block indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitSet {
    words: Vec<u64>,
    capacity: usize,
}

impl BitSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(64)],
            capacity,
        }
    }

    /// Returns `true` if `index` was not already present.
    pub fn insert(&mut self, index: usize) -> bool {
        debug_assert!(index < self.capacity, "{index} out of range");
        let (word, bit) = (index / 64, 1u64 << (index % 64));
        let fresh = self.words[word] & bit == 0;
        self.words[word] |= bit;
        fresh
    }

    pub fn contains(&self, index: usize) -> bool {
        index < self.capacity && self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.capacity).filter(move |&index| self.contains(index))
    }
}

/// Blocks reachable from the entry through terminator edges.
pub fn reachable_blocks(func: &FunctionIr) -> BitSet {
    let mut seen = BitSet::with_capacity(func.block_count());
    if func.block_count() == 0 {
        return seen;
    }

    let mut stack = vec![func.entry()];
    seen.insert(func.entry().index());

    while let Some(id) = stack.pop() {
        let Some(block) = func.block(id) else {
            continue;
        };
        for succ in block.successors() {
            if succ.index() < func.block_count() && seen.insert(succ.index()) {
                stack.push(succ);
            }
        }
    }

    seen
}

/// Reports each unreachable block that holds user code.
///
/// Blocks made only of synthetic jumps and implicit returns are skipped: the
/// lowering opens such blocks after every `return` and they are not something
/// the user wrote. Diagnostics are ordered by block index.
pub fn check_unreachable(func: &FunctionIr, severity: Severity) -> Result<(), Vec<Diagnostic>> {
    let reachable = reachable_blocks(func);

    let diagnostics: Vec<_> = func
        .iter()
        .filter(|(id, _)| !reachable.contains(id.index()))
        .filter_map(|(id, block)| {
            let inst = block.first_user_instruction()?;
            debug!(function = %func.name, block = %id, "unreachable block");
            Some(
                Diagnostic::new(CheckErrorKind::Unreachable, severity, inst.location)
                    .with_function(&func.name),
            )
        })
        .collect();

    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Unreachable block ids, in index order, whether or not they hold user code.
pub fn unreachable_blocks(func: &FunctionIr) -> Vec<BlockId> {
    let reachable = reachable_blocks(func);
    func.block_ids()
        .filter(|id| !reachable.contains(id.index()))
        .collect()
}
