//! Basic block construction for one function.
//!
//! The builder always appends user instructions to the newest block. Older
//! blocks are only touched to attach their terminator once the target blocks
//! exist, which is how forward branches are patched.

use tracing::trace;

use crate::ir::{BasicBlock, BlockArena, BlockId, FunctionIr, Instruction, Opcode, Value};
use crate::syntax::SourceLocation;

#[derive(Debug)]
pub struct BlockBuilder {
    blocks: BlockArena,
    current: BlockId,
    next_value: Value,
}

impl Default for BlockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockBuilder {
    /// Starts with the entry block current.
    pub fn new() -> Self {
        let mut blocks = BlockArena::new();
        let current = blocks.alloc(BasicBlock::default());
        Self {
            blocks,
            current,
            next_value: Value::first(),
        }
    }

    pub fn current(&self) -> BlockId {
        self.current
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Opens a fresh block and makes it current.
    pub fn start_block(&mut self) -> BlockId {
        self.current = self.blocks.alloc(BasicBlock::default());
        trace!(block = %self.current, "started block");
        self.current
    }

    pub fn fresh_value(&mut self) -> Value {
        let value = self.next_value;
        self.next_value = value.next();
        value
    }

    pub fn append(&mut self, block: BlockId, inst: Instruction) {
        let target = &mut self.blocks[block];
        debug_assert!(!target.is_terminated(), "{block} already has a terminator");
        target.instructions.push(inst);
    }

    fn append_current(&mut self, inst: Instruction) {
        self.append(self.current, inst);
    }

    pub fn int_const(&mut self, value: u64, location: SourceLocation) -> Value {
        let def = self.fresh_value();
        self.append_current(Instruction::int_const(def, value, location));
        def
    }

    pub fn binary(&mut self, op: Opcode, lhs: Value, rhs: Value, location: SourceLocation) -> Value {
        let def = self.fresh_value();
        self.append_current(Instruction::binary(op, def, lhs, rhs, location));
        def
    }

    pub fn local(&mut self, location: SourceLocation) -> Value {
        let def = self.fresh_value();
        self.append_current(Instruction::local(def, location));
        def
    }

    pub fn ret(&mut self, value: Value, location: SourceLocation) {
        self.append_current(Instruction::ret(value, location));
    }

    /// Closes `block` with an unconditional jump.
    pub fn goto(&mut self, block: BlockId, target: BlockId, location: SourceLocation) {
        self.append(block, Instruction::goto(target, location));
    }

    /// Closes a block that was left open while its targets were built.
    pub fn branch(
        &mut self,
        block: BlockId,
        predicate: Value,
        then: BlockId,
        otherwise: BlockId,
        location: SourceLocation,
    ) {
        self.append(block, Instruction::branch(predicate, then, otherwise, location));
    }

    /// Terminates any block still open with an implicit return and freezes
    /// the blocks into a function.
    pub fn finish(mut self, name: impl Into<String>, location: SourceLocation) -> FunctionIr {
        for (_, block) in self.blocks.iter_mut() {
            if !block.is_terminated() {
                block
                    .instructions
                    .push(Instruction::implicit_return(location));
            }
        }
        FunctionIr::new(name, self.blocks)
    }
}
