//! Control-flow IR produced by the checker
//!
//! A module is a list of functions, a function is a list of basic blocks with
//! block 0 as its entry, and a block is an append-only list of instructions
//! ending in exactly one terminator once lowering completes.

use std::fmt;
use std::num::NonZeroU32;
use std::ops::Index;

use id_arena::{Arena, ArenaBehavior};
use serde::{Serialize, Serializer};

use crate::syntax::SourceLocation;

/// Most inputs a single instruction consumes.
pub const MAX_INPUTS: usize = 4;

/// Names an instruction's result. Ids start at 1 and are never reused within
/// a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Value(NonZeroU32);

impl Value {
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn first() -> Self {
        Self(NonZeroU32::MIN)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BlockId(usize);

impl BlockId {
    pub const ENTRY: BlockId = BlockId(0);

    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Arena id scheme for blocks. Ids carry no per-arena tag, so two lowerings
/// of the same tree produce equal ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockIds;

impl ArenaBehavior for BlockIds {
    type Id = BlockId;

    fn new_id(_arena_id: u32, index: usize) -> BlockId {
        BlockId(index)
    }

    fn index(id: BlockId) -> usize {
        id.0
    }

    fn arena_id(_id: BlockId) -> u32 {
        0
    }

    fn new_arena_id() -> u32 {
        0
    }
}

pub type BlockArena = Arena<BasicBlock, BlockIds>;

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Opcode {
    IntConst,
    Add,
    Sub,
    Mul,
    Div,
    Local,
    Return,
    Goto,
    Branch,
}

impl Opcode {
    pub fn name(self) -> &'static str {
        match self {
            Opcode::IntConst => "int-const",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Local => "local",
            Opcode::Return => "return",
            Opcode::Goto => "goto",
            Opcode::Branch => "branch",
        }
    }

    pub fn is_terminator(self) -> bool {
        matches!(self, Opcode::Return | Opcode::Goto | Opcode::Branch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Payload {
    None,
    Int(u64),
    Jump(BlockId),
    Branch { then: BlockId, otherwise: BlockId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction {
    pub op: Opcode,
    pub def: Option<Value>,
    pub inputs: Vec<Value>,
    pub payload: Payload,
    pub location: SourceLocation,
    /// Inserted to link blocks or close a function, not written by the user.
    pub synthetic: bool,
}

impl Instruction {
    fn new(op: Opcode, def: Option<Value>, inputs: Vec<Value>, location: SourceLocation) -> Self {
        debug_assert!(inputs.len() <= MAX_INPUTS);
        Self {
            op,
            def,
            inputs,
            payload: Payload::None,
            location,
            synthetic: false,
        }
    }

    pub fn int_const(def: Value, value: u64, location: SourceLocation) -> Self {
        Self {
            payload: Payload::Int(value),
            ..Self::new(Opcode::IntConst, Some(def), Vec::new(), location)
        }
    }

    pub fn binary(
        op: Opcode,
        def: Value,
        lhs: Value,
        rhs: Value,
        location: SourceLocation,
    ) -> Self {
        Self::new(op, Some(def), vec![lhs, rhs], location)
    }

    pub fn local(def: Value, location: SourceLocation) -> Self {
        Self::new(Opcode::Local, Some(def), Vec::new(), location)
    }

    pub fn ret(value: Value, location: SourceLocation) -> Self {
        Self::new(Opcode::Return, None, vec![value], location)
    }

    /// Closes a function whose body falls off its end.
    pub fn implicit_return(location: SourceLocation) -> Self {
        Self {
            synthetic: true,
            ..Self::new(Opcode::Return, None, Vec::new(), location)
        }
    }

    pub fn goto(target: BlockId, location: SourceLocation) -> Self {
        Self {
            payload: Payload::Jump(target),
            synthetic: true,
            ..Self::new(Opcode::Goto, None, Vec::new(), location)
        }
    }

    pub fn branch(
        predicate: Value,
        then: BlockId,
        otherwise: BlockId,
        location: SourceLocation,
    ) -> Self {
        Self {
            payload: Payload::Branch { then, otherwise },
            ..Self::new(Opcode::Branch, None, vec![predicate], location)
        }
    }

    pub fn is_terminator(&self) -> bool {
        self.op.is_terminator()
    }

    /// Blocks control may transfer to, true target first.
    pub fn successors(&self) -> impl Iterator<Item = BlockId> {
        let targets = match self.payload {
            Payload::Jump(target) => [Some(target), None],
            Payload::Branch { then, otherwise } => [Some(then), Some(otherwise)],
            Payload::None | Payload::Int(_) => [None, None],
        };
        targets.into_iter().flatten()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(def) = self.def {
            write!(f, "{def} = ")?;
        }
        f.write_str(self.op.name())?;

        let mut separator = " ";
        for input in &self.inputs {
            write!(f, "{separator}{input}")?;
            separator = ", ";
        }

        match self.payload {
            Payload::None => Ok(()),
            Payload::Int(value) => write!(f, "{separator}{value}"),
            Payload::Jump(target) => write!(f, "{separator}{target}"),
            Payload::Branch { then, otherwise } => {
                write!(f, "{separator}{then}, {otherwise}")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BasicBlock {
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|inst| inst.is_terminator())
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator().is_some()
    }

    pub fn successors(&self) -> impl Iterator<Item = BlockId> {
        self.terminator()
            .into_iter()
            .flat_map(Instruction::successors)
    }

    /// First instruction that came from user code rather than block linking.
    pub fn first_user_instruction(&self) -> Option<&Instruction> {
        self.instructions.iter().find(|inst| !inst.synthetic)
    }
}

#[derive(Debug, Serialize)]
pub struct FunctionIr {
    pub name: String,
    #[serde(serialize_with = "serialize_blocks")]
    blocks: BlockArena,
}

fn serialize_blocks<S: Serializer>(blocks: &BlockArena, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(blocks.iter().map(|(_, block)| block))
}

impl FunctionIr {
    pub fn new(name: impl Into<String>, blocks: BlockArena) -> Self {
        Self {
            name: name.into(),
            blocks,
        }
    }

    /// Allocates `blocks` in order, so the first one becomes the entry.
    pub fn from_blocks(name: impl Into<String>, blocks: impl IntoIterator<Item = BasicBlock>) -> Self {
        let mut arena = BlockArena::new();
        for block in blocks {
            arena.alloc(block);
        }
        Self::new(name, arena)
    }

    pub fn entry(&self) -> BlockId {
        BlockId::ENTRY
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        self.blocks.iter().map(|(id, _)| id)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter().map(|(_, block)| block)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> {
        self.blocks.iter()
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks().flat_map(|block| block.instructions.iter())
    }

    /// Number of values defined, which is also the highest value id.
    pub fn value_count(&self) -> usize {
        self.instructions().filter(|inst| inst.def.is_some()).count()
    }
}

impl Index<BlockId> for FunctionIr {
    type Output = BasicBlock;

    fn index(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id]
    }
}

impl PartialEq for FunctionIr {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.blocks().eq(other.blocks())
    }
}

impl Eq for FunctionIr {}

impl fmt::Display for FunctionIr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "fn {} {{", self.name)?;
        for (id, block) in self.iter() {
            writeln!(f, "{id}:")?;
            for inst in &block.instructions {
                writeln!(f, "  {inst}")?;
            }
        }
        write!(f, "}}")
    }
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct ModuleIr {
    pub functions: Vec<FunctionIr>,
}

impl ModuleIr {
    pub fn function(&self, name: &str) -> Option<&FunctionIr> {
        self.functions.iter().find(|func| func.name == name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for ModuleIr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, func) in self.functions.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
                writeln!(f)?;
            }
            write!(f, "{func}")?;
        }
        Ok(())
    }
}
