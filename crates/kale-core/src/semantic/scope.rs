//! Lexical scopes for local declarations
//!
//! Each lexical block owns a frame: an open-addressed table (linear probing)
//! from identifier text to the value naming the local's storage slot. Frames
//! are stacked while the checker walks nested blocks and dropped as each block
//! closes, so lookup resolves innermost-first.

use std::hash::BuildHasher;

use rustc_hash::FxBuildHasher;

use crate::ir::Value;

const INITIAL_CAPACITY: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{name}' is already declared in this scope")]
pub struct DuplicateSymbol {
    pub name: String,
    pub existing: Value,
}

#[derive(Debug, Clone)]
struct Entry {
    name: Box<str>,
    value: Value,
}

/// One lexical block's symbols. Storage is allocated on first insert.
#[derive(Debug, Default)]
pub struct ScopeFrame {
    slots: Vec<Option<Entry>>,
    len: usize,
}

impl ScopeFrame {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        // Never-written frames have no slots to scan.
        if self.slots.is_empty() {
            return None;
        }

        let mask = self.slots.len() - 1;
        let mut index = slot_for(name, mask);
        loop {
            match &self.slots[index] {
                Some(entry) if &*entry.name == name => return Some(entry.value),
                Some(_) => index = (index + 1) & mask,
                None => return None,
            }
        }
    }

    /// Inserts `name` unless it is already present; returns the value it is
    /// bound to afterwards.
    pub fn insert(&mut self, name: &str, value: Value) -> Value {
        if let Some(existing) = self.get(name) {
            return existing;
        }

        if (self.len + 1) * 2 > self.slots.len() {
            self.grow();
        }

        let mask = self.slots.len() - 1;
        let mut index = slot_for(name, mask);
        while self.slots[index].is_some() {
            index = (index + 1) & mask;
        }

        self.slots[index] = Some(Entry {
            name: name.into(),
            value,
        });
        self.len += 1;
        value
    }

    fn grow(&mut self) {
        let capacity = match self.slots.len() {
            0 => INITIAL_CAPACITY,
            n => n * 2,
        };
        let old = std::mem::replace(&mut self.slots, vec![None; capacity]);
        let mask = capacity - 1;

        for entry in old.into_iter().flatten() {
            let mut index = slot_for(&entry.name, mask);
            while self.slots[index].is_some() {
                index = (index + 1) & mask;
            }
            self.slots[index] = Some(entry);
        }
    }
}

fn slot_for(name: &str, mask: usize) -> usize {
    (FxBuildHasher.hash_one(name) as usize) & mask
}

/// Stack of [`ScopeFrame`]s, innermost last.
#[derive(Debug, Default)]
pub struct ScopeTable {
    frames: Vec<ScopeFrame>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn enter_scope(&mut self) {
        self.frames.push(ScopeFrame::default());
    }

    /// Drops the innermost frame and every binding in it.
    pub fn exit_scope(&mut self) -> Option<ScopeFrame> {
        self.frames.pop()
    }

    /// Binds `name` in the innermost scope, opening one if none is active.
    pub fn declare(&mut self, name: &str, value: Value) -> Result<(), DuplicateSymbol> {
        if let Some(existing) = self.lookup_innermost(name) {
            return Err(DuplicateSymbol {
                name: name.to_string(),
                existing,
            });
        }

        if self.frames.is_empty() {
            self.enter_scope();
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name, value);
        }
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn lookup_innermost(&self, name: &str) -> Option<Value> {
        self.frames.last().and_then(|frame| frame.get(name))
    }
}
