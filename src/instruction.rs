//! The mid-level instruction set produced by the optimizing [`builder::ChunkBuilder`].
//!
//! Pointer movement never shows up as its own instruction. Instead every
//! instruction carries the offset, relative to the last materialized pointer
//! position, at which it acts. Only loops actually move the pointer, since the
//! cell they test has to be known at run time.
//!
//! For example `+>>-.<[-]` becomes
//!
//! ```text
//!    0: Change Value at 0 by 1
//!    1: Change Value at 2 by -1
//!    2: Output Byte at 2
//!    3: Set 0 at 1
//! ```

use std::{fmt, ops::Index};

pub mod builder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// Add a (wrapping) delta to the cell at `pointer + offset`.
    ChangeValue { offset: isize, delta: i8 },
    /// Overwrite the cell at `pointer + offset`.
    SetValue { offset: isize, value: u8 },
    InputByte { offset: isize },
    OutputByte { offset: isize },
    /// Move the pointer by `offset`, then skip past the matching [`Instruction::EndLoop`]
    /// if the cell there is zero.
    StartLoop { offset: isize },
    /// Move the pointer by `offset`, then jump back into the loop body if the
    /// cell there is not zero.
    EndLoop { offset: isize },
}

impl Instruction {
    /// The offset of the cell this instruction leaves the pointer looking at.
    ///
    /// This is the instruction's own offset for everything but [`Instruction::EndLoop`]:
    /// once a loop is left, the pointer sits on the cell it tested and offsets
    /// start again from 0.
    pub fn mem_offset(&self) -> isize {
        match *self {
            Instruction::ChangeValue { offset, .. }
            | Instruction::SetValue { offset, .. }
            | Instruction::InputByte { offset }
            | Instruction::OutputByte { offset }
            | Instruction::StartLoop { offset } => offset,
            Instruction::EndLoop { .. } => 0,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::ChangeValue { offset, delta } => {
                write!(f, "Change Value at {offset} by {delta}")
            }
            Instruction::SetValue { offset, value } => write!(f, "Set {value} at {offset}"),
            Instruction::InputByte { offset } => write!(f, "Input Byte at {offset}"),
            Instruction::OutputByte { offset } => write!(f, "Output Byte at {offset}"),
            Instruction::StartLoop { offset } => write!(f, "Start Loop at {offset}"),
            Instruction::EndLoop { offset } => write!(f, "End Loop at {offset}"),
        }
    }
}

/// A finished, immutable sequence of instructions with balanced loops.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chunk {
    instructions: Box<[Instruction]>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    pub fn as_slice(&self) -> &[Instruction] {
        &self.instructions
    }
}

impl Index<usize> for Chunk {
    type Output = Instruction;

    fn index(&self, index: usize) -> &Instruction {
        &self.instructions[index]
    }
}

impl<'a> IntoIterator for &'a Chunk {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Renders the instruction listing, one `<index>: <instruction>` line each.
impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, ins) in self.instructions.iter().enumerate() {
            writeln!(f, "{idx:>4}: {ins}")?;
        }
        Ok(())
    }
}
