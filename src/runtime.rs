//! The tape machine that runs [`Bytecode`].

use std::io::{self, Read, Write};

use tracing::{debug, instrument};

use crate::compiler::bytecode::{Bytecode, Opcode};

pub mod output;

use output::OutputBuffer;

/// Number of cells on the tape. The tape never grows.
pub const TAPE_SIZE: usize = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    /// Buffered output is written out once it grows past this many bytes.
    pub flush_threshold: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            flush_threshold: 50,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RuntimeError {
    #[error("pointer moved off the tape: cell {0} is outside 0..{TAPE_SIZE}")]
    PointerOutOfBounds(isize),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// A tape of [`TAPE_SIZE`] byte cells and a pointer into it.
///
/// The machine keeps its state between calls to [`Machine::run`], so several
/// programs can work on the same tape one after another.
#[derive(Debug, Clone)]
pub struct Machine {
    memory: Box<[u8]>,
    pointer: isize,
    config: MachineConfig,
}

impl Default for Machine {
    fn default() -> Self {
        Self::with_config(MachineConfig::default())
    }
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MachineConfig) -> Self {
        Self {
            memory: vec![0; TAPE_SIZE].into_boxed_slice(),
            pointer: 0,
            config,
        }
    }

    pub fn pointer(&self) -> isize {
        self.pointer
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// The cell at `index`, counted from the left edge of the tape.
    pub fn cell(&self, index: usize) -> Option<u8> {
        self.memory.get(index).copied()
    }

    /// The cell under the pointer, if the pointer is on the tape.
    pub fn current_cell(&self) -> Option<u8> {
        usize::try_from(self.pointer)
            .ok()
            .and_then(|idx| self.memory.get(idx).copied())
    }

    fn cell_index(&self, offset: isize) -> Result<usize, RuntimeError> {
        let target = self.pointer + offset;
        usize::try_from(target)
            .ok()
            .filter(|&idx| idx < self.memory.len())
            .ok_or(RuntimeError::PointerOutOfBounds(target))
    }

    /// Runs `program` to completion, reading bytes from `input` and writing to
    /// `output`.
    ///
    /// Reading past the end of `input` leaves the cell untouched. Output is
    /// flushed when the program halts normally; on error whatever is still
    /// buffered is dropped.
    ///
    /// Panics on an unknown opcode, as [`Bytecode`] only comes out of the compiler.
    #[instrument(skip_all, fields(slots = program.len()))]
    pub fn run(
        &mut self,
        program: &Bytecode,
        mut input: impl Read,
        output: impl Write,
    ) -> Result<(), RuntimeError> {
        let code = program.as_slice();
        let mut output = OutputBuffer::new(output, self.config.flush_threshold);
        let mut executed = 0u64;

        let mut i = 0;
        while i < code.len() {
            let Some(op) = Opcode::decode(code[i]) else {
                panic!("machine: invalid opcode {} at slot {i}", code[i]);
            };
            executed += 1;

            match op {
                Opcode::ChangeValue => {
                    let idx = self.cell_index(code[i + 1])?;
                    // the delta is an i8, truncating keeps its two's complement bits
                    self.memory[idx] = self.memory[idx].wrapping_add(code[i + 2] as u8);
                    i += 3;
                }
                Opcode::SetValue => {
                    let idx = self.cell_index(code[i + 1])?;
                    self.memory[idx] = code[i + 2] as u8;
                    i += 3;
                }
                Opcode::InputByte => {
                    let idx = self.cell_index(code[i + 1])?;
                    // let any prompt out before blocking on input
                    output.flush()?;
                    if let Some(byte) = read_byte(&mut input)? {
                        self.memory[idx] = byte;
                    }
                    i += 2;
                }
                Opcode::OutputByte => {
                    let idx = self.cell_index(code[i + 1])?;
                    output.push(self.memory[idx])?;
                    i += 2;
                }
                Opcode::JumpIfZero => {
                    self.pointer += code[i + 1];
                    let idx = self.cell_index(0)?;
                    let distance = code[i + 2] as usize;
                    if self.memory[idx] == 0 {
                        // lands right after the matching JUMP_IF_NOT_ZERO
                        i = i + 2 + distance + 1;
                    } else {
                        i += 3;
                    }
                }
                Opcode::JumpIfNotZero => {
                    self.pointer += code[i + 1];
                    let idx = self.cell_index(0)?;
                    let distance = code[i + 2] as usize;
                    if self.memory[idx] != 0 {
                        // lands on the first instruction of the loop body
                        i = i + 2 - distance + 1;
                    } else {
                        i += 3;
                    }
                }
            }
        }

        output.flush()?;
        debug!(executed, pointer = self.pointer, "machine halted");
        Ok(())
    }
}

fn read_byte(input: &mut impl Read) -> io::Result<Option<u8>> {
    let mut byte = [0u8];
    loop {
        match input.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
}
