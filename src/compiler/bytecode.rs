use std::{fmt, ops::Index};

use tracing::{debug, instrument};

use crate::instruction::{Chunk, Instruction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(isize)]
pub enum Opcode {
    /// `[code] [offset]`
    InputByte = 1,
    /// `[code] [offset]`
    OutputByte = 2,
    /// `[code] [offset] [delta]`
    ChangeValue = 3,
    /// `[code] [offset] [value]`
    SetValue = 4,
    /// `[code] [offset] [distance]`
    JumpIfZero = 5,
    /// `[code] [offset] [distance]`
    JumpIfNotZero = 6,
}

impl Opcode {
    pub fn decode(code: isize) -> Option<Opcode> {
        Some(match code {
            1 => Opcode::InputByte,
            2 => Opcode::OutputByte,
            3 => Opcode::ChangeValue,
            4 => Opcode::SetValue,
            5 => Opcode::JumpIfZero,
            6 => Opcode::JumpIfNotZero,
            _ => return None,
        })
    }

    /// Number of slots the opcode and its operands take up.
    pub fn width(self) -> usize {
        match self {
            Opcode::InputByte | Opcode::OutputByte => 2,
            Opcode::ChangeValue | Opcode::SetValue | Opcode::JumpIfZero | Opcode::JumpIfNotZero => 3,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::InputByte => "INPUT_BYTE",
            Opcode::OutputByte => "OUTPUT_BYTE",
            Opcode::ChangeValue => "CHANGE_VALUE",
            Opcode::SetValue => "SET_VALUE",
            Opcode::JumpIfZero => "JUMP_IF_ZERO",
            Opcode::JumpIfNotZero => "JUMP_IF_NOT_ZERO",
        }
    }
}

/// A compiled program: opcodes and operands in one flat array.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bytecode {
    code: Box<[isize]>,
}

impl Bytecode {
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn as_slice(&self) -> &[isize] {
        &self.code
    }
}

impl Index<usize> for Bytecode {
    type Output = isize;

    fn index(&self, index: usize) -> &isize {
        &self.code[index]
    }
}

/// Disassembly, one `<slot>: <MNEMONIC> <operands>` line per instruction.
impl fmt::Display for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut slot = 0;
        while slot < self.code.len() {
            let Some(op) = Opcode::decode(self.code[slot]) else {
                writeln!(f, "{slot:>4}: ?? {}", self.code[slot])?;
                slot += 1;
                continue;
            };
            let operands = self
                .code
                .get(slot + 1..slot + op.width())
                .unwrap_or_default();

            let line = match (op, operands) {
                (Opcode::JumpIfZero, &[offset, distance]) => format!(
                    "{} {offset} {distance}    ; -> {}",
                    op.mnemonic(),
                    (slot as isize + 2 + distance + 1)
                ),
                (Opcode::JumpIfNotZero, &[offset, distance]) => format!(
                    "{} {offset} {distance}    ; -> {}",
                    op.mnemonic(),
                    (slot as isize + 2 - distance + 1)
                ),
                (_, operands) => operands
                    .iter()
                    .fold(op.mnemonic().to_string(), |acc, operand| {
                        format!("{acc} {operand}")
                    }),
            };
            writeln!(f, "{slot:>4}: {line}")?;
            slot += op.width();
        }
        Ok(())
    }
}

/// Lowers `chunk` into bytecode.
///
/// Panics if the chunk's loops are unbalanced, which a [`Chunk`] coming out of
/// the builder never is.
#[instrument(skip_all)]
pub fn compile(chunk: &Chunk) -> Bytecode {
    let mut dst: Vec<isize> = Vec::with_capacity(chunk.len() * 3);
    // slots holding the distance of still unmatched JUMP_IF_ZEROs
    let mut stack: Vec<usize> = vec![];

    for ins in chunk {
        match *ins {
            Instruction::ChangeValue { offset, delta } => {
                dst.extend([Opcode::ChangeValue as isize, offset, delta.into()])
            }
            Instruction::SetValue { offset, value } => {
                dst.extend([Opcode::SetValue as isize, offset, value.into()])
            }
            Instruction::InputByte { offset } => dst.extend([Opcode::InputByte as isize, offset]),
            Instruction::OutputByte { offset } => {
                dst.extend([Opcode::OutputByte as isize, offset])
            }
            Instruction::StartLoop { offset } => {
                dst.extend([Opcode::JumpIfZero as isize, offset, 0]);
                stack.push(dst.len() - 1);
            }
            Instruction::EndLoop { offset } => {
                let Some(start) = stack.pop() else {
                    panic!("bytecode compiler: unexpected end of loop in chunk");
                };
                dst.extend([Opcode::JumpIfNotZero as isize, offset, 0]);

                let end = dst.len() - 1;
                let distance = (end - start) as isize;
                dst[start] = distance;
                dst[end] = distance;
            }
        }
    }

    assert!(
        stack.is_empty(),
        "bytecode compiler: unexpected end of chunk, {} unpaired loop start(s)",
        stack.len()
    );

    debug!(instructions = chunk.len(), slots = dst.len(), "compiled bytecode");
    Bytecode {
        code: dst.into_boxed_slice(),
    }
}
