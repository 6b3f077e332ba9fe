//! Lower a [`Chunk`](crate::instruction::Chunk) into flat bytecode
//! to execute!
//!
//! Every instruction becomes an opcode followed by its operands, all plain
//! integers in one array. Loops turn into a pair of conditional jumps whose
//! distances are resolved here, once, so the machine never searches for a
//! matching bracket.
//!
//! For example `,[.-]` compiles to
//!
//! ```text
//!    0: INPUT_BYTE 0
//!    2: JUMP_IF_ZERO 0 8    ; -> 13
//!    5: OUTPUT_BYTE 0
//!    7: CHANGE_VALUE 0 -1
//!   10: JUMP_IF_NOT_ZERO 0 8    ; -> 5
//! ```
//!
//! Both jumps carry the same distance: the number of slots between their
//! distance operands.

pub mod bytecode;
