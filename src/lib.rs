pub mod compiler;
pub mod instruction;
pub mod lexer;
pub mod parser;
pub mod runtime;

pub use compiler::bytecode::{compile as compile_chunk, Bytecode, Opcode};
pub use instruction::{builder::ChunkBuilder, Chunk, Instruction};
pub use lexer::{Lexer, Position, Token, TokenKind};
pub use parser::{parse, parse_source, SyntaxError};
pub use runtime::{Machine, MachineConfig, RuntimeError, TAPE_SIZE};

/// Lexes, parses and compiles `source` straight to [`Bytecode`].
pub fn compile(source: &[u8]) -> Result<Bytecode, SyntaxError> {
    parse_source(source).map(|chunk| compile_chunk(&chunk))
}
