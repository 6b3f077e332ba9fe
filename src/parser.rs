//! Turns a token stream into a [`Chunk`], checking that loops are balanced.

use tracing::{debug, instrument};

use crate::{
    instruction::{builder::ChunkBuilder, Chunk},
    lexer::{Lexer, Position, Span, Token, TokenKind},
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("{}: unexpected token ']', no open loop", .0.position)]
    UnmatchedLoopEnd(Token),
    #[error("{}: unexpected end of input, loop not closed", .0.position)]
    UnclosedLoop(Token),
}

impl SyntaxError {
    /// The token the error is about.
    pub fn token(&self) -> &Token {
        match self {
            SyntaxError::UnmatchedLoopEnd(token) | SyntaxError::UnclosedLoop(token) => token,
        }
    }

    pub fn position(&self) -> Position {
        self.token().position
    }

    pub fn span(&self) -> Span {
        self.token().span.clone()
    }
}

/// Parses a token stream. The stream ends at the first [`TokenKind::EndOfInput`]
/// token, or when the iterator runs dry.
#[instrument(skip_all)]
pub fn parse(tokens: impl IntoIterator<Item = Token>) -> Result<Chunk, SyntaxError> {
    let mut builder = ChunkBuilder::new();
    // open loops, outermost first
    let mut stack: Vec<Token> = vec![];
    let mut consumed = 0usize;

    for token in tokens {
        consumed += 1;
        match token.kind {
            TokenKind::EndOfInput => break,
            TokenKind::Increment => builder.change_value(1),
            TokenKind::Decrement => builder.change_value(-1),
            TokenKind::PointerLeft => builder.change_pointer(-1),
            TokenKind::PointerRight => builder.change_pointer(1),
            TokenKind::Read => builder.input_byte(),
            TokenKind::Write => builder.output_byte(),
            TokenKind::LoopStart => {
                stack.push(token);
                builder.start_loop();
            }
            TokenKind::LoopEnd => {
                if stack.pop().is_none() {
                    return Err(SyntaxError::UnmatchedLoopEnd(token));
                }
                builder.end_loop();
            }
        }
    }

    // report the outermost loop, the inner ones might just be missing the same `]`
    if let Some(outermost) = stack.into_iter().next() {
        return Err(SyntaxError::UnclosedLoop(outermost));
    }

    let chunk = builder.finalize();
    debug!(tokens = consumed, instructions = chunk.len(), "parsed chunk");
    Ok(chunk)
}

/// Lexes and parses `source` in one go.
pub fn parse_source(source: &[u8]) -> Result<Chunk, SyntaxError> {
    parse(Lexer::new(source))
}
