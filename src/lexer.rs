use std::{fmt, iter::FusedIterator};

pub use logos::Span;
use logos::Logos;

/// The raw symbols recognized by [`logos`]. Anything else in the source is
/// commentary and comes back from the logos lexer as an error, which we skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Logos)]
#[logos(source = [u8])]
enum Symbol {
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("<")]
    LeftArrow,
    #[token(">")]
    RightArrow,
    #[token(",")]
    Comma,
    #[token(".")]
    Period,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    // Only used for position tracking, never surfaces as a token
    #[token("\n")]
    LineEnding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    EndOfInput,
    Increment,
    Decrement,
    PointerLeft,
    PointerRight,
    Read,
    Write,
    LoopStart,
    LoopEnd,
}

impl TokenKind {
    /// The source symbol for this kind of token.
    pub fn symbol(self) -> &'static str {
        match self {
            TokenKind::EndOfInput => "EOF",
            TokenKind::Increment => "+",
            TokenKind::Decrement => "-",
            TokenKind::PointerLeft => "<",
            TokenKind::PointerRight => ">",
            TokenKind::Read => ",",
            TokenKind::Write => ".",
            TokenKind::LoopStart => "[",
            TokenKind::LoopEnd => "]",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A line/column location in the source. Both start at 1, and columns count bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const START: Position = Position { line: 1, column: 1 };
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
    /// Byte range of the symbol in the source (empty for [`TokenKind::EndOfInput`]).
    pub span: Span,
}

/// Lazily turns source bytes into [`Token`]s.
///
/// The stream always ends with exactly one [`TokenKind::EndOfInput`] token, after
/// which the iterator is exhausted. Restarting means constructing a new lexer.
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, Symbol>,
    line: usize,
    // byte offset at which the current line starts
    line_start: usize,
    finished: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src [u8]) -> Self {
        Self {
            inner: Symbol::lexer(source),
            line: Position::START.line,
            line_start: 0,
            finished: false,
        }
    }

    fn position_at(&self, offset: usize) -> Position {
        Position {
            line: self.line,
            column: offset - self.line_start + 1,
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }

        loop {
            let kind = match self.inner.next() {
                Some(Ok(Symbol::LineEnding)) => {
                    self.line += 1;
                    self.line_start = self.inner.span().end;
                    continue;
                }
                // everything we don't know is a comment
                Some(Err(())) => continue,
                Some(Ok(Symbol::Plus)) => TokenKind::Increment,
                Some(Ok(Symbol::Minus)) => TokenKind::Decrement,
                Some(Ok(Symbol::LeftArrow)) => TokenKind::PointerLeft,
                Some(Ok(Symbol::RightArrow)) => TokenKind::PointerRight,
                Some(Ok(Symbol::Comma)) => TokenKind::Read,
                Some(Ok(Symbol::Period)) => TokenKind::Write,
                Some(Ok(Symbol::LeftBracket)) => TokenKind::LoopStart,
                Some(Ok(Symbol::RightBracket)) => TokenKind::LoopEnd,
                None => {
                    self.finished = true;
                    let end = self.inner.source().len();
                    return Some(Token {
                        kind: TokenKind::EndOfInput,
                        position: self.position_at(end),
                        span: end..end,
                    });
                }
            };

            let span = self.inner.span();
            return Some(Token {
                kind,
                position: self.position_at(span.start),
                span,
            });
        }
    }
}

impl FusedIterator for Lexer<'_> {}
