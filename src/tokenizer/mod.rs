//! Turns scanner lines into a lazy stream of tokens.

mod rules;

use std::io::BufRead;

use crate::error::PipelineError;
use crate::scanner::Scanner;
use crate::token::Token;

/// Pulls tokens from a `Scanner`, one line (or multi-line accumulation) at a
/// time, with an unbounded push-back stack so the grouper can peek ahead.
pub struct Tokenizer<R> {
    scanner: Scanner<R>,
    pushback: Vec<Token>,
}

impl<R: BufRead> Tokenizer<R> {
    pub fn new(scanner: Scanner<R>) -> Self {
        Self {
            scanner,
            pushback: Vec::new(),
        }
    }

    pub fn scanner(&self) -> &Scanner<R> {
        &self.scanner
    }

    /// Next token, or `Ok(None)` at end of stream.
    pub fn next(&mut self) -> Result<Option<Token>, PipelineError> {
        if let Some(tok) = self.pushback.pop() {
            return Ok(Some(tok));
        }
        let line = match self.scanner.next()? {
            Some(line) => line,
            None => return Ok(None),
        };
        rules::tokenize_line(line, &mut self.scanner).map(Some)
    }

    /// Push a token back; the next call to `next()` returns it again.
    pub fn push_back(&mut self, token: Token) {
        self.pushback.push(token);
    }

    /// Look at the next token without consuming it.
    pub fn peek(&mut self) -> Result<Option<&Token>, PipelineError> {
        if self.pushback.is_empty() {
            if let Some(tok) = self.next()? {
                self.pushback.push(tok);
            }
        }
        Ok(self.pushback.last())
    }
}
