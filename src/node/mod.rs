//! Groups the token stream into logical sections ("nodes") per the
//! mysqldump grammar: header, per-database DDL/DML, temp/finalized views,
//! routines, and the closing restore-session block.

pub mod attrs;

use std::io::BufRead;

use crate::error::PipelineError;
use crate::token::{Symbol, Token};
use crate::tokenizer::Tokenizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    DumpHeader,
    SetupSession,
    Replication,
    DatabaseDdl,
    TableDdl,
    TableDml,
    ViewTempDdl,
    ViewDdl,
    DatabaseRoutines,
    DatabaseEvents,
    ViewFinalizeDb,
    RestoreSession,
    Final,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::DumpHeader => "dump-header",
            NodeType::SetupSession => "setup-session",
            NodeType::Replication => "replication",
            NodeType::DatabaseDdl => "database-ddl",
            NodeType::TableDdl => "table-ddl",
            NodeType::TableDml => "table-dml",
            NodeType::ViewTempDdl => "view-temp-ddl",
            NodeType::ViewDdl => "view-ddl",
            NodeType::DatabaseRoutines => "database-routines",
            NodeType::DatabaseEvents => "database-events",
            NodeType::ViewFinalizeDb => "view-finalize-db",
            NodeType::RestoreSession => "restore-session",
            NodeType::Final => "final",
        }
    }
}

/// A fully materialized logical section: every node type except `table-dml`.
#[derive(Debug)]
pub struct MaterializedNode {
    pub node_type: NodeType,
    pub tokens: Vec<Token>,
    /// The database this node belongs to, carried forward from the last
    /// `dump-header`/`database-ddl`/`USE` statement the grouper observed.
    /// Independent of anything a rewriter later stashes on the dispatcher.
    pub database: Option<String>,
}

impl MaterializedNode {
    /// Concatenate every token's raw bytes, exactly as read. Never goes
    /// through `String`: a `table-dml` section's rows can carry non-UTF-8
    /// bytes that must round-trip unchanged into the output.
    pub fn render(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.tokens.iter().map(|t| t.text.len()).sum());
        for t in &self.tokens {
            out.extend_from_slice(&t.text);
        }
        out
    }

    pub fn find(&self, symbol: Symbol) -> Result<&Token, PipelineError> {
        self.tokens
            .iter()
            .find(|t| t.symbol == symbol)
            .ok_or(PipelineError::LookupError(symbol))
    }

    pub fn byte_range(&self) -> (u64, u64) {
        let start = self.tokens.first().map(|t| t.offset).unwrap_or(0);
        let end = self
            .tokens
            .last()
            .map(|t| t.offset + t.text.len() as u64)
            .unwrap_or(start);
        (start, end)
    }

    pub fn line_range(&self) -> (u64, u64) {
        let start = self.tokens.first().map(|t| t.line_range.0).unwrap_or(0);
        let end = self.tokens.last().map(|t| t.line_range.1).unwrap_or(start);
        (start, end)
    }
}

/// One step of the grouper's output.
pub enum NodeEvent<'a, R> {
    Block(MaterializedNode),
    TableDml(TableDmlCursor<'a, R>),
}

/// A live cursor over a `table-dml` section's tokens. Borrows the grouper's
/// tokenizer mutably, so the borrow checker enforces that this must be
/// dropped (via `drain`, or by exhausting `next_token`) before the grouper
/// can be asked for another node.
pub struct TableDmlCursor<'a, R> {
    front: std::vec::IntoIter<Token>,
    tokenizer: &'a mut Tokenizer<R>,
    finished_front: bool,
    reached_stop: bool,
    database: Option<String>,
    filter_triggers: bool,
    trigger_filter_closed: bool,
}

impl<'a, R: BufRead> TableDmlCursor<'a, R> {
    fn new(front: Vec<Token>, tokenizer: &'a mut Tokenizer<R>, database: Option<String>) -> Self {
        Self {
            front: front.into_iter(),
            tokenizer,
            finished_front: false,
            reached_stop: false,
            database,
            filter_triggers: false,
            trigger_filter_closed: false,
        }
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn set_filter_triggers(&mut self, on: bool) {
        self.filter_triggers = on;
    }

    /// Advance the underlying tokenizer without producing output, ignoring
    /// any trigger filtering. Safe to call more than once.
    pub fn drain(&mut self) -> Result<(), PipelineError> {
        while self.raw_next()?.is_some() {}
        Ok(())
    }

    /// Next token honoring trigger filtering, or `Ok(None)` at the section's end.
    pub fn next_token(&mut self) -> Result<Option<Token>, PipelineError> {
        loop {
            let tok = match self.raw_next()? {
                Some(t) => t,
                None => return Ok(None),
            };
            if !self.filter_triggers {
                return Ok(Some(tok));
            }
            if self.trigger_filter_closed {
                continue;
            }
            if matches!(tok.symbol, Symbol::CreateTrigger | Symbol::SetVariable) {
                continue;
            }
            if tok.symbol == Symbol::BlankLine {
                self.trigger_filter_closed = true;
            }
            return Ok(Some(tok));
        }
    }

    fn raw_next(&mut self) -> Result<Option<Token>, PipelineError> {
        if !self.finished_front {
            if let Some(tok) = self.front.next() {
                return Ok(Some(tok));
            }
            self.finished_front = true;
        }
        if self.reached_stop {
            return Ok(None);
        }
        match self.tokenizer.next()? {
            Some(tok) if tok.symbol == Symbol::SqlComment => {
                self.tokenizer.push_back(tok);
                self.reached_stop = true;
                Ok(None)
            }
            Some(tok) => Ok(Some(tok)),
            None => {
                self.reached_stop = true;
                Ok(None)
            }
        }
    }
}

pub struct NodeStream<R> {
    tokenizer: Tokenizer<R>,
    queue: Vec<Token>,
    current_db: Option<String>,
    phase: Phase,
}

#[derive(PartialEq, Eq)]
enum Phase {
    Header,
    Setup,
    Main,
}

impl<R: BufRead> NodeStream<R> {
    pub fn new(tokenizer: Tokenizer<R>) -> Self {
        Self {
            tokenizer,
            queue: Vec::new(),
            current_db: None,
            phase: Phase::Header,
        }
    }

    /// Pull the next node from the stream. Returns `Ok(None)` once the
    /// underlying tokenizer is exhausted and no queued tokens remain.
    pub fn next_event(&mut self) -> Result<Option<NodeEvent<'_, R>>, PipelineError> {
        match self.phase {
            Phase::Header => {
                self.phase = Phase::Setup;
                let tokens = self.read_until_blank_inclusive()?;
                Ok(Some(NodeEvent::Block(self.finish_node(NodeType::DumpHeader, tokens))))
            }
            Phase::Setup => {
                self.phase = Phase::Main;
                let tokens = self.read_until_blank_inclusive()?;
                Ok(Some(NodeEvent::Block(self.finish_node(NodeType::SetupSession, tokens))))
            }
            Phase::Main => self.next_main_event(),
        }
    }

    fn read_until_blank_inclusive(&mut self) -> Result<Vec<Token>, PipelineError> {
        let mut tokens = Vec::new();
        while let Some(tok) = self.tokenizer.next()? {
            let blank = tok.symbol == Symbol::BlankLine;
            tokens.push(tok);
            if blank {
                break;
            }
        }
        Ok(tokens)
    }

    /// Read tokens up to (excluding) the next token whose symbol is `stop`,
    /// pushing that token back.
    fn read_until(&mut self, stop: Symbol) -> Result<Vec<Token>, PipelineError> {
        let mut tokens = Vec::new();
        loop {
            match self.tokenizer.next()? {
                Some(tok) if tok.symbol == stop => {
                    self.tokenizer.push_back(tok);
                    break;
                }
                Some(tok) => tokens.push(tok),
                None => break,
            }
        }
        Ok(tokens)
    }

    fn next_main_event(&mut self) -> Result<Option<NodeEvent<'_, R>>, PipelineError> {
        loop {
            let token = match self.tokenizer.next()? {
                Some(t) => t,
                None => return Ok(None),
            };

            match token.symbol {
                Symbol::SetVariable => {
                    if !token.contains(b"TIME_ZONE") {
                        return Err(PipelineError::CannotHandleToken {
                            symbol: token.symbol,
                            queue_len: self.queue.len(),
                        });
                    }
                    self.queue.push(token);
                    loop {
                        match self.tokenizer.next()? {
                            Some(t) if matches!(t.symbol, Symbol::SetVariable | Symbol::BlankLine) => {
                                self.queue.push(t);
                            }
                            Some(t) => {
                                self.tokenizer.push_back(t);
                                break;
                            }
                            None => break,
                        }
                    }
                    let tokens = std::mem::take(&mut self.queue);
                    return Ok(Some(NodeEvent::Block(self.finish_node(NodeType::RestoreSession, tokens))));
                }
                Symbol::SqlComment => {
                    if let Some(node) = self.handle_sql_comment(token)? {
                        return Ok(Some(NodeEvent::Block(node)));
                    }
                    continue;
                }
                Symbol::ConditionalComment => {
                    self.queue.push(token);
                    loop {
                        match self.tokenizer.next()? {
                            Some(t) if t.symbol == Symbol::SetVariable => self.queue.push(t),
                            Some(t) => {
                                self.tokenizer.push_back(t);
                                break;
                            }
                            None => break,
                        }
                    }
                    continue;
                }
                Symbol::CreateDatabase => {
                    let mut tokens: Vec<Token> = self.queue.drain(..).collect();
                    tokens.push(token);
                    tokens.extend(self.read_until(Symbol::SqlComment)?);
                    return Ok(Some(NodeEvent::Block(self.finish_node(NodeType::DatabaseDdl, tokens))));
                }
                Symbol::DropTable | Symbol::CreateTable => {
                    self.queue.push(token);
                    if matches!(self.tokenizer.peek()?.map(|t| t.symbol), Some(Symbol::DropView)) {
                        // A view's temp placeholder table: DROP TABLE is immediately
                        // followed by DROP VIEW. Queue through to CreateTmpView rather
                        // than emitting table-ddl here.
                        return self.finish_view_temp_preamble();
                    }
                    let mut tokens: Vec<Token> = self.queue.drain(..).collect();
                    tokens.extend(self.read_until(Symbol::SqlComment)?);
                    return Ok(Some(NodeEvent::Block(self.finish_node(NodeType::TableDdl, tokens))));
                }
                Symbol::LockTable | Symbol::AlterTable | Symbol::InsertRow => {
                    let mut front: Vec<Token> = self.queue.drain(..).collect();
                    front.push(token);
                    let database = self.current_db.clone();
                    return Ok(Some(NodeEvent::TableDml(TableDmlCursor::new(
                        front,
                        &mut self.tokenizer,
                        database,
                    ))));
                }
                Symbol::ChangeMaster => {
                    let mut tokens: Vec<Token> = self.queue.drain(..).collect();
                    tokens.push(token);
                    tokens.extend(self.read_until(Symbol::SqlComment)?);
                    return Ok(Some(NodeEvent::Block(self.finish_node(NodeType::Replication, tokens))));
                }
                Symbol::CreateRoutine => {
                    let mut tokens: Vec<Token> = self.queue.drain(..).collect();
                    tokens.push(token);
                    tokens.extend(self.read_until(Symbol::SqlComment)?);
                    return Ok(Some(NodeEvent::Block(self.finish_node(NodeType::DatabaseRoutines, tokens))));
                }
                Symbol::CreateTmpView => {
                    let mut tokens: Vec<Token> = self.queue.drain(..).collect();
                    tokens.push(token);
                    tokens.extend(self.read_until(Symbol::SqlComment)?);
                    return Ok(Some(NodeEvent::Block(self.finish_node(NodeType::ViewTempDdl, tokens))));
                }
                Symbol::UseDatabase => {
                    let mut tokens: Vec<Token> = self.queue.drain(..).collect();
                    tokens.push(token);
                    let follows_blank = matches!(
                        self.tokenizer.peek()?.map(|t| t.symbol),
                        Some(Symbol::BlankLine)
                    );
                    if follows_blank {
                        tokens.extend(self.read_until_any(&[Symbol::SqlComment, Symbol::ConditionalComment])?);
                    }
                    return Ok(Some(NodeEvent::Block(self.finish_node(NodeType::ViewFinalizeDb, tokens))));
                }
                Symbol::DropTmpView => {
                    let mut tokens: Vec<Token> = self.queue.drain(..).collect();
                    tokens.push(token);
                    tokens.extend(self.read_until(Symbol::SqlComment)?);
                    return Ok(Some(NodeEvent::Block(self.finish_node(NodeType::ViewDdl, tokens))));
                }
                other => {
                    return Err(PipelineError::CannotHandleToken {
                        symbol: other,
                        queue_len: self.queue.len(),
                    });
                }
            }
        }
    }

    /// Consume tokens directly (bypassing the main dispatch switch, since
    /// the preamble's `SetVariable` tokens aren't restore-session tokens)
    /// until `CreateTmpView`, then emit `view-temp-ddl` the same way the
    /// `CreateTmpView` arm would on its own.
    fn finish_view_temp_preamble(&mut self) -> Result<Option<NodeEvent<'_, R>>, PipelineError> {
        loop {
            let next = match self.tokenizer.next()? {
                Some(t) => t,
                None => return Ok(None),
            };
            if next.symbol == Symbol::CreateTmpView {
                let mut tokens: Vec<Token> = self.queue.drain(..).collect();
                tokens.push(next);
                tokens.extend(self.read_until(Symbol::SqlComment)?);
                return Ok(Some(NodeEvent::Block(self.finish_node(NodeType::ViewTempDdl, tokens))));
            }
            self.queue.push(next);
        }
    }

    fn read_until_any(&mut self, stops: &[Symbol]) -> Result<Vec<Token>, PipelineError> {
        let mut tokens = Vec::new();
        loop {
            match self.tokenizer.next()? {
                Some(tok) if stops.contains(&tok.symbol) => {
                    self.tokenizer.push_back(tok);
                    break;
                }
                Some(tok) => tokens.push(tok),
                None => break,
            }
        }
        Ok(tokens)
    }

    /// Read two more tokens after an initial `SqlComment` to recognize the
    /// `--\n-- TEXT\n--\n\n` empty-section divider pattern.
    fn handle_sql_comment(&mut self, token: Token) -> Result<Option<MaterializedNode>, PipelineError> {
        let comment2 = match self.tokenizer.next()? {
            Some(t) => t,
            None => return Ok(Some(self.finish_node(NodeType::Final, vec![token]))),
        };
        let comment3 = match self.tokenizer.next()? {
            Some(t) => t,
            None => return Ok(Some(self.finish_node(NodeType::Final, vec![token]))),
        };

        let next_is_blank = matches!(self.tokenizer.peek()?.map(|t| t.symbol), Some(Symbol::BlankLine));
        if next_is_blank {
            let blank = self.tokenizer.next()?.expect("peeked blank line must be present");
            let after_blank_is_comment =
                matches!(self.tokenizer.peek()?.map(|t| t.symbol), Some(Symbol::SqlComment));
            if after_blank_is_comment {
                let node_type = attrs::categorize_comment_block(&comment2.text)?;
                return Ok(Some(self.finish_node(node_type, vec![token, comment2, comment3, blank])));
            }
            self.queue.extend([token, comment2, comment3, blank]);
            return Ok(None);
        }

        self.queue.extend([token, comment2, comment3]);
        Ok(None)
    }

    fn finish_node(&mut self, node_type: NodeType, tokens: Vec<Token>) -> MaterializedNode {
        match node_type {
            NodeType::DumpHeader => {
                let rendered: Vec<u8> = tokens.iter().flat_map(|t| t.text.iter().copied()).collect();
                if let Some(db) = attrs::header_database(&rendered) {
                    self.current_db = Some(db);
                }
            }
            NodeType::DatabaseDdl => {
                if let Some(tok) = tokens.iter().find(|t| t.symbol == Symbol::CreateDatabase) {
                    if let Some(name) = attrs::backtick_name(&tok.text) {
                        self.current_db = Some(name);
                    }
                }
            }
            NodeType::ViewFinalizeDb => {
                if let Some(tok) = tokens.iter().find(|t| t.symbol == Symbol::UseDatabase) {
                    if let Some(name) = attrs::backtick_name(&tok.text) {
                        self.current_db = Some(name);
                    }
                }
            }
            _ => {}
        }
        MaterializedNode {
            node_type,
            tokens,
            database: self.current_db.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream_of(text: &str) -> NodeStream<Cursor<&[u8]>> {
        NodeStream::new(Tokenizer::new(crate::scanner::Scanner::new(Cursor::new(text.as_bytes()))))
    }

    fn next_block(stream: &mut NodeStream<Cursor<&[u8]>>) -> MaterializedNode {
        match stream.next_event().unwrap().unwrap() {
            NodeEvent::Block(node) => node,
            NodeEvent::TableDml(_) => panic!("expected a block event"),
        }
    }

    /// A real table's DROP TABLE, with no following DROP VIEW, is a plain
    /// table-ddl node.
    #[test]
    fn drop_table_without_following_drop_view_is_table_ddl() {
        let mut stream = stream_of(
            "\n\nDROP TABLE IF EXISTS `t`;\nCREATE TABLE `t` (\n  `id` int\n) ENGINE=InnoDB;\n\n--\n-- next\n--\n\n",
        );
        next_block(&mut stream); // dump-header
        next_block(&mut stream); // setup-session
        let node = next_block(&mut stream);
        assert_eq!(node.node_type, NodeType::TableDdl);
    }

    /// A view's temp placeholder table is DROP TABLE immediately followed by
    /// DROP VIEW; the grouper must route the whole preamble to view-temp-ddl
    /// instead of splitting off a table-ddl node.
    #[test]
    fn drop_table_followed_by_drop_view_is_view_temp_ddl() {
        let mut stream = stream_of(
            "\n\nDROP TABLE IF EXISTS `v`;\n\
             /*!50001 DROP VIEW IF EXISTS `v`*/;\n\
             SET @saved_cs_client     = @@character_set_client;\n\
             /*!50001 CREATE TABLE `v` (\n  `id` int\n) ENGINE=MyISAM */;\n\
             SET character_set_client = @saved_cs_client;\n\n--\n-- next\n--\n\n",
        );
        next_block(&mut stream); // dump-header
        next_block(&mut stream); // setup-session
        let node = next_block(&mut stream);
        assert_eq!(node.node_type, NodeType::ViewTempDdl);
        assert_eq!(node.table(), Some("v".to_string()));
        assert!(node.tokens.iter().any(|t| t.symbol == Symbol::DropTable));
        assert!(node.tokens.iter().any(|t| t.symbol == Symbol::DropView));
    }
}
