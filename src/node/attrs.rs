//! Derived attributes computed on demand from a node's token text: database
//! and table names, storage engine, routine names, and replication position.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{MaterializedNode, NodeType};
use crate::error::PipelineError;
use crate::token::Symbol;

static BACKTICK_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`((?:``|[^`])+)`").unwrap());
static HEADER_DATABASE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)Database: (.+)$").unwrap());
static ENGINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\) ENGINE=([A-Za-z0-9_]+)").unwrap());
static ROUTINE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^/\*!50003 CREATE.*?(?:FUNCTION|PROCEDURE) `((?:``|[^`])+)`").unwrap());
static CHANGE_MASTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"MASTER_LOG_FILE='([^']+)'.*?MASTER_LOG_POS=(\d+)").unwrap());

/// Strip one layer of backtick-escaping (`` `` `` -> `` ` ``), matching
/// MySQL identifier quoting.
fn unescape_backticks(s: &str) -> String {
    s.replace("``", "`")
}

/// Identifiers, engine names, and comment-block headers are always plain
/// ASCII/UTF-8 text generated by mysqldump itself (unlike row data, which
/// can carry arbitrary bytes), so a lossy decode here is safe and is the
/// only place this module touches `String`.
pub fn backtick_name(text: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(text);
    BACKTICK_NAME_RE
        .captures(&text)
        .map(|c| unescape_backticks(&c[1]))
}

pub fn header_database(rendered_header: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(rendered_header);
    HEADER_DATABASE_RE
        .captures(&text)
        .map(|c| c[1].trim().to_string())
}

/// Classify a divider comment block's "meat" line (the second of the three
/// `--`-prefixed lines) as announcing a routines or events section.
pub fn categorize_comment_block(meat_text: &[u8]) -> Result<NodeType, PipelineError> {
    let text = String::from_utf8_lossy(meat_text);
    if text.contains("routines") {
        Ok(NodeType::DatabaseRoutines)
    } else if text.contains("events") {
        Ok(NodeType::DatabaseEvents)
    } else {
        Err(PipelineError::CannotCategorizeComment(text.into_owned()))
    }
}

impl MaterializedNode {
    /// The table this node's DDL/DML concerns, for node types that carry a
    /// table name (`table-ddl`, `view-temp-ddl`, `view-ddl`).
    pub fn table(&self) -> Option<String> {
        match self.node_type {
            NodeType::TableDdl => self
                .find(Symbol::CreateTable)
                .ok()
                .or_else(|| self.find(Symbol::DropTable).ok())
                .and_then(|t| backtick_name(&t.text)),
            NodeType::ViewTempDdl => self
                .find(Symbol::CreateTmpView)
                .ok()
                .and_then(|t| backtick_name(&t.text)),
            NodeType::ViewDdl => self
                .find(Symbol::DropTmpView)
                .ok()
                .and_then(|t| backtick_name(&t.text)),
            _ => None,
        }
    }

    /// Storage engine named in a `table-ddl` or `view-temp-ddl` node.
    pub fn engine(&self) -> Option<String> {
        match self.node_type {
            NodeType::TableDdl => {
                let tok = self.find(Symbol::CreateTable).ok()?;
                let text = String::from_utf8_lossy(&tok.text);
                ENGINE_RE.captures(&text).map(|c| c[1].to_string())
            }
            NodeType::ViewTempDdl => Some("view".to_string()),
            _ => None,
        }
    }

    /// Routine names announced in a `database-routines` node.
    pub fn routines(&self) -> Vec<String> {
        self.tokens
            .iter()
            .filter(|t| t.symbol == Symbol::CreateRoutine)
            .filter_map(|t| {
                let text = String::from_utf8_lossy(&t.text);
                ROUTINE_NAME_RE
                    .captures(&text)
                    .map(|c| unescape_backticks(&c[1]))
            })
            .collect()
    }

    /// Binlog filename and offset from a `replication` node's `CHANGE
    /// MASTER` token.
    pub fn position(&self) -> Option<(String, u64)> {
        let tok = self.find(Symbol::ChangeMaster).ok()?;
        let text = String::from_utf8_lossy(&tok.text);
        let caps = CHANGE_MASTER_RE.captures(&text)?;
        let offset: u64 = caps[2].parse().ok()?;
        Some((caps[1].to_string(), offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backtick_name_unescapes_doubled_backticks() {
        assert_eq!(backtick_name(b"`my``table`"), Some("my`table".to_string()));
    }

    #[test]
    fn header_database_matches_dump_header_line() {
        let header = b"-- MySQL dump 10.13\n-- Host: localhost    Database: sakila\n-- ------\n";
        assert_eq!(header_database(header), Some("sakila".to_string()));
    }

    #[test]
    fn engine_extraction_from_create_table_tail() {
        let create = "CREATE TABLE `t` (\n  `id` int\n) ENGINE=InnoDB DEFAULT CHARSET=utf8;\n";
        let re_match = ENGINE_RE.captures(create).unwrap();
        assert_eq!(&re_match[1], "InnoDB");
    }

    #[test]
    fn change_master_position_extraction() {
        let text = "CHANGE MASTER TO MASTER_LOG_FILE='bin-log.000007', MASTER_LOG_POS=296;\n";
        let caps = CHANGE_MASTER_RE.captures(text).unwrap();
        assert_eq!(&caps[1], "bin-log.000007");
        assert_eq!(&caps[2], "296");
    }
}
