//! The tokenization rule catalogue, applied in a fixed order: first
//! matching rule wins. The order mirrors `original_source`'s `RULES` list
//! exactly (change-master, sql-comment, blank, conditional-comment,
//! create-table, create-db, use-db, drop-table, lock-tables, unlock-tables,
//! delimiter, insert, replace, set-variable).
//!
//! Rules match on raw bytes, never on a decoded `String`: a dump's
//! `INSERT ... VALUES` rows may carry latin1 text or raw BLOB bytes that
//! aren't valid UTF-8, and the classification here only ever needs to look
//! at a line's ASCII-only leading keyword.

use std::io::BufRead;

use crate::error::PipelineError;
use crate::scanner::Scanner;
use crate::token::{contains_subslice, Symbol, Token};

pub(super) fn tokenize_line<R: BufRead>(
    line: Vec<u8>,
    scanner: &mut Scanner<R>,
) -> Result<Token, PipelineError> {
    if line.starts_with(b"CHANGE MASTER") {
        return Ok(make_token(Symbol::ChangeMaster, line, scanner));
    }
    if line.starts_with(b"--") {
        return Ok(rule_sql_comment(line, scanner));
    }
    if is_blank(&line) {
        return Ok(make_token(Symbol::BlankLine, line, scanner));
    }
    if line.starts_with(b"/*!") {
        return rule_conditional_comment(line, scanner);
    }
    if line.starts_with(b"CREATE TABLE") {
        return rule_multiline(Symbol::CreateTable, ";", line, scanner);
    }
    if line.starts_with(b"CREATE DATABASE") {
        return Ok(make_token(Symbol::CreateDatabase, line, scanner));
    }
    if line.starts_with(b"USE ") {
        return Ok(make_token(Symbol::UseDatabase, line, scanner));
    }
    if line.starts_with(b"DROP TABLE") {
        return Ok(make_token(Symbol::DropTable, line, scanner));
    }
    if line.starts_with(b"LOCK ") {
        return Ok(make_token(Symbol::LockTable, line, scanner));
    }
    if line.starts_with(b"UNLOCK ") {
        return Ok(make_token(Symbol::UnlockTable, line, scanner));
    }
    if line.starts_with(b"DELIMITER ;;") {
        return rule_delimiter(line, scanner);
    }
    if line.starts_with(b"INSERT") {
        return Ok(make_token(Symbol::InsertRow, line, scanner));
    }
    if line.starts_with(b"REPLACE") {
        return Ok(make_token(Symbol::ReplaceTable, line, scanner));
    }
    if line.starts_with(b"SET ") {
        return Ok(make_token(Symbol::SetVariable, line, scanner));
    }

    let (line_no, offset) = scanner.position();
    Err(PipelineError::Tokenization {
        line: String::from_utf8_lossy(&line).into_owned(),
        line_no,
        offset,
    })
}

/// A line with only `\r`/`\n` bytes on it (possibly none at all, at EOF).
fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|&b| b == b'\r' || b == b'\n')
}

/// Trim trailing ASCII whitespace, the byte equivalent of `str::trim_end`
/// for the all-ASCII control lines this tokenizer classifies.
fn trim_end_ascii(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && line[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    &line[..end]
}

fn make_token<R: BufRead>(symbol: Symbol, text: Vec<u8>, scanner: &Scanner<R>) -> Token {
    let lineno = scanner.lineno();
    Token::new(symbol, text, (lineno, lineno), scanner.offset())
}

fn rule_sql_comment<R: BufRead>(line: Vec<u8>, scanner: &Scanner<R>) -> Token {
    let symbol = if line.starts_with(b"-- CHANGE MASTER") {
        Symbol::ChangeMaster
    } else {
        Symbol::SqlComment
    };
    make_token(symbol, line, scanner)
}

/// Strip the `/*!DDDDD ` conditional-comment prefix the way Python's
/// `str.lstrip('/*!0123456789 ')` does: trim every leading byte that is a
/// member of that set, not just a fixed-width prefix.
fn strip_conditional_prefix(line: &[u8]) -> &[u8] {
    const SET: &[u8] = b"/*! 0123456789";
    let mut start = 0;
    while start < line.len() && SET.contains(&line[start]) {
        start += 1;
    }
    &line[start..]
}

fn rule_conditional_comment<R: BufRead>(
    line: Vec<u8>,
    scanner: &mut Scanner<R>,
) -> Result<Token, PipelineError> {
    if line.starts_with(b"/*!40000 ALTER") {
        return Ok(make_token(Symbol::AlterTable, line, scanner));
    }
    if line.starts_with(b"/*!50001 DROP TABLE") {
        return Ok(make_token(Symbol::DropTmpView, line, scanner));
    }
    if line.starts_with(b"/*!50001 DROP VIEW") {
        return Ok(make_token(Symbol::DropView, line, scanner));
    }
    if line.starts_with(b"/*!50001 CREATE TABLE") {
        return rule_multiline(Symbol::CreateTmpView, ";", line, scanner);
    }
    if line.starts_with(b"/*!50001 CREATE") {
        return rule_multiline(Symbol::CreateView, ";", line, scanner);
    }
    if strip_conditional_prefix(&line).starts_with(b"SET ") {
        return Ok(make_token(Symbol::SetVariable, line, scanner));
    }
    Ok(make_token(Symbol::ConditionalComment, line, scanner))
}

/// Accumulate lines starting with `first_line` until a line, right-trimmed
/// of trailing whitespace, ends with `until`. Matches `original_source`'s
/// quirk of only testing the termination condition on lines read *after*
/// `first_line`, never on `first_line` itself; mysqldump never emits a
/// single-line `CREATE TABLE`, so this never bites in practice.
fn rule_multiline<R: BufRead>(
    symbol: Symbol,
    until: &str,
    first_line: Vec<u8>,
    scanner: &mut Scanner<R>,
) -> Result<Token, PipelineError> {
    let start_lineno = scanner.lineno();
    let start_offset = scanner.offset();
    let mut text = first_line;
    let mut end_lineno = start_lineno;

    loop {
        match scanner.next()? {
            Some(line) => {
                end_lineno = scanner.lineno();
                let terminated = trim_end_ascii(&line).ends_with(until.as_bytes());
                text.extend_from_slice(&line);
                if terminated {
                    break;
                }
            }
            None => break,
        }
    }

    Ok(Token::new(symbol, text, (start_lineno, end_lineno), start_offset))
}

fn rule_delimiter<R: BufRead>(line: Vec<u8>, scanner: &mut Scanner<R>) -> Result<Token, PipelineError> {
    let mut token = rule_multiline(Symbol::CreateRoutine, "DELIMITER ;", line, scanner)?;
    if contains_subslice(&token.text, b"/*!50003 TRIGGER") {
        token.symbol = Symbol::CreateTrigger;
    }
    Ok(token)
}
