//! Built-in rewriters: the database/table/engine glob filters and the
//! `--no-data`/`--skip-binlog`/`--skip-triggers` one-offs.

use crate::dispatch::{Action, Dispatcher, DmlRewriter, NodeRewriter, TableDmlDecision};
use crate::glob_filter::GlobFilter;
use crate::node::{MaterializedNode, NodeType};
use crate::token::{Symbol, Token};

pub fn skip_databases_node(include: &[String], exclude: &[String]) -> Result<NodeRewriter, glob::PatternError> {
    let filter = GlobFilter::new(include, exclude)?;
    Ok(Box::new(move |dispatcher: &mut Dispatcher, _node: &mut MaterializedNode| {
        let name = dispatcher.database.clone().unwrap_or_default();
        Ok(if filter.check(&name) { Action::Keep } else { Action::Skip })
    }))
}

pub fn skip_databases_dml(include: &[String], exclude: &[String]) -> Result<DmlRewriter, glob::PatternError> {
    let filter = GlobFilter::new(include, exclude)?;
    Ok(Box::new(move |dispatcher: &mut Dispatcher| {
        let name = dispatcher.database.clone().unwrap_or_default();
        Ok(if filter.check(&name) {
            TableDmlDecision::Continue
        } else {
            TableDmlDecision::Skip
        })
    }))
}

fn qualified_name(dispatcher: &Dispatcher) -> String {
    format!(
        "{}.{}",
        dispatcher.database.as_deref().unwrap_or(""),
        dispatcher.table.as_deref().unwrap_or("")
    )
}

pub fn skip_tables_node(include: &[String], exclude: &[String]) -> Result<NodeRewriter, glob::PatternError> {
    let filter = GlobFilter::new(include, exclude)?;
    Ok(Box::new(move |dispatcher: &mut Dispatcher, _node: &mut MaterializedNode| {
        let name = qualified_name(dispatcher);
        Ok(if filter.check(&name) { Action::Keep } else { Action::Skip })
    }))
}

pub fn skip_tables_dml(include: &[String], exclude: &[String]) -> Result<DmlRewriter, glob::PatternError> {
    let filter = GlobFilter::new(include, exclude)?;
    Ok(Box::new(move |dispatcher: &mut Dispatcher| {
        let name = qualified_name(dispatcher);
        Ok(if filter.check(&name) {
            TableDmlDecision::Continue
        } else {
            TableDmlDecision::Skip
        })
    }))
}

/// Registered against `table-ddl`/`view-temp-ddl`. When a node's engine
/// fails the filter, also registers a one-shot exact-name exclusion for the
/// matching `table-dml` (tables) or `view-ddl` (views) section later in the
/// stream, since engine is never visible on those node types directly.
pub fn skip_engines(include: &[String], exclude: &[String]) -> Result<NodeRewriter, glob::PatternError> {
    let filter = GlobFilter::new_case_insensitive(include, exclude)?;
    Ok(Box::new(move |dispatcher: &mut Dispatcher, node: &mut MaterializedNode| {
        let Some(engine) = node.engine() else {
            return Ok(Action::Keep);
        };
        if filter.check(&engine) {
            return Ok(Action::Keep);
        }
        let name = qualified_name(dispatcher);
        if engine.eq_ignore_ascii_case("view") {
            let rewriter = skip_tables_node(&[], &[name])
                .expect("exact qualified name is always a valid glob pattern");
            dispatcher.register_node(NodeType::ViewDdl, rewriter);
        } else {
            let rewriter = skip_tables_dml(&[], &[name])
                .expect("exact qualified name is always a valid glob pattern");
            dispatcher.register_dml(rewriter);
        }
        Ok(Action::Skip)
    }))
}

pub fn skip_node_node() -> NodeRewriter {
    Box::new(|_dispatcher, _node| Ok(Action::Skip))
}

pub fn skip_node_dml() -> DmlRewriter {
    Box::new(|_dispatcher| Ok(TableDmlDecision::Skip))
}

pub fn skip_triggers_dml() -> DmlRewriter {
    Box::new(|_dispatcher| Ok(TableDmlDecision::FilterTriggers))
}

const SKIP_BINLOG_TEXT: &str =
    "/*!40101 SET @OLD_SQL_LOG_BIN=@@SQL_LOG_BIN */;\n/*!40101 SET SQL_LOG_BIN = 0 */;\n";

/// Registered against `setup-session`. Inserts a synthetic token disabling
/// binlog writes just before the section's last token.
pub fn skip_binlog_node() -> NodeRewriter {
    Box::new(|_dispatcher, node: &mut MaterializedNode| {
        let insert_at = node.tokens.len().saturating_sub(1);
        node.tokens.insert(insert_at, Token::synthetic(SKIP_BINLOG_TEXT));
        Ok(Action::Keep)
    })
}
