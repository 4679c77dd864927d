//! Applies registered rewriters to each node the grouper produces, tracking
//! the "current database/table" context rewriters stash as they go.

use std::collections::HashMap;

use crate::error::PipelineError;
use crate::node::{attrs, MaterializedNode, NodeType};
use crate::token::Symbol;

pub enum Action {
    Keep,
    Skip,
}

pub enum TableDmlDecision {
    Continue,
    FilterTriggers,
    Skip,
}

pub type NodeRewriter = Box<dyn FnMut(&mut Dispatcher, &mut MaterializedNode) -> Result<Action, PipelineError>>;
pub type DmlRewriter = Box<dyn FnMut(&mut Dispatcher) -> Result<TableDmlDecision, PipelineError>>;

/// Filtering context: the database/table a rewriter most recently parsed
/// out of a node's own tokens. Distinct from `NodeStream::current_db`
/// (which is a grouper-side fallback attached to every node) — this is
/// explicit state owned by the dispatcher, replacing the dynamic
/// `dispatcher.database = ...` attribute assignment the original Python
/// relied on.
pub struct Dispatcher {
    node_rewriters: HashMap<NodeType, Vec<NodeRewriter>>,
    dml_rewriters: Vec<DmlRewriter>,
    pub database: Option<String>,
    pub table: Option<String>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let mut dispatcher = Self {
            node_rewriters: HashMap::new(),
            dml_rewriters: Vec::new(),
            database: None,
            table: None,
        };
        dispatcher.register_node(NodeType::DumpHeader, Box::new(parse_header));
        dispatcher.register_node(NodeType::DatabaseDdl, Box::new(parse_database));
        dispatcher.register_node(NodeType::TableDdl, Box::new(parse_table));
        dispatcher.register_node(NodeType::ViewTempDdl, Box::new(parse_view));
        dispatcher.register_node(NodeType::ViewDdl, Box::new(parse_view));
        dispatcher
    }

    pub fn register_node(&mut self, node_type: NodeType, rewriter: NodeRewriter) {
        self.node_rewriters.entry(node_type).or_default().push(rewriter);
    }

    pub fn register_dml(&mut self, rewriter: DmlRewriter) {
        self.dml_rewriters.push(rewriter);
    }

    /// Run every rewriter registered for `node.node_type` in registration
    /// order. Stops at the first `Skip`.
    pub fn dispatch_block(&mut self, node: &mut MaterializedNode) -> Result<Action, PipelineError> {
        let Some(mut rewriters) = self.node_rewriters.remove(&node.node_type) else {
            return Ok(Action::Keep);
        };
        let mut action = Action::Keep;
        for rewriter in rewriters.iter_mut() {
            if let Action::Skip = rewriter(self, node)? {
                action = Action::Skip;
                break;
            }
        }
        self.node_rewriters.insert(node.node_type, rewriters);
        Ok(action)
    }

    /// Run every `table-dml` rewriter. `Skip` short-circuits; `FilterTriggers`
    /// accumulates.
    pub fn dispatch_dml(&mut self) -> Result<TableDmlDecision, PipelineError> {
        let mut filter_triggers = false;
        for rewriter in self.dml_rewriters.iter_mut() {
            match rewriter(self)? {
                TableDmlDecision::Skip => return Ok(TableDmlDecision::Skip),
                TableDmlDecision::FilterTriggers => filter_triggers = true,
                TableDmlDecision::Continue => {}
            }
        }
        if filter_triggers {
            Ok(TableDmlDecision::FilterTriggers)
        } else {
            Ok(TableDmlDecision::Continue)
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_header(dispatcher: &mut Dispatcher, node: &mut MaterializedNode) -> Result<Action, PipelineError> {
    let rendered = node.render();
    if let Some(db) = attrs::header_database(&rendered) {
        dispatcher.database = Some(db);
    }
    Ok(Action::Keep)
}

fn parse_database(dispatcher: &mut Dispatcher, node: &mut MaterializedNode) -> Result<Action, PipelineError> {
    let tok = node.find(Symbol::CreateDatabase)?;
    if let Some(name) = attrs::backtick_name(&tok.text) {
        dispatcher.database = Some(name);
    }
    Ok(Action::Keep)
}

fn parse_table(dispatcher: &mut Dispatcher, node: &mut MaterializedNode) -> Result<Action, PipelineError> {
    if let Some(name) = node.table() {
        dispatcher.table = Some(name);
    }
    Ok(Action::Keep)
}

fn parse_view(dispatcher: &mut Dispatcher, node: &mut MaterializedNode) -> Result<Action, PipelineError> {
    if let Some(name) = node.table() {
        dispatcher.table = Some(name);
    }
    Ok(Action::Keep)
}
