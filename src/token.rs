//! The token alphabet produced by the tokenizer.

/// Every symbol the tokenizer can produce, plus `Synthetic` for tokens a
/// rewriter injects itself (never produced by `tokenize_line`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    BlankLine,
    SqlComment,
    ConditionalComment,
    SetVariable,
    ChangeMaster,
    CreateDatabase,
    UseDatabase,
    DropTable,
    CreateTable,
    LockTable,
    UnlockTable,
    InsertRow,
    ReplaceTable,
    AlterTable,
    DropView,
    DropTmpView,
    CreateTmpView,
    CreateView,
    CreateTrigger,
    CreateRoutine,
    Synthetic,
}

/// A single lexical unit: the symbol it was recognized as, its verbatim
/// source bytes (including any trailing newline), and its position in the
/// input. Text is kept as raw bytes, not `String`: a dump's row-data
/// sections routinely carry non-UTF-8 bytes (latin1-charset text, raw BLOB
/// bytes inside an `INSERT ... VALUES` row), and the byte-exact output
/// contract means those bytes must round-trip even though this tool never
/// needs to interpret them.
#[derive(Debug, Clone)]
pub struct Token {
    pub symbol: Symbol,
    pub text: Vec<u8>,
    /// Inclusive first line, inclusive last line (equal for single-line tokens).
    pub line_range: (u64, u64),
    pub offset: u64,
}

impl Token {
    pub fn new(symbol: Symbol, text: Vec<u8>, line_range: (u64, u64), offset: u64) -> Self {
        Self {
            symbol,
            text,
            line_range,
            offset,
        }
    }

    /// A token with no real source position, for rewriter-injected text.
    pub fn synthetic(text: &str) -> Self {
        Self {
            symbol: Symbol::Synthetic,
            text: text.as_bytes().to_vec(),
            line_range: (0, 0),
            offset: 0,
        }
    }

    /// Whether the token's text contains `needle` anywhere, not just as a
    /// prefix. `[u8]` has no built-in substring search the way `str` does.
    pub fn contains(&self, needle: &[u8]) -> bool {
        contains_subslice(&self.text, needle)
    }
}

/// Substring search over raw bytes.
pub fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
