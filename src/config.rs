//! Module with the generator configuration.

/// Selects how the scanner tables are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LexerMode {
    /// One DFA per parser state, built from the state's viable terminal set.
    /// States with equal viable sets and isomorphic automata share a table.
    #[default]
    Selective,
    /// A single DFA over all terminals of the grammar.
    Single,
}

/// Selects the case folding applied to literals and character classes at
/// compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseFolding {
    /// Match case-sensitively.
    #[default]
    None,
    /// Fold the ASCII letters a-z/A-Z.
    Ascii,
    /// Fold using the simple Unicode upper/lower mappings.
    Unicode,
}

/// The configuration of a table generation run.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// The scanner table layout.
    pub lexer_mode: LexerMode,
    /// Compile-time case folding of terminal patterns.
    pub case_folding: CaseFolding,
    /// The upper bound of the code point universe for character classes.
    pub max_code_point: u32,
    /// Abort generation when more conflicts than this remain after
    /// precedence resolution. `None` never aborts.
    pub conflict_limit: Option<usize>,
    /// The delimiters of inline semantic actions in the grammar text.
    pub action_delimiters: (String, String),
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            lexer_mode: LexerMode::default(),
            case_folding: CaseFolding::default(),
            max_code_point: crate::internal::char_class::DEFAULT_MAX_CODE_POINT,
            conflict_limit: None,
            action_delimiters: ("[*".to_string(), "*]".to_string()),
        }
    }
}
