//! Module with the generator, the public entry point of the crate.
//! The generator runs the whole compilation pipeline: grammar parsing,
//! rewriting, integrity checks, FIRST computation, LALR(1) construction,
//! conflict resolution, lexer assembly and finally the export freeze.

use log::debug;

use crate::config::{CaseFolding, GeneratorConfig, LexerMode};
use crate::diagnostics::Diagnostics;
use crate::export::{build_export, ParserTables};
use crate::internal::action_table::build_parser_table;
use crate::internal::checks::check_grammar;
use crate::internal::first_follow::FirstSets;
use crate::internal::grammar_parser::parse_grammar;
use crate::internal::lalr::LalrAutomaton;
use crate::internal::lexer::assemble_lexer;
use crate::internal::rewriter::rewrite;
use crate::{GenError, GenErrorKind, Result};

/// The result of a successful generation run: the frozen tables plus all
/// collected diagnostics. Warnings do not fail a run.
#[derive(Debug)]
pub struct Generated {
    /// The frozen, language-neutral parser description.
    pub tables: ParserTables,
    /// Everything the generation had to say about the grammar.
    pub diagnostics: Diagnostics,
}

/// A builder for creating a generator.
#[derive(Debug, Clone, Default)]
pub struct GeneratorBuilder {
    config: GeneratorConfig,
}

impl GeneratorBuilder {
    /// Creates a new generator builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the scanner table layout.
    pub fn lexer_mode(mut self, mode: LexerMode) -> Self {
        self.config.lexer_mode = mode;
        self
    }

    /// Sets the compile-time case folding.
    pub fn case_folding(mut self, folding: CaseFolding) -> Self {
        self.config.case_folding = folding;
        self
    }

    /// Sets the upper bound of the code point universe.
    pub fn max_code_point(mut self, max_code_point: u32) -> Self {
        self.config.max_code_point = max_code_point;
        self
    }

    /// Aborts generation when more conflicts than this remain after
    /// precedence resolution.
    pub fn conflict_limit(mut self, limit: usize) -> Self {
        self.config.conflict_limit = Some(limit);
        self
    }

    /// Sets the delimiters of inline semantic actions.
    pub fn action_delimiters(mut self, open: &str, close: &str) -> Self {
        self.config.action_delimiters = (open.to_string(), close.to_string());
        self
    }

    /// Builds the generator.
    pub fn build(self) -> Generator {
        Generator {
            config: self.config,
        }
    }
}

/// The parser generator.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    config: GeneratorConfig,
}

impl Generator {
    /// Creates a generator with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the generation pipeline over a grammar description.
    ///
    /// Each phase reports into the diagnostics sink and continues as long as
    /// the invariants allow. Hard grammar errors and failed integrity checks
    /// abort with an error carrying everything collected so far.
    pub fn generate(&self, grammar_text: &str) -> Result<Generated> {
        let mut diagnostics = Diagnostics::new();

        let parsed = parse_grammar(grammar_text, &self.config, &mut diagnostics)?;
        let mut grammar = parsed.grammar;
        rewrite(&mut grammar)?;

        if !check_grammar(&grammar, &mut diagnostics) {
            return Err(GenError::new(GenErrorKind::Semantic(
                diagnostics.into_entries(),
            )));
        }

        let first_sets = FirstSets::compute(&grammar);
        let automaton = LalrAutomaton::build(&grammar, &first_sets);
        let table = build_parser_table(&grammar, &automaton, &first_sets, &mut diagnostics);

        if let Some(limit) = self.config.conflict_limit {
            if table.reported_conflicts > limit {
                diagnostics.error(
                    None,
                    format!(
                        "{} unresolved conflicts exceed the limit of {}",
                        table.reported_conflicts, limit
                    ),
                );
                return Err(GenError::new(GenErrorKind::Semantic(
                    diagnostics.into_entries(),
                )));
            }
        }

        // The %case-insensitive directive enables ASCII folding unless the
        // configuration asks for more.
        let folding = if parsed.case_insensitive && self.config.case_folding == CaseFolding::None {
            CaseFolding::Ascii
        } else {
            self.config.case_folding
        };
        let lexer = assemble_lexer(&grammar, &table, &self.config, folding, &mut diagnostics)?;

        let tables = build_export(&grammar, &table, &lexer);
        debug!(
            "generation finished: {} states, {} DFAs, {} diagnostics",
            tables.actions.len(),
            tables.dfas.len(),
            diagnostics.entries().len()
        );
        Ok(Generated {
            tables,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_minimal_grammar() {
        let generated = Generator::new().generate("S$ : 'a' ;").unwrap();
        assert!(!generated.tables.actions.is_empty());
        assert_eq!(generated.tables.dfas.len(), 1);
        assert_eq!(generated.diagnostics.error_count(), 0);
    }

    #[test]
    fn test_generate_is_deterministic() {
        let text = "<< '+' ;\n<< '*' ;\nE$ : E '+' E | E '*' E | Int ;\nInt : /[0-9]+/ ;";
        let first = Generator::new().generate(text).unwrap();
        let second = Generator::new().generate(text).unwrap();
        assert_eq!(format!("{:?}", first.tables), format!("{:?}", second.tables));
    }

    #[test]
    fn test_conflict_limit_aborts() {
        let generator = GeneratorBuilder::new().conflict_limit(0).build();
        let result = generator
            .generate("S$ : 'if' E 'then' S | 'if' E 'then' S 'else' S | 'x' ;\nE : 'e' ;");
        assert!(result.is_err());
    }

    #[test]
    fn test_semantic_error_carries_diagnostics() {
        let result = Generator::new().generate("S$ : missing ;");
        let error = result.unwrap_err();
        assert!(matches!(*error.source, GenErrorKind::Semantic(_)));
    }

    #[test]
    fn test_builder_options() {
        let generator = GeneratorBuilder::new()
            .lexer_mode(LexerMode::Single)
            .case_folding(CaseFolding::Ascii)
            .action_delimiters("{", "}")
            .build();
        let generated = generator.generate("S$ : 'abc' { emit(1) } ;").unwrap();
        let production = &generated.tables.productions[0];
        assert_eq!(production.semantic_action.as_deref(), Some("emit(1)"));
    }
}
