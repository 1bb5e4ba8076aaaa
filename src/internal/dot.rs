//! The `dot` module contains the conversion of the generated automata to the
//! graphviz dot format. The functions in this module are used for testing
//! and debugging purposes.

use std::io::Write;

use dot_writer::{Attributes, DotWriter, RankDirection};

use super::dfa::Dfa;
use super::grammar::Grammar;
use super::lalr::LalrAutomaton;
use super::nfa::Nfa;

/// Render an NFA fragment to the graphviz dot format.
#[allow(dead_code)]
pub(crate) fn nfa_render<W: Write>(nfa: &Nfa, label: &str, output: &mut W) {
    let mut writer = DotWriter::from(output);
    writer.set_pretty_print(true);
    let mut digraph = writer.digraph();
    digraph
        .set_label(label)
        .set_rank_direction(RankDirection::LeftRight);
    for state in nfa.states() {
        let source_id = {
            let mut source_node = digraph.node_auto();
            source_node.set_label(&state.id().as_usize().to_string());
            if state.id() == nfa.start_state() {
                source_node
                    .set_shape(dot_writer::Shape::Circle)
                    .set_color(dot_writer::Color::Blue)
                    .set_pen_width(3.0);
            }
            if state.id() == nfa.end_state() {
                source_node
                    .set_shape(dot_writer::Shape::Circle)
                    .set_color(dot_writer::Color::Red)
                    .set_pen_width(3.0);
            }
            source_node.id()
        };
        for transition in state.transitions() {
            let target_state = transition.target_state();
            digraph
                .edge(
                    source_id.clone(),
                    &format!("node_{}", target_state.as_usize()),
                )
                .attributes()
                .set_label(&transition.char_class().to_string().escape_default().to_string());
        }
        for epsilon_transition in state.epsilon_transitions() {
            let target_state = epsilon_transition.target_state();
            digraph
                .edge(
                    source_id.clone(),
                    &format!("node_{}", target_state.as_usize()),
                )
                .attributes()
                .set_label("ε");
        }
    }
}

/// Render a scanner DFA to the graphviz dot format.
#[allow(dead_code)]
pub(crate) fn dfa_render<W: Write>(dfa: &Dfa, label: &str, output: &mut W) {
    let mut writer = DotWriter::from(output);
    writer.set_pretty_print(true);
    let mut digraph = writer.digraph();
    digraph
        .set_label(label)
        .set_rank_direction(RankDirection::LeftRight);
    for (state_id, state) in dfa.states().iter().enumerate() {
        let mut source_node = digraph.node_auto();
        source_node.set_label(&state_id.to_string());
        if state_id == 0 {
            source_node
                .set_shape(dot_writer::Shape::Circle)
                .set_color(dot_writer::Color::Blue)
                .set_pen_width(3.0);
        }
        if let Some(accept) = state.accept {
            source_node
                .set_color(dot_writer::Color::Red)
                .set_pen_width(3.0)
                .set_label(&format!("{}\nt{}", state_id, accept.id()));
        }
    }
    for (state_id, state) in dfa.states().iter().enumerate() {
        for (class, target) in &state.transitions {
            digraph
                .edge(
                    &format!("node_{}", state_id),
                    &format!("node_{}", target.as_usize()),
                )
                .attributes()
                .set_label(&class.to_string().escape_default().to_string());
        }
    }
}

/// Render the LALR(1) automaton to the graphviz dot format. The states are
/// labeled with their kernel items.
#[allow(dead_code)]
pub(crate) fn lalr_render<W: Write>(
    automaton: &LalrAutomaton,
    grammar: &Grammar,
    label: &str,
    output: &mut W,
) {
    let mut writer = DotWriter::from(output);
    writer.set_pretty_print(true);
    let mut digraph = writer.digraph();
    digraph
        .set_label(label)
        .set_rank_direction(RankDirection::LeftRight);
    for (state_id, state) in automaton.states.iter().enumerate() {
        let kernel = state
            .kernel
            .iter()
            .map(|item| grammar.format_production(item.production, Some(item.dot as usize)))
            .collect::<Vec<_>>()
            .join("\n");
        let mut node = digraph.node_auto();
        node.set_label(&format!("{}\n{}", state_id, kernel.escape_default()));
        if state_id == 0 {
            node.set_color(dot_writer::Color::Blue).set_pen_width(3.0);
        }
    }
    for (state_id, state) in automaton.states.iter().enumerate() {
        for (symbol, target) in &state.transitions {
            digraph
                .edge(
                    &format!("node_{}", state_id),
                    &format!("node_{}", target.as_usize()),
                )
                .attributes()
                .set_label(&grammar.sym(*symbol).name.escape_default().to_string());
        }
    }
}
