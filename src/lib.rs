//! Library for turning regular expressions into minimal deterministic finite automata.
//!
//! The pipeline has three algorithmic stages. A regular expression over alphanumeric
//! symbols with union, star, plus and grouping is parsed into a nondeterministic finite
//! automaton by Thompson's construction ([`regex::compile`]), driven by a shunting-yard
//! evaluator over single-entry/single-exit fragments. The NFA is converted into an
//! equivalent DFA by epsilon-closure subset construction ([`determinize::determinize`]),
//! and the DFA, viewed as a Moore machine whose states carry output labels, is
//! collapsed into the unique minimal equivalent machine by iterative partition
//! refinement ([`minimize::minimize`]).
//!
//! The stages communicate through [`tables::AutomatonTable`], a `;`-delimited tabular
//! interchange form: one output row, one state-name row (the start state is always the
//! first column, the remaining columns are sorted numerically by the trailing ordinal
//! of their name) and one row per alphabet symbol, with a literal `ε` row for NFAs.
//! Each stage either returns a fully valid automaton or a single typed error; no
//! partially built automaton ever escapes. The whole pipeline is synchronous and
//! in-memory, and every id allocator is scoped to one construction run, so concurrent
//! or repeated builds in one process never interfere.
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The prelude is supposed to make using this package easier. Importing everything via
/// `use remin::prelude::*;` should be enough to drive the whole pipeline.
pub mod prelude {
    pub use super::{
        alphabet::{CharAlphabet, EPSILON},
        determinize::determinize,
        graph::{state_name, StateGraph, StateId},
        math,
        minimize::minimize,
        nfa::{Fragment, Nfa, NfaBuilder},
        regex::{compile, ParseError},
        regex_to_minimal_dfa,
        tables::{AutomatonTable, FormatError, FINAL_LABEL},
        Error, StructuralError,
    };
}

/// Definitions of mathematical objects used throughout the crate: set and map
/// aliases, bijections and partitions.
pub mod math;

/// Alphabets of plain `char` input symbols and the reserved epsilon symbol.
pub mod alphabet;

/// The in-memory state-graph model shared by the NFA and DFA stages.
pub mod graph;

/// NFAs and the Thompson combinators that build them.
pub mod nfa;

/// Compilation of regular expressions into NFAs.
pub mod regex;

/// The tabular interchange form handed between the stages.
pub mod tables;

/// Epsilon-closure subset construction, turning tabular NFAs into DFAs.
pub mod determinize;

/// Moore-machine minimization via partition refinement.
pub mod minimize;

/// Violations of internal structural invariants. These indicate a defect in the
/// automaton handed to a stage, not a user error, and abort the stage instead of
/// letting it continue with a degraded automaton.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    /// The accept state of an NFA is not reachable from its start state.
    #[error("accept state `{state}` is not reachable from the start state")]
    AcceptUnreachable {
        /// Name of the unreachable accept state.
        state: String,
    },
    /// A transition references a state the automaton does not contain.
    #[error("state `{state}` is referenced but not part of the automaton")]
    MissingState {
        /// The referenced name.
        state: String,
    },
    /// A deterministic stage received an automaton with epsilon transitions.
    #[error("expected a deterministic automaton but found epsilon transitions")]
    EpsilonTransitions,
    /// A deterministic stage received a state with several successors on one symbol.
    #[error("state `{state}` has more than one successor on `{symbol}`")]
    Nondeterministic {
        /// The offending state.
        state: String,
        /// The symbol with multiple successors.
        symbol: char,
    },
}

/// Any error the pipeline can produce, one variant per stage-level taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A malformed regular expression.
    #[error(transparent)]
    Parse(#[from] regex::ParseError),
    /// A malformed tabular automaton.
    #[error(transparent)]
    Format(#[from] tables::FormatError),
    /// A violated structural invariant.
    #[error(transparent)]
    Structural(#[from] StructuralError),
}

/// Runs the full pipeline in memory: compile `pattern`, export the NFA to the
/// tabular form, determinize it and minimize the result.
pub fn regex_to_minimal_dfa(pattern: &str) -> Result<tables::AutomatonTable, Error> {
    let nfa = regex::compile(pattern)?;
    let table = nfa.to_table()?;
    let dfa = determinize::determinize(&table)?;
    Ok(minimize::minimize(&dfa)?)
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    /// All words over `alphabet` of length at most `max_len`, shortest first.
    pub fn words(alphabet: &[char], max_len: usize) -> Vec<String> {
        let mut all = vec![String::new()];
        let mut layer = vec![String::new()];
        for _ in 0..max_len {
            let mut next = Vec::with_capacity(layer.len() * alphabet.len());
            for word in &layer {
                for &symbol in alphabet {
                    let mut extended = word.clone();
                    extended.push(symbol);
                    next.push(extended);
                }
            }
            all.extend(next.iter().cloned());
            layer = next;
        }
        all
    }

    /// The six-state DFA from the Wikipedia article on DFA minimization; its minimal
    /// form has three states.
    pub fn wiki_dfa() -> AutomatonTable {
        let mut table = AutomatonTable::with_start("q0");
        for (state, symbol, target) in [
            (0, 'a', 1),
            (0, 'b', 2),
            (1, 'a', 0),
            (1, 'b', 3),
            (2, 'a', 4),
            (2, 'b', 5),
            (3, 'a', 4),
            (3, 'b', 5),
            (4, 'a', 4),
            (4, 'b', 5),
            (5, 'a', 5),
            (5, 'b', 5),
        ] {
            table.insert_transition(format!("q{state}"), symbol, format!("q{target}"));
        }
        for accepting in [2, 3, 4] {
            table.set_output(format!("q{accepting}"), FINAL_LABEL);
        }
        table
    }

    #[test_log::test]
    fn pipeline_matches_the_regex_language() {
        let minimal = regex_to_minimal_dfa("(a|b)*abb").unwrap();
        for word in words(&['a', 'b'], 7) {
            assert_eq!(
                minimal.accepts(&word),
                word.ends_with("abb"),
                "word {word:?} disagrees"
            );
        }
        // ends-with-abb needs exactly the four suffix-progress states
        assert_eq!(minimal.state_count(), 4);
    }

    #[test_log::test]
    fn every_stage_preserves_the_language() {
        for pattern in ["ab", "a|b", "a*", "a+", "ab*a", "(ab|b)*", "a*|b"] {
            let nfa = compile(pattern).unwrap();
            let table = nfa.to_table().unwrap();
            let dfa = determinize(&table).unwrap();
            let minimal = minimize(&dfa).unwrap();
            assert!(minimal.state_count() <= dfa.state_count());
            for word in words(&['a', 'b'], 6) {
                let expected = nfa.accepts(&word);
                assert_eq!(table.accepts(&word), expected, "{pattern:?} nfa table, {word:?}");
                assert_eq!(dfa.accepts(&word), expected, "{pattern:?} dfa, {word:?}");
                assert_eq!(minimal.accepts(&word), expected, "{pattern:?} minimal, {word:?}");
            }
        }
    }

    #[test_log::test]
    fn star_collapses_to_a_single_state() {
        let minimal = regex_to_minimal_dfa("a*").unwrap();
        assert_eq!(minimal.state_count(), 1);
        assert!(minimal.is_final(minimal.start()));
    }

    #[test_log::test]
    fn pipeline_round_trips_through_the_interchange_format() {
        let nfa = compile("a+").unwrap().to_table().unwrap();
        let reparsed: AutomatonTable = nfa.to_string().parse().unwrap();
        assert_eq!(reparsed, nfa);
        let dfa = determinize(&reparsed).unwrap();
        let reparsed_dfa: AutomatonTable = dfa.to_string().parse().unwrap();
        let minimal = minimize(&reparsed_dfa).unwrap();
        assert!(minimal.accepts("aaa"));
        assert!(!minimal.accepts(""));
    }

    #[test_log::test]
    fn pipeline_errors_carry_the_stage_taxonomy() {
        assert!(matches!(
            regex_to_minimal_dfa("a|"),
            Err(Error::Parse(ParseError::MissingOperand { .. }))
        ));
    }
}
