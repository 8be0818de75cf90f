use std::collections::VecDeque;

use bit_set::BitSet;
use tracing::{debug, trace};

use crate::{
    alphabet::EPSILON,
    math::{Bijection, Map},
    tables::{AutomatonTable, FINAL_LABEL},
    StructuralError,
};

/// Converts a tabular NFA into an equivalent tabular DFA via epsilon-closure subset
/// construction.
///
/// Every NFA state is assigned its epsilon closure once, up front, as a dense bit
/// set. A DFA state is a canonical set of NFA state ordinals; the canonical key is
/// interned to a small sequential id in first-discovery order (the start closure is
/// id 0), and the worklist runs over those ids. The emitted table names state `i` as
/// `q{i}`, keeps the full input alphabet of the NFA, carries no epsilon row, and
/// records *no* transition where the successor union is empty.
pub fn determinize(nfa: &AutomatonTable) -> Result<AutomatonTable, StructuralError> {
    let states = nfa.states();
    let index: Map<&str, usize> = states
        .iter()
        .enumerate()
        .map(|(position, name)| (name.as_str(), position))
        .collect();

    let closures = states
        .iter()
        .enumerate()
        .map(|(position, _)| epsilon_closure(nfa, &index, position))
        .collect::<Result<Vec<_>, _>>()?;

    let &start = index
        .get(nfa.start())
        .ok_or_else(|| StructuralError::MissingState {
            state: nfa.start().to_string(),
        })?;

    let mut interner: Bijection<Vec<usize>, usize> = Bijection::new();
    let mut worklist = VecDeque::new();
    let start_key: Vec<usize> = closures[start].iter().collect();
    interner.insert(start_key.clone(), 0);
    worklist.push_back(start_key);

    let mut dfa = AutomatonTable::with_start("q0");
    for symbol in nfa.alphabet().universe() {
        dfa.declare_symbol(symbol);
    }

    while let Some(key) = worklist.pop_front() {
        let id = *interner
            .get_by_left(&key)
            .expect("keys are interned before they are queued");
        let name = format!("q{id}");
        let accepting = key.iter().any(|&member| nfa.is_final(&states[member]));
        dfa.set_output(&name, if accepting { FINAL_LABEL } else { "" });

        for symbol in nfa.alphabet().universe() {
            let mut union = BitSet::with_capacity(states.len());
            for &member in &key {
                for target in nfa.targets(&states[member], symbol) {
                    let &position = index.get(target).ok_or_else(|| {
                        StructuralError::MissingState {
                            state: target.to_string(),
                        }
                    })?;
                    union.union_with(&closures[position]);
                }
            }
            if union.is_empty() {
                // no successor at all: the cell stays blank
                continue;
            }
            let successor_key: Vec<usize> = union.iter().collect();
            let successor_id = match interner.get_by_left(&successor_key) {
                Some(&known) => known,
                None => {
                    let fresh = interner.len();
                    interner.insert(successor_key.clone(), fresh);
                    worklist.push_back(successor_key);
                    trace!("discovered dfa state q{fresh} with {} members", union.len());
                    fresh
                }
            };
            dfa.insert_transition(name.clone(), symbol, format!("q{successor_id}"));
        }
    }

    debug!(
        "subset construction produced {} dfa states from {} nfa states",
        interner.len(),
        states.len()
    );
    Ok(dfa)
}

/// Computes the epsilon closure of one state as a bit set over state ordinals, by an
/// iterative worklist over the epsilon relation.
fn epsilon_closure(
    nfa: &AutomatonTable,
    index: &Map<&str, usize>,
    origin: usize,
) -> Result<BitSet, StructuralError> {
    let states = nfa.states();
    let mut closure = BitSet::with_capacity(states.len());
    closure.insert(origin);
    let mut queue = VecDeque::from([origin]);
    while let Some(current) = queue.pop_front() {
        for target in nfa.targets(&states[current], EPSILON) {
            let &position = index
                .get(target)
                .ok_or_else(|| StructuralError::MissingState {
                    state: target.to_string(),
                })?;
            if closure.insert(position) {
                queue.push_back(position);
            }
        }
    }
    Ok(closure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regex::compile;

    #[test_log::test]
    fn subset_construction_collapses_overlapping_edges() {
        let mut nfa = AutomatonTable::with_start("q0");
        nfa.insert_transition("q0", 'a', "q0");
        nfa.insert_transition("q0", 'a', "q1");
        nfa.insert_transition("q0", 'b', "q1");
        nfa.insert_transition("q1", 'b', "q1");
        nfa.insert_transition("q1", 'a', "q0");

        let dfa = determinize(&nfa).unwrap();
        assert_eq!(dfa.state_count(), 3);
        for state in dfa.states() {
            for symbol in dfa.alphabet().universe() {
                assert!(
                    dfa.targets(state, symbol).count() <= 1,
                    "dfa must be deterministic"
                );
            }
        }
    }

    #[test_log::test]
    fn names_are_assigned_in_discovery_order() {
        let nfa = compile("a|b").unwrap().to_table().unwrap();
        let dfa = determinize(&nfa).unwrap();
        assert_eq!(dfa.start(), "q0");
        assert_eq!(
            dfa.states(),
            ["q0".to_string(), "q1".to_string(), "q2".to_string()]
        );
        assert!(!dfa.has_epsilon());
    }

    #[test_log::test]
    fn missing_successors_leave_blank_cells() {
        let nfa = compile("ab").unwrap().to_table().unwrap();
        let dfa = determinize(&nfa).unwrap();
        assert_eq!(dfa.targets("q0", 'b').count(), 0);
        assert!(!dfa.to_string().contains("ε"));
    }

    #[test_log::test]
    fn determinization_preserves_the_language() {
        for pattern in ["ab", "a|b", "a*", "a+", "(a|b)*abb", "a*|b", "(ab|b)*a"] {
            let nfa = compile(pattern).unwrap();
            let dfa = determinize(&nfa.to_table().unwrap()).unwrap();
            for word in crate::tests::words(&['a', 'b'], 6) {
                assert_eq!(
                    nfa.accepts(&word),
                    dfa.accepts(&word),
                    "pattern {pattern:?} and word {word:?} disagree"
                );
            }
        }
    }

    #[test_log::test]
    fn epsilon_closures_cross_chained_edges() {
        let mut nfa = AutomatonTable::with_start("q0");
        nfa.insert_transition("q0", EPSILON, "q1");
        nfa.insert_transition("q1", EPSILON, "q2");
        nfa.insert_transition("q2", 'a', "q2");
        nfa.set_output("q2", FINAL_LABEL);

        let dfa = determinize(&nfa).unwrap();
        // the start closure already contains the accepting member
        assert!(dfa.is_final(dfa.start()));
        assert!(dfa.accepts(""));
        assert!(dfa.accepts("aa"));
    }
}
