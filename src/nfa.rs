use tracing::trace;

use crate::{
    alphabet::EPSILON,
    graph::{state_name, StateGraph, StateId},
    math::OrderedSet,
    tables::{AutomatonTable, FINAL_LABEL},
    StructuralError,
};

/// Handle to a single-entry/single-exit sub-automaton inside an [`NfaBuilder`].
///
/// Invariant: the accept state of a fragment has no outgoing edges until the fragment
/// is passed to a combinator. Every combinator below preserves this for its result,
/// which is what makes them compositional.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fragment {
    /// Entry state of the fragment.
    pub start: StateId,
    /// Exit state of the fragment.
    pub accept: StateId,
}

/// Builds NFAs via Thompson's construction. The builder owns the [`StateGraph`] all
/// fragments live in, and thereby the id allocator for one construction run.
#[derive(Debug, Default)]
pub struct NfaBuilder {
    graph: StateGraph,
}

impl NfaBuilder {
    /// Creates a builder with an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fragment recognizing exactly the one-symbol word `symbol`.
    pub fn from_symbol(&mut self, symbol: char) -> Fragment {
        let start = self.graph.add_state();
        let accept = self.graph.add_state();
        self.graph.add_transition(start, symbol, accept);
        Fragment { start, accept }
    }

    /// Concatenation: the outgoing edges of `right`'s start are merged onto `left`'s
    /// accept state, chaining the two fragments.
    pub fn concatenate(&mut self, left: Fragment, right: Fragment) -> Fragment {
        self.graph.merge_outgoing(right.start, left.accept);
        Fragment {
            start: left.start,
            accept: right.accept,
        }
    }

    /// Union: the outgoing edges of `right`'s start are merged onto `left`'s start,
    /// and `right`'s accept is routed to `left`'s accept via an epsilon edge.
    pub fn union(&mut self, left: Fragment, right: Fragment) -> Fragment {
        self.graph.merge_outgoing(right.start, left.start);
        self.graph.add_epsilon(right.accept, left.accept);
        Fragment {
            start: left.start,
            accept: left.accept,
        }
    }

    /// Kleene star: fresh entry and exit states around `inner`, with a skip edge past
    /// it and a repeat edge back into it.
    ///
    /// The fresh endpoints are not optional. Reusing `inner`'s own states would return
    /// a fragment whose accept state has outgoing edges, and a later union would then
    /// leak the repeat loop to the other operand (`a*|b` must not accept `ba`).
    pub fn kleene_star(&mut self, inner: Fragment) -> Fragment {
        let start = self.graph.add_state();
        let accept = self.graph.add_state();
        self.graph.add_epsilon(start, inner.start);
        self.graph.add_epsilon(start, accept);
        self.graph.add_epsilon(inner.accept, inner.start);
        self.graph.add_epsilon(inner.accept, accept);
        Fragment { start, accept }
    }

    /// One-or-more repetition, `concatenate(inner, kleene_star(inner))`.
    ///
    /// No structural copy of `inner` is needed: the star's skip route starts at a
    /// fresh state that only becomes reachable after one traversal of `inner`, so the
    /// empty word stays rejected.
    pub fn plus(&mut self, inner: Fragment) -> Fragment {
        let star = self.kleene_star(inner);
        self.concatenate(inner, star)
    }

    /// Consumes the builder, turning the given fragment into a complete [`Nfa`].
    pub fn finish(self, fragment: Fragment) -> Nfa {
        trace!(
            "finishing nfa with start {} and accept {} over {} states",
            fragment.start,
            fragment.accept,
            self.graph.size()
        );
        Nfa {
            graph: self.graph,
            start: fragment.start,
            accept: fragment.accept,
        }
    }
}

/// A nondeterministic finite automaton with a single start and a single accept state,
/// as produced by Thompson's construction.
#[derive(Clone, Debug)]
pub struct Nfa {
    graph: StateGraph,
    start: StateId,
    accept: StateId,
}

impl Nfa {
    /// The start state.
    pub fn start(&self) -> StateId {
        self.start
    }

    /// The accept state.
    pub fn accept(&self) -> StateId {
        self.accept
    }

    /// Number of states reachable from the start state.
    pub fn size(&self) -> usize {
        self.graph.reachable_from(self.start).count()
    }

    /// Runs the automaton on `input` by closure-stepping through sets of states.
    pub fn accepts(&self, input: &str) -> bool {
        let mut current = self.graph.epsilon_closure(self.start);
        for symbol in input.chars() {
            let mut next = OrderedSet::new();
            for &state in &current {
                for target in self.graph.symbol_targets(state, symbol) {
                    next.extend(self.graph.epsilon_closure(target));
                }
            }
            if next.is_empty() {
                return false;
            }
            current = next;
        }
        current.contains(&self.accept)
    }

    /// Exports the reachable part of the automaton to the tabular interchange form.
    /// States keep their `q{ordinal}` names; the accept state is labeled
    /// [`FINAL_LABEL`]. Fails if the accept state is unreachable, which would be a
    /// construction defect rather than a user error.
    pub fn to_table(&self) -> Result<AutomatonTable, StructuralError> {
        let reachable: Vec<StateId> = self.graph.reachable_from(self.start).collect();
        if !reachable.contains(&self.accept) {
            return Err(StructuralError::AcceptUnreachable {
                state: state_name(self.accept),
            });
        }
        let mut table = AutomatonTable::with_start(state_name(self.start));
        for &state in &reachable {
            table.insert_state(state_name(state));
        }
        table.set_output(state_name(self.accept), FINAL_LABEL);
        for (source, symbol, target) in self.graph.triples(self.start) {
            table.insert_transition(
                state_name(source),
                symbol.unwrap_or(EPSILON),
                state_name(target),
            );
        }
        Ok(table)
    }
}
