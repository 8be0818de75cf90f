use std::collections::VecDeque;

use crate::math::{OrderedMap, OrderedSet, Set};

/// Identifier of a state inside a [`StateGraph`]. Identifiers are handed out by the
/// graph that owns the state and are meaningless across independently built graphs.
pub type StateId = u32;

/// Returns the display name of a state, `q` followed by its ordinal.
pub fn state_name(id: StateId) -> String {
    format!("q{id}")
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct StateData {
    transitions: OrderedMap<char, OrderedSet<StateId>>,
    epsilon: OrderedSet<StateId>,
}

/// In-memory representation of a (nondeterministic) state graph: states with labeled
/// transitions and epsilon edges.
///
/// Each graph owns its id counter, so identifiers are monotonically increasing within
/// one construction run and two independently built graphs never influence each other.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateGraph {
    states: OrderedMap<StateId, StateData>,
    counter: StateId,
}

impl StateGraph {
    /// Creates an empty graph with a fresh id allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fresh state and returns its identifier.
    pub fn add_state(&mut self) -> StateId {
        let id = self.counter;
        self.counter += 1;
        self.states.insert(id, StateData::default());
        id
    }

    /// Returns the number of states stored in the graph, including unreachable ones.
    pub fn size(&self) -> usize {
        self.states.len()
    }

    /// Checks whether the given state belongs to this graph.
    pub fn contains(&self, state: StateId) -> bool {
        self.states.contains_key(&state)
    }

    /// Adds a transition from `source` to `target` on the given input symbol.
    pub fn add_transition(&mut self, source: StateId, symbol: char, target: StateId) {
        assert!(
            self.contains(source) && self.contains(target),
            "source {source} or target {target} does not exist in the graph"
        );
        self.states
            .get_mut(&source)
            .expect("presence checked above")
            .transitions
            .entry(symbol)
            .or_default()
            .insert(target);
    }

    /// Adds an epsilon edge from `source` to `target`.
    pub fn add_epsilon(&mut self, source: StateId, target: StateId) {
        assert!(
            self.contains(source) && self.contains(target),
            "source {source} or target {target} does not exist in the graph"
        );
        self.states
            .get_mut(&source)
            .expect("presence checked above")
            .epsilon
            .insert(target);
    }

    /// Copies every outgoing edge of `source` (symbol transitions and epsilon edges)
    /// onto `into`. The merge primitive behind the Thompson combinators; `source`
    /// keeps its edges and may become unreachable afterwards.
    pub fn merge_outgoing(&mut self, source: StateId, into: StateId) {
        let data = self
            .states
            .get(&source)
            .cloned()
            .unwrap_or_else(|| panic!("merge source {source} does not exist in the graph"));
        let target = self
            .states
            .get_mut(&into)
            .unwrap_or_else(|| panic!("merge target {into} does not exist in the graph"));
        for (symbol, destinations) in data.transitions {
            target.transitions.entry(symbol).or_default().extend(destinations);
        }
        target.epsilon.extend(data.epsilon);
    }

    /// Iterates the targets reachable from `state` on the given symbol, in id order.
    pub fn symbol_targets(&self, state: StateId, symbol: char) -> impl Iterator<Item = StateId> + '_ {
        self.states
            .get(&state)
            .and_then(|data| data.transitions.get(&symbol))
            .into_iter()
            .flatten()
            .copied()
    }

    /// Iterates the symbols on which `state` has outgoing transitions, together with
    /// the target sets, in symbol order.
    pub fn symbols_from(&self, state: StateId) -> impl Iterator<Item = (char, &OrderedSet<StateId>)> {
        self.states
            .get(&state)
            .into_iter()
            .flat_map(|data| data.transitions.iter().map(|(&symbol, targets)| (symbol, targets)))
    }

    /// Iterates the epsilon targets of `state`, in id order.
    pub fn epsilon_targets(&self, state: StateId) -> impl Iterator<Item = StateId> + '_ {
        self.states
            .get(&state)
            .into_iter()
            .flat_map(|data| data.epsilon.iter().copied())
    }

    /// Computes the set of states reachable from `state` through epsilon edges alone,
    /// including `state` itself. Iterative worklist, cycles are fine.
    pub fn epsilon_closure(&self, state: StateId) -> OrderedSet<StateId> {
        let mut closure = OrderedSet::from([state]);
        let mut queue = VecDeque::from([state]);
        while let Some(current) = queue.pop_front() {
            for target in self.epsilon_targets(current) {
                if closure.insert(target) {
                    queue.push_back(target);
                }
            }
        }
        closure
    }

    /// Returns an iterator over all states reachable from `origin`, in breadth-first
    /// order with an explicit visited set.
    pub fn reachable_from(&self, origin: StateId) -> ReachableStates<'_> {
        ReachableStates::new(self, origin)
    }

    /// Enumerates the reachable part of the graph as a flat relation of
    /// `(source, symbol, target)` triples, where `None` stands for epsilon. Sources
    /// appear in breadth-first order, edges of one source in symbol order with the
    /// epsilon edges last, making the enumeration deterministic.
    pub fn triples(&self, origin: StateId) -> Vec<(StateId, Option<char>, StateId)> {
        let mut triples = Vec::new();
        for source in self.reachable_from(origin) {
            for (symbol, targets) in self.symbols_from(source) {
                for &target in targets {
                    triples.push((source, Some(symbol), target));
                }
            }
            for target in self.epsilon_targets(source) {
                triples.push((source, None, target));
            }
        }
        triples
    }
}

/// Breadth-first iterator over the states reachable from a given origin.
#[derive(Debug, Clone)]
pub struct ReachableStates<'a> {
    graph: &'a StateGraph,
    seen: Set<StateId>,
    queue: VecDeque<StateId>,
}

impl<'a> ReachableStates<'a> {
    fn new(graph: &'a StateGraph, origin: StateId) -> Self {
        Self {
            graph,
            seen: Set::from_iter([origin]),
            queue: VecDeque::from([origin]),
        }
    }
}

impl Iterator for ReachableStates<'_> {
    type Item = StateId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.queue.pop_front()?;
        let successors = self
            .graph
            .symbols_from(current)
            .flat_map(|(_, targets)| targets.iter().copied())
            .chain(self.graph.epsilon_targets(current));
        for successor in successors {
            if self.seen.insert(successor) {
                self.queue.push_back(successor);
            }
        }
        Some(current)
    }
}
