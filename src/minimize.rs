use std::collections::VecDeque;

use tracing::debug;

use crate::{
    math::{Map, OrderedSet, Partition, Set},
    tables::AutomatonTable,
    StructuralError,
};

/// Minimizes a tabular DFA with a Moore output labeling into the unique coarsest
/// equivalent machine, by reachability pruning followed by iterative partition
/// refinement.
///
/// The input must be deterministic: an epsilon row or a cell with more than one
/// destination is an invariant violation and fails loudly instead of degrading.
/// Output labels are compared verbatim, so multi-valued Moore outputs work the same
/// way as the plain accepting designator. Running the function on its own output is
/// a no-op up to state naming.
pub fn minimize(dfa: &AutomatonTable) -> Result<AutomatonTable, StructuralError> {
    if dfa.has_epsilon() {
        return Err(StructuralError::EpsilonTransitions);
    }
    for state in dfa.states() {
        for symbol in dfa.alphabet().universe() {
            if dfa.targets(state, symbol).count() > 1 {
                return Err(StructuralError::Nondeterministic {
                    state: state.clone(),
                    symbol,
                });
            }
        }
    }

    // step 0: forward reachability from the start state
    let mut seen: Set<&str> = Set::from_iter([dfa.start()]);
    let mut queue = VecDeque::from([dfa.start()]);
    while let Some(state) = queue.pop_front() {
        for symbol in dfa.alphabet().universe() {
            for target in dfa.targets(state, symbol) {
                if seen.insert(target) {
                    queue.push_back(target);
                }
            }
        }
    }
    let pruned: Vec<&str> = dfa
        .states()
        .iter()
        .map(String::as_str)
        .filter(|state| seen.contains(state))
        .collect();
    if pruned.len() < dfa.state_count() {
        debug!(
            "pruned {} unreachable state(s)",
            dfa.state_count() - pruned.len()
        );
    }

    let index: Map<&str, usize> = pruned
        .iter()
        .enumerate()
        .map(|(position, &name)| (name, position))
        .collect();
    let alphabet: Vec<char> = dfa.alphabet().universe().collect();
    let successors: Vec<Vec<Option<usize>>> = pruned
        .iter()
        .map(|&state| {
            alphabet
                .iter()
                .map(|&symbol| dfa.targets(state, symbol).next().map(|target| index[target]))
                .collect()
        })
        .collect();

    // step 1: initial partition, one group per output label in first-seen order
    let mut groups: Vec<usize> = Vec::with_capacity(pruned.len());
    {
        let mut labels: Map<&str, usize> = Map::default();
        for &state in &pruned {
            let fresh = labels.len();
            groups.push(*labels.entry(dfa.output(state)).or_insert(fresh));
        }
    }
    let mut group_count = groups.iter().copied().collect::<Set<_>>().len();

    // step 2: refine by successor-group signatures until the count stabilizes
    let mut rounds = 0;
    loop {
        rounds += 1;
        let mut assignment: Map<(usize, Vec<Option<usize>>), usize> = Map::default();
        let mut refined = Vec::with_capacity(pruned.len());
        for (position, successor) in successors.iter().enumerate() {
            let signature: Vec<Option<usize>> = successor
                .iter()
                .map(|target| target.map(|t| groups[t]))
                .collect();
            let fresh = assignment.len();
            refined.push(*assignment.entry((groups[position], signature)).or_insert(fresh));
        }
        let refined_count = assignment.len();
        debug_assert!(refined_count >= group_count, "refinement never merges groups");
        groups = refined;
        if refined_count == group_count {
            break;
        }
        group_count = refined_count;
    }
    debug!("partition refinement converged after {rounds} round(s) into {group_count} group(s)");

    // step 3: project onto one state per class, via a representative member
    let mut classes: Vec<OrderedSet<usize>> = vec![OrderedSet::new(); group_count];
    for (position, &group) in groups.iter().enumerate() {
        classes[group].insert(position);
    }
    let partition = Partition::new(classes);

    let mut minimal = AutomatonTable::with_start(format!("q{}", groups[0]));
    for &symbol in &alphabet {
        minimal.declare_symbol(symbol);
    }
    for (group, class) in partition.iter().enumerate() {
        let &representative = class.first().expect("every class is populated");
        let name = format!("q{group}");
        minimal.set_output(&name, dfa.output(pruned[representative]));
        for (position, &symbol) in alphabet.iter().enumerate() {
            if let Some(successor) = successors[representative][position] {
                let target = partition
                    .class_index_of(&successor)
                    .expect("every pruned state belongs to a class");
                minimal.insert_transition(name.clone(), symbol, format!("q{target}"));
            }
        }
    }
    Ok(minimal)
}
