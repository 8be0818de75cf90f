use std::{collections::VecDeque, fmt, str::FromStr};

use itertools::Itertools;

use crate::{
    alphabet::{CharAlphabet, EPSILON},
    math::{OrderedMap, OrderedSet, Set},
};

/// Output label that marks an accepting state in the interchange form. Moore machines
/// may carry arbitrary labels; this one is the distinguished accepting designator.
pub const FINAL_LABEL: &str = "F";

/// Field delimiter of the interchange format. Multi-valued cells are comma-joined.
const DELIMITER: char = ';';

/// Represents the ways in which parsing a tabular automaton can fail. Line numbers
/// are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// The table has fewer than the two mandatory header rows.
    #[error("table must have an output row and a state-name row")]
    MissingHeader,
    /// A header row does not begin with a blank cell.
    #[error("header rows must begin with a blank cell")]
    HeaderLeadingCell,
    /// The state-name row declares no states.
    #[error("table declares no states")]
    NoStates,
    /// A state column with a blank name.
    #[error("state column {column} has a blank name")]
    BlankStateName {
        /// Index of the column, counting the leading symbol column as 0.
        column: usize,
    },
    /// The same state name appears in more than one column.
    #[error("state `{0}` is declared more than once")]
    DuplicateState(String),
    /// A row has a different number of cells than the state-name row.
    #[error("row {line} has {found} cells, expected {expected}")]
    ColumnCount {
        /// Line the mismatch occurs on.
        line: usize,
        /// Number of cells the state-name row has.
        expected: usize,
        /// Number of cells actually found.
        found: usize,
    },
    /// The leading cell of a transition row is not a single symbol.
    #[error("row {line} does not name a single transition symbol")]
    InvalidSymbol {
        /// Line of the offending row.
        line: usize,
    },
    /// The same symbol labels more than one transition row.
    #[error("symbol `{0}` has more than one row")]
    DuplicateSymbol(char),
    /// A destination cell references a state missing from the header.
    #[error("state `{name}` on row {line} is not declared in the header")]
    UnknownState {
        /// The undeclared name.
        name: String,
        /// Line of the offending cell.
        line: usize,
    },
}

/// Canonical sort key of a state name: numeric by trailing ordinal, so that `q9`
/// precedes `q10`. Names without a trailing number order before numbered ones and
/// among themselves by the name alone.
fn ordinal_key(name: &str) -> (Option<u64>, &str) {
    let stem = name.trim_end_matches(|c: char| c.is_ascii_digit());
    (name[stem.len()..].parse().ok(), name)
}

/// Tabular interchange representation of an automaton: an ordered alphabet, state
/// columns, a per-symbol transition relation and a Moore output labeling.
///
/// Canonical form is maintained on every mutation: state columns are sorted by the
/// numeric ordinal of their name with the start state forced into the first column,
/// transition rows follow the sorted alphabet with the epsilon row last, and a
/// missing `(state, symbol)` entry means *no transition*; an empty target set is
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomatonTable {
    start: String,
    states: Vec<String>,
    alphabet: CharAlphabet,
    epsilon: bool,
    outputs: OrderedMap<String, String>,
    transitions: OrderedMap<String, OrderedMap<char, OrderedSet<String>>>,
}

impl AutomatonTable {
    /// Creates a table holding just the given start state with a blank output.
    pub fn with_start(start: impl Into<String>) -> Self {
        let start = start.into();
        Self {
            states: vec![start.clone()],
            outputs: OrderedMap::from([(start.clone(), String::new())]),
            start,
            alphabet: CharAlphabet::default(),
            epsilon: false,
            transitions: OrderedMap::new(),
        }
    }

    /// Adds a state column if it is not yet present.
    pub fn insert_state(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.states.contains(&name) {
            self.outputs.entry(name.clone()).or_default();
            self.states.push(name);
            self.normalize();
        }
    }

    /// Sets the output label of a state, registering the state if necessary.
    pub fn set_output(&mut self, state: impl Into<String>, label: impl Into<String>) {
        let state = state.into();
        self.insert_state(state.clone());
        self.outputs.insert(state, label.into());
    }

    /// Records a transition. [`EPSILON`] routes to the epsilon relation of an NFA
    /// table, any other symbol extends the input alphabet. Both endpoints are
    /// registered as states if necessary.
    pub fn insert_transition(
        &mut self,
        source: impl Into<String>,
        symbol: char,
        target: impl Into<String>,
    ) {
        let (source, target) = (source.into(), target.into());
        self.insert_state(source.clone());
        self.insert_state(target.clone());
        self.declare_symbol(symbol);
        self.transitions
            .entry(source)
            .or_default()
            .entry(symbol)
            .or_default()
            .insert(target);
    }

    /// Declares a symbol row even when no transition uses it, so that blank rows
    /// survive a round trip through the interchange form.
    pub fn declare_symbol(&mut self, symbol: char) {
        if symbol == EPSILON {
            self.epsilon = true;
        } else if !self.alphabet.contains(symbol) {
            self.alphabet = self.alphabet.universe().chain([symbol]).collect();
        }
    }

    fn normalize(&mut self) {
        self.states
            .sort_by(|left, right| ordinal_key(left).cmp(&ordinal_key(right)));
        let position = self
            .states
            .iter()
            .position(|state| *state == self.start)
            .expect("the start state is always registered");
        let start = self.states.remove(position);
        self.states.insert(0, start);
    }

    /// The designated start state, always the first state column.
    pub fn start(&self) -> &str {
        &self.start
    }

    /// The state columns in canonical order.
    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// The input alphabet, epsilon excluded.
    pub fn alphabet(&self) -> &CharAlphabet {
        &self.alphabet
    }

    /// Whether the table carries an epsilon row.
    pub fn has_epsilon(&self) -> bool {
        self.epsilon
    }

    /// The output label of a state, the empty string if it has none.
    pub fn output(&self, state: &str) -> &str {
        self.outputs.get(state).map(String::as_str).unwrap_or("")
    }

    /// Whether the state carries the accepting designator.
    pub fn is_final(&self, state: &str) -> bool {
        self.output(state) == FINAL_LABEL
    }

    /// Iterates the destinations of the given `(state, symbol)` cell. Empty iterator
    /// when the cell is blank.
    pub fn targets(&self, state: &str, symbol: char) -> impl Iterator<Item = &str> + '_ {
        self.transitions
            .get(state)
            .and_then(|row| row.get(&symbol))
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    fn epsilon_closure_of(&self, seed: impl IntoIterator<Item = String>) -> OrderedSet<String> {
        let mut closure: OrderedSet<String> = seed.into_iter().collect();
        let mut queue: VecDeque<String> = closure.iter().cloned().collect();
        while let Some(state) = queue.pop_front() {
            for target in self.targets(&state, EPSILON) {
                if closure.insert(target.to_string()) {
                    queue.push_back(target.to_string());
                }
            }
        }
        closure
    }

    /// Runs the automaton on `input` by closure-stepping through sets of state names.
    /// Works for NFA and DFA tables alike; accepting iff the reached set contains a
    /// state labeled [`FINAL_LABEL`].
    pub fn accepts(&self, input: &str) -> bool {
        let mut current = self.epsilon_closure_of([self.start.clone()]);
        for symbol in input.chars() {
            let raw: OrderedSet<String> = current
                .iter()
                .flat_map(|state| self.targets(state, symbol).map(str::to_string))
                .collect();
            if raw.is_empty() {
                return false;
            }
            current = self.epsilon_closure_of(raw);
        }
        current.iter().any(|state| self.is_final(state))
    }

    fn symbol_rows(&self) -> impl Iterator<Item = char> + '_ {
        self.alphabet.universe().chain(self.epsilon.then_some(EPSILON))
    }

    fn cell(&self, state: &str, symbol: char) -> String {
        self.targets(state, symbol)
            .sorted_by(|left, right| ordinal_key(left).cmp(&ordinal_key(right)))
            .join(",")
    }

    /// Renders the table for humans, with the start column and accepting labels
    /// highlighted. The machine-readable form is the [`Display`](fmt::Display) impl.
    pub fn pretty(&self) -> String {
        use owo_colors::OwoColorize;
        let mut builder = tabled::builder::Builder::default();
        builder.push_record(std::iter::once(String::new()).chain(self.states.iter().map(
            |state| {
                if *state == self.start {
                    state.bold().to_string()
                } else {
                    state.clone()
                }
            },
        )));
        builder.push_record(std::iter::once("output".to_string()).chain(
            self.states.iter().map(|state| {
                let label = self.output(state);
                if label == FINAL_LABEL {
                    label.green().to_string()
                } else {
                    label.to_string()
                }
            }),
        ));
        for symbol in self.symbol_rows() {
            builder.push_record(
                std::iter::once(symbol.to_string())
                    .chain(self.states.iter().map(|state| self.cell(state, symbol))),
            );
        }
        builder
            .build()
            .with(tabled::settings::Style::rounded())
            .to_string()
    }
}

impl fmt::Display for AutomatonTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = DELIMITER.to_string();
        let outputs = std::iter::once("")
            .chain(self.states.iter().map(|state| self.output(state)))
            .join(&separator);
        writeln!(f, "{outputs}")?;
        let names = std::iter::once("")
            .chain(self.states.iter().map(String::as_str))
            .join(&separator);
        writeln!(f, "{names}")?;
        for symbol in self.symbol_rows() {
            let row = std::iter::once(symbol.to_string())
                .chain(self.states.iter().map(|state| self.cell(state, symbol)))
                .join(&separator);
            writeln!(f, "{row}")?;
        }
        Ok(())
    }
}

impl FromStr for AutomatonTable {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lines: Vec<&str> = s.lines().map(|line| line.trim_end_matches('\r')).collect();
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        if lines.len() < 2 {
            return Err(FormatError::MissingHeader);
        }

        let outputs: Vec<&str> = lines[0].split(DELIMITER).collect();
        let names: Vec<&str> = lines[1].split(DELIMITER).collect();
        if !outputs[0].is_empty() || !names[0].is_empty() {
            return Err(FormatError::HeaderLeadingCell);
        }
        if names.len() < 2 {
            return Err(FormatError::NoStates);
        }
        if let Some(blank) = names[1..].iter().position(|name| name.is_empty()) {
            return Err(FormatError::BlankStateName { column: blank + 1 });
        }
        if outputs.len() != names.len() {
            return Err(FormatError::ColumnCount {
                line: 1,
                expected: names.len(),
                found: outputs.len(),
            });
        }
        let declared: Set<&str> = names[1..].iter().copied().collect();
        if declared.len() != names.len() - 1 {
            let duplicate = names[1..]
                .iter()
                .duplicates()
                .next()
                .expect("count mismatch implies a duplicate");
            return Err(FormatError::DuplicateState(duplicate.to_string()));
        }

        let mut table = AutomatonTable::with_start(names[1]);
        for (&name, &label) in names[1..].iter().zip(&outputs[1..]) {
            table.set_output(name, label);
        }

        let mut seen_symbols: Set<char> = Set::default();
        for (index, line) in lines.iter().enumerate().skip(2) {
            let line_number = index + 1;
            let cells: Vec<&str> = line.split(DELIMITER).collect();
            if cells.len() != names.len() {
                return Err(FormatError::ColumnCount {
                    line: line_number,
                    expected: names.len(),
                    found: cells.len(),
                });
            }
            let mut chars = cells[0].chars();
            let symbol = match (chars.next(), chars.next()) {
                (Some(symbol), None) => symbol,
                _ => return Err(FormatError::InvalidSymbol { line: line_number }),
            };
            if !seen_symbols.insert(symbol) {
                return Err(FormatError::DuplicateSymbol(symbol));
            }
            table.declare_symbol(symbol);
            for (&state, &cell) in names[1..].iter().zip(&cells[1..]) {
                if cell.is_empty() {
                    continue;
                }
                for destination in cell.split(',') {
                    if !declared.contains(destination) {
                        return Err(FormatError::UnknownState {
                            name: destination.to_string(),
                            line: line_number,
                        });
                    }
                    table.insert_transition(state, symbol, destination);
                }
            }
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_nfa_table() -> AutomatonTable {
        let mut table = AutomatonTable::with_start("q0");
        table.insert_transition("q0", 'a', "q1");
        table.insert_transition("q1", EPSILON, "q0");
        table.set_output("q1", FINAL_LABEL);
        table
    }

    #[test]
    fn serialization_is_bit_exact() {
        let table = sample_nfa_table();
        assert_eq!(table.to_string(), ";;F\n;q0;q1\na;q1;\nε;;q0\n");
    }

    #[test]
    fn round_trip_preserves_the_table() {
        let table = sample_nfa_table();
        let reparsed: AutomatonTable = table.to_string().parse().unwrap();
        assert_eq!(reparsed, table);
    }

    #[test]
    fn columns_sort_numerically_with_start_first() {
        let mut table = AutomatonTable::with_start("q2");
        table.insert_state("q10");
        table.insert_state("q9");
        assert_eq!(
            table.states(),
            ["q2".to_string(), "q9".to_string(), "q10".to_string()]
        );
    }

    #[test]
    fn parse_takes_the_first_column_as_start() {
        let table: AutomatonTable = ";;F\n;q5;q1\na;q1;\n".parse().unwrap();
        assert_eq!(table.start(), "q5");
        assert_eq!(table.states(), ["q5".to_string(), "q1".to_string()]);
        assert!(table.is_final("q1"));
    }

    #[test]
    fn blank_cells_mean_no_transition() {
        let table = sample_nfa_table();
        assert_eq!(table.targets("q1", 'a').count(), 0);
        assert_eq!(table.targets("q0", EPSILON).count(), 0);
    }

    #[test]
    fn declared_symbols_survive_round_trips() {
        let mut table = AutomatonTable::with_start("q0");
        table.declare_symbol('b');
        table.insert_transition("q0", 'a', "q0");
        let reparsed: AutomatonTable = table.to_string().parse().unwrap();
        assert_eq!(reparsed.alphabet().universe().collect::<Vec<_>>(), vec!['a', 'b']);
        assert_eq!(reparsed, table);
    }

    #[test]
    fn simulation_follows_epsilon_edges() {
        let table = sample_nfa_table();
        assert!(table.accepts("a"));
        assert!(table.accepts("aa"));
        assert!(!table.accepts(""));
        assert!(!table.accepts("b"));
    }

    #[test]
    fn parse_rejects_malformed_tables() {
        assert_eq!(
            ";q0".parse::<AutomatonTable>().unwrap_err(),
            FormatError::MissingHeader
        );
        assert_eq!(
            "F;\nq0;".parse::<AutomatonTable>().unwrap_err(),
            FormatError::HeaderLeadingCell
        );
        assert_eq!(
            "\n\n".parse::<AutomatonTable>().unwrap_err(),
            FormatError::MissingHeader
        );
        assert_eq!(
            "\n\na;q0".parse::<AutomatonTable>().unwrap_err(),
            FormatError::NoStates
        );
        assert_eq!(
            ";;\n;q0;\na;q0;".parse::<AutomatonTable>().unwrap_err(),
            FormatError::BlankStateName { column: 2 }
        );
        assert_eq!(
            ";F\n;q0;q0".parse::<AutomatonTable>().unwrap_err(),
            FormatError::ColumnCount {
                line: 1,
                expected: 3,
                found: 2
            }
        );
        assert_eq!(
            ";;\n;q0;q0\n".parse::<AutomatonTable>().unwrap_err(),
            FormatError::DuplicateState("q0".to_string())
        );
        assert_eq!(
            ";\n;q0\na;q0;q0".parse::<AutomatonTable>().unwrap_err(),
            FormatError::ColumnCount {
                line: 3,
                expected: 2,
                found: 3
            }
        );
        assert_eq!(
            ";\n;q0\nab;q0".parse::<AutomatonTable>().unwrap_err(),
            FormatError::InvalidSymbol { line: 3 }
        );
        assert_eq!(
            ";\n;q0\na;q0\na;".parse::<AutomatonTable>().unwrap_err(),
            FormatError::DuplicateSymbol('a')
        );
        assert_eq!(
            ";\n;q0\na;q7".parse::<AutomatonTable>().unwrap_err(),
            FormatError::UnknownState {
                name: "q7".to_string(),
                line: 3
            }
        );
    }
}
