use tracing::{debug, trace};

use crate::nfa::{Fragment, Nfa, NfaBuilder};

/// The explicit concatenation marker inserted between adjacent tokens. Input symbols
/// are alphanumeric, so the marker cannot collide with one.
const CONCAT: char = '.';

/// Represents the ways in which compiling a regular expression can fail. Positions
/// index characters of the original pattern.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The pattern contains no tokens at all.
    #[error("empty pattern")]
    EmptyPattern,
    /// A parenthesis without a matching counterpart.
    #[error("unbalanced parenthesis at position {0}")]
    UnbalancedParenthesis(usize),
    /// An operator was applied with too few operands on the stack.
    #[error("operator `{operator}` at position {position} is missing an operand")]
    MissingOperand {
        /// The operator that could not be applied.
        operator: char,
        /// Where the operator occurs in the pattern.
        position: usize,
    },
    /// A character that is neither an input symbol nor a supported operator.
    #[error("unexpected character `{character}` at position {position}")]
    UnexpectedCharacter {
        /// The offending character.
        character: char,
        /// Where it occurs in the pattern.
        position: usize,
    },
}

fn precedence(operator: char) -> u8 {
    match operator {
        '*' | '+' => 3,
        CONCAT => 2,
        '|' => 1,
        _ => 0,
    }
}

/// Single scan inserting an explicit [`CONCAT`] marker between two adjacent tokens
/// wherever the grammar implies concatenation: after an alphanumeric or `)` and after
/// a postfix operator, whenever an alphanumeric or `(` follows. Markers carry the
/// position of the token to their right.
fn with_explicit_concat(pattern: &str) -> Vec<(usize, char)> {
    let chars: Vec<(usize, char)> = pattern.chars().enumerate().collect();
    let mut tokens = Vec::with_capacity(chars.len() * 2);
    for (index, &(position, current)) in chars.iter().enumerate() {
        tokens.push((position, current));
        if let Some(&(next_position, next)) = chars.get(index + 1) {
            let joins_left = current.is_alphanumeric() || current == ')';
            let joins_right = next.is_alphanumeric() || next == '(';
            if (joins_left && joins_right) || (matches!(current, '*' | '+') && joins_right) {
                tokens.push((next_position, CONCAT));
            }
        }
    }
    tokens
}

fn apply(
    builder: &mut NfaBuilder,
    operands: &mut Vec<Fragment>,
    (position, operator): (usize, char),
) -> Result<(), ParseError> {
    let missing = || ParseError::MissingOperand { operator, position };
    match operator {
        '*' => {
            let inner = operands.pop().ok_or_else(missing)?;
            operands.push(builder.kleene_star(inner));
        }
        '+' => {
            let inner = operands.pop().ok_or_else(missing)?;
            operands.push(builder.plus(inner));
        }
        '|' => {
            let right = operands.pop().ok_or_else(missing)?;
            let left = operands.pop().ok_or_else(missing)?;
            operands.push(builder.union(left, right));
        }
        CONCAT => {
            let right = operands.pop().ok_or_else(missing)?;
            let left = operands.pop().ok_or_else(missing)?;
            operands.push(builder.concatenate(left, right));
        }
        _ => unreachable!("only operators end up on the operator stack"),
    }
    Ok(())
}

/// Parses `pattern` into an [`Nfa`] via Thompson's construction, driven by a
/// shunting-yard evaluation over an operand stack of fragments and an operator stack.
///
/// Supported syntax: alphanumeric symbols, `|`, `*`, `+`, grouping parentheses and
/// implicit concatenation. On failure no partially built automaton escapes.
pub fn compile(pattern: &str) -> Result<Nfa, ParseError> {
    let tokens = with_explicit_concat(pattern);
    if tokens.is_empty() {
        return Err(ParseError::EmptyPattern);
    }
    debug!(
        "compiling pattern of {} chars into {} tokens",
        pattern.chars().count(),
        tokens.len()
    );

    let mut builder = NfaBuilder::new();
    let mut operands: Vec<Fragment> = Vec::new();
    let mut operators: Vec<(usize, char)> = Vec::new();

    for (position, token) in tokens {
        trace!("token `{token}` at position {position}");
        match token {
            symbol if symbol.is_alphanumeric() => operands.push(builder.from_symbol(symbol)),
            '(' => operators.push((position, token)),
            ')' => loop {
                match operators.pop() {
                    Some((_, '(')) => break,
                    Some(operator) => apply(&mut builder, &mut operands, operator)?,
                    None => return Err(ParseError::UnbalancedParenthesis(position)),
                }
            },
            '*' | '+' | '|' | CONCAT => {
                while operators
                    .last()
                    .is_some_and(|&(_, top)| top != '(' && precedence(top) >= precedence(token))
                {
                    let operator = operators.pop().expect("peeked just above");
                    apply(&mut builder, &mut operands, operator)?;
                }
                operators.push((position, token));
            }
            other => {
                return Err(ParseError::UnexpectedCharacter {
                    character: other,
                    position,
                })
            }
        }
    }
    while let Some((position, operator)) = operators.pop() {
        if operator == '(' {
            return Err(ParseError::UnbalancedParenthesis(position));
        }
        apply(&mut builder, &mut operands, (position, operator))?;
    }

    let fragment = operands.pop().ok_or(ParseError::EmptyPattern)?;
    debug_assert!(
        operands.is_empty(),
        "marker insertion leaves exactly one operand"
    );
    Ok(builder.finish(fragment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_concatenation() {
        let nfa = compile("ab").unwrap();
        assert!(nfa.accepts("ab"));
        for rejected in ["", "a", "b", "abc"] {
            assert!(!nfa.accepts(rejected), "{rejected:?} must be rejected");
        }
    }

    #[test]
    fn scenario_union() {
        let nfa = compile("a|b").unwrap();
        assert!(nfa.accepts("a"));
        assert!(nfa.accepts("b"));
        for rejected in ["", "ab", "c"] {
            assert!(!nfa.accepts(rejected), "{rejected:?} must be rejected");
        }
    }

    #[test]
    fn scenario_star() {
        let nfa = compile("a*").unwrap();
        for accepted in ["", "a", "aa", "aaa"] {
            assert!(nfa.accepts(accepted), "{accepted:?} must be accepted");
        }
        assert!(!nfa.accepts("b"));
        assert!(!nfa.accepts("ab"));
    }

    #[test]
    fn scenario_plus() {
        let nfa = compile("a+").unwrap();
        assert!(nfa.accepts("a"));
        assert!(nfa.accepts("aa"));
        assert!(!nfa.accepts(""));
    }

    #[test]
    fn union_binds_weaker_than_concatenation() {
        let nfa = compile("a|bc").unwrap();
        assert!(nfa.accepts("a"));
        assert!(nfa.accepts("bc"));
        for rejected in ["b", "c", "abc", "ac"] {
            assert!(!nfa.accepts(rejected), "{rejected:?} must be rejected");
        }
    }

    #[test]
    fn star_binds_tighter_than_concatenation() {
        let nfa = compile("ab*").unwrap();
        for accepted in ["a", "ab", "abb"] {
            assert!(nfa.accepts(accepted), "{accepted:?} must be accepted");
        }
        for rejected in ["", "b", "aab"] {
            assert!(!nfa.accepts(rejected), "{rejected:?} must be rejected");
        }
    }

    #[test]
    fn grouping_with_repetition() {
        let nfa = compile("(a|b)*abb").unwrap();
        for accepted in ["abb", "aabb", "babb", "abbabb"] {
            assert!(nfa.accepts(accepted), "{accepted:?} must be accepted");
        }
        for rejected in ["", "ab", "abba", "bba"] {
            assert!(!nfa.accepts(rejected), "{rejected:?} must be rejected");
        }
    }

    #[test]
    fn starred_union_operand_stays_contained() {
        let nfa = compile("a*|b").unwrap();
        assert!(nfa.accepts(""));
        assert!(nfa.accepts("aa"));
        assert!(nfa.accepts("b"));
        assert!(!nfa.accepts("ba"));
        assert!(!nfa.accepts("ab"));
    }

    #[test]
    fn empty_pattern_is_rejected() {
        assert_eq!(compile("").unwrap_err(), ParseError::EmptyPattern);
        assert_eq!(compile("()").unwrap_err(), ParseError::EmptyPattern);
    }

    #[test]
    fn unbalanced_parentheses_are_reported_with_position() {
        assert_eq!(compile("a)").unwrap_err(), ParseError::UnbalancedParenthesis(1));
        assert_eq!(compile("(a").unwrap_err(), ParseError::UnbalancedParenthesis(0));
    }

    #[test]
    fn dangling_operators_are_reported() {
        assert_eq!(
            compile("a|").unwrap_err(),
            ParseError::MissingOperand {
                operator: '|',
                position: 1
            }
        );
        assert_eq!(
            compile("*a").unwrap_err(),
            ParseError::MissingOperand {
                operator: '*',
                position: 0
            }
        );
    }

    #[test]
    fn stray_characters_are_reported() {
        assert_eq!(
            compile("a b").unwrap_err(),
            ParseError::UnexpectedCharacter {
                character: ' ',
                position: 1
            }
        );
    }
}
