//! core-compile: token stream to NFA.
//!
//! A shunting-yard variant over two stacks: partial NFAs and pending
//! operator tokens. Operands push a one-node NFA; postfix repetitions pop
//! and wrap; anchors and `)` drain. All composition happens by renaming the
//! well-known boundary wires and splicing node lists, never by touching node
//! internals.
//!
//! Fresh wire names come from one monotone counter: `con<k>` for
//! concatenation junctions, bare digits for lattice wires, `_<i>` suffixes
//! and `c_<i>` junctions inside a deep-copied repetition. The counter and
//! the order in which lattice nodes are added are both load-bearing: node
//! order is the event queue's tie-breaker.

use core_nfa::{INPUT_PORT, Nfa, OUTPUT_PORT, PORT_LATENCY};
use core_sim::Node;
use core_tokens::{ParseError, Token, TokenKind, TokenRole, regex_to_tokens};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("repetition applied to an empty pattern")]
    EmptyBody,
    #[error("operator is missing an operand")]
    MissingOperand,
    #[error("`)` without a matching `(`")]
    UnbalancedParen,
}

/// Compile a pattern into an executable NFA.
pub fn regex_to_nfa(regex: &str) -> Result<Nfa, CompileError> {
    let tokens = regex_to_tokens(regex)?;
    let mut nfa_stack: Vec<Nfa> = Vec::new();
    let mut op_stack: Vec<Token> = Vec::new();
    let mut node_index: usize = 0;

    for token in &tokens {
        if token.role == TokenRole::Operand {
            nfa_stack.push(operand_nfa(token));
            node_index += 1;
        } else if token.is_left_bracket() {
            op_stack.push(token.clone());
        } else if token.is_repeat() {
            let f = nfa_stack.pop().ok_or(CompileError::MissingOperand)?;
            match &token.kind {
                TokenKind::Normal if token.text == "*" => {
                    let (f, inc) = repeat_zero_or_more(f, node_index)?;
                    node_index += inc;
                    nfa_stack.push(f);
                }
                TokenKind::Normal => {
                    let (f, inc) = repeat_one_or_more(f, node_index)?;
                    node_index += inc;
                    nfa_stack.push(f);
                }
                TokenKind::Range { min, max } => {
                    if min == max {
                        nfa_stack.push(repeat_exact(f, *min)?);
                    } else {
                        // The counter stays put here; ranged repetition names
                        // its wires inside the copies.
                        let (f, _inc) = repeat_range(f, node_index, *min, *max)?;
                        nfa_stack.push(f);
                    }
                }
                _ => unreachable!("repeat tokens are `*`, `+`, or a range"),
            }
        } else if token.is_prefix() || token.is_postfix() {
            while op_stack.last().is_some_and(|t| !t.is_left_bracket()) {
                let op = op_stack.pop().expect("just checked non-empty");
                apply_operator(&op, &mut nfa_stack, &mut node_index)?;
            }
            op_stack.push(token.clone());
        } else if token.is_concat() {
            while op_stack.last().is_some_and(|t| t.is_concat()) {
                let op = op_stack.pop().expect("just checked non-empty");
                apply_operator(&op, &mut nfa_stack, &mut node_index)?;
            }
            op_stack.push(token.clone());
        } else if token.is_right_bracket() {
            loop {
                match op_stack.pop() {
                    None => return Err(CompileError::UnbalancedParen),
                    Some(op) if op.is_left_bracket() => break,
                    Some(op) => apply_operator(&op, &mut nfa_stack, &mut node_index)?,
                }
            }
        }
    }
    while let Some(op) = op_stack.pop() {
        apply_operator(&op, &mut nfa_stack, &mut node_index)?;
    }
    let nfa = nfa_stack.pop().ok_or(CompileError::MissingOperand)?;
    debug!(target: "compile", pattern = regex, nodes = nfa.nodes().len(), "compiled");
    Ok(nfa)
}

/// Build the single-edge NFA for an operand token.
fn operand_nfa(token: &Token) -> Nfa {
    let mut f = Nfa::default();
    match &token.kind {
        TokenKind::Normal => {
            let ch = token.value_char().expect("literal operand has a lexeme");
            f.add_normal_node(INPUT_PORT, OUTPUT_PORT, ch, None);
        }
        TokenKind::Set(items) => {
            f.add_charset_node(INPUT_PORT, OUTPUT_PORT, items.clone(), false, None);
        }
        TokenKind::NegSet(items) => {
            f.add_charset_node(INPUT_PORT, OUTPUT_PORT, items.clone(), true, None);
        }
        TokenKind::Trans => match token.value_char() {
            Some('w') => f.add_digit_alpha_node(INPUT_PORT, OUTPUT_PORT, None),
            Some('s') => f.add_empty_char_node(INPUT_PORT, OUTPUT_PORT, None),
            _ => f.add_digit_node(INPUT_PORT, OUTPUT_PORT, None),
        },
        TokenKind::Dot => f.add_any_node(INPUT_PORT, OUTPUT_PORT, None),
        TokenKind::Concat | TokenKind::Range { .. } => {
            unreachable!("operator kinds never reach the operand branch")
        }
    }
    f
}

/// Pop-and-apply for the drain loops: concat fuses the two top NFAs, an
/// anchor wraps the top one. A stray `(` falls through untouched.
fn apply_operator(
    op: &Token,
    nfa_stack: &mut Vec<Nfa>,
    node_index: &mut usize,
) -> Result<(), CompileError> {
    if op.is_concat() {
        let second = nfa_stack.pop().ok_or(CompileError::MissingOperand)?;
        let first = nfa_stack.pop().ok_or(CompileError::MissingOperand)?;
        let junction = format!("con{node_index}");
        nfa_stack.push(concat(first, second, &junction));
        *node_index += 1;
    } else if op.is_postfix() {
        let f = nfa_stack.pop().ok_or(CompileError::MissingOperand)?;
        let (f, inc) = anchor_end(f, *node_index)?;
        *node_index += inc;
        nfa_stack.push(f);
    } else if op.is_prefix() {
        let f = nfa_stack.pop().ok_or(CompileError::MissingOperand)?;
        let (f, inc) = anchor_start(f, *node_index)?;
        *node_index += inc;
        nfa_stack.push(f);
    }
    Ok(())
}

/// Concatenate: `first`'s exit and `second`'s entry become one internal
/// junction wire, then the node lists merge into `first`.
pub fn concat(mut first: Nfa, mut second: Nfa, junction: &str) -> Nfa {
    first.set_output_node(junction);
    second.set_input_node(junction);
    first.extend_nodes(second.into_nodes());
    first
}

/// `*`: wrap the body so it can be skipped, entered, or looped.
///
/// With the body rewired to enter on `p2` and exit on `p3`:
/// skip is `Input -> p1 -> Output`, entry is `Input -> p0 -> p2`, and the
/// loop runs `p3 -> p4 -> p0` again. Consumes five wire names.
pub fn repeat_zero_or_more(
    mut nfa: Nfa,
    node_index: usize,
) -> Result<(Nfa, usize), CompileError> {
    if nfa.nodes().is_empty() {
        return Err(CompileError::EmptyBody);
    }
    let wire = |k: usize| (node_index + k).to_string();
    nfa.set_input_node(&wire(2));
    nfa.set_output_node(&wire(3));
    nfa.add_null_12_node(INPUT_PORT, &wire(0), &wire(1));
    nfa.add_null_11_node(&wire(1), OUTPUT_PORT);
    nfa.add_null_21_node(&wire(0), &wire(4), &wire(2));
    nfa.add_null_12_node(&wire(3), &wire(4), OUTPUT_PORT);
    Ok((nfa, 5))
}

/// `+`: like `*` without the skip branch; the body runs at least once.
/// Consumes four wire names.
pub fn repeat_one_or_more(
    mut nfa: Nfa,
    node_index: usize,
) -> Result<(Nfa, usize), CompileError> {
    if nfa.nodes().is_empty() {
        return Err(CompileError::EmptyBody);
    }
    let wire = |k: usize| (node_index + k).to_string();
    nfa.set_input_node(&wire(1));
    nfa.set_output_node(&wire(2));
    nfa.add_null_11_node(INPUT_PORT, &wire(0));
    nfa.add_null_21_node(&wire(0), &wire(3), &wire(1));
    nfa.add_null_12_node(&wire(2), &wire(3), OUTPUT_PORT);
    Ok((nfa, 4))
}

/// `{n}`: exactly `n` copies in series; `n == 0` collapses to one epsilon.
pub fn repeat_exact(nfa: Nfa, times: i32) -> Result<Nfa, CompileError> {
    repeat_series(&nfa, times)
}

/// `{min,}` / `{min,max}`.
///
/// `min` copies in series, then for an unbounded tail the body is spliced
/// into a loop-or-exit lattice (six wire names); for a bounded one,
/// `max - min` optional copies with per-junction exits are concatenated on.
pub fn repeat_range(
    mut nfa: Nfa,
    node_index: usize,
    min: i32,
    max: i32,
) -> Result<(Nfa, usize), CompileError> {
    if nfa.nodes().is_empty() {
        return Err(CompileError::EmptyBody);
    }
    let mut f1 = repeat_series(&nfa, min)?;
    if max == -1 {
        let wire = |k: usize| (node_index + k).to_string();
        f1.set_output_node(&wire(0));
        f1.add_null_12_node(&wire(0), &wire(1), &wire(2));
        f1.add_null_21_node(&wire(1), &wire(5), &wire(3));
        f1.add_null_12_node(&wire(4), &wire(5), OUTPUT_PORT);
        f1.add_null_11_node(&wire(2), OUTPUT_PORT);
        nfa.set_input_node(&wire(3));
        nfa.set_output_node(&wire(4));
        f1.extend_nodes(nfa.into_nodes());
        Ok((f1, 6))
    } else {
        let f2 = repeat_with_exits(&nfa, max - min)?;
        let junction = format!("con{node_index}");
        Ok((concat(f1, f2, &junction), 1))
    }
}

/// `^`: structurally a no-op epsilon on the exit; start anchoring proper
/// lives in the matcher API, which refuses to slide anchored patterns.
pub fn anchor_start(mut nfa: Nfa, node_index: usize) -> Result<(Nfa, usize), CompileError> {
    if nfa.nodes().is_empty() {
        return Err(CompileError::EmptyBody);
    }
    let wire = node_index.to_string();
    nfa.set_output_node(&wire);
    nfa.add_null_11_node(&wire, OUTPUT_PORT);
    Ok((nfa, 1))
}

/// `$`: the body's exit feeds an end node, so only an exhausted input
/// reaches `Output`.
pub fn anchor_end(mut nfa: Nfa, node_index: usize) -> Result<(Nfa, usize), CompileError> {
    if nfa.nodes().is_empty() {
        return Err(CompileError::EmptyBody);
    }
    let wire = node_index.to_string();
    nfa.set_output_node(&wire);
    nfa.add_end_node(&wire, OUTPUT_PORT);
    Ok((nfa, 1))
}

/// Deep-copy the body `times` times in series.
///
/// Copy `i` gets every non-boundary wire suffixed with `_i` and enters
/// through a fresh `c_i` junction; the previous copy's `Output` is renamed
/// onto that junction, so only the last copy still exits the graph.
pub fn repeat_series(nfa: &Nfa, times: i32) -> Result<Nfa, CompileError> {
    if nfa.nodes().is_empty() {
        return Err(CompileError::EmptyBody);
    }
    let mut out = Nfa::default();
    if times <= 0 {
        out.add_null_11_node(INPUT_PORT, OUTPUT_PORT);
        return Ok(out);
    }
    let nodes = nfa.nodes();
    let mut new_nodes: Vec<Node> = nodes.to_vec();
    for i in 0..(times - 1) {
        let postfix = format!("_{}", i + 1);
        let con = format!("c{postfix}");
        let copy = suffixed_copy(nodes, &postfix, &con);
        for node in &mut new_nodes {
            if node.remove_output(OUTPUT_PORT).is_some() {
                node.output(con.clone(), PORT_LATENCY);
            }
        }
        new_nodes.extend(copy);
    }
    out.extend_nodes(new_nodes);
    Ok(out)
}

/// Deep-copy the body `times` times, but let every junction node keep its
/// `Output` exit besides feeding the next copy, and add a skip epsilon, so
/// anywhere between zero and `times` repetitions reaches the exit.
pub fn repeat_with_exits(nfa: &Nfa, times: i32) -> Result<Nfa, CompileError> {
    if nfa.nodes().is_empty() {
        return Err(CompileError::EmptyBody);
    }
    let mut out = Nfa::default();
    if times <= 0 {
        out.add_null_11_node(INPUT_PORT, OUTPUT_PORT);
        return Ok(out);
    }
    let nodes = nfa.nodes();
    let mut new_nodes: Vec<Node> = nodes.to_vec();
    for i in 0..(times - 1) {
        let postfix = format!("_{}", i + 1);
        let con = format!("c{postfix}");
        let copy = suffixed_copy(nodes, &postfix, &con);
        for node in &mut new_nodes {
            if node.has_output(OUTPUT_PORT) {
                node.output(con.clone(), PORT_LATENCY);
            }
        }
        new_nodes.extend(copy);
    }
    out.extend_nodes(new_nodes);
    out.add_null_11_node(INPUT_PORT, OUTPUT_PORT);
    Ok(out)
}

/// Clone `nodes` with every non-boundary wire suffixed and the graph entry
/// replaced by `con`. Boundary names stay as-is so the caller decides how
/// the copy joins the chain.
fn suffixed_copy(nodes: &[Node], postfix: &str, con: &str) -> Vec<Node> {
    let mut copy: Vec<Node> = nodes.to_vec();
    for node in &mut copy {
        for name in node.input_names() {
            if name != INPUT_PORT {
                let latency = node.remove_input(&name).expect("listed port");
                node.input(format!("{name}{postfix}"), latency);
            }
        }
        for name in node.output_names() {
            if name != OUTPUT_PORT {
                let latency = node.remove_output(&name).expect("listed port");
                node.output(format!("{name}{postfix}"), latency);
            }
        }
        if node.remove_input(INPUT_PORT).is_some() {
            node.input(con.to_string(), PORT_LATENCY);
        }
    }
    copy
}
