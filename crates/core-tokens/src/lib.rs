//! core-tokens: regex tokenizer.
//!
//! Converts a pattern string into a flat token stream with explicit
//! concatenation operators, ready for the shunting-yard translator. Parsing
//! is pure classification with no side effects; errors are typed and nothing
//! is emitted past the first one.
//!
//! Two sub-parsers validate their input by running tiny NFAs built with
//! `core-nfa` rather than by hand-rolled checks: `L-L`/`D-D` ranges inside a
//! character class, and the four `{..}` quantifier shapes. The engine is its
//! own first user.

use core_nfa::{INPUT_PORT, Nfa, OUTPUT_PORT, SetItem};
use thiserror::Error;
use tracing::{debug, trace};

/// Characters that stand for themselves when escaped.
pub const SPECIAL_CHARS: [char; 12] =
    ['\\', '*', '+', '.', '^', '$', '[', ']', '{', '}', '(', ')'];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("pattern ends with a bare backslash")]
    DanglingEscape,
    #[error("unknown escape `\\{0}`")]
    UnknownEscape(char),
    #[error("character class is never closed")]
    UnclosedSet,
    #[error("quantifier is never closed")]
    UnclosedQuantifier,
    #[error("malformed quantifier `{0}`")]
    MalformedQuantifier(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRole {
    Operator,
    Operand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// A literal character (operand) or a bare operator like `*` or `(`.
    Normal,
    /// Synthesized concatenation operator.
    Concat,
    /// The `.` wildcard.
    Dot,
    /// A `\w`/`\s`/`\d` class shorthand; the class letter is the token text.
    Trans,
    /// `{..}` quantifier bounds; `max == -1` means unbounded.
    Range { min: i32, max: i32 },
    /// `[...]` character class.
    Set(Vec<SetItem>),
    /// `[^...]` negated class. The parsed body starts at the caret, so the
    /// caret itself is one of the items.
    NegSet(Vec<SetItem>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Raw lexeme: the whole bracketed slice for `[..]`/`{..}`, the class
    /// letter for shorthands, `"concat"` for synthesized operators.
    pub text: String,
    pub role: TokenRole,
    pub kind: TokenKind,
}

impl Token {
    pub fn operand(text: impl Into<String>, kind: TokenKind) -> Self {
        Self {
            text: text.into(),
            role: TokenRole::Operand,
            kind,
        }
    }

    pub fn operator(text: impl Into<String>, kind: TokenKind) -> Self {
        Self {
            text: text.into(),
            role: TokenRole::Operator,
            kind,
        }
    }

    /// First character of the lexeme; what `Normal`/`Trans` operands match.
    pub fn value_char(&self) -> Option<char> {
        self.text.chars().next()
    }

    /// Postfix repetition: `*`, `+`, or a `{..}` range.
    pub fn is_repeat(&self) -> bool {
        match self.kind {
            TokenKind::Normal => self.text == "*" || self.text == "+",
            TokenKind::Range { .. } => true,
            _ => false,
        }
    }

    pub fn is_left_bracket(&self) -> bool {
        self.role == TokenRole::Operator && self.text == "("
    }

    pub fn is_right_bracket(&self) -> bool {
        self.role == TokenRole::Operator && self.text == ")"
    }

    pub fn is_concat(&self) -> bool {
        self.kind == TokenKind::Concat
    }

    /// The `^` anchor.
    pub fn is_prefix(&self) -> bool {
        self.role == TokenRole::Operator && self.text == "^"
    }

    /// The `$` anchor.
    pub fn is_postfix(&self) -> bool {
        self.role == TokenRole::Operator && self.text == "$"
    }
}

/// Tokenize a pattern and insert the implicit concatenation operators.
pub fn regex_to_tokens(regex: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = regex.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let token = match chars[i] {
            '\\' => {
                let next = *chars.get(i + 1).ok_or(ParseError::DanglingEscape)?;
                i += 1;
                process_trans(next)?
            }
            '.' => Token::operand(".", TokenKind::Dot),
            '[' => {
                let (inc, token) = process_set(&chars[i..])?;
                i += inc;
                token
            }
            c @ ('*' | '+' | '^' | '$' | '(' | ')') => {
                Token::operator(c.to_string(), TokenKind::Normal)
            }
            '{' => {
                let (inc, token) = process_range(&chars[i..])?;
                i += inc;
                token
            }
            c => Token::operand(c.to_string(), TokenKind::Normal),
        };
        trace!(target: "tokens", token = ?token.kind, text = %token.text, "scanned");
        tokens.push(token);
        i += 1;
    }
    add_concat(&mut tokens);
    debug!(target: "tokens", pattern = regex, count = tokens.len(), "tokenized");
    Ok(tokens)
}

/// Classify the character following a backslash.
pub fn process_trans(c: char) -> Result<Token, ParseError> {
    if SPECIAL_CHARS.contains(&c) {
        Ok(Token::operand(c.to_string(), TokenKind::Normal))
    } else if matches!(c, 'w' | 's' | 'd') {
        Ok(Token::operand(c.to_string(), TokenKind::Trans))
    } else {
        Err(ParseError::UnknownEscape(c))
    }
}

/// Parse a `[...]` class starting at `sub[0] == '['`. Returns the index of
/// the closing bracket (the scanner resumes after it) and the token.
pub fn process_set(sub: &[char]) -> Result<(usize, Token), ParseError> {
    let inc = sub
        .iter()
        .position(|&c| c == ']')
        .ok_or(ParseError::UnclosedSet)?;
    let text: String = sub[..=inc].iter().collect();
    // The negated body deliberately starts at the caret: it parses as a
    // literal item, so `[^..]` also rejects `^` itself.
    let items = charset_parser(&sub[1..inc])?;
    let kind = if sub.get(1) == Some(&'^') {
        TokenKind::NegSet(items)
    } else {
        TokenKind::Set(items)
    };
    Ok((inc, Token::operand(text, kind)))
}

/// Parse the body of a character class into items.
///
/// Range candidates are validated by executing a three-node NFA (`letter -
/// letter` or `digit - digit`) on the three-character slice; a candidate the
/// NFA rejects falls back to a literal reading of the current character.
pub fn charset_parser(body: &[char]) -> Result<Vec<SetItem>, ParseError> {
    let mut alpha = Nfa::new("alpha");
    alpha.add_alpha_node(INPUT_PORT, "n1", None);
    alpha.add_normal_node("n1", "n2", '-', None);
    alpha.add_alpha_node("n2", OUTPUT_PORT, None);

    let mut digit = Nfa::new("digit");
    digit.add_digit_node(INPUT_PORT, "n1", None);
    digit.add_normal_node("n1", "n2", '-', None);
    digit.add_digit_node("n2", OUTPUT_PORT, None);

    let mut items = Vec::new();
    let mut i = 0;
    while i < body.len() {
        let c = body[i];
        let item = if c == '\\' && i + 1 < body.len() {
            let next = body[i + 1];
            i += 1;
            if SPECIAL_CHARS.contains(&next) {
                SetItem::Literal(next)
            } else if matches!(next, 'w' | 's' | 'd') {
                SetItem::Class(next)
            } else {
                return Err(ParseError::UnknownEscape(next));
            }
        } else if c.is_ascii_alphabetic() && i + 2 < body.len() && body[i + 1] == '-' {
            let candidate: String = body[i..i + 3].iter().collect();
            alpha.execute(&candidate);
            if alpha.is_matched() {
                let item = SetItem::AlphaRange(c, body[i + 2]);
                i += 2;
                item
            } else {
                SetItem::Literal(c)
            }
        } else if c.is_ascii_digit() && i + 2 < body.len() && body[i + 1] == '-' {
            let candidate: String = body[i..i + 3].iter().collect();
            digit.execute(&candidate);
            if digit.is_matched() {
                let item = SetItem::DigitRange(
                    c.to_digit(10).expect("validated digit"),
                    body[i + 2].to_digit(10).expect("validated digit"),
                );
                i += 2;
                item
            } else {
                SetItem::Literal(c)
            }
        } else {
            SetItem::Literal(c)
        };
        items.push(item);
        i += 1;
    }
    Ok(items)
}

/// Parse a `{...}` quantifier starting at `sub[0] == '{'`. Returns the index
/// of the closing brace and the range token.
///
/// The four accepted shapes are each recognized by a bootstrap NFA; bounds
/// are single digits (a wider bound fails all four shapes and errors).
pub fn process_range(sub: &[char]) -> Result<(usize, Token), ParseError> {
    let inc = sub
        .iter()
        .position(|&c| c == '}')
        .ok_or(ParseError::UnclosedQuantifier)?;
    let text: String = sub[..=inc].iter().collect();

    let mut exact = Nfa::new("{n}");
    exact.add_normal_node(INPUT_PORT, "n1", '{', None);
    exact.add_digit_node("n1", "n2", None);
    exact.add_normal_node("n2", OUTPUT_PORT, '}', None);

    let mut at_least = Nfa::new("{min,}");
    at_least.add_normal_node(INPUT_PORT, "n1", '{', None);
    at_least.add_digit_node("n1", "n2", None);
    at_least.add_normal_node("n2", "n3", ',', None);
    at_least.add_normal_node("n3", OUTPUT_PORT, '}', None);

    let mut at_most = Nfa::new("{,max}");
    at_most.add_normal_node(INPUT_PORT, "n1", '{', None);
    at_most.add_normal_node("n1", "n2", ',', None);
    at_most.add_digit_node("n2", "n3", None);
    at_most.add_normal_node("n3", OUTPUT_PORT, '}', None);

    let mut between = Nfa::new("{min,max}");
    between.add_normal_node(INPUT_PORT, "n1", '{', None);
    between.add_digit_node("n1", "n2", None);
    between.add_normal_node("n2", "n3", ',', None);
    between.add_digit_node("n3", "n4", None);
    between.add_normal_node("n4", OUTPUT_PORT, '}', None);

    let digit_at = |idx: usize| -> i32 {
        sub[idx].to_digit(10).expect("shape validated by bootstrap nfa") as i32
    };

    exact.execute(&text);
    at_least.execute(&text);
    at_most.execute(&text);
    between.execute(&text);

    let (min, max) = if exact.is_matched() {
        (digit_at(1), digit_at(1))
    } else if at_least.is_matched() {
        (digit_at(1), -1)
    } else if at_most.is_matched() {
        (0, digit_at(2))
    } else if between.is_matched() {
        (digit_at(1), digit_at(3))
    } else {
        return Err(ParseError::MalformedQuantifier(text));
    };
    Ok((inc, Token::operator(text, TokenKind::Range { min, max })))
}

/// Insert explicit concat operators wherever juxtaposition implies one:
/// after a postfix repeat, a `)`, or an operand, whenever an operand or `(`
/// follows. Never before `)`, a repeat, or an anchor.
pub fn add_concat(tokens: &mut Vec<Token>) {
    let concat = Token::operator("concat", TokenKind::Concat);
    let mut indices = Vec::new();
    for i in 0..tokens.len().saturating_sub(1) {
        let cur = &tokens[i];
        let next = &tokens[i + 1];
        let joins = next.is_left_bracket() || next.role == TokenRole::Operand;
        if joins && (cur.is_repeat() || cur.is_right_bracket() || cur.role == TokenRole::Operand)
        {
            indices.push(i + 1);
        }
    }
    for &i in indices.iter().rev() {
        tokens.insert(i, concat.clone());
    }
}
