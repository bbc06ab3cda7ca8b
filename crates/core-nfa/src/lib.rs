//! core-nfa: NFA construction over a discrete-event machine.
//!
//! An [`Nfa`] is one `core_sim::Machine` with two well-known boundary ports,
//! `Input` and `Output`, plus a vocabulary of node constructors. Each
//! constructor adds a node whose transition consumes at most one leading
//! character of the text value it receives and forwards the remainder, or
//! kills the branch. Composition (concatenation, repetition lattices) is
//! done by the compiler purely through port renames and node-list splices;
//! this crate provides those primitives but attaches no meaning to them.
//!
//! Execution seeds the machine with the full input text on `Input` and reads
//! success off `Output`: the output value is the unconsumed remainder, empty
//! meaning the whole input matched.

mod matcher;

pub use matcher::{EMPTY_CHARS, SetItem};

use core_sim::{Machine, Node, SourceEvent, StateMap, Value};
use matcher::Matcher;
use tracing::debug;

/// Well-known boundary port names. Every NFA enters and exits through these.
pub const INPUT_PORT: &str = "Input";
pub const OUTPUT_PORT: &str = "Output";

/// All NFA ports share one latency; ordering comes from path length.
pub const PORT_LATENCY: core_sim::Clock = 1;

/// A regex fragment realized as an event graph.
pub struct Nfa {
    name: String,
    machine: Machine,
    state: StateMap,
    matched_str: Option<String>,
    matched_index: usize,
}

impl Default for Nfa {
    fn default() -> Self {
        Self::new("nfa")
    }
}

impl Nfa {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut machine = Machine::new(name.clone());
        machine.input_port(INPUT_PORT, PORT_LATENCY);
        machine.output_port(OUTPUT_PORT, PORT_LATENCY);
        debug!(target: "nfa", nfa = %name, "new");
        Self {
            name,
            machine,
            state: StateMap::new(),
            matched_str: None,
            matched_index: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn add(&mut self, m: Matcher, a: &str, b: &str, c: Option<&str>) {
        self.add_labeled(m.label(), m, a, b, c);
    }

    fn add_labeled(&mut self, label: &str, m: Matcher, a: &str, b: &str, c: Option<&str>) {
        debug!(
            target: "nfa",
            nfa = %self.name,
            node = label,
            input = a,
            output = b,
            extra = c.unwrap_or(""),
            "add node"
        );
        let node = self
            .machine
            .add_node(label, move |args: &[Value]| {
                let text = args.first()?.as_text()?;
                m.step(text).map(|rest| core_sim::Emit::Broadcast(Value::Text(rest)))
            });
        node.input(a, PORT_LATENCY);
        node.output(b, PORT_LATENCY);
        if let Some(c) = c {
            node.output(c, PORT_LATENCY);
        }
    }

    /// `\w`: ASCII letter, digit, or underscore.
    pub fn add_digit_alpha_node(&mut self, a: &str, b: &str, c: Option<&str>) {
        self.add(Matcher::DigitAlpha, a, b, c);
    }

    /// `\s`: one of `\n`, `\t`, `\r`, `\f`.
    pub fn add_empty_char_node(&mut self, a: &str, b: &str, c: Option<&str>) {
        self.add(Matcher::EmptyChar, a, b, c);
    }

    /// `\d`: ASCII digit.
    pub fn add_digit_node(&mut self, a: &str, b: &str, c: Option<&str>) {
        self.add(Matcher::Digit, a, b, c);
    }

    /// ASCII letter.
    pub fn add_alpha_node(&mut self, a: &str, b: &str, c: Option<&str>) {
        self.add(Matcher::Alpha, a, b, c);
    }

    /// `.`: anything except `\n`.
    pub fn add_any_node(&mut self, a: &str, b: &str, c: Option<&str>) {
        self.add(Matcher::Any, a, b, c);
    }

    /// One specific character.
    pub fn add_normal_node(&mut self, a: &str, b: &str, ch: char, c: Option<&str>) {
        self.add(Matcher::Normal(ch), a, b, c);
    }

    /// `[...]` / `[^...]`: first matching item decides, see [`SetItem`].
    pub fn add_charset_node(
        &mut self,
        a: &str,
        b: &str,
        items: Vec<SetItem>,
        negative: bool,
        c: Option<&str>,
    ) {
        self.add(Matcher::Charset { items, negative }, a, b, c);
    }

    /// Accepts only the exhausted input; anchors `$`.
    pub fn add_end_node(&mut self, a: &str, b: &str) {
        self.add(Matcher::End, a, b, None);
    }

    /// Any character whatsoever, newline included.
    pub fn add_all_node(&mut self, a: &str, b: &str, c: Option<&str>) {
        self.add(Matcher::All, a, b, c);
    }

    /// Epsilon, one input to one output.
    pub fn add_null_11_node(&mut self, a: &str, b: &str) {
        self.add_labeled("null_11", Matcher::Null, a, b, None);
    }

    /// Epsilon fan-out, one input broadcast to two outputs.
    pub fn add_null_12_node(&mut self, a: &str, b: &str, c: &str) {
        self.add_labeled("null_12", Matcher::Null, a, b, Some(c));
    }

    /// Epsilon join, two inputs into one output. A single activation sees
    /// whichever input currently holds a value.
    pub fn add_null_21_node(&mut self, a: &str, b: &str, c: &str) {
        debug!(
            target: "nfa",
            nfa = %self.name,
            node = "null_21",
            inputs = format_args!("{a}, {b}"),
            output = c,
            "add node"
        );
        let node = self.machine.add_node("null_21", |args: &[Value]| {
            let text = args.first()?.as_text()?;
            Some(core_sim::Emit::Broadcast(Value::text(text)))
        });
        node.input(a, PORT_LATENCY);
        node.input(b, PORT_LATENCY);
        node.output(c, PORT_LATENCY);
    }

    // --- splicing primitives --------------------------------------------------

    pub fn nodes(&self) -> &[Node] {
        self.machine.nodes()
    }

    /// Append foreign nodes to this graph. No connectivity validation: wires
    /// bind by name alone, and cycles are legal.
    pub fn extend_nodes(&mut self, nodes: Vec<Node>) {
        debug!(target: "nfa", nfa = %self.name, count = nodes.len(), "extend nodes");
        self.machine.extend_nodes(nodes);
    }

    /// Surrender the node list for splicing into another NFA.
    pub fn into_nodes(mut self) -> Vec<Node> {
        self.machine.take_nodes()
    }

    /// The node currently wired to the `Input` boundary, if any.
    pub fn input_node(&self) -> Option<&Node> {
        self.machine.nodes().iter().find(|n| n.has_input(INPUT_PORT))
    }

    /// The node currently wired to the `Output` boundary, if any.
    pub fn output_node(&self) -> Option<&Node> {
        self.machine.nodes().iter().find(|n| n.has_output(OUTPUT_PORT))
    }

    /// Rewire every node listening on `Input` to listen on `new_name`
    /// instead. The entry of the graph becomes an internal wire.
    pub fn set_input_node(&mut self, new_name: &str) {
        debug!(target: "nfa", nfa = %self.name, port = new_name, "rename input wire");
        for node in self.machine.nodes_mut() {
            if node.remove_input(INPUT_PORT).is_some() {
                node.input(new_name, PORT_LATENCY);
            }
        }
    }

    /// Rewire every node feeding `Output` to feed `new_name` instead.
    pub fn set_output_node(&mut self, new_name: &str) {
        debug!(target: "nfa", nfa = %self.name, port = new_name, "rename output wire");
        for node in self.machine.nodes_mut() {
            if node.remove_output(OUTPUT_PORT).is_some() {
                node.output(new_name, PORT_LATENCY);
            }
        }
    }

    // --- execution ------------------------------------------------------------

    /// Run the machine on `text` and record what matched.
    ///
    /// On success `matched_index` is the number of characters consumed and
    /// `matched_str` the consumed prefix. Indices are char positions, not
    /// bytes; the input is not required to be ASCII.
    pub fn execute(&mut self, text: &str) {
        self.matched_str = None;
        self.matched_index = 0;
        self.state = self
            .machine
            .execute([SourceEvent::new(INPUT_PORT, Value::text(text), 0)]);
        if !self.is_matched() {
            return;
        }
        let output = match self.state.get(OUTPUT_PORT) {
            Some(Some(Value::Text(t))) => t.clone(),
            _ => return,
        };
        if output.is_empty() {
            self.matched_index = text.chars().count();
            self.matched_str = Some(text.to_string());
        } else {
            let mut index = 0;
            let mut boundary = 0;
            for (i, (b, _)) in text.char_indices().enumerate() {
                if text[b..] == output {
                    index = i;
                    boundary = b;
                    break;
                }
            }
            self.matched_index = index;
            self.matched_str = Some(text[..boundary].to_string());
        }
    }

    /// Whether the last `execute` delivered anything to `Output`.
    pub fn is_matched(&self) -> bool {
        matches!(self.state.get(OUTPUT_PORT), Some(Some(_)))
    }

    pub fn matched_str(&self) -> Option<&str> {
        self.matched_str.as_deref()
    }

    pub fn matched_index(&self) -> usize {
        self.matched_index
    }

    /// Whether the last run stopped on the event budget.
    pub fn limit_reached(&self) -> bool {
        self.machine.limit_reached()
    }

    pub fn visualize(&self) -> String {
        self.machine.visualize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn accepts(nfa: &mut Nfa, text: &str) -> bool {
        nfa.execute(text);
        nfa.is_matched()
    }

    #[test]
    fn digit_alpha_accepts_word_chars() {
        let mut nfa = Nfa::default();
        nfa.add_digit_alpha_node(INPUT_PORT, OUTPUT_PORT, None);
        assert!(accepts(&mut nfa, "a"));
        assert!(accepts(&mut nfa, "1"));
        assert!(accepts(&mut nfa, "_"));
        assert!(!accepts(&mut nfa, "%"));
    }

    #[test]
    fn empty_char_accepts_whitespace_controls() {
        let mut nfa = Nfa::default();
        nfa.add_empty_char_node(INPUT_PORT, OUTPUT_PORT, None);
        for ws in ["\n", "\t", "\r", "\u{c}"] {
            assert!(accepts(&mut nfa, ws), "expected {ws:?} to match");
        }
        assert!(!accepts(&mut nfa, "a"));
    }

    #[test]
    fn digit_rejects_letters() {
        let mut nfa = Nfa::default();
        nfa.add_digit_node(INPUT_PORT, OUTPUT_PORT, None);
        assert!(accepts(&mut nfa, "1"));
        assert!(accepts(&mut nfa, "9"));
        assert!(!accepts(&mut nfa, "a"));
    }

    #[test]
    fn alpha_rejects_digits_and_underscore() {
        let mut nfa = Nfa::default();
        nfa.add_alpha_node(INPUT_PORT, OUTPUT_PORT, None);
        assert!(accepts(&mut nfa, "a"));
        assert!(!accepts(&mut nfa, "2"));
        assert!(!accepts(&mut nfa, "_"));
    }

    #[test]
    fn any_rejects_newline_only() {
        let mut nfa = Nfa::default();
        nfa.add_any_node(INPUT_PORT, OUTPUT_PORT, None);
        for ok in ["a", "#", "\\", "1"] {
            assert!(accepts(&mut nfa, ok), "expected {ok:?} to match");
        }
        assert!(!accepts(&mut nfa, "\n"));
    }

    #[test]
    fn normal_matches_one_specific_char() {
        let mut nfa = Nfa::default();
        nfa.add_normal_node(INPUT_PORT, OUTPUT_PORT, 'a', None);
        assert!(accepts(&mut nfa, "a"));
        assert!(!accepts(&mut nfa, "b"));
        assert!(!accepts(&mut nfa, "\n"));
    }

    #[test]
    fn charset_matches_any_item() {
        // [\sa-zA-Z5-9]
        let items = vec![
            SetItem::Class('s'),
            SetItem::AlphaRange('a', 'z'),
            SetItem::AlphaRange('A', 'Z'),
            SetItem::DigitRange(5, 9),
        ];
        let mut nfa = Nfa::default();
        nfa.add_charset_node(INPUT_PORT, OUTPUT_PORT, items, false, None);
        assert!(accepts(&mut nfa, "a"));
        assert!(accepts(&mut nfa, "z"));
        assert!(accepts(&mut nfa, "\n"));
        assert!(accepts(&mut nfa, "6"));
        assert!(!accepts(&mut nfa, "1"));
    }

    #[test]
    fn negated_charset_inverts() {
        // [^2-9] without the caret item; the tokenizer adds that separately.
        let items = vec![SetItem::DigitRange(2, 9)];
        let mut nfa = Nfa::new("f");
        nfa.add_charset_node(INPUT_PORT, OUTPUT_PORT, items, true, None);
        assert!(accepts(&mut nfa, "a"));
        assert!(accepts(&mut nfa, "1"));
        assert!(!accepts(&mut nfa, "2"));
        assert!(!accepts(&mut nfa, "5"));
        assert!(!accepts(&mut nfa, "9"));
    }

    #[test]
    fn end_accepts_exhausted_input_only() {
        let mut nfa = Nfa::default();
        nfa.add_end_node(INPUT_PORT, OUTPUT_PORT);
        assert!(accepts(&mut nfa, ""));
        assert!(!accepts(&mut nfa, "a"));
    }

    #[test]
    fn all_accepts_everything() {
        let mut nfa = Nfa::default();
        nfa.add_all_node(INPUT_PORT, OUTPUT_PORT, None);
        for ok in ["a", "1", "_", "^", "#", "\n"] {
            assert!(accepts(&mut nfa, ok), "expected {ok:?} to match");
        }
    }

    #[test]
    fn null_11_forwards_to_next_node() {
        let mut nfa = Nfa::default();
        nfa.add_null_11_node(INPUT_PORT, "n1");
        nfa.add_normal_node("n1", OUTPUT_PORT, 'a', None);
        assert!(accepts(&mut nfa, "a"));
    }

    #[test]
    fn null_12_tries_both_branches() {
        let mut nfa = Nfa::default();
        nfa.add_null_12_node(INPUT_PORT, "n1", "n2");
        nfa.add_normal_node("n1", OUTPUT_PORT, 'a', None);
        nfa.add_normal_node("n2", OUTPUT_PORT, 'b', None);
        assert!(accepts(&mut nfa, "a"));
        assert!(accepts(&mut nfa, "b"));
        assert!(!accepts(&mut nfa, "c"));
    }

    #[test]
    fn null_21_joins_branches() {
        let mut nfa = Nfa::default();
        nfa.add_null_12_node(INPUT_PORT, "n1", "n2");
        nfa.add_normal_node("n1", "n3", 'a', None);
        nfa.add_normal_node("n2", "n4", 'b', None);
        nfa.add_null_21_node("n3", "n4", OUTPUT_PORT);
        assert!(accepts(&mut nfa, "a"));
        assert!(accepts(&mut nfa, "b"));
        assert!(!accepts(&mut nfa, "c"));
    }

    #[test]
    fn extend_nodes_splices_foreign_graph() {
        let mut nfa1 = Nfa::new("nfa1");
        let mut nfa2 = Nfa::new("nfa2");
        nfa2.add_normal_node(INPUT_PORT, OUTPUT_PORT, 'a', None);
        assert!(nfa1.nodes().is_empty());
        nfa1.extend_nodes(nfa2.into_nodes());
        assert_eq!(nfa1.nodes().len(), 1);
        assert!(accepts(&mut nfa1, "a"));
    }

    #[test]
    fn node_list_preserves_wiring() {
        let mut nfa = Nfa::default();
        nfa.add_normal_node(INPUT_PORT, "n1", 'a', None);
        nfa.add_normal_node("n1", OUTPUT_PORT, 'b', None);
        let nodes = nfa.nodes();
        assert_eq!(nodes.len(), 2);
        assert!(nodes[0].has_output("n1"));
        assert!(nodes[1].has_input("n1"));
    }

    #[test]
    fn input_node_lookup() {
        let mut nfa = Nfa::default();
        assert!(nfa.input_node().is_none());
        nfa.add_normal_node(INPUT_PORT, "n1", 'a', None);
        nfa.add_normal_node("n1", OUTPUT_PORT, 'b', None);
        assert!(nfa.input_node().unwrap().has_input(INPUT_PORT));
    }

    #[test]
    fn set_input_node_renames_entry_wire() {
        let mut nfa = Nfa::default();
        nfa.add_normal_node(INPUT_PORT, OUTPUT_PORT, 'a', None);
        nfa.set_input_node("new_name");
        assert!(nfa.input_node().is_none());
        assert!(nfa.nodes()[0].has_input("new_name"));
    }

    #[test]
    fn output_node_lookup() {
        let mut nfa = Nfa::default();
        assert!(nfa.output_node().is_none());
        nfa.add_normal_node(INPUT_PORT, "n1", 'a', None);
        nfa.add_normal_node("n1", OUTPUT_PORT, 'b', None);
        assert!(nfa.output_node().unwrap().has_output(OUTPUT_PORT));
    }

    #[test]
    fn set_output_node_renames_exit_wire() {
        let mut nfa = Nfa::default();
        nfa.add_normal_node(INPUT_PORT, OUTPUT_PORT, 'a', None);
        nfa.set_output_node("new_name");
        assert!(nfa.output_node().is_none());
        assert!(nfa.nodes()[0].has_output("new_name"));
    }

    #[test]
    fn matched_prefix_and_index_agree() {
        let mut nfa = Nfa::default();
        nfa.add_normal_node(INPUT_PORT, "n1", 'a', None);
        nfa.add_normal_node("n1", OUTPUT_PORT, 'b', None);
        nfa.execute("abcd");
        assert!(nfa.is_matched());
        assert_eq!(nfa.matched_str(), Some("ab"));
        assert_eq!(nfa.matched_index(), 2);
    }

    #[test]
    fn failed_execute_clears_previous_match() {
        let mut nfa = Nfa::default();
        nfa.add_normal_node(INPUT_PORT, OUTPUT_PORT, 'a', None);
        nfa.execute("a");
        assert!(nfa.is_matched());
        nfa.execute("b");
        assert!(!nfa.is_matched());
        assert_eq!(nfa.matched_str(), None);
        assert_eq!(nfa.matched_index(), 0);
    }

    #[test]
    fn visualize_renders_diamond() {
        let mut nfa = Nfa::default();
        nfa.add_null_12_node(INPUT_PORT, "n1", "n2");
        nfa.add_normal_node("n1", "n3", 'a', None);
        nfa.add_normal_node("n2", "n4", 'b', None);
        nfa.add_null_21_node("n3", "n4", OUTPUT_PORT);
        let graph = "digraph G {\n  rankdir=LR;\n  Input[shape=rarrow];\n  Output[shape=rarrow];\n  n_0[label=\"null_12\"];\n  n_1[label=\"normal\"];\n  n_2[label=\"normal\"];\n  n_3[label=\"null_21\"];\n  Input -> n_0;\n  n_0 -> n_1[label=\"n1\"];\n  n_0 -> n_2[label=\"n2\"];\n  n_1 -> n_3[label=\"n3\"];\n  n_2 -> n_3[label=\"n4\"];\n  n_3 -> Output;\n}";
        assert_eq!(nfa.visualize(), graph);
    }
}
