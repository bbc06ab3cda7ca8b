//! core-sim: discrete-event machine.
//!
//! A `Machine` owns a directed graph of [`Node`]s plus its own boundary
//! ports, and drives timed value-events through it. Design principles:
//! - Deterministic and single-threaded: one pending set, delivered in
//!   (clock ascending, insertion order) sequence. Tie-breaking relies on the
//!   sort being stable.
//! - Ports are named wires. A producer output and a consumer input with the
//!   same name are connected; nothing else is.
//! - Transitions are pure. A `None` return kills that branch of the flow;
//!   there is no other cancellation mechanism besides the event budget.
//!
//! Port tables are insertion-ordered. Declared order decides how activation
//! arguments are collected and how emitted values are zipped onto outputs,
//! which in turn fixes event insertion order, so an unordered map here would
//! change observable delivery sequences.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

/// Simulated time and latency unit. Time never runs backwards.
pub type Clock = u64;

/// Events dispatched per `execute` call before the machine gives up.
pub const DEFAULT_EVENT_LIMIT: usize = 10_000;

/// A value travelling on a wire.
///
/// The regex layers only ever send `Text` (the unconsumed remainder of the
/// input), but the machine itself is value-agnostic and is exercised with
/// boolean gates too, so the variant set lives here, not in those layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Flag(bool),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Flag(_) => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Value::Flag(b) => Some(*b),
            Value::Text(_) => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Flag(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Flag(b) => write!(f, "{b}"),
        }
    }
}

/// What a transition hands back when the branch survives.
///
/// `Broadcast` replicates one value to every declared output in order;
/// `PerPort` zips values with outputs in declared order, dropping extras on
/// either side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emit {
    Broadcast(Value),
    PerPort(Vec<Value>),
}

/// Node transition: present input values in declared port order (possibly
/// empty) to an optional emission. `None` means the branch dies.
pub type Transition = Rc<dyn Fn(&[Value]) -> Option<Emit>>;

/// Index of a node in its owning machine's dense node list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n_{}", self.0)
    }
}

/// An emission that has not been scheduled yet: the latency is still
/// relative to the emitting step's clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEvent {
    pub var: String,
    pub val: Value,
    pub latency: Clock,
}

impl SourceEvent {
    pub fn new(var: impl Into<String>, val: impl Into<Value>, latency: Clock) -> Self {
        Self {
            var: var.into(),
            val: val.into(),
            latency,
        }
    }
}

/// A scheduled delivery. `node` is `None` when the destination is one of the
/// machine's own output ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub clock: Clock,
    pub node: Option<NodeId>,
    pub var: String,
    pub val: Value,
}

/// Wire-name to last-delivered-value map. Graph inputs start out present but
/// unset, which is why the value side is an `Option`.
pub type StateMap = IndexMap<String, Option<Value>>;

/// A functional node: a transition plus insertion-ordered input and output
/// port tables, each port carrying its delivery latency.
#[derive(Clone)]
pub struct Node {
    name: String,
    transition: Transition,
    inputs: IndexMap<String, Clock>,
    outputs: IndexMap<String, Clock>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

impl Node {
    pub fn new(
        name: impl Into<String>,
        transition: impl Fn(&[Value]) -> Option<Emit> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            transition: Rc::new(transition),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare an input port. Names must be unique within this node's inputs.
    pub fn input(&mut self, name: impl Into<String>, latency: Clock) -> &mut Self {
        let name = name.into();
        assert!(!self.inputs.contains_key(&name), "duplicate input port {name}");
        self.inputs.insert(name, latency);
        self
    }

    /// Declare an output port. Names must be unique within this node's outputs.
    pub fn output(&mut self, name: impl Into<String>, latency: Clock) -> &mut Self {
        let name = name.into();
        assert!(
            !self.outputs.contains_key(&name),
            "duplicate output port {name}"
        );
        self.outputs.insert(name, latency);
        self
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.contains_key(name)
    }

    pub fn input_names(&self) -> Vec<String> {
        self.inputs.keys().cloned().collect()
    }

    pub fn output_names(&self) -> Vec<String> {
        self.outputs.keys().cloned().collect()
    }

    /// Drop an input port, returning its latency. Relative order of the
    /// remaining ports is preserved.
    pub fn remove_input(&mut self, name: &str) -> Option<Clock> {
        self.inputs.shift_remove(name)
    }

    /// Drop an output port, returning its latency. Relative order of the
    /// remaining ports is preserved.
    pub fn remove_output(&mut self, name: &str) -> Option<Clock> {
        self.outputs.shift_remove(name)
    }

    /// Collect present input values in declared order, run the transition,
    /// and wrap surviving emissions with their ports' latencies.
    pub fn activate(&self, state: &StateMap) -> SmallVec<[SourceEvent; 2]> {
        let mut args: SmallVec<[Value; 2]> = SmallVec::new();
        for port in self.inputs.keys() {
            if let Some(Some(val)) = state.get(port) {
                args.push(val.clone());
            }
        }
        let mut out = SmallVec::new();
        let Some(emit) = (self.transition)(&args) else {
            trace!(target: "sim", node = %self.name, "branch died");
            return out;
        };
        match emit {
            Emit::Broadcast(val) => {
                for (port, &latency) in &self.outputs {
                    out.push(SourceEvent::new(port.clone(), val.clone(), latency));
                }
            }
            Emit::PerPort(vals) => {
                for ((port, &latency), val) in self.outputs.iter().zip(vals) {
                    out.push(SourceEvent::new(port.clone(), val, latency));
                }
            }
        }
        out
    }
}

/// Discrete-event machine: boundary ports, a dense node list, and the
/// histories produced by the most recent `execute`.
pub struct Machine {
    name: String,
    inputs: IndexMap<String, Clock>,
    outputs: IndexMap<String, Clock>,
    nodes: Vec<Node>,
    state_history: Vec<(Clock, StateMap)>,
    event_history: Vec<Event>,
    limit_reached: bool,
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}

impl Machine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            nodes: Vec::new(),
            state_history: Vec::new(),
            event_history: Vec::new(),
            limit_reached: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register an external entry port on the machine boundary.
    pub fn input_port(&mut self, name: impl Into<String>, latency: Clock) {
        self.inputs.insert(name.into(), latency);
    }

    /// Register an external exit port on the machine boundary.
    pub fn output_port(&mut self, name: impl Into<String>, latency: Clock) {
        self.outputs.insert(name.into(), latency);
    }

    /// Create a node and hand it back for port wiring.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        transition: impl Fn(&[Value]) -> Option<Emit> + 'static,
    ) -> &mut Node {
        self.nodes.push(Node::new(name, transition));
        self.nodes.last_mut().expect("just pushed")
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.iter_mut()
    }

    pub fn extend_nodes(&mut self, nodes: impl IntoIterator<Item = Node>) {
        self.nodes.extend(nodes);
    }

    /// Move the node list out, leaving the machine empty. Used when one
    /// graph is spliced into another.
    pub fn take_nodes(&mut self) -> Vec<Node> {
        std::mem::take(&mut self.nodes)
    }

    pub fn state_history(&self) -> &[(Clock, StateMap)] {
        &self.state_history
    }

    pub fn event_history(&self) -> &[Event] {
        &self.event_history
    }

    /// Whether the last `execute` stopped on the event budget rather than
    /// quiescence or success.
    pub fn limit_reached(&self) -> bool {
        self.limit_reached
    }

    /// Drive the machine from a seed batch with the default event budget.
    pub fn execute(&mut self, seeds: impl IntoIterator<Item = SourceEvent>) -> StateMap {
        self.execute_with_limit(seeds, DEFAULT_EVENT_LIMIT)
    }

    /// Drive the machine from a seed batch until quiescence, success (an
    /// empty `Text` lands on a boundary output port), or `limit` dispatched
    /// events. Returns the cumulative state record.
    pub fn execute_with_limit(
        &mut self,
        seeds: impl IntoIterator<Item = SourceEvent>,
        mut limit: usize,
    ) -> StateMap {
        let mut state = self.initial_state();
        let mut record = self.initial_state();
        let mut clock: Clock = 0;
        let mut seeds: Vec<SourceEvent> = seeds.into_iter().collect();
        let mut pending: Vec<Event> = Vec::new();

        self.state_history = vec![(clock, state.clone())];
        self.event_history.clear();
        self.limit_reached = false;
        debug!(target: "sim", machine = %self.name, seeds = seeds.len(), "execute");

        while (!pending.is_empty() || !seeds.is_empty()) && limit > 0 {
            limit -= 1;
            let fresh = self.schedule(&seeds, clock);
            pending.extend(fresh);
            seeds.clear();
            if pending.is_empty() {
                break;
            }
            // Stable sort: equal clocks keep insertion order.
            pending.sort_by_key(|e| e.clock);
            let ev = pending.remove(0);
            trace!(target: "sim", clock = ev.clock, var = %ev.var, val = %ev.val, "deliver");

            state.clear();
            state.insert(ev.var.clone(), Some(ev.val.clone()));
            clock = ev.clock;

            if let Some(id) = ev.node {
                seeds = self.nodes[id.0].activate(&state).into_vec();
            }

            for (var, val) in &state {
                record.insert(var.clone(), val.clone());
            }
            self.state_history.push((clock, record.clone()));
            self.event_history.push(ev);

            if self.output_satisfied(&record) {
                debug!(target: "sim", machine = %self.name, clock, "output reached");
                break;
            }
        }
        if limit == 0 {
            self.limit_reached = true;
            warn!(target: "sim", machine = %self.name, "limit reached");
        }
        record
    }

    fn initial_state(&self) -> StateMap {
        self.inputs.keys().map(|k| (k.clone(), None)).collect()
    }

    /// True once any boundary output port has received an empty text value,
    /// the machine-level success condition.
    fn output_satisfied(&self, record: &StateMap) -> bool {
        self.outputs.keys().any(|port| {
            matches!(record.get(port), Some(Some(Value::Text(t))) if t.is_empty())
        })
    }

    /// Convert a batch of relative emissions into scheduled deliveries.
    ///
    /// `clock` is already folded into `src_lat`; the second addition on the
    /// node branch is load-bearing, downstream delivery order depends on
    /// these exact clocks.
    fn schedule(&self, sources: &[SourceEvent], clock: Clock) -> Vec<Event> {
        let mut events = Vec::new();
        for se in sources {
            let src_lat = clock + se.latency + self.inputs.get(&se.var).copied().unwrap_or(0);
            if let Some(&out_lat) = self.outputs.get(&se.var) {
                events.push(Event {
                    clock: src_lat + out_lat,
                    node: None,
                    var: se.var.clone(),
                    val: se.val.clone(),
                });
            }
            for (i, node) in self.nodes.iter().enumerate() {
                if let Some(&in_lat) = node.inputs.get(&se.var) {
                    events.push(Event {
                        clock: clock + src_lat + in_lat,
                        node: Some(NodeId(i)),
                        var: se.var.clone(),
                        val: se.val.clone(),
                    });
                }
            }
        }
        events
    }

    /// Render the graph as Graphviz dot: boundary ports as arrows, nodes as
    /// boxes, shared port names as edges.
    pub fn visualize(&self) -> String {
        let mut res = Vec::new();
        res.push("digraph G {".to_string());
        res.push("  rankdir=LR;".to_string());
        for v in self.inputs.keys() {
            res.push(format!("  {v}[shape=rarrow];"));
        }
        for v in self.outputs.keys() {
            res.push(format!("  {v}[shape=rarrow];"));
        }
        for (i, n) in self.nodes.iter().enumerate() {
            res.push(format!("  n_{i}[label=\"{}\"];", n.name));
        }
        for (i, n) in self.nodes.iter().enumerate() {
            for v in n.inputs.keys() {
                if self.inputs.contains_key(v) {
                    res.push(format!("  {v} -> n_{i};"));
                }
            }
            for (j, n2) in self.nodes.iter().enumerate() {
                if i == j {
                    continue;
                }
                for v in n.inputs.keys() {
                    if n2.outputs.contains_key(v) {
                        res.push(format!("  n_{j} -> n_{i}[label=\"{v}\"];"));
                    }
                }
            }
            for v in n.outputs.keys() {
                if self.outputs.contains_key(v) {
                    res.push(format!("  n_{i} -> {v};"));
                }
            }
        }
        res.push("}".to_string());
        res.join("\n")
    }
}
