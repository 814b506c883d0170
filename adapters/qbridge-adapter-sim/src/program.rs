//! Resolved program model.
//!
//! [`compile`] turns parsed sources into a [`Program`]: gates are checked
//! against the gate table, `call` targets are bound to operations, call
//! cycles are rejected, and every operation knows how many qubits it
//! touches (including through calls).
//!
//! **Invariants of a compiled [`Program`]:**
//! - The call graph is acyclic, so [`Program::flatten`] terminates.
//! - Every gate has the right number of distinct qubits and parameters.
//! - No operation touches more qubits than the configured limit.
//! - Inlining any operation yields at most [`Limits::max_steps`] steps and
//!   nests calls at most [`Limits::max_call_depth`] deep.

use std::collections::BTreeSet;

use qbridge_proto::{OperationInfo, OperationSummary, Source};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::ast::{GateCall, QualifiedName, SourceFile, StatementKind};
use crate::error::{Location, SimError, SimResult};
use crate::parser::parse;

/// Index of an operation in its [`Program`].
pub type OpId = usize;

/// Default qubit limit (a 20-qubit statevector is 16 MiB).
pub const DEFAULT_MAX_QUBITS: usize = 20;

/// Default cap on the inlined size of one operation.
pub const DEFAULT_MAX_STEPS: usize = 100_000;

/// Default cap on nested calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

/// Size limits enforced by [`compile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_qubits: usize,
    /// Instructions after inlining, each call counting as one.
    pub max_steps: usize,
    pub max_call_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_qubits: DEFAULT_MAX_QUBITS,
            max_steps: DEFAULT_MAX_STEPS,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/// A gate from the gate table, with its angle bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gate {
    H,
    X,
    Y,
    Z,
    S,
    Sdg,
    T,
    Tdg,
    Rx(f64),
    Ry(f64),
    Rz(f64),
    P(f64),
    Cx,
    Cz,
    Swap,
    Ccx,
}

impl Gate {
    /// `(parameters, qubits)` for a gate name.
    pub fn signature(name: &str) -> Option<(usize, usize)> {
        let sig = match name {
            "h" | "x" | "y" | "z" | "s" | "sdg" | "t" | "tdg" => (0, 1),
            "rx" | "ry" | "rz" | "p" => (1, 1),
            "cx" | "cz" | "swap" => (0, 2),
            "ccx" => (0, 3),
            _ => return None,
        };
        Some(sig)
    }

    fn bind(name: &str, params: &[f64]) -> Option<Gate> {
        let angle = params.first().copied();
        let gate = match name {
            "h" => Gate::H,
            "x" => Gate::X,
            "y" => Gate::Y,
            "z" => Gate::Z,
            "s" => Gate::S,
            "sdg" => Gate::Sdg,
            "t" => Gate::T,
            "tdg" => Gate::Tdg,
            "rx" => Gate::Rx(angle?),
            "ry" => Gate::Ry(angle?),
            "rz" => Gate::Rz(angle?),
            "p" => Gate::P(angle?),
            "cx" => Gate::Cx,
            "cz" => Gate::Cz,
            "swap" => Gate::Swap,
            "ccx" => Gate::Ccx,
            _ => return None,
        };
        Some(gate)
    }

    /// Diagram label.
    pub fn label(self) -> &'static str {
        match self {
            Gate::H => "H",
            Gate::X | Gate::Cx | Gate::Ccx => "X",
            Gate::Y => "Y",
            Gate::Z | Gate::Cz => "Z",
            Gate::S => "S",
            Gate::Sdg => "S'",
            Gate::T => "T",
            Gate::Tdg => "T'",
            Gate::Rx(_) => "Rx",
            Gate::Ry(_) => "Ry",
            Gate::Rz(_) => "Rz",
            Gate::P(_) => "P",
            Gate::Swap => "SWAP",
        }
    }

    pub fn angle(self) -> Option<f64> {
        match self {
            Gate::Rx(a) | Gate::Ry(a) | Gate::Rz(a) | Gate::P(a) => Some(a),
            _ => None,
        }
    }

    /// Leading qubits that act as controls.
    pub fn num_controls(self) -> usize {
        match self {
            Gate::Cx | Gate::Cz => 1,
            Gate::Ccx => 2,
            _ => 0,
        }
    }
}

/// One resolved instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Gate { gate: Gate, qubits: Vec<usize> },
    Measure(usize),
    Reset(usize),
    Call(OpId),
}

impl Instr {
    /// Qubits this instruction acts on directly. Empty for calls.
    pub fn qubits(&self) -> &[usize] {
        match self {
            Instr::Gate { qubits, .. } => qubits,
            Instr::Measure(q) | Instr::Reset(q) => std::slice::from_ref(q),
            Instr::Call(_) => &[],
        }
    }
}

/// An instruction and the line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub instr: Instr,
    pub line: usize,
}

/// A resolved operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub namespace: Option<String>,
    pub name: String,
    pub is_entry: bool,
    pub source: String,
    pub line: usize,
    pub body: Vec<Step>,
    /// Highest qubit index reached, through calls, plus one.
    pub num_qubits: usize,
    /// Every qubit reached through calls, ascending.
    pub touched: Vec<usize>,
    /// Inlined size, counting each call once plus its callee's size.
    pub num_steps: usize,
    /// Longest chain of nested calls below this operation.
    pub call_depth: usize,
}

impl Operation {
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn location(&self) -> Location {
        Location::new(&self.source, self.line)
    }
}

/// A non-call instruction reached by inlining, with its origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatStep<'a> {
    pub instr: &'a Instr,
    pub source: &'a str,
    pub line: usize,
}

impl FlatStep<'_> {
    pub fn location(&self) -> Location {
        Location::new(self.source, self.line)
    }
}

/// A compiled set of sources.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    operations: Vec<Operation>,
}

impl Program {
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn operation(&self, id: OpId) -> &Operation {
        &self.operations[id]
    }

    /// Pick the operation to run: `requested` by name if given, otherwise
    /// the single `@entry` operation.
    pub fn entry(&self, requested: Option<&str>) -> SimResult<OpId> {
        if let Some(name) = requested {
            return self.find_name(name);
        }
        let entries: Vec<OpId> = (0..self.operations.len())
            .filter(|&id| self.operations[id].is_entry)
            .collect();
        match entries.as_slice() {
            [] => Err(SimError::NoEntryPoint),
            [id] => Ok(*id),
            many => Err(SimError::AmbiguousEntryPoint(self.names(many))),
        }
    }

    /// Find an operation selected by namespace and name.
    pub fn find(&self, info: &OperationInfo) -> SimResult<OpId> {
        match &info.namespace {
            Some(_) => self.find_name(&info.qualified()),
            None => self.find_name(&info.name),
        }
    }

    /// Find an operation by `Name` or `Ns.Name`.
    pub fn find_name(&self, name: &str) -> SimResult<OpId> {
        let wanted = split_qualified(name);
        let matches: Vec<OpId> = (0..self.operations.len())
            .filter(|&id| {
                let op = &self.operations[id];
                op.name == wanted.name
                    && (wanted.namespace.is_none() || op.namespace == wanted.namespace)
            })
            .collect();
        match matches.as_slice() {
            [] => Err(SimError::OperationNotFound(name.to_string())),
            [id] => Ok(*id),
            many => Err(SimError::AmbiguousName {
                name: name.to_string(),
                candidates: self.names(many),
            }),
        }
    }

    /// The operation's instructions with every call inlined.
    pub fn flatten(&self, id: OpId) -> Vec<FlatStep<'_>> {
        let mut out = Vec::new();
        self.flatten_into(id, &mut out);
        out
    }

    fn flatten_into<'a>(&'a self, id: OpId, out: &mut Vec<FlatStep<'a>>) {
        let op = &self.operations[id];
        for step in &op.body {
            match step.instr {
                Instr::Call(callee) => self.flatten_into(callee, out),
                _ => out.push(FlatStep {
                    instr: &step.instr,
                    source: &op.source,
                    line: step.line,
                }),
            }
        }
    }

    /// Code-lens view of the program.
    pub fn summaries(&self) -> Vec<OperationSummary> {
        self.operations
            .iter()
            .map(|op| OperationSummary {
                namespace: op.namespace.clone(),
                name: op.name.clone(),
                is_entry: op.is_entry,
                num_qubits: op.num_qubits,
            })
            .collect()
    }

    fn names(&self, ids: &[OpId]) -> String {
        ids.iter()
            .map(|&id| self.operations[id].qualified_name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn split_qualified(name: &str) -> QualifiedName {
    match name.rsplit_once('.') {
        Some((ns, name)) => QualifiedName {
            namespace: Some(ns.to_string()),
            name: name.to_string(),
        },
        None => QualifiedName {
            namespace: None,
            name: name.to_string(),
        },
    }
}

/// Parse and resolve `sources`.
///
/// Returns every error found. Parse errors stop compilation before name
/// resolution; resolution errors stop it before cycle and size checks.
pub fn compile(sources: &[Source], limits: &Limits) -> Result<Program, Vec<SimError>> {
    let mut files = Vec::new();
    let mut errors = Vec::new();
    for source in sources {
        match parse(source) {
            Ok(file) => files.push(file),
            Err(e) => errors.push(e),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let mut resolver = Resolver::declare(&files, &mut errors);
    resolver.resolve_bodies(&files, &mut errors);
    if !errors.is_empty() {
        return Err(errors);
    }

    let mut program = Program {
        operations: resolver.operations,
    };
    let (order, cycles) = order_calls(&program);
    errors.extend(cycles);
    if !errors.is_empty() {
        return Err(errors);
    }

    measure_calls(&mut program, &order);
    errors.extend(check_size(&program, limits));
    let max_qubits = limits.max_qubits;
    for op in &program.operations {
        let direct = op
            .body
            .iter()
            .flat_map(|s| s.instr.qubits())
            .max()
            .map_or(0, |q| q + 1);
        if direct > max_qubits {
            errors.push(SimError::TooManyQubits {
                at: op.location(),
                operation: op.qualified_name(),
                qubits: direct,
                limit: max_qubits,
            });
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    debug!("Compiled {} operations", program.operations.len());
    Ok(program)
}

struct Resolver {
    operations: Vec<Operation>,
    by_name: FxHashMap<String, Vec<OpId>>,
    by_qualified: FxHashMap<String, OpId>,
    // Declaration index -> operation id, `None` for duplicates.
    decl_ids: Vec<Option<OpId>>,
}

impl Resolver {
    fn declare(files: &[SourceFile], errors: &mut Vec<SimError>) -> Self {
        let mut resolver = Resolver {
            operations: Vec::new(),
            by_name: FxHashMap::default(),
            by_qualified: FxHashMap::default(),
            decl_ids: Vec::new(),
        };

        for file in files {
            for decl in &file.operations {
                let op = Operation {
                    namespace: file.namespace.clone(),
                    name: decl.name.clone(),
                    is_entry: decl.is_entry,
                    source: file.name.clone(),
                    line: decl.line,
                    body: Vec::new(),
                    num_qubits: 0,
                    touched: Vec::new(),
                    num_steps: 0,
                    call_depth: 0,
                };
                let qualified = op.qualified_name();
                if resolver.by_qualified.contains_key(&qualified) {
                    errors.push(SimError::DuplicateOperation {
                        at: op.location(),
                        name: qualified,
                    });
                    resolver.decl_ids.push(None);
                    continue;
                }
                let id = resolver.operations.len();
                resolver.by_qualified.insert(qualified, id);
                resolver.by_name.entry(op.name.clone()).or_default().push(id);
                resolver.operations.push(op);
                resolver.decl_ids.push(Some(id));
            }
        }
        resolver
    }

    fn resolve_bodies(&mut self, files: &[SourceFile], errors: &mut Vec<SimError>) {
        let decls = files.iter().flat_map(|file| {
            file.operations
                .iter()
                .map(move |decl| (file, decl))
        });

        for (index, (file, decl)) in decls.enumerate() {
            let Some(id) = self.decl_ids[index] else {
                continue;
            };
            let mut body = Vec::with_capacity(decl.body.len());
            for stmt in &decl.body {
                let at = Location::new(&file.name, stmt.line);
                let instr = match &stmt.kind {
                    StatementKind::Gate(call) => resolve_gate(call, at),
                    StatementKind::Measure(q) => Ok(Instr::Measure(*q)),
                    StatementKind::Reset(q) => Ok(Instr::Reset(*q)),
                    StatementKind::Call(target) => self
                        .resolve_call(target, file.namespace.as_deref(), at)
                        .map(Instr::Call),
                };
                match instr {
                    Ok(instr) => body.push(Step {
                        instr,
                        line: stmt.line,
                    }),
                    Err(e) => errors.push(e),
                }
            }
            self.operations[id].body = body;
        }
    }

    fn resolve_call(
        &self,
        target: &QualifiedName,
        namespace: Option<&str>,
        at: Location,
    ) -> SimResult<OpId> {
        if target.namespace.is_some() {
            return self
                .by_qualified
                .get(&target.to_string())
                .copied()
                .ok_or_else(|| SimError::UnknownOperation {
                    at,
                    name: target.to_string(),
                });
        }

        let candidates = self.by_name.get(&target.name).map_or(&[][..], Vec::as_slice);
        let local = candidates
            .iter()
            .copied()
            .find(|&id| self.operations[id].namespace.as_deref() == namespace);
        match (local, candidates) {
            (Some(id), _) => Ok(id),
            (None, []) => Err(SimError::UnknownOperation {
                at,
                name: target.name.clone(),
            }),
            (None, [id]) => Ok(*id),
            (None, many) => Err(SimError::AmbiguousOperation {
                at,
                name: target.name.clone(),
                candidates: many
                    .iter()
                    .map(|&id| self.operations[id].qualified_name())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

fn resolve_gate(call: &GateCall, at: Location) -> SimResult<Instr> {
    let Some((num_params, num_qubits)) = Gate::signature(&call.name) else {
        return Err(SimError::UnknownGate {
            at,
            gate: call.name.clone(),
        });
    };
    if call.params.len() != num_params {
        return Err(SimError::WrongParameterCount {
            at,
            gate: call.name.clone(),
            expected: num_params,
            got: call.params.len(),
        });
    }
    if call.qubits.len() != num_qubits {
        return Err(SimError::WrongQubitCount {
            at,
            gate: call.name.clone(),
            expected: num_qubits,
            got: call.qubits.len(),
        });
    }
    for (i, q) in call.qubits.iter().enumerate() {
        if call.qubits[..i].contains(q) {
            return Err(SimError::DuplicateOperand {
                at,
                gate: call.name.clone(),
                qubit: *q,
            });
        }
    }

    let params: Vec<f64> = call.params.iter().map(|e| e.eval()).collect();
    let gate = Gate::bind(&call.name, &params).ok_or_else(|| SimError::UnknownGate {
        at,
        gate: call.name.clone(),
    })?;
    Ok(Instr::Gate {
        gate,
        qubits: call.qubits.clone(),
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Active,
    Done,
}

/// Walk the call graph depth first. Returns operations callee-first and
/// each call cycle once, reported at the call that closes it.
fn order_calls(program: &Program) -> (Vec<OpId>, Vec<SimError>) {
    let ops = &program.operations;
    let mut marks = vec![Mark::Unvisited; ops.len()];
    let mut order = Vec::with_capacity(ops.len());
    let mut errors = Vec::new();
    // (operation, next body index) for every active operation.
    let mut frames: Vec<(OpId, usize)> = Vec::new();

    for root in 0..ops.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::Active;
        frames.push((root, 0));

        while let Some(&(id, next)) = frames.last() {
            let Some(step) = ops[id].body.get(next) else {
                frames.pop();
                marks[id] = Mark::Done;
                order.push(id);
                continue;
            };
            if let Some(frame) = frames.last_mut() {
                frame.1 += 1;
            }
            let Instr::Call(callee) = step.instr else {
                continue;
            };
            match marks[callee] {
                Mark::Unvisited => {
                    marks[callee] = Mark::Active;
                    frames.push((callee, 0));
                }
                Mark::Active => {
                    let start = frames.iter().position(|&(s, _)| s == callee).unwrap_or(0);
                    let mut names: Vec<String> = frames[start..]
                        .iter()
                        .map(|&(s, _)| ops[s].qualified_name())
                        .collect();
                    names.push(ops[callee].qualified_name());
                    errors.push(SimError::CallCycle {
                        at: Location::new(&ops[id].source, step.line),
                        cycle: names.join(" -> "),
                    });
                }
                Mark::Done => {}
            }
        }
    }
    (order, errors)
}

/// Fill in qubit, size and depth figures. `order` must list every callee
/// before its callers.
fn measure_calls(program: &mut Program, order: &[OpId]) {
    for &id in order {
        let ops = &program.operations;
        let mut touched = BTreeSet::new();
        let mut num_steps = 0usize;
        let mut call_depth = 0usize;
        for step in &ops[id].body {
            num_steps = num_steps.saturating_add(1);
            match step.instr {
                Instr::Call(callee) => {
                    let callee = &ops[callee];
                    touched.extend(callee.touched.iter().copied());
                    num_steps = num_steps.saturating_add(callee.num_steps);
                    call_depth = call_depth.max(callee.call_depth.saturating_add(1));
                }
                ref other => touched.extend(other.qubits().iter().copied()),
            }
        }

        let op = &mut program.operations[id];
        op.num_qubits = touched.last().map_or(0, |q| q + 1);
        op.touched = touched.into_iter().collect();
        op.num_steps = num_steps;
        op.call_depth = call_depth;
    }
}

/// Report oversized operations. Only the operation where a limit is first
/// crossed is reported, not every caller above it.
fn check_size(program: &Program, limits: &Limits) -> Vec<SimError> {
    let ops = &program.operations;
    let mut errors = Vec::new();
    for op in ops {
        let below: Vec<&Operation> = op
            .body
            .iter()
            .filter_map(|step| match step.instr {
                Instr::Call(callee) => Some(&ops[callee]),
                _ => None,
            })
            .collect();
        if op.num_steps > limits.max_steps
            && below.iter().all(|c| c.num_steps <= limits.max_steps)
        {
            errors.push(SimError::ProgramTooLarge {
                at: op.location(),
                operation: op.qualified_name(),
                steps: op.num_steps,
                limit: limits.max_steps,
            });
        }
        if op.call_depth > limits.max_call_depth
            && below.iter().all(|c| c.call_depth <= limits.max_call_depth)
        {
            errors.push(SimError::CallTooDeep {
                at: op.location(),
                operation: op.qualified_name(),
                depth: op.call_depth,
                limit: limits.max_call_depth,
            });
        }
    }
    errors
}
