//! Executor
//!
//! Walks parsed chains left-to-right with `&&`/`||` short-circuiting,
//! resolves simple commands (alias → function → builtin → PATH), applies
//! redirections, enforces the option semantics (errexit, pipefail,
//! noexec, xtrace), and drives the control constructs. Control flow from
//! `break`/`continue`/`return`/`exit` rides the [`Interrupt`] channel and
//! is consumed by the construct that binds it.

pub mod control_flow;
pub mod job;
pub mod pipeline;
pub mod redirect;
pub mod resolve;
pub mod signal;
pub mod subshell;

pub use control_flow::{Exec, Interrupt};

use std::collections::HashSet;
use std::rc::Rc;

use crate::ast::*;
use crate::error::ShellError;
use crate::exec::control_flow::{classify_loop_interrupt, LoopSignal};
use crate::exec::redirect::RedirGuard;
use crate::expand;
use crate::state::{ShellState, TrapCondition, Variable};

/// Execute a whole parsed script.
pub fn execute_script(state: &mut ShellState, script: &ScriptNode) -> Exec {
    execute_statements(state, &script.statements, false)
}

/// Execute a statement list; `condition` marks if/while/until condition
/// position, where failures are expected and never trip errexit.
pub fn execute_statements(
    state: &mut ShellState,
    statements: &[StatementNode],
    condition: bool,
) -> Exec {
    let mut status = state.last_status;
    for statement in statements {
        status = execute_statement(state, statement, condition)?;
    }
    Ok(status)
}

fn execute_statement(state: &mut ShellState, stmt: &StatementNode, condition: bool) -> Exec {
    if state.options.noexec {
        return Ok(state.last_status);
    }
    if let Some(status) = run_pending_signal_traps(state) {
        return Err(Interrupt::Exit(status));
    }

    if stmt.background {
        let status = subshell::spawn_background(state, stmt)?;
        state.set_status(status);
        return Ok(state.last_status);
    }

    let count = stmt.pipelines.len();
    let mut status = 0;
    for (i, pipeline) in stmt.pipelines.iter().enumerate() {
        if i > 0 {
            let run = match stmt.operators[i - 1] {
                StatementOperator::And => status == 0,
                StatementOperator::Or => status != 0,
            };
            if !run {
                continue;
            }
        }

        status = pipeline::run_pipeline(state, pipeline)?;
        state.set_status(status);
        status = state.last_status;

        // The last pipeline of a chain is errexit-eligible; anything
        // feeding && or ||, a negated pipeline, or a condition is tested.
        let tested = condition || i < count - 1 || pipeline.negated;
        if status != 0 && !tested {
            run_err_trap(state);
            if state.options.errexit {
                return Err(Interrupt::Exit(status));
            }
        }
    }
    Ok(state.last_status)
}

/// Execute one command in the current shell process.
pub fn execute_command(state: &mut ShellState, command: &CommandNode) -> Exec {
    match command {
        CommandNode::Simple(simple) => execute_simple(state, simple),
        CommandNode::Compound(compound) => execute_compound(state, compound),
        CommandNode::FunctionDef(def) => {
            state
                .functions
                .insert(def.name.clone(), Rc::new(def.clone()));
            Ok(0)
        }
    }
}

// ----------------------------------------------------------------------
// Simple commands
// ----------------------------------------------------------------------

/// An error that fails the command without unwinding the chain.
fn command_error(state: &mut ShellState, err: ShellError) -> Exec {
    err.report();
    let status = err.status();
    if !state.interactive && matches!(err, ShellError::Expansion(_)) {
        // Scripts stop at expansion errors.
        return Err(Interrupt::Exit(status));
    }
    Ok(status)
}

fn execute_simple(state: &mut ShellState, cmd: &SimpleCommandNode) -> Exec {
    state.current_line = cmd.line;
    run_trap_condition(state, TrapCondition::Debug);

    let cmd = apply_aliases(state, cmd);

    let mut words = Vec::new();
    if let Some(name) = &cmd.name {
        words.push(name.clone());
    }
    words.extend(cmd.args.iter().cloned());

    let argv = match expand::expand_words(state, &words) {
        Ok(argv) => argv,
        Err(e) => {
            subshell::cleanup_process_substitutions(state);
            return command_error(state, e.into());
        }
    };

    let result = execute_expanded(state, &cmd, argv);
    subshell::cleanup_process_substitutions(state);
    result
}

fn execute_expanded(
    state: &mut ShellState,
    cmd: &SimpleCommandNode,
    argv: Vec<String>,
) -> Exec {
    // Assignment-only command: assignments persist in the shell.
    if argv.is_empty() {
        let mut status = 0;
        for assignment in &cmd.assignments {
            match apply_persistent_assignment(state, assignment) {
                Ok(()) => {}
                Err(e) => return command_error(state, e),
            }
        }
        if !cmd.redirections.is_empty() {
            // Redirections still open and close their targets.
            match redirect::prepare(state, &cmd.redirections).and_then(RedirGuard::apply) {
                Ok(guard) => drop(guard),
                Err(e) => status = command_error(state, e)?,
            }
        }
        return Ok(status);
    }

    if state.options.xtrace {
        let ps4 = state.env.value("PS4").unwrap_or("+ ").to_string();
        eprintln!("{}{}", ps4, argv.join(" "));
    }

    state.last_arg = argv.last().cloned().unwrap_or_default();
    let name = argv[0].clone();

    if !name.contains('/') {
        if let Some(func) = state.functions.get(&name).cloned() {
            return call_function(state, &func, &argv[1..], &cmd.assignments, &cmd.redirections);
        }
        if let Some(builtin) = crate::builtins::lookup(&name) {
            return run_builtin(state, builtin, &argv, cmd);
        }
    }

    // External command: assignments travel in the child environment only.
    let mut extra_env = Vec::new();
    for assignment in &cmd.assignments {
        let value = match assignment_value(state, assignment) {
            Ok(v) => v,
            Err(e) => return command_error(state, e),
        };
        extra_env.push((assignment.name.clone(), value));
    }
    let prepared = match redirect::prepare(state, &cmd.redirections) {
        Ok(p) => p,
        Err(e) => return command_error(state, e),
    };
    pipeline::run_external(state, &argv, &extra_env, prepared)
}

fn run_builtin(
    state: &mut ShellState,
    builtin: crate::builtins::BuiltinFn,
    argv: &[String],
    cmd: &SimpleCommandNode,
) -> Exec {
    let temp = match TempAssigns::apply(state, &cmd.assignments) {
        Ok(t) => t,
        Err(e) => return command_error(state, e),
    };

    let prepared = match redirect::prepare(state, &cmd.redirections) {
        Ok(p) => p,
        Err(e) => {
            temp.restore(state);
            return command_error(state, e);
        }
    };
    let guard = if prepared.is_empty() {
        None
    } else {
        match RedirGuard::apply(prepared) {
            Ok(g) => Some(g),
            Err(e) => {
                temp.restore(state);
                return command_error(state, e);
            }
        }
    };

    let result = builtin(state, &argv[1..]);
    if argv[0] == "exec" && argv.len() == 1 {
        // `exec 3<file` keeps its redirections in the shell.
        if let Some(g) = guard {
            g.persist();
        }
    } else {
        drop(guard);
    }
    temp.restore(state);
    result
}

/// Invoke a shell function: fresh positional parameters, a new variable
/// frame, `return` consumed here, RETURN trap on the way out.
pub fn call_function(
    state: &mut ShellState,
    func: &Rc<FunctionDefNode>,
    args: &[String],
    assignments: &[AssignmentNode],
    redirections: &[RedirectionNode],
) -> Exec {
    let temp = match TempAssigns::apply(state, assignments) {
        Ok(t) => t,
        Err(e) => return command_error(state, e),
    };

    let prepared = match redirect::prepare(state, redirections) {
        Ok(p) => p,
        Err(e) => {
            temp.restore(state);
            return command_error(state, e);
        }
    };
    let guard = if prepared.is_empty() {
        None
    } else {
        match RedirGuard::apply(prepared) {
            Ok(g) => Some(g),
            Err(e) => {
                temp.restore(state);
                return command_error(state, e);
            }
        }
    };

    let saved_positional = std::mem::replace(&mut state.positional, args.to_vec());
    state.env.push_frame();
    state.function_depth += 1;

    let result = execute_compound(state, &func.body);

    state.function_depth -= 1;
    state.env.pop_frame();
    state.positional = saved_positional;
    drop(guard);
    temp.restore(state);

    run_trap_condition(state, TrapCondition::Return);

    match result {
        Err(Interrupt::Return(status)) => {
            state.set_status(status);
            Ok(state.last_status)
        }
        other => other,
    }
}

// ----------------------------------------------------------------------
// Assignments
// ----------------------------------------------------------------------

fn assignment_value(
    state: &mut ShellState,
    assignment: &AssignmentNode,
) -> Result<String, ShellError> {
    match &assignment.value {
        Some(word) => expand::expand_word_single(state, word).map_err(ShellError::from),
        None => Ok(String::new()),
    }
}

fn apply_persistent_assignment(
    state: &mut ShellState,
    assignment: &AssignmentNode,
) -> Result<(), ShellError> {
    let value = assignment_value(state, assignment)?;
    state.last_arg = value.clone();
    let result = if assignment.append {
        state.append_assign(&assignment.name, &value)
    } else {
        state.assign(&assignment.name, &value)
    };
    result.map_err(|e| ShellError::ReadonlyVariable(e.name))
}

/// Command-scoped `VAR=x` prefixes for builtins and functions: applied,
/// then restored whatever happens.
struct TempAssigns {
    saved: Vec<(String, Option<Variable>)>,
}

impl TempAssigns {
    fn apply(
        state: &mut ShellState,
        assignments: &[AssignmentNode],
    ) -> Result<TempAssigns, ShellError> {
        let mut saved = Vec::new();
        for assignment in assignments {
            let value = match assignment_value(state, assignment) {
                Ok(v) => v,
                Err(e) => {
                    let temp = TempAssigns { saved };
                    temp.restore(state);
                    return Err(e);
                }
            };
            saved.push((
                assignment.name.clone(),
                state.env.snapshot(&assignment.name),
            ));
            if let Err(e) = state.assign(&assignment.name, &value) {
                let temp = TempAssigns { saved };
                temp.restore(state);
                return Err(ShellError::ReadonlyVariable(e.name));
            }
        }
        Ok(TempAssigns { saved })
    }

    fn restore(self, state: &mut ShellState) {
        for (name, old) in self.saved.into_iter().rev() {
            state.env.restore_global(&name, old);
        }
        state.caches.invalidate();
    }
}

// ----------------------------------------------------------------------
// Aliases
// ----------------------------------------------------------------------

/// One level of alias expansion per name, cycle-safe. Functions and
/// builtins resolve ahead of aliases, so a name either of them owns is
/// never rewritten. The replacement is parsed as a command prefix and
/// merged in front of the original words.
fn apply_aliases(state: &ShellState, cmd: &SimpleCommandNode) -> SimpleCommandNode {
    let mut cmd = cmd.clone();
    let mut visited: HashSet<String> = HashSet::new();

    loop {
        let Some(bare) = cmd.name.as_ref().and_then(|w| w.as_bare_literal()) else {
            break;
        };
        if visited.contains(bare)
            || state.functions.contains_key(bare)
            || crate::builtins::lookup(bare).is_some()
        {
            break;
        }
        let Some(replacement) = state.aliases.get(bare) else {
            break;
        };
        visited.insert(bare.to_string());

        let Ok(script) = crate::parser::parse(replacement) else {
            break;
        };
        let Some(replacement_cmd) = single_simple_command(&script) else {
            break;
        };

        let mut assignments = replacement_cmd.assignments.clone();
        assignments.extend(cmd.assignments);
        let mut args = replacement_cmd.args.clone();
        args.extend(cmd.args);
        let mut redirections = replacement_cmd.redirections.clone();
        redirections.extend(cmd.redirections);

        cmd = SimpleCommandNode {
            assignments,
            name: replacement_cmd.name.clone(),
            args,
            redirections,
            line: cmd.line,
        };
    }
    cmd
}

fn single_simple_command(script: &ScriptNode) -> Option<&SimpleCommandNode> {
    match script.statements.as_slice() {
        [stmt] => match stmt.pipelines.as_slice() {
            [pipeline] if !stmt.background => match pipeline.commands.as_slice() {
                [CommandNode::Simple(simple)] => Some(simple),
                _ => None,
            },
            _ => None,
        },
        _ => None,
    }
}

// ----------------------------------------------------------------------
// Compound commands
// ----------------------------------------------------------------------

fn execute_compound(state: &mut ShellState, node: &CompoundCommandNode) -> Exec {
    // A compound runs many commands; none of them may take over the
    // process image even inside a pipeline stage child.
    state.exec_directly = false;

    let prepared = match redirect::prepare(state, node.redirections()) {
        Ok(p) => p,
        Err(e) => return command_error(state, e),
    };
    let guard = if prepared.is_empty() {
        None
    } else {
        match RedirGuard::apply(prepared) {
            Ok(g) => Some(g),
            Err(e) => return command_error(state, e),
        }
    };

    let result = execute_compound_inner(state, node);
    drop(guard);
    result
}

enum BodyOutcome {
    Normal(i32),
    Break,
    Continue,
    Propagate(Interrupt),
}

fn run_loop_body(state: &mut ShellState, body: &[StatementNode]) -> BodyOutcome {
    match execute_statements(state, body, false) {
        Ok(status) => BodyOutcome::Normal(status),
        Err(interrupt) => match classify_loop_interrupt(interrupt) {
            LoopSignal::Break => BodyOutcome::Break,
            LoopSignal::Continue => BodyOutcome::Continue,
            LoopSignal::Propagate(i) => BodyOutcome::Propagate(i),
        },
    }
}

fn execute_compound_inner(state: &mut ShellState, node: &CompoundCommandNode) -> Exec {
    match node {
        CompoundCommandNode::If(n) => {
            for clause in &n.clauses {
                if execute_statements(state, &clause.condition, true)? == 0 {
                    return execute_statements(state, &clause.body, false);
                }
            }
            match &n.else_body {
                Some(body) => execute_statements(state, body, false),
                None => Ok(0),
            }
        }

        CompoundCommandNode::While(n) => {
            run_loop(state, |state| {
                Ok(execute_statements(state, &n.condition, true)? == 0)
            }, &n.body)
        }

        CompoundCommandNode::Until(n) => {
            run_loop(state, |state| {
                Ok(execute_statements(state, &n.condition, true)? != 0)
            }, &n.body)
        }

        CompoundCommandNode::For(n) => {
            let items = match &n.words {
                Some(words) => match expand::expand_words(state, words) {
                    Ok(items) => items,
                    Err(e) => return command_error(state, e.into()),
                },
                None => state.positional.clone(),
            };
            state.loop_depth += 1;
            let mut status = 0;
            let mut result = Ok(0);
            'iter: for item in items {
                if let Err(e) = state.assign(&n.variable, &item) {
                    result = Err(Interrupt::Error(ShellError::ReadonlyVariable(e.name)));
                    break;
                }
                match run_loop_body(state, &n.body) {
                    BodyOutcome::Normal(s) => status = s,
                    BodyOutcome::Continue => continue,
                    BodyOutcome::Break => break 'iter,
                    BodyOutcome::Propagate(i) => {
                        result = Err(i);
                        break 'iter;
                    }
                }
            }
            state.loop_depth -= 1;
            result.map(|_| status)
        }

        CompoundCommandNode::CStyleFor(n) => {
            if let Some(init) = &n.init {
                if let Err(e) = expand::arith::eval(state, init) {
                    return command_error(state, expand::ExpandError::from(e).into());
                }
            }
            state.loop_depth += 1;
            let mut status = 0;
            let mut result = Ok(0);
            loop {
                if let Some(cond) = &n.condition {
                    match expand::arith::eval(state, cond) {
                        Ok(v) if v == 0 => break,
                        Ok(_) => {}
                        Err(e) => {
                            result = Err(Interrupt::Error(expand::ExpandError::from(e).into()));
                            break;
                        }
                    }
                }
                match run_loop_body(state, &n.body) {
                    BodyOutcome::Normal(s) => status = s,
                    BodyOutcome::Continue => {}
                    BodyOutcome::Break => break,
                    BodyOutcome::Propagate(i) => {
                        result = Err(i);
                        break;
                    }
                }
                if let Some(update) = &n.update {
                    if let Err(e) = expand::arith::eval(state, update) {
                        result = Err(Interrupt::Error(expand::ExpandError::from(e).into()));
                        break;
                    }
                }
            }
            state.loop_depth -= 1;
            result.map(|_| status)
        }

        CompoundCommandNode::Case(n) => execute_case(state, n),
        CompoundCommandNode::Select(n) => execute_select(state, n),
        CompoundCommandNode::Group(n) => execute_statements(state, &n.body, false),
        CompoundCommandNode::Subshell(n) => {
            let status = subshell::run_subshell(state, &n.body)?;
            state.set_status(status);
            Ok(state.last_status)
        }
    }
}

fn run_loop(
    state: &mut ShellState,
    mut check: impl FnMut(&mut ShellState) -> Exec<bool>,
    body: &[StatementNode],
) -> Exec {
    state.loop_depth += 1;
    let mut status = 0;
    let result = loop {
        match check(state) {
            Ok(true) => {}
            Ok(false) => break Ok(status),
            Err(i) => break Err(i),
        }
        match run_loop_body(state, body) {
            BodyOutcome::Normal(s) => status = s,
            BodyOutcome::Continue => continue,
            BodyOutcome::Break => break Ok(status),
            BodyOutcome::Propagate(i) => break Err(i),
        }
    };
    state.loop_depth -= 1;
    result
}

fn execute_case(state: &mut ShellState, n: &CaseNode) -> Exec {
    let subject = match expand::expand_word_single(state, &n.word) {
        Ok(s) => s,
        Err(e) => return command_error(state, e.into()),
    };

    let mut status = 0;
    let mut index = 0;
    'outer: while index < n.items.len() {
        let item = &n.items[index];
        let mut matched = false;
        for pattern_word in &item.patterns {
            let pattern_text = match expand::expand_word_to_pattern(state, pattern_word) {
                Ok(p) => p,
                Err(e) => return command_error(state, e.into()),
            };
            if expand::pattern::Pattern::new(&pattern_text).matches(&subject) {
                matched = true;
                break;
            }
        }
        if !matched {
            index += 1;
            continue;
        }

        // Run this arm, then follow ;; / ;& / ;;& semantics.
        loop {
            status = execute_statements(state, &n.items[index].body, false)?;
            match n.items[index].terminator {
                CaseTerminator::Break => break 'outer,
                CaseTerminator::FallThrough => {
                    index += 1;
                    if index >= n.items.len() {
                        break 'outer;
                    }
                    // Next body runs without a pattern test.
                }
                CaseTerminator::Continue => {
                    index += 1;
                    continue 'outer;
                }
            }
        }
    }
    Ok(status)
}

/// `select`: present the menu on stderr, read a reply, loop the body.
fn execute_select(state: &mut ShellState, n: &SelectNode) -> Exec {
    use std::io::{BufRead, Write};

    let items = match &n.words {
        Some(words) => match expand::expand_words(state, words) {
            Ok(items) => items,
            Err(e) => return command_error(state, e.into()),
        },
        None => state.positional.clone(),
    };

    state.loop_depth += 1;
    let mut status = 0;
    let mut result = Ok(0);
    'outer: loop {
        for (i, item) in items.iter().enumerate() {
            eprintln!("{}) {}", i + 1, item);
        }
        let ps3 = state.env.value("PS3").unwrap_or("#? ").to_string();
        eprint!("{}", ps3);
        let _ = std::io::stderr().flush();

        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let reply = line.trim().to_string();
        if reply.is_empty() {
            continue;
        }
        let _ = state.assign("REPLY", &reply);

        let chosen = reply
            .parse::<usize>()
            .ok()
            .and_then(|i| (1..=items.len()).contains(&i).then(|| items[i - 1].clone()))
            .unwrap_or_default();
        if let Err(e) = state.assign(&n.variable, &chosen) {
            result = Err(Interrupt::Error(ShellError::ReadonlyVariable(e.name)));
            break;
        }

        match run_loop_body(state, &n.body) {
            BodyOutcome::Normal(s) => status = s,
            BodyOutcome::Continue => continue,
            BodyOutcome::Break => break 'outer,
            BodyOutcome::Propagate(i) => {
                result = Err(i);
                break 'outer;
            }
        }
    }
    state.loop_depth -= 1;
    result.map(|_| status)
}

// ----------------------------------------------------------------------
// Traps
// ----------------------------------------------------------------------

/// Run a trap handler as shell code in the current context, preserving
/// `$?` around it.
pub fn run_trap_command(state: &mut ShellState, text: &str) {
    if state.running_trap {
        return;
    }
    let saved_status = state.last_status;
    state.running_trap = true;
    if let Ok(script) = crate::parser::parse(text) {
        let _ = execute_script(state, &script);
    }
    state.running_trap = false;
    state.last_status = saved_status;
}

pub fn run_trap_condition(state: &mut ShellState, condition: TrapCondition) {
    let Some(text) = state.trap_command(condition).map(String::from) else {
        return;
    };
    if !text.is_empty() {
        run_trap_command(state, &text);
    }
}

/// Deliver any signal traps that fired since the last check. Returns the
/// exit status when an untrapped termination signal arrived and the shell
/// should wind down.
pub fn run_pending_signal_traps(state: &mut ShellState) -> Option<i32> {
    let mut fatal = None;
    for sig in signal::take_pending_traps() {
        let condition = TrapCondition::Signal(sig);
        if state.trap_command(condition).is_some() {
            run_trap_condition(state, condition);
            state.caches.invalidate();
        } else if sig == libc::SIGTERM || sig == libc::SIGHUP {
            fatal = Some(128 + sig);
        }
    }
    fatal
}

fn run_err_trap(state: &mut ShellState) {
    if state.function_depth > 0 && !state.options.errtrace {
        return;
    }
    run_trap_condition(state, TrapCondition::Err);
}
