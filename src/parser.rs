//! This module provides the parser for design files, utilizing the `pest` crate.
//! It defines the grammar for `.weave` files and functions to parse the input into a `Design`.

use crate::{
    analyzer::analyze,
    types::{
        Access, Boundary, ControlCell, Design, HeadAction, HeadSpec, MachineSpec,
        SimulationError, Symbol, TapeSpec, TransitionStatement, BLANK, MAX_DESIGN_SIZE,
    },
};
use pest::{
    error::{Error, ErrorVariant},
    iterators::{Pair, Pairs},
    Parser as PestParser, Span,
};
use pest_derive::Parser as PestParser;
use std::collections::HashSet;

/// Derives a `PestParser` for the design grammar defined in `grammar.pest`.
#[derive(PestParser)]
#[grammar = "grammar.pest"]
pub struct DesignParser;

/// Parses the given input string into a `Design`.
///
/// This is the main entry point for reading design files. The parsed design is analyzed
/// before being returned, so a successful result can be handed straight to
/// `Simulation::new`.
///
/// # Returns
///
/// * `Ok(Design)` if the input is successfully parsed and validated.
/// * `Err(SimulationError::ParseError)` if there are any syntax errors.
/// * `Err(SimulationError::ValidationError)` if the design fails validation.
pub fn parse(input: &str) -> Result<Design, SimulationError> {
    if input.len() > MAX_DESIGN_SIZE {
        return Err(SimulationError::ValidationError(format!(
            "Design is {} bytes, the limit is {}",
            input.len(),
            MAX_DESIGN_SIZE
        )));
    }

    let root = DesignParser::parse(Rule::design, input.trim())
        .map_err(|e| SimulationError::ParseError(e.into()))?
        .next()
        .ok_or_else(|| SimulationError::ValidationError("Empty design".to_string()))?;

    let design = parse_design(root)?;

    // Analyze the parsed design
    analyze(&design)?;

    Ok(design)
}

/// Parses the top-level structure of a design from a `Pair<Rule::design>`.
///
/// Sections may come in any order but each may appear only once. Machines are resolved last
/// because they refer to tapes by name and default their start state to the first state
/// block.
fn parse_design(pair: Pair<Rule>) -> Result<Design, SimulationError> {
    let mut name: Option<String> = None;
    let mut tapes: Option<Vec<TapeSpec>> = None;
    let mut machines: Option<Pair<Rule>> = None;
    let mut transitions: Option<(Vec<TransitionStatement>, Option<String>)> = None;
    let mut seen = HashSet::new();

    for p in pair.into_inner() {
        let span = p.as_span();
        let rule = p.as_rule();

        check_unique_rule(rule, span, &mut seen)?;

        match rule {
            Rule::name => name = Some(p.as_str().trim_start_matches("name:").trim().to_string()),
            Rule::tapes => tapes = Some(parse_tapes(p)?),
            Rule::machines => machines = Some(p),
            Rule::rules => transitions = Some(parse_rules(p)?),
            _ => {} // EOI
        }
    }

    let name = check_required_rule(name, "name")?;
    let tapes = check_required_rule(tapes, "tapes")?;
    let (transitions, first_state) = check_required_rule(transitions, "rules")?;
    let machines = parse_machines(
        check_required_rule(machines, "machines")?,
        &tapes,
        first_state.as_deref(),
    )?;

    Ok(Design {
        name,
        tapes,
        machines,
        transitions,
    })
}

/// Parses tape definitions from a `Pair<Rule::tapes>`.
fn parse_tapes(pair: Pair<Rule>) -> Result<Vec<TapeSpec>, SimulationError> {
    let mut tapes: Vec<TapeSpec> = Vec::new();

    // Rule: tapes > [tape > identifier, boundary, content?]
    for tape_pair in pair.into_inner() {
        let span = tape_pair.as_span();
        let mut pairs = tape_pair.into_inner();
        let name = next_pair(&mut pairs, span)?.as_str().to_string();
        let boundary = parse_boundary(next_pair(&mut pairs, span)?)?;
        let content = pairs
            .next()
            .map(|p| unquote(p.as_str()).to_string())
            .unwrap_or_default();

        if tapes.iter().any(|tape| tape.name == name) {
            return Err(parse_error(&format!("Duplicate tape: {name}"), span));
        }

        tapes.push(TapeSpec {
            name,
            boundary,
            content,
        });
    }

    Ok(tapes)
}

/// Parses a boundary policy from a `Pair<Rule::boundary>`.
fn parse_boundary(pair: Pair<Rule>) -> Result<Boundary, SimulationError> {
    let span = pair.as_span();
    let policy = next_pair(&mut pair.into_inner(), span)?;
    let rule = policy.as_rule();

    let length = match policy.into_inner().next() {
        Some(length) => Some(parse_number::<usize>(length)?),
        None => None,
    };

    match (rule, length) {
        (Rule::infinite, _) => Ok(Boundary::Infinite),
        (Rule::left, _) => Ok(Boundary::LeftLimited),
        (Rule::right, Some(length)) => Ok(Boundary::RightLimited { length }),
        (Rule::bounded, Some(length)) => Ok(Boundary::LeftRightLimited { length }),
        (Rule::circular, Some(length)) => Ok(Boundary::Circular { length }),
        _ => Err(parse_error("Unsupported boundary", span)),
    }
}

/// Parses machine definitions from a `Pair<Rule::machines>`.
///
/// Tape names are resolved against `tapes`. A machine without a `start:` field starts in
/// `default_start`, the first state block of the rules.
fn parse_machines(
    pair: Pair<Rule>,
    tapes: &[TapeSpec],
    default_start: Option<&str>,
) -> Result<Vec<MachineSpec>, SimulationError> {
    let mut machines: Vec<MachineSpec> = Vec::new();

    for machine_pair in pair.into_inner() {
        let span = machine_pair.as_span();
        let mut pairs = machine_pair.into_inner();
        let name = next_pair(&mut pairs, span)?.as_str().to_string();

        if machines.iter().any(|machine| machine.name == name) {
            return Err(parse_error(&format!("Duplicate machine: {name}"), span));
        }

        let mut initial_state: Option<String> = None;
        let mut control: Option<ControlCell> = None;
        let mut heads: Option<Vec<HeadSpec>> = None;
        let mut seen = HashSet::new();

        for field in pairs {
            let field_span = field.as_span();
            if !seen.insert(field.as_rule()) {
                return Err(parse_error(
                    &format!("Duplicate \"{:?}:\" field in machine {name}", field.as_rule()),
                    field_span,
                ));
            }

            match field.as_rule() {
                Rule::start => {
                    initial_state =
                        Some(next_pair(&mut field.into_inner(), field_span)?.as_str().to_string())
                }
                Rule::control => control = Some(parse_control(field, tapes)?),
                Rule::heads => heads = Some(parse_heads(field, tapes)?),
                _ => {}
            }
        }

        let initial_state = initial_state
            .or_else(|| default_start.map(str::to_string))
            .ok_or_else(|| parse_error(&format!("Machine {name} has no start state"), span))?;
        let heads =
            heads.ok_or_else(|| parse_error(&format!("Machine {name} has no heads"), span))?;

        machines.push(MachineSpec {
            name,
            initial_state,
            heads,
            control,
        });
    }

    Ok(machines)
}

/// Parses a `control: tape[position]` field.
fn parse_control(pair: Pair<Rule>, tapes: &[TapeSpec]) -> Result<ControlCell, SimulationError> {
    let span = pair.as_span();
    let mut pairs = pair.into_inner();
    let tape = resolve_tape(next_pair(&mut pairs, span)?, tapes)?;
    let position = parse_number(next_pair(&mut pairs, span)?)?;

    Ok(ControlCell { tape, position })
}

/// Parses a `heads: tape@position access, ...` field.
///
/// The access defaults to read-write when omitted.
fn parse_heads(pair: Pair<Rule>, tapes: &[TapeSpec]) -> Result<Vec<HeadSpec>, SimulationError> {
    let mut heads = Vec::new();

    // Rule: heads > [head > identifier, integer, access?]
    for head_pair in pair.into_inner() {
        let span = head_pair.as_span();
        let mut pairs = head_pair.into_inner();
        let tape = resolve_tape(next_pair(&mut pairs, span)?, tapes)?;
        let position = parse_number(next_pair(&mut pairs, span)?)?;
        let access = match pairs.next().map(|p| p.as_str()) {
            Some("ro") => Access::ReadOnly,
            Some("wo") => Access::WriteOnly,
            _ => Access::ReadWrite,
        };

        heads.push(HeadSpec {
            tape,
            access,
            position,
        });
    }

    Ok(heads)
}

/// Parses the rules section from a `Pair<Rule::rules>`.
///
/// Returns the transition statements in source order along with the first state block's
/// name. A state may only have one block.
fn parse_rules(
    pair: Pair<Rule>,
) -> Result<(Vec<TransitionStatement>, Option<String>), SimulationError> {
    let mut statements = Vec::new();
    let mut first_state = None;
    let mut states = HashSet::new();

    for block in pair.into_inner() {
        let span = block.as_span();
        let mut pairs = block.into_inner();
        let state = next_pair(&mut pairs, span)?.as_str().to_string();

        // Prevent duplicated state blocks
        if !states.insert(state.clone()) {
            return Err(parse_error(
                &format!("Duplicate transition rule: {state}"),
                span,
            ));
        }

        if first_state.is_none() {
            first_state = Some(state.clone());
        }

        for action in pairs {
            let action_span = action.as_span();
            let inner = next_pair(&mut action.into_inner(), action_span)?;
            let (actions, target) = match inner.as_rule() {
                Rule::multi_action => parse_multi_head_action(inner)?,
                _ => parse_single_head_action(inner)?,
            };

            statements.push(TransitionStatement {
                source: state.clone(),
                target,
                actions,
            });
        }
    }

    Ok((statements, first_state))
}

/// Parses `read -> write, move, next` or `read, move, next` (write equals read).
fn parse_single_head_action(
    pair: Pair<Rule>,
) -> Result<(Vec<HeadAction>, String), SimulationError> {
    let span = pair.as_span();
    let parts: Vec<Pair<Rule>> = pair.into_inner().collect();

    let (read, write, movement, target) = match parts.as_slice() {
        [read, movement, target] => (read, read, movement, target),
        [read, write, movement, target] => (read, write, movement, target),
        _ => return Err(parse_error("Malformed action", span)),
    };

    Ok((
        vec![HeadAction {
            read: parse_symbol(read.as_str()),
            write: parse_symbol(write.as_str()),
            movement: parse_movement(movement.clone())?,
        }],
        target.as_str().to_string(),
    ))
}

/// Parses `[r1, r2] -> [w1, w2], [m1, m2], next`.
///
/// The three lists must have the same length.
fn parse_multi_head_action(
    pair: Pair<Rule>,
) -> Result<(Vec<HeadAction>, String), SimulationError> {
    let span = pair.as_span();
    let mut pairs = pair.into_inner();

    let reads = parse_symbols(next_pair(&mut pairs, span)?);
    let writes = parse_symbols(next_pair(&mut pairs, span)?);
    let movements = next_pair(&mut pairs, span)?
        .into_inner()
        .map(parse_movement)
        .collect::<Result<Vec<_>, _>>()?;
    let target = next_pair(&mut pairs, span)?.as_str().to_string();

    // Validate that all lists have the same length
    if reads.len() != writes.len() || reads.len() != movements.len() {
        return Err(parse_error(
            &format!(
                "Inconsistent multi-head action: read={}, write={}, moves={}",
                reads.len(),
                writes.len(),
                movements.len()
            ),
            span,
        ));
    }

    let actions = reads
        .into_iter()
        .zip(writes)
        .zip(movements)
        .map(|((read, write), movement)| HeadAction {
            read,
            write,
            movement,
        })
        .collect();

    Ok((actions, target))
}

/// Parses a list of symbols from a `Pair<Rule::symbols>`.
fn parse_symbols(pair: Pair<Rule>) -> Vec<Symbol> {
    pair.into_inner()
        .map(|symbol| parse_symbol(symbol.as_str()))
        .collect()
}

/// Parses a move from a `Pair<Rule::movement>`.
///
/// Supports 'L' for one cell left, 'R' for one cell right, 'S' for stay, and signed integers
/// for larger jumps.
fn parse_movement(pair: Pair<Rule>) -> Result<i64, SimulationError> {
    match pair.as_str() {
        "L" => Ok(-1),
        "R" => Ok(1),
        "S" => Ok(0),
        _ => parse_number(pair),
    }
}

/// Parses a single character symbol from a string, handling quoted and unquoted symbols.
fn parse_symbol(input: &str) -> Symbol {
    let inner = input
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(input);
    inner.chars().next().unwrap_or(BLANK)
}

/// Parses a number from the text of a `Pair`.
fn parse_number<T: std::str::FromStr>(pair: Pair<Rule>) -> Result<T, SimulationError> {
    pair.as_str()
        .parse::<T>()
        .map_err(|_| parse_error(&format!("Invalid number: {}", pair.as_str()), pair.as_span()))
}

/// Resolves a tape name to its index.
fn resolve_tape(pair: Pair<Rule>, tapes: &[TapeSpec]) -> Result<usize, SimulationError> {
    tapes
        .iter()
        .position(|tape| tape.name == pair.as_str())
        .ok_or_else(|| parse_error(&format!("Unknown tape: {}", pair.as_str()), pair.as_span()))
}

/// Strips the surrounding double quotes of tape content.
fn unquote(input: &str) -> &str {
    input
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(input)
}

/// Takes the next inner pair, reporting a parse error at `span` if the grammar produced fewer
/// pairs than expected.
fn next_pair<'i>(
    pairs: &mut Pairs<'i, Rule>,
    span: Span<'i>,
) -> Result<Pair<'i, Rule>, SimulationError> {
    pairs
        .next()
        .ok_or_else(|| parse_error("Unexpected end of definition", span))
}

/// Creates a `SimulationError::ParseError` from a message and a `Span`.
fn parse_error(msg: &str, span: Span) -> SimulationError {
    SimulationError::ParseError(Box::new(Error::new_from_span(
        ErrorVariant::CustomError {
            message: msg.to_string(),
        },
        span,
    )))
}

/// Checks if a given section has already been declared, ensuring uniqueness for top-level
/// sections.
fn check_unique_rule(
    rule: Rule,
    span: Span,
    seen: &mut HashSet<Rule>,
) -> Result<(), SimulationError> {
    if !matches!(rule, Rule::name | Rule::tapes | Rule::machines | Rule::rules) {
        return Ok(());
    };

    if !seen.insert(rule) {
        return Err(parse_error(
            &format!("Duplicate \"{rule:?}:\" declaration"),
            span,
        ));
    }

    Ok(())
}

/// Checks if a required section is present, returning an `Err` if it's missing.
fn check_required_rule<T>(value: Option<T>, name: &str) -> Result<T, SimulationError> {
    value.ok_or_else(|| SimulationError::ValidationError(format!("Missing '{name}' section")))
}
