use tapeweave::{
    parse, DesignCatalog, Halt, RunOutcome, Simulation, SimulationError, Status, Step,
    WriteConflict, DEFAULT_STEP_LIMIT,
};

fn builtin(name: &str) -> Simulation {
    Simulation::new(DesignCatalog::by_name(name).unwrap()).unwrap()
}

fn content(simulation: &Simulation, tape: usize) -> String {
    simulation.tapes().get(tape).unwrap().content()
}

#[test]
fn unary_increment_appends_one_mark() {
    let mut simulation = builtin("Unary Increment");

    let outcome = simulation.run(DEFAULT_STEP_LIMIT);

    assert_eq!(outcome, RunOutcome::Halted { ticks: 5 });
    assert_eq!(content(&simulation, 0), "1111");
    assert_eq!(simulation.machine(0).unwrap().state(), "S1");
}

#[test]
fn binary_increment_carries() {
    let mut simulation = builtin("Binary Increment");

    assert_eq!(simulation.run(DEFAULT_STEP_LIMIT), RunOutcome::Halted { ticks: 9 });
    assert_eq!(content(&simulation, 0), "1100");

    simulation.set_tape_content(0, "111").unwrap();
    simulation.run(DEFAULT_STEP_LIMIT);
    assert_eq!(content(&simulation, 0), "1000");
    assert_eq!(simulation.tapes().get(0).unwrap().written_extent(), Some((-1, 2)));
}

#[test]
fn copy_uses_read_only_and_write_only_heads() {
    let mut simulation = builtin("Tape Copy");

    assert_eq!(simulation.run(DEFAULT_STEP_LIMIT), RunOutcome::Halted { ticks: 5 });
    assert_eq!(content(&simulation, 0), "abba");
    assert_eq!(content(&simulation, 1), "abba");

    // The source head stops on the end marker.
    assert_eq!(
        simulation.machine(0).unwrap().status(),
        &Status::Halted(Halt::NoTransition {
            state: "copy".to_string(),
            read: "</".to_string()
        })
    );
}

#[test]
fn handshake_reader_waits_for_running_signal() {
    let mut simulation = builtin("Handshake");

    let tick = simulation.step();
    assert_eq!(tick.steps, vec![Step::Continue, Step::Paused]);

    let tick = simulation.step();
    assert_eq!(tick.steps, vec![Step::Continue, Step::Paused]);
    assert_eq!(content(&simulation, 1), "hi");
    assert_eq!(content(&simulation, 0), "!");

    let outcome = simulation.run(DEFAULT_STEP_LIMIT);
    assert_eq!(outcome, RunOutcome::Halted { ticks: 4 });
    assert_eq!(simulation.tick_count(), 6);

    let reader = simulation.machine(1).unwrap();
    assert_eq!(reader.state(), "done");
    assert_eq!(reader.step_count(), 3);
    assert_eq!(reader.heads()[0].position(), 2);
}

#[test]
fn circular_sweep_wraps_around() {
    let mut simulation = builtin("Circular Sweep");

    assert_eq!(simulation.run(DEFAULT_STEP_LIMIT), RunOutcome::Halted { ticks: 4 });
    assert_eq!(content(&simulation, 0), "ABC");
    assert_eq!(simulation.machine(0).unwrap().heads()[0].position(), 0);
}

#[test]
fn collision_halts_both_painters() {
    let mut simulation = builtin("Collision");

    assert_eq!(simulation.run(DEFAULT_STEP_LIMIT), RunOutcome::Halted { ticks: 2 });
    assert_eq!(content(&simulation, 0), "x_o");

    let conflict = WriteConflict {
        tape: 0,
        position: 1,
        contenders: vec![(0, 0), (1, 0)],
    };
    for machine in simulation.machines() {
        assert_eq!(
            machine.status(),
            &Status::Halted(Halt::WriteConflict(vec![conflict.clone()]))
        );
    }
}

#[test]
fn runaway_design_hits_the_step_limit() {
    let design = parse(
        r#"
name: Runaway
tapes:
  t: infinite
machines:
  m:
    heads: t@0
rules:
  go:
    _ -> 1, R, go
"#,
    )
    .unwrap();
    let mut simulation = Simulation::new(design).unwrap();

    let outcome = simulation.run(50);

    assert_eq!(outcome, RunOutcome::StepLimitExceeded { limit: 50 });
    assert_eq!(
        outcome.into_result(),
        Err(SimulationError::StepLimitExceeded(50))
    );
    assert_eq!(content(&simulation, 0), "1".repeat(50));

    // A later run picks up where the previous one stopped.
    assert_eq!(simulation.run(10), RunOutcome::StepLimitExceeded { limit: 10 });
    assert_eq!(simulation.tick_count(), 60);
}

#[test]
fn halt_signal_stops_a_watching_machine() {
    let design = parse(
        r#"
name: Stop Signal
tapes:
  ctl: bounded(1)
  work: infinite
machines:
  boss:
    start: b0
    heads: ctl@0
  worker:
    start: w
    control: ctl[0]
    heads: work@0
rules:
  b0:
    _ -> ^, S, b1
  w:
    _ -> 1, R, w
"#,
    )
    .unwrap();
    let mut simulation = Simulation::new(design).unwrap();

    let outcome = simulation.run(DEFAULT_STEP_LIMIT);

    // Tick 1: the boss writes the halt; tick 2: the boss has no rule and the worker reads it.
    assert_eq!(outcome, RunOutcome::Halted { ticks: 2 });
    assert_eq!(simulation.machine(1).unwrap().status(), &Status::Halted(Halt::Signal));
    assert_eq!(content(&simulation, 1), "1");
}

#[test]
fn snapshot_serializes_to_json() {
    let mut simulation = builtin("Tape Copy");
    simulation.run(DEFAULT_STEP_LIMIT);

    let snapshot = simulation.snapshot();
    let json = serde_json::to_value(&snapshot).unwrap();

    assert_eq!(json["tick"], 5);
    assert_eq!(json["tapes"][0]["name"], "source");
    assert_eq!(json["tapes"][0]["segments"][0]["start"], -1);
    assert_eq!(json["tapes"][0]["segments"][0]["cells"], ">abba<");
    assert_eq!(json["machines"][0]["heads"][1]["access"], "WriteOnly");
}
