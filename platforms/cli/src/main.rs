use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{self, Read};
use std::path::PathBuf;
use tapeweave::simulation::{RunOutcome, Simulation, Snapshot};
use tapeweave::{Design, DesignCatalog, DesignLoader, Status, DEFAULT_STEP_LIMIT};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// The design file to run. Reads standard input when omitted and piped
    design: Option<PathBuf>,

    /// Run a built-in design by name instead of a file
    #[clap(short, long, conflicts_with = "design")]
    builtin: Option<String>,

    /// List the built-in designs, optionally only those whose name contains QUERY, and exit
    #[clap(short, long, value_name = "QUERY", num_args = 0..=1, default_missing_value = "")]
    list: Option<String>,

    /// Print the source of the built-in design given with --builtin and exit
    #[clap(long, requires = "builtin")]
    source: bool,

    /// Replace the initial content of a tape, as TAPE=CONTENT
    #[clap(short, long)]
    input: Vec<String>,

    /// Maximum number of ticks to run
    #[clap(short, long, default_value_t = DEFAULT_STEP_LIMIT)]
    steps: usize,

    /// Print the tapes and machines after every tick
    #[clap(short = 'd', long)]
    debug: bool,

    /// Print the final snapshot as JSON
    #[clap(long)]
    json: bool,

    /// Log filter, e.g. "info" or "tapeweave=debug"
    #[clap(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(io::stderr))
        .init();

    if let Some(query) = &cli.list {
        list_builtins(query);
        return Ok(());
    }

    if cli.source {
        if let Some(name) = &cli.builtin {
            print!("{}", builtin_source(name)?);
        }
        return Ok(());
    }

    let design = load_design(&cli)?;
    let mut simulation = Simulation::new(design).context("Failed to build simulation")?;

    for input in &cli.input {
        let (name, content) = input
            .split_once('=')
            .with_context(|| format!("Invalid input '{}', expected TAPE=CONTENT", input))?;
        let tape = simulation
            .design()
            .tape_index(name)
            .with_context(|| format!("Unknown tape '{}'", name))?;
        simulation.set_tape_content(tape, content)?;
    }

    let outcome = if cli.debug {
        print_snapshot(&simulation.snapshot());
        run_verbose(&mut simulation, cli.steps)
    } else {
        simulation.run(cli.steps)
    };

    let snapshot = simulation.snapshot();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        if cli.debug {
            println!("\nFinal tapes:");
        }
        for tape in simulation.tapes().iter() {
            let name = simulation
                .design()
                .tapes
                .get(tape.id())
                .map_or("", |spec| spec.name.as_str());
            println!("{}: {}", name, tape.content());
        }
    }

    let ticks = outcome
        .into_result()
        .context("Simulation did not halt")?;
    if !cli.json {
        println!("\nHalted after {} ticks.", ticks);
    }

    Ok(())
}

/// Loads the design from a file path, a built-in name or piped standard input.
fn load_design(cli: &Cli) -> Result<Design> {
    if let Some(path) = &cli.design {
        DesignLoader::load_design(path)
            .with_context(|| format!("Failed to load design '{}'", path.display()))
    } else if let Some(name) = &cli.builtin {
        DesignCatalog::by_name(name).with_context(|| {
            format!("Available designs: {}", DesignCatalog::names().join(", "))
        })
    } else if atty::isnt(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        Ok(DesignLoader::load_design_from_string(&buffer)?)
    } else {
        bail!("No design given. Pass a file, pipe one in, or use --builtin (see --list)")
    }
}

fn list_builtins(query: &str) {
    for index in DesignCatalog::search(query) {
        if let Ok(info) = DesignCatalog::info(index) {
            println!(
                "{:<20} {} tapes, {} machines, {} states, {} transitions",
                info.name,
                info.tape_count,
                info.machine_count,
                info.state_count,
                info.transition_count
            );
        }
    }
}

/// Looks up the embedded text of a built-in design by name, ignoring case.
fn builtin_source(name: &str) -> Result<&'static str> {
    let index = DesignCatalog::names()
        .iter()
        .position(|candidate| candidate.eq_ignore_ascii_case(name))
        .with_context(|| format!("Design '{}' not found", name))?;

    Ok(DesignCatalog::text_by_index(index)?)
}

/// Steps one tick at a time, printing every tick.
fn run_verbose(simulation: &mut Simulation, step_limit: usize) -> RunOutcome {
    let mut ticks = 0;

    while !simulation.is_halted() {
        if ticks == step_limit {
            return RunOutcome::StepLimitExceeded { limit: step_limit };
        }

        let tick = simulation.step();
        ticks += 1;

        for conflict in &tick.conflicts {
            println!(
                "  conflict on tape {} at {} between {:?}",
                conflict.tape, conflict.position, conflict.contenders
            );
        }
        for rejected in &tick.rejected {
            println!(
                "  machine {} head {} could not write '{}': {}",
                rejected.machine, rejected.head, rejected.content, rejected.error
            );
        }

        print_snapshot(&simulation.snapshot());
    }

    RunOutcome::Halted { ticks }
}

fn print_snapshot(snapshot: &Snapshot) {
    println!("Tick: {}", snapshot.tick);

    for tape in &snapshot.tapes {
        let segments = tape
            .segments
            .iter()
            .map(|segment| format!("{:>4} | {}", segment.start, segment.cells))
            .collect::<Vec<String>>()
            .join("  ..  ");
        println!("  {:<10} {}", tape.name, segments);
    }

    for machine in &snapshot.machines {
        let status = match &machine.status {
            Status::Running => "running".to_string(),
            Status::Paused => "paused".to_string(),
            Status::Halted(halt) => format!("halted ({:?})", halt),
        };
        let heads = machine
            .heads
            .iter()
            .map(|head| format!("{}@{} {}", head.tape, head.position, head.access))
            .collect::<Vec<String>>()
            .join(", ");

        println!(
            "  {:<10} state: {}, {}, heads: [{}]",
            machine.name, machine.state, status, heads
        );
    }
}
