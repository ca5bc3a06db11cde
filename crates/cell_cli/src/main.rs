use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use cell_control::{suggest_hint, AiController, CommandSource, HintFollower};
use cell_core::{
    compute_metrics, integer_position, Color, CommandEnvelope, Event, EventEnvelope, EventLevel,
    LevelDef, MatchContent, MatchMode, MatchState,
};
use cell_world::{
    build_initial_state, generate_skirmish, level_from_history, load_content, load_history,
    match_rng, save_history, setup_for_mode,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "cell_cli", about = "Cell Expansion War headless runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Green follows hints, red is the AI planner.
    Single,
    /// Both sides alternate turns on one machine.
    Local,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one match to completion with scripted players.
    Run {
        #[arg(long, default_value = "Level 1", conflicts_with_all = ["skirmish", "resume"])]
        level: String,
        /// Play a generated level with this many nodes per side.
        #[arg(long, conflicts_with = "resume")]
        skirmish: Option<usize>,
        /// Start from the final board of a saved match history.
        #[arg(long)]
        resume: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "single")]
        mode: ModeArg,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "./content")]
        content_dir: String,
        /// Stop after this many ticks even if the match is still running.
        #[arg(long)]
        max_ticks: Option<u64>,
        #[arg(long, default_value_t = 250)]
        print_every: u64,
        #[arg(long, default_value = "normal", value_parser = ["normal", "debug"])]
        event_level: String,
        /// Write the match history here when the match ends.
        #[arg(long)]
        history_out: Option<PathBuf>,
        /// Write a metrics CSV row every `print_every` ticks.
        #[arg(long)]
        metrics_out: Option<PathBuf>,
    },
    /// Print the suggested move for a side on a level's opening board.
    Hint {
        #[arg(long, default_value = "Level 1")]
        level: String,
        #[arg(long, default_value = "green", value_parser = ["green", "red"])]
        color: String,
        #[arg(long, default_value = "./content")]
        content_dir: String,
    },
    /// List the shipped levels.
    Levels {
        #[arg(long, default_value = "./content")]
        content_dir: String,
    },
}

struct RunOptions {
    mode: ModeArg,
    seed: u64,
    max_ticks: Option<u64>,
    print_every: u64,
    event_level: EventLevel,
    history_out: Option<PathBuf>,
    metrics_out: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn resolve_level(
    content: &MatchContent,
    level: &str,
    skirmish: Option<usize>,
    resume: Option<&Path>,
    seed: u64,
) -> Result<LevelDef> {
    if let Some(path) = resume {
        let history = load_history(path)?;
        return Ok(level_from_history(content, &history));
    }
    if let Some(per_side) = skirmish {
        if per_side == 0 {
            bail!("--skirmish needs at least one node per side");
        }
        // Offset keeps the layout draw independent of the match id draw.
        return Ok(generate_skirmish(
            content,
            per_side,
            &mut match_rng(seed.wrapping_add(1)),
        ));
    }
    content
        .level(level)
        .cloned()
        .with_context(|| format!("unknown level {level:?}"))
}

/// Scripted players for the headless runner. In single-player mode both
/// sides act when red's planner wakes; in local mode whoever holds the turn
/// acts as soon as it is handed to them.
struct Players {
    ai: AiController,
    human: HintFollower,
    next_command_id: u64,
}

impl Players {
    fn new() -> Self {
        Self {
            ai: AiController { color: Color::Red },
            human: HintFollower {
                color: Color::Green,
            },
            next_command_id: 0,
        }
    }

    fn respond(
        &mut self,
        state: &MatchState,
        content: &MatchContent,
        events: &[EventEnvelope],
    ) -> Vec<CommandEnvelope> {
        let mut commands = Vec::new();
        for event in events {
            match event.event {
                Event::PlannerWake { color: Color::Red } => {
                    commands.extend(self.ai.generate_commands(
                        state,
                        content,
                        &mut self.next_command_id,
                    ));
                    commands.extend(self.human.generate_commands(
                        state,
                        content,
                        &mut self.next_command_id,
                    ));
                }
                Event::TurnChanged { color, .. } => {
                    let source: &mut dyn CommandSource = match color {
                        Color::Red => &mut self.ai,
                        Color::Green => &mut self.human,
                    };
                    commands.extend(source.generate_commands(
                        state,
                        content,
                        &mut self.next_command_id,
                    ));
                }
                _ => {}
            }
        }
        commands
    }
}

fn run(content: &MatchContent, level: &LevelDef, options: &RunOptions) -> Result<()> {
    let seed = options.seed;
    let mode = match options.mode {
        ModeArg::Single => MatchMode::Single,
        ModeArg::Local => MatchMode::LocalTwoPlayer,
    };
    let mut state = build_initial_state(
        content,
        level,
        setup_for_mode(mode),
        seed,
        &mut match_rng(seed),
    );

    let mut metrics_file = match &options.metrics_out {
        Some(path) => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            cell_core::metrics::write_metrics_header(&mut file)
                .with_context(|| format!("writing {}", path.display()))?;
            Some(file)
        }
        None => None,
    };

    let mut players = Players::new();
    let mut pending = Vec::new();
    let mut final_history = None;

    println!(
        "Starting match: level={:?} mode={mode:?} seed={seed} nodes={} match_id={}",
        state.meta.level,
        state.nodes.len(),
        state.meta.match_id,
    );
    println!("{}", "-".repeat(80));

    while state.outcome.is_none() {
        if options
            .max_ticks
            .is_some_and(|limit| state.meta.tick >= limit)
        {
            println!("Tick limit reached before the match ended.");
            break;
        }

        let events = cell_core::tick(&mut state, &pending, content, options.event_level);
        pending = players.respond(&state, content, &events);

        for event in &events {
            print_notable(&state, event);
            if let Event::MatchEnded { history, .. } = &event.event {
                final_history = Some(history.clone());
            }
        }

        if state.meta.tick % options.print_every == 0 {
            print_status(&state);
            if let Some(file) = metrics_file.as_mut() {
                cell_core::metrics::append_metrics_row(file, &compute_metrics(&state))
                    .context("writing metrics row")?;
            }
        }
    }

    println!("{}", "-".repeat(80));
    println!("Done at tick {}:", state.meta.tick);
    print_status(&state);

    if let Some(file) = metrics_file.as_mut() {
        file.flush().context("final metrics flush")?;
    }

    if let (Some(path), Some(history), Some(outcome)) =
        (&options.history_out, &final_history, &state.outcome)
    {
        save_history(path, history)?;
        println!(
            "History written to {} ({} moves, winner {}).",
            path.display(),
            history.events.len(),
            outcome.winner()
        );
    }

    Ok(())
}

fn print_notable(state: &MatchState, event: &EventEnvelope) {
    match &event.event {
        Event::NodeCaptured {
            node,
            previous,
            color,
        } => println!(
            "*** node {node} captured by {color} from {previous} at {:.1}s ***",
            event.at_ms as f64 / 1000.0
        ),
        Event::NodePlaced {
            node,
            color,
            node_type,
        } => println!("*** {color} placed {node_type:?} node {node} ***"),
        Event::MatchEnded { outcome, .. } => println!(
            "*** {}: {} (tick {}) ***",
            outcome.title, outcome.message, state.meta.tick
        ),
        _ => {}
    }
}

fn print_status(state: &MatchState) {
    let m = compute_metrics(state);
    let turn = state
        .turn
        .current_player()
        .map_or_else(|| "free".to_string(), |c| format!("{c}#{}", state.turn.turn_number));
    println!(
        "[tick={tick:05}  t={secs:5.1}s  left={left:3}s  turn={turn}]  \
         green: nodes={gn:2} units={gu:3} links={gc}  \
         red: nodes={rn:2} units={ru:3} links={rc}  in_transit={transit}",
        tick = m.tick,
        secs = m.now_ms as f64 / 1000.0,
        left = m.seconds_left,
        gn = m.nodes(Color::Green),
        gu = m.units(Color::Green),
        gc = m.connections(Color::Green),
        rn = m.nodes(Color::Red),
        ru = m.units(Color::Red),
        rc = m.connections(Color::Red),
        transit = m.units_in_transit,
    );
}

// ---------------------------------------------------------------------------
// Hint and level listing
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HintOutput<'a> {
    level: &'a str,
    color: Color,
    from: Option<[i32; 2]>,
    to: Option<[i32; 2]>,
    #[serde(flatten)]
    planned: Option<cell_control::PlannedMove>,
}

fn hint(content: &MatchContent, level: &str, color: Color) -> Result<()> {
    let def = content
        .level(level)
        .with_context(|| format!("unknown level {level:?}"))?;
    let state = build_initial_state(
        content,
        def,
        setup_for_mode(MatchMode::Single),
        0,
        &mut match_rng(0),
    );
    let planned = suggest_hint(&state, &content.constants, color);
    let at = |id: cell_core::NodeId| integer_position(state.nodes[id.0].position);
    let output = HintOutput {
        level,
        color,
        from: planned.map(|p| at(p.source)),
        to: planned.map(|p| at(p.target)),
        planned,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("serializing hint")?
    );
    Ok(())
}

fn list_levels(content: &MatchContent) {
    println!("content_version={}", content.content_version);
    for level in &content.levels {
        let count = |color: Color| level.nodes.iter().filter(|n| n.color == color).count();
        println!(
            "{:<10} nodes={:2}  green={}  red={}",
            level.name,
            level.nodes.len(),
            count(Color::Green),
            count(Color::Red),
        );
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            level,
            skirmish,
            resume,
            mode,
            seed,
            content_dir,
            max_ticks,
            print_every,
            event_level,
            history_out,
            metrics_out,
        } => {
            let content = load_content(&content_dir)?;
            let seed = seed.unwrap_or_else(rand::random);
            let level = resolve_level(&content, &level, skirmish, resume.as_deref(), seed)?;
            let options = RunOptions {
                mode,
                seed,
                max_ticks,
                print_every: print_every.max(1),
                event_level: match event_level.as_str() {
                    "debug" => EventLevel::Debug,
                    _ => EventLevel::Normal,
                },
                history_out,
                metrics_out,
            };
            run(&content, &level, &options)?;
        }
        Commands::Hint {
            level,
            color,
            content_dir,
        } => {
            let content = load_content(&content_dir)?;
            let color = if color == "red" {
                Color::Red
            } else {
                Color::Green
            };
            hint(&content, &level, color)?;
        }
        Commands::Levels { content_dir } => {
            let content = load_content(&content_dir)?;
            list_levels(&content);
        }
    }
    Ok(())
}
