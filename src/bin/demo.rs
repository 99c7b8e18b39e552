//! Demo host loop for the cooperative scheduler.
//!
//! Registers a heartbeat main task and a blinking status indicator, stops
//! the blink halfway through, and prints a JSON snapshot of the scheduler
//! when the run ends. Tracing output goes to stderr.

use clap::Parser;
use coopsched::{
    CooperativeScheduler, SchedulerConfig, SystemClock, TaskContext, TaskId, TaskRegistry,
};
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Run a short cooperative scheduling session.
#[derive(Parser)]
#[command(name = "coopsched-demo", version, about)]
struct Cli {
    /// Path to TOML scheduler configuration file. Defaults to
    /// `~/.config/coopsched/config.toml` when that file exists.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Main task period in milliseconds.
    #[arg(long, default_value_t = 100)]
    main_period_ms: u64,

    /// Total run time in milliseconds.
    #[arg(long, default_value_t = 2000)]
    duration_ms: u64,

    /// Blink toggle interval in milliseconds.
    #[arg(long, default_value_t = 250)]
    blink_ms: u64,
}

/// Status indicator toggled by a cyclic task.
struct Blinker {
    lit: Rc<Cell<bool>>,
    toggles: Rc<Cell<u32>>,
    task: TaskId,
}

impl Blinker {
    fn new() -> Self {
        Self {
            lit: Rc::new(Cell::new(false)),
            toggles: Rc::new(Cell::new(0)),
            task: TaskId::INVALID,
        }
    }

    /// Start toggling every `interval`, replacing any running blink.
    fn start(&mut self, registry: &mut impl TaskRegistry, interval: Duration) {
        if self.task.is_valid() {
            self.reset(registry);
        }
        let lit = Rc::clone(&self.lit);
        let toggles = Rc::clone(&self.toggles);
        self.task = registry.add_cyclic_task(interval, move |_: &mut TaskContext<'_>| {
            lit.set(!lit.get());
            toggles.set(toggles.get() + 1);
            debug!("indicator {}", if lit.get() { "on" } else { "off" });
        });
        if !self.task.is_valid() {
            warn!("blink could not be scheduled");
        }
    }

    fn reset(&mut self, registry: &mut impl TaskRegistry) {
        registry.abort_task(self.task);
        self.task = TaskId::INVALID;
        self.lit.set(false);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("coopsched=info,coopsched_demo=info")),
        )
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(SchedulerConfig::default_config_path);
    let config = if config_path.exists() {
        info!("loading config from {}", config_path.display());
        SchedulerConfig::from_file(&config_path)?
    } else if cli.config.is_some() {
        anyhow::bail!("config file not found: {}", config_path.display());
    } else {
        SchedulerConfig::default()
    };

    let heartbeats = Rc::new(Cell::new(0_u64));
    let beat = Rc::clone(&heartbeats);
    let mut scheduler = CooperativeScheduler::with_config(
        config,
        SystemClock::new(),
        move |ctx: &mut TaskContext<'_>| {
            beat.set(beat.get() + 1);
            debug!("heartbeat {} at {:?}", beat.get(), ctx.now());
        },
        Duration::from_millis(cli.main_period_ms),
    )?;

    let active = scheduler.config();
    info!(
        "capacity {}, gc every {:?}, default timeout {:?}",
        active.max_tasks,
        active.gc_interval(),
        active.default_timeout()
    );

    let mut blinker = Blinker::new();
    blinker.start(&mut scheduler, Duration::from_millis(cli.blink_ms));

    let blink_task = blinker.task;
    let stop_at = Duration::from_millis(cli.duration_ms / 2);
    scheduler.add_one_shot_task(stop_at, move |ctx| {
        if ctx.abort_task(blink_task) {
            info!("blink task {blink_task} stopped");
        }
    });

    let deadline = Duration::from_millis(cli.duration_ms);
    let passes = scheduler.run_until(|s| s.now() >= deadline)?;

    info!(
        "ran {passes} passes: {} heartbeats, {} indicator toggles",
        heartbeats.get(),
        blinker.toggles.get()
    );
    println!("{}", serde_json::to_string_pretty(&scheduler.snapshot())?);

    blinker.reset(&mut scheduler);
    scheduler.shutdown();
    Ok(())
}
