use crate::config::LoadedConfig;
use crate::planner::{build_grid, set_hour_note, toggle_block, BlockFlags, PlannerGrid};
use crate::schedule::{blocks_per_cycle, format_hour_label, BlockKey, HOURS_PER_CYCLE};
use crate::settings::{save_sleep_settings, SleepSettings};
use crate::storage::{init_project_store, locate_store, FileStore};
use crate::ui;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveTime};
use std::env;
use std::path::PathBuf;

/// Startup context shared by every command.
pub struct AppContext {
    pub config: LoadedConfig,
    pub store_path: Option<PathBuf>,
}

pub fn init() -> Result<()> {
    let cwd = env::current_dir()?;
    let location = init_project_store(&cwd)?;
    println!("Initialized planner at {}", location.path.display());
    Ok(())
}

pub fn show(ctx: &AppContext) -> Result<()> {
    let store = open_store(ctx)?;
    let now = Local::now();
    let grid = build_grid(&store, &ctx.config.config, &now);
    println!(
        "Planner ({}) {}",
        store.location().scope.label(),
        store.location().path.display()
    );
    println!(
        "Sleep {}-{}  now {}  block {}",
        format_hour_label(grid.sleep.start),
        format_hour_label(grid.sleep.end),
        now.format("%H:%M"),
        grid.current_index
    );
    println!();
    for line in grid_lines(&grid) {
        println!("{}", line);
    }
    println!();
    println!("legend: # planned  > now  z sleep  . past");
    Ok(())
}

pub fn now(ctx: &AppContext) -> Result<()> {
    let store = open_store(ctx)?;
    let now = Local::now();
    let config = &ctx.config.config;
    let grid = build_grid(&store, config, &now);
    let key = BlockKey::at(&now, config.blocks_per_hour);
    let start_minute = key.block * config.minutes_per_block();
    println!(
        "{:02}:{:02} block {} of {} ({})",
        key.hour,
        start_minute,
        grid.current_index,
        blocks_per_cycle(grid.blocks_per_hour),
        key
    );
    Ok(())
}

pub fn toggle(ctx: &AppContext, time: String) -> Result<()> {
    let mut store = open_store(ctx)?;
    let time = parse_time(&time)?;
    let key = BlockKey::at(&time, ctx.config.config.blocks_per_hour);
    let active = toggle_block(&mut store, key).with_context(|| format!("toggling {}", key))?;
    println!("{} is now {}", key, if active { "on" } else { "off" });
    Ok(())
}

pub fn sleep(ctx: &AppContext, start: Option<String>, end: Option<String>) -> Result<()> {
    let mut store = open_store(ctx)?;
    match (start, end) {
        (Some(_), None) | (None, Some(_)) => bail!("both --start and --end are required"),
        (Some(start), Some(end)) => {
            let window = save_sleep_settings(&mut store, &start, &end)?;
            println!(
                "Sleep window set to {}-{}",
                format_hour_label(window.start),
                format_hour_label(window.end)
            );
        }
        (None, None) => {
            let raw = SleepSettings::load(&store, &ctx.config.config);
            println!("Sleep window {}-{}", raw.start, raw.end);
        }
    }
    Ok(())
}

pub fn note(ctx: &AppContext, hour: u32, text: Option<String>) -> Result<()> {
    if hour >= HOURS_PER_CYCLE {
        bail!("hour out of range (0-23): {}", hour);
    }
    let mut store = open_store(ctx)?;
    let text = text.unwrap_or_default();
    set_hour_note(&mut store, hour, &text)?;
    if text.trim().is_empty() {
        println!("Cleared note for {}", format_hour_label(hour));
    } else {
        println!("Saved note for {}", format_hour_label(hour));
    }
    Ok(())
}

pub fn config(ctx: &AppContext) -> Result<()> {
    let loaded = &ctx.config;
    println!(
        "# {} ({})",
        loaded.path.display(),
        if loaded.from_file { "loaded" } else { "defaults" }
    );
    print!(
        "{}",
        serde_yaml::to_string(&loaded.config).context("serializing config")?
    );
    println!("# minutes per block: {}", loaded.config.minutes_per_block());
    Ok(())
}

pub fn tui(ctx: &AppContext) -> Result<()> {
    let store = open_store(ctx)?;
    ui::run(store, ctx.config.config.clone())
}

fn open_store(ctx: &AppContext) -> Result<FileStore> {
    let cwd = env::current_dir()?;
    let location = locate_store(&cwd, ctx.store_path.as_deref())?;
    FileStore::open(location)
}

fn parse_time(input: &str) -> Result<NaiveTime> {
    let raw = input.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| anyhow!("invalid time format (use HH:MM): {}", raw))
}

fn grid_lines(grid: &PlannerGrid) -> Vec<String> {
    grid.rows
        .iter()
        .map(|row| {
            let blocks: String = row
                .blocks
                .iter()
                .map(|b| format!("[{}]", block_marker(b.flags)))
                .collect();
            match &row.note {
                Some(note) => format!("{} {}  {}", row.label, blocks, note),
                None => format!("{} {}", row.label, blocks),
            }
        })
        .collect()
}

fn block_marker(flags: BlockFlags) -> char {
    if flags.current {
        '>'
    } else if flags.active {
        '#'
    } else if flags.sleep {
        'z'
    } else if flags.past {
        '.'
    } else {
        ' '
    }
}
