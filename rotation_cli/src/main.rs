use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use rotation_core::*;
use std::path::{Path, PathBuf};

/// Store key for the CLI's "last action" record backing cross-invocation
/// undo. One process per command means the undo pointer has to live next
/// to the data; any mutating command other than undo clears it.
const KEY_LAST_ACTION: &str = "last-action";

#[derive(Parser)]
#[command(name = "siterot")]
#[command(about = "Injection site rotation tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the suggested next point and the status board (default)
    Suggest,

    /// Record an injection at a point (the suggested one if omitted)
    Log {
        /// Point id (e.g. abd_r1); defaults to the current suggestion
        point_id: Option<String>,

        /// Attach a note to the new entry
        #[arg(long)]
        note: Option<String>,
    },

    /// Undo the most recently logged injection
    Undo,

    /// List the injection history, most recent first
    History,

    /// Edit the note on a history entry
    Note { id: String, text: String },

    /// Delete a history entry (irreversible)
    Delete { id: String },

    /// Replace the history with a JSON file
    Import { file: PathBuf },

    /// Export the history to a file
    Export {
        file: PathBuf,

        /// Output format
        #[arg(long, default_value = "json")]
        format: ExportFormat,
    },

    /// Show 7-day and 30-day usage metrics
    Metrics,

    /// Show or change preferences
    Prefs {
        /// Days before a used point becomes available again (min 1)
        #[arg(long)]
        cooldown_days: Option<u32>,

        /// Prefer switching body side between injections
        #[arg(long)]
        alternate_side: Option<bool>,

        /// Prefer switching region between injections
        #[arg(long)]
        alternate_region: Option<bool>,

        /// Planned injections per day (informational)
        #[arg(long)]
        daily_slots: Option<u32>,

        /// Display language
        #[arg(long)]
        language: Option<String>,

        /// Enable a region (repeatable)
        #[arg(long)]
        enable_region: Vec<String>,

        /// Disable a region (repeatable)
        #[arg(long)]
        disable_region: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum ExportFormat {
    Json,
    Csv,
}

/// Everything a command needs: catalog, stores, loaded documents.
struct App {
    catalog: &'static Catalog,
    kv: FileStore,
    prefs: Preferences,
    history: HistoryStore,
}

fn main() -> Result<()> {
    rotation_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Some(Commands::Suggest) | None => cmd_suggest(&data_dir),
        Some(Commands::Log { point_id, note }) => cmd_log(&data_dir, point_id, note),
        Some(Commands::Undo) => cmd_undo(&data_dir),
        Some(Commands::History) => cmd_history(&data_dir),
        Some(Commands::Note { id, text }) => cmd_note(&data_dir, &id, &text),
        Some(Commands::Delete { id }) => cmd_delete(&data_dir, &id),
        Some(Commands::Import { file }) => cmd_import(&data_dir, &file),
        Some(Commands::Export { file, format }) => cmd_export(&data_dir, &file, format),
        Some(Commands::Metrics) => cmd_metrics(&data_dir),
        Some(Commands::Prefs {
            cooldown_days,
            alternate_side,
            alternate_region,
            daily_slots,
            language,
            enable_region,
            disable_region,
        }) => cmd_prefs(
            &data_dir,
            cooldown_days,
            alternate_side,
            alternate_region,
            daily_slots,
            language,
            enable_region,
            disable_region,
        ),
    }
}

fn open_app(data_dir: &Path) -> Result<App> {
    std::fs::create_dir_all(data_dir)?;

    let catalog = get_default_catalog();
    let errors = catalog.validate();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::CatalogValidation("Invalid catalog".into()));
    }

    let kv = FileStore::new(data_dir);
    ensure_schema_version(&kv)?;

    let prefs = Preferences::load(&kv, catalog);
    let history = HistoryStore::load(Box::new(FileStore::new(data_dir)), catalog);

    Ok(App {
        catalog,
        kv,
        prefs,
        history,
    })
}

fn set_last_action(kv: &FileStore, id: &str) {
    if let Err(e) = kv.set(KEY_LAST_ACTION, id) {
        tracing::warn!("Failed to record last action: {}", e);
    }
}

fn get_last_action(kv: &FileStore) -> Option<String> {
    match kv.get(KEY_LAST_ACTION) {
        Ok(Some(id)) if !id.trim().is_empty() => Some(id.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Failed to read last action: {}", e);
            None
        }
    }
}

fn fmt_ts(ts: i64) -> String {
    Utc.timestamp_millis_opt(ts)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn cmd_suggest(data_dir: &Path) -> Result<()> {
    let app = open_app(data_dir)?;
    let now = now_ms();

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  NEXT SUGGESTED POINT");
    println!("╰─────────────────────────────────────────╯");
    println!();

    let suggested = suggest(app.catalog, app.history.entries(), &app.prefs, now);
    match suggested {
        Some(point) => {
            println!(
                "  {} · {} ({})  [{}]",
                point.area_name, point.name, point.side, point.id
            );
        }
        None => {
            println!("  No point available (every region is disabled).");
        }
    }

    println!();
    println!(
        "  cooldown: {}d   alternate side: {}   alternate region: {}",
        app.prefs.cooldown_days,
        on_off(app.prefs.alternate_side),
        on_off(app.prefs.alternate_region),
    );
    println!();
    println!("  Point status:");
    for point in app.catalog.all_points() {
        if !app.prefs.region_enabled(&point.region) {
            continue;
        }
        let status = match status_of(&point.id, app.history.entries(), &app.prefs, now) {
            PointStatus::Available => "available",
            PointStatus::Recent => "recent   ",
        };
        let marker = match suggested {
            Some(s) if s.id == point.id => "  ← suggested",
            _ => "",
        };
        println!(
            "    {:8}  {} {:8}  {}{}",
            point.id, point.area_name, point.name, status, marker
        );
    }
    println!();

    Ok(())
}

fn cmd_log(data_dir: &Path, point_id: Option<String>, note: Option<String>) -> Result<()> {
    let mut app = open_app(data_dir)?;
    let now = now_ms();

    let point = match point_id {
        Some(ref id) => app
            .catalog
            .lookup(id)
            .ok_or_else(|| Error::Other(format!("Unknown point id '{}'", id)))?,
        None => suggest(app.catalog, app.history.entries(), &app.prefs, now)
            .ok_or_else(|| Error::Other("No point available to log".into()))?,
    };
    let point = point.clone();

    let entry = app.history.append(&point);
    if let Some(ref note) = note {
        app.history.edit_note(&entry.id, note);
    }

    // A note edit counts as a mutation after the append, so undo is only
    // offered for plain logs.
    if note.is_none() {
        set_last_action(&app.kv, &entry.id);
    } else {
        set_last_action(&app.kv, "");
    }

    println!(
        "✓ Logged {} · {} ({}) at {}",
        point.area_name,
        point.name,
        point.side,
        fmt_ts(entry.ts)
    );
    println!("  entry id: {}", entry.id);
    if note.is_none() {
        println!("  (run `siterot undo` to take it back)");
    }

    Ok(())
}

fn cmd_undo(data_dir: &Path) -> Result<()> {
    let mut app = open_app(data_dir)?;

    let Some(id) = get_last_action(&app.kv) else {
        println!("Nothing to undo.");
        return Ok(());
    };

    app.history.arm_undo(&id);
    match app.history.undo_last() {
        Some(removed) => {
            set_last_action(&app.kv, "");
            println!(
                "✓ Undid injection at {} ({})",
                removed.point_id,
                fmt_ts(removed.ts)
            );
        }
        None => {
            set_last_action(&app.kv, "");
            println!("Nothing to undo: the last logged entry is no longer the most recent.");
        }
    }

    Ok(())
}

fn cmd_history(data_dir: &Path) -> Result<()> {
    let app = open_app(data_dir)?;

    if app.history.entries().is_empty() {
        println!("No entries yet.");
        return Ok(());
    }

    for entry in app.history.entries() {
        let label = match app.catalog.lookup(&entry.point_id) {
            Some(point) => format!("{} · {}", point.area_name, point.name),
            None => format!("unknown point ({})", entry.point_id),
        };
        println!(
            "{}  {} ({})  [{}]",
            fmt_ts(entry.ts),
            label,
            entry.side,
            entry.id
        );
        if !entry.note.is_empty() {
            println!("                  note: {}", entry.note);
        }
    }

    Ok(())
}

fn cmd_note(data_dir: &Path, id: &str, text: &str) -> Result<()> {
    let mut app = open_app(data_dir)?;

    if app.history.edit_note(id, text) {
        set_last_action(&app.kv, "");
        println!("✓ Note updated");
        Ok(())
    } else {
        Err(Error::Other(format!("No history entry with id '{}'", id)))
    }
}

fn cmd_delete(data_dir: &Path, id: &str) -> Result<()> {
    let mut app = open_app(data_dir)?;

    if app.history.delete(id) {
        set_last_action(&app.kv, "");
        println!("✓ Entry deleted");
        Ok(())
    } else {
        Err(Error::Other(format!("No history entry with id '{}'", id)))
    }
}

fn cmd_import(data_dir: &Path, file: &Path) -> Result<()> {
    let mut app = open_app(data_dir)?;

    let raw = std::fs::read_to_string(file)?;
    match app.history.import_and_replace(&raw, app.catalog) {
        Ok(count) => {
            set_last_action(&app.kv, "");
            println!("✓ Imported {} entries (history replaced)", count);
            Ok(())
        }
        Err(e) => {
            eprintln!("Import failed: {}. Existing history left untouched.", e);
            Err(e)
        }
    }
}

fn cmd_export(data_dir: &Path, file: &Path, format: ExportFormat) -> Result<()> {
    let app = open_app(data_dir)?;

    match format {
        ExportFormat::Json => {
            let json = app.history.export_json()?;
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(file, json)?;
            println!(
                "✓ Exported {} entries to {}",
                app.history.entries().len(),
                file.display()
            );
        }
        ExportFormat::Csv => {
            let count = write_history_csv(app.history.entries(), file)?;
            println!("✓ Exported {} entries to {}", count, file.display());
        }
    }

    Ok(())
}

fn cmd_metrics(data_dir: &Path) -> Result<()> {
    let app = open_app(data_dir)?;
    let now = now_ms();

    let d7 = window_metrics(app.history.entries(), 7, now);
    let d30 = window_metrics(app.history.entries(), 30, now);

    println!("\n  Usage metrics");
    println!("  ─────────────");
    println!("  Total (7d):  {}", d7.total);
    println!("  Total (30d): {}", d30.total);
    println!();
    for area in app.catalog.areas() {
        let count = d30.by_region.get(&area.region).copied().unwrap_or(0);
        println!("  {} (30d): {}", area.name, count);
    }
    println!();
    println!(
        "  Left (30d): {}   Right (30d): {}",
        d30.by_side.get(&Side::Left).copied().unwrap_or(0),
        d30.by_side.get(&Side::Right).copied().unwrap_or(0),
    );
    println!();

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_prefs(
    data_dir: &Path,
    cooldown_days: Option<u32>,
    alternate_side: Option<bool>,
    alternate_region: Option<bool>,
    daily_slots: Option<u32>,
    language: Option<String>,
    enable_region: Vec<String>,
    disable_region: Vec<String>,
) -> Result<()> {
    let mut app = open_app(data_dir)?;

    let changed = cooldown_days.is_some()
        || alternate_side.is_some()
        || alternate_region.is_some()
        || daily_slots.is_some()
        || language.is_some()
        || !enable_region.is_empty()
        || !disable_region.is_empty();

    if let Some(days) = cooldown_days {
        app.prefs.cooldown_days = days;
    }
    if let Some(value) = alternate_side {
        app.prefs.alternate_side = value;
    }
    if let Some(value) = alternate_region {
        app.prefs.alternate_region = value;
    }
    if let Some(slots) = daily_slots {
        app.prefs.daily_slots = slots;
    }
    if let Some(language) = language {
        app.prefs.language = language;
    }
    for region in enable_region {
        set_region(&mut app.prefs, app.catalog, &region, true)?;
    }
    for region in disable_region {
        set_region(&mut app.prefs, app.catalog, &region, false)?;
    }

    if changed {
        app.prefs.normalize(app.catalog);
        app.prefs.save(&app.kv)?;
        println!("✓ Preferences saved");
        println!();
    }

    println!("  cooldown days:    {}", app.prefs.cooldown_days);
    println!("  alternate side:   {}", on_off(app.prefs.alternate_side));
    println!("  alternate region: {}", on_off(app.prefs.alternate_region));
    println!("  daily slots:      {}", app.prefs.daily_slots);
    println!("  language:         {}", app.prefs.language);
    for area in app.catalog.areas() {
        println!(
            "  region {:8}  {}",
            area.region,
            if app.prefs.region_enabled(&area.region) {
                "enabled"
            } else {
                "disabled"
            }
        );
    }

    Ok(())
}

fn set_region(
    prefs: &mut Preferences,
    catalog: &Catalog,
    region: &str,
    enabled: bool,
) -> Result<()> {
    if !catalog.areas().iter().any(|a| a.region == region) {
        return Err(Error::Other(format!("Unknown region '{}'", region)));
    }
    prefs.enabled_regions.insert(region.to_string(), enabled);
    Ok(())
}
