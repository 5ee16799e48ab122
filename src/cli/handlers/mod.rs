use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use log::debug;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::buckets::day_keys;
use crate::io::config_io;
use crate::io::lock::StoreLock;
use crate::io::state::{ViewState, read_view_state, write_view_state};
use crate::io::store::FileStore;
use crate::model::category::Category;
use crate::model::config::Config;
use crate::model::day::{day_key, is_day_key, parse_day, sort_newest_first, today_key};
use crate::model::note::NoteField;
use crate::ops::export::rows_to_csv;
use crate::ops::notebook::{Notebook, NotebookSettings};
use crate::ops::numbering::display_indexes;
use crate::ops::stats::StatsScope;
use crate::ops::ticker::TickOwner;
use crate::util::time::{SystemTime, format_hms};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let store = cli.store.as_deref();

    match cli.command {
        // Read commands
        Commands::Day(args) => cmd_day(args, store, json),
        Commands::List(args) => cmd_list(args, store, json),
        Commands::Show(args) => cmd_show(args, store, json),
        Commands::Copy(args) => cmd_copy(args, store),
        Commands::Search(args) => cmd_search(args, store, json),
        Commands::Stats(args) => cmd_stats(args, store, json),
        Commands::Projects(args) => cmd_projects(args, store, json),
        Commands::Export(args) => cmd_export(args, store),

        // Lifecycle
        Commands::New => cmd_new(store, json),
        Commands::Set(args) => cmd_set(args, store, json),
        Commands::Done(args) => cmd_complete(args, false, store, json),
        Commands::Cancel(args) => cmd_complete(args, true, store, json),
        Commands::Reopen(args) => cmd_reopen(args, store, json),
        Commands::Delete(args) => cmd_delete(args, store),

        // Category timers
        Commands::Timer(args) => cmd_timer(args, store, json),
        Commands::Watch(args) => cmd_watch(args, store, json),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// An open notebook on the file store, holding the store's lock for as
/// long as it lives.
struct Session {
    notebook: Notebook<FileStore>,
    view: ViewState,
    dir: PathBuf,
    _lock: StoreLock,
}

impl Session {
    fn save_view(&self) -> Result<(), std::io::Error> {
        write_view_state(&self.dir, &self.view)
    }
}

fn store_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn open_session(store: Option<&str>) -> Result<Session, Box<dyn std::error::Error>> {
    let config = config_io::read_config()?;
    open_session_with(store, &config)
}

fn open_session_with(store: Option<&str>, config: &Config) -> Result<Session, Box<dyn std::error::Error>> {
    let path = config_io::resolve_store_path(store, config);
    let dir = store_dir(&path);
    let lock = StoreLock::acquire_default(&path)?;
    let file_store = FileStore::open(&path)?;
    let view = read_view_state(&dir).unwrap_or_default();
    let day = view
        .active_day
        .clone()
        .filter(|d| is_day_key(d))
        .unwrap_or_else(today_key);
    debug!("opening {} at {}", path.display(), day);
    let notebook = Notebook::open(
        file_store,
        Box::new(SystemTime),
        &day,
        NotebookSettings::from(config),
    )?;
    Ok(Session {
        notebook,
        view,
        dir,
        _lock: lock,
    })
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    if s == "today" {
        return Ok(Local::now().date_naive());
    }
    parse_day(s).ok_or_else(|| format!("invalid date '{}' (expected YYYY-MM-DD)", s))
}

fn parse_category(s: &str) -> Result<Category, String> {
    s.parse::<Category>()
}

fn scope_from(args: &ScopeArgs) -> Result<StatsScope, String> {
    if args.all {
        return Ok(StatsScope::AllDays);
    }
    if args.from.is_none() && args.to.is_none() {
        return Ok(StatsScope::Day);
    }
    let from = args.from.as_deref().map(parse_date_arg).transpose()?;
    let to = args.to.as_deref().map(parse_date_arg).transpose()?;
    Ok(StatsScope::Range {
        from: from.unwrap_or(NaiveDate::MIN),
        to: to.unwrap_or(NaiveDate::MAX),
    })
}

fn print_transition(session: &Session, id: u32, applied: bool, verb: &str, json: bool) -> CmdResult {
    let status = session
        .notebook
        .note(id)
        .map(|n| n.status())
        .ok_or_else(|| format!("note not found: {}", id))?;
    if json {
        let out = TransitionJson { id, applied, status };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if applied {
        println!("{} #{} ({})", verb, id, status);
    } else {
        eprintln!("#{} is {}; nothing to do", id, status);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_day(args: DayArgs, store: Option<&str>, json: bool) -> CmdResult {
    let mut session = open_session(store)?;
    if let Some(date) = args.date {
        let day = day_key(parse_date_arg(&date)?);
        session.notebook.select_day(&day)?;
        session.view.active_day = Some(day);
        session.save_view()?;
    }

    let mut days = day_keys(session.notebook.store());
    sort_newest_first(&mut days);
    if json {
        let out = DayJson {
            day: session.notebook.day().to_string(),
            days,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for day in &days {
            let marker = if day == session.notebook.day() { '*' } else { ' ' };
            println!("{} {}", marker, day);
        }
    }
    Ok(())
}

fn cmd_list(args: ListArgs, store: Option<&str>, json: bool) -> CmdResult {
    let mut session = open_session(store)?;
    let nb = &mut session.notebook;
    let now = nb.now();

    let day = match args.day {
        Some(date) => day_key(parse_date_arg(&date)?),
        None => nb.day().to_string(),
    };
    let notes = nb.notes_in(&day)?;
    let flags: Vec<(u32, bool)> = notes.iter().map(|n| (n.id, n.canceled)).collect();
    let labels: Vec<String> = display_indexes(&flags)
        .into_iter()
        .map(|(_, index)| index.render(&nb.settings().canceled_label))
        .collect();
    let off_platform = nb.timers().bucket_total(nb.store(), &day, now);

    if json {
        let out = NoteListJson {
            day,
            notes: notes
                .iter()
                .zip(labels)
                .map(|(n, label)| note_to_json(n, label, now))
                .collect(),
            off_platform_seconds: off_platform,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("== {} ==", day);
        for (note, label) in notes.iter().zip(&labels) {
            println!("{}", format_note_line(note, label, now));
        }
        if off_platform > 0 {
            println!();
            println!("off-platform: {}", format_hms(off_platform));
        }
    }
    Ok(())
}

fn cmd_show(args: NoteIdArg, store: Option<&str>, json: bool) -> CmdResult {
    let session = open_session(store)?;
    let nb = &session.notebook;
    let note = nb
        .note(args.id)
        .ok_or_else(|| format!("note not found: {}", args.id))?;
    let label = nb.display_label(note.id).unwrap_or_default();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&note_to_json(note, label, nb.now()))?
        );
    } else {
        for line in format_note_detail(note, &label, nb.now()) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_copy(args: CopyArgs, store: Option<&str>) -> CmdResult {
    let session = open_session(store)?;
    let note = session
        .notebook
        .note(args.id)
        .ok_or_else(|| format!("note not found: {}", args.id))?;
    let text = if args.identifiers {
        note.formatted_identifiers()
    } else {
        note.formatted_summary()
    };
    if text.is_empty() {
        eprintln!("nothing to copy");
    } else {
        println!("{}", text);
    }
    Ok(())
}

fn cmd_search(args: SearchArgs, store: Option<&str>, json: bool) -> CmdResult {
    let mut session = open_session(store)?;
    let hits = session.notebook.search(&args.query)?;
    if !args.query.trim().is_empty() {
        session.view.remember_search(args.query.trim());
        session.save_view()?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else if hits.is_empty() {
        eprintln!("no matches");
    } else {
        for hit in &hits {
            println!("{}", format_search_hit(hit));
        }
    }
    Ok(())
}

fn cmd_stats(args: ScopeArgs, store: Option<&str>, json: bool) -> CmdResult {
    let scope = scope_from(&args)?;
    let mut session = open_session(store)?;
    let stats = session.notebook.compute_stats(scope)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats_to_json(&stats))?);
    } else {
        for line in format_stats(&stats) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_projects(args: ScopeArgs, store: Option<&str>, json: bool) -> CmdResult {
    let scope = scope_from(&args)?;
    let mut session = open_session(store)?;
    let rates = session.notebook.compute_project_rates(scope)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&rates)?);
    } else if rates.is_empty() {
        eprintln!("no completed notes with a project id");
    } else {
        for line in format_project_rates(&rates) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_export(args: ExportArgs, store: Option<&str>) -> CmdResult {
    let from = args.from.as_deref().map(parse_date_arg).transpose()?;
    let to = args.to.as_deref().map(parse_date_arg).transpose()?;
    let mut config = config_io::read_config()?;
    if args.include_canceled {
        config.export.include_canceled = true;
    }
    let mut session = open_session_with(store, &config)?;
    let rows = session.notebook.export_rows(from, to)?;
    match args.format {
        ExportFormat::Csv => print!("{}", rows_to_csv(&rows)?),
        ExportFormat::Json => println!("{}", format_export_json(&rows)?),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Lifecycle handlers
// ---------------------------------------------------------------------------

fn cmd_new(store: Option<&str>, json: bool) -> CmdResult {
    let mut session = open_session(store)?;
    let id = session.notebook.create_note()?;
    if json {
        let note = session
            .notebook
            .note(id)
            .ok_or_else(|| format!("note not found: {}", id))?;
        let label = session.notebook.display_label(id).unwrap_or_default();
        let out = note_to_json(note, label, session.notebook.now());
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("#{}", id);
    }
    Ok(())
}

fn cmd_set(args: SetArgs, store: Option<&str>, json: bool) -> CmdResult {
    let field: NoteField = args.field.parse()?;
    let mut session = open_session(store)?;
    let applied = session.notebook.edit_field(args.id, field, &args.value)?;
    print_transition(&session, args.id, applied, "updated", json)
}

fn cmd_complete(args: NoteIdArg, canceled: bool, store: Option<&str>, json: bool) -> CmdResult {
    let mut session = open_session(store)?;
    let applied = session.notebook.complete_note(args.id, canceled)?;
    let verb = if canceled { "canceled" } else { "completed" };
    print_transition(&session, args.id, applied, verb, json)
}

fn cmd_reopen(args: NoteIdArg, store: Option<&str>, json: bool) -> CmdResult {
    let mut session = open_session(store)?;
    let applied = session.notebook.reopen_note(args.id)?;
    print_transition(&session, args.id, applied, "reopened", json)
}

fn cmd_delete(args: NoteIdArg, store: Option<&str>) -> CmdResult {
    let mut session = open_session(store)?;
    session.notebook.delete_note(args.id)?;
    println!("deleted #{}", args.id);
    Ok(())
}

// ---------------------------------------------------------------------------
// Category timers
// ---------------------------------------------------------------------------

fn cmd_timer(args: TimerCmd, store: Option<&str>, json: bool) -> CmdResult {
    match args.action {
        TimerAction::Start(a) => {
            let category = parse_category(&a.category)?;
            let mut session = open_session(store)?;
            session.notebook.start_category(category)?;
            println!("started {}", category);
            Ok(())
        }
        TimerAction::Stop(a) => {
            let category = parse_category(&a.category)?;
            let mut session = open_session(store)?;
            if session.notebook.stop_category(category)? {
                println!("stopped {}", category);
            } else {
                eprintln!("{} is not running", category);
            }
            Ok(())
        }
        TimerAction::Set(a) => {
            let category = parse_category(&a.category)?;
            let (h, m, s) = parse_duration(&a.duration)?;
            let mut session = open_session(store)?;
            session.notebook.edit_category(category, h, m, s)?;
            println!(
                "{} set to {}",
                category,
                format_hms(session.notebook.category_seconds(category))
            );
            Ok(())
        }
        TimerAction::Status => cmd_timer_status(store, json),
        TimerAction::StopAll => {
            let mut session = open_session(store)?;
            let stopped = session.notebook.stop_all_categories()?;
            if json {
                let out: Vec<_> = stopped
                    .iter()
                    .map(|(day, category)| serde_json::json!({ "day": day, "category": category }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else if stopped.is_empty() {
                eprintln!("no timers running");
            } else {
                for (day, category) in &stopped {
                    println!("stopped {} in {}", category, day);
                }
            }
            Ok(())
        }
    }
}

fn cmd_timer_status(store: Option<&str>, json: bool) -> CmdResult {
    let session = open_session(store)?;
    let nb = &session.notebook;
    let running = nb.running_category();
    let timers: Vec<TimerJson> = Category::ALL
        .into_iter()
        .map(|category| {
            let seconds = nb.category_seconds(category);
            TimerJson {
                category,
                running: running == Some(category),
                seconds,
                elapsed: format_hms(seconds),
            }
        })
        .collect();

    if json {
        let out = TimerStatusJson {
            day: nb.day().to_string(),
            timers,
            total_seconds: nb.category_total(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("== {} ==", nb.day());
        for t in &timers {
            println!("{}", format_timer_line(t.category, t.running, t.seconds));
        }
        println!("total: {}", format_hms(nb.category_total()));
        for (day, category, _) in nb.timers().running_everywhere() {
            if day != nb.day() {
                println!("also running: {} in {}", category, day);
            }
        }
    }
    Ok(())
}

/// Follow the selected day's running clocks, printing each recomputed value
/// as its tick fires. The store lock is released once the day is loaded.
fn cmd_watch(args: WatchArgs, store: Option<&str>, json: bool) -> CmdResult {
    let Session {
        notebook: mut nb, ..
    } = open_session(store)?;

    if nb.ticks().is_empty() {
        eprintln!("nothing running in {}", nb.day());
        return Ok(());
    }
    debug!("watching {} tick owners in {}", nb.ticks().len(), nb.day());

    let interval = Duration::from_millis(nb.settings().tick_interval_ms.max(1) as u64);
    let mut fired = 0u64;
    while args.ticks.is_none_or(|limit| fired < limit) {
        std::thread::sleep(interval);
        for update in nb.tick() {
            let name = match &update.owner {
                TickOwner::Note(id) => format!("#{}", id),
                TickOwner::Category(_, category) => category.to_string(),
            };
            if json {
                let out = serde_json::json!({ "owner": name, "seconds": update.seconds });
                println!("{}", out);
            } else {
                println!("{} {}", name, format_hms(update.seconds));
            }
        }
        fired += 1;
    }
    Ok(())
}
