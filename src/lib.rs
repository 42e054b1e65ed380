//! Extract, filter, export and mark notes held in the macOS Notes store.
//!
//! One invocation is one pass: resolve dates, build the predicate, query the
//! store, drop marked records and apply the tag, write the cleaned export,
//! then optionally mark the matched records in the store.

use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use log::{debug, warn};

pub mod args;
pub mod criteria;
pub mod dates;
pub mod error;
pub mod export;
pub mod filter;
pub mod formatting;
pub mod gateway;
pub mod mutation;
pub mod record;
pub mod store;

use crate::args::CliOptions;
use crate::criteria::FilterCriteria;
use crate::error::{Result, VoyeurError};
use crate::formatting::FormatContext;
use crate::gateway::{DEFAULT_TIMEOUT, Gateway, Statistics};
use crate::mutation::MarkReport;
use crate::record::Record;
use crate::store::{FixtureStore, NoteStore, OsaScriptStore};

pub const STORE_ENV: &str = "NOTE_VOYEUR_STORE";
pub const TIMEOUT_ENV: &str = "NOTE_VOYEUR_TIMEOUT_SECS";
pub const LOG_ENV: &str = "NOTE_VOYEUR_LOG";

/// What one run produced, for callers that drive `run` directly.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub statistics: Option<Statistics>,
    /// The cleaned records as written to the export.
    pub exported: Vec<Record>,
    pub export_path: Option<PathBuf>,
    pub report: Option<MarkReport>,
}

pub fn entry() -> std::result::Result<(), Box<dyn Error>> {
    init_logging();
    let opts = args::parse(env::args().skip(1).collect())?;
    if opts.help {
        print_help();
        return Ok(());
    }

    let store = open_store()?;
    let gateway = Gateway::new(&*store, timeout_from_env()?);
    let ctx = FormatContext::from_env();
    run(&opts, &gateway, &ctx, Local::now().naive_local())?;
    println!("\nCompleted at {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    Ok(())
}

fn init_logging() {
    let filter = env::var(LOG_ENV)
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| "warn".to_string());
    let _ = env_logger::Builder::new()
        .parse_filters(&filter)
        .format_timestamp(None)
        .try_init();
}

fn open_store() -> Result<Box<dyn NoteStore>> {
    match env::var_os(STORE_ENV) {
        Some(path) => {
            let path = PathBuf::from(path);
            if !path.is_file() {
                return Err(VoyeurError::StoreUnavailable(format!(
                    "fixture store {} not found",
                    path.display()
                )));
            }
            debug!("using fixture store {}", path.display());
            Ok(Box::new(FixtureStore::new(path)))
        }
        None => Ok(Box::new(OsaScriptStore::new())),
    }
}

fn timeout_from_env() -> Result<Duration> {
    match env::var(TIMEOUT_ENV) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(VoyeurError::Usage(format!(
                "{TIMEOUT_ENV} must be a positive number of seconds, got `{raw}`"
            ))),
        },
        Err(_) => Ok(DEFAULT_TIMEOUT),
    }
}

/// Resolve the date tokens of `opts` against `now`.
pub fn criteria_from(opts: &CliOptions, now: NaiveDateTime) -> Result<FilterCriteria> {
    let lower = opts.from_date.as_deref().map(|t| dates::resolve_at(t, now)).transpose()?;
    let upper = opts.to_date.as_deref().map(|t| dates::resolve_at(t, now)).transpose()?;
    if let (Some(lo), Some(hi)) = (lower, upper) {
        if lo.date() > hi.date() {
            warn!("from-date {} is after to-date {}; nothing can match", lo.date(), hi.date());
        }
    }
    Ok(FilterCriteria {
        lower,
        upper,
        tag: opts.filter_tag.clone(),
        limit: opts.limit,
        mark: opts.mark,
    })
}

/// One full pass. Console output goes to stdout; only the export write and
/// bad input are fatal.
pub fn run(
    opts: &CliOptions,
    gateway: &Gateway<'_>,
    ctx: &FormatContext,
    now: NaiveDateTime,
) -> Result<RunOutcome> {
    let criteria = criteria_from(opts, now)?;
    let predicate = criteria.predicate(now);
    let tag = criteria.tag.as_deref();
    debug!("predicate: {:?}", predicate);

    let mut outcome = RunOutcome::default();
    if opts.count || opts.stats_only {
        let stats = gateway.statistics(&predicate);
        println!("{}", ctx.format_statistics(&stats, tag));
        outcome.statistics = Some(stats);
        if opts.stats_only {
            return Ok(outcome);
        }
    }

    // When marking, already-marked matches stay in the set so the mutation
    // engine can report them; they are still kept out of display and export.
    let matched = gateway.query(&predicate, !criteria.mark);
    let visible = filter::filter(matched.clone(), tag, true);
    println!("{}", ctx.format_records(&visible, tag));

    let exported = export::clean(&visible, tag);
    let path = export::resolve_output(opts.output.as_deref(), &criteria);
    export::write(&exported, &path)?;
    println!("\nNotes saved to {}", path.display());
    outcome.exported = exported;
    outcome.export_path = Some(path);

    if criteria.mark {
        let report = mutation::mark(gateway, &matched);
        println!("\n{}", ctx.format_report(&report));
        outcome.report = Some(report);
    }
    Ok(outcome)
}

fn print_help() {
    println!(
        "\
Note Voyeur
Extract notes from the Notes app, export them as JSON and optionally mark them.

Usage:
  note_voyeur [options]

Options:
  -n, --limit <int>          Max notes to extract (default 5)
  -d, --from-date <date>     Lower bound: N (days ago), YYYY-MM-DD, DD/MM/YYYY or MM/DD/YYYY
  -t, --to-date <date>       Upper bound, same formats (whole day included)
      --filter-tag <text>    Keep notes containing <text> in title or body (case-insensitive)
      --mark                 After export, prefix matched notes with \"{marker}\"
  -c, --count                Print statistics before extracting
      --stats-only           Print statistics and exit
  -o, --output <path>        Export file name (default derived from the filters)
  -h, --help                 Show this message

Without dates, notes modified in the last 30 days are considered.

Environment:
  {STORE_ENV}          Read and write a JSON fixture file instead of the Notes app
  {TIMEOUT_ENV}   Budget per store call in seconds (default 30)
  {LOG_ENV}            Log filter, e.g. debug (falls back to RUST_LOG)
  NO_COLOR                   Disable colored output
",
        marker = record::MARKER
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::tests::{MockStore, at};
    use crate::record::MARKER;
    use tempfile::tempdir;

    fn now() -> NaiveDateTime {
        at(2024, 3, 1, 12, 0, 0)
    }

    fn store_of_ten() -> MockStore {
        let records = (0..10)
            .map(|i| {
                let t = at(2024, 2, 10 + i, 8, 0, 0);
                let (title, body) = match i {
                    2 => ("Reading on ai safety".to_string(), "<div>links</div>".to_string()),
                    6 => (format!("{MARKER} AI tools"), "<div>old</div>".to_string()),
                    _ => (format!("note {i}"), "<div>text</div>".to_string()),
                };
                Record::new(title, body, t, t)
            })
            .collect();
        MockStore::with(records)
    }

    fn opts(output: &std::path::Path) -> CliOptions {
        CliOptions { output: Some(output.display().to_string()), ..Default::default() }
    }

    #[test]
    fn tag_run_returns_only_unmarked_match() {
        let tmp = tempdir().unwrap();
        let store = store_of_ten();
        let gw = Gateway::new(&store, DEFAULT_TIMEOUT);
        let mut o = opts(&tmp.path().join("out"));
        o.limit = 3;
        o.filter_tag = Some("AI".into());

        let outcome = run(&o, &gw, &FormatContext::new(false), now()).unwrap();

        assert_eq!(outcome.exported.len(), 1);
        let path = outcome.export_path.unwrap();
        assert_eq!(path, tmp.path().join("out.json"));
        let saved: Vec<Record> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.len(), 1);
        assert!(!saved[0].title.contains(MARKER));
        assert!(store.writes.borrow().is_empty());
    }

    #[test]
    fn mark_run_marks_new_and_skips_old() {
        let tmp = tempdir().unwrap();
        let store = store_of_ten();
        let gw = Gateway::new(&store, DEFAULT_TIMEOUT);
        let mut o = opts(&tmp.path().join("marked.json"));
        o.filter_tag = Some("ai".into());
        o.mark = true;

        let outcome = run(&o, &gw, &FormatContext::new(false), now()).unwrap();

        let report = outcome.report.unwrap();
        assert_eq!(report.total(), 2);
        assert_eq!(report.marked(), 1);
        assert_eq!(report.already_marked(), 1);
        assert_eq!(store.writes.borrow()[0].0, "Reading on ai safety");
        assert_eq!(outcome.exported.len(), 1);
        assert!(!outcome.exported[0].title.to_lowercase().contains("ai"));
    }

    #[test]
    fn stats_only_skips_export() {
        let tmp = tempdir().unwrap();
        let store = store_of_ten();
        let gw = Gateway::new(&store, DEFAULT_TIMEOUT);
        let mut o = opts(&tmp.path().join("never.json"));
        o.stats_only = true;

        let outcome = run(&o, &gw, &FormatContext::new(false), now()).unwrap();

        let stats = outcome.statistics.unwrap();
        assert_eq!(stats.total, 10);
        assert_eq!(stats.visible, 9);
        assert!(outcome.export_path.is_none());
        assert!(!tmp.path().join("never.json").exists());
    }

    #[test]
    fn invalid_date_aborts() {
        let store = store_of_ten();
        let gw = Gateway::new(&store, DEFAULT_TIMEOUT);
        let o = CliOptions { from_date: Some("someday".into()), ..Default::default() };
        let err = run(&o, &gw, &FormatContext::new(false), now()).unwrap_err();
        assert!(matches!(err, VoyeurError::InvalidDate { .. }));
    }

    #[test]
    fn far_future_to_date_runs() {
        let tmp = tempdir().unwrap();
        let store = store_of_ten();
        let gw = Gateway::new(&store, DEFAULT_TIMEOUT);
        let days = (chrono::NaiveDate::MAX - now().date()).num_days();
        let mut o = opts(&tmp.path().join("future.json"));
        o.to_date = Some(format!("-{days}"));
        o.limit = 50;

        let outcome = run(&o, &gw, &FormatContext::new(false), now()).unwrap();

        assert_eq!(outcome.exported.len(), 9);
    }

    #[test]
    fn range_count_matches_extraction() {
        let tmp = tempdir().unwrap();
        let store = store_of_ten();
        let gw = Gateway::new(&store, DEFAULT_TIMEOUT);
        let mut o = opts(&tmp.path().join("range.json"));
        o.from_date = Some("2024-02-12".into());
        o.to_date = Some("2024-02-15".into());
        o.limit = 50;
        o.count = true;

        let outcome = run(&o, &gw, &FormatContext::new(false), now()).unwrap();

        assert_eq!(outcome.statistics.unwrap().total, 4);
        assert_eq!(outcome.exported.len(), 4);
    }
}
