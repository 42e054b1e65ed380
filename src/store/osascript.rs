//! The Notes application driven through `osascript`.
//!
//! Query scripts are generated per call with the time bounds, marker and tag
//! tests compiled into AppleScript, so a scan stops inside Notes as soon as
//! `limit` rows are emitted. Rows come back separated by ASCII record
//! separators (0x1E) and fields by unit separators (0x1F); both are replaced
//! by spaces in note text before a row is built. Every call is a child
//! process with its own wall-clock budget; an overrun kills the child.

use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;
use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, Timelike};
use log::debug;
use wait_timeout::ChildExt;

use super::{NoteStore, ScanRequest, Scanned, StoreError};
use crate::criteria::Bounds;
use crate::record::{MARKER, Record, parse_timestamp};

const RECORD_SEP: char = '\u{1e}';
const FIELD_SEP: char = '\u{1f}';

const HELPERS: &str = r#"
on pad(n)
    set s to (n as integer) as string
    if (count of s) < 2 then set s to "0" & s
    return s
end pad

on stamp(d)
    return ((year of d) as string) & "-" & my pad(month of d as integer) & "-" & my pad(day of d) & " " & my pad(hours of d) & ":" & my pad(minutes of d) & ":" & my pad(seconds of d)
end stamp

on scrub(t)
    set saved to AppleScript's text item delimiters
    set AppleScript's text item delimiters to {character id 30, character id 31}
    set parts to text items of (t as string)
    set AppleScript's text item delimiters to " "
    set t to parts as string
    set AppleScript's text item delimiters to saved
    return t
end scrub

on makeDate(y, m, d, hh, mm, ss)
    set dt to current date
    set day of dt to 1
    set year of dt to y
    set month of dt to m
    set day of dt to d
    set time of dt to (hh * 3600 + mm * 60 + ss)
    return dt
end makeDate
"#;

const REWRITE_SCRIPT: &str = r#"
on run argv
    set originalTitle to item 1 of argv
    set newTitle to item 2 of argv
    set newBody to item 3 of argv
    tell application "Notes"
        set matches to (notes of default account whose name is originalTitle)
        if (count of matches) is 0 then error "no record titled " & originalTitle number 1404
        set target to item 1 of matches
        set body of target to newBody
        set name of target to newTitle
    end tell
    return "ok"
end run
"#;

pub struct OsaScriptStore {
    program: String,
    /// Arguments that make `program` read its script from stdin.
    stdin_args: Vec<String>,
}

impl Default for OsaScriptStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OsaScriptStore {
    pub fn new() -> Self {
        Self { program: "osascript".to_string(), stdin_args: vec!["-".to_string()] }
    }

    /// Run scripts through another interpreter, e.g. `sh -s`.
    pub fn with_command(program: impl Into<String>, stdin_args: &[&str]) -> Self {
        Self {
            program: program.into(),
            stdin_args: stdin_args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn run(
        &self,
        script: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<String, StoreError> {
        let mut child = Command::new(&self.program)
            .args(&self.stdin_args)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| StoreError::Unavailable(format!("{}: {err}", self.program)))?;

        // Feed the script and drain both pipes while waiting, so neither a
        // child that ignores stdin nor a large result can stall the call.
        let writer = feed(child.stdin.take(), script.to_string());
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        match child.wait_timeout(timeout) {
            Ok(Some(status)) => {
                let out = stdout.join().unwrap_or_default();
                let err = stderr.join().unwrap_or_default();
                if status.success() {
                    if let Ok(Err(err)) = writer.join() {
                        return Err(StoreError::Unavailable(format!("writing script: {err}")));
                    }
                    Ok(out)
                } else {
                    Err(StoreError::Unavailable(format!(
                        "{} exited with {}: {}",
                        self.program,
                        status.code().map_or("signal".to_string(), |c| c.to_string()),
                        err.trim()
                    )))
                }
            }
            Ok(None) => {
                abandon(&mut child);
                Err(StoreError::Timeout(timeout))
            }
            Err(err) => {
                abandon(&mut child);
                Err(StoreError::Unavailable(err.to_string()))
            }
        }
    }
}

/// Kill and reap a child whose result will not be used.
fn abandon(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn feed(stdin: Option<ChildStdin>, script: String) -> thread::JoinHandle<io::Result<()>> {
    thread::spawn(move || {
        if let Some(mut stdin) = stdin {
            stdin.write_all(script.as_bytes())?;
        }
        Ok(())
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut p) = pipe {
            let _ = p.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn date_literal(t: NaiveDateTime) -> String {
    format!(
        "my makeDate({}, {}, {}, {}, {}, {})",
        t.year(),
        t.month(),
        t.day(),
        t.hour(),
        t.minute(),
        t.second()
    )
}

/// AppleScript statements defining `lowerBound`/`upperBound` and the boolean
/// expression testing `m` against them.
fn bound_clause(bounds: &Bounds) -> (String, String) {
    let mut setup = String::new();
    let mut tests = Vec::new();
    if let Some(lo) = bounds.lower() {
        setup.push_str(&format!("    set lowerBound to {}\n", date_literal(lo)));
        tests.push("(m >= lowerBound)");
    }
    if let Some(hi) = bounds.upper_exclusive() {
        setup.push_str(&format!("    set upperBound to {}\n", date_literal(hi)));
        tests.push("(m < upperBound)");
    }
    let condition = if tests.is_empty() { "true".to_string() } else { tests.join(" and ") };
    (setup, condition)
}

/// AppleScript string literal for `text`.
fn quoted(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Statements that clear `keep` when the note in `t`/`b` must not surface.
/// Marker containment is case-sensitive, tag containment is not.
fn accept_clause(request: &ScanRequest<'_>) -> String {
    let mut clause = String::new();
    if request.exclude_marked {
        let marker = quoted(MARKER);
        clause.push_str(&format!(
            "                considering case\n                    if (t contains {marker}) or (b contains {marker}) then set keep to false\n                end considering\n"
        ));
    }
    if let Some(tag) = request.tag {
        let tag = quoted(tag);
        clause.push_str(&format!(
            "                ignoring case\n                    if not ((t contains {tag}) or (b contains {tag})) then set keep to false\n                end ignoring\n"
        ));
    }
    clause
}

pub(crate) fn scan_script(request: &ScanRequest<'_>) -> String {
    let (setup, condition) = bound_clause(&request.bounds);
    let accept = accept_clause(request);
    let (scan_cap, limit) = (request.scan_cap, request.limit);
    format!(
        r#"{HELPERS}
tell application "Notes"
    set FS to character id 31
    set RS to character id 30
    set rows to {{}}
    set scanned to 0
    set hits to 0
{setup}    repeat with n in notes of default account
        set scanned to scanned + 1
        if scanned > {scan_cap} then exit repeat
        try
            set m to modification date of n
            if {condition} then
                set t to name of n
                set b to body of n
                set keep to true
{accept}                if keep then
                    set end of rows to "R" & FS & my scrub(t) & FS & my scrub(b) & FS & my stamp(creation date of n) & FS & my stamp(m)
                    set hits to hits + 1
                end if
            end if
        on error errMsg
            set end of rows to "E" & FS & my scrub(errMsg)
        end try
        if hits >= {limit} then exit repeat
    end repeat
    set AppleScript's text item delimiters to RS
    set out to rows as string
    set AppleScript's text item delimiters to ""
    return out
end tell
"#
    )
}

pub(crate) fn count_script(bounds: &Bounds, scan_cap: usize) -> String {
    let (setup, condition) = bound_clause(bounds);
    format!(
        r#"{HELPERS}
tell application "Notes"
    set matched to 0
    set scanned to 0
{setup}    repeat with n in notes of default account
        set scanned to scanned + 1
        if scanned > {scan_cap} then exit repeat
        try
            set m to modification date of n
            if {condition} then set matched to matched + 1
        end try
    end repeat
    return matched as string
end tell
"#
    )
}

pub(crate) fn parse_rows(output: &str) -> Vec<Scanned> {
    let output = output.trim_end_matches(['\n', '\r']);
    if output.is_empty() {
        return Vec::new();
    }
    output.split(RECORD_SEP).map(parse_row).collect()
}

fn parse_row(row: &str) -> Scanned {
    let fields: Vec<&str> = row.splitn(5, FIELD_SEP).collect();
    match fields.as_slice() {
        ["R", title, body, created, modified] => {
            let created = parse_timestamp(created)
                .ok_or_else(|| StoreError::Unreadable(format!("bad creation date `{created}`")))?;
            let modified = parse_timestamp(modified).ok_or_else(|| {
                StoreError::Unreadable(format!("bad modification date `{modified}`"))
            })?;
            Ok(Record::new(*title, *body, created, modified))
        }
        ["E", rest @ ..] => Err(StoreError::Unreadable(rest.join(" "))),
        _ => Err(StoreError::Unreadable(format!("unexpected row of {} fields", fields.len()))),
    }
}

impl NoteStore for OsaScriptStore {
    fn scan(
        &self,
        request: &ScanRequest<'_>,
        timeout: Duration,
    ) -> Result<Vec<Scanned>, StoreError> {
        let script = scan_script(request);
        debug!(
            "osascript scan: {} cap={} limit={}",
            request.bounds.describe(),
            request.scan_cap,
            request.limit
        );
        let out = self.run(&script, &[], timeout)?;
        Ok(parse_rows(&out))
    }

    fn count(
        &self,
        bounds: &Bounds,
        scan_cap: usize,
        timeout: Duration,
    ) -> Result<usize, StoreError> {
        let script = count_script(bounds, scan_cap);
        debug!("osascript count: {} cap={scan_cap}", bounds.describe());
        let out = self.run(&script, &[], timeout)?;
        out.trim()
            .parse()
            .map_err(|_| StoreError::Malformed(format!("expected a count, got `{}`", out.trim())))
    }

    fn rewrite(
        &self,
        original_title: &str,
        title: &str,
        body: &str,
        timeout: Duration,
    ) -> Result<(), StoreError> {
        match self.run(REWRITE_SCRIPT, &[original_title, title, body], timeout) {
            Err(StoreError::Unavailable(msg)) if msg.contains("(1404)") => {
                Err(StoreError::NotFound(original_title.to_string()))
            }
            other => other.map(|_| ()),
        }
    }
}
