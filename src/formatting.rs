use yansi::Paint;

use crate::gateway::Statistics;
use crate::mutation::{MarkReport, MarkStatus};
use crate::record::{Record, format_timestamp};

const PREVIEW_LEN: usize = 100;

/// Color palette for consistent theming
pub struct ColorPalette {
    pub primary: (u8, u8, u8),   // indices, muted text
    pub secondary: (u8, u8, u8), // headers, emphasis
    pub timestamp: (u8, u8, u8), // timestamps
    pub highlight: (u8, u8, u8), // tag matches
    pub failure: (u8, u8, u8),   // failed writes
}

impl ColorPalette {
    pub const CATPPUCCIN: Self = Self {
        primary: (108, 112, 134),   // Gray
        secondary: (148, 226, 213), // Teal
        timestamp: (137, 180, 250), // Blue
        highlight: (243, 139, 168), // Pink
        failure: (235, 160, 172),   // Maroon
    };
}

/// Formatting context passed through the console output
pub struct FormatContext {
    pub use_color: bool,
    pub palette: ColorPalette,
    pub width: Option<usize>,
}

impl FormatContext {
    pub fn new(use_color: bool) -> Self {
        Self { use_color, palette: ColorPalette::CATPPUCCIN, width: None }
    }

    pub fn from_env() -> Self {
        let use_color = std::env::var("NO_COLOR").is_err();
        let width = terminal_size::terminal_size().map(|(w, _)| w.0 as usize);
        Self { width, ..Self::new(use_color) }
    }

    fn paint(&self, text: &str, rgb: (u8, u8, u8), bold: bool) -> String {
        if !self.use_color {
            return text.to_string();
        }
        let (r, g, b) = rgb;
        if bold {
            Paint::rgb(text, r, g, b).bold().to_string()
        } else {
            Paint::rgb(text, r, g, b).to_string()
        }
    }

    pub fn format_header(&self, text: &str) -> String {
        self.paint(text, self.palette.secondary, true)
    }

    pub fn format_muted(&self, text: &str) -> String {
        self.paint(text, self.palette.primary, false)
    }

    pub fn format_timestamp(&self, text: &str) -> String {
        self.paint(text, self.palette.timestamp, false)
    }

    pub fn highlight_match(&self, text: &str, query: Option<&str>) -> String {
        let Some(q) = query else { return text.to_string() };
        if q.is_empty() || !self.use_color {
            return text.to_string();
        }

        let q_lower = q.to_lowercase();
        let mut out = String::new();
        let mut remaining = text;

        // Offsets found in the lowercased copy are only reused when
        // lowercasing kept every byte position.
        loop {
            let lower = remaining.to_lowercase();
            let Some(pos) = lower.find(&q_lower) else { break };
            let end = pos + q_lower.len();
            if lower.len() != remaining.len()
                || !remaining.is_char_boundary(pos)
                || !remaining.is_char_boundary(end)
            {
                break;
            }
            out.push_str(&remaining[..pos]);
            out.push_str(&self.paint(&remaining[pos..end], self.palette.highlight, true));
            remaining = &remaining[end..];
        }
        out.push_str(remaining);
        out
    }

    fn preview_width(&self) -> usize {
        // "Preview: " prefix
        self.width.map_or(PREVIEW_LEN, |w| w.saturating_sub(9).clamp(10, PREVIEW_LEN))
    }

    pub fn format_records(&self, records: &[Record], tag: Option<&str>) -> String {
        if records.is_empty() {
            return "No notes found.".to_string();
        }
        let rule = "=".repeat(60);
        let mut out = format!(
            "{rule}\n{}\n{rule}\n",
            self.format_header(&format!("FOUND {} NOTES", records.len()))
        );
        for (i, record) in records.iter().enumerate() {
            let preview = truncate_with_ellipsis(&plain_text(&record.body), self.preview_width());
            out.push_str(&format!(
                "\n{}\nTitle: {}\nCreated: {}\nModified: {}\nPreview: {}\n{}\n",
                self.format_muted(&format!("NOTE #{}", i + 1)),
                self.highlight_match(&record.title, tag),
                self.format_timestamp(&format_timestamp(&record.created)),
                self.format_timestamp(&format_timestamp(&record.modified)),
                self.highlight_match(&preview, tag),
                self.format_muted(&"-".repeat(60)),
            ));
        }
        out
    }

    pub fn format_statistics(&self, stats: &Statistics, tag: Option<&str>) -> String {
        let mut out = format!(
            "{}\nWindow: {}\nTotal notes: {}\n",
            self.format_header("STATISTICS"),
            stats.window,
            stats.total
        );
        let label = match tag {
            Some(t) => format!("Unmarked notes matching '{t}'"),
            None => "Unmarked notes".to_string(),
        };
        out.push_str(&format!("{label}: {}\n", stats.visible));
        out
    }

    pub fn format_report(&self, report: &MarkReport) -> String {
        let mut out = format!("{}\n", self.format_header(&format!("Mark report: {}", report.summary())));
        for outcome in &report.outcomes {
            let status = match &outcome.status {
                MarkStatus::Marked => self.paint("marked", self.palette.secondary, false),
                MarkStatus::AlreadyMarked => self.format_muted("already marked"),
                MarkStatus::WriteFailed(err) => {
                    self.paint(&format!("failed: {err}"), self.palette.failure, false)
                }
            };
            out.push_str(&format!("  {} | {status}\n", truncate_with_ellipsis(&outcome.title, 50)));
        }
        out
    }
}

/// Body text with markup removed and whitespace collapsed.
pub fn plain_text(body: &str) -> String {
    let mut text = String::with_capacity(body.len());
    let mut in_tag = false;
    for ch in body.chars() {
        match ch {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate text to a width, appending an ellipsis when needed.
pub fn truncate_with_ellipsis(text: &str, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    if text.chars().count() <= max_width {
        return text.to_string();
    }
    let mut out = text.chars().take(max_width.saturating_sub(1)).collect::<String>();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::tests::at;
    use crate::mutation::MarkOutcome;

    fn rec(title: &str, body: &str) -> Record {
        let t = at(2024, 1, 5, 9, 0, 0);
        Record::new(title, body, t, t)
    }

    #[test]
    fn plain_text_strips_markup() {
        assert_eq!(
            plain_text("<div><h1>Title</h1></div><div>a &amp; b<br></div>"),
            "Title a & b"
        );
    }

    #[test]
    fn truncation() {
        assert_eq!(truncate_with_ellipsis("abcdef", 4), "abc…");
        assert_eq!(truncate_with_ellipsis("abc", 4), "abc");
        assert_eq!(truncate_with_ellipsis("abc", 0), "");
    }

    #[test]
    fn records_listing_without_color() {
        let ctx = FormatContext::new(false);
        let out = ctx.format_records(&[rec("First", "<p>hello</p>")], None);
        assert!(out.contains("FOUND 1 NOTES"));
        assert!(out.contains("Title: First"));
        assert!(out.contains("Modified: 2024-01-05 09:00:00"));
        assert!(out.contains("Preview: hello"));
        assert_eq!(ctx.format_records(&[], None), "No notes found.");
    }

    #[test]
    fn long_preview_is_cut() {
        let ctx = FormatContext::new(false);
        let out = ctx.format_records(&[rec("T", &"x".repeat(300))], None);
        let line = out.lines().find(|l| l.starts_with("Preview: ")).unwrap();
        assert_eq!(line.chars().count(), "Preview: ".len() + PREVIEW_LEN);
    }

    #[test]
    fn highlight_with_color() {
        let ctx = FormatContext::new(true);
        let out = ctx.highlight_match("about AI things", Some("ai"));
        assert!(out.contains("AI"));
        assert!(out.len() > "about AI things".len());
        let plain = FormatContext::new(false);
        assert_eq!(plain.highlight_match("about AI", Some("ai")), "about AI");
    }

    #[test]
    fn report_lines() {
        let ctx = FormatContext::new(false);
        let report = MarkReport {
            outcomes: vec![
                MarkOutcome { title: "a".into(), status: MarkStatus::Marked },
                MarkOutcome { title: "b".into(), status: MarkStatus::AlreadyMarked },
                MarkOutcome { title: "c".into(), status: MarkStatus::WriteFailed("boom".into()) },
            ],
        };
        let out = ctx.format_report(&report);
        assert!(out.starts_with("Mark report: 1 / 3 marked"));
        assert!(out.contains("b | already marked"));
        assert!(out.contains("c | failed: boom"));
    }

    #[test]
    fn statistics_block() {
        let ctx = FormatContext::new(false);
        let stats = Statistics { window: "modified since 2024-01-01".into(), total: 7, visible: 3 };
        let out = ctx.format_statistics(&stats, Some("AI"));
        assert!(out.contains("Total notes: 7"));
        assert!(out.contains("Unmarked notes matching 'AI': 3"));
    }
}
