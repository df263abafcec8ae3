use crate::api::{Contributor, Snapshot, StatusTally};
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use std::fmt::{self, Display};
use std::io::Write;
use std::sync::Arc;

const THROBBER_SYMBOLS: [char; 10] = ['⠇', '⠏', '⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧'];
const MIN_COLUMN_WIDTH: usize = 5;
const COLUMN_MARGIN: usize = 4;
const RATE_LIMIT_MARKER: &str = "Ø";

/// Endless busy indicator.
#[derive(Debug, Default)]
pub struct Throbber {
    position: usize,
}

impl Iterator for Throbber {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        let symbol = THROBBER_SYMBOLS[self.position];
        self.position = (self.position + 1) % THROBBER_SYMBOLS.len();
        Some(symbol)
    }
}

/// Left aligned plain text table of contributors.
pub struct Table {
    headers: Vec<&'static str>,
    widths: Vec<usize>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(contributors: &[Contributor]) -> Self {
        let headers = vec!["id", "login", "count"];
        let mut widths: Vec<usize> = headers.iter().map(|h| h.len().max(MIN_COLUMN_WIDTH)).collect();
        let rows: Vec<Vec<String>> = contributors
            .iter()
            .enumerate()
            .map(|(i, contributor)| vec![(i + 1).to_string(), contributor.login.clone(), contributor.count.to_string()])
            .collect();
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }
        Table { headers, widths, rows }
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (header, width) in self.headers.iter().zip(&self.widths) {
            write!(f, "{:<w$}", header.to_uppercase(), w = width + COLUMN_MARGIN)?;
        }
        for row in &self.rows {
            writeln!(f)?;
            for (cell, width) in row.iter().zip(&self.widths) {
                write!(f, "{:<w$}", cell, w = width + COLUMN_MARGIN)?;
            }
        }
        Ok(())
    }
}

/// One rendered screen.
pub struct Frame {
    snapshot: Option<Arc<Snapshot>>,
    rate_limited: bool,
    throbber: char,
}

impl Frame {
    /// `snapshot` is `None` until the first refresh cycle completes.
    pub fn new(snapshot: Option<Arc<Snapshot>>, rate_limited: bool, throbber: char) -> Self {
        Frame {
            snapshot,
            rate_limited,
            throbber,
        }
    }
}

fn write_tally(f: &mut fmt::Formatter<'_>, kind: &str, tally: &StatusTally) -> fmt::Result {
    writeln!(f, "{} opened - {}", kind, tally.opened)?;
    writeln!(f, "{} old opened - {}", kind, tally.stale_opened)?;
    writeln!(f, "{} closed - {}", kind, tally.closed)
}

impl Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let empty = Snapshot::default();
        let snapshot = self.snapshot.as_deref().unwrap_or(&empty);
        write_tally(f, "PR", &snapshot.pulls)?;
        write_tally(f, "Issues", &snapshot.issues)?;
        writeln!(f)?;
        writeln!(f, "Top contributors:")?;
        writeln!(f, "{}", Table::new(&snapshot.contributors))?;
        let status = if self.snapshot.is_none() { "Loading ..." } else { " " };
        let marker = if self.rate_limited { RATE_LIMIT_MARKER } else { "" };
        write!(f, "{} | {}{}", self.throbber, status, marker)
    }
}

/// Clears the terminal and draws `frame` from the top left corner.
pub fn draw<W: Write>(out: &mut W, frame: &Frame) -> std::io::Result<()> {
    queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
    writeln!(out, "{}", frame)?;
    out.flush()
}

#[test]
fn throbber_cycles_test() {
    let symbols: Vec<char> = Throbber::default().take(11).collect();
    assert_eq!(symbols[0], '⠇');
    assert_eq!(symbols[9], '⠧');
    assert_eq!(symbols[10], '⠇');
}

#[test]
fn table_layout_test() {
    let contributors = vec![
        Contributor::new("octocat-with-long-name".to_string(), String::new(), 12),
        Contributor::new("bob".to_string(), String::new(), 3),
    ];
    let table = Table::new(&contributors).to_string();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("ID       LOGIN"));
    assert_eq!(lines[0].find("COUNT"), Some(9 + 22 + 4));
    assert!(lines[1].starts_with("1        octocat-with-long-name    12"));
    assert!(lines[2].starts_with("2        bob"));
}

#[test]
fn frame_loading_test() {
    let frame = Frame::new(None, false, '⠇').to_string();
    assert!(frame.contains("PR opened - 0"));
    assert!(frame.ends_with("⠇ | Loading ..."));
}

#[test]
fn frame_snapshot_test() {
    let snapshot = Snapshot::new(
        vec![Contributor::new("alice".to_string(), String::new(), 5)],
        StatusTally::new(4, 2, 1),
        StatusTally::new(7, 0, 3),
    );
    let frame = Frame::new(Some(Arc::new(snapshot)), true, '⠏').to_string();
    assert!(frame.contains("PR opened - 4\nPR old opened - 1\nPR closed - 2"));
    assert!(frame.contains("Issues opened - 7\nIssues old opened - 3\nIssues closed - 0"));
    assert!(frame.contains("Top contributors:\nID"));
    assert!(frame.contains("alice"));
    assert!(!frame.contains("Loading"));
    assert!(frame.ends_with("⠏ |  Ø"));
}

#[test]
fn draw_clears_screen_test() {
    let mut out = Vec::new();
    draw(&mut out, &Frame::new(None, false, '⠇')).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.starts_with("\u{1b}[2J"));
    assert!(out.contains("Loading ..."));
}
