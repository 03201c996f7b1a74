//! Live terminal display of the simulation
//!
//! The display is fed a `Frame`, built by value from the engine after each
//! step. It never talks to the engine itself.

use crossterm::{
    cursor::{Hide, MoveTo, MoveToNextLine, Show},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use server_load_sim::{
    Float, HistorySummary, ServerStatus, SimulationParameters, StatisticsSnapshot,
};
use std::io::{self, Write};

/// Queue length that fills a whole queue bar
const QUEUE_BAR_WIDTH: usize = 10;

/// Most servers listed before the list gets truncated
const MAX_SERVER_ROWS: usize = 16;

/// Everything that is shown on one refresh
#[derive(Debug)]
pub struct Frame<'a> {
    /// Parameters in effect
    pub params: SimulationParameters,

    /// Simulated time (seconds)
    pub elapsed: Float,

    /// State of every server
    pub servers: Vec<ServerStatus>,

    /// Aggregate statistics of the pool
    pub snapshot: StatisticsSnapshot,

    /// Now / Avg / Peak columns
    pub history: HistorySummary,

    /// Whether the per-server statistics panel is open
    pub show_details: bool,

    /// Outcome of the last command, if any
    pub status: Option<&'a str>,

    /// What is being typed at the prompt
    pub prompt: &'a str,
}

/// One line of output, with an optional color
type Line = (Option<Color>, String);

/// Build the lines of a frame
pub fn layout(frame: &Frame) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut line = |color: Option<Color>, text: String| lines.push((color, text));
    let header = Some(Color::Cyan);
    let section = Some(Color::Yellow);

    // Header
    let params = &frame.params;
    line(header, "┌─ Real-Time Server Load Simulator ─┐".to_owned());
    line(
        header,
        format!(
            "│ Servers: {} | Arrival Rate: {:.1}/s",
            frame.servers.len(),
            params.arrival_rate
        ),
    );
    line(
        header,
        format!(
            "│ Processing Time: {:.1}s ± {:.1}s",
            params.mean_processing_time, params.processing_variance
        ),
    );
    line(header, format!("│ Simulated Time: {:.1}s", frame.elapsed));
    line(header, "└────────────────────────────────────┘".to_owned());
    line(None, String::new());

    // Queue bars
    line(section, "Server Queues:".to_owned());
    for server in frame.servers.iter().take(MAX_SERVER_ROWS) {
        let (status, color) = if server.is_busy {
            ("[BUSY]", Color::Red)
        } else {
            ("[IDLE]", Color::Green)
        };
        line(
            Some(color),
            format!(
                "Server {:>2}: {} ({}/{}) {}",
                server.id + 1,
                queue_bar(server.queue_length),
                server.queue_length,
                QUEUE_BAR_WIDTH,
                status
            ),
        );
    }
    if frame.servers.len() > MAX_SERVER_ROWS {
        line(
            None,
            format!("  ... and {} more", frame.servers.len() - MAX_SERVER_ROWS),
        );
    }
    line(None, String::new());

    // Statistics table
    let history = &frame.history;
    line(section, "Live Statistics:".to_owned());
    lines_extend(
        &mut line,
        [
            "┌─────────────────┬────────┬────────┬────────┐".to_owned(),
            "│     Metric      │  Now   │  Avg   │  Peak  │".to_owned(),
            "├─────────────────┼────────┼────────┼────────┤".to_owned(),
            format!(
                "│ Tasks/sec       │ {:>6.1} │ {:>6.1} │ {:>6.1} │",
                history.throughput.now, history.throughput.avg, history.throughput.peak
            ),
            format!(
                "│ Avg Wait (ms)   │ {:>6.0} │ {:>6.0} │ {:>6.0} │",
                history.wait_time.now * 1000.,
                history.wait_time.avg * 1000.,
                history.wait_time.peak * 1000.
            ),
            format!(
                "│ Server Util.    │ {:>5.0}% │ {:>5.0}% │ {:>5.0}% │",
                history.utilization.now, history.utilization.avg, history.utilization.peak
            ),
            format!(
                "│ Queue Length    │ {:>6.0} │ {:>6.1} │ {:>6.0} │",
                history.queue_length.now, history.queue_length.avg, history.queue_length.peak
            ),
            "└─────────────────┴────────┴────────┴────────┘".to_owned(),
            format!(
                "Completed Tasks: {} ({:.2}/s overall)",
                frame.snapshot.completed_tasks, frame.snapshot.current_throughput
            ),
        ],
    );
    line(None, String::new());

    // Per-server details
    if frame.show_details {
        line(section, "Server Details:".to_owned());
        line(
            None,
            "  Server  Processed  Waiting  Avg Wait (ms)  Max Wait (ms)".to_owned(),
        );
        for server in frame.servers.iter().take(MAX_SERVER_ROWS) {
            line(
                None,
                format!(
                    "  {:>6}  {:>9}  {:>7}  {:>13.0}  {:>13.0}",
                    server.id + 1,
                    server.total_processed,
                    server.waiting,
                    server.wait.mean() * 1000.,
                    server.wait.max() * 1000.
                ),
            );
        }
        line(None, String::new());
    }

    // Commands, status and prompt
    line(
        Some(Color::Blue),
        "Commands: s <servers> | r <rate> | p <time> | v <variance> | stats | reset | q".to_owned(),
    );
    if let Some(status) = frame.status {
        line(Some(Color::Magenta), status.to_owned());
    }
    line(None, format!("> {}", frame.prompt));
    lines
}

/// Push several uncolored lines
fn lines_extend(
    line: &mut impl FnMut(Option<Color>, String),
    texts: impl IntoIterator<Item = String>,
) {
    for text in texts {
        line(None, text);
    }
}

/// Bar showing a queue length, saturating at `QUEUE_BAR_WIDTH`
pub fn queue_bar(queue_length: usize) -> String {
    let filled = queue_length.min(QUEUE_BAR_WIDTH);
    "█".repeat(filled) + &"░".repeat(QUEUE_BAR_WIDTH - filled)
}

/// Renderer of frames onto a terminal-like output
pub struct Display<W: Write> {
    out: W,
}
//
impl<W: Write> Display<W> {
    /// Render to some output
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Redraw the whole screen
    pub fn render(&mut self, frame: &Frame) -> io::Result<()> {
        queue!(self.out, MoveTo(0, 0))?;
        for (color, text) in layout(frame) {
            match color {
                Some(color) => {
                    queue!(self.out, SetForegroundColor(color), Print(text), ResetColor)?
                }
                None => queue!(self.out, Print(text))?,
            }
            queue!(self.out, Clear(ClearType::UntilNewLine), MoveToNextLine(1))?;
        }
        queue!(self.out, Clear(ClearType::FromCursorDown))?;
        self.out.flush()
    }
}

/// Raw mode and alternate screen, restored when dropped
pub struct TerminalGuard;
//
impl TerminalGuard {
    /// Take over the terminal
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let guard = TerminalGuard;
        execute!(io::stdout(), EnterAlternateScreen, Hide)?;
        Ok(guard)
    }
}
//
impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

/// Give the terminal back in its normal state
///
/// Also called from the panic hook, since release builds abort on panic
/// without running destructors.
pub fn restore_terminal() {
    // Errors cannot be reported from here, so every step is attempted
    let _ = execute!(io::stdout(), Show, LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();
}
