//! Interface de terminal do autoapply: spinner e saída colorida.
//!
//! Usa as crates `indicatif` para o spinner de progresso e `console` para
//! estilização com cores. O [`ConsoleSink`] acompanha visualmente os eventos
//! do coordenador no terminal, e o [`LogWriter`] permite que as linhas de log
//! do `tracing` passem pelo spinner sem quebrá-lo.

use std::io::{self, Write};
use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::fmt::MakeWriter;

use crate::coordinator::{CoordinatorState, Outcome, RunSummary, StopReason};
use crate::events::{CoordinatorEvent, EventSink};

/// Indicador visual dos eventos do coordenador no terminal.
///
/// Exibe um spinner enquanto uma candidatura está em andamento e mensagens
/// coloridas para sucesso (verde), falha (vermelho) e timeout (amarelo).
pub struct ConsoleSink {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new_spinner())
    }

    fn with_bar(pb: ProgressBar) -> Self {
        // Template is a literal; a parse failure falls back to the default style.
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    /// Writer para o `tracing-subscriber` que suspende o spinner a cada linha.
    pub fn log_writer(&self) -> LogWriter {
        LogWriter {
            pb: self.pb.clone(),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: &CoordinatorEvent) {
        match event {
            CoordinatorEvent::Began { item_id, .. } => {
                self.pb.enable_steady_tick(Duration::from_millis(100));
                self.pb.set_message(format!("IN_PROGRESS: {item_id}"));
            }
            CoordinatorEvent::Ended { record } => {
                self.pb.set_message("IDLE");
                let line = match &record.outcome {
                    Outcome::Success => format!(
                        "  {} {} ({}ms)",
                        self.green.apply_to("✓"),
                        record.item_id,
                        record.duration_ms
                    ),
                    Outcome::Failure(reason) => format!(
                        "  {} {}: {reason}",
                        self.red.apply_to("✗"),
                        record.item_id
                    ),
                    Outcome::Timeout => format!(
                        "  {} {}: timed out",
                        self.yellow.apply_to("⏱"),
                        record.item_id
                    ),
                };
                self.pb.println(line);
            }
            CoordinatorEvent::TimedOut {
                item_id,
                elapsed_ms,
            } => {
                self.pb.println(format!(
                    "  {} Recovering {item_id} after {elapsed_ms}ms",
                    self.yellow.apply_to("↻")
                ));
            }
            CoordinatorEvent::PageAdvanced { page } => {
                self.pb
                    .println(format!("  {}", self.dim.apply_to(format!("page {page}"))));
            }
            CoordinatorEvent::Stopped { .. } => self.pb.finish_and_clear(),
            CoordinatorEvent::Deferred { .. }
            | CoordinatorEvent::ActionFailed { .. }
            | CoordinatorEvent::Exhausted { .. }
            | CoordinatorEvent::LimitReached { .. } => {}
        }
    }
}

/// Fonte de writers para o `tracing-subscriber` que não disputa o terminal
/// com o spinner.
#[derive(Clone)]
pub struct LogWriter {
    pb: ProgressBar,
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogLine;

    fn make_writer(&'a self) -> Self::Writer {
        LogLine {
            pb: self.pb.clone(),
            buf: Vec::new(),
        }
    }
}

/// Acumula um evento formatado e o grava no stderr com o spinner suspenso.
pub struct LogLine {
    pb: ProgressBar,
    buf: Vec<u8>,
}

impl Write for LogLine {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let buf = std::mem::take(&mut self.buf);
        self.pb.suspend(|| io::stderr().write_all(&buf))
    }
}

impl Drop for LogLine {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// Imprime o resumo final de uma execução.
pub fn print_summary(summary: &RunSummary) {
    let headline = match summary.stop_reason {
        StopReason::Shutdown => Style::new().yellow().bold(),
        StopReason::SourceFailed => Style::new().red().bold(),
        _ if summary.failed + summary.timed_out > 0 => Style::new().yellow().bold(),
        _ => Style::new().green().bold(),
    };
    println!();
    println!("{}", headline.apply_to("─── Run Summary ───"));
    println!("  stopped:    {}", summary.stop_reason);
    println!("  attempted:  {}", summary.attempted());
    println!("  succeeded:  {}", summary.succeeded);
    println!("  failed:     {}", summary.failed);
    println!("  timed out:  {}", summary.timed_out);
    println!("  processed:  {}", summary.processed);
    println!("  pages:      {}", summary.pages_visited);
}

/// Imprime o snapshot persistido em JSON formatado.
pub fn print_state(state: &CoordinatorState) {
    println!("{}", Style::new().cyan().bold().apply_to("─── Coordinator State ───"));
    println!("  phase:      {}", state.phase());
    println!("  page:       {}", state.current_page);
    println!("  processed:  {}", state.processed_ids.len());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(state).unwrap_or_default()
    );
}
