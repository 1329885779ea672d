use std::collections::HashMap;
use std::time::Instant;

use anyhow::Result;
use colored::{Color, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use pkgflow_core::events::{Notification, Payload, QueueEvent};

/// Colors assigned to packages for distinguishing their output.
const PKG_COLORS: &[Color] = &[
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Magenta,
    Color::BrightCyan,
    Color::BrightGreen,
    Color::BrightYellow,
    Color::BrightBlue,
];

/// Width (in characters) of the separator line drawn around job output.
const SEPARATOR_WIDTH: usize = 60;

/// Create a styled progress bar over the number of queued jobs.
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_message(message.to_string());
    pb
}

/// Spawn a renderer task for bus notifications.
///
/// The task ends once every sender feeding `rx` is gone (i.e. the event bus
/// has been dropped). With `show_output` false, job output lines are hidden
/// and only start/finish lines are printed.
pub fn spawn_renderer(
    rx: UnboundedReceiver<Notification>,
    total: usize,
    message: &str,
    show_output: bool,
) -> JoinHandle<Result<()>> {
    let pb = (total > 0).then(|| create_progress_bar(total as u64, message));
    tokio::spawn(async move { render_loop(rx, pb, show_output).await })
}

/// Get the color for a package id, assigning a new one if not seen before.
fn pkg_color(color_map: &mut HashMap<String, Color>, color_idx: &mut usize, id: &str) -> Color {
    *color_map.entry(id.to_string()).or_insert_with(|| {
        let c = PKG_COLORS[*color_idx % PKG_COLORS.len()];
        *color_idx += 1;
        c
    })
}

/// Build a separator line: `─── label ─────────────────`
fn separator_line(label: &str, color: Color) -> String {
    let label = format!(" {} ", label);
    let prefix_dashes = 3;
    let suffix_dashes = SEPARATOR_WIDTH.saturating_sub(prefix_dashes + label.chars().count());
    format!(
        "{}{}{}",
        "─".repeat(prefix_dashes).color(color),
        label.color(color).bold(),
        "─".repeat(suffix_dashes).color(color),
    )
}

/// Build a plain closing separator line: `──────────────────`
fn closing_separator(color: Color) -> String {
    format!("{}", "─".repeat(SEPARATOR_WIDTH).color(color))
}

/// Package id for a progress channel (`info-<id>`).
fn progress_channel_id(channel: &str) -> &str {
    channel.strip_prefix("info-").unwrap_or(channel)
}

async fn render_loop(
    mut rx: UnboundedReceiver<Notification>,
    pb: Option<ProgressBar>,
    show_output: bool,
) -> Result<()> {
    let mut color_map: HashMap<String, Color> = HashMap::new();
    let mut color_idx = 0usize;
    let mut started_at: HashMap<String, Instant> = HashMap::new();

    while let Some(Notification { channel, payload }) = rx.recv().await {
        match payload {
            Payload::Queue(QueueEvent::Started { ref job }) => {
                let id = &job.package.id;
                let color = pkg_color(&mut color_map, &mut color_idx, id);
                started_at.insert(id.clone(), Instant::now());
                let label = format!("{} {} ({})", job.operation, job.package.display_name(), job.kind);
                println!("{}", separator_line(&label, color));
                if let Some(ref pb) = pb {
                    pb.set_message(format!("{} {}", job.operation, id));
                }
            }
            Payload::Progress(ref line) => {
                let id = progress_channel_id(&channel);
                let is_error = line.starts_with("ERROR:");
                if !show_output && !is_error {
                    continue;
                }
                let color = pkg_color(&mut color_map, &mut color_idx, id);
                let prefix = format!("[{}]", id).color(color).bold();
                if is_error {
                    eprintln!("{} {}", prefix, line.red());
                } else {
                    println!("{} {}", prefix, line);
                }
            }
            Payload::Completed(ref completion) => {
                let id = &completion.package.id;
                let color = pkg_color(&mut color_map, &mut color_idx, id);
                let prefix = format!("[{}]", id).color(color).bold();
                let elapsed = started_at
                    .remove(id)
                    .map(|start| format!("({:.1}s)", start.elapsed().as_secs_f64()))
                    .unwrap_or_default();
                if completion.success {
                    println!("{} {} {}", prefix, "SUCCESS".green(), elapsed.dimmed());
                } else {
                    eprintln!(
                        "{} {} {}",
                        prefix,
                        format!("FAILED (exit {})", completion.exit_code).red(),
                        elapsed.dimmed()
                    );
                }
                println!("{}", closing_separator(color));
                if let Some(ref pb) = pb {
                    pb.inc(1);
                }
            }
            Payload::Queue(QueueEvent::Accepted { .. }) | Payload::Queue(QueueEvent::Idle) => {}
        }
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    Ok(())
}
