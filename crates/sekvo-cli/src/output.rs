//! Terminal rendering for CLI output: panels, tables, JSON.

use console::{Term, measure_text_width, style};
use sekvo_core::Result;

const MIN_WIDTH: usize = 20;
const MAX_WIDTH: usize = 100;

/// `{"value": text}`, pretty-printed.
pub fn json_value(text: &str) -> Result<String> {
    Ok(serde_json::to_string_pretty(&serde_json::json!({ "value": text }))?)
}

fn terminal_width() -> usize {
    let (_, cols) = Term::stdout().size();
    (cols as usize).clamp(MIN_WIDTH, MAX_WIDTH)
}

/// Greedy word wrap; words longer than `width` are split.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word = word.to_string();
            while measure_text_width(&word) > width {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                let split = word
                    .char_indices()
                    .nth(width)
                    .map(|(i, _)| i)
                    .unwrap_or(word.len());
                lines.push(word[..split].to_string());
                word = word[split..].to_string();
            }
            if word.is_empty() {
                continue;
            }
            let needed = measure_text_width(&line)
                + usize::from(!line.is_empty())
                + measure_text_width(&word);
            if needed > width && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        lines.push(line);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Box `body` under `title`, `width` columns wide including the border.
pub fn render_panel(title: &str, body: &str, width: usize) -> String {
    let width = width.max(MIN_WIDTH);
    let inner = width - 4;
    let mut out = String::new();
    out.push_str(&top_border(title, width));
    out.push('\n');
    for line in wrap(body, inner) {
        let pad = inner.saturating_sub(measure_text_width(&line));
        out.push_str(&format!("│ {line}{} │\n", " ".repeat(pad)));
    }
    out.push_str(&bottom_border(width));
    out
}

pub fn print_panel(title: &str, body: &str) {
    println!("{}", render_panel(title, body, terminal_width()));
}

fn top_border(title: &str, width: usize) -> String {
    let label = format!(" {title} ");
    let fill = width.saturating_sub(measure_text_width(&label) + 3);
    format!("╭─{label}{}╮", "─".repeat(fill))
}

fn bottom_border(width: usize) -> String {
    format!("╰{}╯", "─".repeat(width.saturating_sub(2)))
}

/// Opening line of a streamed panel; tokens follow unframed.
pub fn frame_top(title: &str) -> String {
    style(top_border(title, terminal_width())).cyan().to_string()
}

pub fn frame_bottom() -> String {
    style(bottom_border(terminal_width())).cyan().to_string()
}

/// Left-aligned columns with a bold header row.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(measure_text_width(cell));
            }
        }
    }

    let format_row = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = style(format_row(headers.to_vec())).bold().to_string();
    for row in rows {
        out.push('\n');
        out.push_str(&format_row(row.iter().map(String::as_str).collect()));
    }
    out
}
