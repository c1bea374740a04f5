use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::format_local;
use crate::task::Task;

const EMPTY_LIST: &str = "No tasks available yet!";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn print_task_list(&self, heading: &str, tasks: &[Task]) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_task_list(out, heading, tasks)
    }

    pub fn write_task_list<W: Write>(
        &self,
        mut out: W,
        heading: &str,
        tasks: &[Task],
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(heading, "1"))?;

        if tasks.is_empty() {
            writeln!(out, "{EMPTY_LIST}")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Done".to_string(),
            "Star".to_string(),
            "Created".to_string(),
            "Name".to_string(),
        ];

        let rows = tasks
            .iter()
            .map(|task| {
                let done = if task.completed { "[x]" } else { "[ ]" };
                let star = if task.important {
                    self.paint("\u{2605}", "33")
                } else {
                    "\u{2606}".to_string()
                };
                let name = if task.completed {
                    self.paint(&task.name, "9")
                } else {
                    task.name.clone()
                };
                vec![
                    self.paint(task.id.short(), "36"),
                    done.to_string(),
                    star,
                    format_local(task.created_at),
                    name,
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| UnicodeWidthStr::width(h.as_str())).collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let last = column_count.saturating_sub(1);
    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| format!("{header:width$}"))
        .collect();
    writeln!(writer, "{}", header_line.join(" ").trim_end())?;

    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    writeln!(writer, "{}", rule.join(" "))?;

    for row in rows {
        let mut line = String::new();
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            line.push_str(cell);
            if idx < last {
                let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
                line.push_str(&" ".repeat(widths[idx].saturating_sub(visible_width) + 1));
            }
        }
        writeln!(writer, "{line}")?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Renderer, strip_ansi};
    use crate::config::Config;
    use crate::task::{Task, TaskId};

    fn render(tasks: &[Task]) -> String {
        let mut buf = Vec::new();
        Renderer::plain()
            .write_task_list(&mut buf, "All Tasks", tasks)
            .expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn empty_list_prints_placeholder() {
        assert_eq!(render(&[]), "All Tasks\nNo tasks available yet!\n");
    }

    #[test]
    fn rows_show_flags_and_short_ids() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).single().expect("valid time");
        let mut task = Task::new("Call dentist".to_string(), at);
        task.id = TaskId::from("0123456789abcdef");
        task.important = true;
        task.completed = true;

        let out = render(&[task]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "All Tasks");
        assert!(lines[1].starts_with("ID"));
        assert!(lines[3].starts_with("01234567 [x]"));
        assert!(lines[3].contains('\u{2605}'));
        assert!(lines[3].ends_with("Call dentist"));
    }

    #[test]
    fn color_setting_goes_through_config_parsing() {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("color".to_string(), "no".to_string())]);
        assert!(!Renderer::new(&cfg).expect("valid setting").color);

        cfg.apply_overrides(vec![("color".to_string(), "sometimes".to_string())]);
        assert!(Renderer::new(&cfg).is_err());
    }

    #[test]
    fn strip_ansi_removes_escape_sequences() {
        assert_eq!(strip_ansi("\x1b[33mstar\x1b[0m"), "star");
    }
}
