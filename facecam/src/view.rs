//! Rendering sinks for roster patches and the status line.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::roster::{Patch, RosterEntry};

/// Where roster patches and status updates end up.
///
/// Every patch is a "set" operation, so applying one twice leaves the
/// view unchanged.
pub trait RosterView {
    fn apply(&mut self, patch: &Patch);

    fn status(&mut self, text: &str);

    /// Called once after each batch of patches.
    fn flush(&mut self) {}
}

impl<V: RosterView + ?Sized> RosterView for Box<V> {
    fn apply(&mut self, patch: &Patch) {
        (**self).apply(patch)
    }

    fn status(&mut self, text: &str) {
        (**self).status(text)
    }

    fn flush(&mut self) {
        (**self).flush()
    }
}

/// Logs every patch; the default when no page is written.
#[derive(Debug, Default)]
pub struct LogView;

impl RosterView for LogView {
    fn apply(&mut self, patch: &Patch) {
        match patch {
            Patch::InsertRow(entry) => log::info!(
                "new person {} \"{}\" color {} samples {}",
                entry.id,
                entry.name,
                entry.color,
                entry.samples
            ),
            Patch::SetName { id, name } => log::info!("{id} is now \"{name}\""),
            Patch::SetThumbnail { id, .. } => log::debug!("{id} thumbnail updated"),
            Patch::SetSamples { id, samples } => log::info!("{id} samples {samples}"),
            Patch::SetTraining { id, on } => {
                log::info!("training {} for {id}", if *on { "on" } else { "off" })
            }
            Patch::SetToggleEnabled { id, enabled } => {
                log::debug!("{id} toggle {}", if *enabled { "enabled" } else { "disabled" })
            }
            Patch::SetComposite(_) => {}
            Patch::SetProcessingTime(ms) => log::debug!("processing time {ms:.2} ms"),
        }
    }

    fn status(&mut self, text: &str) {
        log::info!("{text}");
    }
}

/// Row model fed by patches; the state a page is rendered from.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Table {
    pub rows: Vec<RosterEntry>,
    pub composite: Option<String>,
    pub processing_time: Option<f64>,
    pub status: String,
}

impl Table {
    fn row_mut(&mut self, id: &str) -> Option<&mut RosterEntry> {
        self.rows.iter_mut().find(|row| row.id == id)
    }

    pub fn apply(&mut self, patch: &Patch) {
        match patch {
            Patch::InsertRow(entry) => match self.row_mut(&entry.id) {
                Some(row) => *row = entry.clone(),
                None => self.rows.push(entry.clone()),
            },
            Patch::SetName { id, name } => {
                if let Some(row) = self.row_mut(id) {
                    row.name = name.clone();
                }
            }
            Patch::SetThumbnail { id, data_url } => {
                if let Some(row) = self.row_mut(id) {
                    row.thumbnail = Some(data_url.clone());
                }
            }
            Patch::SetSamples { id, samples } => {
                if let Some(row) = self.row_mut(id) {
                    row.samples = *samples;
                }
            }
            Patch::SetTraining { id, on } => {
                if let Some(row) = self.row_mut(id) {
                    row.training = *on;
                }
            }
            Patch::SetToggleEnabled { id, enabled } => {
                if let Some(row) = self.row_mut(id) {
                    row.toggle_enabled = *enabled;
                }
            }
            Patch::SetComposite(data_url) => self.composite = Some(data_url.clone()),
            Patch::SetProcessingTime(ms) => self.processing_time = Some(*ms),
        }
    }

    pub fn render(&self) -> String {
        let mut html = String::new();
        html.push_str(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
             <meta http-equiv=\"refresh\" content=\"1\">\n<title>Face Learner</title>\n</head>\n<body>\n",
        );
        let _ = writeln!(html, "<p id=\"server-status\">{}</p>", escape(&self.status));
        if let Some(composite) = &self.composite {
            let _ = writeln!(
                html,
                "<div id=\"detected-faces\"><img src=\"{}\" width=\"400\"></div>",
                escape(composite)
            );
        }
        if let Some(ms) = self.processing_time {
            let _ = writeln!(
                html,
                "<p id=\"processing-time\">Processing time: <strong>{ms:.2}</strong> ms</p>"
            );
        }

        html.push_str(
            "<table id=\"faces\">\n<tr><th>#</th><th>Color</th><th>Name</th>\
             <th>Face</th><th>Samples</th><th>Training</th></tr>\n",
        );
        for (n, row) in self.rows.iter().enumerate() {
            let thumbnail = row
                .thumbnail
                .as_deref()
                .map(|src| format!("<img src=\"{}\" width=\"48\" height=\"48\">", escape(src)))
                .unwrap_or_default();
            let _ = writeln!(
                html,
                "<tr id=\"{id}\"><td>{n}</td>\
                 <td><span style=\"display:inline-block;width:1em;height:1em;background:{color}\"></span></td>\
                 <td><input type=\"text\" value=\"{name}\"></td><td>{thumbnail}</td><td>{samples}</td>\
                 <td><input type=\"checkbox\"{checked}{disabled}></td></tr>",
                id = escape(&row.id),
                n = n + 1,
                color = escape(&row.color),
                name = escape(&row.name),
                samples = row.samples,
                checked = if row.training { " checked" } else { "" },
                disabled = if row.toggle_enabled { "" } else { " disabled" },
            );
        }
        html.push_str("</table>\n</body>\n</html>\n");
        html
    }
}

/// Self-refreshing HTML page rewritten after every batch.
pub struct HtmlPage {
    path: PathBuf,
    table: Table,
    dirty: bool,
}

impl HtmlPage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: Table::default(),
            dirty: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &Table {
        &self.table
    }
}

impl RosterView for HtmlPage {
    fn apply(&mut self, patch: &Patch) {
        self.table.apply(patch);
        self.dirty = true;
    }

    fn status(&mut self, text: &str) {
        log::info!("{text}");
        self.table.status = text.to_string();
        self.dirty = true;
        self.flush();
    }

    fn flush(&mut self) {
        if !self.dirty {
            return;
        }
        match fs::write(&self.path, self.table.render()) {
            Ok(()) => self.dirty = false,
            Err(err) => log::warn!("failed to write {}: {err}", self.path.display()),
        }
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
