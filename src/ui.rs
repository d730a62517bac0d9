use std::{path::Path, sync::Arc};

use eframe::egui::{self, Color32, RichText};
use rfd::FileDialog;
use tokio::{
    runtime::Handle,
    sync::oneshot::{self, error::TryRecvError},
};
use tracing::warn;

use crate::config::{self, Settings};
use crate::engine::DownloadEngine;
use crate::error::QualityFetchError;
use crate::model::{Marker, MediaFormat, QueueRow, Submission};

/// Blocking message shown on top of everything else until dismissed
pub struct Notice {
    pub title: &'static str,
    pub message: String,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            title: "Error",
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            title: "Info",
            message: message.into(),
        }
    }

    /// Returns true once the user has dismissed it.
    pub fn show(&self, ctx: &egui::Context) -> bool {
        let mut dismissed = false;
        egui::Window::new(self.title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(&self.message);
                ui.add_space(6.0);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        dismissed
    }
}

/// What the user asked the "Add to Queue" dialog to do this frame
pub enum DialogAction {
    None,
    Submit(Submission),
    FetchQualities(String),
    Notice(Notice),
}

type QualityResult = Result<Vec<u32>, QualityFetchError>;

/// Asks the engine for the heights available at `url` without blocking the
/// frame. Hand the receiver to [`AddToQueueDialog::await_qualities`].
pub fn lookup_qualities(
    runtime: &Handle,
    engine: Arc<dyn DownloadEngine>,
    url: String,
) -> oneshot::Receiver<QualityResult> {
    let (tx, rx) = oneshot::channel();
    runtime.spawn(async move {
        let result = engine.list_qualities(&url).await.map_err(QualityFetchError::from);
        if let Err(err) = &result {
            warn!(%url, "{err}");
        }
        let _ = tx.send(result);
    });
    rx
}

/// State of the "Add to Queue" form
pub struct AddToQueueDialog {
    pub open: bool,
    url: String,
    filename: String,
    format: MediaFormat,
    quality: String,
    destination: String,
    /// Entries of the quality combo, "Auto" first
    qualities: Vec<String>,
    pending: Option<oneshot::Receiver<QualityResult>>,
}

impl AddToQueueDialog {
    pub fn new(destination: &Path) -> Self {
        Self {
            open: false,
            url: String::new(),
            filename: String::new(),
            format: MediaFormat::Video,
            quality: "Auto".to_string(),
            destination: destination.display().to_string(),
            qualities: vec!["Auto".to_string()],
            pending: None,
        }
    }

    fn submission(&self) -> Submission {
        Submission {
            url: self.url.clone(),
            filename: self.filename.clone(),
            format: self.format.label().to_string(),
            quality: self.quality.clone(),
            destination: self.destination.clone(),
        }
    }

    /// Closes the dialog after a successful submit. The save location is kept.
    pub fn close_and_reset(&mut self) {
        self.open = false;
        self.url.clear();
        self.filename.clear();
        self.quality = "Auto".to_string();
        self.qualities = vec!["Auto".to_string()];
    }

    pub fn await_qualities(&mut self, rx: oneshot::Receiver<QualityResult>) {
        self.pending = Some(rx);
    }

    /// Picks up a finished quality lookup. Only failures are handed back.
    pub fn poll_qualities(&mut self) -> Option<QualityFetchError> {
        let rx = self.pending.as_mut()?;
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => {
                warn!("quality lookup ended without a result");
                self.pending = None;
                return None;
            }
        };
        self.pending = None;
        match result {
            Ok(heights) => {
                self.qualities = std::iter::once("Auto".to_string())
                    .chain(heights.into_iter().map(|h| format!("{h}p")))
                    .collect();
                self.quality = "Auto".to_string();
                None
            }
            Err(err) => Some(err),
        }
    }

    pub fn show(&mut self, ctx: &egui::Context) -> DialogAction {
        let mut action = DialogAction::None;
        let mut open = self.open;
        egui::Window::new("Add to Queue")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .default_width(400.0)
            .show(ctx, |ui| {
                ui.label("YouTube URL:");
                ui.text_edit_singleline(&mut self.url);

                ui.label("Custom Filename:");
                ui.text_edit_singleline(&mut self.filename);

                ui.label("File Format:");
                egui::ComboBox::from_id_source("format")
                    .selected_text(self.format.label())
                    .show_ui(ui, |ui| {
                        for format in MediaFormat::ALL {
                            ui.selectable_value(&mut self.format, format, format.label());
                        }
                    });

                ui.label("Video Quality:");
                egui::ComboBox::from_id_source("quality")
                    .selected_text(&self.quality)
                    .show_ui(ui, |ui| {
                        for q in &self.qualities {
                            ui.selectable_value(&mut self.quality, q.clone(), q);
                        }
                    });

                ui.label("Save Location:");
                ui.horizontal(|ui| {
                    ui.text_edit_singleline(&mut self.destination);
                    if ui.button("Browse…").clicked() {
                        if let Some(folder) = FileDialog::new().set_directory(&self.destination).pick_folder() {
                            self.destination = folder.display().to_string();
                        }
                    }
                });

                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    let fetching = self.pending.is_some();
                    if ui.add_enabled(!fetching, egui::Button::new("Get Quality List")).clicked() {
                        let url = self.url.trim().to_string();
                        action = if url.is_empty() {
                            DialogAction::Notice(Notice::error("Please enter a valid URL."))
                        } else {
                            DialogAction::FetchQualities(url)
                        };
                    }
                    if fetching {
                        ui.spinner();
                    }
                    if ui.button("Add to Queue").clicked() {
                        action = DialogAction::Submit(self.submission());
                    }
                });
            });
        self.open = open;
        action
    }
}

/// Queue table: Name, Status, Speed, Size. The name cell carries the row's marker.
pub fn queue_table(ui: &mut egui::Ui, rows: &[QueueRow]) {
    egui::ScrollArea::vertical()
        .auto_shrink([false; 2])
        .show(ui, |ui| {
            egui::Grid::new("queue")
                .num_columns(4)
                .striped(true)
                .min_col_width(90.0)
                .show(ui, |ui| {
                    for header in ["Name", "Status", "Speed", "Size"] {
                        ui.strong(header);
                    }
                    ui.end_row();

                    for row in rows {
                        let name = RichText::new(&row.name);
                        let name = match row.marker {
                            Marker::Neutral => name,
                            Marker::Success => name.background_color(Color32::DARK_GREEN).color(Color32::WHITE),
                            Marker::Failure => name.background_color(Color32::DARK_RED).color(Color32::WHITE),
                        };
                        ui.label(name);
                        ui.label(row.status.as_str());
                        ui.label(&row.rate);
                        ui.label(&row.size);
                        ui.end_row();
                    }
                });
        });
}

/// Credit and release lines of the About window
pub fn about_lines() -> [String; 2] {
    [
        format!("Author: {}", env!("CARGO_PKG_AUTHORS").replace(':', ", ")),
        format!("Version: {}", env!("CARGO_PKG_VERSION")),
    ]
}

pub fn show_about(ctx: &egui::Context, open: &mut bool, settings: &Settings) {
    let mut close = false;
    egui::Window::new("Settings")
        .open(open)
        .collapsible(false)
        .resizable(false)
        .show(ctx, |ui| {
            ui.vertical_centered(|ui| ui.heading("EternaX"));
            for line in about_lines() {
                ui.label(line);
            }
            ui.separator();
            egui::Grid::new("paths").num_columns(2).show(ui, |ui| {
                ui.label("Settings file:");
                ui.label(config::config_path().display().to_string());
                ui.end_row();
                ui.label("Downloads:");
                ui.label(settings.downloads_dir.display().to_string());
                ui.end_row();
                ui.label("yt-dlp:");
                ui.label(settings.ytdlp_path.display().to_string());
                ui.end_row();
            });
            ui.add_space(6.0);
            if ui.button("Close").clicked() {
                close = true;
            }
        });
    if close {
        *open = false;
    }
}
