//! EternaX: a desktop queue for video and audio downloads driven by yt-dlp

#![cfg_attr(
    all(not(debug_assertions), target_os = "windows"),
    windows_subsystem = "windows"
)]

// User settings file
mod config;
// Worker that runs one download through the engine
mod downloader;
// yt-dlp child process and the engine trait
mod engine;
// Error types shared by the modules below
mod error;
// Tasks, progress events and queue rows
mod model;
// yt-dlp progress line parsing
mod progress;
// Row bookkeeping and worker spawning
mod queue;
// Dialogs and the queue table
mod ui;
// Byte count formatting
mod units;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, anyhow};
use eframe::{App, Frame, egui};
use egui::Visuals;
use once_cell::sync::OnceCell;
use rust_embed::RustEmbed;
use tokio::runtime::{Handle, Runtime};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::Settings;
use engine::{DownloadEngine, YtDlp};
use error::ValidationError;
use queue::Queue;
use ui::{AddToQueueDialog, DialogAction, Notice};

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Runtime> = OnceCell::new();

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

/// Program entry point: initializes logging, settings and runtime, then launches the GUI
fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Starting EternaX v{}", env!("CARGO_PKG_VERSION"));

    let settings = config::load_or_create_default().context("loading settings")?;
    info!("Configuration loaded from {:?}", config::config_path());

    let runtime = RUNTIME
        .get_or_try_init(Runtime::new)
        .context("starting tokio runtime")?;

    let engine: Arc<dyn DownloadEngine> = Arc::new(YtDlp::new(settings.ytdlp_path.clone()));
    let queue = Queue::new(
        Arc::clone(&engine),
        runtime.handle().clone(),
        settings.event_buffer,
    );
    let app = EternaxApp::new(queue, engine, runtime.handle().clone(), settings);

    let mut viewport = egui::ViewportBuilder::default()
        .with_title("EternaX")
        .with_inner_size([800.0, 600.0]);
    match window_icon() {
        Ok(icon) => viewport = viewport.with_icon(icon),
        Err(err) => warn!("window icon unavailable: {err:#}"),
    }
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    eframe::run_native(
        "EternaX",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(app)
        }),
    )
    .map_err(|err| anyhow!("window closed with an error: {err}"))
}

fn window_icon() -> anyhow::Result<egui::IconData> {
    let file = Asset::get("eternax.png").context("eternax.png is not embedded")?;
    let img = image::load_from_memory(&file.data)?.to_rgba8();
    let (width, height) = img.dimensions();
    Ok(egui::IconData {
        rgba: img.into_raw(),
        width,
        height,
    })
}

/// Application state for the GUI
struct EternaxApp {
    /// Rows and the workers feeding them
    queue: Queue,
    /// Shared with the queue; also answers quality lookups
    engine: Arc<dyn DownloadEngine>,
    /// Where quality lookups run
    runtime: Handle,
    settings: Settings,
    add_dialog: AddToQueueDialog,
    about_open: bool,
    /// At most one notice at a time
    notice: Option<Notice>,
}

impl EternaxApp {
    fn new(queue: Queue, engine: Arc<dyn DownloadEngine>, runtime: Handle, settings: Settings) -> Self {
        Self {
            queue,
            engine,
            runtime,
            add_dialog: AddToQueueDialog::new(&settings.downloads_dir),
            settings,
            about_open: false,
            notice: None,
        }
    }

    fn fetch_qualities(&mut self, url: String) {
        let rx = ui::lookup_qualities(&self.runtime, Arc::clone(&self.engine), url);
        self.add_dialog.await_qualities(rx);
    }

    fn handle_dialog(&mut self, action: DialogAction) {
        match action {
            DialogAction::None => {}
            DialogAction::Submit(submission) => match self.queue.submit(&submission) {
                Ok(_) => self.add_dialog.close_and_reset(),
                Err(err @ ValidationError::AudioQualityConflict) => {
                    self.notice = Some(Notice::info(err.to_string()));
                }
                Err(err) => self.notice = Some(Notice::error(err.to_string())),
            },
            DialogAction::FetchQualities(url) => self.fetch_qualities(url),
            DialogAction::Notice(notice) => self.notice = Some(notice),
        }
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for EternaxApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // Apply whatever the workers reported since the last frame
        self.queue.pump();

        if let Some(err) = self.add_dialog.poll_qualities() {
            self.notice = Some(Notice::error(err.to_string()));
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("➕ Add to Queue").clicked() {
                    self.add_dialog.open = true;
                }
                if ui.button("⚙ Settings").clicked() {
                    self.about_open = true;
                }
            });
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(format!(
                "{} downloads, {} in progress",
                self.queue.len(),
                self.queue.active_count()
            ));
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.queue.is_empty() {
                ui.label("Nothing queued yet. Use \"Add to Queue\" to start a download.");
            }
            ui::queue_table(ui, self.queue.rows());
        });

        let action = self.add_dialog.show(ctx);
        self.handle_dialog(action);

        ui::show_about(ctx, &mut self.about_open, &self.settings);

        if self.notice.as_ref().is_some_and(|notice| notice.show(ctx)) {
            self.notice = None;
        }

        // Request periodic repaint for progress updates
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}
