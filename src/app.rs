use eframe::egui;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use tracing::{error, info};

use crate::client::ImageEditor;
use crate::export::{dimensions, save_edited};
use crate::generation;
use crate::prompt::SUGGESTIONS;
use crate::state::{released_displays, AppState, GenerationOutcome, Phase};
use crate::error::EditError;
use crate::upload::PICKER_EXTENSIONS;

const ACCENT: egui::Color32 = egui::Color32::from_rgb(79, 70, 229);
const ERROR_FILL: egui::Color32 = egui::Color32::from_rgb(69, 10, 10);
const ERROR_TEXT: egui::Color32 = egui::Color32::from_rgb(254, 202, 202);

// ── Edited image cache ──────────────────────────────────────────────────────

/// Decoded bytes of the current edit, keyed by its display URI.
struct EditedBytes {
    uri: String,
    bytes: Arc<[u8]>,
    size: Option<(u32, u32)>,
}

// ── App ─────────────────────────────────────────────────────────────────────

/// Modal notice for failures that never reach the processing state.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Alert {
    title: &'static str,
    message: String,
}

impl Alert {
    fn rejected(err: &EditError) -> Self {
        Self {
            title: "Unsupported file",
            message: err.to_string(),
        }
    }

    fn export_failed(err: &anyhow::Error) -> Self {
        Self {
            title: "Export failed",
            message: format!("Could not save the image: {:#}", err),
        }
    }
}

pub struct FlashEditApp {
    state: AppState,
    prompt: String,
    alert: Option<Alert>,
    export_file_name: String,

    editor: Arc<dyn ImageEditor>,
    runtime: tokio::runtime::Handle,
    tx: Sender<GenerationOutcome>,
    rx: Receiver<GenerationOutcome>,

    edited_bytes: Option<EditedBytes>,
}

impl FlashEditApp {
    pub fn new(
        editor: Arc<dyn ImageEditor>,
        runtime: tokio::runtime::Handle,
        export_file_name: String,
    ) -> Self {
        let (tx, rx) = channel();
        Self {
            state: AppState::new(),
            prompt: String::new(),
            alert: None,
            export_file_name,
            editor,
            runtime,
            tx,
            rx,
            edited_bytes: None,
        }
    }

    /// Swap in the next snapshot and release the display references it
    /// superseded.
    fn apply(&mut self, ctx: &egui::Context, next: AppState) {
        for uri in released_displays(&self.state, &next) {
            ctx.forget_image(&uri);
            if self.edited_bytes.as_ref().is_some_and(|e| e.uri == uri) {
                self.edited_bytes = None;
            }
        }
        self.state = next;
    }

    pub fn open_path(&mut self, ctx: &egui::Context, path: &Path) {
        match self.state.open(path) {
            Ok(next) => {
                if let Some(source) = next.source() {
                    info!("Source {} is {} ({})", source.id, source.name, source.mime_type);
                }
                self.apply(ctx, next);
            }
            Err(e) => self.alert = Some(Alert::rejected(&e)),
        }
    }

    fn pick_file(&mut self, ctx: &egui::Context) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", PICKER_EXTENSIONS)
            .pick_file()
        {
            self.open_path(ctx, &path);
        }
    }

    fn handle_drag_and_drop(&mut self, ctx: &egui::Context) {
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|f| f.path.clone())
                .collect()
        });
        // Only the first dropped file counts.
        if let Some(path) = dropped.first() {
            self.open_path(ctx, path);
        }
    }

    fn generate(&mut self, ctx: &egui::Context) {
        let Some((next, request)) = self.state.submit(&self.prompt) else {
            return;
        };
        self.apply(ctx, next);

        let editor = Arc::clone(&self.editor);
        let tx = self.tx.clone();
        let repaint = ctx.clone();
        self.runtime.spawn(async move {
            let outcome = generation::execute(editor.as_ref(), request).await;
            if tx.send(outcome).is_err() {
                error!("Generation finished after the window closed");
            }
            repaint.request_repaint();
        });
    }

    fn poll_generations(&mut self, ctx: &egui::Context) {
        while let Ok(outcome) = self.rx.try_recv() {
            let next = self.state.finish(outcome);
            self.apply(ctx, next);
        }
    }

    fn reset(&mut self, ctx: &egui::Context) {
        let next = self.state.reset();
        self.apply(ctx, next);
        self.prompt.clear();
    }

    fn ensure_edited_bytes(&mut self) {
        let Some(uri) = self.state.edited_display_uri() else {
            return;
        };
        if self.edited_bytes.as_ref().is_some_and(|e| e.uri == uri) {
            return;
        }
        let Some(edited) = self.state.edited() else {
            return;
        };
        match edited.decode() {
            Ok(bytes) => {
                let size = dimensions(&bytes);
                self.edited_bytes = Some(EditedBytes {
                    uri,
                    bytes: bytes.into(),
                    size,
                });
            }
            Err(e) => {
                error!("Edited image payload is not valid Base64: {}", e);
                self.edited_bytes = None;
            }
        }
    }

    fn download(&mut self) {
        let Some(edited) = self.state.edited() else {
            return;
        };
        let Some(path) = rfd::FileDialog::new()
            .set_file_name(&self.export_file_name)
            .add_filter("PNG image", &["png"])
            .save_file()
        else {
            return;
        };
        if let Err(e) = save_edited(edited, &path) {
            error!("Export failed: {:#}", e);
            self.alert = Some(Alert::export_failed(&e));
        }
    }

    // ── Panels ──────────────────────────────────────────────────────────────

    fn header(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("◎").size(24.0).color(ACCENT));
            ui.vertical(|ui| {
                ui.label(egui::RichText::new("FlashEdit AI").strong().size(18.0));
                ui.label(egui::RichText::new("Powered by Gemini 2.5").small().weak());
            });
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(egui::RichText::new("Beta").small().color(ACCENT));
            });
        });
    }

    fn error_banner(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let Some(message) = self.state.error().map(str::to_string) else {
            return;
        };
        egui::Frame::group(ui.style())
            .fill(ERROR_FILL)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new("⚠").color(ERROR_TEXT));
                    ui.label(egui::RichText::new(message).color(ERROR_TEXT));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("Dismiss").clicked() {
                            let next = self.state.dismiss_error();
                            self.apply(ctx, next);
                        }
                    });
                });
            });
        ui.add_space(8.0);
    }

    fn uploader(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let dragging = ctx.input(|i| !i.raw.hovered_files.is_empty());

        ui.vertical_centered(|ui| {
            ui.add_space(48.0);
            ui.label(
                egui::RichText::new("Transform Your Photos with AI")
                    .size(32.0)
                    .strong()
                    .color(ACCENT),
            );
            ui.label("Upload an image and simply tell the AI what you want to change.");
            ui.add_space(32.0);

            let stroke_color = if dragging {
                ACCENT
            } else {
                egui::Color32::from_gray(90)
            };
            egui::Frame::group(ui.style())
                .stroke(egui::Stroke::new(2.0, stroke_color))
                .inner_margin(48.0)
                .show(ui, |ui| {
                    ui.set_max_width(480.0);
                    ui.vertical_centered(|ui| {
                        let title = if dragging {
                            "Drop image here"
                        } else {
                            "Upload an image to start"
                        };
                        ui.label(egui::RichText::new(title).size(20.0).strong());
                        ui.label("Drag and drop your photo here, or click to browse files.");
                        ui.label(egui::RichText::new("Supports JPG, PNG, WEBP").small().weak());
                        ui.add_space(16.0);
                        if ui
                            .add(egui::Button::new("Select Image").fill(ACCENT))
                            .clicked()
                        {
                            self.pick_file(ctx);
                        }
                    });
                });
        });
    }

    fn viewer(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        self.ensure_edited_bytes();

        let mut clear = false;
        let mut download = false;
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("Preview").size(18.0));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if self.state.edited().is_some()
                    && ui.add(egui::Button::new("Download").fill(ACCENT)).clicked()
                {
                    download = true;
                }
                if ui.button("✕ Clear").clicked() {
                    clear = true;
                }
            });
        });
        ui.add_space(8.0);

        let pane_height = ui.available_height();
        ui.columns(2, |cols| {
            let original = &mut cols[0];
            egui::Frame::group(original.style()).show(original, |ui| {
                ui.set_min_height(pane_height - 16.0);
                if let Some(source) = self.state.source() {
                    ui.label(egui::RichText::new(format!("Original · {}", source.name)).strong());
                    let avail = ui.available_size();
                    ui.centered_and_justified(|ui| {
                        ui.add(
                            egui::Image::new(source.display_uri())
                                .max_size(avail)
                                .maintain_aspect_ratio(true),
                        );
                    });
                }
            });

            let result = &mut cols[1];
            egui::Frame::group(result.style()).show(result, |ui| {
                ui.set_min_height(pane_height - 16.0);
                match &self.edited_bytes {
                    Some(edited) => {
                        let label = match edited.size {
                            Some((w, h)) => format!("Edited · {}×{}", w, h),
                            None => "Edited".to_string(),
                        };
                        ui.label(egui::RichText::new(label).strong().color(ACCENT));
                        let avail = ui.available_size();
                        ui.centered_and_justified(|ui| {
                            ui.add(
                                egui::Image::from_bytes(edited.uri.clone(), edited.bytes.clone())
                                    .max_size(avail)
                                    .maintain_aspect_ratio(true),
                            );
                        });
                    }
                    None if self.state.phase() == Phase::Generating => {
                        ui.centered_and_justified(|ui| {
                            ui.spinner();
                        });
                    }
                    None => {
                        ui.centered_and_justified(|ui| {
                            ui.label(egui::RichText::new("→  Output will appear here").weak());
                        });
                    }
                }
            });
        });

        if download {
            self.download();
        }
        if clear {
            self.reset(ctx);
        }
    }

    fn prompt_bar(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let processing = self.state.is_processing();
        let mut submit = false;

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("✨").color(ACCENT));
            let edit = ui.add_enabled(
                !processing,
                egui::TextEdit::singleline(&mut self.prompt)
                    .hint_text("Describe how you want to edit the image...")
                    .desired_width(ui.available_width() - 110.0),
            );
            if edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                submit = true;
            }

            let can_submit = !processing && !self.prompt.trim().is_empty();
            if processing {
                ui.spinner();
            }
            if ui
                .add_enabled(can_submit, egui::Button::new("Generate").fill(ACCENT))
                .clicked()
            {
                submit = true;
            }
        });

        ui.horizontal_wrapped(|ui| {
            ui.label(egui::RichText::new("TRY:").small().weak());
            for suggestion in SUGGESTIONS {
                if ui
                    .add_enabled(!processing, egui::Button::new(*suggestion).small())
                    .clicked()
                {
                    self.prompt = suggestion.to_string();
                }
            }
        });
        ui.add_space(8.0);

        if submit {
            self.generate(ctx);
        }
    }

    fn alert_window(&mut self, ctx: &egui::Context) {
        let Some(alert) = self.alert.clone() else {
            return;
        };
        egui::Window::new(alert.title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(alert.message);
                if ui.button("OK").clicked() {
                    self.alert = None;
                }
            });
    }
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for FlashEditApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_generations(ctx);
        self.handle_drag_and_drop(ctx);

        // Keyboard shortcuts
        let (open, clear) = ctx.input(|i| {
            (
                i.modifiers.command && i.key_pressed(egui::Key::O),
                i.key_pressed(egui::Key::Escape),
            )
        });
        if open {
            self.pick_file(ctx);
        }
        if clear && self.alert.is_none() && self.state.phase() != Phase::Empty {
            self.reset(ctx);
        }

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(4.0);
            self.header(ui);
            ui.add_space(4.0);
        });

        if self.state.source().is_some() {
            egui::TopBottomPanel::bottom("prompt").show(ctx, |ui| {
                self.prompt_bar(ctx, ui);
            });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            self.error_banner(ctx, ui);
            if self.state.source().is_some() {
                self.viewer(ctx, ui);
            } else {
                self.uploader(ctx, ui);
            }
        });

        self.alert_window(ctx);
    }
}
