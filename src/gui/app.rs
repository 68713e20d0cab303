use eframe::egui;
use std::path::{Path, PathBuf};

use crate::core::{AppConfig, PreviewFramePolicy};
use crate::video::{self, PreviewEvent, PreviewPipeline, SamplingPolicy};

/// Suffixes accepted by the file dialog and drag-and-drop.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mov", "flv", "mkv", "rmvb", "wmv", "webm", "ts", "m4v",
];

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

pub fn to_sampling_policy(policy: PreviewFramePolicy) -> SamplingPolicy {
    match policy {
        PreviewFramePolicy::FirstFrame => SamplingPolicy::FirstFrame,
        PreviewFramePolicy::LastFrame => SamplingPolicy::LastFrame,
        PreviewFramePolicy::RandomFrame => SamplingPolicy::RandomFrame,
    }
}

pub struct PreviewHelperApp {
    pub config: AppConfig,
    pub videos: Vec<PathBuf>,
    pub selected_index: Option<usize>,
    pub pipeline: PreviewPipeline,
    pub status_message: String,
    pub preview_texture: Option<egui::TextureHandle>,
    /// Set whenever the displayed frame or a transform changed and the
    /// texture needs rebuilding.
    pub preview_dirty: bool,
    pub last_preview_area: egui::Vec2,
}

impl PreviewHelperApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> anyhow::Result<Self> {
        // Set global text color to white
        let mut visuals = egui::Visuals::dark();
        visuals.override_text_color = Some(egui::Color32::WHITE);
        cc.egui_ctx.set_visuals(visuals);

        let config = AppConfig::load()?;
        if let Some(path) = &config.ffmpeg_path {
            video::set_ffmpeg_override(path.clone());
        }

        let mut status_message = String::new();
        if let Err(e) = video::check_ffmpeg_available() {
            log::error!("ffmpeg is not available: {}", e);
            status_message =
                "ffmpeg was not found; previews will not work until it is installed".to_string();
        }

        let pipeline = PreviewPipeline::new(config.remove_black_borders);

        Ok(Self {
            config,
            videos: Vec::new(),
            selected_index: None,
            pipeline,
            status_message,
            preview_texture: None,
            preview_dirty: false,
            last_preview_area: egui::Vec2::ZERO,
        })
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let files = ctx.input(|i| i.raw.dropped_files.clone());
        if files.is_empty() {
            return;
        }

        let mut added = 0;
        for file in files {
            if let Some(path) = file.path {
                if is_video_file(&path) {
                    self.videos.push(path);
                    added += 1;
                } else {
                    log::debug!("Ignoring dropped non-video file: {}", path.display());
                }
            }
        }
        if added == 0 {
            return;
        }
        log::debug!("Added {} dropped video files", added);

        // Dropping files previews the first list entry with a content scan
        if let Some(first) = self.videos.first().cloned() {
            self.selected_index = Some(0);
            if !self
                .pipeline
                .request_preview(&first, SamplingPolicy::FirstNonBlackFrame)
            {
                self.status_message = "A preview is already being decoded".to_string();
            }
        }
    }

    fn process_preview_events(&mut self, ctx: &egui::Context) {
        while let Some(event) = self.pipeline.poll() {
            match event {
                PreviewEvent::Updated {
                    video_path,
                    frame_index,
                    all_frames_black,
                } => {
                    if all_frames_black {
                        self.status_message = format!(
                            "Every frame of {} looked black; showing the last one",
                            display_name(&video_path)
                        );
                    } else {
                        self.status_message = format!(
                            "Showing frame {} of {}",
                            frame_index,
                            display_name(&video_path)
                        );
                    }
                    self.preview_dirty = true;
                    ctx.request_repaint();
                }
                PreviewEvent::Failed { video_path, error } => {
                    self.status_message =
                        format!("Could not preview {}: {}", display_name(&video_path), error);
                    ctx.request_repaint();
                }
            }
        }
    }

    fn select_video(&mut self, index: usize) {
        let Some(path) = self.videos.get(index).cloned() else {
            return;
        };
        self.selected_index = Some(index);
        let policy = to_sampling_policy(self.config.preview_frame);
        if !self.pipeline.request_preview(&path, policy) {
            self.status_message = "A preview is already being decoded".to_string();
        }
    }

    fn add_videos_via_dialog(&mut self) {
        let mut dialog = rfd::FileDialog::new().add_filter("Video Files", VIDEO_EXTENSIONS);
        let start_dir = self
            .selected_index
            .and_then(|i| self.videos.get(i))
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .or_else(|| self.config.last_opened_directory.clone());
        if let Some(dir) = start_dir {
            dialog = dialog.set_directory(dir);
        }

        if let Some(paths) = dialog.pick_files() {
            log::debug!("Selected {} video files: {:?}", paths.len(), paths);
            if let Some(parent) = paths.first().and_then(|p| p.parent()) {
                self.config.last_opened_directory = Some(parent.to_path_buf());
                self.save_config();
            }
            self.videos.extend(paths);
        }
    }

    fn save_config(&self) {
        if let Err(e) = self.config.save() {
            log::error!("Failed to save config: {}", e);
        }
    }

    /// Rebuild the preview texture when the frame, a transform, or the
    /// viewport changed. Rotation and scaling always start from the base
    /// frame, so repeated resizes never degrade the image.
    fn refresh_preview_texture(&mut self, ctx: &egui::Context, available: egui::Vec2) {
        if !self.pipeline.has_frame() {
            self.preview_texture = None;
            return;
        }

        let area_changed = (available - self.last_preview_area).length() > 1.0;
        if !self.preview_dirty && !area_changed && self.preview_texture.is_some() {
            return;
        }

        let max_width = available.x.max(1.0) as u32;
        let max_height = available.y.max(1.0) as u32;
        if let Some(frame) = self.pipeline.composed(max_width, max_height) {
            let size = [frame.width() as usize, frame.height() as usize];
            let color_image = egui::ColorImage::from_rgb(size, frame.as_raw());
            self.preview_texture =
                Some(ctx.load_texture("preview_frame", color_image, egui::TextureOptions::LINEAR));
            self.preview_dirty = false;
            self.last_preview_area = available;
        }
    }

    fn show_video_list(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("video_list_panel")
            .default_width(300.0)
            .show(ctx, |ui| {
                ui.heading("Videos");
                ui.horizontal(|ui| {
                    if ui.button("Add Videos…").clicked() {
                        self.add_videos_via_dialog();
                    }
                    if ui.button("Clear").clicked() {
                        self.videos.clear();
                        self.selected_index = None;
                    }
                });
                ui.separator();

                // The list stays disabled while a sample is in flight; clicks
                // cannot pile up behind the one running operation.
                let sampling = self.pipeline.is_sampling();
                ui.add_enabled_ui(!sampling, |ui| {
                    egui::ScrollArea::vertical().show(ui, |ui| {
                        let mut clicked = None;
                        for (index, path) in self.videos.iter().enumerate() {
                            let selected = self.selected_index == Some(index);
                            if ui.selectable_label(selected, display_name(path)).clicked() {
                                clicked = Some(index);
                            }
                        }
                        if let Some(index) = clicked {
                            self.select_video(index);
                        }
                    });
                });

                if sampling {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Decoding preview frame…");
                    });
                }
            });
    }

    fn show_preview_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                let has_frame = self.pipeline.has_frame();
                let mut rotated = false;
                ui.add_enabled_ui(has_frame, |ui| {
                    if ui.button("⟲ 90°").clicked() {
                        rotated = self.pipeline.rotate_counterclockwise();
                    }
                    if ui.button("⟳ 90°").clicked() {
                        rotated = self.pipeline.rotate_clockwise();
                    }
                    if ui.button("180°").clicked() {
                        rotated = self.pipeline.flip_upside_down();
                    }
                });
                if rotated {
                    self.preview_dirty = true;
                    self.status_message =
                        format!("Rotation: {}°", self.pipeline.rotation_degrees());
                }
                ui.separator();

                let mut remove_borders = self.config.remove_black_borders;
                if ui.checkbox(&mut remove_borders, "Remove black borders").changed() {
                    self.config.remove_black_borders = remove_borders;
                    self.pipeline.set_remove_black_borders(remove_borders);
                    self.preview_dirty = true;
                    self.save_config();
                }
                ui.separator();

                ui.label("Preview frame:");
                let mut policy = self.config.preview_frame;
                egui::ComboBox::from_id_source("preview_frame_policy")
                    .selected_text(policy.label())
                    .show_ui(ui, |ui| {
                        for option in [
                            PreviewFramePolicy::FirstFrame,
                            PreviewFramePolicy::LastFrame,
                            PreviewFramePolicy::RandomFrame,
                        ] {
                            ui.selectable_value(&mut policy, option, option.label());
                        }
                    });
                if policy != self.config.preview_frame {
                    self.config.preview_frame = policy;
                    self.save_config();
                }
            });
            ui.separator();

            let available = ui.available_size();
            self.refresh_preview_texture(ui.ctx(), available);
            if let Some(texture) = &self.preview_texture {
                ui.centered_and_justified(|ui| {
                    ui.image((texture.id(), texture.size_vec2()));
                });
            } else if !self.pipeline.is_sampling() {
                ui.centered_and_justified(|ui| {
                    ui.label("Select a video to preview a frame");
                });
            }
        });
    }
}

impl eframe::App for PreviewHelperApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_dropped_files(ctx);
        self.process_preview_events(ctx);

        self.show_video_list(ctx);

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.label(&self.status_message);
        });

        self.show_preview_panel(ctx);

        // Keep polling for the worker's completion while sampling runs
        if self.pipeline.is_sampling() {
            ctx.request_repaint_after(std::time::Duration::from_millis(50));
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
