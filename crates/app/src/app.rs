use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use cloth_core::{
    CanvasAssetManager, CanvasEditor, ClothPreset, EditorMode, Project, ProjectError, SewClick,
    SewingError,
};
use eframe::egui;
use rfd::{FileDialog, MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

mod canvas;

const MAX_LOG_LINES: usize = 500;

#[derive(Clone)]
pub(crate) struct ConsoleBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl ConsoleBuffer {
    fn new() -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    fn push_line(&self, line: String) {
        let Ok(mut lines) = self.lines.lock() else {
            return;
        };
        lines.push_back(line);
        while lines.len() > MAX_LOG_LINES {
            lines.pop_front();
        }
    }

    fn snapshot(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }
}

/// Where log lines are echoed besides the in-app console. Headless runs
/// echo to stderr so stdout carries only the printed summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConsoleEcho {
    Stdout,
    Stderr,
}

struct ConsoleMakeWriter {
    buffer: ConsoleBuffer,
    echo: ConsoleEcho,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter {
            buffer: self.buffer.clone(),
            echo: self.echo,
        }
    }
}

struct ConsoleWriter {
    buffer: ConsoleBuffer,
    echo: ConsoleEcho,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        for line in text.lines() {
            self.buffer.push_line(line.to_string());
        }

        match self.echo {
            ConsoleEcho::Stdout => io::stdout().write_all(buf)?,
            ConsoleEcho::Stderr => io::stderr().write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.echo {
            ConsoleEcho::Stdout => io::stdout().flush(),
            ConsoleEcho::Stderr => io::stderr().flush(),
        }
    }
}

pub(crate) struct ClothDesignApp {
    project: Project,
    project_path: Option<PathBuf>,
    console: ConsoleBuffer,
    log_level: LevelFilter,
    log_level_state: Arc<AtomicU8>,
    editor: CanvasEditor,
    asset_folder: String,
    asset_name: String,
    asset_list: Vec<PathBuf>,
}

impl ClothDesignApp {
    pub(crate) fn new(console: ConsoleBuffer, log_level_state: Arc<AtomicU8>) -> Self {
        let mut app = Self {
            project: Project::default(),
            project_path: None,
            console,
            log_level: LevelFilter::INFO,
            log_level_state,
            editor: CanvasEditor::new(),
            asset_folder: "Patterns".to_string(),
            asset_name: "NewShape".to_string(),
            asset_list: Vec::new(),
        };
        app.apply_project_settings();
        app
    }

    fn apply_project_settings(&mut self) {
        let settings = &self.project.settings;
        self.editor.history.set_limit(settings.history_limit);
        self.editor.asset_root = PathBuf::from(&settings.asset_root);
        self.editor.sim_settings.selected_preset = settings.cloth_preset;
        self.refresh_asset_list();
    }

    fn refresh_asset_list(&mut self) {
        self.asset_list = CanvasAssetManager::list_assets(&self.editor.asset_root);
    }

    fn load_shape_asset(&mut self, path: &Path) {
        match self.editor.load_asset(path) {
            Ok(()) => tracing::info!("shape asset loaded from {}", path.display()),
            Err(err) => tracing::error!("failed to load shape asset: {}", err),
        }
    }

    fn new_project(&mut self) {
        self.project = Project::default();
        self.project_path = None;
        self.editor = CanvasEditor::new();
        self.apply_project_settings();
        tracing::info!("new project created");
    }

    fn save_project_to(&mut self, path: &Path) -> Result<(), ProjectError> {
        self.project.settings.cloth_preset = self.editor.sim_settings.selected_preset;
        self.project.save(path)
    }

    fn load_project_from(&mut self, path: &Path) -> Result<(), ProjectError> {
        self.project = Project::load(path)?;
        self.apply_project_settings();
        Ok(())
    }

    fn set_log_level(&mut self, new_level: LevelFilter) {
        if new_level == self.log_level {
            return;
        }

        self.log_level_state
            .store(level_filter_to_u8(new_level), Ordering::Relaxed);
        self.log_level = new_level;
    }

    fn open_shape_asset(&mut self) {
        let start = self.editor.asset_root.join(cloth_core::ASSET_FOLDER);
        let Some(path) = FileDialog::new()
            .add_filter("Cloth Shape", &["json"])
            .set_directory(start)
            .pick_file()
        else {
            return;
        };
        self.load_shape_asset(&path);
    }

    fn save_shape_asset(&mut self) {
        match self.editor.save_asset(&self.asset_folder, &self.asset_name) {
            Ok(path) => {
                tracing::info!("shape asset saved to {}", path.display());
                self.refresh_asset_list();
            }
            Err(err) => {
                tracing::error!("failed to save shape asset: {}", err);
                show_warning("Save shape asset", &err.to_string());
            }
        }
    }

    fn export_obj(&self) {
        if self.editor.pieces.is_empty() {
            tracing::warn!("nothing to export; generate meshes first");
            return;
        }
        let Some(path) = FileDialog::new()
            .add_filter("Wavefront OBJ", &["obj"])
            .set_file_name("pattern.obj")
            .save_file()
        else {
            return;
        };
        if let Err(err) = self.editor.export_obj(&path) {
            tracing::error!("failed to export obj: {}", err);
        }
    }

    fn handle_sew_click(&mut self, result: SewClick, screen: glam::Vec2) {
        match result {
            SewClick::NeedsFinalise => {
                let choice = MessageDialog::new()
                    .set_level(MessageLevel::Info)
                    .set_title("Unfinished shape")
                    .set_description(
                        "You clicked a point on the unfinished shape. Finalise it now so it can be sewn?",
                    )
                    .set_buttons(MessageButtons::YesNo)
                    .show();
                if choice == MessageDialogResult::Yes {
                    if let SewClick::Rejected(err) = self.editor.finalise_and_sew(screen) {
                        show_sewing_error(&err);
                    }
                }
            }
            SewClick::Rejected(err) => show_sewing_error(&err),
            SewClick::Missed | SewClick::Accepted(_) | SewClick::Completed(_) => {}
        }
    }

    fn tools_ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            for mode in [EditorMode::Draw, EditorMode::Select, EditorMode::Sew] {
                if ui
                    .selectable_label(self.editor.mode == mode, mode.label())
                    .clicked()
                {
                    self.editor.set_mode(mode);
                }
            }
        });
        ui.checkbox(&mut self.editor.use_bezier_points, "Bezier points (B/N)");
        ui.checkbox(&mut self.editor.separate_tangents, "Separate tangents (T)");

        ui.separator();
        ui.horizontal(|ui| {
            if ui.button("Finalise shape").clicked() {
                self.editor.finalise_current_shape();
            }
            if ui.button("Focus").clicked() {
                let viewport = self.editor.viewport;
                self.editor.focus(viewport);
            }
        });
        ui.horizontal(|ui| {
            if ui.button("Generate meshes").clicked() {
                self.editor.generate_meshes();
            }
            if ui.button("Sew all").clicked() {
                self.editor.sew_all();
            }
            if ui.button("Merge sewn").clicked() {
                self.editor.merge_sewn();
            }
        });
        ui.horizontal(|ui| {
            if ui.button("Clear shapes").clicked() {
                self.editor.clear_all_shapes();
            }
            if ui.button("Clear sewing").clicked() {
                self.editor.clear_all_sewing();
            }
        });

        ui.separator();
        ui.label(format!(
            "{} shapes, {} seams, {} pieces",
            self.editor.state.completed_shapes.len(),
            self.editor.state.seams.len(),
            self.editor.pieces.len()
        ));
        for piece in self.editor.pieces.iter() {
            ui.label(format!(
                "{}: {} verts, {} tris",
                piece.label,
                piece.mesh.vertex_count(),
                piece.mesh.triangle_count()
            ));
        }

        ui.separator();
        ui.horizontal(|ui| {
            ui.label("Folder");
            ui.text_edit_singleline(&mut self.asset_folder);
        });
        ui.horizontal(|ui| {
            ui.label("Name");
            ui.text_edit_singleline(&mut self.asset_name);
        });
        ui.horizontal(|ui| {
            if ui.button("Save shape").clicked() {
                self.save_shape_asset();
            }
            if ui.button("Reload").clicked() {
                match self.editor.assets.selected_path().map(Path::to_path_buf) {
                    Some(path) => {
                        if let Err(err) = self.editor.load_asset(path) {
                            tracing::warn!("reload failed: {}", err);
                        }
                    }
                    None => tracing::warn!("no shape asset selected"),
                }
            }
            if ui.button("Refresh list").clicked() {
                self.refresh_asset_list();
            }
        });

        let root = self.editor.asset_root.join(cloth_core::ASSET_FOLDER);
        let selected = self.editor.assets.selected_path().map(Path::to_path_buf);
        let mut clicked = None;
        egui::ScrollArea::vertical()
            .id_salt("asset_list")
            .max_height(140.0)
            .show(ui, |ui| {
                if self.asset_list.is_empty() {
                    ui.weak("no shape assets");
                }
                for path in &self.asset_list {
                    let name = path.strip_prefix(&root).unwrap_or(path.as_path()).display().to_string();
                    let is_selected = selected.as_deref() == Some(path.as_path());
                    if ui.selectable_label(is_selected, name).clicked() {
                        clicked = Some(path.clone());
                    }
                }
            });
        if let Some(path) = clicked {
            self.load_shape_asset(&path);
        }
    }

    fn sim_ui(&mut self, ui: &mut egui::Ui) {
        let mut preset = self.editor.sim_settings.selected_preset;
        egui::ComboBox::from_label("Cloth preset")
            .selected_text(preset.display_name())
            .show_ui(ui, |ui| {
                for option in ClothPreset::ALL {
                    ui.selectable_value(&mut preset, option, option.display_name());
                }
            });
        if preset != self.editor.sim_settings.selected_preset {
            self.editor.apply_sim_preset(preset);
        }

        let config = &self.editor.sim_config;
        egui::Grid::new("sim_config").num_columns(2).show(ui, |ui| {
            let rows = [
                ("Density", config.density),
                ("Friction", config.friction),
                ("Damping", config.damping),
                ("Gravity scale", config.gravity_scale),
                ("Bending", config.bending_stiffness.low),
                ("Area", config.area_stiffness.low),
                ("Tether stiffness", config.tether_stiffness.low),
                ("Tether scale", config.tether_scale.low),
                ("Drag", config.drag.low),
                ("Lift", config.lift.low),
            ];
            for (label, value) in rows {
                ui.label(label);
                ui.label(format!("{value:.3}"));
                ui.end_row();
            }
        });
        ui.label(format!(
            "Environment collision: {}",
            config.collision.collide_with_environment
        ));
    }

    fn canvas_settings_ui(&mut self, ui: &mut egui::Ui) {
        let canvas = &mut self.project.settings.canvas;
        ui.checkbox(&mut canvas.show_grid, "Grid");
        ui.horizontal(|ui| {
            ui.label("Grid spacing");
            ui.add(
                egui::DragValue::new(&mut canvas.grid_spacing)
                    .speed(1.0)
                    .range(5.0..=1000.0),
            );
        });
        ui.horizontal(|ui| {
            ui.label("Subdivisions");
            ui.add(egui::DragValue::new(&mut canvas.grid_subdivisions).range(1..=16));
        });
        ui.add(
            egui::Slider::new(&mut canvas.background_scale, 0.1..=10.0).text("Background scale"),
        );

        let mut limit = self.project.settings.history_limit;
        ui.horizontal(|ui| {
            ui.label("Undo steps");
            ui.add(egui::DragValue::new(&mut limit).range(1..=4096));
        });
        if limit != self.project.settings.history_limit {
            self.project.settings.history_limit = limit;
            self.editor.history.set_limit(limit);
        }

        egui::ComboBox::from_label("Log level")
            .selected_text(format!("{:?}", self.log_level))
            .show_ui(ui, |ui| {
                for level in [
                    LevelFilter::ERROR,
                    LevelFilter::WARN,
                    LevelFilter::INFO,
                    LevelFilter::DEBUG,
                    LevelFilter::TRACE,
                ] {
                    if ui
                        .selectable_label(self.log_level == level, format!("{:?}", level))
                        .clicked()
                    {
                        self.set_log_level(level);
                    }
                }
            });
    }
}

impl eframe::App for ClothDesignApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("New").clicked() {
                        self.new_project();
                        ui.close();
                    }

                    if ui.button("Open project...").clicked() {
                        if let Some(path) = FileDialog::new()
                            .add_filter("ClothDesign Project", &["json"])
                            .pick_file()
                        {
                            match self.load_project_from(&path) {
                                Ok(()) => {
                                    self.project_path = Some(path);
                                    tracing::info!("project loaded");
                                }
                                Err(err) => {
                                    tracing::error!("failed to load project: {}", err);
                                }
                            }
                        }
                        ui.close();
                    }

                    if ui.button("Save project").clicked() {
                        if let Some(path) = self.project_path.clone() {
                            if let Err(err) = self.save_project_to(&path) {
                                tracing::error!("failed to save project: {}", err);
                            } else {
                                tracing::info!("project saved");
                            }
                        } else {
                            tracing::warn!("no project path set; use Save project As");
                        }
                        ui.close();
                    }

                    if ui.button("Save project As...").clicked() {
                        if let Some(path) = FileDialog::new()
                            .add_filter("ClothDesign Project", &["json"])
                            .set_file_name("project.json")
                            .save_file()
                        {
                            match self.save_project_to(&path) {
                                Ok(()) => {
                                    self.project_path = Some(path);
                                    tracing::info!("project saved");
                                }
                                Err(err) => {
                                    tracing::error!("failed to save project: {}", err);
                                }
                            }
                        }
                        ui.close();
                    }

                    ui.separator();
                    if ui.button("Open shape asset...").clicked() {
                        self.open_shape_asset();
                        ui.close();
                    }
                    if ui.button("Save shape asset").clicked() {
                        self.save_shape_asset();
                        ui.close();
                    }
                    if ui.button("Export OBJ...").clicked() {
                        self.export_obj();
                        ui.close();
                    }
                });

                ui.menu_button("Edit", |ui| {
                    if ui
                        .add_enabled(self.editor.history.can_undo(), egui::Button::new("Undo"))
                        .clicked()
                    {
                        self.editor.undo();
                        ui.close();
                    }
                    if ui
                        .add_enabled(self.editor.history.can_redo(), egui::Button::new("Redo"))
                        .clicked()
                    {
                        self.editor.redo();
                        ui.close();
                    }
                    ui.separator();
                    if ui.button("Delete selected").clicked() {
                        self.editor.delete_selected();
                        ui.close();
                    }
                });

                ui.separator();
                ui.label("clothdesign");
                ui.separator();
                ui.checkbox(&mut self.project.settings.panels.show_tools, "Tools");
                ui.checkbox(&mut self.project.settings.panels.show_sim, "Simulation");
                ui.checkbox(&mut self.project.settings.panels.show_console, "Console");
            });
        });

        let panels = self.project.settings.panels.clone();
        if panels.show_tools || panels.show_sim || panels.show_console {
            egui::SidePanel::right("side_panels")
                .resizable(true)
                .default_width(300.0)
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical().show(ui, |ui| {
                        if panels.show_tools {
                            egui::CollapsingHeader::new("Tools")
                                .default_open(true)
                                .show(ui, |ui| self.tools_ui(ui));
                        }

                        if panels.show_sim {
                            egui::CollapsingHeader::new("Simulation")
                                .default_open(true)
                                .show(ui, |ui| self.sim_ui(ui));
                        }

                        egui::CollapsingHeader::new("Canvas")
                            .default_open(false)
                            .show(ui, |ui| self.canvas_settings_ui(ui));

                        if panels.show_console {
                            egui::CollapsingHeader::new("Console")
                                .default_open(true)
                                .show(ui, |ui| {
                                    if ui.small_button("Clear").clicked() {
                                        self.console.clear();
                                    }
                                    egui::ScrollArea::vertical()
                                        .id_salt("console_scroll")
                                        .max_height(240.0)
                                        .stick_to_bottom(true)
                                        .show(ui, |ui| {
                                            for line in self.console.snapshot() {
                                                ui.label(line);
                                            }
                                        });
                                });
                        }
                    });
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            let settings = self.project.settings.canvas.clone();
            if let Some((result, screen)) = canvas::canvas_ui(ui, &mut self.editor, &settings) {
                self.handle_sew_click(result, screen);
            }
        });
    }
}

fn show_warning(title: &str, message: &str) {
    MessageDialog::new()
        .set_level(MessageLevel::Warning)
        .set_title(title)
        .set_description(message)
        .set_buttons(MessageButtons::Ok)
        .show();
}

fn show_sewing_error(err: &SewingError) {
    let title = match err {
        SewingError::InvalidTarget | SewingError::DifferentShape => "Invalid Target",
        SewingError::MissingMesh | SewingError::InvalidMesh => "Missing Mesh",
        SewingError::MissingPieces | SewingError::SameShape => "Invalid Seam",
    };
    show_warning(title, &err.to_string());
}

pub(crate) fn setup_tracing(echo: ConsoleEcho) -> (ConsoleBuffer, Arc<AtomicU8>) {
    let console = ConsoleBuffer::new();
    let log_level_state = Arc::new(AtomicU8::new(level_filter_to_u8(LevelFilter::INFO)));
    let filter_state = log_level_state.clone();
    let filter_layer = tracing_subscriber::filter::filter_fn(move |metadata| {
        let level = match filter_state.load(Ordering::Relaxed) {
            value if value == level_filter_to_u8(LevelFilter::ERROR) => Level::ERROR,
            value if value == level_filter_to_u8(LevelFilter::WARN) => Level::WARN,
            value if value == level_filter_to_u8(LevelFilter::INFO) => Level::INFO,
            value if value == level_filter_to_u8(LevelFilter::DEBUG) => Level::DEBUG,
            _ => Level::TRACE,
        };
        metadata.level() <= &level
    });
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(ConsoleMakeWriter {
            buffer: console.clone(),
            echo,
        });

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter_layer))
        .init();

    (console, log_level_state)
}

fn level_filter_to_u8(level: LevelFilter) -> u8 {
    match level {
        LevelFilter::OFF => 0,
        LevelFilter::ERROR => 1,
        LevelFilter::WARN => 2,
        LevelFilter::INFO => 3,
        LevelFilter::DEBUG => 4,
        LevelFilter::TRACE => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_buffer_keeps_last_lines() {
        let buffer = ConsoleBuffer::new();
        for i in 0..(MAX_LOG_LINES + 10) {
            buffer.push_line(format!("line {i}"));
        }
        let lines = buffer.snapshot();
        assert_eq!(lines.len(), MAX_LOG_LINES);
        assert_eq!(lines[0], "line 10");
        buffer.clear();
        assert!(buffer.snapshot().is_empty());
    }

    #[test]
    fn console_writer_splits_lines() {
        use std::io::Write;
        let buffer = ConsoleBuffer::new();
        let mut writer = ConsoleWriter {
            buffer: buffer.clone(),
            echo: ConsoleEcho::Stderr,
        };
        writer.write_all(b"first\nsecond\n").expect("write");
        assert_eq!(buffer.snapshot(), vec!["first", "second"]);
    }

    #[test]
    fn make_writer_keeps_echo_target() {
        use tracing_subscriber::fmt::MakeWriter;
        let make = ConsoleMakeWriter {
            buffer: ConsoleBuffer::new(),
            echo: ConsoleEcho::Stderr,
        };
        assert_eq!(make.make_writer().echo, ConsoleEcho::Stderr);
    }

    #[test]
    fn asset_browser_lists_saved_shapes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = ClothDesignApp::new(ConsoleBuffer::new(), Arc::new(AtomicU8::new(3)));
        app.project.settings.asset_root = dir.path().display().to_string();
        app.apply_project_settings();
        assert!(app.asset_list.is_empty());

        app.editor.state.completed_shapes.push(cloth_core::Curve::from_positions(&[
            glam::Vec2::new(0.0, 0.0),
            glam::Vec2::new(10.0, 0.0),
            glam::Vec2::new(10.0, 10.0),
        ]));
        app.asset_name = "Sleeve".to_string();
        app.save_shape_asset();
        assert_eq!(app.asset_list.len(), 1);

        let path = app.asset_list[0].clone();
        app.load_shape_asset(&path);
        assert_eq!(app.editor.assets.selected_path(), Some(path.as_path()));
        assert_eq!(app.editor.state.completed_shapes.len(), 1);
    }

    #[test]
    fn level_codes_are_ordered() {
        assert!(level_filter_to_u8(LevelFilter::ERROR) < level_filter_to_u8(LevelFilter::TRACE));
        assert_eq!(level_filter_to_u8(LevelFilter::OFF), 0);
    }
}
