use std::path::{Path, PathBuf};
use std::process;

use cloth_core::{CanvasEditor, ClothPreset, ClothSimConfig, SceneSnapshot};
use eframe::egui;
use serde::Serialize;

mod app;

struct HeadlessArgs {
    asset_path: PathBuf,
    obj_path: Option<PathBuf>,
    preset: Option<ClothPreset>,
    merge: bool,
    print: bool,
}

#[derive(Debug, Serialize)]
struct HeadlessSummary {
    asset: String,
    shapes: usize,
    seams: usize,
    aligned_seams: usize,
    merged_pieces: usize,
    triangles: usize,
    pieces: Vec<PieceSummary>,
    preset: ClothPreset,
    sim_config: ClothSimConfig,
}

#[derive(Debug, Serialize)]
struct PieceSummary {
    label: String,
    vertices: usize,
    triangles: usize,
}

fn is_headless(args: &[String]) -> bool {
    args.iter().any(|arg| arg == "--headless")
}

fn maybe_run_headless(args: &[String]) -> Result<bool, String> {
    if !is_headless(args) {
        return Ok(false);
    }

    let parsed = parse_headless_args(args)?;
    let summary = run_headless(&parsed)?;
    if parsed.print {
        let json = serde_json::to_string_pretty(&summary).map_err(|err| err.to_string())?;
        println!("{json}");
    }

    tracing::info!("headless: completed");
    Ok(true)
}

fn run_headless(parsed: &HeadlessArgs) -> Result<HeadlessSummary, String> {
    let mut editor = CanvasEditor::new();
    editor
        .load_asset(&parsed.asset_path)
        .map_err(|err| format!("failed to load {}: {err}", parsed.asset_path.display()))?;

    let generated = editor.generate_meshes();
    let aligned_seams = editor.sew_all();
    let merged_pieces = if parsed.merge {
        editor.merge_sewn().merged.len()
    } else {
        0
    };
    tracing::info!(
        "headless: {} pieces generated, {} seams aligned, {} merged",
        generated,
        aligned_seams,
        merged_pieces
    );

    if let Some(preset) = parsed.preset {
        editor.apply_sim_preset(preset);
    }

    if let Some(path) = &parsed.obj_path {
        editor
            .export_obj(path)
            .map_err(|err| format!("failed to export {}: {err}", path.display()))?;
    }

    Ok(summarize(&editor, &parsed.asset_path, aligned_seams, merged_pieces))
}

fn summarize(
    editor: &CanvasEditor,
    asset: &Path,
    aligned_seams: usize,
    merged_pieces: usize,
) -> HeadlessSummary {
    let snapshot = SceneSnapshot::from_pieces(&editor.pieces);
    HeadlessSummary {
        asset: asset.display().to_string(),
        shapes: editor.state.completed_shapes.len(),
        seams: editor.state.seams.len(),
        aligned_seams,
        merged_pieces,
        triangles: snapshot.triangle_count(),
        pieces: snapshot
            .ranges
            .iter()
            .map(|range| PieceSummary {
                label: range.label.clone(),
                vertices: range.vertex_count,
                triangles: range.index_count / 3,
            })
            .collect(),
        preset: editor.sim_settings.selected_preset,
        sim_config: editor.sim_config.clone(),
    }
}

fn parse_headless_args(args: &[String]) -> Result<HeadlessArgs, String> {
    let mut asset_path = None;
    let mut obj_path = None;
    let mut preset = None;
    let mut merge = false;
    let mut print = false;
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--headless" => {}
            "--asset" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--asset requires a path".to_string())?;
                asset_path = Some(PathBuf::from(value));
            }
            "--obj" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--obj requires a path".to_string())?;
                obj_path = Some(PathBuf::from(value));
            }
            "--preset" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--preset requires a name".to_string())?;
                preset = Some(parse_preset(value)?);
            }
            "--merge" => merge = true,
            "--print" => print = true,
            "--help" => {
                print_headless_help();
                process::exit(0);
            }
            other => return Err(format!("unknown argument {other}")),
        }
    }

    Ok(HeadlessArgs {
        asset_path: asset_path.ok_or_else(|| "--asset is required".to_string())?,
        obj_path,
        preset,
        merge,
        print,
    })
}

fn parse_preset(value: &str) -> Result<ClothPreset, String> {
    ClothPreset::ALL
        .into_iter()
        .find(|preset| preset.display_name().eq_ignore_ascii_case(value))
        .ok_or_else(|| format!("unknown cloth preset {value}"))
}

fn print_headless_help() {
    println!(
        "Headless mode options:\n  --headless\n  --asset <shape.json>\n  --obj <out.obj>\n  --preset <custom|denim|leather|silk|jersey>\n  --merge\n  --print"
    );
}

fn main() -> eframe::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let echo = if is_headless(&args) {
        app::ConsoleEcho::Stderr
    } else {
        app::ConsoleEcho::Stdout
    };
    let (console, log_level_state) = app::setup_tracing(echo);

    tracing::info!("clothdesign starting");

    match maybe_run_headless(&args) {
        Ok(true) => return Ok(()),
        Ok(false) => {}
        Err(err) => {
            eprintln!("headless error: {err}");
            process::exit(1);
        }
    }

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1400.0, 900.0]),
        renderer: eframe::Renderer::Wgpu,
        ..Default::default()
    };
    eframe::run_native(
        "clothdesign",
        native_options,
        Box::new(|_cc| Ok(Box::new(app::ClothDesignApp::new(console, log_level_state)))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloth_core::{save_shape_asset, CanvasState, Curve, EdgeIndices, SeamDefinition};
    use glam::Vec2;

    fn rect(x: f32) -> Curve {
        Curve::from_positions(&[
            Vec2::new(x, 0.0),
            Vec2::new(x + 40.0, 0.0),
            Vec2::new(x + 40.0, 40.0),
            Vec2::new(x, 40.0),
        ])
    }

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("clothdesign")
            .chain(list.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn parses_headless_flags() {
        let parsed = parse_headless_args(&args(&[
            "--headless",
            "--asset",
            "shape.json",
            "--obj",
            "out.obj",
            "--preset",
            "Denim",
            "--merge",
        ]))
        .expect("parse");
        assert_eq!(parsed.asset_path, PathBuf::from("shape.json"));
        assert_eq!(parsed.obj_path, Some(PathBuf::from("out.obj")));
        assert_eq!(parsed.preset, Some(ClothPreset::Denim));
        assert!(parsed.merge);
        assert!(!parsed.print);
    }

    #[test]
    fn asset_is_required() {
        let err = parse_headless_args(&args(&["--headless", "--print"]))
            .err()
            .expect("missing asset");
        assert!(err.contains("--asset"));
    }

    #[test]
    fn unknown_preset_is_an_error() {
        assert!(parse_preset("velvet").is_err());
        assert_eq!(parse_preset("jersey"), Ok(ClothPreset::Jersey));
    }

    #[test]
    fn headless_merges_sewn_asset() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut state = CanvasState::default();
        state.completed_shapes.push(rect(0.0));
        state.completed_shapes.push(rect(100.0));
        state.completed_shapes.push(rect(300.0));
        state.seams.push(SeamDefinition {
            shape_a: 0,
            edge_a: EdgeIndices { start: 1, end: 2 },
            shape_b: 1,
            edge_b: EdgeIndices { start: 0, end: 3 },
        });
        let asset = save_shape_asset(dir.path(), "Tests", "Pair", &state).expect("save");
        let obj = dir.path().join("pair.obj");

        let parsed = HeadlessArgs {
            asset_path: asset,
            obj_path: Some(obj.clone()),
            preset: Some(ClothPreset::Denim),
            merge: true,
            print: false,
        };
        let summary = run_headless(&parsed).expect("headless run");
        assert_eq!(summary.shapes, 3);
        assert_eq!(summary.seams, 1);
        assert_eq!(summary.aligned_seams, 1);
        assert_eq!(summary.merged_pieces, 1);
        assert_eq!(summary.pieces.len(), 2);
        assert!(summary
            .pieces
            .iter()
            .any(|piece| piece.label == "MergedPatternMesh_0"));
        assert_eq!(summary.preset, ClothPreset::Denim);
        assert!(obj.exists());
    }

    #[test]
    fn not_headless_without_flag() {
        assert_eq!(maybe_run_headless(&args(&["--asset", "x.json"])), Ok(false));
    }
}
