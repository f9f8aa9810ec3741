use cloth_core::{
    sample_shape, shortest_arc_segments, CanvasEditor, CanvasSettings, CanvasView, Curve,
    EdgeIndices, EditorKey, EditorMode, SewClick, ShapeRef, SAMPLES_PER_SEGMENT,
};
use eframe::egui::{self, Color32, Pos2, Rect, Stroke};
use glam::Vec2;

const BACKGROUND: Color32 = Color32::from_rgb(28, 30, 34);
const GRID_MINOR: Color32 = Color32::from_rgb(40, 43, 48);
const GRID_MAJOR: Color32 = Color32::from_rgb(58, 62, 70);
const OUTLINE: Color32 = Color32::from_rgb(90, 200, 250);
const CURRENT: Color32 = Color32::from_rgb(250, 250, 250);
const POINT: Color32 = Color32::from_rgb(230, 230, 230);
const SELECTED: Color32 = Color32::from_rgb(255, 210, 60);
const SEWN: Color32 = Color32::from_rgb(120, 220, 120);
const SEAM: Color32 = Color32::from_rgb(230, 120, 200);
const HANDLE: Color32 = Color32::from_rgb(255, 150, 60);
const PREVIEW: Color32 = Color32::from_rgb(255, 90, 90);

/// Draws the pattern canvas and feeds pointer and key input to the editor.
/// Returns the result of a sew click together with its canvas-local screen
/// position so the caller can prompt the user.
pub(super) fn canvas_ui(
    ui: &mut egui::Ui,
    editor: &mut CanvasEditor,
    settings: &CanvasSettings,
) -> Option<(SewClick, Vec2)> {
    let available = ui.available_size();
    let (rect, response) = ui.allocate_exact_size(available, egui::Sense::click_and_drag());
    editor.viewport = Vec2::new(rect.width(), rect.height());

    let sew_result = handle_input(ui, &response, rect, editor);

    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, 0.0, BACKGROUND);

    let view = editor.view();
    if settings.show_grid {
        paint_grid(&painter, rect, &view, settings);
    }

    for (index, shape) in editor.state.completed_shapes.iter().enumerate() {
        let samples = sample_shape(shape, None).0;
        let points: Vec<Pos2> = samples.iter().map(|p| to_pos(rect, &view, *p)).collect();
        if points.len() >= 2 {
            painter.add(egui::Shape::closed_line(points, Stroke::new(1.5, OUTLINE)));
        }
        paint_sewn_edges(&painter, rect, &view, editor, index, shape);
    }

    let current = &editor.state.curve;
    if current.len() >= 2 {
        let mut samples = current.sample_segments(SAMPLES_PER_SEGMENT);
        if let Some(last) = current.points.last() {
            samples.push(last.position);
        }
        let points: Vec<Pos2> = samples.iter().map(|p| to_pos(rect, &view, *p)).collect();
        painter.add(egui::Shape::line(points, Stroke::new(1.5, CURRENT)));
    }

    paint_seams(&painter, rect, &view, editor);
    paint_points(&painter, rect, &view, editor);

    for target in &editor.state.seam_preview_points {
        if let Some(p) = editor.state.point_position(*target) {
            painter.circle_stroke(to_pos(rect, &view, p), 8.0, Stroke::new(2.0, PREVIEW));
        }
    }

    painter.text(
        rect.left_top() + egui::vec2(8.0, 8.0),
        egui::Align2::LEFT_TOP,
        format!(
            "{} mode | zoom {:.2} | {}",
            editor.mode.label(),
            view.zoom,
            if editor.use_bezier_points { "bezier" } else { "linear" }
        ),
        egui::FontId::monospace(12.0),
        Color32::from_gray(200),
    );

    sew_result
}

fn handle_input(
    ui: &egui::Ui,
    response: &egui::Response,
    rect: Rect,
    editor: &mut CanvasEditor,
) -> Option<(SewClick, Vec2)> {
    let local = |pos: Pos2| Vec2::new(pos.x - rect.min.x, pos.y - rect.min.y);

    if response.hovered() {
        let text_focus = ui.ctx().wants_keyboard_input();
        let events = ui.input(|i| i.events.clone());
        for press in shortcut_presses(&events, text_focus) {
            if press.pressed {
                editor.key_down(press.key, press.ctrl);
            } else {
                editor.key_up(press.key);
            }
        }

        let scroll = ui.input(|i| i.raw_scroll_delta.y);
        if scroll != 0.0 {
            if let Some(pos) = response.hover_pos() {
                editor.zoom_at(local(pos), scroll.signum());
            }
        }
    }

    if response.dragged_by(egui::PointerButton::Middle) {
        let delta = response.drag_motion();
        editor.pan_by(Vec2::new(delta.x, delta.y));
    }

    if editor.mode == EditorMode::Select {
        let pressed = ui.input(|i| i.pointer.primary_pressed());
        if pressed && response.hovered() {
            if let Some(pos) = ui.input(|i| i.pointer.interact_pos()) {
                editor.select_click(local(pos));
            }
        }
        if response.dragged_by(egui::PointerButton::Primary) {
            if let Some(pos) = response.interact_pointer_pos() {
                editor.drag_to(local(pos));
            }
        }
        if editor.is_dragging() && ui.input(|i| i.pointer.primary_released()) {
            editor.release();
        }
        return None;
    }

    if response.clicked_by(egui::PointerButton::Primary) {
        let pos = local(response.interact_pointer_pos()?);
        return editor.primary_click(pos).map(|result| (result, pos));
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ShortcutPress {
    key: EditorKey,
    pressed: bool,
    ctrl: bool,
}

/// Canvas shortcuts in this frame's events. A focused text field owns the
/// keyboard, so nothing is returned while one has focus.
fn shortcut_presses(events: &[egui::Event], text_focus: bool) -> Vec<ShortcutPress> {
    if text_focus {
        return Vec::new();
    }
    events
        .iter()
        .filter_map(|event| match event {
            egui::Event::Key {
                key,
                pressed,
                repeat: false,
                modifiers,
                ..
            } => map_key(*key).map(|key| ShortcutPress {
                key,
                pressed: *pressed,
                ctrl: modifiers.command || modifiers.ctrl,
            }),
            _ => None,
        })
        .collect()
}

fn map_key(key: egui::Key) -> Option<EditorKey> {
    let mapped = match key {
        egui::Key::Num1 => EditorKey::Num1,
        egui::Key::Num2 => EditorKey::Num2,
        egui::Key::Num3 => EditorKey::Num3,
        egui::Key::Z => EditorKey::Z,
        egui::Key::Y => EditorKey::Y,
        egui::Key::F => EditorKey::F,
        egui::Key::T => EditorKey::T,
        egui::Key::B => EditorKey::B,
        egui::Key::N => EditorKey::N,
        egui::Key::Enter => EditorKey::Enter,
        egui::Key::Delete | egui::Key::Backspace => EditorKey::Delete,
        _ => return None,
    };
    Some(mapped)
}

fn to_pos(rect: Rect, view: &CanvasView, p: Vec2) -> Pos2 {
    let s = view.to_screen(p);
    Pos2::new(rect.min.x + s.x, rect.min.y + s.y)
}

fn paint_grid(painter: &egui::Painter, rect: Rect, view: &CanvasView, settings: &CanvasSettings) {
    let spacing = settings.grid_spacing * settings.background_scale.max(0.01);
    let lines = view.grid_lines(
        Vec2::new(rect.width(), rect.height()),
        spacing,
        settings.grid_subdivisions,
    );
    for (x, major) in lines.vertical {
        let color = if major { GRID_MAJOR } else { GRID_MINOR };
        painter.vline(rect.min.x + x, rect.y_range(), Stroke::new(1.0, color));
    }
    for (y, major) in lines.horizontal {
        let color = if major { GRID_MAJOR } else { GRID_MINOR };
        painter.hline(rect.x_range(), rect.min.y + y, Stroke::new(1.0, color));
    }
}

/// Thickens the outline along the shorter arc of every seam edge on `shape`.
fn paint_sewn_edges(
    painter: &egui::Painter,
    rect: Rect,
    view: &CanvasView,
    editor: &CanvasEditor,
    index: usize,
    shape: &Curve,
) {
    let count = shape.len();
    if count < 2 {
        return;
    }
    let samples = sample_shape(shape, None).0;
    if samples.is_empty() {
        return;
    }

    let edges = editor.state.seams.iter().flat_map(|seam| {
        let a = (seam.shape_a == index).then_some(seam.edge_a);
        let b = (seam.shape_b == index).then_some(seam.edge_b);
        a.into_iter().chain(b)
    });
    for EdgeIndices { start, end } in edges {
        for segment in shortest_arc_segments(start, end, count) {
            let from = segment * SAMPLES_PER_SEGMENT;
            let points: Vec<Pos2> = (from..=from + SAMPLES_PER_SEGMENT)
                .map(|k| to_pos(rect, view, samples[k % samples.len()]))
                .collect();
            painter.add(egui::Shape::line(points, Stroke::new(3.5, SEWN)));
        }
    }
}

fn paint_seams(painter: &egui::Painter, rect: Rect, view: &CanvasView, editor: &CanvasEditor) {
    let state = &editor.state;
    let key = |shape: usize, point: usize| {
        state
            .completed_shapes
            .get(shape)
            .and_then(|curve| curve.points.get(point))
            .map(|p| to_pos(rect, view, p.position))
    };
    for (index, seam) in state.seams.iter().enumerate() {
        let stroke = if state.selected_seam == Some(index) {
            Stroke::new(3.0, SELECTED)
        } else {
            Stroke::new(1.5, SEAM)
        };
        let lines = [
            (key(seam.shape_a, seam.edge_a.start), key(seam.shape_b, seam.edge_b.start)),
            (key(seam.shape_a, seam.edge_a.end), key(seam.shape_b, seam.edge_b.end)),
        ];
        for (a, b) in lines {
            if let (Some(a), Some(b)) = (a, b) {
                painter.line_segment([a, b], stroke);
            }
        }
    }
}

fn paint_points(painter: &egui::Painter, rect: Rect, view: &CanvasView, editor: &CanvasEditor) {
    let state = &editor.state;
    let selected = editor.selected_target();
    let show_handles = editor.mode == EditorMode::Select;

    let shapes = state
        .completed_shapes
        .iter()
        .enumerate()
        .map(|(i, curve)| (ShapeRef::Completed(i), curve))
        .chain(std::iter::once((ShapeRef::Current, &state.curve)));

    for (shape, curve) in shapes {
        let sewn = shape
            .completed_index()
            .and_then(|index| editor.sewn_points.get(&index));
        for (index, point) in curve.points.iter().enumerate() {
            let pos = to_pos(rect, view, point.position);
            let is_selected = selected.is_some_and(|t| t.shape == shape && t.point == index);

            if show_handles && point.use_bezier {
                for handle in [point.arrive_handle(), point.leave_handle()] {
                    let handle_pos = to_pos(rect, view, handle);
                    painter.line_segment([pos, handle_pos], Stroke::new(1.0, HANDLE));
                    painter.circle_filled(handle_pos, 3.0, HANDLE);
                }
            }

            let color = if is_selected {
                SELECTED
            } else if sewn.is_some_and(|set| set.contains(&index)) {
                SEWN
            } else {
                POINT
            };
            let radius = if is_selected { 5.0 } else { 3.5 };
            painter.circle_filled(pos, radius, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_event(key: egui::Key, pressed: bool, modifiers: egui::Modifiers) -> egui::Event {
        egui::Event::Key {
            key,
            physical_key: None,
            pressed,
            repeat: false,
            modifiers,
        }
    }

    #[test]
    fn shortcuts_map_keys_and_ctrl() {
        let events = vec![
            key_event(egui::Key::Num2, true, egui::Modifiers::NONE),
            key_event(egui::Key::Z, true, egui::Modifiers::COMMAND),
            key_event(egui::Key::Q, true, egui::Modifiers::NONE),
            key_event(egui::Key::T, false, egui::Modifiers::NONE),
        ];
        let presses = shortcut_presses(&events, false);
        assert_eq!(
            presses,
            vec![
                ShortcutPress { key: EditorKey::Num2, pressed: true, ctrl: false },
                ShortcutPress { key: EditorKey::Z, pressed: true, ctrl: true },
                ShortcutPress { key: EditorKey::T, pressed: false, ctrl: false },
            ]
        );
    }

    #[test]
    fn typing_in_a_text_field_does_not_edit_the_canvas() {
        let events = vec![
            key_event(egui::Key::Num1, true, egui::Modifiers::NONE),
            key_event(egui::Key::B, true, egui::Modifiers::NONE),
            key_event(egui::Key::Backspace, true, egui::Modifiers::NONE),
        ];
        assert!(shortcut_presses(&events, true).is_empty());

        let mut editor = CanvasEditor::new();
        editor.state.curve.push_point(Vec2::new(10.0, 10.0), false);
        editor.state.selected_point = Some(0);
        for press in shortcut_presses(&events, true) {
            editor.key_down(press.key, press.ctrl);
        }
        assert_eq!(editor.mode, EditorMode::Draw);
        assert_eq!(editor.state.curve.len(), 1);
    }
}
