use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::canvas_state::DEFAULT_HISTORY_LIMIT;
use crate::error::ProjectError;
use crate::sim_settings::ClothPreset;

pub const PROJECT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub version: u32,
    #[serde(default)]
    pub settings: ProjectSettings,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            version: PROJECT_VERSION,
            settings: ProjectSettings::default(),
        }
    }
}

impl Project {
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let data = fs::read_to_string(path)?;
        let project: Project = serde_json::from_str(&data)?;
        if project.version > PROJECT_VERSION {
            return Err(ProjectError::Version {
                found: project.version,
                expected: PROJECT_VERSION,
            });
        }
        Ok(project)
    }

    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    pub canvas: CanvasSettings,
    pub panels: PanelSettings,
    pub history_limit: usize,
    pub cloth_preset: ClothPreset,
    pub asset_root: String,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            canvas: CanvasSettings::default(),
            panels: PanelSettings::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            cloth_preset: ClothPreset::Custom,
            asset_root: "Content".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasSettings {
    pub grid_spacing: f32,
    pub grid_subdivisions: u32,
    pub background_scale: f32,
    pub show_grid: bool,
}

impl Default for CanvasSettings {
    fn default() -> Self {
        Self {
            grid_spacing: 100.0,
            grid_subdivisions: 4,
            background_scale: 1.0,
            show_grid: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelSettings {
    pub show_tools: bool,
    pub show_sim: bool,
    pub show_console: bool,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            show_tools: true,
            show_sim: true,
            show_console: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let project: Project =
            serde_json::from_str(r#"{"version":1,"settings":{"history_limit":16}}"#).expect("parse");
        assert_eq!(project.settings.history_limit, 16);
        assert_eq!(project.settings.canvas.grid_spacing, 100.0);
        assert_eq!(project.settings.canvas.grid_subdivisions, 4);
        assert_eq!(project.settings.asset_root, "Content");
        assert!(project.settings.panels.show_console);
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("project.json");
        let mut project = Project::default();
        project.settings.cloth_preset = ClothPreset::Denim;
        project.save(&path).expect("save");

        let loaded = Project::load(&path).expect("load");
        assert_eq!(loaded.settings.cloth_preset, ClothPreset::Denim);
        assert_eq!(loaded.version, PROJECT_VERSION);
    }

    #[test]
    fn newer_versions_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("project.json");
        fs::write(&path, r#"{"version":99}"#).expect("write");
        assert!(matches!(
            Project::load(&path),
            Err(ProjectError::Version { found: 99, .. })
        ));
    }
}
