use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClothPreset {
    #[default]
    Custom,
    Denim,
    Leather,
    Silk,
    Jersey,
}

impl ClothPreset {
    pub const ALL: [ClothPreset; 5] = [
        ClothPreset::Custom,
        ClothPreset::Denim,
        ClothPreset::Leather,
        ClothPreset::Silk,
        ClothPreset::Jersey,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            ClothPreset::Custom => "Custom",
            ClothPreset::Denim => "Denim",
            ClothPreset::Leather => "Leather",
            ClothPreset::Silk => "Silk",
            ClothPreset::Jersey => "Jersey",
        }
    }
}

/// Material parameters behind a preset.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClothPhysicalConfig {
    pub density: f32,
    pub bend_stiffness: f32,
    pub area_stiffness: f32,
    pub tether_stiffness: f32,
    pub tether_scale: f32,
    pub friction: f32,
    pub damping: f32,
    pub drag: f32,
    pub lift: f32,
    pub gravity_scale: f32,
}

impl ClothPhysicalConfig {
    const fn from_values(v: [f32; 10]) -> Self {
        Self {
            density: v[0],
            bend_stiffness: v[1],
            area_stiffness: v[2],
            tether_stiffness: v[3],
            tether_scale: v[4],
            friction: v[5],
            damping: v[6],
            drag: v[7],
            lift: v[8],
            gravity_scale: v[9],
        }
    }

    pub fn for_preset(preset: ClothPreset) -> Self {
        match preset {
            ClothPreset::Custom => Self::default(),
            ClothPreset::Denim => {
                Self::from_values([0.25, 0.85, 0.85, 1.0, 0.99, 0.8, 0.03, 0.15, 0.07, 1.05])
            }
            ClothPreset::Leather => {
                Self::from_values([0.35, 0.9, 0.9, 1.0, 0.99, 0.85, 0.04, 0.18, 0.09, 1.2])
            }
            ClothPreset::Silk => {
                Self::from_values([0.15, 0.6, 0.6, 1.0, 0.98, 0.7, 0.02, 0.12, 0.05, 1.05])
            }
            ClothPreset::Jersey => {
                Self::from_values([0.20, 0.75, 0.75, 1.0, 0.99, 0.75, 0.025, 0.14, 0.06, 0.9])
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weighted {
    pub low: f32,
    pub high: f32,
}

impl Weighted {
    pub fn uniform(value: f32) -> Self {
        Self { low: value, high: value }
    }
}

/// Solver-facing cloth configuration that presets are written into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClothSimConfig {
    pub density: f32,
    pub friction: f32,
    pub damping: f32,
    pub gravity_scale: f32,
    pub bending_stiffness: Weighted,
    pub area_stiffness: Weighted,
    pub tether_stiffness: Weighted,
    pub tether_scale: Weighted,
    pub drag: Weighted,
    pub lift: Weighted,
    pub collision: CollisionSettings,
}

impl Default for ClothSimConfig {
    fn default() -> Self {
        Self {
            density: 0.35,
            friction: 0.8,
            damping: 0.01,
            gravity_scale: 1.0,
            bending_stiffness: Weighted::uniform(1.0),
            area_stiffness: Weighted::uniform(1.0),
            tether_stiffness: Weighted::uniform(1.0),
            tether_scale: Weighted::uniform(1.0),
            drag: Weighted::uniform(0.035),
            lift: Weighted::uniform(0.035),
            collision: CollisionSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionSettings {
    pub collide_with_environment: bool,
    pub force_collision_update: bool,
}

pub fn set_cloth_collision_flags(collision: &mut CollisionSettings) {
    collision.collide_with_environment = true;
    collision.force_collision_update = true;
    tracing::debug!("cloth collision enabled");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClothSimSettings {
    pub selected_preset: ClothPreset,
}

impl ClothSimSettings {
    /// Writes `preset` into `config`. Custom keeps whatever is already there.
    pub fn apply_preset(config: &mut ClothSimConfig, preset: ClothPreset) -> bool {
        if preset == ClothPreset::Custom {
            tracing::info!("apply preset: custom selected, keeping current sim values");
            return false;
        }
        let values = ClothPhysicalConfig::for_preset(preset);
        config.density = values.density;
        config.friction = values.friction;
        config.damping = values.damping;
        config.gravity_scale = values.gravity_scale;
        config.bending_stiffness = Weighted::uniform(values.bend_stiffness);
        config.area_stiffness = Weighted::uniform(values.area_stiffness);
        config.tether_stiffness = Weighted::uniform(values.tether_stiffness);
        config.tether_scale = Weighted::uniform(values.tether_scale);
        config.drag = Weighted::uniform(values.drag);
        config.lift = Weighted::uniform(values.lift);
        tracing::info!("apply preset: {}", preset.display_name());
        true
    }

    pub fn apply_selected(&self, config: &mut ClothSimConfig) -> bool {
        Self::apply_preset(config, self.selected_preset)
    }
}
