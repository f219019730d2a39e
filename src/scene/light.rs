use glam::Vec3;

/// Lights understood by the forward scene pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Ambient {
        color: Vec3,
        intensity: f32,
    },
    /// Light travelling along `direction` (world space).
    Directional {
        direction: Vec3,
        color: Vec3,
        intensity: f32,
    },
}

impl Light {
    #[must_use]
    pub fn ambient(color: Vec3, intensity: f32) -> Self {
        Self::Ambient { color, intensity }
    }

    #[must_use]
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self::Directional {
            direction: direction.normalize_or_zero(),
            color,
            intensity,
        }
    }

    /// Color premultiplied by intensity.
    #[must_use]
    pub fn radiance(&self) -> Vec3 {
        match *self {
            Self::Ambient { color, intensity } | Self::Directional { color, intensity, .. } => {
                color * intensity
            }
        }
    }
}
