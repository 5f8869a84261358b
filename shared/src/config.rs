use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Playfield geometry, in physics-world meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    pub width: f32,
    pub height: f32,
    /// Pixels per meter, for renderers
    pub scale: f32,
    pub ball_radius: f32,
    pub paddle_width: f32,
    pub paddle_height: f32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            width: 25.0,
            height: 30.0,
            scale: 20.0,
            ball_radius: 0.2,
            paddle_width: 0.4,
            paddle_height: 3.0,
        }
    }
}

impl FieldConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.width.is_finite() || self.width <= 0.0 {
            return Err("width must be finite and > 0".to_string());
        }
        if !self.height.is_finite() || self.height <= 0.0 {
            return Err("height must be finite and > 0".to_string());
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err("scale must be finite and > 0".to_string());
        }
        if !self.ball_radius.is_finite() || self.ball_radius <= 0.0 {
            return Err("ball_radius must be finite and > 0".to_string());
        }
        if self.ball_radius * 2.0 >= self.width.min(self.height) {
            return Err("ball must fit inside the field".to_string());
        }
        if !self.paddle_width.is_finite() || self.paddle_width <= 0.0 {
            return Err("paddle_width must be finite and > 0".to_string());
        }
        if !self.paddle_height.is_finite()
            || self.paddle_height <= 0.0
            || self.paddle_height >= self.height
        {
            return Err("paddle_height must be finite, > 0 and < height".to_string());
        }
        Ok(())
    }

    /// Center of the playfield
    pub fn center(&self) -> crate::vec2::Vec2 {
        crate::vec2::vec2(self.width / 2.0, self.height / 2.0)
    }
}
