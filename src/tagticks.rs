////////////////////////////////////////////////
// The tactics to handle GeoJSON feature properties //
////////////////////////////////////////////////

use csscolorparser::parse;
use serde_json::Value;
use tracing::debug;

use crate::kernel_out::RenderColor;

// This constants may come from a (3D-)render schema
pub static DEFAULT_BUILDING_HEIGHT: f64 = 10.0; // meters, if estimated_height is missing
pub static HOLE_FILL: &str = "#ff0000"; // walkway features drawn in red are holes

pub static HEIGHT_KEY: &str = "estimated_height";
pub static NAME_KEY: &str = "name";
pub static FILL_KEY: &str = "fill";

/// Height in meters from a property value. Numbers and numeric strings ("12", "12 m") are accepted,
/// everything else or a non-positive value gives the default.
pub fn parse_height(height_option: Option<&Value>, default: f64) -> f64 {
    let height = match height_option {
        None | Some(Value::Null) => return default,
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => {
            let text = text.trim();
            let text = text.strip_suffix('m').unwrap_or(text);
            text.trim().parse::<f64>().ok()
        }
        Some(other) => {
            debug!("parse_height: not a number: {other}");
            None
        }
    };

    match height {
        Some(height) if height.is_finite() && height > 0.0 => height,
        _ => default,
    }
}

pub fn parse_color(color: &str) -> Option<RenderColor> {
    // https://docs.rs/csscolorparser/latest/csscolorparser/
    match parse(color) {
        Ok(color_scc) => Some([
            color_scc.r as f32,
            color_scc.g as f32,
            color_scc.b as f32,
            color_scc.a as f32,
        ]),
        Err(error) => {
            debug!("parse_color: {color} => {error}");
            None
        }
    }
}

pub fn parse_color_or(color: &str, default: RenderColor) -> RenderColor {
    parse_color(color).unwrap_or(default)
}

/// True if a `fill` property marks a walkway hole. Compared as colors, so "#F00" and "red" match too.
pub fn is_hole_fill(fill: Option<&Value>) -> bool {
    let Some(Value::String(fill)) = fill else {
        return false;
    };
    match (parse_color(fill), parse_color(HOLE_FILL)) {
        (Some(fill), Some(hole)) => fill == hole,
        _ => false,
    }
}

pub fn property_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
}

/// `rgb(r, g, b)` with 0..255 channels
pub fn color_to_css(color: &RenderColor) -> String {
    let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!(
        "rgb({}, {}, {})",
        channel(color[0]),
        channel(color[1]),
        channel(color[2])
    )
}
