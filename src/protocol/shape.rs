//! 3D shape line parser
//!
//! Shape lines look like `3D|key[,label]:value(;value)*|flags`, where each
//! value is an attribute list such as `S:cube:P:1:2:-1:C:red`, optionally
//! prefixed with a millisecond timestamp (`1627551892437:S:sphere:RA:2`).
//!
//! A value is decoded into a [`ShapeUpdate`] holding only the attributes it
//! mentions. [`ShapeUpdate::resolve`] turns it into a full [`ShapeState`] by
//! filling the gaps from the channel's previous snapshot, or from the defaults
//! of the declared shape kind when the channel has none yet.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{LasecPlotError, Result};
use crate::protocol::split_widget_label;
use crate::protocol::variable::Flags;
use crate::types::{millis_to_secs, parse_leading_f64};

/// Geometry of a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Cube,
    Sphere,
}

impl FromStr for ShapeKind {
    type Err = LasecPlotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cube" => Ok(ShapeKind::Cube),
            "sphere" => Ok(ShapeKind::Sphere),
            other => Err(LasecPlotError::InvalidShape(format!(
                "unknown shape kind '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShapeKind::Cube => write!(f, "cube"),
            ShapeKind::Sphere => write!(f, "sphere"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn patched(self, parts: &[Option<f64>; 3]) -> Self {
        Self {
            x: parts[0].unwrap_or(self.x),
            y: parts[1].unwrap_or(self.y),
            z: parts[2].unwrap_or(self.z),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl Quaternion {
    fn patched(self, parts: &[Option<f64>; 4]) -> Self {
        Self {
            x: parts[0].unwrap_or(self.x),
            y: parts[1].unwrap_or(self.y),
            z: parts[2].unwrap_or(self.z),
            w: parts[3].unwrap_or(self.w),
        }
    }
}

/// Default shape color
pub const DEFAULT_COLOR: &str = "grey";

/// Default sphere tessellation
pub const DEFAULT_PRECISION: f64 = 15.0;

/// Complete attribute snapshot of a shape at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeState {
    pub kind: ShapeKind,
    pub position: Vec3,
    /// Euler angles in radians
    pub rotation: Vec3,
    /// When set, takes precedence over `rotation`
    pub quaternion: Option<Quaternion>,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub radius: f64,
    pub color: String,
    pub opacity: f64,
    pub precision: f64,
}

impl ShapeState {
    /// Attribute set used when a channel receives its first shape
    pub fn defaults(kind: ShapeKind) -> Self {
        Self {
            kind,
            position: Vec3::default(),
            rotation: Vec3::default(),
            quaternion: None,
            width: 1.0,
            height: 1.0,
            depth: 1.0,
            radius: 1.0,
            color: DEFAULT_COLOR.to_string(),
            opacity: 1.0,
            precision: DEFAULT_PRECISION,
        }
    }
}

/// Attributes mentioned by one shape value. `None` means "not given".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShapeUpdate {
    pub kind: Option<ShapeKind>,
    pub position: [Option<f64>; 3],
    pub rotation: [Option<f64>; 3],
    /// `Some` when the quaternion attribute appeared, even partially
    pub quaternion: Option<[Option<f64>; 4]>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub depth: Option<f64>,
    pub radius: Option<f64>,
    pub color: Option<String>,
    pub opacity: Option<f64>,
    pub precision: Option<f64>,
    /// Raw attribute text, kept for diagnostics
    pub raw: String,
}

/// Attribute keys of the shape grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attribute {
    Kind,
    Position,
    Rotation,
    Quaternion,
    Width,
    Height,
    Depth,
    Radius,
    Color,
    Opacity,
    Precision,
}

impl Attribute {
    fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "S" | "shape" | "type" => Attribute::Kind,
            "P" | "pos" | "position" => Attribute::Position,
            "R" | "rot" | "rotation" => Attribute::Rotation,
            "Q" | "quat" | "quaternion" => Attribute::Quaternion,
            "W" | "width" => Attribute::Width,
            "H" | "height" => Attribute::Height,
            "D" | "depth" => Attribute::Depth,
            "RA" | "radius" => Attribute::Radius,
            "C" | "color" => Attribute::Color,
            "O" | "opacity" => Attribute::Opacity,
            "PR" | "precision" => Attribute::Precision,
            _ => return None,
        })
    }
}

/// Cursor over the `:`-separated attribute tokens
struct Tokens<'a> {
    tokens: Vec<&'a str>,
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn next(&mut self) -> Option<&'a str> {
        let token = self.tokens.get(self.pos).copied();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Value token of a scalar attribute; always consumed, whatever it looks like
    fn scalar(&mut self, attribute: &str) -> Result<&'a str> {
        self.next().ok_or_else(|| {
            LasecPlotError::InvalidShape(format!("attribute '{}' has no value", attribute))
        })
    }

    /// Up to `N` vector components, stopping early at the next attribute key
    fn components<const N: usize>(&mut self) -> Result<[Option<f64>; N]> {
        let mut parts = [None; N];
        for part in parts.iter_mut() {
            match self.tokens.get(self.pos) {
                Some(token) if Attribute::from_token(token).is_none() => {
                    self.pos += 1;
                    *part = number(token)?;
                }
                _ => break,
            }
        }
        Ok(parts)
    }
}

/// Empty component = unspecified
fn number(token: &str) -> Result<Option<f64>> {
    if token.is_empty() {
        return Ok(None);
    }
    let value = parse_leading_f64(token);
    if value.is_nan() {
        return Err(LasecPlotError::InvalidShape(format!(
            "'{}' is not a number",
            token
        )));
    }
    Ok(Some(value))
}

impl FromStr for ShapeUpdate {
    type Err = LasecPlotError;

    fn from_str(raw: &str) -> Result<Self> {
        let mut update = ShapeUpdate {
            raw: raw.to_string(),
            ..Default::default()
        };
        let mut tokens = Tokens {
            tokens: raw.split(':').collect(),
            pos: 0,
        };

        // A leading bare word is the shape kind (`cube:P:0:0:0`)
        if let Some(first) = tokens.tokens.first() {
            if !first.is_empty() && Attribute::from_token(first).is_none() {
                update.kind = Some(first.parse()?);
                tokens.pos = 1;
            }
        }

        while let Some(token) = tokens.next() {
            if token.is_empty() {
                continue;
            }
            let attribute = Attribute::from_token(token).ok_or_else(|| {
                LasecPlotError::InvalidShape(format!("unknown attribute '{}'", token))
            })?;
            match attribute {
                Attribute::Kind => {
                    let value = tokens.scalar(token)?;
                    if !value.is_empty() {
                        update.kind = Some(value.parse()?);
                    }
                }
                Attribute::Position => update.position = tokens.components::<3>()?,
                Attribute::Rotation => update.rotation = tokens.components::<3>()?,
                Attribute::Quaternion => update.quaternion = Some(tokens.components::<4>()?),
                Attribute::Width => update.width = number(tokens.scalar(token)?)?,
                Attribute::Height => update.height = number(tokens.scalar(token)?)?,
                Attribute::Depth => update.depth = number(tokens.scalar(token)?)?,
                Attribute::Radius => update.radius = number(tokens.scalar(token)?)?,
                Attribute::Opacity => update.opacity = number(tokens.scalar(token)?)?,
                Attribute::Precision => update.precision = number(tokens.scalar(token)?)?,
                Attribute::Color => {
                    let value = tokens.scalar(token)?;
                    if !value.is_empty() {
                        update.color = Some(value.to_string());
                    }
                }
            }
        }

        Ok(update)
    }
}

impl ShapeUpdate {
    fn sets_rotation(&self) -> bool {
        self.rotation.iter().any(Option::is_some)
    }

    /// Build the full snapshot for this update.
    ///
    /// Missing attributes come from `previous`, or from the kind defaults when
    /// there is no previous snapshot. Without either a previous snapshot or a
    /// declared kind the update cannot be placed and is rejected.
    pub fn resolve(&self, previous: Option<&ShapeState>) -> Result<ShapeState> {
        let mut state = match (previous, self.kind) {
            (Some(prev), _) => prev.clone(),
            (None, Some(kind)) => ShapeState::defaults(kind),
            (None, None) => return Err(LasecPlotError::ShapeWithoutType(self.raw.clone())),
        };

        if let Some(kind) = self.kind {
            state.kind = kind;
        }
        state.position = state.position.patched(&self.position);
        state.rotation = state.rotation.patched(&self.rotation);
        match &self.quaternion {
            Some(parts) => {
                state.quaternion = Some(state.quaternion.unwrap_or_default().patched(parts));
            }
            // An explicit Euler rotation replaces an inherited quaternion
            None if self.sets_rotation() => state.quaternion = None,
            None => {}
        }
        if let Some(v) = self.width {
            state.width = v;
        }
        if let Some(v) = self.height {
            state.height = v;
        }
        if let Some(v) = self.depth {
            state.depth = v;
        }
        if let Some(v) = self.radius {
            state.radius = v;
        }
        if let Some(color) = &self.color {
            state.color = color.clone();
        }
        if let Some(v) = self.opacity {
            state.opacity = v;
        }
        if let Some(v) = self.precision {
            state.precision = v;
        }
        Ok(state)
    }
}

/// Header of a shape line; values are decoded one by one by [`parse_shape_value`]
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeLine<'a> {
    pub name: &'a str,
    pub widget_label: Option<&'a str>,
    pub flags: Flags,
    /// Non-empty `;`-separated values, in input order
    pub values: Vec<&'a str>,
}

/// Split a `3D|key[,label]:v1;v2|flags` line into its parts
pub fn parse_shape_line(line: &str) -> Result<ShapeLine<'_>> {
    let body = line
        .strip_prefix("3D|")
        .ok_or_else(|| LasecPlotError::InvalidShape(format!("not a shape line: {}", line)))?;
    let colon = body
        .find(':')
        .ok_or_else(|| LasecPlotError::MissingSeparator(line.to_string()))?;
    let (name, widget_label) = split_widget_label(&body[..colon]);

    // Flags only start at a pipe that follows the key
    let (values, flags) = match body.rfind('|') {
        Some(pipe) if pipe > colon => (&body[colon + 1..pipe], &body[pipe + 1..]),
        _ => (&body[colon + 1..], ""),
    };

    Ok(ShapeLine {
        name,
        widget_label,
        flags: Flags::parse(flags),
        values: values.split(';').filter(|v| !v.is_empty()).collect(),
    })
}

/// Decode one shape value into its timestamp (seconds) and attribute update.
///
/// A value starting with a letter carries no timestamp and uses `now`;
/// otherwise the text up to the first `:` is a millisecond timestamp.
pub fn parse_shape_value(value: &str, now: f64) -> Result<(f64, ShapeUpdate)> {
    let starts_with_letter = value.chars().next().is_some_and(char::is_alphabetic);
    if starts_with_letter {
        return Ok((now, value.parse()?));
    }

    let (stamp, rest) = value
        .split_once(':')
        .ok_or_else(|| LasecPlotError::invalid_item(value, "timestamp without shape"))?;
    let millis: f64 = stamp
        .parse()
        .map_err(|_| LasecPlotError::invalid_item(value, "invalid timestamp"))?;
    if !millis.is_finite() {
        return Err(LasecPlotError::invalid_item(value, "invalid timestamp"));
    }
    Ok((millis_to_secs(millis), rest.parse()?))
}
