//! Display surface attachment
//!
//! The registry does not render anything, but it decides which channels share
//! a display surface so a renderer can lay them out. Attachment happens once,
//! when a channel is created.

use serde::Serialize;

use crate::types::TelemetryKind;

/// Identifier of a display surface, stable for the session lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SurfaceId(pub usize);

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// What a surface shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceKind {
    /// Time chart, or x/y chart when `xy` is set
    Chart { xy: bool },
    /// Single text value
    SingleValue,
    /// 3D scene
    Scene3d,
}

impl SurfaceKind {
    /// Surface kind for a channel kind
    pub fn for_kind(kind: TelemetryKind) -> Self {
        match kind {
            TelemetryKind::Number => SurfaceKind::Chart { xy: false },
            TelemetryKind::Xy => SurfaceKind::Chart { xy: true },
            TelemetryKind::Text => SurfaceKind::SingleValue,
            TelemetryKind::Shape3d => SurfaceKind::Scene3d,
        }
    }

    /// Whether several channels may share a surface of this kind
    pub fn is_shareable(&self) -> bool {
        !matches!(self, SurfaceKind::SingleValue)
    }
}

/// A display surface and the channels attached to it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplaySurface {
    pub id: SurfaceId,
    pub kind: SurfaceKind,
    /// Widget label the surface was created for
    pub label: Option<String>,
    /// Channel names, in attachment order
    pub channels: Vec<String>,
}

/// All surfaces of a session
#[derive(Debug, Clone, Default, Serialize)]
pub struct SurfaceLayout {
    surfaces: Vec<DisplaySurface>,
}

impl SurfaceLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new channel, reusing a compatible labelled surface when one
    /// exists. Unlabelled channels and text channels always get their own.
    pub fn attach(&mut self, channel: &str, kind: TelemetryKind, label: Option<&str>) -> SurfaceId {
        let surface_kind = SurfaceKind::for_kind(kind);

        if surface_kind.is_shareable() {
            if let Some(label) = label {
                let existing = self
                    .surfaces
                    .iter_mut()
                    .find(|s| s.kind == surface_kind && s.label.as_deref() == Some(label));
                if let Some(surface) = existing {
                    surface.channels.push(channel.to_string());
                    tracing::debug!("Attached '{}' to {} ({})", channel, surface.id, label);
                    return surface.id;
                }
            }
        }

        let id = SurfaceId(self.surfaces.len());
        self.surfaces.push(DisplaySurface {
            id,
            kind: surface_kind,
            label: label.map(str::to_string),
            channels: vec![channel.to_string()],
        });
        tracing::debug!("Created {} {:?} for '{}'", id, surface_kind, channel);
        id
    }

    pub fn get(&self, id: SurfaceId) -> Option<&DisplaySurface> {
        self.surfaces.get(id.0)
    }

    pub fn surfaces(&self) -> &[DisplaySurface] {
        &self.surfaces
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labelled_charts_are_shared() {
        let mut layout = SurfaceLayout::new();
        let a = layout.attach("left", TelemetryKind::Number, Some("motors"));
        let b = layout.attach("right", TelemetryKind::Number, Some("motors"));
        assert_eq!(a, b);
        assert_eq!(layout.get(a).unwrap().channels, vec!["left", "right"]);
    }

    #[test]
    fn test_xy_and_time_charts_do_not_mix() {
        let mut layout = SurfaceLayout::new();
        let a = layout.attach("speed", TelemetryKind::Number, Some("robot"));
        let b = layout.attach("path", TelemetryKind::Xy, Some("robot"));
        assert_ne!(a, b);
        assert_eq!(layout.get(b).unwrap().kind, SurfaceKind::Chart { xy: true });
    }

    #[test]
    fn test_unlabelled_channels_get_own_surface() {
        let mut layout = SurfaceLayout::new();
        let a = layout.attach("x", TelemetryKind::Number, None);
        let b = layout.attach("y", TelemetryKind::Number, None);
        assert_ne!(a, b);
        assert_eq!(layout.len(), 2);
    }

    #[test]
    fn test_text_is_never_shared() {
        let mut layout = SurfaceLayout::new();
        let a = layout.attach("state", TelemetryKind::Text, Some("status"));
        let b = layout.attach("mode", TelemetryKind::Text, Some("status"));
        assert_ne!(a, b);
        assert_eq!(layout.get(a).unwrap().kind, SurfaceKind::SingleValue);
    }

    #[test]
    fn test_scenes_shared_by_label() {
        let mut layout = SurfaceLayout::new();
        let a = layout.attach("cube", TelemetryKind::Shape3d, Some("world"));
        let b = layout.attach("ball", TelemetryKind::Shape3d, Some("world"));
        let c = layout.attach("lone", TelemetryKind::Shape3d, None);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
