//! Feature readiness tracking.
//!
//! Each [`Feature`] starts unset. Startup marks every statically known
//! feature as ready; only [`Feature::Loader`] waits for the asynchronous model
//! load to settle. Every change is forwarded to a [`ChecklistView`] so the UI
//! always shows the latest value.

use std::fmt;

use crate::ui::ChecklistView;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Feature {
    Scene,
    Camera,
    Renderer,
    Geometry,
    Material,
    Mesh,
    Lights,
    Shadows,
    Loader,
    Controls,
    Animation,
    Responsive,
}

impl Feature {
    /// Checklist order.
    pub const ALL: [Feature; 12] = [
        Feature::Scene,
        Feature::Camera,
        Feature::Renderer,
        Feature::Geometry,
        Feature::Material,
        Feature::Mesh,
        Feature::Lights,
        Feature::Shadows,
        Feature::Loader,
        Feature::Controls,
        Feature::Animation,
        Feature::Responsive,
    ];

    /// Stable id, also used for the `check-<id>` checkbox of the web page.
    pub fn id(self) -> &'static str {
        match self {
            Feature::Scene => "scene",
            Feature::Camera => "camera",
            Feature::Renderer => "renderer",
            Feature::Geometry => "geometry",
            Feature::Material => "material",
            Feature::Mesh => "mesh",
            Feature::Lights => "lights",
            Feature::Shadows => "shadows",
            Feature::Loader => "loader",
            Feature::Controls => "controls",
            Feature::Animation => "animation",
            Feature::Responsive => "responsive",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Feature::Scene => "Scene",
            Feature::Camera => "Perspective camera",
            Feature::Renderer => "Renderer",
            Feature::Geometry => "Geometry",
            Feature::Material => "Materials",
            Feature::Mesh => "Meshes",
            Feature::Lights => "Ambient and directional lights",
            Feature::Shadows => "Shadow mapping",
            Feature::Loader => "glTF model loader",
            Feature::Controls => "Orbit controls",
            Feature::Animation => "Animation loop",
            Feature::Responsive => "Responsive resize",
        }
    }

    pub fn from_id(id: &str) -> Option<Feature> {
        Feature::ALL.into_iter().find(|f| f.id() == id)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

pub struct ReadinessTracker {
    entries: [Option<bool>; Feature::ALL.len()],
    errors: Vec<String>,
    view: Box<dyn ChecklistView>,
}

impl ReadinessTracker {
    pub fn new(view: Box<dyn ChecklistView>) -> Self {
        Self {
            entries: [None; Feature::ALL.len()],
            errors: Vec::new(),
            view,
        }
    }

    fn slot(feature: Feature) -> usize {
        feature as usize
    }

    /// Record `ready` for `feature`. Writing the current value again is a no-op.
    pub fn set(&mut self, feature: Feature, ready: bool) {
        let slot = &mut self.entries[Self::slot(feature)];
        if *slot == Some(ready) {
            return;
        }
        *slot = Some(ready);
        log::debug!("readiness {} = {}", feature, ready);
        self.view.on_entry(feature, Some(ready));
    }

    pub fn get(&self, feature: Feature) -> Option<bool> {
        self.entries[Self::slot(feature)]
    }

    /// Mark every feature except the loader as ready.
    pub fn mark_startup(&mut self) {
        for feature in Feature::ALL {
            if feature != Feature::Loader {
                self.set(feature, true);
            }
        }
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.view.on_error(&message);
        self.errors.push(message);
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// All features with their current value, in checklist order.
    pub fn entries(&self) -> impl Iterator<Item = (Feature, Option<bool>)> + '_ {
        Feature::ALL
            .into_iter()
            .map(|feature| (feature, self.get(feature)))
    }

    /// Forward the spin button label to the view.
    pub fn show_spin_label(&mut self, label: &str) {
        self.view.on_spin_label(label);
    }
}

impl fmt::Debug for ReadinessTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessTracker")
            .field("entries", &self.entries)
            .field("errors", &self.errors)
            .finish()
    }
}
