//! Entity states published to the host platform.

use std::collections::BTreeMap;

use serde::Serialize;

/// Entity id of the letter count sensor.
pub const LETTERS_ENTITY: &str = "sensor.usps_letters";
/// Entity id of the package count sensor.
pub const PACKAGES_ENTITY: &str = "sensor.usps_packages";

/// A single entity state with its attribute map.
///
/// Serializes to the body Home Assistant's `POST /api/states/<entity_id>` expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorState {
    #[serde(skip)]
    pub entity_id: String,
    pub state: String,
    pub attributes: BTreeMap<String, String>,
}

impl SensorState {
    pub fn new(entity_id: impl Into<String>, state: impl ToString) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    /// Add or replace an attribute.
    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// `sensor.usps_letters`.
    pub fn letters(count: u32) -> Self {
        Self::new(LETTERS_ENTITY, count)
            .with_attribute("icon", "mdi:email-outline")
            .with_attribute("friendly_name", "USPS Mail")
    }

    /// `sensor.usps_packages`.
    pub fn packages(count: u32) -> Self {
        Self::new(PACKAGES_ENTITY, count)
            .with_attribute("icon", "mdi:package-variant")
            .with_attribute("friendly_name", "USPS Packages")
    }

    /// Camera entity state, keyed by the slug of its display name.
    pub fn camera(name: &str, attributes: BTreeMap<String, String>) -> Self {
        let mut state =
            Self::new(camera_entity_id(name), "idle").with_attribute("friendly_name", name);
        state.attributes.extend(attributes);
        state
    }

    /// Numeric value of the state, if it is one.
    pub fn as_count(&self) -> Option<u32> {
        self.state.parse().ok()
    }
}

/// `"USPS Mail Pictures"` → `"camera.usps_mail_pictures"`.
pub fn camera_entity_id(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            slug.push(ch.to_ascii_lowercase());
            pending_sep = false;
        } else {
            pending_sep = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("usps_mail");
    }
    format!("camera.{slug}")
}
