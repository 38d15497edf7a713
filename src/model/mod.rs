//! Core data model types: scan results, sensor states, and placeholder images.

pub mod image;
pub mod scan;
pub mod sensor;
