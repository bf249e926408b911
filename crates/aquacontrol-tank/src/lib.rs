//! AquaControl — Tank monitoring bounded context.
//!
//! Responsible for tank lifecycle (creation, renaming, capacity changes,
//! decommissioning), sensor readings, and the `tank_summary` and
//! `tank_water_quality` read models derived from them.

pub mod application;
pub mod domain;
