//! Process wiring and the operational HTTP surface.

pub mod app;
