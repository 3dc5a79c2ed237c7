//! Presentation: stateless display mappings and dashboard rendering.

pub mod mapper;
pub mod render;

pub use mapper::{classify_risk, classify_tier, RiskLevel, TierCategory};
pub use render::{generate_dashboard, generate_json_dashboard, generate_result_section};
