pub mod bias;
pub mod difficulty;
pub mod heatmap;
pub mod planner;
pub mod selector;
pub mod symbols;
pub mod trend;
pub mod weakness;

pub use difficulty::{DifficultyEngine, DifficultyProfile, DifficultyReason};
pub use planner::{MixCategory, SessionPlan};
pub use selector::SmartSelector;
pub use weakness::{WeaknessReport, WeaknessTracker};
