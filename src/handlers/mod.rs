pub mod admin;
pub mod food_analysis;
pub mod report;

pub use admin::{check_apk, AdminProvisioner, GrantOutcome, ItemSpec};
pub use food_analysis::FoodAnalysisPipeline;
pub use report::format_daily_report;
