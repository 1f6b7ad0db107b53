mod executor;
mod summary;

pub use executor::{Classification, DriftCheck, TerraformRunner};
pub use summary::{extract_plan_summary, relevant_lines};
