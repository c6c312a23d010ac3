pub mod models;
pub mod table;

pub use models::{ModelKind, ModelPricing, ModelTier};
pub use table::PricingTable;
