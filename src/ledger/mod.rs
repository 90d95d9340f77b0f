pub mod models;
pub mod store;

pub use models::{PredictionRow, RecordOutcome, Settlement};
pub use store::PredictionLedger;
