pub mod collector;
pub mod pool;
pub mod provision;
pub mod removal;
pub mod validation;

pub use collector::BoundedErrorCollector;
pub use provision::ProvisionService;
pub use removal::{RemovalError, RemovalOutcome, RemovalService};
pub use validation::PluginValidationService;
