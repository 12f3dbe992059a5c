mod menu;
mod outcome;

pub use menu::{ContractMenu, MenuAudit};
pub use outcome::SimulationResult;
