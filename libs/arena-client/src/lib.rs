pub mod assistant;
pub mod code_store;
pub mod error;
pub mod evaluator;
pub mod generation;
pub mod quota;
pub mod runner;
pub mod services;
pub mod submission;
pub mod telemetry;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use code_store::{CodeStore, MemoryCodeStore, RedisCodeStore};
pub use error::{LimitExceeded, ServiceError, StoreError};
pub use services::{HttpServices, Services};
pub use workspace::{ProblemWorkspace, RunReport, WorkspaceError};
