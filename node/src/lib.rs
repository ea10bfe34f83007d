//! The chama node: configuration, logging, metrics, the time scheduler and
//! the composition root that wires every engine to a storage backend.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod scheduler;

pub use config::ChamaConfig;
pub use error::NodeError;
pub use lifecycle::BackgroundTasks;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::{check_database, ChamaNode, Collaborators};
pub use scheduler::{TickReport, TimeScheduler};
