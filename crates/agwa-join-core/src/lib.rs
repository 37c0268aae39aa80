pub mod catalog;
pub mod config;
pub mod connection;
pub mod error;
pub mod geodatabase;
pub mod host;
pub mod inspect;
pub mod messages;
pub mod project;
pub mod simulations;
pub mod tool;
pub mod transition;

pub use config::AppConfig;
pub use error::Error;
pub use host::{HostSession, MapSession, TableStore};
pub use inspect::{JoinRecord, JoinState, LayerJoinState};
pub use messages::{Messenger, SilentMessenger};
pub use tool::{JoinResultsTool, ToolParameters};
pub use transition::{TransitionOutcome, TransitionPlan};
