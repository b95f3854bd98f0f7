pub mod message;
pub mod model;
pub mod persist;
pub mod registry;
pub mod store;
pub mod tool_cache;

pub use message::{Message, MessagePart, Role, ToolInvocationState, last_user_message};
pub use model::{AnalysisResult, DEFAULT_SESSION_NAME, Session, SessionRecord, UpsertOutcome};
pub use persist::SessionCatalog;
pub use registry::{DeleteOutcome, SessionRegistry};
pub use store::{RunState, SessionStore, StoreEvent};
pub use tool_cache::{ToolData, ToolDataUpdate};
