pub mod browser;
pub mod document;
pub mod maps;
pub mod orchestrator;
pub mod pool;
pub mod traits;
pub mod types;

pub use browser::{ChromeOptions, ChromeSessionFactory};
pub use document::HtmlDocument;
pub use maps::MapsLayout;
pub use orchestrator::{FailureReason, SearchOrchestrator, TaskOutcome, TaskState};
pub use pool::{SessionPool, SessionSlot};
pub use traits::{DocumentView, PageSnapshot, Session, SessionFactory};
pub use types::SearchParams;
