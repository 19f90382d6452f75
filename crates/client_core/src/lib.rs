//! Client side of the rephrasing workspace: a typed gateway to the remote
//! service, a mirror of the remote history, and the session controller that
//! ties them together for a front end.

pub mod config;
pub mod error;
pub mod gateway;
pub mod history_cache;
pub mod session;

pub use config::{load_client_settings, ClientSettings};
pub use error::{ErrorKind, GatewayError, Operation, SessionError};
pub use gateway::{HttpGateway, RephraseGateway};
pub use history_cache::HistoryCache;
pub use session::{
    NoticeLevel, SessionConfig, SessionController, SessionEvent, SessionPhase, SessionState,
};
pub use shared::metrics::{measure, TextStats};
