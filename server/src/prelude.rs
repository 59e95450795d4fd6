pub use crate::app::{App, AppState};
pub use gateway_types::error::{ClResult, Error};
pub use gateway_types::ids::{KeyId, TenantId, Timestamp};
pub use tracing::{debug, debug_span, error, error_span, info, info_span, warn, warn_span};

// vim: ts=4
