//! MCP Tool Execution Context
//!
//! Built once per connection and handed by reference to every tool and
//! resource invocation on that connection.

use std::sync::Arc;
use std::time::Instant;

use crate::kanban::{BoardStore, TextGenerator, UserIdentity};

/// Context provided to tool and resource handlers during execution
#[derive(Clone)]
pub struct ToolContext {
    /// Resolved identity, `None` for anonymous connections
    pub identity: Option<UserIdentity>,

    /// Unique id of the owning connection
    pub connection_id: String,

    /// Access to board data
    pub boards: Arc<dyn BoardStore>,

    /// Text generation for the AI tools
    pub generator: Arc<dyn TextGenerator>,

    /// Server version info
    pub server_version: String,

    /// Server start time (for uptime calculation)
    pub start_time: Instant,
}

impl ToolContext {
    pub fn user(&self) -> Option<&UserIdentity> {
        self.identity.as_ref()
    }

    /// Key used for rate limiting: the user id, or the connection id when anonymous.
    pub fn rate_limit_key(&self) -> String {
        match &self.identity {
            Some(user) => format!("user:{}", user.id),
            None => format!("conn:{}", self.connection_id),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_context() -> ToolContext {
    use crate::kanban::{InMemoryBoardStore, UnconfiguredGenerator};

    ToolContext {
        identity: None,
        connection_id: "test-connection".to_string(),
        boards: Arc::new(InMemoryBoardStore::new()),
        generator: Arc::new(UnconfiguredGenerator),
        server_version: "test".to_string(),
        start_time: Instant::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_key() {
        let mut ctx = test_context();
        assert_eq!(ctx.rate_limit_key(), "conn:test-connection");

        ctx.identity = Some(UserIdentity::new("alice"));
        assert_eq!(ctx.rate_limit_key(), "user:alice");
    }
}
