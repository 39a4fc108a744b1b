//! Generation requests and the per-request caller context

use std::hash::{DefaultHasher, Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::DomainMetadata;

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "ai")]
    Assistant,
    /// Entries the client keeps in its transcript but never sends to the model, e.g. error notices
    #[serde(other)]
    Other,
}

/// One prior message in the conversation
///
/// Accepts `{"type": "user"|"ai", "content": ...}` as sent by the web client; any other type maps to [`Role::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(alias = "type")]
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Identity of the caller for one request
///
/// Carries whatever credential the caller supplied; nothing about the
/// caller is stored process-wide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Bearer token for the data platform, if the caller sent one
    pub user_token: Option<String>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            user_token: Some(token.into()),
        }
    }

    /// Build from an `Authorization` header value
    pub fn from_authorization(header: Option<&str>) -> Self {
        let token = header
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        debug!(has_token = token.is_some(), "RequestContext::from_authorization: called");
        Self { user_token: token }
    }

    /// Stable per-process identifier for usage accounting
    pub fn user_id(&self) -> String {
        match &self.user_token {
            Some(token) => {
                let mut hasher = DefaultHasher::new();
                token.hash(&mut hasher);
                format!("user_{:016x}", hasher.finish())
            }
            None => "anonymous".to_string(),
        }
    }
}

/// Everything one orchestration run needs; immutable once submitted
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub original_prompt: String,
    pub conversation: Vec<ConversationTurn>,
    pub domain_metadata: DomainMetadata,
    pub context: RequestContext,
}

impl GenerationRequest {
    pub fn new(original_prompt: impl Into<String>, domain_metadata: DomainMetadata) -> Self {
        Self {
            original_prompt: original_prompt.into(),
            conversation: Vec::new(),
            domain_metadata,
            context: RequestContext::anonymous(),
        }
    }

    pub fn with_conversation(mut self, conversation: Vec<ConversationTurn>) -> Self {
        self.conversation = conversation;
        self
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}
