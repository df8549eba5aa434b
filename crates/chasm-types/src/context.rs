/// Per-consumer annotations propagated to backend calls.
///
/// Value-typed and cheap to clone. Backends that can attach request
/// annotations (e.g. a custom user agent on remote calls) read it; backends
/// without such a channel ignore it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Correlation id carried through to backend requests.
    pub correlation_id: Option<String>,
    /// Custom user-agent string for backends that send one.
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn new(correlation_id: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            correlation_id,
            user_agent,
        }
    }

    /// Context with only a correlation id.
    pub fn with_correlation_id(id: impl Into<String>) -> Self {
        Self {
            correlation_id: Some(id.into()),
            user_agent: None,
        }
    }
}
