//! Client configuration

use shared::fulfillment::TransitionPolicy;

/// 默认操作员 (与服务端一致)
pub const DEFAULT_OPERATOR: &str = "kitchen-user";

/// Client configuration for connecting to the kitchen server
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL (e.g., "http://localhost:3000")
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout: u64,

    /// 写入 `x-operator` 头的操作员标识
    pub operator: String,

    /// 乐观更新时使用的重开策略，应与服务端 `UNIT_REOPEN_POLICY` 一致
    pub reopen_policy: TransitionPolicy,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: 30,
            operator: DEFAULT_OPERATOR.to_string(),
            reopen_policy: TransitionPolicy::default(),
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = operator.into();
        self
    }

    pub fn with_reopen_policy(mut self, policy: TransitionPolicy) -> Self {
        self.reopen_policy = policy;
        self
    }

    /// Create an HTTP client from this configuration
    pub fn build_http_client(&self) -> crate::ClientResult<crate::HttpKitchenClient> {
        crate::HttpKitchenClient::new(self)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("http://kitchen:3000")
            .with_timeout(5)
            .with_operator("chef-li")
            .with_reopen_policy(TransitionPolicy::Strict);
        assert_eq!(config.base_url, "http://kitchen:3000");
        assert_eq!(config.timeout, 5);
        assert_eq!(config.operator, "chef-li");
        assert_eq!(config.reopen_policy, TransitionPolicy::Strict);
    }

    #[test]
    fn test_default() {
        let config = ClientConfig::default();
        assert_eq!(config.operator, DEFAULT_OPERATOR);
        assert_eq!(config.reopen_policy, TransitionPolicy::AllowReopen);
    }
}
