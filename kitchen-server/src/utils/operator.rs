//! 操作员身份提取
//!
//! 认证由外部会话层完成，这里只读取其注入的 `x-operator` 请求头，
//! 用于份状态的 `updatedBy` 审计字段。

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use http::request::Parts;

use crate::fulfillment::DEFAULT_OPERATOR;

pub const OPERATOR_HEADER: &str = "x-operator";

/// 当前操作员
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator(pub String);

impl Operator {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Operator
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let name = parts
            .headers
            .get(OPERATOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_OPERATOR);
        Ok(Operator(name.to_string()))
    }
}
