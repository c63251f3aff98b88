//! 工具模块 - 日志与请求上下文

pub mod logger;
pub mod operator;

pub use operator::{OPERATOR_HEADER, Operator};

// Re-export unified error types from shared
pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
