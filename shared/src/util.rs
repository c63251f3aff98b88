//! 时间与 ID 工具

/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 生成订单 ID
///
/// 高 41 位为 2024-01-01 起的毫秒数，低 12 位随机，结果不超过 2^53，
/// 浏览器端 Number 可无损表示。
pub fn new_order_id() -> i64 {
    use rand::Rng;
    const EPOCH_MS: i64 = 1_704_067_200_000;
    let elapsed = (now_millis() - EPOCH_MS) & 0x1FF_FFFF_FFFF;
    let salt: i64 = rand::thread_rng().gen_range(0..0x1000);
    (elapsed << 12) | salt
}

/// 生成推送连接 ID，例如 `kitchen-2f1c...`
pub fn connection_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_fits_js_number() {
        let id = new_order_id();
        assert!(id > 0);
        assert!(id < (1_i64 << 53));
    }

    #[test]
    fn test_connection_id_prefix() {
        let a = connection_id("kitchen");
        let b = connection_id("kitchen");
        assert!(a.starts_with("kitchen-"));
        assert_ne!(a, b);
    }
}
