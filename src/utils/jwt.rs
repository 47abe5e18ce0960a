//! JWT Token 管理
//!
//! 订阅端点的管理员认证。Claims 携带邮箱与角色，订阅以邮箱为
//! 注册表键，角色必须是 ADMIN。

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// JWT 密钥（优先读环境变量，开发环境退回内置值）
static JWT_SECRET: Lazy<Vec<u8>> = Lazy::new(|| {
    std::env::var("ORDERNOTIFY_JWT_SECRET")
        .map(String::into_bytes)
        .unwrap_or_else(|_| b"ordernotify_jwt_secret_change_in_production".to_vec())
});

/// Token 有效期 (秒) - 默认 24 小时
const TOKEN_EXPIRATION_SECS: u64 = 86400;

/// 管理员角色标识
pub const ROLE_ADMIN: &str = "ADMIN";

/// JWT Claims (载荷)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// 邮箱（管理员身份，注册表键）
    pub sub: String,

    /// 角色（ADMIN / USER）
    pub role: String,

    /// 签发时间 (Unix timestamp)
    pub iat: u64,

    /// 过期时间 (Unix timestamp)
    pub exp: u64,
}

impl Claims {
    /// 创建新的 Claims
    pub fn new(email: String, role: String) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        Self {
            sub: email,
            role,
            iat: now,
            exp: now + TOKEN_EXPIRATION_SECS,
        }
    }

    /// 检查 token 是否过期
    pub fn is_expired(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        self.exp < now
    }

    /// 是否为管理员
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

/// 生成 JWT token
pub fn generate_token(email: &str, role: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims::new(email.to_string(), role.to_string());

    let header = Header::new(Algorithm::HS256);
    let encoding_key = EncodingKey::from_secret(&JWT_SECRET);

    encode(&header, &claims, &encoding_key)
}

/// 验证 JWT token 并返回 Claims
pub fn verify_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let decoding_key = DecodingKey::from_secret(&JWT_SECRET);
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(token, &decoding_key, &validation)?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_verify_token() {
        let token = generate_token("admin@example.com", ROLE_ADMIN).unwrap();
        assert!(!token.is_empty());

        let claims = verify_token(&token).unwrap();
        assert_eq!(claims.sub, "admin@example.com");
        assert!(claims.is_admin());
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_non_admin_role() {
        let token = generate_token("user@example.com", "USER").unwrap();
        let claims = verify_token(&token).unwrap();

        assert!(!claims.is_admin());
    }

    #[test]
    fn test_invalid_token() {
        let result = verify_token("invalid.token.here");
        assert!(result.is_err());
    }

    #[test]
    fn test_token_expiration_check() {
        let token = generate_token("admin@example.com", ROLE_ADMIN).unwrap();
        let claims = verify_token(&token).unwrap();

        // Token 刚生成，不应该过期
        assert!(!claims.is_expired());

        // 验证过期时间设置正确
        assert!(claims.exp > claims.iat);
        assert_eq!(claims.exp - claims.iat, TOKEN_EXPIRATION_SECS);
    }

    #[test]
    fn test_tampered_token() {
        let token = generate_token("admin@example.com", ROLE_ADMIN).unwrap();

        // 篡改 token (替换最后一个字符)
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push('X');

        let result = verify_token(&tampered);
        assert!(result.is_err());
    }
}
