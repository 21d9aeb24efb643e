use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::User;

/// Lifetime of a login token.
pub const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Deserialize, Debug, ToSchema)]
pub struct RegisterRequest {
    /// Public handle shown to the other party of an order.
    pub username: String,
    pub nickname: Option<String>,
    pub email: String,
    pub password: String,
    /// Six digits. Can also be set later through `/api/auth/payment-password`.
    #[schema(example = "123456")]
    pub payment_password: Option<String>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Ready to use as the `Authorization` header value.
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct PaymentPasswordRequest {
    /// Login password, required to change the payment password.
    pub password: String,
    pub payment_password: String,
}

/// JWT body; `sub` is the numeric user id.
#[derive(Debug, Deserialize, Serialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: usize,
    pub exp: usize,
}

impl Claims {
    /// Claims for a token issued at `now`, or `None` when the expiry is out of range.
    pub fn issue(user_id: i64, role: &str, now: DateTime<Utc>) -> Option<(Self, DateTime<Utc>)> {
        let expires_at = now.checked_add_signed(Duration::hours(TOKEN_TTL_HOURS))?;
        let claims = Self {
            sub: user_id.to_string(),
            role: role.to_string(),
            iat: usize::try_from(now.timestamp()).ok()?,
            exp: usize::try_from(expires_at.timestamp()).ok()?,
        };
        Some((claims, expires_at))
    }

    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_claims_expire_a_day_later() {
        let now = Utc::now();
        let (claims, expires_at) = Claims::issue(42, "admin", now).unwrap();
        assert_eq!(claims.user_id(), Some(42));
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
        assert_eq!(expires_at - now, Duration::hours(24));
    }
}
