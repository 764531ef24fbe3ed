// Role middleware. Must be layered AFTER auth_middleware so Claims are
// present in request extensions.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use crate::middleware::auth::Claims;

/// Requires the manager role (or admin). Guards the RFQ workflow endpoints:
/// send, approve, convert, merge.
pub async fn manager_middleware(
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let claims = request
        .extensions()
        .get::<Claims>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !claims.is_manager() {
        tracing::warn!(
            "Manager access denied for user {} with role {:?}",
            claims.user_id,
            claims.role
        );
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}

/// Requires the admin role. Guards org administration endpoints.
pub async fn admin_middleware(
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let claims = request
        .extensions()
        .get::<Claims>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !claims.is_admin() {
        tracing::warn!(
            "Admin access denied for user {} with role {:?}",
            claims.user_id,
            claims.role
        );
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use crate::middleware::auth::Claims;
    use crate::models::user::UserRole;
    use uuid::Uuid;

    fn create_test_claims(role: UserRole) -> Claims {
        Claims {
            sub: "test".to_string(),
            user_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            role,
            exp: 0,
            iat: 0,
        }
    }

    #[test]
    fn technician_is_not_manager() {
        assert!(!create_test_claims(UserRole::Technician).is_manager());
        assert!(create_test_claims(UserRole::Manager).is_manager());
        assert!(create_test_claims(UserRole::Admin).is_manager());
    }

    #[test]
    fn only_admin_is_admin() {
        assert!(!create_test_claims(UserRole::Technician).is_admin());
        assert!(!create_test_claims(UserRole::Manager).is_admin());
        assert!(create_test_claims(UserRole::Admin).is_admin());
    }
}
