use sqlx::{query_as, query_scalar, PgPool};
use uuid::Uuid;
use crate::middleware::error_handling::Result;
use crate::models::user::{Organization, User, UserRole};

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates an organization together with its first (admin) user in one
    /// transaction.
    pub async fn create_organization_with_admin(
        &self,
        organization_name: &str,
        email: &str,
        password_hash: &str,
        full_name: &str,
    ) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let organization_id: Uuid = query_scalar(
            "INSERT INTO organizations (name) VALUES ($1) RETURNING id",
        )
        .bind(organization_name)
        .fetch_one(&mut *tx)
        .await?;

        let user = query_as::<_, User>(
            r#"
            INSERT INTO users (organization_id, email, password_hash, full_name, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(email)
        .bind(password_hash)
        .bind(full_name)
        .bind(UserRole::Admin.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_organization(&self, id: Uuid) -> Result<Option<Organization>> {
        let organization =
            query_as::<_, Organization>("SELECT * FROM organizations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(organization)
    }
}
