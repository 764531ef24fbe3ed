use rust_decimal::Decimal;
use sqlx::{query_as, PgConnection, PgPool};
use uuid::Uuid;
use crate::middleware::error_handling::Result;
use crate::models::part::{CreatePartRequest, Part, UpdatePartRequest};

pub struct PartRepository {
    pool: PgPool,
}

impl PartRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, organization_id: Uuid, request: &CreatePartRequest) -> Result<Part> {
        let part = query_as::<_, Part>(
            r#"
            INSERT INTO parts (organization_id, part_number, description, unit_price,
                               superseded_by, supersedes, supersession_notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(&request.part_number)
        .bind(&request.description)
        .bind(request.unit_price)
        .bind(&request.superseded_by)
        .bind(&request.supersedes)
        .bind(&request.supersession_notes)
        .fetch_one(&self.pool)
        .await?;
        Ok(part)
    }

    pub async fn find_by_id(&self, organization_id: Uuid, id: Uuid) -> Result<Option<Part>> {
        let part =
            query_as::<_, Part>("SELECT * FROM parts WHERE id = $1 AND organization_id = $2")
                .bind(id)
                .bind(organization_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(part)
    }

    pub async fn list(
        &self,
        organization_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Part>> {
        let limit = limit.unwrap_or(50).min(100);
        let offset = offset.unwrap_or(0);

        let parts = query_as::<_, Part>(
            "SELECT * FROM parts WHERE organization_id = $1 ORDER BY part_number LIMIT $2 OFFSET $3",
        )
        .bind(organization_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(parts)
    }

    pub async fn update(
        &self,
        organization_id: Uuid,
        id: Uuid,
        request: &UpdatePartRequest,
    ) -> Result<Option<Part>> {
        let part = query_as::<_, Part>(
            r#"
            UPDATE parts
            SET description = COALESCE($3, description),
                unit_price = COALESCE($4, unit_price),
                superseded_by = COALESCE($5, superseded_by),
                supersedes = COALESCE($6, supersedes),
                supersession_notes = COALESCE($7, supersession_notes),
                updated_at = NOW()
            WHERE id = $1 AND organization_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(organization_id)
        .bind(&request.description)
        .bind(request.unit_price)
        .bind(&request.superseded_by)
        .bind(&request.supersedes)
        .bind(&request.supersession_notes)
        .fetch_optional(&self.pool)
        .await?;
        Ok(part)
    }

    /// Looks up a part by (organization, part number) inside an open
    /// transaction; creates it from the supplied seed values when missing,
    /// refreshing supersession metadata when present. Used by conversion.
    pub async fn resolve_or_create(
        conn: &mut PgConnection,
        organization_id: Uuid,
        part_number: &str,
        description: Option<&str>,
        unit_price: Option<Decimal>,
        superseded_by: Option<&str>,
        supersedes: Option<&str>,
        supersession_notes: Option<&str>,
    ) -> Result<Part> {
        let existing = query_as::<_, Part>(
            "SELECT * FROM parts WHERE organization_id = $1 AND part_number = $2",
        )
        .bind(organization_id)
        .bind(part_number)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(part) = existing {
            if superseded_by.is_some() || supersedes.is_some() || supersession_notes.is_some() {
                let refreshed = query_as::<_, Part>(
                    r#"
                    UPDATE parts
                    SET superseded_by = COALESCE($2, superseded_by),
                        supersedes = COALESCE($3, supersedes),
                        supersession_notes = COALESCE($4, supersession_notes),
                        updated_at = NOW()
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(part.id)
                .bind(superseded_by)
                .bind(supersedes)
                .bind(supersession_notes)
                .fetch_one(&mut *conn)
                .await?;
                return Ok(refreshed);
            }
            return Ok(part);
        }

        let part = query_as::<_, Part>(
            r#"
            INSERT INTO parts (organization_id, part_number, description, unit_price,
                               superseded_by, supersedes, supersession_notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(part_number)
        .bind(description)
        .bind(unit_price)
        .bind(superseded_by)
        .bind(supersedes)
        .bind(supersession_notes)
        .fetch_one(&mut *conn)
        .await?;
        Ok(part)
    }
}
