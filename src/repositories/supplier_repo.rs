use sqlx::{query, query_as, PgPool};
use uuid::Uuid;
use crate::middleware::error_handling::Result;
use crate::models::supplier::{CreateSupplierRequest, Supplier, UpdateSupplierRequest};

pub struct SupplierRepository {
    pool: PgPool,
}

impl SupplierRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        organization_id: Uuid,
        request: &CreateSupplierRequest,
    ) -> Result<Supplier> {
        let supplier = query_as::<_, Supplier>(
            r#"
            INSERT INTO suppliers (organization_id, name, email, phone, contact_person, address)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.contact_person)
        .bind(&request.address)
        .fetch_one(&self.pool)
        .await?;
        Ok(supplier)
    }

    pub async fn find_by_id(&self, organization_id: Uuid, id: Uuid) -> Result<Option<Supplier>> {
        let supplier = query_as::<_, Supplier>(
            "SELECT * FROM suppliers WHERE id = $1 AND organization_id = $2",
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(supplier)
    }

    pub async fn find_many_by_ids(
        &self,
        organization_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Supplier>> {
        let suppliers = query_as::<_, Supplier>(
            "SELECT * FROM suppliers WHERE organization_id = $1 AND id = ANY($2)",
        )
        .bind(organization_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(suppliers)
    }

    pub async fn list(
        &self,
        organization_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Supplier>> {
        let limit = limit.unwrap_or(50).min(100);
        let offset = offset.unwrap_or(0);

        let suppliers = query_as::<_, Supplier>(
            "SELECT * FROM suppliers WHERE organization_id = $1 ORDER BY name LIMIT $2 OFFSET $3",
        )
        .bind(organization_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(suppliers)
    }

    pub async fn update(
        &self,
        organization_id: Uuid,
        id: Uuid,
        request: &UpdateSupplierRequest,
    ) -> Result<Option<Supplier>> {
        let supplier = query_as::<_, Supplier>(
            r#"
            UPDATE suppliers
            SET name = COALESCE($3, name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                contact_person = COALESCE($6, contact_person),
                address = COALESCE($7, address),
                updated_at = NOW()
            WHERE id = $1 AND organization_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(organization_id)
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.contact_person)
        .bind(&request.address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(supplier)
    }

    /// Appends one address to the supplier's auxiliary-email set.
    pub async fn append_aux_email(&self, supplier_id: Uuid, address: &str) -> Result<()> {
        query(
            r#"
            UPDATE suppliers
            SET aux_emails = aux_emails || to_jsonb($2::text),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(supplier_id)
        .bind(address)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
