//! Read-only directory lookups backing ownership and policy checks.

use sqlx::PgPool;
use uuid::Uuid;

use crate::directory::model::{Bank, Customer, DocumentType, LoanCategory};
use crate::error::{WorkflowError, WorkflowResult};

#[derive(Clone)]
pub struct DirectoryService {
    db_pool: PgPool,
}

impl DirectoryService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Fetch a customer and enforce that the acting connector owns it.
    pub async fn customer_owned_by(
        &self,
        customer_id: Uuid,
        connector_id: Uuid,
    ) -> WorkflowResult<Customer> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
            .bind(customer_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| WorkflowError::NotFound("customer not found".to_string()))?;

        if customer.connector_id != connector_id {
            return Err(WorkflowError::AccessDenied(
                "customer belongs to another connector".to_string(),
            ));
        }

        Ok(customer)
    }

    /// Fetch an active loan category.
    pub async fn loan_category(&self, category_id: Uuid) -> WorkflowResult<LoanCategory> {
        let category =
            sqlx::query_as::<_, LoanCategory>("SELECT * FROM loan_categories WHERE id = $1")
                .bind(category_id)
                .fetch_optional(&self.db_pool)
                .await?
                .ok_or_else(|| WorkflowError::NotFound("loan category not found".to_string()))?;

        if !category.active {
            return Err(WorkflowError::Validation(format!(
                "loan category '{}' is no longer offered",
                category.name
            )));
        }

        Ok(category)
    }

    /// Fetch a document type by id.
    pub async fn document_type(&self, document_type_id: Uuid) -> WorkflowResult<DocumentType> {
        let doc_type =
            sqlx::query_as::<_, DocumentType>("SELECT * FROM document_types WHERE id = $1")
                .bind(document_type_id)
                .fetch_optional(&self.db_pool)
                .await?
                .ok_or_else(|| WorkflowError::NotFound("document type not found".to_string()))?;

        Ok(doc_type)
    }

    /// Resolve the bank the acting banker represents.
    pub async fn bank_for_member(&self, user_id: Uuid) -> WorkflowResult<Uuid> {
        let row = sqlx::query_as::<_, (Uuid,)>(
            "SELECT bank_id FROM bank_members WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| {
            WorkflowError::AccessDenied("caller is not a member of any bank".to_string())
        })?;

        Ok(row.0)
    }

    /// Banks available for distribution, alphabetically.
    pub async fn list_banks(&self) -> WorkflowResult<Vec<Bank>> {
        let banks = sqlx::query_as::<_, Bank>("SELECT * FROM banks ORDER BY name")
            .fetch_all(&self.db_pool)
            .await?;

        Ok(banks)
    }

    /// Of the requested bank ids, return the ones that do not exist.
    pub async fn missing_banks(&self, bank_ids: &[Uuid]) -> WorkflowResult<Vec<Uuid>> {
        let known = sqlx::query_as::<_, (Uuid,)>("SELECT id FROM banks WHERE id = ANY($1)")
            .bind(bank_ids)
            .fetch_all(&self.db_pool)
            .await?;

        let known: Vec<Uuid> = known.into_iter().map(|(id,)| id).collect();
        Ok(bank_ids
            .iter()
            .copied()
            .filter(|id| !known.contains(id))
            .collect())
    }
}
