//! Postgres + pgvector batch store.

use pgvector::Vector;
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls};
use tracing::error;

use super::{BulkPersister, StoreError};
use crate::document::TestCaseDocument;
use crate::vector_store::{quote_ident, TableName};

/// Stores documents in one transaction; any failed row rolls back the batch.
pub struct PgTestCaseStore {
    client: Mutex<Client>,
    table: TableName,
    insert_sql: String,
}

impl PgTestCaseStore {
    /// Connects to Postgres and optionally creates the extension, table and indexes.
    pub async fn connect(
        database_url: &str,
        table: TableName,
        prepare: bool,
    ) -> Result<Self, StoreError> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                error!(error = %err, "postgres connection error");
            }
        });
        let store = Self::from_client(client, table);
        if prepare {
            store.prepare().await?;
        }
        Ok(store)
    }

    /// Wraps an already-connected client.
    pub fn from_client(client: Client, table: TableName) -> Self {
        let insert_sql = insert_sql(&table);
        Self {
            client: Mutex::new(client),
            table,
            insert_sql,
        }
    }

    /// Target table.
    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Ensures the pgvector extension, the table and its indexes exist.
    pub async fn prepare(&self) -> Result<(), StoreError> {
        let client = self.client.lock().await;
        client
            .execute("CREATE EXTENSION IF NOT EXISTS vector", &[])
            .await?;
        client.execute(&create_table_sql(&self.table), &[]).await?;
        for sql in index_sql(&self.table) {
            client.execute(&sql, &[]).await?;
        }
        Ok(())
    }
}

impl BulkPersister for PgTestCaseStore {
    async fn insert_many(&self, documents: &[TestCaseDocument]) -> Result<usize, StoreError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;
        let statement = transaction.prepare(&self.insert_sql).await?;
        let mut inserted = 0usize;
        for doc in documents {
            let desc_embedding = optional_vector(&doc.desc_embedding);
            let steps_embedding = optional_vector(&doc.steps_embedding);
            let summary_embedding = optional_vector(&doc.summary_embedding);
            let main_vector = optional_vector(&doc.main_vector);
            let rows = transaction
                .execute(
                    &statement,
                    &[
                        &doc.id,
                        &doc.test_case_id,
                        &doc.feature,
                        &doc.description,
                        &doc.prerequisites,
                        &doc.steps,
                        &doc.summary,
                        &doc.keywords,
                        &doc.tags,
                        &doc.priority,
                        &doc.platform,
                        &desc_embedding,
                        &steps_embedding,
                        &summary_embedding,
                        &main_vector,
                        &doc.created_at,
                        &doc.popularity,
                    ],
                )
                .await?;
            inserted += rows as usize;
        }
        transaction.commit().await?;
        Ok(inserted)
    }
}

// pgvector rejects zero-dimension vectors, so degraded embeddings are stored as NULL.
fn optional_vector(values: &[f32]) -> Option<Vector> {
    if values.is_empty() {
        None
    } else {
        Some(Vector::from(values.to_vec()))
    }
}

fn create_table_sql(table: &TableName) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id UUID PRIMARY KEY,
            test_case_id TEXT NOT NULL,
            feature TEXT NOT NULL,
            description TEXT NOT NULL,
            prerequisites TEXT NOT NULL,
            steps TEXT NOT NULL,
            summary TEXT NOT NULL,
            keywords TEXT[] NOT NULL,
            tags TEXT[] NOT NULL,
            priority TEXT,
            platform TEXT,
            desc_embedding VECTOR,
            steps_embedding VECTOR,
            summary_embedding VECTOR,
            main_vector VECTOR,
            created_at TIMESTAMPTZ NOT NULL,
            popularity DOUBLE PRECISION NOT NULL DEFAULT 0,
            search_tsv TSVECTOR GENERATED ALWAYS AS (
                to_tsvector('english', test_case_id || ' ' || feature || ' ' || description || ' ' || steps || ' ' || summary)
            ) STORED
        )",
        table.qualified()
    )
}

fn index_sql(table: &TableName) -> Vec<String> {
    let qualified = table.qualified();
    vec![
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} (test_case_id)",
            quote_ident(&table.index_name("test_case_id_idx")),
            qualified
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} USING GIN (search_tsv)",
            quote_ident(&table.index_name("search_tsv_idx")),
            qualified
        ),
    ]
}

fn insert_sql(table: &TableName) -> String {
    format!(
        "INSERT INTO {} \
            (id, test_case_id, feature, description, prerequisites, steps, summary, keywords, tags, \
             priority, platform, desc_embedding, steps_embedding, summary_embedding, main_vector, \
             created_at, popularity) \
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        table.qualified()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn insert_binds_every_column() {
        let table = TableName::new("public", "test_cases").expect("table");
        let sql = insert_sql(&table);
        assert!(sql.starts_with("INSERT INTO \"public\".\"test_cases\""));
        assert!(sql.contains("$17"));
        assert!(!sql.contains("$18"));
        assert!(!sql.contains("ON CONFLICT"));
    }

    #[test]
    fn empty_embeddings_bind_as_null() {
        assert!(optional_vector(&[]).is_none());
        assert_eq!(
            optional_vector(&[0.5, 1.0]).map(|v| v.to_vec()),
            Some(vec![0.5, 1.0])
        );
    }
}
