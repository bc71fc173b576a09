use crate::entities::{
    AnyStore, DISPLAY_TIMESTAMP_FORMAT, decode_timestamp,
    dao::{CategorySpend, FinancialContext, TransactionRecord},
};
use std::future::Future;

/// How many transactions the prompt context carries.
pub const RECENT_TRANSACTION_LIMIT: i64 = 20;

/// Read-only view over the externally owned `transactions` and `categories`
/// tables.
pub trait FinanceStore: Send + Sync + 'static {
    /// The user's newest transactions plus total spend per category.
    fn build_context(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<FinancialContext, sqlx::Error>> + Send;
}

impl FinanceStore for AnyStore {
    async fn build_context(&self, user_id: i64) -> Result<FinancialContext, sqlx::Error> {
        // Decimal and datetime columns are cast to portable types so the
        // query decodes the same way on MySQL and SQLite.
        let transactions: Vec<(f64, Option<String>, Option<String>, Option<f64>)> =
            sqlx::query_as(
                "SELECT CAST(COALESCE(t.amount, 0) AS DOUBLE), t.merchant_name, \
                        CAST(t.created_at AS CHAR), CAST(t.carbon_emission AS DOUBLE) \
                 FROM transactions t WHERE t.user_id = ? \
                 ORDER BY t.created_at DESC LIMIT ?",
            )
            .bind(user_id)
            .bind(RECENT_TRANSACTION_LIMIT)
            .fetch_all(&self.pool)
            .await?;

        let categories: Vec<(String, f64)> = sqlx::query_as(
            "SELECT c.name, CAST(COALESCE(SUM(t.amount), 0) AS DOUBLE) AS total \
             FROM transactions t JOIN categories c ON t.category_id = c.id \
             WHERE t.user_id = ? GROUP BY c.name ORDER BY c.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(FinancialContext {
            recent_transactions: transactions
                .into_iter()
                .map(|(amount, merchant_name, created_at, carbon_emission)| TransactionRecord {
                    amount,
                    merchant_name,
                    created_at: created_at.map(|raw| normalize_timestamp(&raw)),
                    carbon_emission,
                })
                .collect(),
            category_spending: categories
                .into_iter()
                .map(|(name, total)| CategorySpend { name, total })
                .collect(),
        })
    }
}

/// Render a transaction timestamp as `YYYY-MM-DD HH:MM:SS`; text that does
/// not parse is passed through untouched.
fn normalize_timestamp(raw: &str) -> String {
    decode_timestamp(raw)
        .map(|ts| ts.format(DISPLAY_TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| raw.to_owned())
}
