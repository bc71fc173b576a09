use serde::Serialize;

/// One of the user's recent transactions, as embedded in the system prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub amount: f64,
    pub merchant_name: Option<String>,
    /// Already normalized to `YYYY-MM-DD HH:MM:SS`.
    pub created_at: Option<String>,
    pub carbon_emission: Option<f64>,
}

/// Total spend for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpend {
    pub name: String,
    pub total: f64,
}

/// Snapshot of a user's finances handed to the completion service.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FinancialContext {
    /// Newest first, at most [`crate::entities::finance::RECENT_TRANSACTION_LIMIT`].
    pub recent_transactions: Vec<TransactionRecord>,
    pub category_spending: Vec<CategorySpend>,
}
