pub mod chat;
pub mod finance;
pub mod message;

pub use chat::{Chat, ChatSummary};
pub use finance::{CategorySpend, FinancialContext, TransactionRecord};
pub use message::ChatMessage;
