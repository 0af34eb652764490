// File: soulseer-common/src/models/mod.rs
pub mod money;
pub mod user;
pub mod reader;
pub mod session;
pub mod message;
pub mod transaction;
pub mod payment;

pub use user::{User, UserRole};
pub use reader::{Reader, ReaderRates};
pub use session::{EndReason, Session, SessionCharges, SessionStatus, SessionType, Settlement};
pub use message::{Conversation, Message};
pub use transaction::{Transaction, TransactionKind};
pub use payment::{DepositCheckout, DepositStatus, PayoutAccountStatus, PayoutReservation};
