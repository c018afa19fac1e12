//! Wallet domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sugarcane_core::{UserId, WalletId, WalletTransactionId};

/// A per-user monetary balance.
///
/// Created lazily on first access. The balance is always recomputable as
/// the sum of the wallet's transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// Unique wallet ID.
    pub id: WalletId,
    /// Owning user.
    pub user_id: UserId,
    /// Current balance, never negative.
    pub balance: Decimal,
}

/// One entry of a wallet's append-only transaction log.
///
/// Immutable once written. Credits are positive, debits negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    /// Unique transaction ID.
    pub id: WalletTransactionId,
    /// Wallet this entry belongs to.
    pub wallet_id: WalletId,
    /// Signed amount: positive credit, negative debit.
    pub amount: Decimal,
    /// Why the balance changed (e.g. "order return").
    pub reason: String,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}
