//! Wallet ledger: per-user balance plus append-only transaction log.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use sugarcane_core::{UserId, WalletId};

use crate::error::{EngineError, Result};
use crate::models::{Wallet, WalletTransaction};
use crate::store::Store;

/// Owns wallet balances.
///
/// Every credit and debit appends exactly one transaction record in the
/// same store transaction as the balance update, so the balance is always
/// recomputable as the sum of the log.
#[derive(Debug, Clone)]
pub struct WalletLedger<S> {
    store: Arc<S>,
}

impl<S: Store> WalletLedger<S> {
    /// Create a ledger over the given store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Get a user's wallet, creating it with zero balance on first access.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Internal`] on storage failure.
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, user_id: UserId) -> Result<Wallet> {
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(EngineError::internal("wallet.get_or_create"))?;
        match self.get_or_create_tx(&mut tx, user_id).await {
            Ok(wallet) => {
                self.store
                    .commit(tx)
                    .await
                    .map_err(EngineError::internal("wallet.get_or_create"))?;
                Ok(wallet)
            }
            Err(err) => {
                let _ = self.store.rollback(tx).await;
                Err(err)
            }
        }
    }

    /// Credit a wallet.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the wallet does not exist.
    #[instrument(skip(self))]
    pub async fn credit(&self, wallet_id: WalletId, amount: Decimal, reason: &str) -> Result<()> {
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(EngineError::internal("wallet.credit"))?;
        match self.credit_tx(&mut tx, wallet_id, amount, reason).await {
            Ok(()) => {
                self.store
                    .commit(tx)
                    .await
                    .map_err(EngineError::internal("wallet.credit"))?;
                Ok(())
            }
            Err(err) => {
                let _ = self.store.rollback(tx).await;
                Err(err)
            }
        }
    }

    /// Debit a wallet.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InsufficientBalance`] if `amount` exceeds the
    /// balance, [`EngineError::NotFound`] if the wallet does not exist.
    #[instrument(skip(self))]
    pub async fn debit(&self, wallet_id: WalletId, amount: Decimal, reason: &str) -> Result<()> {
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(EngineError::internal("wallet.debit"))?;
        match self.debit_tx(&mut tx, wallet_id, amount, reason).await {
            Ok(()) => {
                self.store
                    .commit(tx)
                    .await
                    .map_err(EngineError::internal("wallet.debit"))?;
                Ok(())
            }
            Err(err) => {
                let _ = self.store.rollback(tx).await;
                Err(err)
            }
        }
    }

    /// A wallet's transaction log in append order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Internal`] on storage failure.
    pub async fn transactions(&self, wallet_id: WalletId) -> Result<Vec<WalletTransaction>> {
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(EngineError::internal("wallet.transactions"))?;
        let result = self
            .store
            .list_wallet_transactions(&mut tx, wallet_id)
            .await
            .map_err(EngineError::internal("wallet.transactions"));
        match result {
            Ok(entries) => {
                self.store
                    .commit(tx)
                    .await
                    .map_err(EngineError::internal("wallet.transactions"))?;
                Ok(entries)
            }
            Err(err) => {
                let _ = self.store.rollback(tx).await;
                Err(err)
            }
        }
    }

    /// [`get_or_create`](Self::get_or_create) inside a caller-supplied
    /// transaction.
    pub async fn get_or_create_tx(&self, tx: &mut S::Tx, user_id: UserId) -> Result<Wallet> {
        if let Some(wallet) = self
            .store
            .find_wallet_by_user(tx, user_id)
            .await
            .map_err(EngineError::internal("wallet.get_or_create"))?
        {
            return Ok(wallet);
        }
        let wallet = self
            .store
            .create_wallet(tx, user_id)
            .await
            .map_err(EngineError::internal("wallet.get_or_create"))?;
        debug!(%user_id, wallet_id = %wallet.id, "created wallet");
        Ok(wallet)
    }

    /// [`credit`](Self::credit) inside a caller-supplied transaction.
    pub async fn credit_tx(
        &self,
        tx: &mut S::Tx,
        wallet_id: WalletId,
        amount: Decimal,
        reason: &str,
    ) -> Result<()> {
        let wallet = self
            .store
            .find_wallet(tx, wallet_id)
            .await
            .map_err(EngineError::internal("wallet.credit"))?
            .ok_or(EngineError::NotFound("wallet"))?;
        self.store
            .update_wallet_balance(tx, wallet_id, wallet.balance + amount)
            .await
            .map_err(EngineError::internal("wallet.credit"))?;
        self.store
            .append_wallet_transaction(tx, wallet_id, amount, reason)
            .await
            .map_err(EngineError::internal("wallet.credit"))?;
        debug!(%wallet_id, %amount, reason, "credited wallet");
        Ok(())
    }

    /// [`debit`](Self::debit) inside a caller-supplied transaction.
    pub async fn debit_tx(
        &self,
        tx: &mut S::Tx,
        wallet_id: WalletId,
        amount: Decimal,
        reason: &str,
    ) -> Result<()> {
        let wallet = self
            .store
            .find_wallet(tx, wallet_id)
            .await
            .map_err(EngineError::internal("wallet.debit"))?
            .ok_or(EngineError::NotFound("wallet"))?;
        if amount > wallet.balance {
            return Err(EngineError::InsufficientBalance);
        }
        self.store
            .update_wallet_balance(tx, wallet_id, wallet.balance - amount)
            .await
            .map_err(EngineError::internal("wallet.debit"))?;
        self.store
            .append_wallet_transaction(tx, wallet_id, -amount, reason)
            .await
            .map_err(EngineError::internal("wallet.debit"))?;
        debug!(%wallet_id, %amount, reason, "debited wallet");
        Ok(())
    }
}
