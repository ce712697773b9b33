//! Transactions

use super::Database;
use crate::protocol::constants::op;
use crate::{Error, Result};

/// A transaction started on a [`Database`]
///
/// Committing or rolling back consumes the value; the retaining variants
/// keep it usable.
#[derive(Debug, PartialEq, Eq)]
pub struct Transaction {
    handle: i32,
    active: bool,
}

impl Transaction {
    pub(crate) fn new(handle: i32) -> Self {
        Self {
            handle,
            active: true,
        }
    }

    /// Server side handle
    pub fn handle(&self) -> i32 {
        self.handle
    }

    /// Whether the transaction can still run statements
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn require_active(&self) -> Result<()> {
        if !self.active {
            return Err(Error::InvalidState {
                expected: "active transaction".into(),
                actual: format!("transaction {} ended by a failed request", self.handle),
            });
        }
        Ok(())
    }
}

impl Database {
    /// Commit and end the transaction
    pub async fn commit(&mut self, transaction: Transaction) -> Result<()> {
        self.end_transaction(op::COMMIT, transaction).await
    }

    /// Roll back and end the transaction
    pub async fn rollback(&mut self, transaction: Transaction) -> Result<()> {
        self.end_transaction(op::ROLLBACK, transaction).await
    }

    /// Commit, keeping the transaction context open
    pub async fn commit_retaining(&mut self, transaction: &mut Transaction) -> Result<()> {
        self.retain_transaction(op::COMMIT_RETAINING, transaction).await
    }

    /// Roll back, keeping the transaction context open
    pub async fn rollback_retaining(&mut self, transaction: &mut Transaction) -> Result<()> {
        self.retain_transaction(op::ROLLBACK_RETAINING, transaction).await
    }

    /// Request transaction information items
    pub async fn transaction_info(
        &mut self,
        transaction: &Transaction,
        items: &[u8],
        max_len: i32,
    ) -> Result<Vec<u8>> {
        self.require_attached()?;
        self.info_request(op::INFO_TRANSACTION, transaction.handle, items, max_len)
            .await
    }

    async fn end_transaction(&mut self, operation: i32, mut transaction: Transaction) -> Result<()> {
        self.retain_transaction(operation, &mut transaction).await?;
        tracing::debug!(transaction = transaction.handle, operation, "transaction ended");
        Ok(())
    }

    async fn retain_transaction(&mut self, operation: i32, transaction: &mut Transaction) -> Result<()> {
        self.require_attached()?;
        transaction.require_active()?;
        match self.conn.release_object(operation, transaction.handle).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if e.is_fatal() {
                    transaction.active = false;
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_transaction_rejected() {
        let mut transaction = Transaction::new(3);
        assert!(transaction.require_active().is_ok());
        transaction.active = false;
        assert!(matches!(
            transaction.require_active(),
            Err(Error::InvalidState { .. })
        ));
    }
}
