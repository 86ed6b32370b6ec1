use rusqlite::{params, Connection, OptionalExtension};

use crate::constants::{page_limit, MAX_BALANCE};
use crate::db::{new_id, now, with_conn, with_tx, DbState};
use crate::error::{AppError, AppResult};
use crate::events::{self, BalanceChangedEvent, BALANCE_CHANGED};
use crate::settings::payment_settings;
use crate::validation::ensure_valid;
use crate::wallet::models::*;

pub struct WalletService;

impl WalletService {
    /// Apply `amount` to the user's balance and append the ledger row.
    ///
    /// This is the only place balances change. It must run inside the caller's
    /// transaction so the balance and the ledger can't drift apart.
    pub(crate) fn record(
        conn: &Connection,
        user_id: &str,
        kind: TransactionKind,
        amount: i64,
        reference: Option<&str>,
        description: &str,
    ) -> AppResult<Transaction> {
        let balance: i64 = conn
            .query_row("SELECT balance FROM users WHERE id = ?1", params![user_id], |row| row.get(0))
            .optional()?
            .ok_or_else(|| AppError::not_found("User"))?;

        let balance_after = balance
            .checked_add(amount)
            .filter(|after| *after <= MAX_BALANCE)
            .ok_or_else(|| AppError::invalid("amount", "This would exceed the maximum wallet balance"))?;
        if balance_after < 0 {
            return Err(AppError::InsufficientFunds {
                available: balance,
                required: amount.saturating_neg(),
            });
        }

        let created_at = now();
        conn.execute(
            "UPDATE users SET balance = ?1, updated_at = ?2 WHERE id = ?3",
            params![balance_after, created_at, user_id],
        )?;

        let transaction = Transaction {
            id: new_id(),
            user_id: user_id.to_string(),
            kind,
            amount,
            balance_after,
            reference: reference.map(str::to_string),
            description: description.to_string(),
            created_at,
        };
        conn.execute(
            "INSERT INTO transactions (id, user_id, kind, amount, balance_after, reference, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                transaction.id,
                transaction.user_id,
                transaction.kind.as_str(),
                transaction.amount,
                transaction.balance_after,
                transaction.reference,
                transaction.description,
                transaction.created_at,
            ],
        )?;

        log::debug!(
            "[wallet] {} {} for {} (balance {})",
            kind.as_str(),
            amount,
            user_id,
            balance_after
        );
        Ok(transaction)
    }

    /// Tell the frontend about balances changed by committed ledger rows.
    pub(crate) fn publish_balances(transactions: &[Transaction]) {
        for transaction in transactions {
            events::publish(
                BALANCE_CHANGED,
                BalanceChangedEvent {
                    user_id: transaction.user_id.clone(),
                    balance: transaction.balance_after,
                },
            );
        }
    }

    /// Credit a payment confirmed by the gateway.
    pub fn deposit(db: &DbState, request: DepositRequest) -> AppResult<Transaction> {
        ensure_valid(&request)?;

        let transaction = with_tx(db, |tx| {
            let settings = payment_settings(tx)?;
            if !settings.deposits_enabled {
                return Err(AppError::Forbidden("Deposits are currently disabled".to_string()));
            }
            if request.amount < settings.min_deposit {
                return Err(AppError::invalid(
                    "amount",
                    format!("Minimum deposit is {}", settings.min_deposit),
                ));
            }

            let already: Option<String> = tx
                .query_row(
                    "SELECT id FROM transactions WHERE kind = 'deposit' AND reference = ?1",
                    params![request.reference],
                    |row| row.get(0),
                )
                .optional()?;
            if already.is_some() {
                return Err(AppError::Conflict("This payment was already credited".to_string()));
            }

            Self::record(
                tx,
                &request.user_id,
                TransactionKind::Deposit,
                request.amount,
                Some(&request.reference),
                "Wallet deposit",
            )
        })?;

        log::info!("[wallet] Deposit {} credited to {}", request.amount, request.user_id);
        Self::publish_balances(std::slice::from_ref(&transaction));
        Ok(transaction)
    }

    pub fn list_transactions(
        db: &DbState,
        user_id: &str,
        offset: u32,
        limit: Option<u32>,
    ) -> AppResult<Vec<Transaction>> {
        with_conn(db, |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, kind, amount, balance_after, reference, description, created_at
                 FROM transactions WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(params![user_id, page_limit(limit), offset], transaction_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Every user's ledger, newest first, optionally narrowed to one kind.
    pub fn list_all_transactions(
        db: &DbState,
        kind: Option<TransactionKind>,
        offset: u32,
        limit: Option<u32>,
    ) -> AppResult<Vec<Transaction>> {
        with_conn(db, |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, kind, amount, balance_after, reference, description, created_at
                 FROM transactions WHERE (?1 IS NULL OR kind = ?1)
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(
                    params![kind.map(|k| k.as_str()), page_limit(limit), offset],
                    transaction_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

fn transaction_from_row(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: TransactionKind::from_str(&row.get::<_, String>(2)?),
        amount: row.get(3)?,
        balance_after: row.get(4)?,
        reference: row.get(5)?,
        description: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::core::test_state;
    use crate::settings::{save_payment_settings, PaymentGatewaySettings};
    use crate::test_support::{balance_of, insert_user};

    #[test]
    fn test_record_updates_balance_and_ledger() {
        let db = test_state();
        insert_user(&db, "u1", 500);

        let tx = with_tx(&db, |tx| {
            WalletService::record(tx, "u1", TransactionKind::Prize, 1500, Some("t1"), "Prize")
        })
        .unwrap();

        assert_eq!(tx.balance_after, 2000);
        assert_eq!(balance_of(&db, "u1"), 2000);
        let ledger = WalletService::list_transactions(&db, "u1", 0, None).unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, TransactionKind::Prize);
        assert_eq!(ledger[0].reference.as_deref(), Some("t1"));
    }

    #[test]
    fn test_record_refuses_overdraft() {
        let db = test_state();
        insert_user(&db, "u1", 100);

        let result = with_tx(&db, |tx| {
            WalletService::record(tx, "u1", TransactionKind::EntryFee, -150, None, "Entry")
        });

        match result {
            Err(AppError::InsufficientFunds { available, required }) => {
                assert_eq!(available, 100);
                assert_eq!(required, 150);
            }
            other => panic!("expected insufficient funds, got {:?}", other),
        }
        assert_eq!(balance_of(&db, "u1"), 100);
    }

    #[test]
    fn test_deposit_respects_minimum_and_duplicates() {
        let db = test_state();
        insert_user(&db, "u1", 0);

        let small = WalletService::deposit(
            &db,
            DepositRequest {
                user_id: "u1".to_string(),
                amount: 10,
                reference: "pay_1".to_string(),
            },
        );
        assert!(matches!(small, Err(AppError::Validation(_))));

        let request = DepositRequest {
            user_id: "u1".to_string(),
            amount: 5000,
            reference: "pay_2".to_string(),
        };
        WalletService::deposit(&db, request.clone()).unwrap();
        assert!(matches!(
            WalletService::deposit(&db, request),
            Err(AppError::Conflict(_))
        ));
        assert_eq!(balance_of(&db, "u1"), 5000);
    }

    #[test]
    fn test_record_refuses_balance_overflow() {
        let db = test_state();
        insert_user(&db, "u1", 1);

        let result = with_tx(&db, |tx| {
            WalletService::record(tx, "u1", TransactionKind::Adjustment, i64::MAX, None, "Credit")
        });
        assert!(matches!(result, Err(AppError::Validation(_))));

        // The lock survives and the balance is untouched.
        assert_eq!(balance_of(&db, "u1"), 1);
        assert!(WalletService::list_transactions(&db, "u1", 0, None).unwrap().is_empty());
    }

    #[test]
    fn test_deposit_rejects_huge_amounts() {
        let db = test_state();
        insert_user(&db, "u1", MAX_BALANCE);

        let huge = WalletService::deposit(
            &db,
            DepositRequest {
                user_id: "u1".to_string(),
                amount: i64::MAX,
                reference: "pay_huge".to_string(),
            },
        );
        assert!(matches!(huge, Err(AppError::Validation(_))));

        let over_cap = WalletService::deposit(
            &db,
            DepositRequest {
                user_id: "u1".to_string(),
                amount: 5000,
                reference: "pay_cap".to_string(),
            },
        );
        assert!(matches!(over_cap, Err(AppError::Validation(_))));
        assert_eq!(balance_of(&db, "u1"), MAX_BALANCE);
    }

    #[test]
    fn test_deposit_disabled() {
        let db = test_state();
        insert_user(&db, "u1", 0);
        save_payment_settings(
            &db,
            &PaymentGatewaySettings {
                deposits_enabled: false,
                ..Default::default()
            },
        )
        .unwrap();

        let result = WalletService::deposit(
            &db,
            DepositRequest {
                user_id: "u1".to_string(),
                amount: 5000,
                reference: "pay_3".to_string(),
            },
        );
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_list_all_by_kind() {
        let db = test_state();
        insert_user(&db, "u1", 0);
        insert_user(&db, "u2", 0);
        with_tx(&db, |tx| {
            WalletService::record(tx, "u1", TransactionKind::Deposit, 100, None, "d")?;
            WalletService::record(tx, "u2", TransactionKind::Prize, 300, None, "p")?;
            WalletService::record(tx, "u2", TransactionKind::Deposit, 200, None, "d")?;
            Ok(())
        })
        .unwrap();

        let deposits = WalletService::list_all_transactions(&db, Some(TransactionKind::Deposit), 0, None).unwrap();
        assert_eq!(deposits.len(), 2);
        let everything = WalletService::list_all_transactions(&db, None, 0, None).unwrap();
        assert_eq!(everything.len(), 3);
    }
}
