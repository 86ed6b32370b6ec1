//! Payout requests. The amount is held (debited) when the request is made and
//! refunded if an admin rejects it, so a balance can never be withdrawn twice.

use rusqlite::{params, Connection, OptionalExtension};

use crate::constants::page_limit;
use crate::db::{new_id, now, with_conn, with_tx, DbState};
use crate::error::{AppError, AppResult};
use crate::notifications::{NotificationDraft, NotificationService};
use crate::settings::payment_settings;
use crate::validation::ensure_valid;
use crate::wallet::models::*;
use crate::wallet::service::WalletService;

const WITHDRAWAL_COLUMNS: &str =
    "id, user_id, amount, method, account_details, status, admin_note, created_at, processed_at";

fn withdrawal_from_row(row: &rusqlite::Row) -> rusqlite::Result<WithdrawalRequest> {
    Ok(WithdrawalRequest {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        method: row.get(3)?,
        account_details: row.get(4)?,
        status: WithdrawalStatus::from_str(&row.get::<_, String>(5)?),
        admin_note: row.get(6)?,
        created_at: row.get(7)?,
        processed_at: row.get(8)?,
    })
}

fn fetch(conn: &Connection, id: &str) -> AppResult<WithdrawalRequest> {
    conn.query_row(
        &format!("SELECT {} FROM withdrawal_requests WHERE id = ?1", WITHDRAWAL_COLUMNS),
        params![id],
        withdrawal_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("Withdrawal request"))
}

pub struct WithdrawalService;

impl WithdrawalService {
    pub fn request(db: &DbState, user_id: &str, form: WithdrawalForm) -> AppResult<WithdrawalRequest> {
        ensure_valid(&form)?;

        let (request, transaction) = with_tx(db, |tx| {
            let settings = payment_settings(tx)?;
            if !settings.withdrawals_enabled {
                return Err(AppError::Forbidden("Withdrawals are currently disabled".to_string()));
            }
            if form.amount < settings.min_withdrawal {
                return Err(AppError::invalid(
                    "amount",
                    format!("Minimum withdrawal is {}", settings.min_withdrawal),
                ));
            }

            let request = WithdrawalRequest {
                id: new_id(),
                user_id: user_id.to_string(),
                amount: form.amount,
                method: form.method.clone(),
                account_details: form.account_details.trim().to_string(),
                status: WithdrawalStatus::Pending,
                admin_note: None,
                created_at: now(),
                processed_at: None,
            };
            tx.execute(
                "INSERT INTO withdrawal_requests (id, user_id, amount, method, account_details, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    request.id,
                    request.user_id,
                    request.amount,
                    request.method,
                    request.account_details,
                    request.status.as_str(),
                    request.created_at,
                ],
            )?;

            let transaction = WalletService::record(
                tx,
                user_id,
                TransactionKind::Withdrawal,
                -form.amount,
                Some(&request.id),
                "Withdrawal requested",
            )?;
            Ok((request, transaction))
        })?;

        log::info!("[wallet] Withdrawal {} of {} requested by {}", request.id, request.amount, user_id);
        WalletService::publish_balances(&[transaction]);
        Ok(request)
    }

    pub fn approve(db: &DbState, request_id: &str, note: Option<String>) -> AppResult<WithdrawalRequest> {
        let (request, notifications) = with_tx(db, |tx| {
            let request = Self::close(tx, request_id, WithdrawalStatus::Approved, note.as_deref())?;
            let draft = NotificationDraft::new(
                "Withdrawal approved",
                format!("Your withdrawal of {} has been paid out.", request.amount),
            )
            .with_link("/wallet");
            let notifications = NotificationService::queue(tx, &[request.user_id.clone()], &draft)?;
            Ok((request, notifications))
        })?;

        log::info!("[wallet] Withdrawal {} approved", request.id);
        NotificationService::publish_all(&notifications);
        Ok(request)
    }

    /// Reject a pending request and return the held amount to the user.
    pub fn reject(db: &DbState, request_id: &str, note: Option<String>) -> AppResult<WithdrawalRequest> {
        let (request, transaction, notifications) = with_tx(db, |tx| {
            let request = Self::close(tx, request_id, WithdrawalStatus::Rejected, note.as_deref())?;
            let transaction = WalletService::record(
                tx,
                &request.user_id,
                TransactionKind::Refund,
                request.amount,
                Some(&request.id),
                "Withdrawal rejected",
            )?;

            let body = match &request.admin_note {
                Some(reason) => format!("Your withdrawal of {} was rejected: {}", request.amount, reason),
                None => format!("Your withdrawal of {} was rejected and refunded.", request.amount),
            };
            let draft = NotificationDraft::new("Withdrawal rejected", body).with_link("/wallet");
            let notifications = NotificationService::queue(tx, &[request.user_id.clone()], &draft)?;
            Ok((request, transaction, notifications))
        })?;

        log::info!("[wallet] Withdrawal {} rejected", request.id);
        WalletService::publish_balances(&[transaction]);
        NotificationService::publish_all(&notifications);
        Ok(request)
    }

    fn close(
        conn: &Connection,
        request_id: &str,
        status: WithdrawalStatus,
        note: Option<&str>,
    ) -> AppResult<WithdrawalRequest> {
        let mut request = fetch(conn, request_id)?;
        if request.status != WithdrawalStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Withdrawal request is already {}",
                request.status.as_str()
            )));
        }

        let processed_at = now();
        let note = note.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);
        conn.execute(
            "UPDATE withdrawal_requests SET status = ?1, admin_note = ?2, processed_at = ?3 WHERE id = ?4",
            params![status.as_str(), note, processed_at, request_id],
        )?;

        request.status = status;
        request.admin_note = note;
        request.processed_at = Some(processed_at);
        Ok(request)
    }

    /// Admin queue, oldest first so requests are handled in order.
    pub fn list(
        db: &DbState,
        status: Option<WithdrawalStatus>,
        offset: u32,
        limit: Option<u32>,
    ) -> AppResult<Vec<WithdrawalRequest>> {
        with_conn(db, |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM withdrawal_requests WHERE (?1 IS NULL OR status = ?1)
                 ORDER BY created_at ASC, rowid ASC LIMIT ?2 OFFSET ?3",
                WITHDRAWAL_COLUMNS
            ))?;
            let rows = stmt
                .query_map(
                    params![status.map(|s| s.as_str()), page_limit(limit), offset],
                    withdrawal_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn list_for_user(db: &DbState, user_id: &str) -> AppResult<Vec<WithdrawalRequest>> {
        with_conn(db, |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM withdrawal_requests WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
                WITHDRAWAL_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![user_id], withdrawal_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}
