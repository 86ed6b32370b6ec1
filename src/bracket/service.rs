use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::bracket::model::{Bracket, TeamRef};
use crate::db::{now, with_conn, with_tx, DbState};
use crate::error::{AppError, AppResult};
use crate::events::{self, BracketUpdatedEvent, BRACKET_UPDATED};
use crate::notifications::{Notification, NotificationDraft, NotificationService};
use crate::tournaments::models::TournamentStatus;
use crate::tournaments::TournamentService;
use crate::wallet::{Transaction, TransactionKind, WalletService};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bracket.ts")]
pub struct MatchResult {
    pub round: usize,
    pub match_index: usize,
    pub winner_id: String,
    pub score1: Option<u32>,
    pub score2: Option<u32>,
}

pub struct BracketService;

impl BracketService {
    pub(crate) fn load(conn: &Connection, tournament_id: &str) -> AppResult<Option<Bracket>> {
        let json: Option<String> = conn
            .query_row(
                "SELECT bracket_json FROM tournaments WHERE id = ?1",
                params![tournament_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| AppError::not_found("Tournament"))?;
        json.map(|j| serde_json::from_str(&j).map_err(AppError::from)).transpose()
    }

    pub(crate) fn store(conn: &Connection, tournament_id: &str, bracket: &Bracket) -> AppResult<()> {
        conn.execute(
            "UPDATE tournaments SET bracket_json = ?1, updated_at = ?2 WHERE id = ?3",
            params![serde_json::to_string(bracket)?, now(), tournament_id],
        )?;
        Ok(())
    }

    /// The bracket, or `None` before the tournament has started.
    pub fn get(db: &DbState, tournament_id: &str) -> AppResult<Option<Bracket>> {
        with_conn(db, |conn| Self::load(conn, tournament_id))
    }

    /// Load the bracket of an ongoing tournament, apply `edit`, and save it.
    fn edit<T>(
        conn: &Connection,
        tournament_id: &str,
        edit: impl FnOnce(&mut Bracket) -> AppResult<T>,
    ) -> AppResult<(Bracket, T)> {
        let tournament = TournamentService::fetch(conn, tournament_id)?;
        if tournament.status != TournamentStatus::Ongoing {
            return Err(AppError::Conflict(format!(
                "The bracket can only be edited while the tournament is ongoing (it is {})",
                tournament.status.as_str()
            )));
        }
        let mut bracket = Self::load(conn, tournament_id)?
            .ok_or_else(|| AppError::Bracket("The bracket has not been drawn yet".to_string()))?;
        let value = edit(&mut bracket)?;
        Self::store(conn, tournament_id, &bracket)?;
        Ok((bracket, value))
    }

    fn publish(tournament_id: &str, bracket: &Bracket) {
        events::publish(
            BRACKET_UPDATED,
            BracketUpdatedEvent {
                tournament_id: tournament_id.to_string(),
                bracket: bracket.clone(),
            },
        );
    }

    /// Record a match result. Deciding the final completes the tournament and pays the
    /// prize pool to the champion's captain.
    pub fn report_result(db: &DbState, tournament_id: &str, result: MatchResult) -> AppResult<Bracket> {
        let (bracket, transactions, notifications) = with_tx(db, |tx| {
            let (bracket, _) = Self::edit(tx, tournament_id, |bracket| {
                bracket.advance(
                    result.round,
                    result.match_index,
                    &result.winner_id,
                    result.score1,
                    result.score2,
                )
            })?;

            let (transactions, notifications) = match bracket.champion() {
                Some(champion) => Self::complete(tx, tournament_id, champion)?,
                None => (Vec::new(), Vec::new()),
            };
            Ok((bracket, transactions, notifications))
        })?;

        log::info!(
            "[bracket] {} round {} match {} won by {}",
            tournament_id,
            result.round + 1,
            result.match_index + 1,
            result.winner_id
        );
        Self::publish(tournament_id, &bracket);
        WalletService::publish_balances(&transactions);
        NotificationService::publish_all(&notifications);
        if bracket.is_complete() {
            with_conn(db, |conn| {
                TournamentService::publish_update(conn, tournament_id);
                Ok(())
            })?;
        }
        Ok(bracket)
    }

    fn complete(
        conn: &Connection,
        tournament_id: &str,
        champion: &TeamRef,
    ) -> AppResult<(Vec<Transaction>, Vec<Notification>)> {
        let tournament = TournamentService::fetch(conn, tournament_id)?;
        let captain_id: String = conn
            .query_row(
                "SELECT captain_id FROM teams WHERE id = ?1 AND tournament_id = ?2",
                params![champion.id, tournament_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| AppError::not_found("Champion team"))?;

        conn.execute(
            "UPDATE tournaments SET status = 'completed', champion_team_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![champion.id, now(), tournament_id],
        )?;

        let mut transactions = Vec::new();
        if tournament.prize_pool > 0 {
            transactions.push(WalletService::record(
                conn,
                &captain_id,
                TransactionKind::Prize,
                tournament.prize_pool,
                Some(tournament_id),
                &format!("Prize: {}", tournament.title),
            )?);
        }

        let draft = NotificationDraft::new(
            "Tournament finished",
            format!("{} won {}!", champion.name, tournament.title),
        )
        .with_link(format!("/tournaments/{}", tournament_id));
        let recipients = NotificationService::tournament_recipients(conn, tournament_id)?;
        let notifications = NotificationService::queue(conn, &recipients, &draft)?;

        log::info!("[bracket] '{}' won {}", champion.name, tournament.title);
        Ok((transactions, notifications))
    }

    /// Place a registered team into a slot, or clear the slot with `None`.
    pub fn set_slot(
        db: &DbState,
        tournament_id: &str,
        round: usize,
        match_index: usize,
        slot: usize,
        team_id: Option<String>,
    ) -> AppResult<Bracket> {
        let (bracket, _) = with_tx(db, |tx| {
            let team = match &team_id {
                Some(team_id) => Some(
                    tx.query_row(
                        "SELECT id, name FROM teams WHERE id = ?1 AND tournament_id = ?2",
                        params![team_id, tournament_id],
                        |row| {
                            Ok(TeamRef {
                                id: row.get(0)?,
                                name: row.get(1)?,
                            })
                        },
                    )
                    .optional()?
                    .ok_or_else(|| AppError::not_found("Team"))?,
                ),
                None => None,
            };
            Self::edit(tx, tournament_id, |bracket| bracket.set_slot(round, match_index, slot, team))
        })?;

        log::info!("[bracket] {} slot {}/{}/{} edited", tournament_id, round + 1, match_index + 1, slot);
        Self::publish(tournament_id, &bracket);
        Ok(bracket)
    }

    pub fn reset_match(db: &DbState, tournament_id: &str, round: usize, match_index: usize) -> AppResult<Bracket> {
        let (bracket, _) = with_tx(db, |tx| {
            Self::edit(tx, tournament_id, |bracket| bracket.reset_match(round, match_index))
        })?;

        log::info!("[bracket] {} round {} match {} reset", tournament_id, round + 1, match_index + 1);
        Self::publish(tournament_id, &bracket);
        Ok(bracket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::core::test_state;
    use crate::test_support::{balance_of, insert_tournament, insert_user};
    use crate::tournaments::{JoinRequest, Seeding};
    use crate::users::UserService;

    /// An ongoing four-team tournament with a 10000 prize pool. Returns team ids in seed order.
    fn started(db: &DbState) -> Vec<String> {
        insert_tournament(db, "t1", 0, 4);
        let mut ids = Vec::new();
        for (user, team) in [("u1", "Alpha"), ("u2", "Bravo"), ("u3", "Charlie"), ("u4", "Delta")] {
            insert_user(db, user, 0);
            let profile = UserService::get_profile(db, user).unwrap();
            let team = TournamentService::join(
                db,
                &profile,
                "t1",
                JoinRequest {
                    team_name: team.to_string(),
                    players: vec![user.to_string()],
                },
            )
            .unwrap();
            ids.push(team.id);
        }
        TournamentService::start(db, "t1", Seeding::Registration).unwrap();
        ids
    }

    fn result(round: usize, match_index: usize, winner_id: &str) -> MatchResult {
        MatchResult {
            round,
            match_index,
            winner_id: winner_id.to_string(),
            score1: None,
            score2: None,
        }
    }

    #[test]
    fn test_bracket_absent_before_start() {
        let db = test_state();
        insert_tournament(&db, "t1", 0, 4);
        assert_eq!(BracketService::get(&db, "t1").unwrap(), None);
        assert!(matches!(
            BracketService::report_result(&db, "t1", result(0, 0, "x")),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_final_completes_and_pays_prize() {
        let db = test_state();
        let teams = started(&db);

        BracketService::report_result(&db, "t1", result(0, 0, &teams[0])).unwrap();
        BracketService::report_result(&db, "t1", result(0, 1, &teams[3])).unwrap();
        let bracket = BracketService::report_result(&db, "t1", result(1, 0, &teams[3])).unwrap();

        assert_eq!(bracket.champion().map(|t| t.name.as_str()), Some("Delta"));
        assert_eq!(balance_of(&db, "u4"), 10000);
        let tournament = with_conn(&db, |conn| TournamentService::fetch(conn, "t1")).unwrap();
        assert_eq!(tournament.status, TournamentStatus::Completed);
        assert_eq!(tournament.champion_team_id.as_deref(), Some(teams[3].as_str()));

        // A finished bracket is frozen.
        assert!(matches!(
            BracketService::reset_match(&db, "t1", 1, 0),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_invalid_result_leaves_bracket_unchanged() {
        let db = test_state();
        let teams = started(&db);
        let before = BracketService::get(&db, "t1").unwrap();

        assert!(matches!(
            BracketService::report_result(&db, "t1", result(0, 0, &teams[2])),
            Err(AppError::Bracket(_))
        ));
        assert_eq!(BracketService::get(&db, "t1").unwrap(), before);
    }

    #[test]
    fn test_huge_positions_are_rejected_cleanly() {
        let db = test_state();
        let teams = started(&db);
        let before = BracketService::get(&db, "t1").unwrap();

        assert!(matches!(
            BracketService::report_result(&db, "t1", result(usize::MAX, 0, &teams[0])),
            Err(AppError::Bracket(_))
        ));
        assert!(matches!(
            BracketService::reset_match(&db, "t1", 0, usize::MAX),
            Err(AppError::Bracket(_))
        ));
        assert_eq!(BracketService::get(&db, "t1").unwrap(), before);
    }

    #[test]
    fn test_editor_reset_and_set_slot() {
        let db = test_state();
        let teams = started(&db);
        BracketService::report_result(&db, "t1", result(0, 0, &teams[1])).unwrap();

        let bracket = BracketService::reset_match(&db, "t1", 0, 0).unwrap();
        assert!(bracket.rounds[1].matches[0].team1.is_none());

        let bracket = BracketService::set_slot(&db, "t1", 0, 0, 1, None).unwrap();
        assert!(bracket.rounds[0].matches[0].team2.is_none());

        assert!(matches!(
            BracketService::set_slot(&db, "t1", 0, 0, 1, Some("ghost".to_string())),
            Err(AppError::NotFound(_))
        ));
        let bracket = BracketService::set_slot(&db, "t1", 0, 0, 1, Some(teams[1].clone())).unwrap();
        assert_eq!(
            bracket.rounds[0].matches[0].team2.as_ref().map(|t| t.name.as_str()),
            Some("Bravo")
        );
    }
}
