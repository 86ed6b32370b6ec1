use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::constants::{MAX_TEAMS, MAX_TEAM_SIZE, MIN_TEAMS};
use crate::validation::{FieldError, Rules, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "tournaments.ts")]
pub enum TournamentStatus {
    Upcoming,
    Ongoing,
    Completed,
    Cancelled,
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Upcoming => "upcoming",
            TournamentStatus::Ongoing => "ongoing",
            TournamentStatus::Completed => "completed",
            TournamentStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "ongoing" => TournamentStatus::Ongoing,
            "completed" => TournamentStatus::Completed,
            "cancelled" => TournamentStatus::Cancelled,
            _ => TournamentStatus::Upcoming,
        }
    }

    /// Upcoming and ongoing tournaments still hold players' money or time.
    pub fn is_active(&self) -> bool {
        matches!(self, TournamentStatus::Upcoming | TournamentStatus::Ongoing)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "tournaments.ts")]
pub struct Tournament {
    pub id: String,
    pub title: String,
    pub game_id: String,
    pub description: String,
    pub rules: String,
    pub image_path: Option<String>,
    pub entry_fee: i64,
    pub prize_pool: i64,
    pub max_teams: i64,
    /// Players per team, captain included.
    pub team_size: i64,
    pub status: TournamentStatus,
    pub start_time: String,
    /// Lobby credentials, only filled in for registered captains and admins.
    pub room_code: Option<String>,
    pub room_password: Option<String>,
    pub champion_team_id: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

pub(crate) const TOURNAMENT_COLUMNS: &str = "id, title, game_id, description, rules, image_path, entry_fee, prize_pool, max_teams, team_size, status, start_time, room_code, room_password, champion_team_id, created_by, created_at, updated_at";

pub(crate) fn tournament_from_row(row: &rusqlite::Row) -> rusqlite::Result<Tournament> {
    Ok(Tournament {
        id: row.get(0)?,
        title: row.get(1)?,
        game_id: row.get(2)?,
        description: row.get(3)?,
        rules: row.get(4)?,
        image_path: row.get(5)?,
        entry_fee: row.get(6)?,
        prize_pool: row.get(7)?,
        max_teams: row.get(8)?,
        team_size: row.get(9)?,
        status: TournamentStatus::from_str(&row.get::<_, String>(10)?),
        start_time: row.get(11)?,
        room_code: row.get(12)?,
        room_password: row.get(13)?,
        champion_team_id: row.get(14)?,
        created_by: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

/// A captain's registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "tournaments.ts")]
pub struct Team {
    pub id: String,
    pub tournament_id: String,
    pub name: String,
    /// `None` once the captain's account has been deleted.
    pub captain_id: Option<String>,
    /// In-game names, captain first.
    pub players: Vec<String>,
    pub created_at: String,
}

/// Browsing card: the tournament plus what the list needs to render it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "tournaments.ts")]
pub struct TournamentSummary {
    pub tournament: Tournament,
    pub game_name: String,
    pub registered_teams: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "tournaments.ts")]
pub struct TournamentDetail {
    pub tournament: Tournament,
    pub game_name: String,
    pub teams: Vec<Team>,
    pub registered_teams: i64,
    /// The caller's own team, if they joined.
    pub my_team_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "tournaments.ts")]
pub struct TournamentFilter {
    pub game_id: Option<String>,
    pub status: Option<TournamentStatus>,
    /// Case-insensitive match on the title.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "tournaments.ts")]
pub struct JoinRequest {
    pub team_name: String,
    pub players: Vec<String>,
}

impl Validate for JoinRequest {
    fn validate(&self) -> Vec<FieldError> {
        let mut rules = Rules::new();
        rules.length_between("team_name", &self.team_name, 2, 40);
        for player in &self.players {
            rules.length_between("players", player, 1, 32);
        }
        let mut names: Vec<String> = self.players.iter().map(|p| p.trim().to_lowercase()).collect();
        names.sort();
        names.dedup();
        rules.check(
            "players",
            names.len() == self.players.len(),
            "Each player may only be listed once",
        );
        rules.finish()
    }
}

/// Body of both the create and the edit form.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "tournaments.ts")]
pub struct TournamentForm {
    pub title: String,
    pub game_id: String,
    pub description: String,
    pub rules: String,
    pub image_path: Option<String>,
    pub entry_fee: i64,
    pub prize_pool: i64,
    pub max_teams: i64,
    pub team_size: i64,
    pub start_time: String,
}

impl Validate for TournamentForm {
    fn validate(&self) -> Vec<FieldError> {
        Rules::new()
            .length_between("title", &self.title, 3, 100)
            .required("game_id", &self.game_id)
            .max_length("description", &self.description, 5000)
            .max_length("rules", &self.rules, 10000)
            .non_negative_amount("entry_fee", self.entry_fee)
            .non_negative_amount("prize_pool", self.prize_pool)
            .range("max_teams", self.max_teams, MIN_TEAMS, MAX_TEAMS)
            .range("team_size", self.team_size, 1, MAX_TEAM_SIZE)
            .rfc3339("start_time", &self.start_time)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "tournaments.ts")]
pub struct RoomCredentials {
    pub room_code: String,
    pub room_password: String,
}

impl Validate for RoomCredentials {
    fn validate(&self) -> Vec<FieldError> {
        Rules::new()
            .length_between("room_code", &self.room_code, 1, 64)
            .max_length("room_password", &self.room_password, 64)
            .finish()
    }
}

/// Order in which registered teams are placed into the first round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "tournaments.ts")]
pub enum Seeding {
    /// Registration order.
    #[default]
    Registration,
    Random,
}
