//! Single-elimination bracket.
//!
//! Round `r` holds `size / 2^(r+1)` matches. The winner of match `m` in round `r` plays
//! in match `m / 2` of round `r + 1`, in slot `m % 2`. Matches are never created or
//! removed after [`Bracket::generate`]; every edit only fills or clears slots.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bracket.ts")]
pub struct TeamRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bracket.ts")]
pub struct Match {
    pub team1: Option<TeamRef>,
    pub team2: Option<TeamRef>,
    /// Id of the winning team.
    pub winner: Option<String>,
    pub score1: Option<u32>,
    pub score2: Option<u32>,
}

impl Match {
    pub fn slot(&self, slot: usize) -> Option<&TeamRef> {
        match slot {
            0 => self.team1.as_ref(),
            _ => self.team2.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: usize) -> &mut Option<TeamRef> {
        match slot {
            0 => &mut self.team1,
            _ => &mut self.team2,
        }
    }

    pub fn is_decided(&self) -> bool {
        self.winner.is_some()
    }

    fn team_count(&self) -> usize {
        self.team1.is_some() as usize + self.team2.is_some() as usize
    }

    fn winner_ref(&self) -> Option<&TeamRef> {
        let winner = self.winner.as_deref()?;
        [self.team1.as_ref(), self.team2.as_ref()]
            .into_iter()
            .flatten()
            .find(|team| team.id == winner)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bracket.ts")]
pub struct Round {
    pub name: String,
    pub matches: Vec<Match>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bracket.ts")]
pub struct Bracket {
    pub rounds: Vec<Round>,
}

fn round_name(match_count: usize) -> String {
    match match_count {
        1 => "Final".to_string(),
        2 => "Semi-finals".to_string(),
        4 => "Quarter-finals".to_string(),
        n => format!("Round of {}", n * 2),
    }
}

fn bracket_error(message: impl Into<String>) -> AppError {
    AppError::Bracket(message.into())
}

impl Bracket {
    /// Seed `teams` in order: team `i` goes to slot `i % 2` of first-round match `i / 2`.
    /// Missing opponents are byes and are advanced straight away.
    pub fn generate(teams: &[TeamRef]) -> AppResult<Bracket> {
        if teams.len() < 2 {
            return Err(bracket_error("At least two teams are needed to build a bracket"));
        }
        for (i, team) in teams.iter().enumerate() {
            if teams[..i].iter().any(|other| other.id == team.id) {
                return Err(bracket_error(format!("Team '{}' is seeded twice", team.name)));
            }
        }

        let size = teams.len().next_power_of_two();
        let mut rounds = Vec::new();
        let mut match_count = size / 2;
        while match_count >= 1 {
            rounds.push(Round {
                name: round_name(match_count),
                matches: vec![Match::default(); match_count],
            });
            match_count /= 2;
        }

        for (i, team) in teams.iter().enumerate() {
            *rounds[0].matches[i / 2].slot_mut(i % 2) = Some(team.clone());
        }

        let mut bracket = Bracket { rounds };
        bracket.resolve_byes();
        Ok(bracket)
    }

    /// Whether no team can ever reach this match.
    fn is_void(&self, round: usize, index: usize) -> bool {
        let m = &self.rounds[round].matches[index];
        if m.team_count() > 0 {
            return false;
        }
        round == 0 || (self.is_void(round - 1, index * 2) && self.is_void(round - 1, index * 2 + 1))
    }

    /// Decide every match holding one team whose other slot can never be filled.
    fn resolve_byes(&mut self) {
        for round in 0..self.rounds.len() {
            for index in 0..self.rounds[round].matches.len() {
                let m = &self.rounds[round].matches[index];
                if m.is_decided() || m.team_count() != 1 {
                    continue;
                }
                let empty_slot = if m.team1.is_none() { 0 } else { 1 };
                let opponent_void = round == 0 || self.is_void(round - 1, index * 2 + empty_slot);
                if !opponent_void {
                    continue;
                }

                let m = &mut self.rounds[round].matches[index];
                let Some(team) = m.team1.clone().or_else(|| m.team2.clone()) else {
                    continue;
                };
                m.winner = Some(team.id.clone());
                self.propagate(round, index, Some(team));
            }
        }
    }

    fn propagate(&mut self, round: usize, index: usize, team: Option<TeamRef>) {
        if let Some(next) = self.rounds.get_mut(round + 1) {
            *next.matches[index / 2].slot_mut(index % 2) = team;
        }
    }

    fn check_position(&self, round: usize, index: usize) -> AppResult<()> {
        let r = self
            .rounds
            .get(round)
            .ok_or_else(|| bracket_error(format!("Round {} does not exist", round.saturating_add(1))))?;
        if index >= r.matches.len() {
            return Err(bracket_error(format!(
                "Match {} does not exist in {}",
                index.saturating_add(1),
                r.name
            )));
        }
        Ok(())
    }

    pub fn get_match(&self, round: usize, index: usize) -> AppResult<&Match> {
        self.check_position(round, index)?;
        Ok(&self.rounds[round].matches[index])
    }

    fn next_match_decided(&self, round: usize, index: usize) -> bool {
        self.rounds
            .get(round + 1)
            .map(|next| next.matches[index / 2].is_decided())
            .unwrap_or(false)
    }

    /// Record the result of a match and move the winner into the next round.
    pub fn advance(
        &mut self,
        round: usize,
        index: usize,
        winner_id: &str,
        score1: Option<u32>,
        score2: Option<u32>,
    ) -> AppResult<()> {
        self.check_position(round, index)?;
        let m = &self.rounds[round].matches[index];

        let (Some(team1), Some(team2)) = (&m.team1, &m.team2) else {
            return Err(bracket_error("Both teams must be set before a result is recorded"));
        };
        let winner_slot = if team1.id == winner_id {
            0
        } else if team2.id == winner_id {
            1
        } else {
            return Err(bracket_error("The winner must be one of the two teams in the match"));
        };
        if let (Some(s1), Some(s2)) = (score1, score2) {
            let (won, lost) = if winner_slot == 0 { (s1, s2) } else { (s2, s1) };
            if won <= lost {
                return Err(bracket_error("The winner's score must be higher"));
            }
        }
        if self.next_match_decided(round, index) {
            return Err(bracket_error(
                "The next match already has a result; reset it before changing this one",
            ));
        }

        let m = &mut self.rounds[round].matches[index];
        let winner = m.slot(winner_slot).cloned();
        m.winner = Some(winner_id.to_string());
        m.score1 = score1;
        m.score2 = score2;
        self.propagate(round, index, winner);
        Ok(())
    }

    /// Put a team into (or clear) one slot of an undecided match.
    ///
    /// Past the first round only slots whose feeder match can never produce a team are
    /// editable; the rest belong to the feeder's winner. Byes are not settled here, so a
    /// team can be moved in two steps. [`Bracket::reset_match`] settles them.
    pub fn set_slot(&mut self, round: usize, index: usize, slot: usize, team: Option<TeamRef>) -> AppResult<()> {
        self.check_position(round, index)?;
        if slot > 1 {
            return Err(bracket_error("A match only has slots 0 and 1"));
        }
        if self.rounds[round].matches[index].is_decided() {
            return Err(bracket_error("Reset the match before editing its teams"));
        }
        if round > 0 && !self.is_void(round - 1, index * 2 + slot) {
            return Err(bracket_error(format!(
                "That slot is filled by the winner of match {} in {}",
                index * 2 + slot + 1,
                self.rounds[round - 1].name
            )));
        }
        if let Some(team) = &team {
            let placed_elsewhere = self.rounds[round].matches.iter().enumerate().any(|(i, m)| {
                (0..2).any(|s| (i, s) != (index, slot) && m.slot(s).map(|t| t.id == team.id).unwrap_or(false))
            });
            if placed_elsewhere {
                return Err(bracket_error(format!("'{}' is already placed in this round", team.name)));
            }
        }

        *self.rounds[round].matches[index].slot_mut(slot) = team;
        Ok(())
    }

    /// Clear a match result along with everything that depended on it in later rounds.
    pub fn reset_match(&mut self, round: usize, index: usize) -> AppResult<()> {
        self.check_position(round, index)?;
        self.clear_downstream(round, index);
        self.resolve_byes();
        Ok(())
    }

    fn clear_downstream(&mut self, round: usize, index: usize) {
        let m = &mut self.rounds[round].matches[index];
        m.winner = None;
        m.score1 = None;
        m.score2 = None;
        if round + 1 < self.rounds.len() {
            self.propagate(round, index, None);
            self.clear_downstream(round + 1, index / 2);
        }
    }

    /// Winner of the final, once it is decided.
    pub fn champion(&self) -> Option<&TeamRef> {
        self.rounds.last()?.matches.first()?.winner_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.champion().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn teams(n: usize) -> Vec<TeamRef> {
        (0..n)
            .map(|i| TeamRef {
                id: format!("t{}", i),
                name: format!("Team {}", i),
            })
            .collect()
    }

    fn slot_ids(m: &Match) -> (Option<&str>, Option<&str>) {
        (
            m.team1.as_ref().map(|t| t.id.as_str()),
            m.team2.as_ref().map(|t| t.id.as_str()),
        )
    }

    #[test]
    fn test_generate_seeds_in_order() {
        let bracket = Bracket::generate(&teams(8)).unwrap();

        let names: Vec<&str> = bracket.rounds.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Quarter-finals", "Semi-finals", "Final"]);
        assert_eq!(bracket.rounds[0].matches.len(), 4);
        assert_eq!(slot_ids(&bracket.rounds[0].matches[0]), (Some("t0"), Some("t1")));
        assert_eq!(slot_ids(&bracket.rounds[0].matches[3]), (Some("t6"), Some("t7")));
        assert!(bracket.rounds[1].matches.iter().all(|m| m.team_count() == 0));
    }

    #[test]
    fn test_round_names_for_large_brackets() {
        let bracket = Bracket::generate(&teams(32)).unwrap();
        assert_eq!(bracket.rounds[0].name, "Round of 32");
        assert_eq!(bracket.rounds[1].name, "Round of 16");
        assert_eq!(bracket.rounds.len(), 5);
    }

    #[test]
    fn test_generate_rejects_too_few_or_duplicates() {
        assert!(Bracket::generate(&teams(1)).is_err());
        let mut dup = teams(3);
        dup[2].id = "t0".to_string();
        assert!(Bracket::generate(&dup).is_err());
    }

    #[test]
    fn test_byes_advance() {
        // Five teams in an eight-slot bracket: t4 has no first-round opponent and
        // its semi-final opponent can never arrive either.
        let bracket = Bracket::generate(&teams(5)).unwrap();

        let bye = &bracket.rounds[0].matches[2];
        assert_eq!(bye.winner.as_deref(), Some("t4"));
        assert!(bracket.rounds[0].matches[3].winner.is_none());

        let semi = &bracket.rounds[1].matches[1];
        assert_eq!(semi.winner.as_deref(), Some("t4"));
        assert_eq!(slot_ids(&bracket.rounds[2].matches[0]), (None, Some("t4")));
    }

    #[test]
    fn test_three_teams() {
        let bracket = Bracket::generate(&teams(3)).unwrap();
        assert_eq!(bracket.rounds[0].matches[1].winner.as_deref(), Some("t2"));
        assert_eq!(slot_ids(&bracket.rounds[1].matches[0]), (None, Some("t2")));
        assert!(bracket.champion().is_none());
    }

    #[test]
    fn test_advance_to_champion() {
        let mut bracket = Bracket::generate(&teams(4)).unwrap();

        bracket.advance(0, 0, "t1", Some(2), Some(13)).unwrap();
        bracket.advance(0, 1, "t2", None, None).unwrap();
        assert_eq!(slot_ids(&bracket.rounds[1].matches[0]), (Some("t1"), Some("t2")));

        bracket.advance(1, 0, "t2", Some(3), Some(1)).unwrap_err();
        bracket.advance(1, 0, "t2", Some(1), Some(3)).unwrap();
        assert_eq!(bracket.champion().map(|t| t.id.as_str()), Some("t2"));
        assert!(bracket.is_complete());
    }

    #[test]
    fn test_advance_validates_winner_and_position() {
        let mut bracket = Bracket::generate(&teams(4)).unwrap();
        assert!(bracket.advance(0, 0, "t3", None, None).is_err());
        assert!(bracket.advance(0, 9, "t0", None, None).is_err());
        assert!(bracket.advance(5, 0, "t0", None, None).is_err());
        // Final has no teams yet.
        assert!(bracket.advance(1, 0, "t0", None, None).is_err());
    }

    #[test]
    fn test_changing_result_replaces_propagated_team() {
        let mut bracket = Bracket::generate(&teams(4)).unwrap();
        bracket.advance(0, 0, "t0", None, None).unwrap();
        bracket.advance(0, 0, "t1", None, None).unwrap();
        assert_eq!(slot_ids(&bracket.rounds[1].matches[0]), (Some("t1"), None));
    }

    #[test]
    fn test_decided_next_match_blocks_overwrite() {
        let mut bracket = Bracket::generate(&teams(4)).unwrap();
        bracket.advance(0, 0, "t0", None, None).unwrap();
        bracket.advance(0, 1, "t2", None, None).unwrap();
        bracket.advance(1, 0, "t0", None, None).unwrap();

        assert!(bracket.advance(0, 0, "t1", None, None).is_err());
    }

    #[test]
    fn test_reset_clears_downstream() {
        let mut bracket = Bracket::generate(&teams(4)).unwrap();
        bracket.advance(0, 0, "t0", None, None).unwrap();
        bracket.advance(0, 1, "t2", None, None).unwrap();
        bracket.advance(1, 0, "t0", Some(2), Some(0)).unwrap();

        bracket.reset_match(0, 0).unwrap();

        assert!(bracket.rounds[0].matches[0].winner.is_none());
        let final_match = &bracket.rounds[1].matches[0];
        assert_eq!(slot_ids(final_match), (None, Some("t2")));
        assert!(final_match.winner.is_none());
        assert_eq!(final_match.score1, None);
        assert!(bracket.champion().is_none());
    }

    #[test]
    fn test_reset_keeps_byes() {
        let mut bracket = Bracket::generate(&teams(3)).unwrap();
        bracket.reset_match(0, 1).unwrap();
        assert_eq!(bracket.rounds[0].matches[1].winner.as_deref(), Some("t2"));
        assert_eq!(slot_ids(&bracket.rounds[1].matches[0]), (None, Some("t2")));
    }

    #[test]
    fn test_out_of_range_positions_are_errors() {
        let mut bracket = Bracket::generate(&teams(4)).unwrap();
        assert!(matches!(
            bracket.advance(usize::MAX, 0, "t0", None, None),
            Err(AppError::Bracket(_))
        ));
        assert!(matches!(
            bracket.advance(0, usize::MAX, "t0", None, None),
            Err(AppError::Bracket(_))
        ));
        assert!(bracket.set_slot(usize::MAX, usize::MAX, 0, None).is_err());
        assert!(bracket.reset_match(0, usize::MAX).is_err());
        assert!(bracket.get_match(usize::MAX, 0).is_err());
    }

    #[test]
    fn test_reset_redoes_later_round_bye() {
        // t4's semi-final is a bye because the fourth quarter-final is empty.
        let mut bracket = Bracket::generate(&teams(5)).unwrap();

        bracket.reset_match(1, 1).unwrap();
        assert_eq!(bracket.rounds[1].matches[1].winner.as_deref(), Some("t4"));
        assert_eq!(slot_ids(&bracket.rounds[2].matches[0]), (None, Some("t4")));

        bracket.reset_match(0, 2).unwrap();
        assert_eq!(bracket.rounds[0].matches[2].winner.as_deref(), Some("t4"));
        assert_eq!(bracket.rounds[1].matches[1].winner.as_deref(), Some("t4"));
        assert_eq!(slot_ids(&bracket.rounds[2].matches[0]), (None, Some("t4")));
    }

    #[test]
    fn test_set_slot_respects_feeder_matches() {
        let mut bracket = Bracket::generate(&teams(4)).unwrap();
        let late = TeamRef {
            id: "t9".to_string(),
            name: "Late Entry".to_string(),
        };

        // The final's slots belong to the undecided semi-finals.
        assert!(bracket.set_slot(1, 0, 0, Some(late.clone())).is_err());

        // Once the feeder is empty for good the slot is the editor's.
        bracket.set_slot(0, 0, 0, None).unwrap();
        bracket.set_slot(0, 0, 1, None).unwrap();
        bracket.set_slot(1, 0, 0, Some(late)).unwrap();
        assert_eq!(slot_ids(&bracket.rounds[1].matches[0]), (Some("t9"), None));
    }

    #[test]
    fn test_set_slot() {
        let mut bracket = Bracket::generate(&teams(4)).unwrap();
        let t0 = teams(4)[0].clone();

        // Already placed in match 0.
        assert!(bracket.set_slot(0, 1, 0, Some(t0.clone())).is_err());

        bracket.set_slot(0, 0, 0, None).unwrap();
        bracket.set_slot(0, 1, 0, Some(t0)).unwrap();
        assert_eq!(slot_ids(&bracket.rounds[0].matches[1]), (Some("t0"), Some("t3")));
        assert!(bracket.set_slot(0, 1, 2, None).is_err());

        bracket.advance(0, 1, "t0", None, None).unwrap();
        assert!(bracket.set_slot(0, 1, 1, None).is_err());
    }
}
