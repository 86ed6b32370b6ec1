use crate::auth::{SignInRequest, SignUpOutcome, SignUpRequest};
use crate::banners::{Banner, BannerForm};
use crate::bracket::{Bracket, Match, MatchResult, Round, TeamRef};
use crate::error::AppError;
use crate::events::*;
use crate::games::{Game, GameForm};
use crate::notifications::{Audience, Notification, NotificationDraft};
use crate::preferences::{Theme, UserPreferences};
use crate::settings::{PaymentGatewaySettings, PaymentProvider};
use crate::storage::{Bucket, StoredFile, UploadProgress};
use crate::tournaments::*;
use crate::users::{BalanceAdjustment, Role, UpdateProfileRequest, UserFilter, UserProfile};
use crate::validation::FieldError;
use crate::wallet::*;
use ts_rs::TS;

#[cfg(test)]
mod ts_export_tests {
    use super::*;

    #[test]
    fn export_error_types() {
        AppError::export().unwrap();
        FieldError::export().unwrap();
    }

    #[test]
    fn export_account_types() {
        SignUpRequest::export().unwrap();
        SignInRequest::export().unwrap();
        SignUpOutcome::export().unwrap();
        UserProfile::export().unwrap();
        Role::export().unwrap();
        UpdateProfileRequest::export().unwrap();
        UserFilter::export().unwrap();
        BalanceAdjustment::export().unwrap();
        UserPreferences::export().unwrap();
        Theme::export().unwrap();
    }

    #[test]
    fn export_catalog_types() {
        Game::export().unwrap();
        GameForm::export().unwrap();
        Banner::export().unwrap();
        BannerForm::export().unwrap();
        Bucket::export().unwrap();
        StoredFile::export().unwrap();
        UploadProgress::export().unwrap();
    }

    #[test]
    fn export_tournament_types() {
        Tournament::export().unwrap();
        TournamentStatus::export().unwrap();
        TournamentSummary::export().unwrap();
        TournamentDetail::export().unwrap();
        TournamentFilter::export().unwrap();
        TournamentForm::export().unwrap();
        Team::export().unwrap();
        JoinRequest::export().unwrap();
        RoomCredentials::export().unwrap();
        Seeding::export().unwrap();
        Bracket::export().unwrap();
        Round::export().unwrap();
        Match::export().unwrap();
        TeamRef::export().unwrap();
        MatchResult::export().unwrap();
    }

    #[test]
    fn export_wallet_types() {
        Transaction::export().unwrap();
        TransactionKind::export().unwrap();
        WithdrawalRequest::export().unwrap();
        WithdrawalStatus::export().unwrap();
        WithdrawalForm::export().unwrap();
        DepositRequest::export().unwrap();
        PaymentGatewaySettings::export().unwrap();
        PaymentProvider::export().unwrap();
    }

    #[test]
    fn export_notification_and_event_types() {
        Notification::export().unwrap();
        NotificationDraft::export().unwrap();
        Audience::export().unwrap();
        NotificationEvent::export().unwrap();
        BracketUpdatedEvent::export().unwrap();
        TournamentUpdatedEvent::export().unwrap();
        BalanceChangedEvent::export().unwrap();
        UploadProgressEvent::export().unwrap();
        AuthChangedEvent::export().unwrap();
    }
}
