//! Settlement disputes
//!
//! A participant challenges a settled outcome and an operator accepts or
//! rejects it. Accepting records the decision only: correcting the payout is
//! a reset followed by a fresh settle, each audited on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AdminAction, AuditRecord};
use crate::auth::AdminActor;
use crate::engine::{check_user_id, Engine};
use crate::error::{EngineError, EngineResult};
use crate::events::EngineEvent;
use crate::propositions::status::PropositionStatus;
use crate::propositions::{load, load_entries};
use crate::store::{abort, key, DISPUTES, OPEN_DISPUTES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    Accepted,
    Rejected,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeStatus::Open => "open",
            DisputeStatus::Accepted => "accepted",
            DisputeStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeDecision {
    Accept,
    Reject,
}

impl DisputeDecision {
    fn status(self) -> DisputeStatus {
        match self {
            DisputeDecision::Accept => DisputeStatus::Accepted,
            DisputeDecision::Reject => DisputeStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
    pub id: Uuid,
    pub proposition_id: Uuid,
    pub user_id: String,
    pub reason: String,
    pub status: DisputeStatus,
    pub resolution_note: Option<String>,
    pub resolved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

fn open_key(proposition_id: Uuid, user_id: &str) -> Vec<u8> {
    key(&[&proposition_id.to_string(), user_id])
}

impl Engine {
    /// Only a participant of a settled proposition may dispute it, once at a
    /// time. Filing leaves the proposition and its payouts untouched.
    pub fn file_dispute(&self, proposition_id: Uuid, user_id: &str, reason: Option<&str>) -> EngineResult<Dispute> {
        check_user_id(user_id)?;
        let reason = self.require_reason(reason)?;
        let now = self.now();
        let open = open_key(proposition_id, user_id);

        let dispute = self.store().transaction(|tx| {
            let prop = load(tx, proposition_id)?;
            if prop.status != PropositionStatus::Settled {
                return abort(EngineError::NotDisputable(prop.effective_status(now)));
            }
            if !load_entries(tx, proposition_id)?.iter().any(|e| e.user_id == user_id) {
                return abort(EngineError::Forbidden("only participants can dispute a settlement".into()));
            }
            if tx.contains(OPEN_DISPUTES, &open)? {
                return abort(EngineError::DuplicateDispute);
            }

            let dispute = Dispute {
                id: Uuid::now_v7(),
                proposition_id,
                user_id: user_id.to_string(),
                reason: reason.to_string(),
                status: DisputeStatus::Open,
                resolution_note: None,
                resolved_by: None,
                created_at: now,
                updated_at: now,
                resolved_at: None,
            };
            tx.put(DISPUTES, dispute.id.as_bytes(), &dispute)?;
            tx.put(OPEN_DISPUTES, &open, &dispute.id)?;
            Ok(dispute)
        })?;

        info!(dispute = %dispute.id, proposition = %proposition_id, user = user_id, "dispute filed");
        self.publish_dispute(&dispute);
        Ok(dispute)
    }

    pub fn dispute(&self, dispute_id: Uuid) -> EngineResult<Dispute> {
        self.store()
            .get::<Dispute>(DISPUTES, dispute_id.as_bytes())?
            .ok_or(EngineError::DisputeNotFound(dispute_id))
    }

    /// Newest first
    pub fn disputes(&self, status: Option<DisputeStatus>, proposition_id: Option<Uuid>) -> EngineResult<Vec<Dispute>> {
        let mut disputes: Vec<Dispute> = self
            .store()
            .scan::<Dispute>(DISPUTES)?
            .into_iter()
            .filter(|d| status.map_or(true, |s| d.status == s))
            .filter(|d| proposition_id.map_or(true, |p| d.proposition_id == p))
            .collect();
        disputes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(disputes)
    }

    pub fn resolve_dispute(
        &self,
        actor: &AdminActor,
        dispute_id: Uuid,
        decision: DisputeDecision,
        reason: Option<&str>,
    ) -> EngineResult<Dispute> {
        let reason = self.require_reason(reason)?;
        let now = self.now();

        let dispute = self.store().transaction(|tx| {
            let mut dispute = match tx.get::<Dispute>(DISPUTES, dispute_id.as_bytes())? {
                Some(dispute) => dispute,
                None => return abort(EngineError::DisputeNotFound(dispute_id)),
            };
            if dispute.status != DisputeStatus::Open {
                warn!(dispute = %dispute_id, actor = actor.id(), status = %dispute.status, "dispute already resolved");
                return abort(EngineError::DisputeClosed(dispute.status.to_string()));
            }

            let previous = dispute.status;
            dispute.status = decision.status();
            dispute.resolution_note = Some(reason.to_string());
            dispute.resolved_by = Some(actor.id().to_string());
            dispute.resolved_at = Some(now);
            dispute.updated_at = now;
            tx.put(DISPUTES, dispute.id.as_bytes(), &dispute)?;
            tx.remove(OPEN_DISPUTES, &open_key(dispute.proposition_id, &dispute.user_id))?;

            let meta = json!({
                "dispute_id": dispute.id,
                "decision": decision,
                "user_id": dispute.user_id,
                "previous_status": previous,
                "new_status": dispute.status,
            });
            AuditRecord::new(actor.id(), AdminAction::ResolveDispute, dispute.proposition_id, Some(reason), meta, now)
                .append(tx)?;
            Ok(dispute)
        })?;

        info!(
            dispute = %dispute.id,
            proposition = %dispute.proposition_id,
            actor = actor.id(),
            status = %dispute.status,
            "dispute resolved"
        );
        self.publish_dispute(&dispute);
        Ok(dispute)
    }

    fn publish_dispute(&self, dispute: &Dispute) {
        self.events().publish(EngineEvent::DisputeUpdated {
            dispute_id: dispute.id,
            proposition_id: dispute.proposition_id,
            status: dispute.status,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::engine::test_support::*;
    use crate::models::{Proposition, Rail, SettlementMethod};
    use crate::propositions::entries::PlaceEntry;
    use crate::propositions::NewProposition;
    use crate::settlement::SettleRequest;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    const REASON: &str = "the official result was published later";

    fn settled(engine: &Engine, now: DateTime<Utc>) -> Proposition {
        let prop = engine
            .create_proposition(NewProposition {
                creator_id: "creator".into(),
                title: "Does the match go to extra time?".into(),
                description: String::new(),
                category: "sports".into(),
                options: vec!["Yes".into(), "No".into()],
                stake_min: dec!(1),
                stake_max: None,
                entry_deadline: now + Duration::hours(1),
                settlement_method: SettlementMethod::Manual,
                platform_fee_percentage: None,
                creator_fee_percentage: None,
            })
            .unwrap();
        for (user, option) in [("alice", 0), ("bob", 1)] {
            engine.deposit(user, Rail::Demo, Some(dec!(10))).unwrap();
            engine
                .place_entry(PlaceEntry {
                    user_id: user.into(),
                    proposition_id: prop.id,
                    option_id: prop.options[option].id,
                    amount: dec!(10),
                    rail: Rail::Demo,
                })
                .unwrap();
        }
        engine.close(&admin(), prop.id, None).unwrap();
        let req = SettleRequest { winning_option_id: prop.options[0].id, ..Default::default() };
        engine.settle(&admin(), prop.id, req).unwrap();
        engine.proposition(prop.id).unwrap()
    }

    #[test]
    fn participant_files_one_open_dispute() {
        let clock = fixed_clock();
        let engine = engine_at(clock.clone());
        let prop = settled(&engine, clock.now());

        let dispute = engine.file_dispute(prop.id, "bob", Some(REASON)).unwrap();
        assert_eq!(dispute.status, DisputeStatus::Open);
        assert_eq!(engine.file_dispute(prop.id, "bob", Some(REASON)), Err(EngineError::DuplicateDispute));
        assert_eq!(engine.proposition(prop.id).unwrap().status, PropositionStatus::Settled);
    }

    #[test]
    fn outsiders_and_unsettled_propositions_cannot_be_disputed() {
        let clock = fixed_clock();
        let engine = engine_at(clock.clone());
        let prop = settled(&engine, clock.now());

        let err = engine.file_dispute(prop.id, "mallory", Some(REASON)).unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
        assert_eq!(engine.file_dispute(prop.id, "bob", Some("no")), Err(EngineError::ReasonTooShort { min: 5 }));

        engine.reset(&admin(), prop.id, None).unwrap();
        let err = engine.file_dispute(prop.id, "bob", Some(REASON)).unwrap_err();
        assert_eq!(err, EngineError::NotDisputable(PropositionStatus::Open));
    }

    #[test]
    fn resolving_closes_the_dispute_and_writes_an_audit_row() {
        let clock = fixed_clock();
        let engine = engine_at(clock.clone());
        let prop = settled(&engine, clock.now());
        let filed = engine.file_dispute(prop.id, "bob", Some(REASON)).unwrap();

        let resolved = engine
            .resolve_dispute(&admin(), filed.id, DisputeDecision::Reject, Some("source confirms the result"))
            .unwrap();
        assert_eq!(resolved.status, DisputeStatus::Rejected);
        assert_eq!(resolved.resolved_by.as_deref(), Some(admin().id()));
        assert!(resolved.resolved_at.is_some());

        let err = engine
            .resolve_dispute(&admin(), filed.id, DisputeDecision::Accept, Some("changed my mind"))
            .unwrap_err();
        assert_eq!(err, EngineError::DisputeClosed("rejected".into()));

        let rows = crate::audit::audit_log(engine.store(), Some(prop.id)).unwrap();
        let row = rows.iter().find(|r| r.action == AdminAction::ResolveDispute).unwrap();
        assert_eq!(row.meta["decision"], "reject");
        assert_eq!(row.meta["previous_status"], "open");

        // A closed dispute frees the slot for a new one
        engine.file_dispute(prop.id, "bob", Some(REASON)).unwrap();
        assert_eq!(engine.disputes(Some(DisputeStatus::Open), Some(prop.id)).unwrap().len(), 1);
        assert_eq!(engine.disputes(None, None).unwrap().len(), 2);
    }

    #[test]
    fn unknown_dispute_is_not_found() {
        let engine = engine_at(fixed_clock());
        let id = Uuid::new_v4();
        let err = engine.resolve_dispute(&admin(), id, DisputeDecision::Accept, Some(REASON)).unwrap_err();
        assert_eq!(err, EngineError::DisputeNotFound(id));
    }
}
