use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::sync::Arc;

use propbook::{
    AdminActor, Authorizer, ChainClient, ChainError, ChainSettlement, Clock, Command, Config, Engine, EngineError,
    EngineEvent, EngineSettings, EntryStatus, FinalizeStatus, ManualClock, NewProposition, PlaceEntry, Proposition,
    PropositionStatus, Rail, SettleRequest, SettlementMethod, Store,
};

// ===== HELPERS =====

fn setup() -> (Engine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap()));
    let store = Store::temporary().unwrap();
    let engine = Engine::new(store, clock.clone(), EngineSettings::from(&Config::for_tests()));
    (engine, clock)
}

fn admin() -> AdminActor {
    Authorizer::new(Some("test-admin-key"), Vec::new())
        .authorize(Some("test-admin-key"), Some("ops-desk"))
        .unwrap()
}

fn proposition(engine: &Engine, clock: &ManualClock, options: &[&str]) -> Proposition {
    engine
        .create_proposition(NewProposition {
            creator_id: "creator".into(),
            title: "Will the referendum pass?".into(),
            description: "Resolves on the official count.".into(),
            category: "politics".into(),
            options: options.iter().map(|o| o.to_string()).collect(),
            stake_min: dec!(1),
            stake_max: None,
            entry_deadline: clock.now() + Duration::hours(6),
            settlement_method: SettlementMethod::Manual,
            platform_fee_percentage: Some(dec!(2.5)),
            creator_fee_percentage: Some(dec!(1.0)),
        })
        .unwrap()
}

fn stake(engine: &Engine, prop: &Proposition, user: &str, option: usize, amount: Decimal, rail: Rail) {
    engine.deposit(user, rail, Some(amount)).unwrap();
    engine
        .place_entry(PlaceEntry {
            user_id: user.into(),
            proposition_id: prop.id,
            option_id: prop.options[option].id,
            amount,
            rail,
        })
        .unwrap();
}

fn settle_on(engine: &Engine, prop: &Proposition, option: usize) -> Result<propbook::SettleOutcome, EngineError> {
    engine.settle(
        &admin(),
        prop.id,
        SettleRequest {
            winning_option_id: prop.options[option].id,
            resolution_reason: Some("official count published".into()),
            resolution_source_url: Some("https://example.org/results".into()),
        },
    )
}

/// (available, locked) for every user touched in a test
fn snapshot(engine: &Engine, users: &[&str], rail: Rail) -> BTreeMap<String, (Decimal, Decimal)> {
    users
        .iter()
        .map(|u| {
            let row = engine.balance(u, rail).unwrap();
            (u.to_string(), (row.available, row.locked))
        })
        .collect()
}

fn total_money(engine: &Engine, users: &[&str], rail: Rail) -> Decimal {
    users.iter().map(|u| engine.balance(u, rail).unwrap().total()).sum()
}

struct FlakyChain {
    fail: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl ChainClient for FlakyChain {
    async fn submit_settlement(&self, settlement: &ChainSettlement) -> Result<String, ChainError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(ChainError::RequestFailed("connection refused".into()));
        }
        Ok(format!("0xfeed{}", &settlement.merkle_root[..8]))
    }
}

// ===== EXAMPLE SETTLEMENT =====

#[test]
fn sixty_forty_pool_settles_to_ninety_six_fifty() {
    let (engine, clock) = setup();
    let prop = proposition(&engine, &clock, &["A", "B"]);
    stake(&engine, &prop, "alice", 0, dec!(60), Rail::Demo);
    stake(&engine, &prop, "bob", 1, dec!(40), Rail::Demo);
    engine.close(&admin(), prop.id, Some("polls closed")).unwrap();

    let outcome = settle_on(&engine, &prop, 0).unwrap();
    let settlement = outcome.settlement;
    assert_eq!(settlement.winners, 1);
    assert_eq!(settlement.losers, 1);
    assert_eq!(settlement.platform_fees(Rail::Demo), dec!(2.50));
    assert_eq!(settlement.creator_fees(Rail::Demo), dec!(1.00));

    let alice = engine.balance("alice", Rail::Demo).unwrap();
    assert_eq!(alice.available, dec!(96.50));
    assert_eq!(alice.locked, Decimal::ZERO);
    let bob = engine.balance("bob", Rail::Demo).unwrap();
    assert_eq!(bob.total(), Decimal::ZERO);

    let entries = engine.entries(prop.id).unwrap();
    assert_eq!(entries[0].status, EntryStatus::Won);
    assert_eq!(entries[0].actual_payout, Some(dec!(96.50)));
    assert_eq!(entries[1].status, EntryStatus::Lost);

    let prop = engine.proposition(prop.id).unwrap();
    assert_eq!(prop.status, PropositionStatus::Settled);
    assert_eq!(prop.winning_option_id, Some(prop.options[0].id));
}

// ===== CONSERVATION =====

#[test]
fn value_is_conserved_across_a_busy_settlement() {
    let (engine, clock) = setup();
    let prop = proposition(&engine, &clock, &["Yes", "No", "Recount"]);
    let stakes = [
        ("u1", 0, dec!(13.37)),
        ("u2", 0, dec!(7)),
        ("u3", 1, dec!(21.5)),
        ("u4", 2, dec!(3.33)),
        ("u5", 0, dec!(9.99)),
        ("u6", 1, dec!(44)),
        ("u1", 1, dec!(2.01)),
    ];
    for (user, option, amount) in stakes {
        stake(&engine, &prop, user, option, amount, Rail::Demo);
        let current = engine.proposition(prop.id).unwrap();
        assert_eq!(current.pool_total, current.options_total());
    }
    let pool = engine.proposition(prop.id).unwrap().pool_total;
    let everyone = ["u1", "u2", "u3", "u4", "u5", "u6", "platform", "creator"];
    let before = total_money(&engine, &everyone, Rail::Demo);

    clock.advance(Duration::hours(7));
    let settlement = settle_on(&engine, &prop, 0).unwrap().settlement;

    let rail = settlement.plan.rail(Rail::Demo).unwrap();
    assert_eq!(rail.pool, pool);
    assert_eq!(rail.net_paid + rail.platform_fees + rail.creator_fees + rail.rounding_residue, pool);
    assert_eq!(total_money(&engine, &everyone, Rail::Demo), before);
    for user in everyone {
        assert_eq!(engine.balance(user, Rail::Demo).unwrap().locked, Decimal::ZERO, "{} still locked", user);
    }
    assert!(engine.reconcile(prop.id).is_ok());
}

#[test]
fn concurrent_stakes_keep_pool_equal_to_options() {
    let (engine, clock) = setup();
    let prop = proposition(&engine, &clock, &["Left", "Right"]);
    let users: Vec<String> = (0..16).map(|i| format!("user-{}", i)).collect();
    for user in &users {
        engine.deposit(user, Rail::Demo, Some(dec!(50))).unwrap();
    }

    std::thread::scope(|scope| {
        for (i, user) in users.iter().enumerate() {
            let engine = engine.clone();
            let prop = &prop;
            scope.spawn(move || {
                engine
                    .place_entry(PlaceEntry {
                        user_id: user.clone(),
                        proposition_id: prop.id,
                        option_id: prop.options[i % 2].id,
                        amount: dec!(5),
                        rail: Rail::Demo,
                    })
                    .unwrap();
            });
        }
    });

    let prop = engine.proposition(prop.id).unwrap();
    assert_eq!(prop.pool_total, dec!(80));
    assert_eq!(prop.options[0].total_staked, dec!(40));
    assert_eq!(prop.options[1].total_staked, dec!(40));
    assert_eq!(engine.reconcile(prop.id).unwrap().entries, 16);
}

// ===== IDEMPOTENCY AND CONFLICT =====

#[test]
fn settling_twice_with_same_winner_is_a_no_op() {
    let (engine, clock) = setup();
    let prop = proposition(&engine, &clock, &["A", "B"]);
    stake(&engine, &prop, "alice", 0, dec!(60), Rail::Demo);
    stake(&engine, &prop, "bob", 1, dec!(40), Rail::Demo);
    engine.close(&admin(), prop.id, None).unwrap();

    let first = settle_on(&engine, &prop, 0).unwrap();
    let journal_alice = engine.journal("alice").unwrap().len();
    let journal_platform = engine.journal("platform").unwrap().len();

    let second = settle_on(&engine, &prop, 0).unwrap();
    assert!(second.already_settled);
    assert_eq!(second.settlement, first.settlement);
    assert_eq!(engine.journal("alice").unwrap().len(), journal_alice);
    assert_eq!(engine.journal("platform").unwrap().len(), journal_platform);
    assert_eq!(engine.balance("alice", Rail::Demo).unwrap().available, dec!(96.50));
}

#[test]
fn settling_with_a_different_winner_conflicts() {
    let (engine, clock) = setup();
    let prop = proposition(&engine, &clock, &["A", "B"]);
    stake(&engine, &prop, "alice", 0, dec!(60), Rail::Demo);
    stake(&engine, &prop, "bob", 1, dec!(40), Rail::Demo);
    engine.close(&admin(), prop.id, None).unwrap();
    settle_on(&engine, &prop, 0).unwrap();
    let before = snapshot(&engine, &["alice", "bob", "platform", "creator"], Rail::Demo);

    let err = settle_on(&engine, &prop, 1).unwrap_err();
    assert_eq!(
        err,
        EngineError::ConflictingSettlement { settled_with: prop.options[0].id, requested: prop.options[1].id }
    );
    assert_eq!(snapshot(&engine, &["alice", "bob", "platform", "creator"], Rail::Demo), before);
    assert_eq!(engine.settlement(prop.id).unwrap().winning_option_id, prop.options[0].id);
}

#[test]
fn racing_settlements_collapse_into_one() {
    let (engine, clock) = setup();
    let prop = proposition(&engine, &clock, &["A", "B"]);
    stake(&engine, &prop, "alice", 0, dec!(60), Rail::Demo);
    stake(&engine, &prop, "bob", 1, dec!(40), Rail::Demo);
    engine.close(&admin(), prop.id, None).unwrap();

    let fresh: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                let prop = &prop;
                scope.spawn(move || settle_on(&engine, prop, 0).unwrap().already_settled)
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).filter(|already| !already).count()
    });
    assert_eq!(fresh, 1);
    assert_eq!(engine.balance("alice", Rail::Demo).unwrap().available, dec!(96.50));
}

// ===== ENTRIES =====

#[test]
fn double_stake_on_same_option_is_rejected() {
    let (engine, clock) = setup();
    let prop = proposition(&engine, &clock, &["A", "B"]);
    stake(&engine, &prop, "alice", 0, dec!(10), Rail::Demo);

    engine.deposit("alice", Rail::Demo, Some(dec!(20))).unwrap();
    let again = PlaceEntry {
        user_id: "alice".into(),
        proposition_id: prop.id,
        option_id: prop.options[0].id,
        amount: dec!(10),
        rail: Rail::Demo,
    };
    assert_eq!(engine.place_entry(again.clone()), Err(EngineError::DuplicateEntry));
    let other = PlaceEntry { option_id: prop.options[1].id, ..again };
    assert!(engine.place_entry(other).is_ok());
}

#[test]
fn stake_at_deadline_fails_even_though_row_says_open() {
    let (engine, clock) = setup();
    let prop = proposition(&engine, &clock, &["A", "B"]);
    engine.deposit("alice", Rail::Demo, Some(dec!(10))).unwrap();
    clock.set(prop.entry_deadline);

    let err = engine
        .place_entry(PlaceEntry {
            user_id: "alice".into(),
            proposition_id: prop.id,
            option_id: prop.options[0].id,
            amount: dec!(10),
            rail: Rail::Demo,
        })
        .unwrap_err();
    assert_eq!(err, EngineError::DeadlinePassed);
    assert_eq!(err.to_string(), "Entry deadline has passed");
    assert_eq!(engine.proposition(prop.id).unwrap().status, PropositionStatus::Closed);
}

// ===== VOID VS CANCEL =====

fn ten_twenty_thirty(engine: &Engine, clock: &ManualClock) -> Proposition {
    let prop = proposition(engine, clock, &["A", "B", "C"]);
    stake(engine, &prop, "u10", 0, dec!(10), Rail::Demo);
    stake(engine, &prop, "u20", 1, dec!(20), Rail::Demo);
    stake(engine, &prop, "u30", 2, dec!(30), Rail::Demo);
    prop
}

#[test]
fn void_refunds_every_active_entry() {
    let (engine, clock) = setup();
    let prop = ten_twenty_thirty(&engine, &clock);

    let outcome = engine.void(&admin(), prop.id, Some("question was ambiguous")).unwrap();
    assert_eq!(outcome.refunded_entries, 3);
    assert_eq!(outcome.refunded_amount, dec!(60));
    assert_eq!(outcome.proposition.status, PropositionStatus::Voided);

    for (user, amount) in [("u10", dec!(10)), ("u20", dec!(20)), ("u30", dec!(30))] {
        let row = engine.balance(user, Rail::Demo).unwrap();
        assert_eq!(row.available, amount);
        assert_eq!(row.locked, Decimal::ZERO);
    }
    assert!(engine.entries(prop.id).unwrap().iter().all(|e| e.status == EntryStatus::Refunded));
    assert!(engine.journal("platform").unwrap().is_empty());
}

#[test]
fn cancel_leaves_stakes_locked() {
    let (engine, clock) = setup();
    let prop = ten_twenty_thirty(&engine, &clock);

    let cancelled = engine.cancel(&admin(), prop.id, Some("suspected wash trading")).unwrap();
    assert_eq!(cancelled.status, PropositionStatus::Cancelled);

    for (user, amount) in [("u10", dec!(10)), ("u20", dec!(20)), ("u30", dec!(30))] {
        let row = engine.balance(user, Rail::Demo).unwrap();
        assert_eq!(row.available, Decimal::ZERO);
        assert_eq!(row.locked, amount);
    }
    assert!(engine.entries(prop.id).unwrap().iter().all(|e| e.status == EntryStatus::Active));

    let err = engine.void(&admin(), prop.id, Some("changed my mind")).unwrap_err();
    assert_eq!(err, EngineError::InvalidTransition { from: PropositionStatus::Cancelled, command: Command::Void });
}

// ===== RESET =====

#[test]
fn reset_restores_every_balance_and_entry() {
    let (engine, clock) = setup();
    let prop = proposition(&engine, &clock, &["A", "B"]);
    stake(&engine, &prop, "alice", 0, dec!(60), Rail::Demo);
    stake(&engine, &prop, "bob", 1, dec!(40), Rail::Demo);
    stake(&engine, &prop, "carol", 0, dec!(15.55), Rail::Demo);
    engine.close(&admin(), prop.id, None).unwrap();

    let users = ["alice", "bob", "carol", "platform", "creator"];
    let before = snapshot(&engine, &users, Rail::Demo);

    settle_on(&engine, &prop, 0).unwrap();
    assert_ne!(snapshot(&engine, &users, Rail::Demo), before);

    let outcome = engine.reset(&admin(), prop.id, Some("wrong outcome picked")).unwrap();
    assert_eq!(outcome.entries_restored, 3);
    assert_eq!(snapshot(&engine, &users, Rail::Demo), before);
    assert!(engine.entries(prop.id).unwrap().iter().all(|e| e.status == EntryStatus::Active));
    assert!(matches!(engine.settlement(prop.id), Err(EngineError::SettlementNotFound(_))));

    // Reopened before the deadline, so it must be closed again before a new settle
    assert_eq!(engine.proposition(prop.id).unwrap().status, PropositionStatus::Open);
    engine.close(&admin(), prop.id, None).unwrap();
    let redo = settle_on(&engine, &prop, 1).unwrap();
    assert!(!redo.already_settled);
    assert_eq!(redo.settlement.winners, 1);
}

// ===== DUAL RAIL FINALIZE =====

#[tokio::test]
async fn crypto_finalize_fails_then_succeeds_on_retry() {
    let (engine, clock) = setup();
    let prop = proposition(&engine, &clock, &["A", "B"]);
    stake(&engine, &prop, "alice", 0, dec!(60), Rail::Crypto);
    stake(&engine, &prop, "bob", 1, dec!(40), Rail::Crypto);
    stake(&engine, &prop, "dora", 0, dec!(5), Rail::Demo);
    engine.close(&admin(), prop.id, None).unwrap();

    let settled = settle_on(&engine, &prop, 0).unwrap().settlement;
    assert_eq!(settled.onchain_status, Some(FinalizeStatus::Queued));
    // Off-chain payout is already done
    assert_eq!(engine.balance("alice", Rail::Crypto).unwrap().available, dec!(96.50));
    assert_eq!(engine.balance("alice", Rail::Crypto).unwrap().currency, "USDC");

    let chain = FlakyChain { fail: std::sync::atomic::AtomicBool::new(true) };
    assert_eq!(engine.run_finalize_once(&chain).await.unwrap(), 1);
    let job = engine.finalize_job(prop.id).unwrap();
    assert_eq!(job.status, FinalizeStatus::Failed);
    assert_eq!(job.attempts, 1);
    assert!(job.last_error.as_deref().unwrap().contains("connection refused"));
    assert_eq!(engine.settlement(prop.id).unwrap().onchain_status, Some(FinalizeStatus::Failed));

    // Failed jobs are not picked up again without a retry
    assert_eq!(engine.run_finalize_once(&chain).await.unwrap(), 0);

    let mut events = engine.events().subscribe();
    engine.retry_finalize(&admin(), prop.id).unwrap();
    chain.fail.store(false, std::sync::atomic::Ordering::SeqCst);
    assert_eq!(engine.run_finalize_once(&chain).await.unwrap(), 1);

    let job = engine.finalize_job(prop.id).unwrap();
    assert_eq!(job.status, FinalizeStatus::Finalized);
    assert_eq!(job.attempts, 2);
    assert!(job.tx_hash.unwrap().starts_with("0xfeed"));
    assert!(engine.settlement(prop.id).unwrap().fully_finalized());
    // Retry never repeats the off-chain payout
    assert_eq!(engine.balance("alice", Rail::Crypto).unwrap().available, dec!(96.50));

    let mut saw_complete = false;
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::SettlementComplete { fully_finalized, .. } = event {
            saw_complete = fully_finalized;
        }
    }
    assert!(saw_complete);

    let err = engine.retry_finalize(&admin(), prop.id).unwrap_err();
    assert_eq!(err, EngineError::JobNotRetryable("finalized".into()));
    let err = engine.reset(&admin(), prop.id, None).unwrap_err();
    assert!(matches!(err, EngineError::ResetBlocked(_)));
}

#[tokio::test]
async fn reset_cancels_a_failed_finalize_job() {
    let (engine, clock) = setup();
    let prop = proposition(&engine, &clock, &["A", "B"]);
    stake(&engine, &prop, "alice", 0, dec!(30), Rail::Crypto);
    stake(&engine, &prop, "bob", 1, dec!(30), Rail::Crypto);
    engine.close(&admin(), prop.id, None).unwrap();
    settle_on(&engine, &prop, 0).unwrap();

    let chain = FlakyChain { fail: std::sync::atomic::AtomicBool::new(true) };
    engine.run_finalize_once(&chain).await.unwrap();

    let outcome = engine.reset(&admin(), prop.id, None).unwrap();
    assert_eq!(outcome.cancelled_job, Some(FinalizeStatus::Failed));
    assert!(matches!(engine.finalize_job(prop.id), Err(EngineError::JobNotFound(_))));
    assert_eq!(engine.balance("alice", Rail::Crypto).unwrap().locked, dec!(30));
}

// ===== INTERRUPTED FINALIZE =====

struct HangingChain;

#[async_trait]
impl ChainClient for HangingChain {
    async fn submit_settlement(&self, _: &ChainSettlement) -> Result<String, ChainError> {
        std::future::pending::<Result<String, ChainError>>().await
    }
}

fn settled_on_crypto(engine: &Engine, clock: &ManualClock) -> Proposition {
    let prop = proposition(engine, clock, &["A", "B"]);
    stake(engine, &prop, "alice", 0, dec!(60), Rail::Crypto);
    stake(engine, &prop, "bob", 1, dec!(40), Rail::Crypto);
    engine.close(&admin(), prop.id, None).unwrap();
    settle_on(engine, &prop, 0).unwrap();
    prop
}

/// Drops the worker pass mid chain call, leaving the job claimed
async fn interrupt_finalize(engine: &Engine) {
    let pass = tokio::time::timeout(std::time::Duration::from_millis(50), engine.run_finalize_once(&HangingChain)).await;
    assert!(pass.is_err());
}

fn healthy_chain() -> FlakyChain {
    FlakyChain { fail: std::sync::atomic::AtomicBool::new(false) }
}

#[tokio::test]
async fn interrupted_finalize_is_requeued_once_its_lease_expires() {
    let (engine, clock) = setup();
    let prop = settled_on_crypto(&engine, &clock);
    interrupt_finalize(&engine).await;

    let job = engine.finalize_job(prop.id).unwrap();
    assert_eq!(job.status, FinalizeStatus::Running);
    assert_eq!(job.started_at, Some(clock.now()));

    // The claim is still inside its lease
    let err = engine.retry_finalize(&admin(), prop.id).unwrap_err();
    assert_eq!(err, EngineError::JobNotRetryable("running".into()));
    assert_eq!(engine.run_finalize_once(&healthy_chain()).await.unwrap(), 0);

    clock.advance(Duration::seconds(31));
    assert_eq!(engine.run_finalize_once(&healthy_chain()).await.unwrap(), 1);

    let job = engine.finalize_job(prop.id).unwrap();
    assert_eq!(job.status, FinalizeStatus::Finalized);
    assert_eq!(job.attempts, 2);
    assert_eq!(job.started_at, None);
    assert!(engine.settlement(prop.id).unwrap().fully_finalized());
    assert_eq!(engine.balance("alice", Rail::Crypto).unwrap().available, dec!(96.50));
}

#[tokio::test]
async fn admin_can_retry_a_stale_running_job() {
    let (engine, clock) = setup();
    let prop = settled_on_crypto(&engine, &clock);
    interrupt_finalize(&engine).await;
    clock.advance(Duration::seconds(31));

    let job = engine.retry_finalize(&admin(), prop.id).unwrap();
    assert_eq!(job.status, FinalizeStatus::Queued);
    assert_eq!(job.started_at, None);

    assert_eq!(engine.run_finalize_once(&healthy_chain()).await.unwrap(), 1);
    assert_eq!(engine.finalize_job(prop.id).unwrap().status, FinalizeStatus::Finalized);
}

#[tokio::test]
async fn startup_recovery_requeues_every_running_job() {
    let (engine, clock) = setup();
    let prop = settled_on_crypto(&engine, &clock);
    interrupt_finalize(&engine).await;

    assert_eq!(engine.recover_stale_jobs(Duration::zero()).unwrap(), 1);
    let job = engine.finalize_job(prop.id).unwrap();
    assert_eq!(job.status, FinalizeStatus::Queued);
    assert!(job.last_error.unwrap().contains("expired"));

    // A queued job no longer blocks reset
    let outcome = engine.reset(&admin(), prop.id, None).unwrap();
    assert_eq!(outcome.cancelled_job, Some(FinalizeStatus::Queued));
}

#[tokio::test]
async fn unanswered_chain_call_fails_the_job_at_the_lease() {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap()));
    let settings = EngineSettings {
        finalize_lease: Duration::milliseconds(20),
        ..EngineSettings::from(&Config::for_tests())
    };
    let engine = Engine::new(Store::temporary().unwrap(), clock.clone(), settings);
    let prop = settled_on_crypto(&engine, &clock);

    assert_eq!(engine.run_finalize_once(&HangingChain).await.unwrap(), 1);
    let job = engine.finalize_job(prop.id).unwrap();
    assert_eq!(job.status, FinalizeStatus::Failed);
    assert!(job.last_error.unwrap().contains("no response within 20ms"));
    assert!(engine.retry_finalize(&admin(), prop.id).is_ok());
}

// ===== AUDIT =====

#[test]
fn admin_commands_are_audited_and_rejections_are_not() {
    let (engine, clock) = setup();
    let prop = proposition(&engine, &clock, &["A", "B"]);
    stake(&engine, &prop, "alice", 0, dec!(10), Rail::Demo);

    engine.close(&admin(), prop.id, Some("early close")).unwrap();
    assert!(engine.close(&admin(), prop.id, None).is_err());
    assert!(engine.void(&admin(), prop.id, Some("no")).is_err());
    engine.void(&admin(), prop.id, Some("source retracted")).unwrap();

    let rows = propbook::audit::audit_log(engine.store(), Some(prop.id)).unwrap();
    let actions: Vec<_> = rows.iter().map(|r| r.action).collect();
    assert_eq!(actions, vec![propbook::AdminAction::Close, propbook::AdminAction::Void]);
    assert!(rows.iter().all(|r| r.actor_id == "ops-desk"));
}
