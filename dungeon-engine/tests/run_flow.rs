use chrono::{DateTime, Duration, Utc};
use dungeon_engine::{
    AbandonRequest, ActionRequest, Character, CompleteRequest, DungeonCatalog, DungeonService,
    EngineConfig, EngineError, EnterRequest, Envelope, EventKind, FixedClock, FloorAction,
    GameStore, MemoryStore, RunStatus, StatVector, User, respond,
};

const WALLET: &str = "0x5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a";
const DUNGEON: &str = "goblin-warrens";

const CATALOG: &str = r#"{
  "dungeons": [
    {
      "id": "goblin-warrens",
      "name": "Goblin Warrens",
      "difficulty": "normal",
      "minLevel": 5,
      "maxLevel": 30,
      "energyCost": 10,
      "floorCount": 3,
      "rewards": { "goldMin": 50, "goldMax": 150, "expMin": 30, "expMax": 80 },
      "eventTable": [
        { "type": "combat", "name": "Goblin Raiders", "probability": 0.7,
          "enemy": { "str": 6, "agi": 6, "int": 2, "luk": 2, "vit": 6 },
          "effects": [{ "type": "gold", "amount": 10 }] },
        { "type": "treasure", "name": "Loot Pile", "probability": 0.5,
          "effects": [{ "type": "gold", "amount": 20 }] }
      ],
      "bossTable": [
        { "name": "Goblin Chieftain",
          "stats": { "str": 12, "agi": 8, "int": 4, "luk": 4, "vit": 12 },
          "rewards": { "gold": 40, "exp": 50 } }
      ],
      "lootTable": [{ "rarity": "common", "weight": 3 }, { "rarity": "rare", "weight": 1 }]
    },
    {
      "id": "sealed-vault",
      "name": "Sealed Vault",
      "difficulty": "hard",
      "minLevel": 1,
      "maxLevel": 10,
      "energyCost": 1,
      "floorCount": 1,
      "active": false,
      "rewards": { "goldMin": 1, "goldMax": 2, "expMin": 1, "expMax": 2 },
      "bossTable": [{ "name": "Warden", "stats": { "str": 1 }, "rewards": { "gold": 1, "exp": 1 } }]
    }
  ]
}"#;

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

fn service(level: u32, energy: u32) -> DungeonService<MemoryStore, FixedClock> {
    service_at(level, energy, epoch())
}

fn service_at(
    level: u32,
    energy: u32,
    now: DateTime<Utc>,
) -> DungeonService<MemoryStore, FixedClock> {
    let hero = Character::new("hero", WALLET, "Ayla", StatVector::new(10, 10, 10, 10, 10))
        .with_level(level);
    service_with(hero, energy, now)
}

fn service_with(
    hero: Character,
    energy: u32,
    now: DateTime<Utc>,
) -> DungeonService<MemoryStore, FixedClock> {
    let store = MemoryStore::new();
    let user = User::new(WALLET, epoch()).with_energy(energy, 100);
    store.seed(user, vec![hero]).unwrap();
    DungeonService::new(
        DungeonCatalog::from_json(CATALOG).unwrap(),
        EngineConfig::default(),
        store,
    )
    .with_clock(FixedClock(now))
    .with_seed(0x5EED)
}

fn enter() -> EnterRequest {
    EnterRequest {
        wallet_address: WALLET.to_string(),
        character_id: None,
    }
}

fn act(action: FloorAction) -> ActionRequest {
    ActionRequest {
        wallet_address: WALLET.to_string(),
        character_id: None,
        action,
    }
}

fn complete(success: bool) -> CompleteRequest {
    CompleteRequest {
        wallet_address: WALLET.to_string(),
        dungeon_id: DUNGEON.to_string(),
        success,
        character_id: None,
    }
}

fn user(svc: &DungeonService<MemoryStore, FixedClock>) -> User {
    svc.store().user(WALLET).unwrap().unwrap()
}

#[test]
fn entering_debits_energy_and_returns_every_floor_plus_boss() {
    let svc = service(5, 10);
    let response = svc.enter_dungeon(DUNGEON, &enter()).unwrap();
    assert_eq!(response.status, RunStatus::InProgress);
    assert_eq!(response.energy_remaining, 0);
    assert_eq!(response.current_floor, 1);
    assert_eq!(response.events.len(), 4);
    assert_eq!(response.events[3].kind, EventKind::Boss);
    assert_eq!(
        response.events.iter().map(|e| e.floor).collect::<Vec<_>>(),
        vec![1, 2, 3, 3]
    );
    assert_eq!(user(&svc).energy, 0);
}

#[test]
fn short_energy_is_rejected_without_a_run() {
    let svc = service(5, 5);
    let err = svc.enter_dungeon(DUNGEON, &enter()).unwrap_err();
    assert_eq!(
        err,
        EngineError::InsufficientEnergy {
            required: 10,
            available: 5
        }
    );
    assert_eq!(user(&svc).energy, 5);
    assert!(svc.store().active_run("hero").unwrap().is_none());
}

#[test]
fn low_level_is_rejected() {
    let svc = service(4, 10);
    let err = svc.enter_dungeon(DUNGEON, &enter()).unwrap_err();
    assert_eq!(err.code(), "LevelTooLow");
    assert_eq!(err.status_code(), 400);
    assert_eq!(user(&svc).energy, 10);
}

#[test]
fn second_entry_conflicts_with_the_active_run() {
    let svc = service(5, 50);
    svc.enter_dungeon(DUNGEON, &enter()).unwrap();
    let err = svc.enter_dungeon(DUNGEON, &enter()).unwrap_err();
    assert_eq!(err.status_code(), 409);
    assert_eq!(user(&svc).energy, 40);
}

#[test]
fn lookups_fail_with_not_found() {
    let svc = service(5, 10);
    let err = svc.enter_dungeon("nowhere", &enter()).unwrap_err();
    assert_eq!(err.code(), "DungeonNotFound");

    let stranger = EnterRequest {
        wallet_address: String::from("0x0000000000000000000000000000000000000001"),
        character_id: None,
    };
    assert_eq!(
        svc.enter_dungeon(DUNGEON, &stranger).unwrap_err().code(),
        "UserNotFound"
    );

    let missing = EnterRequest {
        wallet_address: WALLET.to_string(),
        character_id: Some(String::from("ghost")),
    };
    assert_eq!(
        svc.enter_dungeon(DUNGEON, &missing).unwrap_err().code(),
        "CharacterNotFound"
    );
}

#[test]
fn closed_dungeons_and_bad_wallets_are_validation_errors() {
    let svc = service(5, 10);
    assert_eq!(
        svc.enter_dungeon("sealed-vault", &enter()).unwrap_err().code(),
        "ValidationError"
    );
    let bad = EnterRequest {
        wallet_address: String::from("not-a-wallet"),
        character_id: None,
    };
    assert_eq!(
        svc.enter_dungeon(DUNGEON, &bad).unwrap_err().code(),
        "ValidationError"
    );
    assert_eq!(svc.list_dungeons().dungeons.len(), 1);
}

#[test]
fn fleeing_every_floor_then_succeeding_grants_completion_gold() {
    let svc = service(5, 10);
    let entered = svc.enter_dungeon(DUNGEON, &enter()).unwrap();
    for _ in &entered.events {
        let response = svc.act(DUNGEON, &act(FloorAction::Flee)).unwrap();
        assert!(response.report.entry.is_none());
    }
    let before = user(&svc);
    let done = svc.complete_dungeon(&complete(true)).unwrap();
    assert_eq!(done.status, RunStatus::Completed);

    let rewards = done.rewards.unwrap();
    assert!((50..=150).contains(&rewards.gold));
    assert!((30..=80).contains(&rewards.exp));
    assert_eq!(done.user.gold - before.gold, rewards.gold);
    assert_eq!(done.character.exp, rewards.exp);
    assert!(svc.store().active_run("hero").unwrap().is_none());
}

#[test]
fn success_before_the_last_floor_is_rejected() {
    let svc = service(5, 10);
    svc.enter_dungeon(DUNGEON, &enter()).unwrap();
    svc.act(DUNGEON, &act(FloorAction::Flee)).unwrap();
    let err = svc.complete_dungeon(&complete(true)).unwrap_err();
    assert_eq!(err.code(), "ValidationError");
    assert!(svc.store().active_run("hero").unwrap().is_some());
}

#[test]
fn failure_records_collected_loot_without_crediting_it() {
    let svc = service(5, 10);
    let entered = svc.enter_dungeon(DUNGEON, &enter()).unwrap();
    let mut collected = 0;
    if let Some(first) = entered.events.first() {
        let report = svc
            .act(DUNGEON, &act(FloorAction::engage(first.kind)))
            .unwrap()
            .report;
        collected = report.loot.iter().filter_map(|l| l.amount).sum::<u64>();
    }
    let done = svc.complete_dungeon(&complete(false)).unwrap();
    assert_eq!(done.status, RunStatus::Failed);
    assert!(done.rewards.is_none());
    assert_eq!(done.collected.gold + done.collected.exp, collected);
    assert_eq!((done.user.gold, done.user.exp), (0, 0));
    assert_eq!(done.character.exp, 0);

    let err = svc.complete_dungeon(&complete(false)).unwrap_err();
    assert_eq!(err.code(), "ValidationError");
}

#[test]
fn fought_success_credits_only_the_completion_roll() {
    let champion = Character::new(
        "hero",
        WALLET,
        "Ayla",
        StatVector::new(200, 200, 200, 200, 200),
    )
    .with_level(5);
    let svc = service_with(champion, 10, epoch());
    let entered = svc.enter_dungeon(DUNGEON, &enter()).unwrap();
    for event in &entered.events {
        svc.act(DUNGEON, &act(FloorAction::engage(event.kind)))
            .unwrap();
    }
    let before = user(&svc);
    let done = svc.complete_dungeon(&complete(true)).unwrap();
    let rewards = done.rewards.unwrap();

    let gained = done.user.gold - before.gold;
    assert!((50..=150).contains(&gained), "gold increased by {gained}");
    assert_eq!(gained, rewards.gold);
    assert_eq!(done.character.exp, rewards.exp);
}

#[test]
fn run_damage_is_written_back_to_the_character() {
    // Zero power never beats a defender roll; ties go to the defender.
    let novice = Character::new("hero", WALLET, "Ayla", StatVector::default()).with_level(5);
    let svc = service_with(novice, 10, epoch());
    let entered = svc.enter_dungeon(DUNGEON, &enter()).unwrap();
    let mut hp = 100;
    for event in &entered.events {
        let report = svc
            .act(DUNGEON, &act(FloorAction::engage(event.kind)))
            .unwrap()
            .report;
        hp = report.hp;
        if report.defeated {
            break;
        }
    }
    assert!(hp < 100, "lost fights leave damage");

    let done = svc.complete_dungeon(&complete(false)).unwrap();
    assert_eq!(done.character.hp, hp.max(1));
    let stored = svc.store().character("hero").unwrap().unwrap();
    assert_eq!(stored.hp, hp.max(1));
    assert_eq!(stored.max_hp, 100);
}

#[test]
fn abandoning_credits_nothing_and_frees_the_character() {
    let svc = service(5, 30);
    svc.enter_dungeon(DUNGEON, &enter()).unwrap();
    let response = svc
        .abandon_dungeon(&AbandonRequest {
            wallet_address: WALLET.to_string(),
            dungeon_id: DUNGEON.to_string(),
            character_id: None,
        })
        .unwrap();
    assert_eq!(response.status, RunStatus::Abandoned);
    let after = user(&svc);
    assert_eq!((after.gold, after.energy), (0, 20));
    svc.enter_dungeon(DUNGEON, &enter()).unwrap();
}

#[test]
fn mismatched_action_is_a_validation_error() {
    let svc = service(5, 10);
    let entered = svc.enter_dungeon(DUNGEON, &enter()).unwrap();
    let wrong = match entered.events[0].kind {
        EventKind::Combat => FloorAction::Loot,
        EventKind::Treasure => FloorAction::Rest,
        _ => return,
    };
    let err = svc.act(DUNGEON, &act(wrong)).unwrap_err();
    assert_eq!(err.code(), "ValidationError");
    let retry = svc.act(DUNGEON, &act(FloorAction::Flee)).unwrap();
    assert_eq!(retry.report.floor, 1);
}

#[test]
fn energy_refills_after_the_interval() {
    let svc = service_at(5, 0, epoch() + Duration::hours(24));
    let response = svc.enter_dungeon(DUNGEON, &enter()).unwrap();
    assert_eq!(response.energy_remaining, 90);
}

#[test]
fn same_master_seed_replays_the_same_run() {
    let play = || {
        let svc = service(5, 10);
        let entered = svc.enter_dungeon(DUNGEON, &enter()).unwrap();
        for event in &entered.events {
            let response = svc.act(DUNGEON, &act(FloorAction::engage(event.kind))).unwrap();
            if response.report.defeated {
                break;
            }
        }
        svc.complete_dungeon(&complete(false)).unwrap()
    };
    let a = play();
    let b = play();
    assert_eq!(a.fingerprint, b.fingerprint);
    assert_eq!(a.loot, b.loot);
}

#[test]
fn envelopes_wrap_service_results() {
    let svc = service(4, 10);
    let env: Envelope = respond(&svc.enter_dungeon(DUNGEON, &enter()));
    assert_eq!(env.status, 400);
    assert_eq!(env.body["code"], "LevelTooLow");

    let env = respond(&Ok(svc.list_dungeons()));
    assert_eq!(env.body["success"], true);
    assert_eq!(env.body["dungeons"][0]["id"], DUNGEON);
    assert!(env.body["dungeons"][0].get("eventTable").is_none());
}
