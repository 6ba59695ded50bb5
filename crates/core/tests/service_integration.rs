//! Service-level tests against a real database.
//!
//! Run with: `cargo test -p kiezpoll-core --test service_integration -- --ignored`

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::Utc;
use kiezpoll_common::{AppError, IdGenerator};
use kiezpoll_core::{
    CreatePollInput, EligibilityService, GeoLookupService, MembershipService, PollService,
    RegisterInput, UserService, VoteLedger, VoteOutcome,
};
use kiezpoll_db::entities::user;
use kiezpoll_db::repositories::{
    AudienceRepository, MembershipRepository, PollOptionRepository, PollRepository,
    PostalMappingRepository, UserRepository, VoteRepository,
};
use kiezpoll_db::test_utils::TestDatabase;
use sea_orm::{DatabaseConnection, Set};

struct Services {
    users: UserService,
    polls: PollService,
    memberships: MembershipService,
    ledger: VoteLedger,
    membership_repo: MembershipRepository,
    audience_repo: AudienceRepository,
}

fn services(conn: &Arc<DatabaseConnection>) -> Services {
    let audience_repo = AudienceRepository::new(conn.clone());
    let poll_repo = PollRepository::new(conn.clone());
    let membership_repo = MembershipRepository::new(conn.clone());
    let polls = PollService::new(
        poll_repo.clone(),
        PollOptionRepository::new(conn.clone()),
        audience_repo.clone(),
    );
    let eligibility =
        EligibilityService::new(poll_repo, membership_repo.clone(), audience_repo.clone());
    let geo = GeoLookupService::with_default_chain(
        PostalMappingRepository::new(conn.clone()),
        audience_repo.clone(),
        None,
    );
    let memberships = MembershipService::new(membership_repo.clone(), audience_repo.clone(), geo);
    Services {
        users: UserService::new(UserRepository::new(conn.clone()), memberships.clone()),
        memberships,
        ledger: VoteLedger::new(VoteRepository::new(conn.clone()), polls.clone(), eligibility),
        polls,
        membership_repo,
        audience_repo,
    }
}

async fn create_user(conn: &Arc<DatabaseConnection>, name: &str) -> user::Model {
    UserRepository::new(conn.clone())
        .create(user::ActiveModel {
            id: Set(IdGenerator::new().generate()),
            username: Set(name.to_string()),
            username_lower: Set(name.to_lowercase()),
            email: Set(format!("{name}@example.com")),
            password_hash: Set("x".to_string()),
            token: Set(None),
            postal_code: Set(None),
            is_admin: Set(false),
            created_at: Set(Utc::now().into()),
        })
        .await
        .unwrap()
}

fn question(options: &[&str], targets: Vec<String>) -> CreatePollInput {
    CreatePollInput {
        question: "Mehr Bänke am Kanal?".to_string(),
        options: options.iter().map(|o| (*o).to_string()).collect(),
        target_option_ids: targets,
        is_visible: true,
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_first_votes_all_count() {
    let db = TestDatabase::create().await.unwrap();
    let conn = db.arc();
    let svc = services(&conn);
    let created = svc.polls.create_poll(question(&["Ja", "Nein"], vec![])).await.unwrap();
    let yes = created.options[0].id.clone();

    let mut users = Vec::new();
    for i in 0..16 {
        users.push(create_user(&conn, &format!("voter{i}")).await);
    }

    let tasks = users.iter().map(|u| {
        let ledger = svc.ledger.clone();
        let user_id = u.id.clone();
        let poll_id = created.poll.id.clone();
        let yes = yes.clone();
        tokio::spawn(async move { ledger.cast_vote(&user_id, &poll_id, &yes).await })
    });
    for result in futures::future::join_all(tasks).await {
        assert_eq!(result.unwrap().unwrap(), VoteOutcome::Created);
    }

    let results = svc.ledger.results(&created.poll.id).await.unwrap();
    assert_eq!(results.total, 16);
    assert_eq!(results.items[0].votes, 16);
    assert!((results.items[0].percent - 100.0).abs() < f64::EPSILON);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_same_user_racing_votes_counts_once() {
    let db = TestDatabase::create().await.unwrap();
    let conn = db.arc();
    let svc = services(&conn);
    let created = svc.polls.create_poll(question(&["Ja", "Nein"], vec![])).await.unwrap();
    let alice = create_user(&conn, "alice").await;

    let tasks = created.options.iter().cycle().take(8).map(|option| {
        let ledger = svc.ledger.clone();
        let user_id = alice.id.clone();
        let poll_id = created.poll.id.clone();
        let option_id = option.id.clone();
        tokio::spawn(async move { ledger.cast_vote(&user_id, &poll_id, &option_id).await })
    });
    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let results = svc.ledger.results(&created.poll.id).await.unwrap();
    assert_eq!(results.total, 1);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_vote_change_round_trip() {
    let db = TestDatabase::create().await.unwrap();
    let conn = db.arc();
    let svc = services(&conn);
    let created = svc.polls.create_poll(question(&["Ja", "Nein"], vec![])).await.unwrap();
    let (yes, no) = (created.options[0].id.clone(), created.options[1].id.clone());
    let alice = create_user(&conn, "alice").await;
    let poll_id = created.poll.id.clone();

    assert_eq!(svc.ledger.cast_vote(&alice.id, &poll_id, &yes).await.unwrap(), VoteOutcome::Created);
    assert_eq!(svc.ledger.cast_vote(&alice.id, &poll_id, &yes).await.unwrap(), VoteOutcome::Unchanged);
    assert_eq!(
        svc.ledger.cast_vote(&alice.id, &poll_id, &no).await.unwrap(),
        VoteOutcome::Changed {
            previous_option_id: yes.clone()
        }
    );
    svc.ledger.cast_vote(&alice.id, &poll_id, &yes).await.unwrap();

    let results = svc.ledger.results(&poll_id).await.unwrap();
    assert_eq!(results.total, 1);
    assert_eq!(results.items[0].votes, 1);
    assert_eq!(results.items[1].votes, 0);
    assert_eq!(svc.ledger.user_vote(&alice.id, &poll_id).await.unwrap(), Some(yes));

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_targeted_poll_requires_membership() {
    let db = TestDatabase::create().await.unwrap();
    let conn = db.arc();
    let svc = services(&conn);
    let category = svc.audience_repo.find_or_create_category("Bundesland").await.unwrap();
    let berlin = svc
        .audience_repo
        .find_or_create_option(&category.id, "Berlin")
        .await
        .unwrap();
    let created = svc
        .polls
        .create_poll(question(&["Ja", "Nein"], vec![berlin.id.clone()]))
        .await
        .unwrap();
    let alice = create_user(&conn, "alice").await;
    let yes = created.options[0].id.clone();

    let refused = svc.ledger.cast_vote(&alice.id, &created.poll.id, &yes).await;
    match refused {
        Err(AppError::EligibilityIncomplete { missing }) => {
            assert_eq!(missing, vec!["Bundesland".to_string()]);
        }
        other => panic!("expected eligibility error, got {other:?}"),
    }

    svc.memberships.set_membership(&alice.id, &berlin.id).await.unwrap();
    assert_eq!(
        svc.ledger.cast_vote(&alice.id, &created.poll.id, &yes).await.unwrap(),
        VoteOutcome::Created
    );

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_set_membership_replaces_within_category() {
    let db = TestDatabase::create().await.unwrap();
    let conn = db.arc();
    let svc = services(&conn);
    let category = svc.audience_repo.find_or_create_category("Bundesland").await.unwrap();
    let bayern = svc.audience_repo.find_or_create_option(&category.id, "Bayern").await.unwrap();
    let hessen = svc.audience_repo.find_or_create_option(&category.id, "Hessen").await.unwrap();
    let alice = create_user(&conn, "alice").await;

    svc.memberships.set_membership(&alice.id, &bayern.id).await.unwrap();
    svc.memberships.set_membership(&alice.id, &bayern.id).await.unwrap();
    svc.memberships.set_membership(&alice.id, &hessen.id).await.unwrap();

    let rows = svc.membership_repo.find_by_user(&alice.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].option_id, hessen.id);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_set_membership_last_writer_wins() {
    let db = TestDatabase::create().await.unwrap();
    let conn = db.arc();
    let svc = services(&conn);
    let category = svc.audience_repo.find_or_create_category("Bundesland").await.unwrap();
    let bayern = svc.audience_repo.find_or_create_option(&category.id, "Bayern").await.unwrap();
    let hessen = svc.audience_repo.find_or_create_option(&category.id, "Hessen").await.unwrap();
    let options = [bayern.id.clone(), hessen.id.clone()];

    let mut users = Vec::new();
    for i in 0..10 {
        users.push(create_user(&conn, &format!("mover{i}")).await);
    }

    let mut tasks = Vec::new();
    for u in &users {
        for option_id in options.iter().cycle().take(8) {
            let memberships = svc.memberships.clone();
            let user_id = u.id.clone();
            let option_id = option_id.clone();
            tasks.push(tokio::spawn(async move {
                memberships.set_membership(&user_id, &option_id).await
            }));
        }
    }
    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    for u in &users {
        let rows = svc.membership_repo.find_by_user(&u.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(options.contains(&rows[0].option_id));
    }

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_registrations_same_username() {
    let db = TestDatabase::create().await.unwrap();
    let conn = db.arc();
    let svc = services(&conn);

    let tasks = (0..6).map(|i| {
        let users = svc.users.clone();
        tokio::spawn(async move {
            users
                .register(RegisterInput {
                    username: "kiezfan".to_string(),
                    email: format!("fan{i}@example.com"),
                    password: "long enough".to_string(),
                    postal_code: None,
                })
                .await
        })
    });

    let mut registered = 0;
    for result in futures::future::join_all(tasks).await {
        match result.unwrap() {
            Ok(_) => registered += 1,
            Err(AppError::Conflict(_)) => {}
            Err(other) => panic!("expected conflict, got {other:?}"),
        }
    }
    assert_eq!(registered, 1);

    db.drop_database().await.unwrap();
}
