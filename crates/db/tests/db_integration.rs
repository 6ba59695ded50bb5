//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `kiezpoll_test`)
//!   `TEST_DB_PASSWORD` (default: `kiezpoll_test`)
//!
//! Each test creates and drops its own database.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::Utc;
use kiezpoll_common::{AppError, IdGenerator};
use kiezpoll_db::entities::{audience_category, poll, poll_option, user, user_membership, vote};
use kiezpoll_db::repositories::{
    AudienceRepository, MembershipRepository, PollOptionRepository, PollRepository,
    UserRepository, VoteRepository,
};
use kiezpoll_db::test_utils::TestDatabase;
use sea_orm::{DatabaseConnection, Set, TransactionTrait};

async fn connect() -> (TestDatabase, Arc<DatabaseConnection>) {
    let db = TestDatabase::create().await.expect("Failed to create test database");
    let conn = db.arc();
    (db, conn)
}

async fn create_user(conn: &Arc<DatabaseConnection>, name: &str) -> user::Model {
    let id_gen = IdGenerator::new();
    UserRepository::new(conn.clone())
        .create(user::ActiveModel {
            id: Set(id_gen.generate()),
            username: Set(name.to_string()),
            username_lower: Set(name.to_lowercase()),
            email: Set(format!("{}@example.com", name.to_lowercase())),
            password_hash: Set("x".to_string()),
            token: Set(None),
            postal_code: Set(None),
            is_admin: Set(false),
            created_at: Set(Utc::now().into()),
        })
        .await
        .unwrap()
}

async fn create_poll(conn: &Arc<DatabaseConnection>, texts: &[&str]) -> (poll::Model, Vec<String>) {
    let id_gen = IdGenerator::new();
    let poll = PollRepository::insert(
        conn.as_ref(),
        poll::ActiveModel {
            id: Set(id_gen.generate()),
            question: Set("Which one?".to_string()),
            is_visible: Set(true),
            option_one: Set(None),
            option_two: Set(None),
            option_three: Set(None),
            option_one_count: Set(0),
            option_two_count: Set(0),
            option_three_count: Set(0),
            created_at: Set(Utc::now().into()),
        },
    )
    .await
    .unwrap();

    let ids: Vec<String> = texts.iter().map(|_| id_gen.generate()).collect();
    let models = texts
        .iter()
        .zip(&ids)
        .enumerate()
        .map(|(i, (text, id))| poll_option::ActiveModel {
            id: Set(id.clone()),
            poll_id: Set(poll.id.clone()),
            text: Set((*text).to_string()),
            votes: Set(0),
            display_order: Set(i as i32),
        })
        .collect();
    PollOptionRepository::insert_many(conn.as_ref(), models)
        .await
        .unwrap();

    (poll, ids)
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_seeded_categories_exist() {
    let (db, conn) = connect().await;
    let repo = AudienceRepository::new(conn);

    let names: Vec<String> = repo
        .list_categories()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();

    for expected in ["State", "City", audience_category::BERLIN_BEZIRK, audience_category::BUNDESLAND] {
        assert!(names.iter().any(|n| n == expected), "missing {expected}");
    }

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_membership_upsert_replaces_within_category() {
    let (db, conn) = connect().await;
    let audience = AudienceRepository::new(conn.clone());
    let memberships = MembershipRepository::new(conn.clone());
    let category = audience.find_or_create_category("Bundesland").await.unwrap();
    let bayern = audience.find_or_create_option(&category.id, "Bayern").await.unwrap();
    let hessen = audience.find_or_create_option(&category.id, "Hessen").await.unwrap();
    let alice = create_user(&conn, "alice").await;
    let id_gen = IdGenerator::new();

    let membership = |option_id: &str| user_membership::ActiveModel {
        id: Set(id_gen.generate()),
        user_id: Set(alice.id.clone()),
        option_id: Set(option_id.to_string()),
        category_id: Set(category.id.clone()),
        created_at: Set(Utc::now().into()),
    };

    let first = memberships.upsert(membership(&bayern.id)).await.unwrap();
    let second = memberships.upsert(membership(&hessen.id)).await.unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.option_id, hessen.id);

    let rows = memberships.find_by_user(&alice.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].option_id, hessen.id);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_duplicate_username_is_conflict() {
    let (db, conn) = connect().await;
    create_user(&conn, "alice").await;

    let duplicate = UserRepository::new(conn.clone())
        .create(user::ActiveModel {
            id: Set(IdGenerator::new().generate()),
            username: Set("Alice".to_string()),
            username_lower: Set("alice".to_string()),
            email: Set("other@example.com".to_string()),
            password_hash: Set("x".to_string()),
            token: Set(None),
            postal_code: Set(None),
            is_admin: Set(false),
            created_at: Set(Utc::now().into()),
        })
        .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_second_vote_row_is_rejected() {
    let (db, conn) = connect().await;
    let alice = create_user(&conn, "alice").await;
    let (poll, options) = create_poll(&conn, &["Yes", "No"]).await;
    let id_gen = IdGenerator::new();

    let ballot = |option_id: &str| vote::ActiveModel {
        id: Set(id_gen.generate()),
        user_id: Set(alice.id.clone()),
        poll_id: Set(poll.id.clone()),
        option_id: Set(option_id.to_string()),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    };

    assert!(
        VoteRepository::insert_if_absent(conn.as_ref(), ballot(&options[0]))
            .await
            .unwrap()
    );
    assert!(
        !VoteRepository::insert_if_absent(conn.as_ref(), ballot(&options[1]))
            .await
            .unwrap()
    );

    let stored = VoteRepository::new(conn.clone())
        .find_by_user_and_poll(&alice.id, &poll.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.option_id, options[0]);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_increments_are_not_lost() {
    let (db, conn) = connect().await;
    let (poll, options) = create_poll(&conn, &["Yes", "No"]).await;
    let target = options[0].clone();

    let tasks = (0..20).map(|_| {
        let conn = conn.clone();
        let target = target.clone();
        tokio::spawn(async move {
            let txn = conn.begin().await.unwrap();
            PollOptionRepository::increment_votes(&txn, &target)
                .await
                .unwrap();
            txn.commit().await.unwrap();
        })
    });
    for result in futures::future::join_all(tasks).await {
        result.unwrap();
    }

    let rows = PollOptionRepository::new(conn.clone())
        .find_by_polls(&[poll.id.clone()])
        .await
        .unwrap();
    assert_eq!(rows[0].votes, 20);
    assert_eq!(rows[1].votes, 0);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_decrement_floors_at_zero() {
    let (db, conn) = connect().await;
    let (poll, options) = create_poll(&conn, &["Yes"]).await;

    PollOptionRepository::decrement_votes(conn.as_ref(), &options[0])
        .await
        .unwrap();

    let rows = PollOptionRepository::new(conn.clone())
        .find_by_poll(&poll.id)
        .await
        .unwrap();
    assert_eq!(rows[0].votes, 0);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_required_categories_follow_visible_targets() {
    let (db, conn) = connect().await;
    let audience = AudienceRepository::new(conn.clone());
    let polls = PollRepository::new(conn.clone());
    let category = audience.find_or_create_category("Bundesland").await.unwrap();
    let berlin = audience.find_or_create_option(&category.id, "Berlin").await.unwrap();
    let (poll, _) = create_poll(&conn, &["Yes", "No"]).await;

    assert!(polls.find_required_category_ids().await.unwrap().is_empty());

    PollRepository::insert_targets(
        conn.as_ref(),
        vec![kiezpoll_db::entities::poll_target::ActiveModel {
            id: Set(IdGenerator::new().generate()),
            poll_id: Set(poll.id.clone()),
            option_id: Set(berlin.id.clone()),
        }],
    )
    .await
    .unwrap();
    assert_eq!(
        polls.find_required_category_ids().await.unwrap(),
        vec![category.id.clone()]
    );

    let mut hidden: poll::ActiveModel = poll.into();
    hidden.is_visible = Set(false);
    polls.update(hidden).await.unwrap();
    assert!(polls.find_required_category_ids().await.unwrap().is_empty());

    db.drop_database().await.unwrap();
}
