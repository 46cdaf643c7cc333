mod common;

use chrono::{Duration, Utc};
use personal_notes::{ErrorKind, NewUser};
use sqlx::PgPool;

use common::{count, ctx, repository, seed_user};

#[sqlx::test(migrations = false, fixtures("schema"))]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn create_and_lookup_by_id_and_email(pool: PgPool) {
    let (repo, _) = repository(pool);
    let created = repo
        .users
        .create(&ctx(), NewUser::new("ann", "ann@example.com", "argon-hash"))
        .await
        .unwrap();
    assert!(created.id > 0);
    assert!(created.updated_at.is_none());
    assert!(created.last_login_at.is_none());

    let by_id = repo.users.get_by_id(&ctx(), created.id).await.unwrap();
    let by_email = repo
        .users
        .get_by_email(&ctx(), "ann@example.com")
        .await
        .unwrap();
    assert_eq!(by_id, created);
    assert_eq!(by_email, created);
    assert_eq!(by_email.password_hash, "argon-hash");
}

#[sqlx::test(migrations = false, fixtures("schema"))]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn unknown_lookups_are_not_found(pool: PgPool) {
    let (repo, _) = repository(pool);
    assert_eq!(
        repo.users.get_by_id(&ctx(), 404).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        repo.users
            .get_by_email(&ctx(), "ghost@example.com")
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
}

#[sqlx::test(migrations = false, fixtures("schema"))]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn duplicate_email_is_already_exists(pool: PgPool) {
    let (repo, logger) = repository(pool.clone());
    seed_user(&repo, "dup@example.com").await;

    let err = repo
        .users
        .create(&ctx(), NewUser::new("other", "dup@example.com", "h"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(count(&pool, "users").await, 1);

    let failure = &logger.at_level(tracing::Level::ERROR)[0];
    assert_eq!(failure.message, "fail[user]: already_exists");
}

#[sqlx::test(migrations = false, fixtures("schema"))]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn update_to_a_taken_email_is_already_exists(pool: PgPool) {
    let (repo, _) = repository(pool);
    seed_user(&repo, "taken@example.com").await;
    let mut user = seed_user(&repo, "free@example.com").await;

    user.email = "taken@example.com".into();
    let err = repo.users.update(&ctx(), &user).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[sqlx::test(migrations = false, fixtures("schema"))]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn update_changes_profile_and_stamps_updated_at(pool: PgPool) {
    let (repo, _) = repository(pool);
    let mut user = seed_user(&repo, "ann@example.com").await;

    user.name = "Ann".into();
    user.password_hash = "rotated-hash".into();
    let updated = repo.users.update(&ctx(), &user).await.unwrap();
    assert_eq!(updated.name, "Ann");
    assert_eq!(updated.password_hash, "rotated-hash");
    assert_eq!(updated.created_at, user.created_at);
    assert!(updated.updated_at.is_some());

    let mut ghost = updated.clone();
    ghost.id = 404;
    ghost.email = "ghost@example.com".into();
    assert_eq!(
        repo.users.update(&ctx(), &ghost).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[sqlx::test(migrations = false, fixtures("schema"))]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn last_login_touches_only_login_and_update_stamps(pool: PgPool) {
    let (repo, _) = repository(pool);
    let user = seed_user(&repo, "ann@example.com").await;
    let at = Utc::now() - Duration::minutes(5);

    repo.users
        .update_last_login_at(&ctx(), user.id, at)
        .await
        .unwrap();

    let after = repo.users.get_by_id(&ctx(), user.id).await.unwrap();
    assert_eq!(after.name, user.name);
    assert_eq!(after.email, user.email);
    assert_eq!(after.password_hash, user.password_hash);
    assert_eq!(after.created_at, user.created_at);
    assert!(after.updated_at.is_some());
    let stored = after.last_login_at.expect("last_login_at stored");
    assert!((stored - at).num_milliseconds().abs() < 1);
}

#[sqlx::test(migrations = false, fixtures("schema"))]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn last_login_for_missing_user_is_not_found_and_inserts_nothing(pool: PgPool) {
    let (repo, _) = repository(pool.clone());

    let err = repo
        .users
        .update_last_login_at(&ctx(), 404, Utc::now())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(count(&pool, "users").await, 0);
}

#[sqlx::test(migrations = false, fixtures("schema"))]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn delete_removes_user_and_their_notes(pool: PgPool) {
    let (repo, _) = repository(pool.clone());
    let user = seed_user(&repo, "ann@example.com").await;
    repo.notes
        .create(
            &ctx(),
            personal_notes::NewNote::new(user.id, "left behind", None),
        )
        .await
        .unwrap();

    repo.users.delete(&ctx(), user.id).await.unwrap();
    assert_eq!(count(&pool, "notes").await, 0);
    assert_eq!(
        repo.users.delete(&ctx(), user.id).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
}
