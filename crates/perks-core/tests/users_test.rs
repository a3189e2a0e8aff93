#![allow(clippy::unwrap_used)]
// Registration, login, balances and profile updates on every store.

mod common;

use std::collections::BTreeMap;

use secrecy::SecretString;

use perks_core::{
    Address, CoreError, LoginRequest, Perks, RegisterRequest, Store, UpdateUserRequest, UserId,
    UserStore,
};

fn login(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.into(),
        password: SecretString::from(password.to_owned()),
    }
}

// ── Scenarios ───────────────────────────────────────────────────────

async fn registered_user_starts_empty<S: Store>(perks: Perks<S>) {
    let user = common::register(&perks, "ann@example.com").await;

    let stored = perks.user(user.id).await.unwrap();
    assert_eq!(stored.email, "ann@example.com");
    assert_eq!(stored.points, 0);
    assert_eq!(stored.version, 1);
    assert!(stored.vouchers.is_empty());
    assert_eq!(stored.password_hash, "plain$pa55word");
}

async fn duplicate_email_is_rejected<S: Store>(perks: Perks<S>) {
    common::register(&perks, "dup@example.com").await;

    let err = perks
        .register(RegisterRequest {
            name: "Other".into(),
            email: "dup@example.com".into(),
            password: SecretString::from("another-pass".to_owned()),
        })
        .await
        .unwrap_err();
    assert_eq!(err, CoreError::DuplicateEmail);
}

async fn invalid_registration_reports_every_field<S: Store>(perks: Perks<S>) {
    let err = perks
        .register(RegisterRequest {
            name: String::new(),
            email: "not-an-email".into(),
            password: SecretString::from("short".to_owned()),
        })
        .await
        .unwrap_err();

    let fields = err.field_errors().unwrap();
    assert!(fields.contains_key("name"));
    assert!(fields.contains_key("email"));
    assert!(fields.contains_key("password"));
}

async fn login_issues_a_token_for_the_user<S: Store>(perks: Perks<S>) {
    let user = common::register(&perks, "tok@example.com").await;

    let (logged_in, token) = perks
        .login(login("tok@example.com", "pa55word"))
        .await
        .unwrap();
    assert_eq!(logged_in.id, user.id);
    assert!(token.expiry > chrono::Utc::now());

    let authenticated = perks.authenticate(&token.token).await.unwrap();
    assert_eq!(authenticated.id, user.id);
}

async fn bad_credentials_are_indistinguishable<S: Store>(perks: Perks<S>) {
    common::register(&perks, "who@example.com").await;

    let wrong_password = perks
        .login(login("who@example.com", "not-the-password"))
        .await
        .unwrap_err();
    let unknown_email = perks
        .login(login("nobody@example.com", "pa55word"))
        .await
        .unwrap_err();

    assert_eq!(wrong_password, CoreError::InvalidCredentials);
    assert_eq!(unknown_email, CoreError::InvalidCredentials);
}

async fn garbage_token_is_rejected<S: Store>(perks: Perks<S>) {
    let err = perks.authenticate("not.a.token").await.unwrap_err();
    assert_eq!(err, CoreError::InvalidToken);
}

async fn points_accumulate<S: Store>(perks: Perks<S>) {
    let user = common::register(&perks, "pts@example.com").await;

    perks.add_points(user.id, 100).await.unwrap();
    perks.add_points(user.id, 50).await.unwrap();
    assert_eq!(perks.points(user.id).await.unwrap(), 150);

    let err = perks.add_points(user.id, -1).await.unwrap_err();
    assert!(err.field_errors().unwrap().contains_key("points"));
}

async fn unknown_user_is_not_found<S: Store>(perks: Perks<S>) {
    let err = perks.add_points(UserId::new(), 10).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "user", .. }));
}

async fn profile_update_bumps_version<S: Store>(perks: Perks<S>) {
    let user = common::register(&perks, "edit@example.com").await;

    let updated = perks
        .update_user(
            user.id,
            UpdateUserRequest {
                name: Some("Renamed".into()),
                addresses: Some(vec![Address {
                    street: "Main St".into(),
                    number: "1".into(),
                    postal_code: 12345,
                    city: "Springfield".into(),
                }]),
                ..UpdateUserRequest::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.addresses.len(), 1);
    assert_eq!(updated.version, user.version + 1);
    assert_eq!(perks.user(user.id).await.unwrap(), updated);
}

async fn stale_profile_write_conflicts<S: Store>(perks: Perks<S>) {
    let user = common::register(&perks, "stale@example.com").await;
    perks.add_points(user.id, 10).await.unwrap();

    // `user` still carries the version read before the credit.
    let err = perks.store().update_user(&user).await.unwrap_err();
    assert_eq!(err, CoreError::EditConflict);
}

async fn email_change_respects_uniqueness<S: Store>(perks: Perks<S>) {
    common::register(&perks, "taken@example.com").await;
    let user = common::register(&perks, "mover@example.com").await;

    let err = perks
        .update_user(
            user.id,
            UpdateUserRequest {
                email: Some("taken@example.com".into()),
                ..UpdateUserRequest::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, CoreError::DuplicateEmail);

    perks
        .update_user(
            user.id,
            UpdateUserRequest {
                email: Some("moved@example.com".into()),
                ..UpdateUserRequest::default()
            },
        )
        .await
        .unwrap();
    let found = perks.store().user_by_email("moved@example.com").await.unwrap();
    assert_eq!(found.id, user.id);
    assert!(matches!(
        perks.store().user_by_email("mover@example.com").await,
        Err(CoreError::NotFound { .. })
    ));
}

async fn entitlement_map_replacement_is_versioned<S: Store>(perks: Perks<S>) {
    let user = common::register(&perks, "map@example.com").await;
    let map = BTreeMap::from([("ABC".to_owned(), 2)]);

    perks
        .store()
        .set_entitlements(user.id, user.version, &map)
        .await
        .unwrap();
    assert_eq!(perks.store().entitlements(user.id).await.unwrap(), map);

    let err = perks
        .store()
        .set_entitlements(user.id, user.version, &BTreeMap::new())
        .await
        .unwrap_err();
    assert_eq!(err, CoreError::EditConflict);
}

common::store_tests!(
    registered_user_starts_empty,
    duplicate_email_is_rejected,
    invalid_registration_reports_every_field,
    login_issues_a_token_for_the_user,
    bad_credentials_are_indistinguishable,
    garbage_token_is_rejected,
    points_accumulate,
    unknown_user_is_not_found,
    profile_update_bumps_version,
    stale_profile_write_conflicts,
    email_change_respects_uniqueness,
    entitlement_map_replacement_is_versioned,
);

// ── Default collaborators ───────────────────────────────────────────

#[tokio::test]
async fn argon2_backed_login_round_trips() {
    let perks = Perks::new(perks_core::MemoryStore::default(), common::config());
    let user = common::register(&perks, "argon@example.com").await;
    assert!(user.password_hash.starts_with("$argon2"));

    let (found, _) = perks
        .login(login("argon@example.com", "pa55word"))
        .await
        .unwrap();
    assert_eq!(found.id, user.id);
}

#[tokio::test]
async fn login_without_a_signing_secret_fails() {
    let perks = Perks::new(
        perks_core::MemoryStore::default(),
        perks_core::PerksConfig::default(),
    );
    common::register(&perks, "nosecret@example.com").await;

    let err = perks
        .login(login("nosecret@example.com", "pa55word"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Internal(_)));
}
