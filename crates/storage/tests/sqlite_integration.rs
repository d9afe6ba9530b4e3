use challenge_core::model::{
    ChallengeDraft, ExerciseDraft, Identity, NotificationKind, ParticipantStatus, UserId,
};
use challenge_core::time::{day, fixed_now};
use storage::repository::{
    ChallengeRepository, FriendshipRepository, NewChallengeRecord, NewNotificationRecord,
    NewUserRecord, NotificationRepository, ParticipantRepository, ProgressRepository, Storage,
    StorageError, UserRepository,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

async fn user(repo: &SqliteRepository, token: &str, name: &str) -> UserId {
    repo.insert_user(NewUserRecord::from_identity(
        &Identity::new(token).with_name(name),
    ))
    .await
    .unwrap()
}

fn draft(date: &str) -> ChallengeDraft {
    ChallengeDraft::new(
        "Morning Pump",
        day(date),
        vec![
            ExerciseDraft::new("Push-ups", 20),
            ExerciseDraft::new("Squats", 30),
        ],
    )
    .unwrap()
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = connect("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");
    assert!(repo.list_users().await.unwrap().is_empty());
}

#[tokio::test]
async fn users_round_trip_and_tokens_are_unique() {
    let repo = connect("memdb_users").await;
    let ana = user(&repo, "tok-ana", "Ana").await;

    let found = repo.find_user_by_token("tok-ana").await.unwrap().unwrap();
    assert_eq!(found.id(), ana);
    assert_eq!(found.name(), "Ana");

    let dup = repo
        .insert_user(NewUserRecord::from_identity(&Identity::new("tok-ana")))
        .await;
    assert!(matches!(dup, Err(StorageError::Conflict)));

    repo.update_user_profile(ana, "Ana B", Some("ana@example.com"))
        .await
        .unwrap();
    let updated = repo.get_user(ana).await.unwrap().unwrap();
    assert_eq!(updated.email(), Some("ana@example.com"));

    assert!(matches!(
        repo.update_user_profile(UserId::new(999), "x", None).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn challenge_bundle_persists_and_cascades() {
    let repo = connect("memdb_challenge_bundle").await;
    let ana = user(&repo, "tok-a", "Ana").await;
    let ben = user(&repo, "tok-b", "Ben").await;

    let created = repo
        .insert_challenge(NewChallengeRecord::from_draft(
            &draft("2024-01-10"),
            ana,
            &[ben],
        ))
        .await
        .unwrap();

    let challenge = repo
        .get_challenge(created.challenge_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(challenge.date(), day("2024-01-10"));
    assert_eq!(challenge.creator_id(), ana);

    let exercises = repo
        .exercises_for_challenge(created.challenge_id)
        .await
        .unwrap();
    assert_eq!(
        exercises.iter().map(|e| e.name()).collect::<Vec<_>>(),
        ["Push-ups", "Squats"]
    );

    let invited = repo
        .find_participant(created.challenge_id, ben)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(invited.status(), ParticipantStatus::Invited);
    repo.update_participant_status(invited.id(), ParticipantStatus::Active)
        .await
        .unwrap();

    repo.upsert_progress(exercises[0].id(), ben, created.challenge_id, 12)
        .await
        .unwrap();
    repo.upsert_progress(exercises[0].id(), ben, created.challenge_id, 25)
        .await
        .unwrap();
    let progress = repo
        .progress_for_user(created.challenge_id, ben)
        .await
        .unwrap();
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0].completed_reps, 25);

    repo.delete_challenge(created.challenge_id).await.unwrap();
    assert!(repo
        .get_challenge(created.challenge_id)
        .await
        .unwrap()
        .is_none());
    assert!(repo
        .progress_for_challenge(created.challenge_id)
        .await
        .unwrap()
        .is_empty());
    assert!(repo.participations_for_user(ben).await.unwrap().is_empty());
    assert!(repo
        .get_exercise(exercises[1].id())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn duplicate_participant_rolls_back_bundle() {
    let repo = connect("memdb_bundle_rollback").await;
    let ana = user(&repo, "tok-a", "Ana").await;

    let result = repo
        .insert_challenge(NewChallengeRecord::from_draft(
            &draft("2024-01-10"),
            ana,
            &[ana],
        ))
        .await;
    assert!(matches!(result, Err(StorageError::Conflict)));
    assert!(repo.participations_for_user(ana).await.unwrap().is_empty());
}

#[tokio::test]
async fn friend_request_acceptance_is_symmetric() {
    let repo = connect("memdb_friends").await;
    let ana = user(&repo, "tok-a", "Ana").await;
    let ben = user(&repo, "tok-b", "Ben").await;

    let request = repo.insert_friend_request(ana, ben, fixed_now()).await.unwrap();
    assert_eq!(repo.requests_to(ben).await.unwrap().len(), 1);
    assert!(matches!(
        repo.insert_friend_request(ana, ben, fixed_now()).await,
        Err(StorageError::Conflict)
    ));

    repo.accept_friend_request(request).await.unwrap();
    assert!(repo.requests_from(ana).await.unwrap().is_empty());
    assert_eq!(repo.friendships_for_user(ana).await.unwrap().len(), 1);
    assert_eq!(repo.friendships_for_user(ben).await.unwrap().len(), 1);

    assert!(matches!(
        repo.accept_friend_request(request).await,
        Err(StorageError::NotFound)
    ));

    assert_eq!(repo.delete_friendship_pair(ana, ben).await.unwrap(), 2);
    assert!(repo.find_friendship(ben, ana).await.unwrap().is_none());
}

#[tokio::test]
async fn notifications_order_and_unread_counts() {
    let repo = connect("memdb_notifications").await;
    let ana = user(&repo, "tok-a", "Ana").await;

    for minutes in [0, 5] {
        repo.insert_notification(NewNotificationRecord {
            user_id: ana,
            message: format!("at +{minutes}"),
            kind: NotificationKind::ChallengeInvitation,
            related_id: Some("7".into()),
            created_at: fixed_now() + chrono::Duration::minutes(minutes),
        })
        .await
        .unwrap();
    }

    let listed = repo.notifications_for_user(ana).await.unwrap();
    assert_eq!(listed[0].message, "at +5");
    assert_eq!(listed[0].kind, NotificationKind::ChallengeInvitation);
    assert_eq!(listed[0].related_id.as_deref(), Some("7"));
    assert_eq!(repo.unread_count(ana).await.unwrap(), 2);

    repo.mark_read(listed[1].id).await.unwrap();
    assert_eq!(repo.unread_count(ana).await.unwrap(), 1);
    assert_eq!(repo.mark_all_read(ana).await.unwrap(), 1);

    repo.delete_notification(listed[0].id).await.unwrap();
    assert_eq!(repo.delete_all_for_user(ana).await.unwrap(), 1);
}

#[tokio::test]
async fn storage_facade_shares_one_sqlite_backend() {
    let storage = Storage::sqlite("sqlite:file:memdb_facade?mode=memory&cache=shared")
        .await
        .expect("storage");
    let ana = storage
        .users
        .insert_user(NewUserRecord::from_identity(&Identity::new("tok-a")))
        .await
        .unwrap();
    let created = storage
        .challenges
        .insert_challenge(NewChallengeRecord::from_draft(
            &draft("2024-02-01"),
            ana,
            &[],
        ))
        .await
        .unwrap();
    let rows = storage
        .participants
        .participants_for_challenge(created.challenge_id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status(), ParticipantStatus::Active);

    let cleared = storage.challenges.clear_all_challenges().await.unwrap();
    assert_eq!(cleared.challenges, 1);
    assert_eq!(cleared.exercises, 2);
}
