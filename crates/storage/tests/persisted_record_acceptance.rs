use storage::{KeyValueStore, Storage};

#[tokio::test]
async fn record_survives_reopening_the_data_dir() {
    let temp_root = tempfile::tempdir().expect("tempdir");

    let storage = Storage::open_in_dir(temp_root.path()).await.expect("open");
    storage
        .set("currentUser", r#"{"user_id":"u1","username":"player1"}"#)
        .await
        .expect("set");
    storage.pool().close().await;

    let reopened = Storage::open_in_dir(temp_root.path())
        .await
        .expect("reopen");
    let value = reopened.get("currentUser").await.expect("get");
    assert_eq!(
        value.as_deref(),
        Some(r#"{"user_id":"u1","username":"player1"}"#)
    );

    reopened.remove("currentUser").await.expect("remove");
    reopened.pool().close().await;

    let cleared = Storage::open_in_dir(temp_root.path()).await.expect("reopen");
    assert_eq!(cleared.get("currentUser").await.expect("get"), None);
}
