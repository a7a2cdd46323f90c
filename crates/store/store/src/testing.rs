use std::io::Write;

use crate::error::StoreError;
use crate::store::ArtifactStore;

const MISSING_FOLDER: &str = "pgvault-conformance-missing-folder";

fn scratch_file(contents: &[u8]) -> Result<tempfile::NamedTempFile, StoreError> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(contents)?;
    file.flush()?;
    Ok(file)
}

/// Run the full artifact store conformance test suite.
///
/// `folder` must already exist in the backend and should be empty; the suite
/// deletes everything it uploads.
///
/// # Errors
///
/// Returns an error if any conformance test fails.
pub async fn run_store_conformance_tests(
    store: &dyn ArtifactStore,
    folder: &str,
) -> Result<(), StoreError> {
    test_ensure_folder(store, folder).await?;
    test_upload_into_missing_folder(store).await?;
    test_upload_and_metadata(store, folder).await?;
    test_list_newest_first_with_prefix(store, folder).await?;
    test_download_round_trip(store, folder).await?;
    test_delete_is_idempotent(store, folder).await?;
    test_missing_artifact(store).await?;
    Ok(())
}

async fn test_ensure_folder(store: &dyn ArtifactStore, folder: &str) -> Result<(), StoreError> {
    store.ensure_folder(folder).await?;
    let err = store.ensure_folder(MISSING_FOLDER).await.unwrap_err();
    assert!(
        matches!(err, StoreError::FolderNotFound(_)),
        "ensure_folder on a missing folder should return FolderNotFound, got {err:?}"
    );
    Ok(())
}

async fn test_upload_into_missing_folder(store: &dyn ArtifactStore) -> Result<(), StoreError> {
    let file = scratch_file(b"x")?;
    let err = store
        .upload(MISSING_FOLDER, "backup_T_20240101T000000.sql", file.path())
        .await
        .unwrap_err();
    assert!(
        matches!(err, StoreError::FolderNotFound(_)),
        "upload into a missing folder should return FolderNotFound, got {err:?}"
    );
    Ok(())
}

async fn test_upload_and_metadata(store: &dyn ArtifactStore, folder: &str) -> Result<(), StoreError> {
    let file = scratch_file(b"COPY public.t (id) FROM stdin;\n1\n\\.\n")?;
    let name = "conf_meta_20240101T000000.sql";
    let artifact = store.upload(folder, name, file.path()).await?;
    assert_eq!(artifact.name, name);
    assert_eq!(artifact.folder, folder);

    let fetched = store.metadata(&artifact.id).await?;
    assert_eq!(fetched.id, artifact.id);
    assert_eq!(fetched.name, name);
    assert_eq!(fetched.folder, folder);

    store.delete(&artifact.id).await?;
    Ok(())
}

async fn test_list_newest_first_with_prefix(
    store: &dyn ArtifactStore,
    folder: &str,
) -> Result<(), StoreError> {
    let file = scratch_file(b"data")?;
    let first = store
        .upload(folder, "conf_list_20240101T000000.sql", file.path())
        .await?;
    let second = store
        .upload(folder, "conf_list_20240102T000000.sql", file.path())
        .await?;
    let other = store
        .upload(folder, "other_20240101T000000.sql", file.path())
        .await?;

    let listed = store.list(folder, "conf_list_").await?;
    assert_eq!(listed.len(), 2, "prefix filter should exclude other names");
    assert!(
        listed
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at),
        "list should be ordered newest first"
    );
    assert!(listed.iter().all(|a| a.name.starts_with("conf_list_")));

    for id in [&first.id, &second.id, &other.id] {
        store.delete(id).await?;
    }
    assert!(store.list(folder, "conf_list_").await?.is_empty());
    Ok(())
}

async fn test_download_round_trip(store: &dyn ArtifactStore, folder: &str) -> Result<(), StoreError> {
    let payload = b"COPY inventory.person (id, name) FROM stdin;\n1\tAlice\n\\.\n";
    let file = scratch_file(payload)?;
    let artifact = store
        .upload(folder, "conf_dl_20240101T000000.sql", file.path())
        .await?;

    let dir = tempfile::tempdir()?;
    let dest = dir.path().join("restore.sql");
    let written = store.download(&artifact.id, &dest).await?;
    assert_eq!(written, payload.len() as u64);
    let contents = tokio::fs::read(&dest).await?;
    assert_eq!(contents, payload);

    store.delete(&artifact.id).await?;
    Ok(())
}

async fn test_delete_is_idempotent(store: &dyn ArtifactStore, folder: &str) -> Result<(), StoreError> {
    let file = scratch_file(b"bye")?;
    let artifact = store
        .upload(folder, "conf_del_20240101T000000.sql", file.path())
        .await?;
    store.delete(&artifact.id).await?;
    let err = store.metadata(&artifact.id).await.unwrap_err();
    assert!(err.is_not_found(), "metadata after delete should be NotFound");

    store.delete(&artifact.id).await?;
    Ok(())
}

async fn test_missing_artifact(store: &dyn ArtifactStore) -> Result<(), StoreError> {
    let dir = tempfile::tempdir()?;
    let err = store
        .download("pgvault-conformance-missing-id", &dir.path().join("x"))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "download of a missing id should be NotFound");
    Ok(())
}
