use crate::adapters::compatibility::{classify_backend_message, BackendErrorKind};
use crate::client::BeadsClient;
use crate::errors::{AppError, AppResult};
use crate::models::{CommandOutcome, LockCleanupResult, MigrationCheck, RefsMigrationCheck, RefsMigrationResult};

pub fn is_schema_migration_error(error: &AppError) -> bool {
    error.backend_kind() == BackendErrorKind::SchemaMigration
}

pub fn is_storage_engine_migration_error(error: &AppError) -> bool {
    error.backend_kind() == BackendErrorKind::StorageEngineMigration
}

pub fn is_schema_migration_message(message: &str) -> bool {
    classify_backend_message(message) == BackendErrorKind::SchemaMigration
}

pub fn is_storage_engine_migration_message(message: &str) -> bool {
    classify_backend_message(message) == BackendErrorKind::StorageEngineMigration
}

/// Proactive check for the desktop app. On the web there is nothing to probe,
/// so the answer is "no" with a reason instead of a capability error.
pub async fn needs_storage_engine_migration(client: &BeadsClient, cwd: Option<&str>) -> AppResult<MigrationCheck> {
    if !client.is_native() {
        return Ok(MigrationCheck {
            needs_migration: false,
            reason: Some("Storage checks run in the desktop app only".to_string()),
        });
    }
    let check = client.check_needs_migration(cwd).await?;
    if check.needs_migration {
        tracing::info!(
            project = cwd.unwrap_or_default(),
            reason = check.reason.as_deref().unwrap_or_default(),
            "project needs storage engine migration"
        );
    }
    Ok(check)
}

pub async fn repair_database(client: &BeadsClient, cwd: Option<&str>) -> AppResult<CommandOutcome> {
    client.repair_database(cwd).await
}

pub async fn migrate_to_new_engine(client: &BeadsClient, cwd: Option<&str>) -> AppResult<CommandOutcome> {
    client.migrate_to_dolt(cwd).await
}

pub async fn cleanup_stale_locks(client: &BeadsClient, cwd: Option<&str>) -> AppResult<LockCleanupResult> {
    client.cleanup_stale_locks(cwd).await
}

pub async fn check_refs_migration(client: &BeadsClient, cwd: Option<&str>) -> AppResult<RefsMigrationCheck> {
    client.check_refs_migration(cwd).await
}

pub async fn migrate_attachment_refs(client: &BeadsClient, cwd: Option<&str>) -> AppResult<RefsMigrationResult> {
    client.migrate_attachment_refs(cwd).await
}
