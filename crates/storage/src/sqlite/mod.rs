use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use snafu::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Connection, FromRow, SqliteConnection};

use super::error::{
    CreateSqliteDirectorySnafu, InvariantViolationSnafu, SqliteConnectOptionsSnafu,
    SqliteConnectSnafu, SqliteMigrateSnafu, SqlitePragmaSnafu, SqliteQuerySnafu,
    SqliteRuntimeInitSnafu, SqliteThreadSpawnSnafu, StorageResult,
};
use super::types::{DraftRecord, unix_timestamp_seconds};
use super::DraftStore;

#[derive(Debug, Clone)]
pub struct SqliteDraftStore {
    database_url: String,
}

impl SqliteDraftStore {
    /// Opens (creating if needed) the database at `database_location` and applies migrations.
    ///
    /// Accepts a filesystem path or a `sqlite:` URL. Every store call opens its own
    /// connection, so `:memory:` databases do not keep drafts between calls.
    pub async fn open(database_location: &str) -> StorageResult<Self> {
        ensure_database_directory(database_location)?;

        let database_url = normalize_database_url(database_location);
        let connect_options = SqliteConnectOptions::from_str(&database_url)
            .context(SqliteConnectOptionsSnafu {
                stage: "sqlite-open-parse-url",
                database_url: database_url.clone(),
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(5_000));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await
            .context(SqliteConnectSnafu {
                stage: "sqlite-open-connect",
                database_url: database_url.clone(),
            })?;

        let _: String = sqlx::query_scalar("PRAGMA journal_mode = WAL;")
            .fetch_one(&pool)
            .await
            .context(SqlitePragmaSnafu {
                stage: "sqlite-open-pragma-journal-mode",
                pragma: "journal_mode",
            })?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context(SqliteMigrateSnafu {
                stage: "sqlite-open-migrate",
            })?;

        // Store calls open their own connections on worker threads.
        pool.close().await;

        tracing::info!(database_url = %database_url, "opened draft store");
        Ok(Self { database_url })
    }

    fn run_db_call<T, F>(&self, stage: &'static str, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: Future<Output = StorageResult<T>> + Send + 'static,
    {
        // Store traits are sync, so each call executes on a dedicated worker thread
        // with its own current-thread runtime to avoid nested-runtime blocking panics.
        let worker = std::thread::Builder::new()
            .name(format!("sqlite-drafts-{stage}"))
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .context(SqliteRuntimeInitSnafu {
                        stage: "sqlite-drafts-runtime-build",
                    })?;
                runtime.block_on(op)
            })
            .context(SqliteThreadSpawnSnafu {
                stage: "sqlite-drafts-spawn-worker",
            })?;

        match worker.join() {
            Ok(result) => result,
            Err(_) => InvariantViolationSnafu {
                stage,
                details: "sqlite draft worker thread panicked".to_string(),
            }
            .fail(),
        }
    }
}

impl DraftStore for SqliteDraftStore {
    fn save_draft(&self, conversation_id: &str, text: &str) -> StorageResult<()> {
        if text.is_empty() {
            return self.clear_draft(conversation_id);
        }

        let database_url = self.database_url.clone();
        let conversation_id = conversation_id.to_string();
        let text = text.to_string();
        self.run_db_call("draft-save", async move {
            let mut connection = connect_store_connection(&database_url, "draft-save-connect").await?;

            sqlx::query(
                "INSERT INTO drafts (conversation_id, body, updated_at) VALUES (?, ?, ?) \
                 ON CONFLICT(conversation_id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            )
            .bind(conversation_id)
            .bind(text)
            .bind(unix_timestamp_seconds())
            .execute(&mut connection)
            .await
            .context(SqliteQuerySnafu {
                stage: "draft-save-upsert",
            })?;

            Ok(())
        })
    }

    fn load_draft(&self, conversation_id: &str) -> StorageResult<Option<String>> {
        let database_url = self.database_url.clone();
        let conversation_id = conversation_id.to_string();
        self.run_db_call("draft-load", async move {
            let mut connection = connect_store_connection(&database_url, "draft-load-connect").await?;

            sqlx::query_scalar::<_, String>("SELECT body FROM drafts WHERE conversation_id = ?")
                .bind(conversation_id)
                .fetch_optional(&mut connection)
                .await
                .context(SqliteQuerySnafu {
                    stage: "draft-load-select",
                })
        })
    }

    fn clear_draft(&self, conversation_id: &str) -> StorageResult<()> {
        let database_url = self.database_url.clone();
        let conversation_id = conversation_id.to_string();
        self.run_db_call("draft-clear", async move {
            let mut connection = connect_store_connection(&database_url, "draft-clear-connect").await?;

            sqlx::query("DELETE FROM drafts WHERE conversation_id = ?")
                .bind(conversation_id)
                .execute(&mut connection)
                .await
                .context(SqliteQuerySnafu {
                    stage: "draft-clear-delete",
                })?;

            Ok(())
        })
    }

    fn list_drafts(&self) -> StorageResult<Vec<DraftRecord>> {
        let database_url = self.database_url.clone();
        self.run_db_call("draft-list", async move {
            let mut connection = connect_store_connection(&database_url, "draft-list-connect").await?;

            let rows = sqlx::query_as::<_, DraftRow>(
                "SELECT conversation_id, body, updated_at FROM drafts ORDER BY updated_at DESC, conversation_id ASC",
            )
            .fetch_all(&mut connection)
            .await
            .context(SqliteQuerySnafu {
                stage: "draft-list-select",
            })?;

            rows.into_iter().map(draft_record_from_row).collect()
        })
    }
}

#[derive(Debug, FromRow)]
struct DraftRow {
    conversation_id: String,
    body: String,
    updated_at: i64,
}

fn draft_record_from_row(row: DraftRow) -> StorageResult<DraftRecord> {
    Ok(DraftRecord {
        conversation_id: row.conversation_id,
        text: row.body,
        updated_at_unix_seconds: i64_to_u64(row.updated_at, "draft-row-updated-at")?,
    })
}

fn i64_to_u64(value: i64, stage: &'static str) -> StorageResult<u64> {
    value
        .try_into()
        .map_err(|_| super::error::StorageError::InvariantViolation {
            stage,
            details: format!("negative sqlite integer '{value}' cannot map to u64"),
        })
}

async fn connect_store_connection(
    database_url: &str,
    stage: &'static str,
) -> StorageResult<SqliteConnection> {
    let mut connection =
        SqliteConnection::connect(database_url)
            .await
            .context(SqliteConnectSnafu {
                stage,
                database_url: database_url.to_string(),
            })?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(&mut connection)
        .await
        .context(SqlitePragmaSnafu {
            stage: "sqlite-drafts-pragma-busy-timeout",
            pragma: "busy_timeout",
        })?;

    Ok(connection)
}

fn ensure_database_directory(database_location: &str) -> StorageResult<()> {
    if database_location.starts_with("sqlite:") || database_location == ":memory:" {
        return Ok(());
    }

    let path = Path::new(database_location);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context(CreateSqliteDirectorySnafu {
            stage: "sqlite-open-create-directory",
            path: parent.display().to_string(),
        })?;
    }

    Ok(())
}

fn normalize_database_url(database_location: &str) -> String {
    if database_location.starts_with("sqlite:") {
        return database_location.to_string();
    }

    if database_location == ":memory:" {
        return "sqlite::memory:".to_string();
    }

    format!("sqlite://{database_location}")
}
