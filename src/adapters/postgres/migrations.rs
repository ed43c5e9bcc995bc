//! Postgres schema migration management.
//!
//! Migrations are embedded, versioned, and applied in order inside a
//! transaction each; the current version lives in `schema_migrations`.

use sqlx::PgPool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to execute migration {version}: {source}")]
    ExecutionError {
        version: i64,
        #[source]
        source: sqlx::Error,
    },
    #[error("Failed to get schema version: {0}")]
    VersionCheckError(#[source] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

pub struct Migrator {
    pool: PgPool,
}

impl Migrator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply all pending embedded migrations; returns how many ran.
    pub async fn run(&self) -> Result<usize, MigrationError> {
        self.ensure_migrations_table().await?;
        let current_version = self.get_current_version().await?;
        let pending: Vec<_> = embedded_migrations()
            .into_iter()
            .filter(|m| m.version > current_version)
            .collect();

        for migration in &pending {
            self.apply_migration(migration).await?;
        }

        Ok(pending.len())
    }

    async fn ensure_migrations_table(&self) -> Result<(), MigrationError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version BIGINT PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                description TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MigrationError::ExecutionError {
            version: 0,
            source: e,
        })?;
        Ok(())
    }

    async fn get_current_version(&self) -> Result<i64, MigrationError> {
        let row: (Option<i64>,) =
            sqlx::query_as("SELECT MAX(version) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await
                .map_err(MigrationError::VersionCheckError)?;
        Ok(row.0.unwrap_or(0))
    }

    async fn apply_migration(&self, migration: &Migration) -> Result<(), MigrationError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MigrationError::ExecutionError {
                version: migration.version,
                source: e,
            })?;

        sqlx::raw_sql(migration.sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| MigrationError::ExecutionError {
                version: migration.version,
                source: e,
            })?;

        sqlx::query("INSERT INTO schema_migrations (version, description) VALUES ($1, $2)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| MigrationError::ExecutionError {
                version: migration.version,
                source: e,
            })?;

        tx.commit()
            .await
            .map_err(|e| MigrationError::ExecutionError {
                version: migration.version,
                source: e,
            })?;

        tracing::info!(version = migration.version, "applied migration: {}", migration.description);
        Ok(())
    }
}

fn embedded_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "initial schema",
        sql: r#"
CREATE TABLE projects (
    id UUID PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    metadata JSONB NOT NULL DEFAULT '{}',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE sessions (
    id TEXT PRIMARY KEY,
    started_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    ended_at TIMESTAMPTZ
);
CREATE INDEX idx_sessions_open ON sessions (started_at) WHERE ended_at IS NULL;

CREATE TABLE requests (
    id UUID PRIMARY KEY,
    project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    session_id TEXT NOT NULL,
    prompt TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active'
        CHECK (status IN ('active', 'in_progress', 'completed', 'failed')),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    completed_at TIMESTAMPTZ
);
CREATE INDEX idx_requests_project ON requests (project_id);
CREATE INDEX idx_requests_session ON requests (session_id);

CREATE TABLE task_lists (
    id UUID PRIMARY KEY,
    request_id UUID NOT NULL REFERENCES requests(id) ON DELETE CASCADE,
    wave_number INTEGER NOT NULL CHECK (wave_number >= 0),
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'running', 'completed', 'failed')),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (request_id, wave_number)
);

CREATE TABLE subtasks (
    id UUID PRIMARY KEY,
    task_list_id UUID NOT NULL REFERENCES task_lists(id) ON DELETE CASCADE,
    description TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'running', 'paused', 'blocked', 'completed', 'failed')),
    agent_type TEXT,
    agent_id TEXT,
    priority INTEGER NOT NULL DEFAULT 5,
    retry_count INTEGER NOT NULL DEFAULT 0,
    blocked_by UUID[] NOT NULL DEFAULT '{}',
    parent_agent TEXT,
    batch_id UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    started_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    result JSONB
);
CREATE INDEX idx_subtasks_task_list ON subtasks (task_list_id);
CREATE INDEX idx_subtasks_status ON subtasks (status);
CREATE INDEX idx_subtasks_agent ON subtasks (agent_id) WHERE agent_id IS NOT NULL;

CREATE TABLE actions (
    id UUID PRIMARY KEY,
    subtask_id UUID NOT NULL REFERENCES subtasks(id) ON DELETE CASCADE,
    tool_name TEXT NOT NULL,
    tool_kind TEXT NOT NULL
        CHECK (tool_kind IN ('builtin', 'agent', 'skill', 'command', 'mcp')),
    input BYTEA,
    output BYTEA,
    exit_code INTEGER,
    duration_ms BIGINT,
    file_paths TEXT[] NOT NULL DEFAULT '{}',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX idx_actions_subtask ON actions (subtask_id);
CREATE INDEX idx_actions_created ON actions (created_at);

CREATE TABLE agent_messages (
    id UUID PRIMARY KEY,
    from_agent TEXT NOT NULL,
    to_agent TEXT,
    topic TEXT NOT NULL,
    content JSONB NOT NULL DEFAULT '{}',
    priority INTEGER NOT NULL DEFAULT 0 CHECK (priority BETWEEN 0 AND 10),
    read_by TEXT[] NOT NULL DEFAULT '{}',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    expires_at TIMESTAMPTZ
);
CREATE INDEX idx_messages_to_agent ON agent_messages (to_agent);
CREATE INDEX idx_messages_expires ON agent_messages (expires_at) WHERE expires_at IS NOT NULL;

CREATE TABLE agent_contexts (
    id UUID PRIMARY KEY,
    project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    agent_id TEXT NOT NULL,
    agent_type TEXT,
    role_context JSONB NOT NULL DEFAULT '{}',
    last_updated TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (project_id, agent_id)
);
CREATE INDEX idx_contexts_agent ON agent_contexts (agent_id);

CREATE TABLE orchestration_batches (
    id UUID PRIMARY KEY,
    session_id TEXT NOT NULL,
    wave_number INTEGER NOT NULL CHECK (wave_number >= 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    completed_at TIMESTAMPTZ,
    synthesis JSONB
);

CREATE TABLE wave_states (
    id UUID PRIMARY KEY,
    session_id TEXT NOT NULL,
    wave_number INTEGER NOT NULL CHECK (wave_number >= 0),
    total_tasks INTEGER NOT NULL DEFAULT 0,
    completed_tasks INTEGER NOT NULL DEFAULT 0,
    failed_tasks INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'running', 'completed', 'failed')),
    started_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    UNIQUE (session_id, wave_number),
    CHECK (completed_tasks + failed_tasks <= total_tasks)
);

CREATE TABLE agent_capacity (
    agent_id TEXT PRIMARY KEY,
    current_usage BIGINT NOT NULL DEFAULT 0,
    max_capacity BIGINT NOT NULL,
    zone TEXT NOT NULL DEFAULT 'green'
        CHECK (zone IN ('green', 'yellow', 'orange', 'red', 'critical')),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CHECK (current_usage <= max_capacity)
);

CREATE TABLE token_consumption (
    id UUID PRIMARY KEY,
    agent_id TEXT NOT NULL,
    session_id TEXT,
    action_id UUID REFERENCES actions(id) ON DELETE SET NULL,
    input_tokens BIGINT NOT NULL DEFAULT 0,
    output_tokens BIGINT NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX idx_tokens_agent ON token_consumption (agent_id);

CREATE TABLE keyword_tool_scores (
    id BIGSERIAL PRIMARY KEY,
    keyword TEXT NOT NULL,
    tool_name TEXT NOT NULL,
    tool_type TEXT,
    score DOUBLE PRECISION NOT NULL DEFAULT 1.0,
    usage_count BIGINT NOT NULL DEFAULT 0,
    success_count BIGINT NOT NULL DEFAULT 0,
    last_used TIMESTAMPTZ,
    UNIQUE (keyword, tool_name)
);

CREATE TABLE routing_feedback (
    id BIGSERIAL PRIMARY KEY,
    accepted BOOLEAN NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX idx_routing_feedback_created ON routing_feedback (created_at);

CREATE TABLE agent_registry (
    id UUID PRIMARY KEY,
    agent_type TEXT NOT NULL UNIQUE,
    category TEXT,
    allowed_tools TEXT[] NOT NULL DEFAULT '{}',
    forbidden_actions TEXT[] NOT NULL DEFAULT '{}',
    max_files INTEGER,
    wave_assignments INTEGER[] NOT NULL DEFAULT '{}',
    recommended_model TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE agent_blockings (
    id UUID PRIMARY KEY,
    blocker_agent TEXT NOT NULL,
    blocked_agent TEXT NOT NULL,
    reason TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    resolved_at TIMESTAMPTZ
);
CREATE INDEX idx_blockings_open ON agent_blockings (blocked_agent) WHERE resolved_at IS NULL;

CREATE TABLE topic_subscriptions (
    id UUID PRIMARY KEY,
    agent_id TEXT NOT NULL,
    channel TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (agent_id, channel)
);
"#,
    }]
}
