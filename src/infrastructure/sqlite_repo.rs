use std::{fs, path::Path, str::FromStr, sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow}, Pool, Row, Sqlite};

use crate::domain::{
    repository::TodoRepository,
    todo::{NewTodo, Todo, TodoId, UpdateTodo},
};

const SELECT_TODO: &str =
    "SELECT id, todo_title, todo_description, todo_created_at, todo_due_at, todo_completed FROM todo";

#[derive(Clone)]
pub struct SqliteTodoRepository {
    pool: Arc<Pool<Sqlite>>,
}

impl SqliteTodoRepository {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = if is_in_memory(database_url) {
            // Every connection to an in-memory URL opens a fresh database, so
            // keep exactly one alive for the lifetime of the pool.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_with(options)
                .await?
        } else {
            ensure_parent_dir(database_url)?;
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };
        tracing::debug!(database_url, "connected to sqlite");
        Ok(Self { pool: Arc::new(pool) })
    }

    /// Stores the mutable fields of `todo`; id and todo_created_at are never
    /// rewritten. Returns false when no row has that id.
    async fn write(&self, todo: &Todo) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE todo SET todo_title = ?2, todo_description = ?3, todo_due_at = ?4, todo_completed = ?5
             WHERE id = ?1",
        )
        .bind(todo.id().0)
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.due_at)
        .bind(todo.completed)
        .execute(&*self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TodoRepository for SqliteTodoRepository {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS todo (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                todo_title TEXT NOT NULL,
                todo_description TEXT,
                todo_created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                todo_due_at TIMESTAMP,
                todo_completed BOOLEAN NOT NULL DEFAULT 0
            )",
        )
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    async fn create(&self, input: NewTodo) -> Result<Todo> {
        let record = input.prepare()?;
        let result = sqlx::query(
            "INSERT INTO todo (todo_title, todo_description, todo_created_at, todo_due_at, todo_completed)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.created_at)
        .bind(record.due_at)
        .bind(record.completed)
        .execute(&*self.pool)
        .await?;
        Ok(record.into_todo(TodoId(result.last_insert_rowid())))
    }

    async fn get(&self, id: TodoId) -> Result<Option<Todo>> {
        let row = sqlx::query(&format!("{SELECT_TODO} WHERE id = ?1"))
            .bind(id.0)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.map(row_to_todo).transpose()?)
    }

    async fn list(&self) -> Result<Vec<Todo>> {
        let rows = sqlx::query(&format!("{SELECT_TODO} ORDER BY id"))
            .fetch_all(&*self.pool)
            .await?;
        Ok(rows.into_iter().map(row_to_todo).collect::<Result<Vec<_>, sqlx::Error>>()?)
    }

    async fn update(&self, id: TodoId, input: UpdateTodo) -> Result<Option<Todo>> {
        let Some(mut todo) = self.get(id).await? else { return Ok(None) };
        todo.apply(input)?;
        // The row may have been deleted since it was read.
        if !self.write(&todo).await? { return Ok(None); }
        Ok(Some(todo))
    }

    async fn delete(&self, id: TodoId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM todo WHERE id = ?1")
            .bind(id.0)
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_todo(row: SqliteRow) -> Result<Todo, sqlx::Error> {
    Ok(Todo::restore(
        TodoId(row.try_get("id")?),
        row.try_get("todo_title")?,
        row.try_get("todo_description")?,
        row.try_get("todo_created_at")?,
        row.try_get("todo_due_at")?,
        row.try_get("todo_completed")?,
    ))
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Creates the directory holding a file-backed database.
pub fn ensure_parent_dir(database_url: &str) -> Result<()> {
    if is_in_memory(database_url) { return Ok(()); }
    let Some(path) = database_url.strip_prefix("sqlite://").or_else(|| database_url.strip_prefix("sqlite:")) else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    // On Windows, absolute paths may look like /C:/path; strip the leading slash
    let path = if cfg!(windows) && path.len() >= 3 && path.as_bytes()[0] == b'/' && path.as_bytes()[2] == b':' {
        &path[1..]
    } else {
        path
    };
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() { fs::create_dir_all(parent)?; }
    }
    Ok(())
}
