use crate::domain::error::ValidationError;
use crate::domain::repository::TodoRepository;
use crate::domain::todo::{NewTodo, Todo, TodoId, UpdateTodo};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait TodoService: Send + Sync + 'static {
    async fn create(&self, input: NewTodo) -> Result<Todo>;
    async fn get(&self, id: TodoId) -> Result<Option<Todo>>;
    async fn list(&self) -> Result<Vec<Todo>>;
    async fn update(&self, id: TodoId, input: UpdateTodo) -> Result<Option<Todo>>;
    /// Overwrites every mutable field. `id` and `created_at` are kept.
    async fn replace(&self, id: TodoId, input: NewTodo) -> Result<Option<Todo>>;
    async fn delete(&self, id: TodoId) -> Result<bool>;
}

#[derive(Clone)]
pub struct TodoServiceImpl<R: TodoRepository> {
    repo: R,
}

impl<R: TodoRepository> TodoServiceImpl<R> {
    pub fn new(repo: R) -> Self { Self { repo } }
}

fn log_rejection(err: &anyhow::Error) {
    if let Some(v) = err.downcast_ref::<ValidationError>() {
        tracing::warn!(error = %v, "todo rejected");
    }
}

#[async_trait]
impl<R: TodoRepository> TodoService for TodoServiceImpl<R> {
    async fn create(&self, input: NewTodo) -> Result<Todo> {
        let todo = self.repo.create(input).await.inspect_err(log_rejection)?;
        tracing::info!(id = %todo.id(), "todo created");
        Ok(todo)
    }

    async fn get(&self, id: TodoId) -> Result<Option<Todo>> { self.repo.get(id).await }

    async fn list(&self) -> Result<Vec<Todo>> { self.repo.list().await }

    async fn update(&self, id: TodoId, input: UpdateTodo) -> Result<Option<Todo>> {
        let updated = self.repo.update(id, input).await.inspect_err(log_rejection)?;
        if updated.is_some() { tracing::info!(%id, "todo updated"); }
        Ok(updated)
    }

    async fn replace(&self, id: TodoId, input: NewTodo) -> Result<Option<Todo>> {
        let update = UpdateTodo::replacing(input).map_err(anyhow::Error::from).inspect_err(log_rejection)?;
        self.update(id, update).await
    }

    async fn delete(&self, id: TodoId) -> Result<bool> {
        let deleted = self.repo.delete(id).await?;
        if deleted { tracing::info!(%id, "todo deleted"); }
        Ok(deleted)
    }
}
