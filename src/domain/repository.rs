use async_trait::async_trait;
use super::todo::{NewTodo, Todo, TodoId, UpdateTodo};

/// Storage access for todos.
///
/// `create` must call [`NewTodo::prepare`] before writing, so validation and
/// the creation timestamp hook run exactly once, before the insert.
#[async_trait]
pub trait TodoRepository: Send + Sync + 'static {
    async fn init(&self) -> anyhow::Result<()>;
    async fn create(&self, input: NewTodo) -> anyhow::Result<Todo>;
    async fn get(&self, id: TodoId) -> anyhow::Result<Option<Todo>>;
    async fn list(&self) -> anyhow::Result<Vec<Todo>>;
    async fn update(&self, id: TodoId, input: UpdateTodo) -> anyhow::Result<Option<Todo>>;
    async fn delete(&self, id: TodoId) -> anyhow::Result<bool>;
}
