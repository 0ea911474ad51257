use axum::{extract::{Path, State}, routing::{get, post}, Router, Json};
use axum::http::StatusCode;
use serde::Serialize;

use crate::{
    application::todo_service::TodoService,
    domain::todo::{NewTodo, Todo, TodoId, UpdateTodo},
    http::types::{ApiError, ApiJson},
};

#[derive(Clone)]
pub struct AppState<S: TodoService> { pub service: S }

#[derive(Debug, Serialize)]
pub struct TodoList { pub items: Vec<Todo> }

pub fn router<S: TodoService + Clone + Send + Sync + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/todos", post(create_todo::<S>).get(list_todos::<S>))
        .route(
            "/todos/:id",
            get(get_todo::<S>).put(replace_todo::<S>).patch(update_todo::<S>).delete(delete_todo::<S>),
        )
        .with_state(state)
}

async fn create_todo<S: TodoService>(State(state): State<AppState<S>>, ApiJson(payload): ApiJson<NewTodo>) -> Result<(StatusCode, Json<Todo>), ApiError> {
    let todo = state.service.create(payload).await?;
    Ok((StatusCode::CREATED, Json(todo)))
}

async fn list_todos<S: TodoService>(State(state): State<AppState<S>>) -> Result<Json<TodoList>, ApiError> {
    let items = state.service.list().await?;
    Ok(Json(TodoList { items }))
}

async fn get_todo<S: TodoService>(State(state): State<AppState<S>>, Path(id): Path<String>) -> Result<Json<Todo>, ApiError> {
    let id = parse_id(&id)?;
    state.service.get(id).await?.map(Json).ok_or_else(ApiError::not_found)
}

async fn replace_todo<S: TodoService>(State(state): State<AppState<S>>, Path(id): Path<String>, ApiJson(payload): ApiJson<NewTodo>) -> Result<Json<Todo>, ApiError> {
    let id = parse_id(&id)?;
    state.service.replace(id, payload).await?.map(Json).ok_or_else(ApiError::not_found)
}

async fn update_todo<S: TodoService>(State(state): State<AppState<S>>, Path(id): Path<String>, ApiJson(payload): ApiJson<UpdateTodo>) -> Result<Json<Todo>, ApiError> {
    let id = parse_id(&id)?;
    state.service.update(id, payload).await?.map(Json).ok_or_else(ApiError::not_found)
}

async fn delete_todo<S: TodoService>(State(state): State<AppState<S>>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    if state.service.delete(id).await? { Ok(StatusCode::NO_CONTENT) } else { Err(ApiError::not_found()) }
}

fn parse_id(s: &str) -> Result<TodoId, ApiError> { s.parse::<i64>().map(TodoId).map_err(|_| ApiError::bad_request("invalid id")) }
