use std::fmt;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::error::ValidationError;

/// Storage-assigned identifier. Never chosen by the application.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TodoId(pub i64);

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Current wall-clock time. Timestamps are naive and always hold UTC.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn validate_title(title: Option<&str>) -> Result<&str, ValidationError> {
    match title {
        Some(t) if !t.trim().is_empty() => Ok(t),
        _ => Err(ValidationError::BlankTitle),
    }
}

/// A todo that has not been written to storage yet.
///
/// Every field may be left unset; `NewTodo::default()` is the empty record.
/// There is no `id` field: an `id` key in an incoming body is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NewTodo {
    #[serde(rename = "todo_title")]
    pub title: Option<String>,
    #[serde(rename = "todo_description")]
    pub description: Option<String>,
    #[serde(rename = "todo_created_at")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(rename = "todo_due_at")]
    pub due_at: Option<NaiveDateTime>,
    #[serde(rename = "todo_completed")]
    pub completed: bool,
}

impl NewTodo {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: Some(title.into()), ..Self::default() }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_created_at(mut self, created_at: NaiveDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_due_at(mut self, due_at: NaiveDateTime) -> Self {
        self.due_at = Some(due_at);
        self
    }

    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(self.title.as_deref()).map(|_| ())
    }

    /// Pre-persistence hook: stamps `created_at` with the current time unless
    /// the caller already supplied one.
    pub fn on_create(&mut self) {
        if self.created_at.is_none() {
            self.created_at = Some(now());
        }
    }

    /// Validates the record and runs [`NewTodo::on_create`]. Storage layers call
    /// this right before their insert and write nothing if it fails.
    pub fn prepare(mut self) -> Result<InsertTodo, ValidationError> {
        self.validate()?;
        self.on_create();
        let (Some(title), Some(created_at)) = (self.title, self.created_at) else {
            return Err(ValidationError::BlankTitle);
        };
        Ok(InsertTodo {
            title,
            description: self.description,
            created_at,
            due_at: self.due_at,
            completed: self.completed,
        })
    }
}

/// A validated record with its creation time fixed, waiting for an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertTodo {
    pub title: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub due_at: Option<NaiveDateTime>,
    pub completed: bool,
}

impl InsertTodo {
    pub fn into_todo(self, id: TodoId) -> Todo {
        Todo {
            id,
            title: self.title,
            description: self.description,
            created_at: self.created_at,
            due_at: self.due_at,
            completed: self.completed,
        }
    }
}

/// A persisted todo. `id` and `created_at` are fixed once stored and only
/// readable from here on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    id: TodoId,
    #[serde(rename = "todo_title")]
    pub title: String,
    #[serde(rename = "todo_description")]
    pub description: Option<String>,
    #[serde(rename = "todo_created_at")]
    created_at: NaiveDateTime,
    #[serde(rename = "todo_due_at")]
    pub due_at: Option<NaiveDateTime>,
    #[serde(rename = "todo_completed")]
    pub completed: bool,
}

impl Todo {
    pub(crate) fn restore(
        id: TodoId,
        title: String,
        description: Option<String>,
        created_at: NaiveDateTime,
        due_at: Option<NaiveDateTime>,
        completed: bool,
    ) -> Self {
        Self { id, title, description, created_at, due_at, completed }
    }

    pub fn id(&self) -> TodoId {
        self.id
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    /// Applies a change set. Nothing is modified when validation fails.
    pub fn apply(&mut self, update: UpdateTodo) -> Result<(), ValidationError> {
        if let Some(title) = update.title.as_deref() {
            validate_title(Some(title))?;
        }
        if let Some(t) = update.title { self.title = t; }
        if let Some(d) = update.description { self.description = d; }
        if let Some(d) = update.due_at { self.due_at = d; }
        if let Some(c) = update.completed { self.completed = c; }
        Ok(())
    }
}

// Distinguishes an explicit `null` (Some(None)) from an absent key (None).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial change set for a persisted todo. `None` leaves a field untouched;
/// `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct UpdateTodo {
    #[serde(rename = "todo_title", default)]
    pub title: Option<String>,
    #[serde(rename = "todo_description", default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(rename = "todo_due_at", default, deserialize_with = "double_option")]
    pub due_at: Option<Option<NaiveDateTime>>,
    #[serde(rename = "todo_completed", default)]
    pub completed: Option<bool>,
}

impl UpdateTodo {
    /// Builds a change set that overwrites every mutable field with the values
    /// of `record`. Its `created_at` is ignored.
    pub fn replacing(record: NewTodo) -> Result<Self, ValidationError> {
        record.validate()?;
        Ok(Self {
            title: record.title,
            description: Some(record.description),
            due_at: Some(record.due_at),
            completed: Some(record.completed),
        })
    }

    pub fn completed(completed: bool) -> Self {
        Self { completed: Some(completed), ..Self::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::TODO_FIELDS;
    use chrono::{NaiveDate, TimeDelta};
    use serde_json::json;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn defaults_are_explicit() {
        let todo = NewTodo::new("Write report");
        assert_eq!(todo.description, None);
        assert_eq!(todo.created_at, None);
        assert_eq!(todo.due_at, None);
        assert!(!todo.completed);
        assert_eq!(NewTodo::default().title, None);
    }

    #[test]
    fn on_create_stamps_missing_created_at() {
        let mut todo = NewTodo::new("x");
        todo.on_create();
        let stamped = todo.created_at.unwrap();
        assert!((now() - stamped).abs() < TimeDelta::seconds(5));
    }

    #[test]
    fn on_create_keeps_supplied_created_at() {
        let mut todo = NewTodo::new("x").with_created_at(at(2020, 5, 1));
        todo.on_create();
        todo.on_create();
        assert_eq!(todo.created_at, Some(at(2020, 5, 1)));
    }

    #[test]
    fn blank_or_missing_title_is_rejected() {
        for title in ["", "   ", "\t\n"] {
            assert_eq!(NewTodo::new(title).prepare(), Err(ValidationError::BlankTitle));
        }
        assert_eq!(NewTodo::default().prepare(), Err(ValidationError::BlankTitle));
        assert_eq!(ValidationError::BlankTitle.to_string(), "blank title");
    }

    #[test]
    fn prepare_fixes_created_at() {
        let prepared = NewTodo::new("Write report").with_due_at(at(2025, 1, 10)).prepare().unwrap();
        assert_eq!(prepared.title, "Write report");
        assert_eq!(prepared.due_at, Some(at(2025, 1, 10)));
        assert!((now() - prepared.created_at).abs() < TimeDelta::seconds(5));
    }

    #[test]
    fn serializes_with_wire_names() {
        let todo = NewTodo::new("Buy milk").with_created_at(at(2024, 3, 1)).prepare().unwrap().into_todo(TodoId(7));
        let value = serde_json::to_value(&todo).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 7,
                "todo_title": "Buy milk",
                "todo_description": null,
                "todo_created_at": "2024-03-01T00:00:00",
                "todo_due_at": null,
                "todo_completed": false,
            })
        );
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        let mut expected: Vec<_> = TODO_FIELDS.iter().map(|f| f.wire.to_string()).collect();
        keys.sort();
        expected.sort();
        assert_eq!(keys, expected);

        let back: Todo = serde_json::from_value(value).unwrap();
        assert_eq!(back, todo);
    }

    #[test]
    fn incoming_id_is_ignored() {
        let body = json!({ "id": 99, "todo_title": "x", "todo_due_at": "2025-01-10T00:00:00" });
        let todo: NewTodo = serde_json::from_value(body).unwrap();
        assert_eq!(todo, NewTodo::new("x").with_due_at(at(2025, 1, 10)));
    }

    #[test]
    fn update_distinguishes_null_from_absent() {
        let update: UpdateTodo = serde_json::from_value(json!({ "todo_description": null })).unwrap();
        assert_eq!(update.description, Some(None));
        assert_eq!(update.due_at, None);
        assert_eq!(update.title, None);
    }

    #[test]
    fn apply_rejects_blank_title_without_side_effects() {
        let mut todo = NewTodo::new("keep").prepare().unwrap().into_todo(TodoId(1));
        let before = todo.clone();
        let update = UpdateTodo { title: Some(" ".into()), completed: Some(true), ..UpdateTodo::default() };
        assert_eq!(todo.apply(update), Err(ValidationError::BlankTitle));
        assert_eq!(todo, before);
    }

    #[test]
    fn replacing_overwrites_nullable_fields() {
        let mut todo = NewTodo::new("a").with_description("d").with_due_at(at(2025, 1, 1)).prepare().unwrap().into_todo(TodoId(1));
        let created = todo.created_at();
        let update = UpdateTodo::replacing(NewTodo::new("b").with_created_at(at(1999, 1, 1)).with_completed(true)).unwrap();
        todo.apply(update).unwrap();
        assert_eq!(todo.title, "b");
        assert_eq!(todo.description, None);
        assert_eq!(todo.due_at, None);
        assert!(todo.completed);
        assert_eq!(todo.created_at(), created);
        assert_eq!(UpdateTodo::replacing(NewTodo::default()), Err(ValidationError::BlankTitle));
    }
}
