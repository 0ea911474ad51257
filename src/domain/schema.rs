//! Field name mapping between the Rust attributes, the JSON wire keys and the
//! storage columns of a todo.

pub const TABLE_NAME: &str = "todo";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub internal: &'static str,
    pub wire: &'static str,
    pub column: &'static str,
}

const fn field(internal: &'static str, wire: &'static str, column: &'static str) -> FieldMapping {
    FieldMapping { internal, wire, column }
}

/// Every persisted field, in column order. Clients and stored rows depend on
/// these exact names.
pub const TODO_FIELDS: [FieldMapping; 6] = [
    field("id", "id", "id"),
    field("title", "todo_title", "todo_title"),
    field("description", "todo_description", "todo_description"),
    field("created_at", "todo_created_at", "todo_created_at"),
    field("due_at", "todo_due_at", "todo_due_at"),
    field("completed", "todo_completed", "todo_completed"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_id_keeps_its_internal_name() {
        for f in TODO_FIELDS {
            assert_eq!(f.internal == f.wire, f.internal == "id", "{f:?}");
            assert_eq!(f.wire, f.column);
        }
    }
}
