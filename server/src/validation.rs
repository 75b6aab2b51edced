//! Name validation for lists and todos.
//!
//! Both validators trim leading and trailing ASCII whitespace and NUL first
//! and return the trimmed slice on success; that slice is what gets stored.
//! Other Unicode whitespace, such as a no-break space, is part of the name.

use crate::error::{NameKind, TodoError};
use crate::types::TodoList;

/// Shortest accepted name, in characters.
pub const MIN_NAME_LEN: usize = 1;

/// Longest accepted name, in characters.
pub const MAX_NAME_LEN: usize = 100;

/// Validates a list name against the session's current lists.
///
/// # Errors
///
/// - [`TodoError::InvalidLength`] if the trimmed name is not 1 to 100 characters
/// - [`TodoError::DuplicateName`] if a list already has exactly this name
///
/// # Example
///
/// ```rust
/// use todolists_server::validation::validate_list_name;
///
/// assert_eq!(validate_list_name("  Groceries ", &[]).unwrap(), "Groceries");
/// ```
pub fn validate_list_name<'a>(
    candidate: &'a str,
    existing: &[TodoList],
) -> Result<&'a str, TodoError> {
    let name = trimmed_with_length(candidate, NameKind::List)?;
    if existing.iter().any(|list| list.name == name) {
        return Err(TodoError::DuplicateName);
    }
    Ok(name)
}

/// Validates the text of a todo. Todos need not be unique.
///
/// # Errors
///
/// [`TodoError::InvalidLength`] if the trimmed text is not 1 to 100 characters.
pub fn validate_todo_name(candidate: &str) -> Result<&str, TodoError> {
    trimmed_with_length(candidate, NameKind::Todo)
}

/// Space, `\t`, `\n`, vertical tab, form feed, `\r` and NUL.
fn is_trimmed(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r' | '\0')
}

fn trimmed_with_length(candidate: &str, subject: NameKind) -> Result<&str, TodoError> {
    let name = candidate.trim_matches(is_trimmed);
    let len = name.chars().count();
    if (MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        Ok(name)
    } else {
        Err(TodoError::invalid_length(subject))
    }
}
