//! Domain types for the TodoLists server.
//!
//! A session owns one [`TodoLists`] collection. Lists and todos are
//! identified by stable ids that are assigned on creation and never reused,
//! so removing an entry never changes the identity of the others.

use serde::Serialize;

use crate::error::{EntityKind, TodoError};
use crate::validation::{validate_list_name, validate_todo_name};

/// CSS class applied to a list whose todos are all done.
pub const COMPLETE_CLASS: &str = "complete";

/// A single todo item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Todo {
    pub id: u64,
    pub name: String,
    pub completed: bool,
}

/// A named list of todos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoList {
    pub id: u64,
    pub name: String,
    pub todos: Vec<Todo>,
    next_todo_id: u64,
}

impl TodoList {
    fn new(id: u64, name: String) -> Self {
        Self {
            id,
            name,
            todos: Vec::new(),
            next_todo_id: 0,
        }
    }

    /// Total number of todos.
    pub fn todos_count(&self) -> usize {
        self.todos.len()
    }

    /// Number of todos not yet completed.
    pub fn todos_remaining_count(&self) -> usize {
        self.todos.iter().filter(|todo| !todo.completed).count()
    }

    /// A list is empty iff it has no todos.
    pub fn is_empty(&self) -> bool {
        self.todos.is_empty()
    }

    /// A list is complete iff it has todos and none are outstanding.
    ///
    /// # Example
    ///
    /// ```rust
    /// use todolists_server::types::TodoLists;
    ///
    /// let mut lists = TodoLists::new();
    /// let id = lists.create("Chores").unwrap().id;
    /// let list = lists.get_mut(id).unwrap();
    /// assert!(!list.is_complete());
    ///
    /// list.add_todo("Sweep").unwrap();
    /// list.complete_all();
    /// assert!(list.is_complete());
    /// ```
    pub fn is_complete(&self) -> bool {
        !self.is_empty() && self.todos_remaining_count() == 0
    }

    /// State class used when rendering the list.
    pub fn css_class(&self) -> Option<&'static str> {
        self.is_complete().then_some(COMPLETE_CLASS)
    }

    /// Todos ordered for display: outstanding first, completed last.
    ///
    /// The sort is stable and works on a borrowed copy; storage order is
    /// left untouched.
    pub fn sorted_todos(&self) -> Vec<&Todo> {
        let mut todos: Vec<&Todo> = self.todos.iter().collect();
        todos.sort_by_key(|todo| todo.completed);
        todos
    }

    /// Looks up a todo by its id.
    pub fn todo(&self, id: u64) -> Option<&Todo> {
        self.todos.iter().find(|todo| todo.id == id)
    }

    /// Resolves a raw todo id taken from a request path.
    ///
    /// # Errors
    ///
    /// [`TodoError::NotFound`] if the id is not a non-negative integer or
    /// no todo in this list carries it.
    pub fn resolve_todo(&self, requested: &str) -> Result<u64, TodoError> {
        parse_id(requested)
            .filter(|id| self.todo(*id).is_some())
            .ok_or(TodoError::not_found(EntityKind::Todo))
    }

    /// Validates `name` and appends a new, incomplete todo.
    ///
    /// # Errors
    ///
    /// [`TodoError::InvalidLength`] if the trimmed name is out of bounds.
    pub fn add_todo(&mut self, name: &str) -> Result<&Todo, TodoError> {
        let name = validate_todo_name(name)?.to_owned();
        let id = next_id(self.todos.iter().map(|todo| todo.id), &mut self.next_todo_id);
        self.todos.push(Todo {
            id,
            name,
            completed: false,
        });
        Ok(&self.todos[self.todos.len() - 1])
    }

    /// Removes the todo with the given id, leaving the others in place.
    ///
    /// # Errors
    ///
    /// [`TodoError::NotFound`] if no todo carries `id`.
    pub fn delete_todo(&mut self, id: u64) -> Result<Todo, TodoError> {
        let index = self
            .todos
            .iter()
            .position(|todo| todo.id == id)
            .ok_or(TodoError::not_found(EntityKind::Todo))?;
        Ok(self.todos.remove(index))
    }

    /// Sets the completion flag of one todo.
    ///
    /// # Errors
    ///
    /// [`TodoError::NotFound`] if no todo carries `id`.
    pub fn set_completed(&mut self, id: u64, completed: bool) -> Result<(), TodoError> {
        let todo = self
            .todos
            .iter_mut()
            .find(|todo| todo.id == id)
            .ok_or(TodoError::not_found(EntityKind::Todo))?;
        todo.completed = completed;
        Ok(())
    }

    /// Marks every todo as completed. Idempotent.
    pub fn complete_all(&mut self) {
        for todo in &mut self.todos {
            todo.completed = true;
        }
    }
}

/// The ordered collection of lists held by one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoLists {
    lists: Vec<TodoList>,
    next_list_id: u64,
}

impl TodoLists {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// The lists in storage order.
    pub fn as_slice(&self) -> &[TodoList] {
        &self.lists
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TodoList> {
        self.lists.iter()
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Looks up a list by id.
    pub fn get(&self, id: u64) -> Option<&TodoList> {
        self.lists.iter().find(|list| list.id == id)
    }

    /// Like [`TodoLists::get`], failing with [`TodoError::NotFound`].
    pub fn find(&self, id: u64) -> Result<&TodoList, TodoError> {
        self.get(id).ok_or(TodoError::not_found(EntityKind::List))
    }

    /// Looks up a list by id for mutation.
    pub fn get_mut(&mut self, id: u64) -> Option<&mut TodoList> {
        self.lists.iter_mut().find(|list| list.id == id)
    }

    /// Resolves a raw list id taken from a request path.
    ///
    /// Returns the storage index together with the list. Lookup is by the
    /// list's assigned id, never by position.
    ///
    /// # Errors
    ///
    /// [`TodoError::NotFound`] if `requested` is not made of ASCII digits
    /// only, or no list carries that id.
    ///
    /// # Example
    ///
    /// ```rust
    /// use todolists_server::types::TodoLists;
    ///
    /// let mut lists = TodoLists::new();
    /// lists.create("Work").unwrap();
    ///
    /// assert!(lists.resolve("0").is_ok());
    /// assert!(lists.resolve("999").is_err());
    /// assert!(lists.resolve("-1").is_err());
    /// ```
    pub fn resolve(&self, requested: &str) -> Result<(usize, &TodoList), TodoError> {
        let id = parse_id(requested).ok_or(TodoError::not_found(EntityKind::List))?;
        self.lists
            .iter()
            .enumerate()
            .find(|(_, list)| list.id == id)
            .ok_or(TodoError::not_found(EntityKind::List))
    }

    /// Like [`TodoLists::resolve`], returning the list for mutation.
    pub fn resolve_mut(&mut self, requested: &str) -> Result<&mut TodoList, TodoError> {
        let id = parse_id(requested).ok_or(TodoError::not_found(EntityKind::List))?;
        self.get_mut(id)
            .ok_or(TodoError::not_found(EntityKind::List))
    }

    /// Validates `name` and appends a new empty list.
    ///
    /// # Errors
    ///
    /// [`TodoError::InvalidLength`] or [`TodoError::DuplicateName`].
    pub fn create(&mut self, name: &str) -> Result<&TodoList, TodoError> {
        let name = validate_list_name(name, &self.lists)?.to_owned();
        let id = next_id(self.lists.iter().map(|list| list.id), &mut self.next_list_id);
        self.lists.push(TodoList::new(id, name));
        Ok(&self.lists[self.lists.len() - 1])
    }

    /// Renames the list with the given id.
    ///
    /// Uniqueness is checked against every list currently in the session,
    /// including the one being renamed.
    ///
    /// # Errors
    ///
    /// [`TodoError::NotFound`], [`TodoError::InvalidLength`] or
    /// [`TodoError::DuplicateName`].
    pub fn rename(&mut self, id: u64, name: &str) -> Result<(), TodoError> {
        let name = validate_list_name(name, &self.lists)?.to_owned();
        let list = self
            .get_mut(id)
            .ok_or(TodoError::not_found(EntityKind::List))?;
        list.name = name;
        Ok(())
    }

    /// Removes the list with the given id.
    ///
    /// # Errors
    ///
    /// [`TodoError::NotFound`] if no list carries `id`.
    pub fn delete(&mut self, id: u64) -> Result<TodoList, TodoError> {
        let index = self
            .lists
            .iter()
            .position(|list| list.id == id)
            .ok_or(TodoError::not_found(EntityKind::List))?;
        Ok(self.lists.remove(index))
    }

    /// Lists ordered for display: incomplete first, complete last.
    ///
    /// Stable, and sorts borrowed references only.
    pub fn sorted_for_display(&self) -> Vec<&TodoList> {
        let mut lists: Vec<&TodoList> = self.lists.iter().collect();
        lists.sort_by_key(|list| list.is_complete());
        lists
    }
}

impl<'a> IntoIterator for &'a TodoLists {
    type Item = &'a TodoList;
    type IntoIter = std::slice::Iter<'a, TodoList>;

    fn into_iter(self) -> Self::IntoIter {
        self.lists.iter()
    }
}

/// Parses a request id. Only plain ASCII digits are accepted, so signs,
/// whitespace and empty strings all fail.
pub fn parse_id(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Picks the next id: one past the largest live id, but never below an id
/// that was already handed out.
fn next_id(existing: impl Iterator<Item = u64>, high_water: &mut u64) -> u64 {
    let id = existing
        .max()
        .map_or(0, |max| max + 1)
        .max(*high_water);
    *high_water = id + 1;
    id
}
