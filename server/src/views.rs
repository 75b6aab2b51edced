//! Server-rendered pages.
//!
//! Templates are compiled into the binary and rendered with `minijinja`.
//! Every template name ends in `.html`, which turns on HTML auto-escaping
//! for all interpolated values.

use axum::response::Html;
use minijinja::{context, Environment};
use serde::Serialize;

use crate::error::Result;
use crate::session::Flash;
use crate::types::{Todo, TodoList, TodoLists};

const TEMPLATES: [(&str, &str); 5] = [
    ("layout.html", include_str!("../templates/layout.html")),
    ("lists.html", include_str!("../templates/lists.html")),
    ("new_list.html", include_str!("../templates/new_list.html")),
    ("edit_list.html", include_str!("../templates/edit_list.html")),
    ("list.html", include_str!("../templates/list.html")),
];

/// A list as the templates see it, with its derived display state.
#[derive(Debug, Serialize)]
struct ListView<'a> {
    id: u64,
    name: &'a str,
    class: Option<&'static str>,
    todos_count: usize,
    remaining_count: usize,
}

impl<'a> From<&'a TodoList> for ListView<'a> {
    fn from(list: &'a TodoList) -> Self {
        Self {
            id: list.id,
            name: &list.name,
            class: list.css_class(),
            todos_count: list.todos_count(),
            remaining_count: list.todos_remaining_count(),
        }
    }
}

/// The compiled page templates.
#[derive(Debug)]
pub struct Views {
    env: Environment<'static>,
}

impl Views {
    /// Compiles all page templates.
    ///
    /// # Errors
    ///
    /// Returns the template error if any template fails to parse.
    pub fn new() -> std::result::Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    /// All lists, incomplete ones first.
    pub fn lists_page(&self, flash: &Flash, lists: &TodoLists) -> Result<Html<String>> {
        let lists: Vec<ListView<'_>> = lists
            .sorted_for_display()
            .into_iter()
            .map(ListView::from)
            .collect();
        self.render("lists.html", context! { flash, lists })
    }

    /// The creation form, pre-filled with `list_name`.
    pub fn new_list_page(&self, flash: &Flash, list_name: &str) -> Result<Html<String>> {
        self.render("new_list.html", context! { flash, list_name })
    }

    /// The rename form for `list`, pre-filled with `list_name`.
    pub fn edit_list_page(
        &self,
        flash: &Flash,
        list: &TodoList,
        list_name: &str,
    ) -> Result<Html<String>> {
        let list = ListView::from(list);
        self.render("edit_list.html", context! { flash, list, list_name })
    }

    /// One list with its todos, outstanding ones first.
    pub fn list_page(&self, flash: &Flash, list: &TodoList, todo_text: &str) -> Result<Html<String>> {
        let todos: Vec<&Todo> = list.sorted_todos();
        let list = ListView::from(list);
        self.render("list.html", context! { flash, list, todos, todo_text })
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<Html<String>> {
        let html = self.env.get_template(name)?.render(ctx)?;
        Ok(Html(html))
    }
}
