//! Siren hypermedia documents
//!
//! Builds the `class`/`properties`/`entities`/`actions`/`links` documents
//! the API uses to describe nodes, policies and the transitions available
//! on them. Building never fails: absent entries are dropped, and every
//! list field is always serialized, empty if nothing survived.
//!
//! # Example
//!
//! ```
//! use roost_siren::{action, entity, link, Method};
//! use serde_json::{json, Map};
//!
//! let reinstall = action("reinstall", "Reinstall node", "/api/nodes/1/reinstall", "node")
//!     .with_method(Method::Post);
//!
//! let doc = entity(
//!     "node",
//!     Map::new(),
//!     [],
//!     [Some(reinstall), None],
//!     [Some(link("self", "/api/nodes/1"))],
//! );
//!
//! let value = serde_json::to_value(&doc).unwrap();
//! assert_eq!(value["class"], json!(["node"]));
//! assert_eq!(value["actions"][0]["method"], "POST");
//! assert_eq!(value["entities"], json!([]));
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

/// Class tags. A bare string is a single tag; empty tags are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Classes(Vec<String>);

impl Classes {
    fn from_iter_filtered<I, S>(iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            iter.into_iter()
                .map(Into::into)
                .filter(|c: &String| !c.is_empty())
                .collect(),
        )
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Classes {
    fn from(class: &str) -> Self {
        Self::from_iter_filtered([class])
    }
}

impl From<String> for Classes {
    fn from(class: String) -> Self {
        Self::from_iter_filtered([class])
    }
}

impl From<Vec<&str>> for Classes {
    fn from(classes: Vec<&str>) -> Self {
        Self::from_iter_filtered(classes)
    }
}

impl From<Vec<String>> for Classes {
    fn from(classes: Vec<String>) -> Self {
        Self::from_iter_filtered(classes)
    }
}

impl From<&[&str]> for Classes {
    fn from(classes: &[&str]) -> Self {
        Self::from_iter_filtered(classes.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for Classes {
    fn from(classes: [&str; N]) -> Self {
        Self::from_iter_filtered(classes)
    }
}

/// HTTP method of an action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// A Siren entity
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Entity {
    pub class: Classes,
    pub properties: Map<String, Value>,
    pub entities: Vec<Entity>,
    pub actions: Vec<Action>,
    pub links: Vec<Link>,
}

impl Entity {
    /// An entity with only class tags set
    pub fn new(classes: impl Into<Classes>) -> Self {
        Self {
            class: classes.into(),
            ..Default::default()
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_entity(mut self, entity: Option<Entity>) -> Self {
        self.entities.extend(entity);
        self
    }

    pub fn with_action(mut self, action: Option<Action>) -> Self {
        self.actions.extend(action);
        self
    }

    pub fn with_link(mut self, link: Option<Link>) -> Self {
        self.links.extend(link);
        self
    }
}

/// A state transition exposed on an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub name: String,
    pub title: String,
    pub href: String,
    pub class: Classes,
    pub method: Method,
}

impl Action {
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }
}

/// A navigational link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub rel: Classes,
    pub href: String,
}

/// Build an entity, dropping absent sub-entities, actions and links
pub fn entity<E, A, L>(
    classes: impl Into<Classes>,
    properties: Map<String, Value>,
    entities: E,
    actions: A,
    links: L,
) -> Entity
where
    E: IntoIterator<Item = Option<Entity>>,
    A: IntoIterator<Item = Option<Action>>,
    L: IntoIterator<Item = Option<Link>>,
{
    Entity {
        class: classes.into(),
        properties,
        entities: entities.into_iter().flatten().collect(),
        actions: actions.into_iter().flatten().collect(),
        links: links.into_iter().flatten().collect(),
    }
}

/// Build an action; `url` becomes `href` and the method defaults to GET
pub fn action(
    name: impl Into<String>,
    title: impl Into<String>,
    url: impl Into<String>,
    class: impl Into<Classes>,
) -> Action {
    Action {
        name: name.into(),
        title: title.into(),
        href: url.into(),
        class: class.into(),
        method: Method::default(),
    }
}

pub fn link(rel: impl Into<Classes>, href: impl Into<String>) -> Link {
    Link {
        rel: rel.into(),
        href: href.into(),
    }
}
