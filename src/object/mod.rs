//! Values exposed to templates.
//!
//! Static data is plain JSON ([`Value::Json`]). Anything that has to be computed
//! while rendering (the current user, a cart, a clock) is an opaque
//! [`DataObject`] whose members are reached by name.

use std::{fmt, rc::Rc};

use serde_json::Value as Json;

use crate::{context::Registers, template::RenderError};

/// An opaque data object reachable from templates.
///
/// Member access is dynamic: `{{ cart.total }}` becomes `invoke("total")`.
/// Two lifecycle operations run when the object is exposed to a render and are
/// not member accesses: [`to_renderable`](Self::to_renderable) and
/// [`set_registers`](Self::set_registers).
///
/// # Examples
///
/// ```
/// use cached_include::object::{DataObject, Value};
/// use cached_include::template::RenderError;
///
/// struct Clock;
///
/// impl DataObject for Clock {
///     fn invoke(&self, name: &str) -> Result<Value, RenderError> {
///         match name {
///             "year" => Ok(Value::from(2026)),
///             _ => Ok(Value::null()),
///         }
///     }
///
///     fn to_renderable(self: Box<Self>) -> Box<dyn DataObject> {
///         self
///     }
/// }
///
/// let year = Clock.invoke("year").unwrap();
/// assert_eq!(year.render().unwrap(), "2026");
/// ```
pub trait DataObject {
    /// Resolves the member `name`.
    ///
    /// # Errors
    ///
    /// Whatever the object reports; the engine propagates it unchanged.
    fn invoke(&self, name: &str) -> Result<Value, RenderError>;

    /// Text emitted when the object itself is output, e.g. `{{ cart }}`.
    fn to_output(&self) -> Result<String, RenderError> {
        Ok(String::new())
    }

    /// Informs the object of the render it is exposed to.
    fn set_registers(&mut self, _registers: &Registers) {}

    /// Converts the object into the form templates see.
    fn to_renderable(self: Box<Self>) -> Box<dyn DataObject>;
}

/// A value in template scope.
#[derive(Clone)]
pub enum Value {
    Json(Json),
    Object(Rc<dyn DataObject>),
}

impl Value {
    pub fn null() -> Self {
        Self::Json(Json::Null)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Resolves a single `.key` step.
    ///
    /// JSON follows Liquid lookup rules: object fields, numeric array indices,
    /// and the `size`, `first`, `last` helpers. Missing keys resolve to null.
    ///
    /// # Errors
    ///
    /// Only object members can fail; see [`DataObject::invoke`].
    pub fn get(&self, key: &str) -> Result<Value, RenderError> {
        match self {
            Self::Json(json) => Ok(Self::Json(lookup_json(json, key))),
            Self::Object(object) => object.invoke(key),
        }
    }

    /// Renders the value as output text. Null renders as nothing.
    ///
    /// # Errors
    ///
    /// Only object output can fail; see [`DataObject::to_output`].
    pub fn render(&self) -> Result<String, RenderError> {
        match self {
            Self::Json(json) => Ok(render_json(json)),
            Self::Object(object) => object.to_output(),
        }
    }
}

fn lookup_json(json: &Json, key: &str) -> Json {
    match json {
        Json::Object(map) => match map.get(key) {
            Some(value) => value.clone(),
            None if key == "size" => Json::from(map.len()),
            None => Json::Null,
        },
        Json::Array(items) => match key {
            "size" => Json::from(items.len()),
            "first" => items.first().cloned().unwrap_or(Json::Null),
            "last" => items.last().cloned().unwrap_or(Json::Null),
            index => index
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Json::Null),
        },
        Json::String(s) if key == "size" => Json::from(s.chars().count()),
        _ => Json::Null,
    }
}

fn render_json(json: &Json) -> String {
    match json {
        Json::Null => String::new(),
        Json::String(s) => s.clone(),
        Json::Bool(b) => b.to_string(),
        Json::Number(n) => n.to_string(),
        // Liquid concatenates array elements.
        Json::Array(items) => items.iter().map(render_json).collect(),
        Json::Object(_) => json.to_string(),
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(json) => f.debug_tuple("Json").field(json).finish(),
            Self::Object(_) => f.write_str("Object(..)"),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::null()
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        Self::Json(json)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Json(Json::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Json(Json::from(s))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Json(Json::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Json(Json::from(b))
    }
}

impl From<Box<dyn DataObject>> for Value {
    fn from(object: Box<dyn DataObject>) -> Self {
        Self::Object(Rc::from(object))
    }
}
