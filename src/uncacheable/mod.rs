//! Opaque-access interception.
//!
//! Wrapping a data object in an [`UncacheableDecorator`] makes every member
//! access mark the render's inclusion stack uncacheable before the access is
//! forwarded. Object authors opt in with [`Uncacheable::uncacheable`], typically
//! from their owner's `to_renderable`:
//!
//! ```
//! use cached_include::object::{DataObject, Value};
//! use cached_include::template::RenderError;
//! use cached_include::uncacheable::Uncacheable;
//!
//! struct Session;
//! struct SessionDrop;
//!
//! impl DataObject for SessionDrop {
//!     fn invoke(&self, _name: &str) -> Result<Value, RenderError> {
//!         Ok(Value::from("guest"))
//!     }
//!     fn to_renderable(self: Box<Self>) -> Box<dyn DataObject> {
//!         self
//!     }
//! }
//!
//! impl DataObject for Session {
//!     fn invoke(&self, name: &str) -> Result<Value, RenderError> {
//!         SessionDrop.invoke(name)
//!     }
//!     fn to_renderable(self: Box<Self>) -> Box<dyn DataObject> {
//!         Box::new(SessionDrop.uncacheable())
//!     }
//! }
//! ```

use tracing::trace;

use crate::{
    context::Registers,
    object::{DataObject, Value},
    template::RenderError,
};

/// Decorator that taints the active inclusion stack on every member access.
///
/// `set_registers` and `to_renderable` are lifecycle operations and pass
/// through without marking. Until registers have been provided, accesses are
/// forwarded untracked.
pub struct UncacheableDecorator {
    source: Box<dyn DataObject>,
    registers: Option<Registers>,
}

impl UncacheableDecorator {
    pub fn new(source: Box<dyn DataObject>) -> Self {
        Self {
            source,
            registers: None,
        }
    }

    /// Registers captured from the render this object was exposed to.
    pub fn registers(&self) -> Option<&Registers> {
        self.registers.as_ref()
    }

    fn taint(&self, member: &str) {
        if let Some(registers) = &self.registers {
            trace!(member, depth = registers.stack_depth(), "dynamic data accessed");
            registers.mark_uncacheable();
        }
    }
}

impl DataObject for UncacheableDecorator {
    fn invoke(&self, name: &str) -> Result<Value, RenderError> {
        self.taint(name);
        self.source.invoke(name)
    }

    fn to_output(&self) -> Result<String, RenderError> {
        self.taint("to_output");
        self.source.to_output()
    }

    fn set_registers(&mut self, registers: &Registers) {
        self.registers = Some(registers.clone());
        self.source.set_registers(registers);
    }

    // Converts the wrapped object; the decorator itself survives the conversion.
    fn to_renderable(self: Box<Self>) -> Box<dyn DataObject> {
        let Self { source, registers } = *self;
        Box::new(Self {
            source: source.to_renderable(),
            registers,
        })
    }
}

/// Opt-in for interception, available on every [`DataObject`].
pub trait Uncacheable: DataObject + Sized + 'static {
    /// Wraps `self` so that template access to it is tracked.
    fn uncacheable(self) -> UncacheableDecorator {
        UncacheableDecorator::new(Box::new(self))
    }
}

impl<T> Uncacheable for T where T: DataObject + 'static {}
