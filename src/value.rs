use std::any::Any;
use std::fmt;

/// A payload carried across a switch.
///
/// Greenlets in one tree exchange arbitrary types, so the channel is
/// type-erased. Several values travel together as a tuple.
pub struct Value(Box<dyn Any>);

impl Value {
    pub fn new<T: Any>(value: T) -> Value {
        Value(Box::new(value))
    }

    /// The empty payload, `()`.
    pub fn none() -> Value {
        Value::new(())
    }

    pub fn is_none(&self) -> bool {
        self.0.is::<()>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Unwraps the payload as `T`, handing it back untouched on a type mismatch.
    pub fn downcast<T: Any>(self) -> Result<T, Value> {
        match self.0.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(other) => Err(Value(other)),
        }
    }
}

impl Default for Value {
    fn default() -> Value {
        Value::none()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("Value(())")
        } else {
            f.write_str("Value(..)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_mismatch_returns_the_value() {
        let value = Value::new((41u32, "x"));
        let value = value.downcast::<String>().unwrap_err();
        assert_eq!(value.downcast::<(u32, &str)>().unwrap(), (41, "x"));
    }

    #[test]
    fn none_is_unit() {
        assert!(Value::none().is_none());
        assert!(Value::default().is::<()>());
        assert!(!Value::new(1u8).is_none());
    }
}
