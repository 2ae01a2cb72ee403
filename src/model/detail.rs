//! Values stored in an [`Event`](super::Event) detail map.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::event::Event;

/// A single detail value.
///
/// Plain data travels as [`serde_json::Value`]. Failures, nested events and
/// arbitrary shared payloads get their own variants so they can be carried
/// without serializing them.
#[derive(Clone)]
pub enum Detail {
    Value(serde_json::Value),
    Error(Arc<dyn std::error::Error + Send + Sync>),
    Event(Event),
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Detail {
    /// Wraps any shared value that is not plain data.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Detail::Opaque(Arc::new(value))
    }

    pub fn as_value(&self) -> Option<&serde_json::Value> {
        match self {
            Detail::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(serde_json::Value::as_str)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_value().and_then(serde_json::Value::as_i64)
    }

    pub fn as_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Detail::Error(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    pub fn as_event(&self) -> Option<&Event> {
        match self {
            Detail::Event(ev) => Some(ev),
            _ => None,
        }
    }

    /// Borrows an opaque payload as `T` if that is what it holds.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Detail::Opaque(v) => v.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for Detail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detail::Value(v) => write!(f, "{v}"),
            Detail::Error(e) => write!(f, "Error({e})"),
            Detail::Event(ev) => write!(f, "{ev:?}"),
            Detail::Opaque(_) => f.write_str("<opaque>"),
        }
    }
}

impl From<serde_json::Value> for Detail {
    fn from(v: serde_json::Value) -> Self {
        Detail::Value(v)
    }
}

impl From<&str> for Detail {
    fn from(v: &str) -> Self {
        Detail::Value(v.into())
    }
}

impl From<String> for Detail {
    fn from(v: String) -> Self {
        Detail::Value(v.into())
    }
}

impl From<bool> for Detail {
    fn from(v: bool) -> Self {
        Detail::Value(v.into())
    }
}

impl From<i32> for Detail {
    fn from(v: i32) -> Self {
        Detail::Value(v.into())
    }
}

impl From<i64> for Detail {
    fn from(v: i64) -> Self {
        Detail::Value(v.into())
    }
}

impl From<u64> for Detail {
    fn from(v: u64) -> Self {
        Detail::Value(v.into())
    }
}

impl From<f64> for Detail {
    fn from(v: f64) -> Self {
        Detail::Value(v.into())
    }
}

impl From<Event> for Detail {
    fn from(ev: Event) -> Self {
        Detail::Event(ev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Order {
        id: u32,
    }

    #[test]
    fn test_opaque_downcast() {
        let d = Detail::opaque(Order { id: 7 });
        assert_eq!(d.downcast_ref::<Order>(), Some(&Order { id: 7 }));
        assert!(d.downcast_ref::<String>().is_none());
        assert!(d.as_value().is_none());
    }

    #[test]
    fn test_plain_values() {
        assert_eq!(Detail::from("x").as_str(), Some("x"));
        assert_eq!(Detail::from(42i64).as_i64(), Some(42));
        assert!(Detail::from(true).as_str().is_none());
    }
}
