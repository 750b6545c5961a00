/// Parameter Binder
///
/// Converts caller-supplied values into named SQL parameters. Names are
/// stored without the `@` prefix; drivers apply it when binding.
use crate::core::value::Value;
use crate::core::{Result, SequelError};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

/// Prefix applied to every parameter name in generated SQL.
pub const PARAMETER_PREFIX: char = '@';

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Returns true if `name` is usable as `@name` in generated SQL.
pub fn is_valid_parameter_name(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Ordered mapping from parameter name to value.
///
/// Insertion order is preserved; inserting an existing name replaces its
/// value in place (last write wins).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    values: IndexMap<String, Value>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from ordered key/value pairs, validating every name.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut set = ParameterSet::new();
        for (name, value) in pairs {
            set.insert(name, value)?;
        }
        Ok(set)
    }

    /// Builds a set from a record type or keyed mapping.
    ///
    /// `None` yields an empty set.
    pub fn from_record<T: ToParameters + ?Sized>(record: Option<&T>) -> Result<Self> {
        match record {
            Some(record) => record.to_parameters(),
            None => Ok(ParameterSet::new()),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let name = name.into();
        if !is_valid_parameter_name(&name) {
            return Err(SequelError::InvalidParameter(name));
        }
        self.values.insert(name, value.into());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Merges `other` into this set; `other` wins on conflicts.
    pub fn extend(&mut self, other: &ParameterSet) {
        for (k, v) in other.values.iter() {
            self.values.insert(k.clone(), v.clone());
        }
    }

    /// Inserts without validating the name. Used by the binding macros,
    /// whose names come from Rust identifiers.
    #[doc(hidden)]
    pub fn insert_unchecked(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// Anything that can be bound as a named parameter set.
///
/// Already-keyed mappings pass through after their names are validated;
/// record types list their fields with
/// [`impl_to_parameters!`](crate::impl_to_parameters).
pub trait ToParameters {
    fn to_parameters(&self) -> Result<ParameterSet>;
}

impl ToParameters for ParameterSet {
    fn to_parameters(&self) -> Result<ParameterSet> {
        Ok(self.clone())
    }
}

impl<V: Clone + Into<Value>> ToParameters for IndexMap<String, V> {
    fn to_parameters(&self) -> Result<ParameterSet> {
        keyed(self.iter())
    }
}

impl<V: Clone + Into<Value>> ToParameters for BTreeMap<String, V> {
    fn to_parameters(&self) -> Result<ParameterSet> {
        keyed(self.iter())
    }
}

impl<V: Clone + Into<Value>> ToParameters for HashMap<String, V> {
    fn to_parameters(&self) -> Result<ParameterSet> {
        keyed(self.iter())
    }
}

impl<K: AsRef<str>, V: Clone + Into<Value>> ToParameters for [(K, V)] {
    fn to_parameters(&self) -> Result<ParameterSet> {
        keyed(self.iter().map(|(k, v)| (k, v)))
    }
}

impl<T: ToParameters + ?Sized> ToParameters for &T {
    fn to_parameters(&self) -> Result<ParameterSet> {
        (**self).to_parameters()
    }
}

impl<T: ToParameters> ToParameters for Option<T> {
    fn to_parameters(&self) -> Result<ParameterSet> {
        ParameterSet::from_record(self.as_ref())
    }
}

fn keyed<'a, K, V, I>(iter: I) -> Result<ParameterSet>
where
    K: AsRef<str> + 'a,
    V: Clone + Into<Value> + 'a,
    I: Iterator<Item = (&'a K, &'a V)>,
{
    let mut set = ParameterSet::new();
    for (k, v) in iter {
        set.insert(k.as_ref(), v.clone())?;
    }
    Ok(set)
}

/// Builds a [`ParameterSet`] from `name => value` pairs.
///
/// ```
/// let params = sequel::parameters! { name => "My Name", age => 3 };
/// assert_eq!(params.len(), 2);
/// ```
#[macro_export]
macro_rules! parameters {
    () => { $crate::ParameterSet::new() };
    ($($name:ident => $value:expr),+ $(,)?) => {{
        let mut set = $crate::ParameterSet::new();
        $(
            set.insert_unchecked(stringify!($name), $value);
        )+
        set
    }};
}

/// Implements [`ToParameters`] for a struct from its field list, in
/// declaration order.
///
/// ```
/// struct Dog { name: String, age: i32 }
/// sequel::impl_to_parameters!(Dog { name, age });
/// ```
#[macro_export]
macro_rules! impl_to_parameters {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::ToParameters for $ty {
            fn to_parameters(&self) -> $crate::Result<$crate::ParameterSet> {
                let mut set = $crate::ParameterSet::new();
                $(
                    set.insert_unchecked(stringify!($field), $crate::Value::from(self.$field.clone()));
                )+
                Ok(set)
            }
        }
    };
}
