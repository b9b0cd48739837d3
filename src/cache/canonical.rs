//! Canonical textual forms for call arguments
//!
//! Every value that takes part in a cache key declares how it renders through the
//! [`Canonical`] trait. The rendering must be equal for equal values across process
//! runs and must never embed an address or other per-process detail. Hashed
//! collections are rendered in sorted order so their iteration order does not leak in.

use crate::error::{OnceAgainError, OnceAgainResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::BuildHasher;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

/// A value with a stable, address-free textual form
pub trait Canonical {
    /// Append the canonical form to `out`
    fn write_canonical(&self, out: &mut String);

    /// Render the canonical form into a new string
    fn canonical(&self) -> String {
        let mut out = String::new();
        self.write_canonical(&mut out);
        out
    }
}

/// Positional argument list of a call
pub trait Positional {
    /// Canonical form of each positional argument, in call order
    fn canonical_positional(&self) -> Vec<String>;
}

/// Keyword argument group of a call
pub trait Keywords {
    /// `(name, canonical value)` of each keyword argument, in the order supplied
    fn canonical_keywords(&self) -> Vec<(String, String)>;
}

/// The canonical form of a complete argument set
///
/// Receivers of bound methods appear as the leading positional entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalArgs {
    /// Positional arguments in call order
    pub positional: Vec<String>,
    /// Keyword arguments, sorted by name
    pub keyword: BTreeMap<String, String>,
}

impl CanonicalArgs {
    /// Build from already rendered parts
    pub fn new(positional: Vec<String>, keyword: BTreeMap<String, String>) -> Self {
        Self {
            positional,
            keyword,
        }
    }

    /// Canonicalize a call: `prepended` arguments come first, then `args`, then `kwargs`
    ///
    /// Fails with `DuplicateKeyword` when a keyword name is supplied twice.
    pub fn collect<A, K>(prepended: Vec<String>, args: &A, kwargs: &K) -> OnceAgainResult<Self>
    where
        A: Positional + ?Sized,
        K: Keywords + ?Sized,
    {
        let mut positional = prepended;
        positional.extend(args.canonical_positional());

        let mut keyword = BTreeMap::new();
        for (name, value) in kwargs.canonical_keywords() {
            if keyword.contains_key(&name) {
                return Err(OnceAgainError::DuplicateKeyword(name));
            }
            keyword.insert(name, value);
        }

        Ok(Self {
            positional,
            keyword,
        })
    }

    /// Comma-joined text of positional values, then `name=value` keyword values
    pub fn render(&self) -> String {
        self.positional
            .iter()
            .cloned()
            .chain(self.keyword.iter().map(|(k, v)| format!("{}={}", k, v)))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Total number of arguments
    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    /// Whether the call had no arguments at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for CanonicalArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

fn write_seq<I>(out: &mut String, open: char, close: char, items: I)
where
    I: IntoIterator<Item = String>,
{
    out.push(open);
    let mut first = true;
    for item in items {
        if !first {
            out.push_str(", ");
        }
        first = false;
        out.push_str(&item);
    }
    out.push(close);
}

fn sorted_entries<'a, K, V, I>(entries: I) -> Vec<String>
where
    K: Canonical + 'a,
    V: Canonical + 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    let mut rendered: Vec<(String, String)> = entries
        .into_iter()
        .map(|(k, v)| (k.canonical(), v.canonical()))
        .collect();
    rendered.sort();
    rendered
        .into_iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect()
}

fn sorted_items<'a, T, I>(items: I) -> Vec<String>
where
    T: Canonical + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut rendered: Vec<String> = items.into_iter().map(Canonical::canonical).collect();
    rendered.sort();
    rendered
}

macro_rules! canonical_via_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Canonical for $ty {
                fn write_canonical(&self, out: &mut String) {
                    out.push_str(&self.to_string());
                }
            }
        )*
    };
}

macro_rules! canonical_via_debug {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Canonical for $ty {
                fn write_canonical(&self, out: &mut String) {
                    out.push_str(&format!("{:?}", self));
                }
            }
        )*
    };
}

canonical_via_display!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, bool);

// Debug keeps the fractional part (`1.0`) and quotes text
canonical_via_debug!(f32, f64, char, str, Path);

impl Canonical for String {
    fn write_canonical(&self, out: &mut String) {
        self.as_str().write_canonical(out);
    }
}

impl Canonical for PathBuf {
    fn write_canonical(&self, out: &mut String) {
        self.as_path().write_canonical(out);
    }
}

impl Canonical for () {
    fn write_canonical(&self, out: &mut String) {
        out.push_str("()");
    }
}

impl Canonical for serde_json::Value {
    fn write_canonical(&self, out: &mut String) {
        out.push_str(&self.to_string());
    }
}

impl<T: Canonical + ?Sized> Canonical for &T {
    fn write_canonical(&self, out: &mut String) {
        (**self).write_canonical(out);
    }
}

impl<T: Canonical + ?Sized> Canonical for Box<T> {
    fn write_canonical(&self, out: &mut String) {
        (**self).write_canonical(out);
    }
}

impl<T: Canonical + ?Sized> Canonical for Rc<T> {
    fn write_canonical(&self, out: &mut String) {
        (**self).write_canonical(out);
    }
}

impl<T: Canonical + ?Sized> Canonical for Arc<T> {
    fn write_canonical(&self, out: &mut String) {
        (**self).write_canonical(out);
    }
}

impl<T: Canonical> Canonical for Option<T> {
    fn write_canonical(&self, out: &mut String) {
        match self {
            Some(value) => {
                out.push_str("Some(");
                value.write_canonical(out);
                out.push(')');
            }
            None => out.push_str("None"),
        }
    }
}

impl<T: Canonical> Canonical for [T] {
    fn write_canonical(&self, out: &mut String) {
        write_seq(out, '[', ']', self.iter().map(Canonical::canonical));
    }
}

impl<T: Canonical, const N: usize> Canonical for [T; N] {
    fn write_canonical(&self, out: &mut String) {
        self.as_slice().write_canonical(out);
    }
}

impl<T: Canonical> Canonical for Vec<T> {
    fn write_canonical(&self, out: &mut String) {
        self.as_slice().write_canonical(out);
    }
}

impl<K: Canonical, V: Canonical> Canonical for BTreeMap<K, V> {
    fn write_canonical(&self, out: &mut String) {
        write_seq(out, '{', '}', sorted_entries(self.iter()));
    }
}

impl<K: Canonical, V: Canonical, S: BuildHasher> Canonical for HashMap<K, V, S> {
    fn write_canonical(&self, out: &mut String) {
        write_seq(out, '{', '}', sorted_entries(self.iter()));
    }
}

impl<T: Canonical> Canonical for BTreeSet<T> {
    fn write_canonical(&self, out: &mut String) {
        write_seq(out, '{', '}', sorted_items(self.iter()));
    }
}

impl<T: Canonical, S: BuildHasher> Canonical for HashSet<T, S> {
    fn write_canonical(&self, out: &mut String) {
        write_seq(out, '{', '}', sorted_items(self.iter()));
    }
}

macro_rules! tuple_impls {
    ($(($($name:ident),+)),+ $(,)?) => {
        $(
            impl<$($name: Canonical),+> Canonical for ($($name,)+) {
                #[allow(non_snake_case)]
                fn write_canonical(&self, out: &mut String) {
                    let ($($name,)+) = self;
                    let items = vec![$($name.canonical()),+];
                    if items.len() == 1 {
                        out.push('(');
                        out.push_str(&items[0]);
                        out.push_str(",)");
                    } else {
                        write_seq(out, '(', ')', items);
                    }
                }
            }

            impl<$($name: Canonical),+> Positional for ($($name,)+) {
                #[allow(non_snake_case)]
                fn canonical_positional(&self) -> Vec<String> {
                    let ($($name,)+) = self;
                    vec![$($name.canonical()),+]
                }
            }
        )+
    };
}

tuple_impls!(
    (A),
    (A, B),
    (A, B, C),
    (A, B, C, D),
    (A, B, C, D, E),
    (A, B, C, D, E, F),
    (A, B, C, D, E, F, G),
    (A, B, C, D, E, F, G, H),
);

impl Positional for () {
    fn canonical_positional(&self) -> Vec<String> {
        Vec::new()
    }
}

impl Keywords for () {
    fn canonical_keywords(&self) -> Vec<(String, String)> {
        vec![]
    }
}

impl<V: Canonical> Keywords for BTreeMap<String, V> {
    fn canonical_keywords(&self) -> Vec<(String, String)> {
        self.iter()
            .map(|(k, v)| (k.clone(), v.canonical()))
            .collect()
    }
}

impl<V: Canonical, S: BuildHasher> Keywords for HashMap<String, V, S> {
    fn canonical_keywords(&self) -> Vec<(String, String)> {
        self.iter()
            .map(|(k, v)| (k.clone(), v.canonical()))
            .collect()
    }
}

impl<V: Canonical, const N: usize> Keywords for [(&str, V); N] {
    fn canonical_keywords(&self) -> Vec<(String, String)> {
        self.iter()
            .map(|(k, v)| ((*k).to_string(), v.canonical()))
            .collect()
    }
}

/// Implement [`Canonical`] for a struct as `Name(field=value, ...)`
///
/// ```
/// use once_again::{impl_canonical, Canonical};
///
/// struct Dataset {
///     values: Vec<i64>,
/// }
/// impl_canonical!(Dataset { values });
///
/// let ds = Dataset { values: vec![1, 2, 3] };
/// assert_eq!(ds.canonical(), "Dataset(values=[1, 2, 3])");
/// ```
#[macro_export]
macro_rules! impl_canonical {
    ($ty:ident { $($field:ident),* $(,)? }) => {
        impl $crate::Canonical for $ty {
            fn write_canonical(&self, out: &mut ::std::string::String) {
                let fields: ::std::vec::Vec<::std::string::String> = ::std::vec![
                    $(::std::format!(
                        "{}={}",
                        ::std::stringify!($field),
                        $crate::Canonical::canonical(&self.$field)
                    )),*
                ];
                out.push_str(::std::stringify!($ty));
                out.push('(');
                out.push_str(&fields.join(", "));
                out.push(')');
            }
        }
    };
}

/// Implement [`Keywords`] for a struct whose fields are the keyword arguments
///
/// ```
/// use once_again::{impl_keywords, CanonicalArgs};
///
/// struct Weights {
///     c: i64,
///     d: i64,
/// }
/// impl_keywords!(Weights { d, c });
///
/// let args = CanonicalArgs::collect(vec![], &(), &Weights { c: 30, d: 4 }).unwrap();
/// assert_eq!(args.render(), "c=30,d=4");
/// ```
#[macro_export]
macro_rules! impl_keywords {
    ($ty:ident { $($field:ident),+ $(,)? }) => {
        impl $crate::Keywords for $ty {
            fn canonical_keywords(
                &self,
            ) -> ::std::vec::Vec<(::std::string::String, ::std::string::String)> {
                ::std::vec![
                    $((
                        ::std::string::ToString::to_string(::std::stringify!($field)),
                        $crate::Canonical::canonical(&self.$field),
                    )),+
                ]
            }
        }
    };
}
