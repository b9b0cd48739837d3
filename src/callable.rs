//! Callable identity resolution
//!
//! A cached call is identified by the callable's qualified name plus its
//! arguments. Bound callables add their receiver as a synthetic leading
//! argument, so `a.f()` and `b.f()` land in different entries while the same
//! receiver always maps to the same one.
//!
//! # Shapes
//!
//! | Shape | Kind | Qualified name | Prepended |
//! |-------|------|----------------|-----------|
//! | [`Function`] | free function | item path | nothing |
//! | [`StaticMethod`] | free function | `{type}.{method}` | nothing |
//! | [`Method`] | bound method | `{receiver type}.{method}` | receiver |
//! | [`ClassMethod`] | bound method | `{type}.{method}` | the type |
//!
//! Names are derived from `std::any::type_name`, with `::` rendered as `.` and
//! other punctuation percent-encoded (`Option<&u8>` becomes `Option%3C%26u8%3E`).
//! Closures and function pointers have compiler-synthesized type names and are
//! rejected unless given an explicit name.

use crate::cache::canonical::Canonical;
use crate::error::{OnceAgainError, OnceAgainResult};
use serde::{Deserialize, Serialize};
use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;

/// Whether a resolved callable carries a receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallableKind {
    FreeFunction,
    BoundMethod,
}

impl fmt::Display for CallableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FreeFunction => "function",
            Self::BoundMethod => "bound method",
        };
        write!(f, "{}", name)
    }
}

/// Stable identity of a callable across process runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallableIdentity {
    /// Scope-qualified name, used in entry file names
    pub qualified_name: String,
    pub kind: CallableKind,
}

impl fmt::Display for CallableIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.qualified_name, self.kind)
    }
}

type Invoke<'a, A, K, R, E> = Box<dyn Fn(&A, &K) -> Result<R, E> + 'a>;

/// A callable reduced to an unbound function plus synthetic leading arguments
pub struct Resolved<'a, A, K, R, E> {
    pub identity: CallableIdentity,
    /// Canonical forms of arguments placed before the positional ones
    pub prepended: Vec<String>,
    invoke: Invoke<'a, A, K, R, E>,
}

impl<A, K, R, E> Resolved<'_, A, K, R, E> {
    /// Run the effective function
    pub fn invoke(&self, args: &A, kwargs: &K) -> Result<R, E> {
        (self.invoke)(args, kwargs)
    }
}

impl<A, K, R, E> fmt::Debug for Resolved<'_, A, K, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("identity", &self.identity)
            .field("prepended", &self.prepended)
            .finish_non_exhaustive()
    }
}

/// Something that can be memoized with positional arguments `A` and keywords `K`
pub trait Callable<A, K> {
    type Output;
    type Error;

    /// Resolve into the effective function and its identity
    fn resolve(&self) -> OnceAgainResult<Resolved<'_, A, K, Self::Output, Self::Error>>;
}

/// A free function: `fn(&A, &K) -> Result<R, E>`
pub struct Function<F> {
    name: Option<String>,
    func: F,
}

impl<F> Function<F> {
    /// Wrap a function item; its name comes from its path
    pub fn new(func: F) -> Self {
        Self { name: None, func }
    }

    /// Wrap any function-like value under an explicit qualified name
    pub fn named(name: impl Into<String>, func: F) -> Self {
        Self {
            name: Some(name.into()),
            func,
        }
    }

    pub fn qualified_name(&self) -> OnceAgainResult<String> {
        match &self.name {
            Some(name) => validate_name(name),
            None => item_path::<F>(),
        }
    }
}

impl<A, K, R, E, F> Callable<A, K> for Function<F>
where
    F: Fn(&A, &K) -> Result<R, E>,
{
    type Output = R;
    type Error = E;

    fn resolve(&self) -> OnceAgainResult<Resolved<'_, A, K, R, E>> {
        Ok(Resolved {
            identity: CallableIdentity {
                qualified_name: self.qualified_name()?,
                kind: CallableKind::FreeFunction,
            },
            prepended: vec![],
            invoke: Box::new(move |args: &A, kwargs: &K| (self.func)(args, kwargs)),
        })
    }
}

/// An associated function without a receiver
///
/// Reaching it through the type ([`StaticMethod::of`]) or through an instance
/// ([`StaticMethod::via`]) yields the same identity; the instance is not part
/// of the key.
pub struct StaticMethod<T: ?Sized, F> {
    name: Option<String>,
    func: F,
    owner: PhantomData<fn(&T)>,
}

impl<T: ?Sized, F> StaticMethod<T, F> {
    /// Reach the function through its type: `StaticMethod::<Dataset, _>::of(Dataset::f)`
    pub fn of(func: F) -> Self {
        Self {
            name: None,
            func,
            owner: PhantomData,
        }
    }

    /// Reach the function through an instance of its type
    pub fn via(_instance: &T, func: F) -> Self {
        Self::of(func)
    }

    /// Give the method an explicit name within its type
    pub fn named(name: impl Into<String>, func: F) -> Self {
        Self {
            name: Some(name.into()),
            func,
            owner: PhantomData,
        }
    }

    pub fn qualified_name(&self) -> OnceAgainResult<String> {
        member_name::<T, F>(self.name.as_deref())
    }
}

impl<A, K, R, E, T, F> Callable<A, K> for StaticMethod<T, F>
where
    T: ?Sized,
    F: Fn(&A, &K) -> Result<R, E>,
{
    type Output = R;
    type Error = E;

    fn resolve(&self) -> OnceAgainResult<Resolved<'_, A, K, R, E>> {
        Ok(Resolved {
            identity: CallableIdentity {
                qualified_name: self.qualified_name()?,
                kind: CallableKind::FreeFunction,
            },
            prepended: vec![],
            invoke: Box::new(move |args: &A, kwargs: &K| (self.func)(args, kwargs)),
        })
    }
}

/// A method bound to a receiver: `fn(&T, &A, &K) -> Result<R, E>`
pub struct Method<'r, T: ?Sized, F> {
    receiver: &'r T,
    name: Option<String>,
    func: F,
}

impl<'r, T: ?Sized, F> Method<'r, T, F> {
    /// Bind a method item to `receiver`
    pub fn new(receiver: &'r T, func: F) -> Self {
        Self {
            receiver,
            name: None,
            func,
        }
    }

    /// Bind under an explicit method name
    pub fn named(receiver: &'r T, name: impl Into<String>, func: F) -> Self {
        Self {
            receiver,
            name: Some(name.into()),
            func,
        }
    }

    pub fn receiver(&self) -> &'r T {
        self.receiver
    }

    pub fn qualified_name(&self) -> OnceAgainResult<String> {
        member_name::<T, F>(self.name.as_deref())
    }
}

impl<A, K, R, E, T, F> Callable<A, K> for Method<'_, T, F>
where
    T: Canonical + ?Sized,
    F: Fn(&T, &A, &K) -> Result<R, E>,
{
    type Output = R;
    type Error = E;

    fn resolve(&self) -> OnceAgainResult<Resolved<'_, A, K, R, E>> {
        Ok(Resolved {
            identity: CallableIdentity {
                qualified_name: self.qualified_name()?,
                kind: CallableKind::BoundMethod,
            },
            prepended: vec![self.receiver.canonical()],
            invoke: Box::new(move |args: &A, kwargs: &K| {
                (self.func)(self.receiver, args, kwargs)
            }),
        })
    }
}

/// A method bound to a type rather than an instance
///
/// The type itself is the receiver, so the same method on two types never
/// shares an entry.
pub struct ClassMethod<T: ?Sized, F> {
    name: Option<String>,
    func: F,
    owner: PhantomData<fn(&T)>,
}

impl<T: ?Sized, F> ClassMethod<T, F> {
    /// Bind a function to type `T`: `ClassMethod::<Dataset, _>::new(Dataset::f)`
    pub fn new(func: F) -> Self {
        Self {
            name: None,
            func,
            owner: PhantomData,
        }
    }

    /// Bind through an instance; the receiver is still the type
    pub fn via(_instance: &T, func: F) -> Self {
        Self::new(func)
    }

    /// Bind under an explicit method name
    pub fn named(name: impl Into<String>, func: F) -> Self {
        Self {
            name: Some(name.into()),
            func,
            owner: PhantomData,
        }
    }

    pub fn qualified_name(&self) -> OnceAgainResult<String> {
        member_name::<T, F>(self.name.as_deref())
    }
}

impl<A, K, R, E, T, F> Callable<A, K> for ClassMethod<T, F>
where
    T: ?Sized,
    F: Fn(&A, &K) -> Result<R, E>,
{
    type Output = R;
    type Error = E;

    fn resolve(&self) -> OnceAgainResult<Resolved<'_, A, K, R, E>> {
        Ok(Resolved {
            identity: CallableIdentity {
                qualified_name: self.qualified_name()?,
                kind: CallableKind::BoundMethod,
            },
            prepended: vec![type_token::<T>()],
            invoke: Box::new(move |args: &A, kwargs: &K| (self.func)(args, kwargs)),
        })
    }
}

/// Canonical form of a type used as a receiver
pub fn type_token<T: ?Sized>() -> String {
    format!("<type {}>", type_path::<T>())
}

/// Dotted path of a type
pub fn type_path<T: ?Sized>() -> String {
    sanitize(type_name::<T>())
}

fn item_path<F>() -> OnceAgainResult<String> {
    let raw = type_name::<F>();
    check_nameable(raw)?;
    Ok(sanitize(raw))
}

fn member_name<T: ?Sized, F>(explicit: Option<&str>) -> OnceAgainResult<String> {
    let member = match explicit {
        Some(name) => validate_name(name)?,
        None => {
            let raw = type_name::<F>();
            check_nameable(raw)?;
            sanitize(last_segment(raw))
        }
    };
    Ok(format!("{}.{}", type_path::<T>(), member))
}

fn check_nameable(raw: &str) -> OnceAgainResult<()> {
    if raw.contains("{{closure}}") {
        return Err(OnceAgainError::unsupported(
            raw,
            "closures have no stable name, use a `named` constructor",
        ));
    }
    if raw.starts_with("fn(")
        || raw.starts_with("for<")
        || raw.starts_with("unsafe ")
        || raw.starts_with("extern ")
    {
        return Err(OnceAgainError::unsupported(
            raw,
            "function pointers have no item name, use a `named` constructor",
        ));
    }
    if raw.contains("dyn ") {
        return Err(OnceAgainError::unsupported(
            raw,
            "trait objects have no item name, use a `named` constructor",
        ));
    }
    Ok(())
}

fn validate_name(name: &str) -> OnceAgainResult<String> {
    if name.trim().is_empty() {
        return Err(OnceAgainError::unsupported(name, "empty qualified name"));
    }
    if name.contains(|c: char| matches!(c, '/' | '\\' | '\0')) {
        return Err(OnceAgainError::unsupported(
            name,
            "qualified names cannot contain path separators",
        ));
    }
    if name.starts_with('.') {
        return Err(OnceAgainError::unsupported(
            name,
            "qualified names cannot start with '.'",
        ));
    }
    Ok(name.to_string())
}

/// Last `::` segment outside of generic brackets
fn last_segment(path: &str) -> &str {
    let bytes = path.as_bytes();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                start = i + 2;
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    &path[start..]
}

/// Render a Rust path as a file-name-safe dotted name
///
/// `::` becomes `.`, ASCII alphanumerics and `_` are kept, and every other
/// byte is written as `%XX`. Distinct paths give distinct names.
fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(c) = rest.chars().next() {
        if let Some(tail) = rest.strip_prefix("::") {
            out.push('.');
            rest = tail;
            continue;
        }
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{:02X}", byte));
            }
        }
        rest = &rest[c.len_utf8()..];
    }
    out
}
