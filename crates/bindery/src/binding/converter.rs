//! Value converters for property bindings.
//!
//! A [`Converter<T, U>`] turns a view model value `T` into a view value `U`
//! and, for two-way bindings, back again. A converter that cannot handle a
//! direction says so through [`Converter::can_convert`] or
//! [`Converter::can_convert_back`]; bindings check this when they are built.

use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;

/// Converts values between a view model type and a view type.
pub trait Converter<T, U>: Send + Sync {
    /// Whether `convert` is supported.
    fn can_convert(&self) -> bool {
        true
    }

    /// Whether `convert_back` is supported.
    fn can_convert_back(&self) -> bool {
        true
    }

    /// View model value to view value. `None` when the value is not convertible.
    fn convert(&self, value: T) -> Option<U>;

    /// View value to view model value. `None` when the value is not convertible.
    fn convert_back(&self, value: U) -> Option<T>;
}

/// Passes values through unchanged.
pub struct IdentityConverter<T>(PhantomData<fn(T) -> T>);

impl<T> IdentityConverter<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for IdentityConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Converter<T, T> for IdentityConverter<T> {
    fn convert(&self, value: T) -> Option<T> {
        Some(value)
    }

    fn convert_back(&self, value: T) -> Option<T> {
        Some(value)
    }
}

type ConvertFn<A, B> = Box<dyn Fn(A) -> Option<B> + Send + Sync>;

/// A converter built from closures; either direction may be left out.
///
/// # Example
///
/// ```
/// use bindery::binding::{Converter, FnConverter};
///
/// let percent = FnConverter::new(|v: f64| Some(format!("{:.0}%", v * 100.0)))
///     .with_back(|s: String| s.trim_end_matches('%').parse::<f64>().ok().map(|v| v / 100.0));
///
/// assert_eq!(percent.convert(0.25).as_deref(), Some("25%"));
/// assert_eq!(percent.convert_back("50%".into()), Some(0.5));
/// ```
pub struct FnConverter<T, U> {
    forward: Option<ConvertFn<T, U>>,
    backward: Option<ConvertFn<U, T>>,
}

impl<T, U> FnConverter<T, U> {
    /// A converter with only the forward direction.
    pub fn new<F>(forward: F) -> Self
    where
        F: Fn(T) -> Option<U> + Send + Sync + 'static,
    {
        Self {
            forward: Some(Box::new(forward)),
            backward: None,
        }
    }

    /// A converter with only the backward direction.
    pub fn back_only<B>(backward: B) -> Self
    where
        B: Fn(U) -> Option<T> + Send + Sync + 'static,
    {
        Self {
            forward: None,
            backward: Some(Box::new(backward)),
        }
    }

    /// Add the backward direction.
    pub fn with_back<B>(mut self, backward: B) -> Self
    where
        B: Fn(U) -> Option<T> + Send + Sync + 'static,
    {
        self.backward = Some(Box::new(backward));
        self
    }
}

impl<T, U> Converter<T, U> for FnConverter<T, U> {
    fn can_convert(&self) -> bool {
        self.forward.is_some()
    }

    fn can_convert_back(&self) -> bool {
        self.backward.is_some()
    }

    fn convert(&self, value: T) -> Option<U> {
        self.forward.as_ref().and_then(|f| f(value))
    }

    fn convert_back(&self, value: U) -> Option<T> {
        self.backward.as_ref().and_then(|b| b(value))
    }
}

/// Converts to text with `Display` and back with `FromStr`.
pub struct DisplayParseConverter<T>(PhantomData<fn(T) -> T>);

impl<T> DisplayParseConverter<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for DisplayParseConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Display + FromStr> Converter<T, String> for DisplayParseConverter<T> {
    fn convert(&self, value: T) -> Option<String> {
        Some(value.to_string())
    }

    fn convert_back(&self, value: String) -> Option<T> {
        value.trim().parse().ok()
    }
}
