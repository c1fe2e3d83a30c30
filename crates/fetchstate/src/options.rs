#![forbid(unsafe_code)]

//! Configuration records for each stage of the chain.
//!
//! Each record is immutable once handed to its stage. Layering follows two
//! rules:
//!
//! - **Scalars override.** `immediate`, `deep`, `abort_previous`, and
//!   `initial_data` set at call level win over the base level.
//! - **Transformers compose.** Parameter converters run call-layer first,
//!   then base-layer. Data converters run extraction first, then base-layer,
//!   then call-layer.
//!
//! Converters change the record's type parameters, so a parameter or data
//! shape that does not line up between layers is a compile error rather than
//! a runtime condition.

use std::fmt;
use std::rc::Rc;

pub(crate) type Convert<A, B> = Rc<dyn Fn(A) -> B>;
pub(crate) type Callback<D> = Rc<dyn Fn(&D)>;

pub(crate) fn identity<T: 'static>() -> Convert<T, T> {
    Rc::new(|value| value)
}

/// Scalar options shared by the base and call layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scalars {
    pub immediate: Option<bool>,
    pub deep: Option<bool>,
    pub abort_previous: Option<bool>,
}

impl Scalars {
    /// Fields set in `over` replace the ones in `self`.
    #[must_use]
    pub fn overlay(self, over: Scalars) -> Scalars {
        Scalars {
            immediate: over.immediate.or(self.immediate),
            deep: over.deep.or(self.deep),
            abort_previous: over.abort_previous.or(self.abort_previous),
        }
    }

    #[must_use]
    pub fn resolve(self) -> ResolvedScalars {
        ResolvedScalars {
            immediate: self.immediate.unwrap_or(false),
            deep: self.deep.unwrap_or(true),
            abort_previous: self.abort_previous.unwrap_or(false),
        }
    }
}

/// Effective scalars for one invocation after layering and defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedScalars {
    /// Execute once during setup. Default `false`.
    pub immediate: bool,
    /// Re-execute on nested mutation of an observable source. Default `true`.
    pub deep: bool,
    /// Abort in-flight executions when a new one starts. Default `false`.
    pub abort_previous: bool,
}

impl Default for ResolvedScalars {
    fn default() -> Self {
        Scalars::default().resolve()
    }
}

// ── Factory ─────────────────────────────────────────────────────────────────

/// Factory-level options: how business data is pulled out of a raw response.
pub struct FactoryOptions<R, B> {
    pub(crate) data_extract: Convert<R, B>,
}

impl<R: 'static> FactoryOptions<R, R> {
    /// No extraction: business data is the raw response.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data_extract: identity(),
        }
    }
}

impl<R: 'static> Default for FactoryOptions<R, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: 'static, B: 'static> FactoryOptions<R, B> {
    /// Extract business data from every raw response.
    #[must_use]
    pub fn data_extract(extract: impl Fn(R) -> B + 'static) -> Self {
        Self {
            data_extract: Rc::new(extract),
        }
    }
}

impl<R, B> Clone for FactoryOptions<R, B> {
    fn clone(&self) -> Self {
        Self {
            data_extract: Rc::clone(&self.data_extract),
        }
    }
}

impl<R, B> fmt::Debug for FactoryOptions<R, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryOptions").finish_non_exhaustive()
    }
}

// ── Layer options ───────────────────────────────────────────────────────────

/// Options for one layer (base or call).
///
/// - `I`: parameters this layer accepts.
/// - `O`: parameters this layer hands to the layer below.
/// - `A`: data this layer receives.
/// - `D`: data this layer produces.
pub struct LayerOptions<I, O, A, D> {
    pub(crate) convert_params: Convert<I, O>,
    pub(crate) convert_data: Convert<A, D>,
    pub(crate) on_finish: Option<Callback<D>>,
    pub(crate) on_success: Option<Callback<D>>,
    pub(crate) initial_data: Option<D>,
    pub(crate) scalars: Scalars,
}

/// Options shared by every invocation of one bound request function.
///
/// `AP` is what invocations pass down, `P` what the request function takes,
/// `B` the extracted business data, `D` the base-layer data.
pub type BaseOptions<AP, P, B, D> = LayerOptions<AP, P, B, D>;

/// Options for one invocation.
///
/// `CP` is what the caller supplies, `AP` what the base layer accepts, `D` the
/// base-layer data, `DD` the final data stored in the controller.
pub type CallOptions<CP, AP, D, DD> = LayerOptions<CP, AP, D, DD>;

impl<P: 'static, A: 'static> LayerOptions<P, P, A, A> {
    /// Identity converters, no callbacks, no scalar overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::convert_data(|data| data)
    }
}

impl<P: 'static, A: 'static> Default for LayerOptions<P, P, A, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: 'static, A: 'static, D: 'static> LayerOptions<P, P, A, D> {
    /// Start a record whose data converter is `convert`.
    ///
    /// The data type fixes the type of `on_finish`, `on_success`, and
    /// `initial_data`, so it is chosen first.
    #[must_use]
    pub fn convert_data(convert: impl Fn(A) -> D + 'static) -> Self {
        Self {
            convert_params: identity(),
            convert_data: Rc::new(convert),
            on_finish: None,
            on_success: None,
            initial_data: None,
            scalars: Scalars::default(),
        }
    }
}

impl<I: 'static, O: 'static, A: 'static, D: 'static> LayerOptions<I, O, A, D> {
    /// Reshape parameters before they reach the next layer.
    ///
    /// Composes with any converter already set: `convert` runs first.
    #[must_use]
    pub fn convert_params<N: 'static>(
        self,
        convert: impl Fn(N) -> I + 'static,
    ) -> LayerOptions<N, O, A, D> {
        let inner = self.convert_params;
        LayerOptions {
            convert_params: Rc::new(move |params| inner(convert(params))),
            convert_data: self.convert_data,
            on_finish: self.on_finish,
            on_success: self.on_success,
            initial_data: self.initial_data,
            scalars: self.scalars,
        }
    }

    /// Called with this layer's data after the first success in this
    /// layer's scope.
    #[must_use]
    pub fn on_finish(mut self, callback: impl Fn(&D) + 'static) -> Self {
        self.on_finish = Some(Rc::new(callback));
        self
    }

    /// Called with this layer's data after every success.
    #[must_use]
    pub fn on_success(mut self, callback: impl Fn(&D) + 'static) -> Self {
        self.on_success = Some(Rc::new(callback));
        self
    }

    /// Seed `data` before the first success.
    #[must_use]
    pub fn initial_data(mut self, data: D) -> Self {
        self.initial_data = Some(data);
        self
    }

    #[must_use]
    pub fn immediate(mut self, immediate: bool) -> Self {
        self.scalars.immediate = Some(immediate);
        self
    }

    #[must_use]
    pub fn deep(mut self, deep: bool) -> Self {
        self.scalars.deep = Some(deep);
        self
    }

    #[must_use]
    pub fn abort_previous(mut self, abort_previous: bool) -> Self {
        self.scalars.abort_previous = Some(abort_previous);
        self
    }

    #[must_use]
    pub fn scalars(&self) -> Scalars {
        self.scalars
    }
}

impl<I, O, A, D: fmt::Debug> fmt::Debug for LayerOptions<I, O, A, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerOptions")
            .field("on_finish", &self.on_finish.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("initial_data", &self.initial_data)
            .field("scalars", &self.scalars)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_defaults() {
        let resolved = Scalars::default().resolve();
        assert!(!resolved.immediate);
        assert!(resolved.deep);
        assert!(!resolved.abort_previous);
        assert_eq!(resolved, ResolvedScalars::default());
    }

    #[test]
    fn call_scalars_override_base() {
        let base = Scalars {
            immediate: Some(true),
            deep: Some(false),
            abort_previous: None,
        };
        let call = Scalars {
            immediate: Some(false),
            deep: None,
            abort_previous: Some(true),
        };
        let resolved = base.overlay(call).resolve();
        assert!(!resolved.immediate);
        assert!(!resolved.deep);
        assert!(resolved.abort_previous);
    }

    #[test]
    fn convert_params_composes_newest_first() {
        let opts: LayerOptions<u32, u32, (), ()> = LayerOptions::new();
        let opts = opts
            .convert_params(|n: u32| n * 2)
            .convert_params(|s: String| s.len() as u32);
        assert_eq!((opts.convert_params)("abc".to_string()), 6);
    }

    #[test]
    fn convert_data_sets_type() {
        let opts: LayerOptions<(), (), u8, String> =
            LayerOptions::convert_data(|n: u8| format!("#{n}")).initial_data("#0".into());
        assert_eq!((opts.convert_data)(7), "#7");
        assert_eq!(opts.initial_data.as_deref(), Some("#0"));
    }

    #[test]
    fn builder_records_scalars() {
        let opts: LayerOptions<(), (), (), ()> =
            LayerOptions::new().immediate(true).deep(false).abort_previous(true);
        assert_eq!(
            opts.scalars(),
            Scalars {
                immediate: Some(true),
                deep: Some(false),
                abort_previous: Some(true),
            }
        );
    }

    #[test]
    fn factory_identity_and_extract() {
        let ident = FactoryOptions::<u8, u8>::new();
        assert_eq!((ident.data_extract)(3), 3);

        let extract = FactoryOptions::data_extract(|pair: (u8, &'static str)| pair.1);
        assert_eq!((extract.data_extract)((1, "x")), "x");
    }

    #[test]
    fn debug_omits_closures() {
        let opts: LayerOptions<(), (), u8, u8> = LayerOptions::new().on_success(|_| {});
        let dbg = format!("{opts:?}");
        assert!(dbg.contains("on_success: true"));
        assert!(dbg.contains("on_finish: false"));
    }
}
