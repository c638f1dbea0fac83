//! Property bindings.
//!
//! A [`PropertyBinding`] keeps one view value in sync with one view model
//! property. The property is described by an [`Accessor`], an explicit
//! getter with an optional setter. Values travel through a [`Converter`]
//! when the view uses a different type than the view model.
//!
//! Invalid bindings are rejected when they are built:
//!
//! - a two-way binding needs a writable accessor
//! - the converter must support every direction the binding uses
//! - a view sink writing into a target object needs a writable accessor

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use bindery_core::logging::targets;
use bindery_core::{BindingError, ChildLink, ConversionDirection, Notify};

use super::converter::{Converter, IdentityConverter};
use super::{Binding, BindingHooks};

type Getter<V, T> = Arc<dyn Fn(&V) -> T + Send + Sync>;
type Setter<V, T> = Arc<dyn Fn(&V, T) + Send + Sync>;

/// A named property read (and optionally written) through closures.
///
/// # Example
///
/// ```
/// use bindery::binding::Accessor;
/// use bindery_core::{ChangeNotifier, Property};
///
/// struct Vm {
///     notifier: ChangeNotifier,
///     score: Property<u32>,
/// }
///
/// let score = Accessor::read_write(
///     "Score",
///     |vm: &Vm| vm.score.get(),
///     |vm: &Vm, value| {
///         vm.score.set(&vm.notifier, value);
///     },
/// );
/// assert!(score.is_writable());
/// ```
pub struct Accessor<V: ?Sized, T> {
    name: &'static str,
    get: Getter<V, T>,
    set: Option<Setter<V, T>>,
}

impl<V: ?Sized, T> Clone for Accessor<V, T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            get: self.get.clone(),
            set: self.set.clone(),
        }
    }
}

impl<V: ?Sized, T> Accessor<V, T> {
    /// An accessor without a setter.
    pub fn read_only<G>(name: &'static str, get: G) -> Self
    where
        G: Fn(&V) -> T + Send + Sync + 'static,
    {
        Self {
            name,
            get: Arc::new(get),
            set: None,
        }
    }

    /// An accessor with a getter and a setter.
    pub fn read_write<G, S>(name: &'static str, get: G, set: S) -> Self
    where
        G: Fn(&V) -> T + Send + Sync + 'static,
        S: Fn(&V, T) + Send + Sync + 'static,
    {
        Self {
            name,
            get: Arc::new(get),
            set: Some(Arc::new(set)),
        }
    }

    /// The property name matched against change notifications.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }

    pub fn get(&self, target: &V) -> T {
        (self.get)(target)
    }

    /// Write through the setter. Returns `false` for read-only accessors.
    pub fn set(&self, target: &V, value: T) -> bool {
        match &self.set {
            Some(set) => {
                set(target, value);
                true
            }
            None => false,
        }
    }
}

impl<V: ?Sized, T> fmt::Debug for Accessor<V, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("name", &self.name)
            .field("writable", &self.is_writable())
            .finish()
    }
}

/// Direction of a property binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingMode {
    /// View model to view only.
    #[default]
    OneWay,
    /// View model to view, plus [`PropertyBinding::write`] from the view.
    TwoWay,
}

/// Where a property binding pushes values.
pub struct ViewSink<U> {
    push: Arc<dyn Fn(U) + Send + Sync>,
}

impl<U> Clone for ViewSink<U> {
    fn clone(&self) -> Self {
        Self {
            push: self.push.clone(),
        }
    }
}

impl<U: 'static> ViewSink<U> {
    /// Push values to a callback.
    pub fn callback<F>(push: F) -> Self
    where
        F: Fn(U) + Send + Sync + 'static,
    {
        Self { push: Arc::new(push) }
    }

    /// Push values into a property of a target object.
    pub fn property<W>(target: Arc<W>, accessor: Accessor<W, U>) -> Result<Self, BindingError>
    where
        W: ?Sized + Send + Sync + 'static,
    {
        if !accessor.is_writable() {
            return Err(BindingError::ReadOnlyTarget {
                property: accessor.name().to_string(),
            });
        }
        Ok(Self::callback(move |value| {
            accessor.set(&target, value);
        }))
    }

    fn push(&self, value: U) {
        (self.push)(value)
    }
}

struct SyncShared<V: ?Sized, T, U> {
    accessor: Accessor<V, T>,
    converter: Box<dyn Converter<T, U>>,
    sink: ViewSink<U>,
}

impl<V: ?Sized, T, U: 'static> SyncShared<V, T, U> {
    fn push_from(&self, view_model: &V) {
        let value = self.accessor.get(view_model);
        match self.converter.convert(value) {
            Some(converted) => self.sink.push(converted),
            None => tracing::warn!(
                target: targets::BINDING,
                property = self.accessor.name(),
                "value could not be converted for the view"
            ),
        }
    }
}

/// The hooks of a [`PropertyBinding`].
pub struct PropertySync<V: ?Sized, T, U> {
    shared: Arc<SyncShared<V, T, U>>,
    mode: BindingMode,
    subscription: Mutex<Option<ChildLink>>,
}

impl<V, T, U> BindingHooks<V> for PropertySync<V, T, U>
where
    V: ?Sized + Notify,
    T: 'static,
    U: 'static,
{
    fn bind_view_model(&self, view_model: Option<&Arc<V>>) {
        let Some(view_model) = view_model else {
            return;
        };

        let weak: Weak<V> = Arc::downgrade(view_model);
        let shared = self.shared.clone();
        let guard = view_model.notifier().connect_scoped(move |event| {
            if !event.affects(shared.accessor.name()) {
                return;
            }
            if let Some(view_model) = weak.upgrade() {
                shared.push_from(&view_model);
            }
        });
        *self.subscription.lock() = Some(guard);

        self.shared.push_from(view_model);
    }

    fn unbind_view_model(&self, _view_model: Option<&Arc<V>>) {
        let subscription = self.subscription.lock().take();
        drop(subscription);
    }
}

impl<V: ?Sized, T, U> fmt::Debug for PropertySync<V, T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertySync")
            .field("property", &self.shared.accessor.name())
            .field("mode", &self.mode)
            .field("subscribed", &self.subscription.lock().is_some())
            .finish()
    }
}

/// A binding between a view model property and a view value.
///
/// # Example
///
/// ```
/// use bindery::binding::{Accessor, DisplayParseConverter, BindingMode, PropertyBinding, ViewSink};
/// use bindery_core::{ChangeNotifier, Notify, Property};
/// use parking_lot::Mutex;
/// use std::sync::Arc;
///
/// struct Vm {
///     notifier: ChangeNotifier,
///     goals: Property<u32>,
/// }
///
/// impl Notify for Vm {
///     fn notifier(&self) -> &ChangeNotifier {
///         &self.notifier
///     }
/// }
///
/// let text = Arc::new(Mutex::new(String::new()));
/// let shown = text.clone();
/// let binding = PropertyBinding::with_converter(
///     Accessor::read_write("Goals", |vm: &Vm| vm.goals.get(), |vm: &Vm, v| {
///         vm.goals.set(&vm.notifier, v);
///     }),
///     DisplayParseConverter::new(),
///     BindingMode::TwoWay,
///     ViewSink::callback(move |s| *shown.lock() = s),
/// )
/// .unwrap();
///
/// let vm = Arc::new(Vm { notifier: ChangeNotifier::new(), goals: Property::new("Goals", 1) });
/// binding.set_view_model(Some(vm.clone()));
/// assert_eq!(*text.lock(), "1");
///
/// assert!(binding.write("3".to_string()));
/// assert_eq!(vm.goals.get(), 3);
/// assert_eq!(*text.lock(), "3");
/// ```
pub type PropertyBinding<V, T, U = T> = Binding<V, PropertySync<V, T, U>>;

impl<V, T> Binding<V, PropertySync<V, T, T>>
where
    V: ?Sized + Notify,
    T: Send + 'static,
{
    /// A one-way binding pushing the property value unchanged.
    pub fn one_way(accessor: Accessor<V, T>, sink: ViewSink<T>) -> Self {
        Binding::new(PropertySync {
            shared: Arc::new(SyncShared {
                accessor,
                converter: Box::new(IdentityConverter::new()),
                sink,
            }),
            mode: BindingMode::OneWay,
            subscription: Mutex::new(None),
        })
    }

    /// A two-way binding without conversion.
    ///
    /// Fails when the accessor has no setter.
    pub fn two_way(accessor: Accessor<V, T>, sink: ViewSink<T>) -> Result<Self, BindingError> {
        Self::with_converter(accessor, IdentityConverter::new(), BindingMode::TwoWay, sink)
    }
}

impl<V, T, U> Binding<V, PropertySync<V, T, U>>
where
    V: ?Sized + Notify,
    T: 'static,
    U: 'static,
{
    /// A binding converting between the property type and the view type.
    pub fn with_converter<C>(
        accessor: Accessor<V, T>,
        converter: C,
        mode: BindingMode,
        sink: ViewSink<U>,
    ) -> Result<Self, BindingError>
    where
        C: Converter<T, U> + 'static,
    {
        let property = accessor.name().to_string();
        if !converter.can_convert() {
            return Err(BindingError::UnsupportedConversion {
                property,
                direction: ConversionDirection::Forward,
            });
        }
        if mode == BindingMode::TwoWay {
            if !accessor.is_writable() {
                return Err(BindingError::ReadOnlyTarget { property });
            }
            if !converter.can_convert_back() {
                return Err(BindingError::UnsupportedConversion {
                    property,
                    direction: ConversionDirection::Backward,
                });
            }
        }

        Ok(Binding::new(PropertySync {
            shared: Arc::new(SyncShared {
                accessor,
                converter: Box::new(converter),
                sink,
            }),
            mode,
            subscription: Mutex::new(None),
        }))
    }

    pub fn mode(&self) -> BindingMode {
        self.hooks().mode
    }

    /// The bound property name.
    pub fn property_name(&self) -> &'static str {
        self.hooks().shared.accessor.name()
    }

    /// Write a view value back into the current view model.
    ///
    /// Returns `true` when the setter ran. One-way bindings, bindings without
    /// a view model and values the converter rejects return `false`.
    pub fn write(&self, value: U) -> bool {
        let hooks = self.hooks();
        if hooks.mode != BindingMode::TwoWay {
            tracing::warn!(
                target: targets::BINDING,
                property = self.property_name(),
                "write on a one-way binding"
            );
            return false;
        }
        let Some(view_model) = self.view_model() else {
            return false;
        };
        let Some(value) = hooks.shared.converter.convert_back(value) else {
            tracing::warn!(
                target: targets::BINDING,
                property = self.property_name(),
                "view value could not be converted back"
            );
            return false;
        };
        hooks.shared.accessor.set(&view_model, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::converter::{DisplayParseConverter, FnConverter};
    use bindery_core::{ChangeNotifier, Property};

    struct Vm {
        notifier: ChangeNotifier,
        name: Property<Option<String>>,
        count: Property<i32>,
        label: Property<String>,
    }

    impl Notify for Vm {
        fn notifier(&self) -> &ChangeNotifier {
            &self.notifier
        }
    }

    fn vm() -> Arc<Vm> {
        Arc::new(Vm {
            notifier: ChangeNotifier::new(),
            name: Property::new("Name", None),
            count: Property::new("Count", 0),
            label: Property::new("Label", "Dog".into()),
        })
    }

    fn name_accessor() -> Accessor<Vm, Option<String>> {
        Accessor::read_write("Name", |vm: &Vm| vm.name.get(), |vm: &Vm, v| {
            vm.name.set(&vm.notifier, v);
        })
    }

    fn count_accessor() -> Accessor<Vm, i32> {
        Accessor::read_write("Count", |vm: &Vm| vm.count.get(), |vm: &Vm, v| {
            vm.count.set(&vm.notifier, v);
        })
    }

    fn capture<U: Send + 'static>() -> (Arc<Mutex<Vec<U>>>, ViewSink<U>) {
        let values = Arc::new(Mutex::new(Vec::new()));
        let values_clone = values.clone();
        (values, ViewSink::callback(move |v| values_clone.lock().push(v)))
    }

    #[test]
    fn test_one_way_pushes_initial_and_updates() {
        let (values, sink) = capture();
        let binding = PropertyBinding::one_way(name_accessor(), sink);
        let vm = vm();

        binding.set_view_model(Some(vm.clone()));
        vm.name.set(&vm.notifier, Some("foo".into()));
        vm.count.set(&vm.notifier, 3);

        assert_eq!(*values.lock(), vec![None, Some("foo".to_string())]);
    }

    #[test]
    fn test_notify_all_refreshes() {
        let (values, sink) = capture();
        let binding = PropertyBinding::one_way(count_accessor(), sink);
        let vm = vm();
        binding.set_view_model(Some(vm.clone()));

        vm.count.set_silent(9);
        vm.notifier.notify_all();

        assert_eq!(*values.lock(), vec![0, 9]);
    }

    #[test]
    fn test_converter_to_view_and_back() {
        let (values, sink) = capture();
        let binding = PropertyBinding::with_converter(
            count_accessor(),
            DisplayParseConverter::new(),
            BindingMode::TwoWay,
            sink,
        )
        .unwrap();
        let vm = vm();
        binding.set_view_model(Some(vm.clone()));

        vm.count.set(&vm.notifier, 32);
        assert_eq!(values.lock().last().map(String::as_str), Some("32"));

        assert!(binding.write("12".to_string()));
        assert_eq!(vm.count.get(), 12);
        assert!(!binding.write("twelve".to_string()));
        assert_eq!(vm.count.get(), 12);
    }

    #[test]
    fn test_rebinding_unsubscribes_old_view_model() {
        let (values, sink) = capture();
        let binding = PropertyBinding::two_way(name_accessor(), sink).unwrap();
        let first = vm();
        let second = vm();

        binding.set_view_model(Some(first.clone()));
        binding.set_view_model(Some(second.clone()));
        first.name.set(&first.notifier, Some("stale".into()));
        assert!(binding.write(Some("bar".into())));

        assert_eq!(first.name.get(), Some("stale".to_string()));
        assert_eq!(second.name.get(), Some("bar".to_string()));
        assert_eq!(first.notifier.subscriber_count(), 0);
        assert!(!values.lock().contains(&Some("stale".to_string())));
    }

    #[test]
    fn test_two_way_read_only_is_rejected() {
        let (_, sink) = capture();
        let label = Accessor::read_only("Label", |vm: &Vm| vm.label.get());
        let err = PropertyBinding::two_way(label, sink).unwrap_err();
        assert_eq!(
            err,
            BindingError::ReadOnlyTarget {
                property: "Label".into()
            }
        );
    }

    #[test]
    fn test_one_way_read_only_is_accepted() {
        let (values, sink) = capture();
        let label = Accessor::read_only("Label", |vm: &Vm| vm.label.get());
        let binding = PropertyBinding::one_way(label, sink);
        binding.set_view_model(Some(vm()));
        assert!(!binding.write("Cat".into()));
        assert_eq!(*values.lock(), vec!["Dog".to_string()]);
    }

    #[test]
    fn test_converter_direction_is_checked() {
        let (_, sink) = capture::<String>();
        let forward_only = FnConverter::new(|v: i32| Some(v.to_string()));
        let err = PropertyBinding::with_converter(
            count_accessor(),
            forward_only,
            BindingMode::TwoWay,
            sink.clone(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BindingError::UnsupportedConversion {
                direction: ConversionDirection::Backward,
                ..
            }
        ));

        let back_only = FnConverter::back_only(|s: String| s.parse().ok());
        let err = PropertyBinding::with_converter(count_accessor(), back_only, BindingMode::OneWay, sink)
            .unwrap_err();
        assert!(matches!(
            err,
            BindingError::UnsupportedConversion {
                direction: ConversionDirection::Forward,
                ..
            }
        ));
    }

    #[test]
    fn test_view_sink_into_target_property() {
        struct Label {
            notifier: ChangeNotifier,
            text: Property<Option<String>>,
        }

        let label = Arc::new(Label {
            notifier: ChangeNotifier::new(),
            text: Property::new("Text", None),
        });
        let sink = ViewSink::property(
            label.clone(),
            Accessor::read_write("Text", |l: &Label| l.text.get(), |l: &Label, v| {
                l.text.set(&l.notifier, v);
            }),
        )
        .unwrap();
        let binding = PropertyBinding::one_way(name_accessor(), sink);
        let vm = vm();
        binding.set_view_model(Some(vm.clone()));
        vm.name.set(&vm.notifier, Some("foo".into()));

        assert_eq!(label.text.get(), Some("foo".to_string()));

        let read_only = ViewSink::property(label, Accessor::read_only("Text", |l: &Label| l.text.get()));
        assert!(read_only.is_err());
    }

    #[test]
    fn test_dispose_after_clearing_view_model() {
        let (_, sink) = capture();
        let binding = PropertyBinding::one_way(count_accessor(), sink);
        let vm = vm();
        binding.set_view_model(Some(vm.clone()));
        binding.set_view_model(None);
        binding.dispose();
        assert_eq!(vm.notifier.subscriber_count(), 0);
    }
}
