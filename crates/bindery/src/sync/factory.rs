//! Polymorphic view model creation.

use std::any::{TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use bindery_core::Model;
use bindery_core::logging::targets;

use crate::view_model::ViewModel;

type Constructor<V> = Arc<dyn Fn() -> Arc<V> + Send + Sync>;

struct TypeMapping<V: ?Sized> {
    model_type: TypeId,
    model_type_name: &'static str,
    construct: Constructor<V>,
}

/// Creates view models for models, choosing the view model type from the
/// model's runtime type.
///
/// Resolution order for a model:
///
/// 1. a mapping registered for the model's exact runtime type
/// 2. the first registered mapping (in registration order) for one of the
///    supertypes listed by [`Model::type_lineage`]
/// 3. the default constructor
///
/// # Example
///
/// ```
/// use bindery::ViewModelBase;
/// use bindery::sync::ViewModelFactory;
/// use bindery_core::{ChangeNotifier, Model, Notify};
/// use std::sync::Arc;
///
/// struct Note {
///     notifier: ChangeNotifier,
/// }
///
/// impl Notify for Note {
///     fn notifier(&self) -> &ChangeNotifier {
///         &self.notifier
///     }
/// }
///
/// impl Model for Note {}
///
/// let factory = ViewModelFactory::new(|| Arc::new(ViewModelBase::<Note>::new()));
/// let vm = factory.create(&Arc::new(Note { notifier: ChangeNotifier::new() }));
/// assert!(vm.model().is_some());
/// ```
pub struct ViewModelFactory<V: ?Sized> {
    mappings: RwLock<Vec<TypeMapping<V>>>,
    default: Constructor<V>,
}

impl<V: ?Sized + ViewModel> ViewModelFactory<V>
where
    V::Model: Model,
{
    /// A factory using `default` for models without a registered mapping.
    pub fn new<F>(default: F) -> Self
    where
        F: Fn() -> Arc<V> + Send + Sync + 'static,
    {
        Self {
            mappings: RwLock::new(Vec::new()),
            default: Arc::new(default),
        }
    }

    /// Use `construct` for models of type `T` and, unless a closer mapping
    /// exists, for models declaring `T` in their lineage.
    pub fn register<T: ?Sized + 'static, F>(&self, construct: F)
    where
        F: Fn() -> Arc<V> + Send + Sync + 'static,
    {
        let mut mappings = self.mappings.write();
        let model_type = TypeId::of::<T>();
        let mapping = TypeMapping {
            model_type,
            model_type_name: type_name::<T>(),
            construct: Arc::new(construct),
        };
        match mappings.iter_mut().find(|m| m.model_type == model_type) {
            Some(existing) => *existing = mapping,
            None => mappings.push(mapping),
        }
    }

    /// Number of registered type mappings.
    pub fn mapping_count(&self) -> usize {
        self.mappings.read().len()
    }

    /// Create a view model for `model` and assign the model to it.
    pub fn create(&self, model: &Arc<V::Model>) -> Arc<V> {
        let construct = self.constructor_for(model);
        let view_model = construct();
        view_model.set_model(Some(model.clone()));
        view_model
    }

    fn constructor_for(&self, model: &Arc<V::Model>) -> Constructor<V> {
        let lineage = model.type_lineage();
        let mappings = self.mappings.read();

        let exact = lineage
            .first()
            .and_then(|runtime| mappings.iter().find(|m| m.model_type == *runtime));
        let mapping = exact.or_else(|| {
            let supertypes = lineage.get(1..).unwrap_or_default();
            mappings.iter().find(|m| supertypes.contains(&m.model_type))
        });

        match mapping {
            Some(mapping) => {
                tracing::trace!(
                    target: targets::SYNC,
                    model = model.type_name(),
                    mapped = mapping.model_type_name,
                    "view model type resolved"
                );
                mapping.construct.clone()
            }
            None => self.default.clone(),
        }
    }
}

impl<V: ?Sized> fmt::Debug for ViewModelFactory<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.mappings.read().iter().map(|m| m.model_type_name).collect();
        f.debug_struct("ViewModelFactory").field("mappings", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view_model::ViewModelBase;
    use bindery_core::{ChangeNotifier, Notify};
    use std::any::Any;

    trait Shape: Model {}

    struct Square {
        notifier: ChangeNotifier,
    }
    struct Rect {
        notifier: ChangeNotifier,
    }

    impl Notify for Square {
        fn notifier(&self) -> &ChangeNotifier {
            &self.notifier
        }
    }
    impl Notify for Rect {
        fn notifier(&self) -> &ChangeNotifier {
            &self.notifier
        }
    }
    impl Model for Rect {}
    impl Model for Square {
        fn type_lineage(&self) -> Vec<TypeId> {
            vec![TypeId::of::<Square>(), TypeId::of::<Rect>()]
        }
    }
    impl Shape for Square {}
    impl Shape for Rect {}

    struct Tagged<const N: u8>(ViewModelBase<dyn Shape>);

    impl<const N: u8> Notify for Tagged<N> {
        fn notifier(&self) -> &ChangeNotifier {
            self.0.notifier()
        }
    }

    impl<const N: u8> ViewModel for Tagged<N> {
        type Model = dyn Shape;

        fn model(&self) -> Option<Arc<dyn Shape>> {
            self.0.model()
        }

        fn set_model(&self, model: Option<Arc<dyn Shape>>) {
            self.0.set_model(model);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    type ShapeVm = dyn ViewModel<Model = dyn Shape>;

    fn tagged<const N: u8>() -> Arc<ShapeVm> {
        Arc::new(Tagged::<N>(ViewModelBase::new()))
    }

    fn tag(vm: &Arc<ShapeVm>) -> u8 {
        let any = vm.as_any();
        if any.is::<Tagged<0>>() {
            0
        } else if any.is::<Tagged<1>>() {
            1
        } else {
            2
        }
    }

    #[test]
    fn test_resolution_order() {
        let factory: ViewModelFactory<ShapeVm> = ViewModelFactory::new(tagged::<0>);
        let square: Arc<dyn Shape> = Arc::new(Square { notifier: ChangeNotifier::new() });
        let rect: Arc<dyn Shape> = Arc::new(Rect { notifier: ChangeNotifier::new() });

        assert_eq!(tag(&factory.create(&square)), 0);

        factory.register::<Rect, _>(tagged::<1>);
        assert_eq!(tag(&factory.create(&square)), 1);
        assert_eq!(tag(&factory.create(&rect)), 1);

        factory.register::<Square, _>(tagged::<2>);
        assert_eq!(tag(&factory.create(&square)), 2);
        assert_eq!(tag(&factory.create(&rect)), 1);
        assert_eq!(factory.mapping_count(), 2);
    }

    #[test]
    fn test_created_view_model_has_model() {
        let factory: ViewModelFactory<ShapeVm> = ViewModelFactory::new(tagged::<0>);
        let rect: Arc<dyn Shape> = Arc::new(Rect { notifier: ChangeNotifier::new() });
        let vm = factory.create(&rect);
        assert!(vm.model().is_some_and(|m| Arc::ptr_eq(&m, &rect)));
    }
}
