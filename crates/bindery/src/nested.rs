//! View models that own a collection of child view models.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bindery_core::logging::targets;
use bindery_core::{
    ChangeNotifier, CollectionChange, CollectionLink, ConnectionGuard, Disposable, LifecycleError,
    Model, Notify, ObservableCollection, Result,
};

use crate::sync::{CollectionSynchronizer, ViewModelFactory};
use crate::view_model::{ViewModel, ViewModelBase};

type Extractor<M, CM> = Arc<dyn Fn(&M) -> Arc<ObservableCollection<Arc<CM>>> + Send + Sync>;

/// A view model of `M` exposing one child view model per element of a
/// collection held by its model.
///
/// Child view model notifications reach this view model's subscribers with
/// the child as sender. Structural changes of the children raise
/// `Collection_ViewModels` and selection changes raise `Selection`.
///
/// # Example
///
/// ```
/// use bindery::ViewModelBase;
/// use bindery::nested::HierarchicalViewModel;
/// use bindery::sync::ViewModelFactory;
/// use bindery_core::{ChangeNotifier, Model, Notify, ObservableCollection};
/// use std::sync::Arc;
///
/// struct Track {
///     notifier: ChangeNotifier,
/// }
///
/// impl Notify for Track {
///     fn notifier(&self) -> &ChangeNotifier {
///         &self.notifier
///     }
/// }
///
/// impl Model for Track {}
///
/// struct Album {
///     notifier: ChangeNotifier,
///     tracks: Arc<ObservableCollection<Arc<Track>>>,
/// }
///
/// impl Notify for Album {
///     fn notifier(&self) -> &ChangeNotifier {
///         &self.notifier
///     }
/// }
///
/// let album_vm = HierarchicalViewModel::new(
///     ViewModelFactory::new(|| Arc::new(ViewModelBase::<Track>::new())),
///     |album: &Album| album.tracks.clone(),
/// );
/// let tracks = Arc::new(ObservableCollection::new());
/// album_vm
///     .set_model(Some(Arc::new(Album { notifier: ChangeNotifier::new(), tracks: tracks.clone() })))
///     .unwrap();
///
/// tracks.push(Arc::new(Track { notifier: ChangeNotifier::new() }));
/// assert_eq!(album_vm.view_models().len(), 1);
/// ```
pub struct HierarchicalViewModel<M: ?Sized, CM: ?Sized, CV: ?Sized> {
    base: ViewModelBase<M>,
    children: CollectionSynchronizer<CM, CV>,
    extract: Extractor<M, CM>,
    _collection_link: CollectionLink,
    _selection_link: ConnectionGuard<CollectionChange<Arc<CV>>>,
}

impl<M, CM, CV> HierarchicalViewModel<M, CM, CV>
where
    M: ?Sized + Notify,
    CM: ?Sized + Model,
    CV: ?Sized + ViewModel<Model = CM>,
{
    /// Create a view model whose children come from `extract(model)`.
    pub fn new<F>(factory: ViewModelFactory<CV>, extract: F) -> Self
    where
        F: Fn(&M) -> Arc<ObservableCollection<Arc<CM>>> + Send + Sync + 'static,
    {
        let base = ViewModelBase::new();
        let children: CollectionSynchronizer<CM, CV> = CollectionSynchronizer::new(factory);
        let collection_link = base
            .notifier()
            .observe_collection("ViewModels", children.view_models());

        let weak = base.notifier().downgrade();
        let selection_link = children.selection().connect_scoped(move |_| {
            if let Some(notifier) = weak.upgrade() {
                notifier.raise("Selection");
            }
        });

        Self {
            base,
            children,
            extract: Arc::new(extract),
            _collection_link: collection_link,
            _selection_link: selection_link,
        }
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        self.base.notifier()
    }

    pub fn model(&self) -> Option<Arc<M>> {
        self.base.model()
    }

    /// Point the children at the collection extracted from `model` (an empty
    /// one for `None`), then wrap `model`.
    ///
    /// Fails without wrapping `model` when the children were disposed.
    pub fn set_model(&self, model: Option<Arc<M>>) -> Result<()> {
        let child_models = model
            .as_deref()
            .map_or_else(|| Arc::new(ObservableCollection::new()), |m| (self.extract)(m));
        self.children.set_model(child_models)?;
        self.base.set_model(model);
        Ok(())
    }

    /// The child model collection of the current model.
    pub fn child_models(&self) -> Result<Arc<ObservableCollection<Arc<CM>>>> {
        if self.base.model().is_none() {
            return Err(LifecycleError::ModelNotSet {
                operation: "child_models",
            }
            .into());
        }
        Ok(self.children.model())
    }

    /// The child view models.
    pub fn view_models(&self) -> &Arc<ObservableCollection<Arc<CV>>> {
        self.children.view_models()
    }

    /// The synchronizer producing the child view models.
    pub fn children(&self) -> &CollectionSynchronizer<CM, CV> {
        &self.children
    }

    pub fn selection(&self) -> &Arc<ObservableCollection<Arc<CV>>> {
        self.children.selection()
    }

    pub fn select(&self, view_model: Option<&Arc<CV>>) -> Result<()> {
        self.children.select_view_model(view_model)
    }

    pub fn replace_selection(&self, view_models: Vec<Arc<CV>>) -> Result<()> {
        self.children.replace_selection(view_models)
    }

    /// Re-raise "all properties changed".
    pub fn sync(&self) {
        self.base.sync();
    }

    pub fn dispose(&self) {
        self.children.dispose();
        self.base.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.base.is_disposed()
    }
}

impl<M, CM, CV> Notify for HierarchicalViewModel<M, CM, CV>
where
    M: ?Sized + Notify,
    CM: ?Sized + Model,
    CV: ?Sized + ViewModel<Model = CM>,
{
    fn notifier(&self) -> &ChangeNotifier {
        self.base.notifier()
    }
}

impl<M, CM, CV> ViewModel for HierarchicalViewModel<M, CM, CV>
where
    M: ?Sized + Notify,
    CM: ?Sized + Model,
    CV: ?Sized + ViewModel<Model = CM>,
{
    type Model = M;

    fn model(&self) -> Option<Arc<M>> {
        HierarchicalViewModel::model(self)
    }

    fn set_model(&self, model: Option<Arc<M>>) {
        if let Err(err) = HierarchicalViewModel::set_model(self, model) {
            tracing::warn!(target: targets::VIEW_MODEL, %err, "model not assigned");
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<M, CM, CV> Disposable for HierarchicalViewModel<M, CM, CV>
where
    M: ?Sized + Notify,
    CM: ?Sized + Model,
    CV: ?Sized + ViewModel<Model = CM>,
{
    fn dispose(&self) {
        HierarchicalViewModel::dispose(self);
    }

    fn is_disposed(&self) -> bool {
        HierarchicalViewModel::is_disposed(self)
    }
}

impl<M, CM, CV> fmt::Debug for HierarchicalViewModel<M, CM, CV>
where
    M: ?Sized + Notify,
    CM: ?Sized + Model,
    CV: ?Sized + ViewModel<Model = CM>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HierarchicalViewModel")
            .field("base", &self.base)
            .field("children", &self.children)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindery_core::{BinderyError, Property, PropertyChanged};
    use parking_lot::Mutex;

    struct Track {
        notifier: ChangeNotifier,
        title: Property<String>,
    }

    impl Notify for Track {
        fn notifier(&self) -> &ChangeNotifier {
            &self.notifier
        }
    }

    impl Model for Track {}

    struct Album {
        notifier: ChangeNotifier,
        tracks: Arc<ObservableCollection<Arc<Track>>>,
    }

    impl Notify for Album {
        fn notifier(&self) -> &ChangeNotifier {
            &self.notifier
        }
    }

    fn track(title: &str) -> Arc<Track> {
        Arc::new(Track {
            notifier: ChangeNotifier::new(),
            title: Property::new("Title", title.to_string()),
        })
    }

    fn album(tracks: Vec<Arc<Track>>) -> Arc<Album> {
        Arc::new(Album {
            notifier: ChangeNotifier::new(),
            tracks: Arc::new(ObservableCollection::from_vec(tracks)),
        })
    }

    type AlbumVm = HierarchicalViewModel<Album, Track, ViewModelBase<Track>>;

    fn album_vm() -> AlbumVm {
        HierarchicalViewModel::new(
            ViewModelFactory::new(|| Arc::new(ViewModelBase::new())),
            |album: &Album| album.tracks.clone(),
        )
    }

    fn recorder(notifier: &ChangeNotifier) -> Arc<Mutex<Vec<PropertyChanged>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        notifier.connect(move |e| events_clone.lock().push(e.clone()));
        events
    }

    #[test]
    fn test_children_follow_model() {
        let vm = album_vm();
        assert!(matches!(
            vm.child_models(),
            Err(BinderyError::Lifecycle(LifecycleError::ModelNotSet { .. }))
        ));

        let a = album(vec![track("one"), track("two")]);
        vm.set_model(Some(a.clone())).unwrap();
        assert_eq!(vm.view_models().len(), 2);
        assert!(Arc::ptr_eq(&vm.child_models().unwrap(), &a.tracks));

        vm.set_model(None).unwrap();
        assert!(vm.view_models().is_empty());
    }

    #[test]
    fn test_child_notifications_forwarded() {
        let t = track("one");
        let vm = album_vm();
        vm.set_model(Some(album(vec![t.clone()]))).unwrap();
        let events = recorder(vm.notifier());

        t.title.set(&t.notifier, "uno".into());
        vm.child_models().unwrap().push(track("two"));

        let events = events.lock();
        let child_id = vm.view_models().get(0).unwrap().notifier().id();
        assert_eq!(events[0].sender, child_id);
        assert_eq!(events[0].property(), Some("Title"));
        assert!(
            events
                .iter()
                .any(|e| e.property() == Some("Collection_ViewModels") && e.sender == vm.notifier().id())
        );
    }

    #[test]
    fn test_set_model_after_children_disposed() {
        let vm = album_vm();
        vm.children().dispose();

        let result = vm.set_model(Some(album(vec![track("one")])));

        assert!(matches!(
            result,
            Err(BinderyError::Lifecycle(LifecycleError::Disposed { .. }))
        ));
        assert!(vm.model().is_none());
    }

    #[test]
    fn test_selection_raised() {
        let vm = album_vm();
        vm.set_model(Some(album(vec![track("one")]))).unwrap();
        let events = recorder(vm.notifier());

        let first = vm.view_models().get(0).unwrap();
        vm.select(Some(&first)).unwrap();

        assert_eq!(
            events.lock().iter().filter(|e| e.property() == Some("Selection")).count(),
            1
        );
    }
}
