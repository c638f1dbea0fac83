//! Integration tests for component registries.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use bindery::locator::{ComponentType, Controller, Locators, View};
use bindery::{BinderyConfig, RegistryError};

type Shown = Arc<Mutex<Vec<&'static str>>>;

struct ListView;
struct GridView;

impl View for ListView {
    fn set_view_model(&self, _view_model: Option<Arc<dyn Any + Send + Sync>>) {}
}

impl View for GridView {
    fn set_view_model(&self, _view_model: Option<Arc<dyn Any + Send + Sync>>) {}
}

struct EventsController {
    log: Shown,
}

impl Controller for EventsController {
    fn set_view_model(&self, _view_model: Option<Arc<dyn Any + Send + Sync>>) {}

    fn start(&self) {
        self.log.lock().push("start");
    }

    fn stop(&self) {
        self.log.lock().push("stop");
    }
}

fn built_by(log: &Shown, name: &'static str) -> impl Fn() -> Box<dyn View> + Send + Sync + 'static {
    let log = log.clone();
    move || {
        log.lock().push(name);
        match name {
            "list" => Box::new(ListView) as Box<dyn View>,
            _ => Box::new(GridView),
        }
    }
}

#[test]
fn test_highest_priority_wins() {
    let locators = Locators::new();
    let built: Shown = Arc::new(Mutex::new(Vec::new()));
    locators
        .views
        .register("Events", &ComponentType::of::<ListView>().provides(built_by(&built, "list")), 1)
        .unwrap();
    locators
        .views
        .register("Events", &ComponentType::of::<GridView>().provides(built_by(&built, "grid")), 5)
        .unwrap();

    assert!(locators.views.resolve("Events").is_some());
    assert_eq!(*built.lock(), vec!["grid"]);

    built.lock().clear();
    assert_eq!(locators.views.resolve_all("Events").len(), 2);
    assert_eq!(*built.lock(), vec!["list", "grid"]);

    assert!(locators.views.resolve("Missing").is_none());
}

#[test]
fn test_component_needs_capability() {
    let locators = Locators::new();
    let view_only = ComponentType::of::<ListView>().provides::<dyn View>(|| Box::new(ListView));

    let err = locators.controllers.register("Events", &view_only, 0).unwrap_err();
    assert!(matches!(err, RegistryError::TypeMismatch { .. }));
    assert!(locators.controllers.is_empty());
}

#[test]
fn test_controllers_from_config() {
    let config = BinderyConfig::from_toml_str("[registry]\ndefault_priority = 3\n").unwrap();
    let locators = Locators::from_config(&config.registry);
    let log: Shown = Arc::new(Mutex::new(Vec::new()));

    let controller_log = log.clone();
    let controller = ComponentType::of::<EventsController>().provides::<dyn Controller>(move || {
        Box::new(EventsController {
            log: controller_log.clone(),
        })
    });
    locators.controllers.register_default("Events", &controller).unwrap();
    locators.controllers.register_with("Events", 2, || {
        Box::new(EventsController {
            log: Arc::new(Mutex::new(Vec::new())),
        })
    });

    let resolved = locators.controllers.resolve("Events").unwrap();
    resolved.start();
    resolved.stop();
    assert_eq!(*log.lock(), vec!["start", "stop"]);
}
