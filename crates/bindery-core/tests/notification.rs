//! Integration tests for change notification across notifiers, properties
//! and collections.

use std::sync::Arc;

use parking_lot::Mutex;

use bindery_core::{
    ChangeNotifier, DisposableScope, Model, Notify, ObservableCollection, Property, PropertyChanged,
};

struct Team {
    notifier: ChangeNotifier,
    name: Property<String>,
    score: Property<u32>,
}

impl Notify for Team {
    fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

impl Model for Team {}

fn team(name: &str) -> Arc<Team> {
    Arc::new(Team {
        notifier: ChangeNotifier::new(),
        name: Property::new("Name", name.to_string()),
        score: Property::unchecked("Score", 0),
    })
}

fn record(notifier: &ChangeNotifier) -> Arc<Mutex<Vec<PropertyChanged>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    notifier.connect(move |e| events_clone.lock().push(e.clone()));
    events
}

#[test]
fn test_property_changes_mark_and_emit() {
    let home = team("Home");
    let events = record(&home.notifier);

    assert!(!home.name.set(&home.notifier, "Home".into()));
    assert!(!home.notifier.is_changed());

    assert!(home.name.set(&home.notifier, "Away".into()));
    assert!(home.score.set(&home.notifier, 0));
    assert!(home.notifier.is_changed());

    let names: Vec<_> = events.lock().iter().map(|e| e.property().map(str::to_owned)).collect();
    assert_eq!(names, vec![Some("Name".to_string()), Some("Score".to_string())]);
}

#[test]
fn test_ignored_events_still_mark_changed() {
    let home = team("Home");
    let events = record(&home.notifier);

    home.notifier.set_ignore_events(true);
    home.name.set(&home.notifier, "Away".into());
    home.notifier.set_ignore_events(false);

    assert!(events.lock().is_empty());
    assert!(home.notifier.is_changed());
}

#[test]
fn test_league_observes_teams() {
    let league = ChangeNotifier::new();
    let teams = Arc::new(ObservableCollection::from_vec(vec![team("A"), team("B")]));
    let _link = league.observe_collection("Teams", &teams);
    let events = record(&league);

    let a = teams.get(0).unwrap();
    a.score.set(&a.notifier, 3);
    let removed = teams.remove_at(1);
    removed.score.set(&removed.notifier, 1);
    teams.push(team("C"));

    let events = events.lock();
    let summary: Vec<_> = events
        .iter()
        .map(|e| (e.sender == a.notifier.id(), e.property().unwrap_or("*").to_string()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (true, "Score".to_string()),
            (false, "Collection_Teams".to_string()),
            (false, "Collection_Teams".to_string()),
        ]
    );
}

#[test]
fn test_scope_releases_subscriptions() {
    let home = team("Home");
    let scope = DisposableScope::new();
    scope.keep(home.notifier.connect_scoped(|_| {}));
    assert_eq!(home.notifier.subscriber_count(), 1);

    assert!(scope.dispose());
    assert!(!scope.dispose());
    assert_eq!(home.notifier.subscriber_count(), 0);
}
