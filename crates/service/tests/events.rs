//! Event-driven reconciliation: hot-plug, disconnection, card removal

mod common;

use std::sync::Arc;

use cardbroker_core::CardReaderEventKind;
use cardbroker_service::{
    CardResourceProfile, CardResourceService, PluginsConfigurator,
};
use common::*;

/// Observable plugin with both plugin and reader monitoring enabled
fn observed_service(
    plugin: Arc<MockObservablePlugin>,
    profile: CardResourceProfile,
) -> Arc<CardResourceService> {
    let service = CardResourceService::new();
    service
        .configurator()
        .with_plugins(
            PluginsConfigurator::builder()
                .add_plugin_with_monitoring(
                    plugin,
                    SetupRecorder::new(),
                    Some(Arc::new(NoopPluginHandler)),
                    Some(Arc::new(NoopReaderHandler)),
                )
                .unwrap()
                .build()
                .unwrap(),
        )
        .unwrap()
        .with_card_resource_profiles(vec![profile])
        .unwrap()
        .configure()
        .unwrap();
    service.start().unwrap();
    service
}

#[test]
fn hot_plugged_reader_becomes_allocatable() {
    let cards = CardTable::new();
    let plugin = MockObservablePlugin::new("plugin-1", Vec::new());
    let profile = CardResourceProfile::builder("profile-1", ProfileMatcher::any(&cards))
        .build()
        .unwrap();
    let service = observed_service(Arc::clone(&plugin), profile);
    assert_eq!(plugin.observer_count(), 1);

    // Nothing to allocate yet
    assert!(service.get_card_resource("profile-1").unwrap().is_none());

    cards.insert("reader-1", card("6F00"));
    plugin.connect_reader(MockReader::new("reader-1"));

    let resource = service.get_card_resource("profile-1").unwrap().unwrap();
    assert_eq!(resource.reader().name(), "reader-1");
}

#[test]
fn hot_plugged_reader_rejected_by_every_profile_is_dropped() {
    let cards = CardTable::new();
    let plugin = MockObservablePlugin::new("plugin-1", Vec::new());
    let profile = CardResourceProfile::builder("profile-1", ProfileMatcher::any(&cards))
        .with_reader_name_regex("^payment-.*$")
        .unwrap()
        .build()
        .unwrap();
    let service = observed_service(Arc::clone(&plugin), profile);

    cards.insert("reader-1", card("6F00"));
    let reader = MockObservableReader::new("reader-1");
    plugin.connect_reader(reader.clone());

    // The reader was not accepted, so no observation started on it and
    // nothing is allocatable
    assert_eq!(reader.observer_count(), 0);
    assert!(service.get_card_resource("profile-1").unwrap().is_none());
}

#[test]
fn disconnected_reader_loses_its_resources() {
    let cards = CardTable::new();
    cards.insert("reader-1", card("6F00"));
    let plugin = MockObservablePlugin::new("plugin-1", vec![MockReader::new("reader-1")]);
    let profile = CardResourceProfile::builder("profile-1", ProfileMatcher::any(&cards))
        .build()
        .unwrap();
    let service = observed_service(Arc::clone(&plugin), profile);

    let resource = service.get_card_resource("profile-1").unwrap().unwrap();
    service.release_card_resource(&resource).unwrap();

    plugin.disconnect_reader("reader-1");
    assert!(service.get_card_resource("profile-1").unwrap().is_none());
}

#[test]
fn observed_reader_gets_detection_started() {
    let cards = CardTable::new();
    cards.insert("reader-1", card("6F00"));
    let reader = MockObservableReader::new("reader-1");
    let plugin = MockObservablePlugin::new("plugin-1", vec![reader.clone()]);
    let profile = CardResourceProfile::builder("profile-1", ProfileMatcher::any(&cards))
        .build()
        .unwrap();
    let _service = observed_service(plugin, profile);

    assert_eq!(reader.observer_count(), 1);
    assert!(reader.is_detecting());
}

#[test]
fn card_removal_event_purges_the_resource() {
    let cards = CardTable::new();
    cards.insert("reader-1", card("6F00"));
    let reader = MockObservableReader::new("reader-1");
    let plugin = MockObservablePlugin::new("plugin-1", vec![reader.clone()]);
    let profile = CardResourceProfile::builder("profile-1", ProfileMatcher::any(&cards))
        .build()
        .unwrap();
    let service = observed_service(plugin, profile);

    let resource = service.get_card_resource("profile-1").unwrap().unwrap();
    service.release_card_resource(&resource).unwrap();

    cards.remove("reader-1");
    reader.emit(CardReaderEventKind::CardRemoved);

    assert!(service.get_card_resource("profile-1").unwrap().is_none());
}

#[test]
fn card_insertion_event_creates_the_resource() {
    let cards = CardTable::new();
    let reader = MockObservableReader::new("reader-1");
    let plugin = MockObservablePlugin::new("plugin-1", vec![reader.clone()]);
    let profile = CardResourceProfile::builder("profile-1", ProfileMatcher::any(&cards))
        .build()
        .unwrap();
    let service = observed_service(plugin, profile);

    // Empty reader at start
    assert!(service.get_card_resource("profile-1").unwrap().is_none());

    cards.insert("reader-1", card("6F00"));
    reader.emit(CardReaderEventKind::CardInserted);

    let resource = service.get_card_resource("profile-1").unwrap().unwrap();
    assert_eq!(resource.reader().name(), "reader-1");
}

#[test]
fn reinserting_an_equivalent_card_reuses_the_resource() {
    let cards = CardTable::new();
    cards.insert("reader-1", card("6F00"));
    let reader = MockObservableReader::new("reader-1");
    let plugin = MockObservablePlugin::new("plugin-1", vec![reader.clone()]);
    let profile = CardResourceProfile::builder("profile-1", ProfileMatcher::any(&cards))
        .build()
        .unwrap();
    let service = observed_service(plugin, profile);

    let first = service.get_card_resource("profile-1").unwrap().unwrap();
    service.release_card_resource(&first).unwrap();

    // Same card seen again: the existing resource is matched, not duplicated
    reader.emit(CardReaderEventKind::CardInserted);

    let second = service.get_card_resource("profile-1").unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn events_after_stop_are_dropped() {
    let cards = CardTable::new();
    let plugin = MockObservablePlugin::new("plugin-1", Vec::new());
    let profile = CardResourceProfile::builder("profile-1", ProfileMatcher::any(&cards))
        .build()
        .unwrap();
    let service = observed_service(Arc::clone(&plugin), profile);

    service.stop();
    cards.insert("reader-1", card("6F00"));
    // The observer was removed on stop; even a direct event would be dropped
    plugin.connect_reader(MockReader::new("reader-1"));
    assert_eq!(plugin.observer_count(), 0);
    assert!(service.get_card_resource("profile-1").is_err());
}
