use hbnb_core::db::migrations::{latest_version, schema_version};
use hbnb_core::{
    Amenity, City, DbConfig, DbStorage, Entity, EntityKind, Place, Review, State, StorageBackend,
    StorageError, User,
};

fn open_storage() -> DbStorage {
    let mut storage = DbStorage::open(&DbConfig::in_memory()).unwrap();
    storage.reload().unwrap();
    storage
}

fn row_count(storage: &DbStorage, table: &str) -> i64 {
    storage
        .connection()
        .query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
            row.get(0)
        })
        .unwrap()
}

#[test]
fn operations_before_reload_report_closed_session() {
    let mut storage = DbStorage::open(&DbConfig::in_memory()).unwrap();
    let state = Entity::from(State::new("California"));

    assert!(!storage.is_open());
    assert!(matches!(storage.new(&state), Err(StorageError::SessionClosed)));
    assert!(matches!(storage.save(), Err(StorageError::SessionClosed)));
    assert!(matches!(storage.all(None), Err(StorageError::SessionClosed)));
}

#[test]
fn reload_creates_schema() {
    let storage = open_storage();

    assert_eq!(schema_version(storage.connection()).unwrap(), latest_version());
    for kind in EntityKind::ALL {
        assert_eq!(row_count(&storage, kind.table()), 0);
    }
}

#[test]
fn new_stages_without_writing_until_save() {
    let mut storage = open_storage();
    let state = Entity::from(State::new("California"));

    storage.new(&state).unwrap();
    assert_eq!(storage.staged_len(), 1);
    assert_eq!(row_count(&storage, "states"), 0);
    assert_eq!(storage.count(Some(EntityKind::State)).unwrap(), 0);

    storage.save().unwrap();
    assert_eq!(storage.staged_len(), 0);
    assert_eq!(storage.count(Some(EntityKind::State)).unwrap(), 1);
}

#[test]
fn save_then_get_returns_identical_object() {
    let mut storage = open_storage();

    let state = State::new("California");
    let city = City::new(state.base.id.clone(), "San Francisco");
    let user = User::new("host@hbnb.io", "pwd");
    let mut place = Place::new(city.base.id.clone(), user.base.id.clone(), "Loft");
    place.description = Some("Sunny".to_string());
    place.number_rooms = 3;
    place.number_bathrooms = 1;
    place.max_guest = 4;
    place.price_by_night = 120;
    place.latitude = Some(37.7749);
    place.longitude = Some(-122.4194);
    let review = Review::new(place.base.id.clone(), user.base.id.clone(), "Great stay");
    let amenity = Amenity::new("Wifi");

    let objects: Vec<Entity> = vec![
        review.into(),
        place.into(),
        amenity.into(),
        city.into(),
        user.into(),
        state.into(),
    ];
    for obj in &objects {
        storage.new(obj).unwrap();
    }
    storage.save().unwrap();

    for obj in &objects {
        let loaded = storage.get(obj.kind(), obj.id()).unwrap().unwrap();
        assert_eq!(&loaded, obj);
    }
}

#[test]
fn staging_same_object_twice_keeps_latest_copy() {
    let mut storage = open_storage();

    let mut state = State::new("Nevada");
    storage.new(&state.clone().into()).unwrap();
    state.name = Some("Nevada (Silver State)".to_string());
    storage.new(&state.clone().into()).unwrap();
    assert_eq!(storage.staged_len(), 1);

    storage.save().unwrap();
    let loaded = State::try_from(
        storage
            .get(EntityKind::State, &state.base.id)
            .unwrap()
            .unwrap(),
    )
    .unwrap();
    assert_eq!(loaded.name.as_deref(), Some("Nevada (Silver State)"));
}

#[test]
fn update_after_save_overwrites_row() {
    let mut storage = open_storage();

    let mut entity = Entity::from(Amenity::new("Pool"));
    storage.new(&entity).unwrap();
    storage.save().unwrap();

    if let Entity::Amenity(amenity) = &mut entity {
        amenity.name = Some("Heated pool".to_string());
    }
    entity.touch();
    storage.new(&entity).unwrap();
    storage.save().unwrap();

    assert_eq!(row_count(&storage, "amenities"), 1);
    let loaded = storage.get(EntityKind::Amenity, entity.id()).unwrap().unwrap();
    assert_eq!(loaded, entity);
}

#[test]
fn missing_required_field_raises_constraint_violation_until_rollback() {
    let mut storage = open_storage();

    let nameless = Entity::from(State::default());
    storage.new(&nameless).unwrap();
    let err = storage.save().unwrap_err();
    match &err {
        StorageError::ConstraintViolation { message } => {
            assert!(message.contains("states.name"), "unexpected message: {message}")
        }
        other => panic!("unexpected error: {other}"),
    }

    let valid = Entity::from(State::new("California"));
    assert!(matches!(
        storage.new(&valid),
        Err(StorageError::SessionNeedsRollback)
    ));
    assert!(matches!(storage.save(), Err(StorageError::SessionNeedsRollback)));

    storage.rollback().unwrap();
    storage.new(&valid).unwrap();
    storage.save().unwrap();

    assert_eq!(storage.count(Some(EntityKind::State)).unwrap(), 1);
    assert!(storage.get(EntityKind::State, nameless.id()).unwrap().is_none());
}

#[test]
fn failed_save_applies_none_of_the_staged_writes() {
    let mut storage = open_storage();

    storage.new(&State::new("Oregon").into()).unwrap();
    storage.new(&User::default().into()).unwrap();
    assert!(storage.save().unwrap_err().is_constraint_violation());

    storage.rollback().unwrap();
    assert_eq!(storage.count(None).unwrap(), 0);
}

#[test]
fn rollback_discards_staged_writes() {
    let mut storage = open_storage();

    storage.new(&Amenity::new("Gym").into()).unwrap();
    storage.rollback().unwrap();
    assert_eq!(storage.staged_len(), 0);

    storage.save().unwrap();
    assert_eq!(storage.count(None).unwrap(), 0);
}

#[test]
fn rollback_with_nothing_staged_is_reported() {
    let mut storage = open_storage();

    assert!(matches!(
        storage.rollback(),
        Err(StorageError::NothingToRollback)
    ));
}

#[test]
fn close_discards_session_and_requires_reload() {
    let mut storage = open_storage();
    let saved = Entity::from(State::new("Texas"));
    storage.new(&saved).unwrap();
    storage.save().unwrap();
    storage.new(&State::new("Utah").into()).unwrap();

    storage.close().unwrap();
    assert!(!storage.is_open());
    assert!(matches!(
        storage.new(&saved),
        Err(StorageError::SessionClosed)
    ));

    storage.reload().unwrap();
    assert_eq!(storage.count(None).unwrap(), 1);
    assert!(storage.get(EntityKind::State, saved.id()).unwrap().is_some());
}

#[test]
fn delete_commits_immediately_and_leaves_other_staged_writes() {
    let mut storage = open_storage();

    let doomed = Entity::from(Amenity::new("Sauna"));
    storage.new(&doomed).unwrap();
    storage.save().unwrap();

    let pending = Entity::from(Amenity::new("Hot tub"));
    storage.new(&pending).unwrap();
    storage.delete(&doomed).unwrap();

    assert_eq!(row_count(&storage, "amenities"), 0);
    assert_eq!(storage.staged_len(), 1);

    storage.save().unwrap();
    assert!(storage.get(EntityKind::Amenity, pending.id()).unwrap().is_some());
}

#[test]
fn delete_of_absent_row_is_a_noop() {
    let mut storage = open_storage();

    storage.delete(&Amenity::new("Ghost").into()).unwrap();
    assert_eq!(storage.count(None).unwrap(), 0);
}

#[test]
fn delete_of_referenced_row_is_rejected_by_foreign_keys() {
    let mut storage = open_storage();

    let state = Entity::from(State::new("California"));
    let city = Entity::from(City::new(state.id(), "Fremont"));
    storage.new(&state).unwrap();
    storage.new(&city).unwrap();
    storage.save().unwrap();

    let err = storage.delete(&state).unwrap_err();
    assert!(err.is_constraint_violation());
    assert_eq!(storage.count(Some(EntityKind::City)).unwrap(), 1);
    assert_eq!(storage.count(Some(EntityKind::State)).unwrap(), 1);
}

#[test]
fn rejected_delete_keeps_staged_update_of_the_same_object() {
    let mut storage = open_storage();

    let state = Entity::from(State::new("California"));
    let city = Entity::from(City::new(state.id(), "Fremont"));
    storage.new(&state).unwrap();
    storage.new(&city).unwrap();
    storage.save().unwrap();

    let mut renamed = State::try_from(state.clone()).unwrap();
    renamed.name = Some("Golden State".to_string());
    storage.new(&Entity::from(renamed)).unwrap();

    let err = storage.delete(&state).unwrap_err();
    assert!(err.is_constraint_violation());
    assert_eq!(storage.staged_len(), 1);

    storage.save().unwrap();
    let stored = storage.get(EntityKind::State, state.id()).unwrap().unwrap();
    let stored = State::try_from(stored).unwrap();
    assert_eq!(stored.name.as_deref(), Some("Golden State"));
}

#[test]
fn deleting_parent_without_foreign_keys_leaves_children_in_place() {
    let config = DbConfig {
        foreign_keys: false,
        ..DbConfig::in_memory()
    };
    let mut storage = DbStorage::open(&config).unwrap();
    storage.reload().unwrap();

    let state = Entity::from(State::new("California"));
    let city = Entity::from(City::new(state.id(), "Fremont"));
    storage.new(&state).unwrap();
    storage.new(&city).unwrap();
    storage.save().unwrap();

    storage.delete(&state).unwrap();
    assert_eq!(storage.count(Some(EntityKind::State)).unwrap(), 0);
    let orphan = City::try_from(storage.get(EntityKind::City, city.id()).unwrap().unwrap()).unwrap();
    assert_eq!(orphan.state_id.as_deref(), Some(state.id()));
}

#[test]
fn delete_all_removes_every_row_in_one_commit() {
    let mut storage = open_storage();

    let state = State::new("California");
    let city = City::new(state.base.id.clone(), "Fremont");
    let user = User::new("a@b.c", "pwd");
    let place = Place::new(city.base.id.clone(), user.base.id.clone(), "Loft");
    let review = Review::new(place.base.id.clone(), user.base.id.clone(), "ok");
    for obj in [
        Entity::from(state),
        city.into(),
        user.into(),
        place.into(),
        review.into(),
        Amenity::new("Wifi").into(),
    ] {
        storage.new(&obj).unwrap();
    }
    storage.save().unwrap();
    assert_eq!(storage.count(None).unwrap(), 6);

    storage.delete_all().unwrap();
    for kind in EntityKind::ALL {
        assert_eq!(storage.count(Some(kind)).unwrap(), 0);
    }
}

#[test]
fn drop_on_start_recreates_empty_schema() {
    let dir = tempfile::tempdir().unwrap();
    let database = dir.path().join("hbnb.db").to_str().unwrap().to_string();
    let config = DbConfig {
        database: database.clone(),
        ..DbConfig::default()
    };

    let mut first = DbStorage::open(&config).unwrap();
    first.reload().unwrap();
    first.new(&State::new("Kept").into()).unwrap();
    first.save().unwrap();
    drop(first);

    let mut reopened = DbStorage::open(&config).unwrap();
    reopened.reload().unwrap();
    assert_eq!(reopened.count(None).unwrap(), 1);
    drop(reopened);

    let reset = DbConfig {
        drop_on_start: true,
        ..config
    };
    let mut wiped = DbStorage::open(&reset).unwrap();
    wiped.reload().unwrap();
    assert_eq!(wiped.count(None).unwrap(), 0);
}
