use super::*;
use crate::{
    db::{
        filter::FIELD_EQUALS,
        job::JobSpec,
        query::RangeQuery,
        range::KeyRangeError,
        record::Record,
        split::ShardSplitter,
        store::{MemoryStore, Page, StoreError},
    },
    error::{ErrorClass, ErrorOrigin},
    key::Key,
    obs::{
        EventReport, MetricsEvent, MetricsSink, metrics_report, metrics_reset_all,
        with_metrics_sink,
    },
    test_support::{TEST_ENTITY, test_catalog, test_store, uint},
};
use serde_json::json;
use std::{
    cell::RefCell,
    rc::Rc,
    sync::atomic::{AtomicUsize, Ordering},
};

fn whole_collection(batch_size: usize) -> ShardReader {
    ShardReader::new(
        TEST_ENTITY,
        vec![KeyRange::default()],
        batch_size,
        Vec::new(),
    )
}

fn drain(reader: &mut ShardReader, store: &dyn OrderedRangeStore) -> Vec<Key> {
    let catalog = test_catalog();

    reader
        .iter(&catalog, store)
        .expect("reader should start")
        .map(|item| item.expect("read should succeed").0)
        .collect()
}

fn resume(checkpoint: &serde_json::Value) -> ShardReader {
    ShardReader::from_json(checkpoint, &test_catalog().filters).expect("checkpoint should decode")
}

///
/// FlakyStore
/// Fails exactly one page fetch, then delegates again.
///

struct FlakyStore {
    inner: MemoryStore,
    fail_on_call: usize,
    calls: AtomicUsize,
}

impl FlakyStore {
    fn new(fail_on_call: usize) -> Self {
        Self {
            inner: test_store(),
            fail_on_call,
            calls: AtomicUsize::new(0),
        }
    }
}

impl OrderedRangeStore for FlakyStore {
    fn fetch_page(
        &self,
        query: &RangeQuery,
        limit: usize,
        cursor: Option<&ResumeCursor>,
    ) -> Result<Page, InternalError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == self.fail_on_call {
            return Err(StoreError::backend("connection reset").into());
        }

        self.inner.fetch_page(query, limit, cursor)
    }

    fn partitions(&self, entity: &str) -> Result<Vec<String>, InternalError> {
        self.inner.partitions(entity)
    }
}

fn partitioned_store() -> MemoryStore {
    let store = MemoryStore::new();
    for (partition, keys) in [(None, [1, 2]), (Some("a"), [3, 4]), (Some("b"), [5, 6])] {
        for key in keys {
            store
                .insert(TEST_ENTITY, partition, Record::from_pairs(uint(key), [("type", "A")]))
                .expect("insert");
        }
    }
    store
        .insert(TEST_ENTITY, Some("c"), Record::from_pairs(uint(7), [("type", "A")]))
        .expect("insert");

    store
}

#[test]
fn reader_yields_every_row_in_key_order() {
    let store = test_store();
    let mut reader = whole_collection(4);

    assert_eq!(
        drain(&mut reader, &store),
        (1..=6).map(uint).collect::<Vec<_>>()
    );
    assert!(reader.is_exhausted());
    assert!(drain(&mut reader, &store).is_empty());
}

#[test]
fn mid_page_checkpoint_resumes_without_duplicates() {
    let store = test_store();
    let catalog = test_catalog();
    let mut reader = whole_collection(4);

    let mut iter = reader.iter(&catalog, &store).expect("reader should start");
    let first: Vec<Key> = iter
        .by_ref()
        .take(3)
        .map(|item| item.expect("read").0)
        .collect();
    let checkpoint = iter.checkpoint().expect("checkpoint");
    drop(iter);

    assert_eq!(first, vec![uint(1), uint(2), uint(3)]);
    assert!(
        checkpoint.get("resume_cursor").is_none(),
        "mid-page checkpoint relies on the narrowed range alone"
    );

    let mut resumed = resume(&checkpoint);
    assert_eq!(drain(&mut resumed, &store), vec![uint(4), uint(5), uint(6)]);
}

#[test]
fn page_boundary_checkpoint_carries_the_cursor() {
    let store = test_store();
    let catalog = test_catalog();
    let mut reader = whole_collection(2);

    let mut iter = reader.iter(&catalog, &store).expect("reader should start");
    let first: Vec<Key> = iter
        .by_ref()
        .take(2)
        .map(|item| item.expect("read").0)
        .collect();
    let checkpoint = iter.checkpoint().expect("checkpoint");
    drop(iter);

    assert_eq!(first, vec![uint(1), uint(2)]);
    assert!(checkpoint.get("resume_cursor").is_some());

    let mut resumed = resume(&checkpoint);
    assert_eq!(
        drain(&mut resumed, &store),
        vec![uint(3), uint(4), uint(5), uint(6)]
    );
}

#[test]
fn backend_error_is_surfaced_and_iteration_can_be_redriven() {
    let store = FlakyStore::new(1);
    let catalog = test_catalog();
    let mut reader = whole_collection(2);

    let mut keys = Vec::new();
    let mut errors = Vec::new();
    for item in reader.iter(&catalog, &store).expect("reader should start") {
        match item {
            Ok((key, _)) => keys.push(key),
            Err(err) => errors.push(err),
        }
    }

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].origin, ErrorOrigin::Store);
    assert_eq!(keys, (1..=6).map(uint).collect::<Vec<_>>());
}

#[test]
fn checkpoint_taken_at_a_backend_error_resumes_cleanly() {
    let flaky = FlakyStore::new(1);
    let catalog = test_catalog();
    let mut reader = whole_collection(2);

    let mut iter = reader.iter(&catalog, &flaky).expect("reader should start");
    let mut keys = vec![
        iter.next().expect("row").expect("read").0,
        iter.next().expect("row").expect("read").0,
    ];
    assert!(iter.next().expect("error item").is_err());
    let checkpoint = iter.checkpoint().expect("checkpoint");
    drop(iter);

    let mut resumed = resume(&checkpoint);
    keys.extend(drain(&mut resumed, &test_store()));
    assert_eq!(keys, (1..=6).map(uint).collect::<Vec<_>>());
}

#[test]
fn unresolved_factory_fails_on_iter() {
    let store = test_store();
    let catalog = test_catalog();
    let mut reader = whole_collection(2);
    reader.inject_filter(
        Some(FilterFactorySpec::new("tests::missing_factory")),
        &catalog.filters,
    );

    let err = reader
        .iter(&catalog, &store)
        .err()
        .expect("unresolved factory should fail");
    assert_eq!(err.class, ErrorClass::NotFound);
    assert_eq!(
        err.as_registry_error(),
        Some(&RegistryError::UnresolvedPredicateFactory(
            "tests::missing_factory".to_string()
        ))
    );
    assert_eq!(
        reader.filter_factory_spec().map(|spec| spec.name.as_str()),
        Some("tests::missing_factory")
    );
}

#[test]
fn inject_filter_ignores_none_and_empty_specs() {
    let registry = FilterRegistry::with_builtins();
    let mut reader = whole_collection(2);

    reader.inject_filter(None, &registry);
    reader.inject_filter(Some(FilterFactorySpec::default()), &registry);
    assert!(!reader.has_predicate());
    assert!(reader.filter_factory_spec().is_none());

    let spec = FilterFactorySpec::new(FIELD_EQUALS).arg("type").arg("C");
    reader.inject_filter(Some(spec.clone()), &registry);
    reader.inject_filter(Some(spec.clone()), &registry);
    assert!(reader.has_predicate());
    assert_eq!(reader.filter_factory_spec(), Some(&spec));

    let store = test_store();
    assert_eq!(drain(&mut reader, &store), vec![uint(4), uint(5), uint(6)]);
}

#[test]
fn json_round_trip_rebuilds_the_predicate() {
    let store = test_store();
    let catalog = test_catalog();
    let job = JobSpec::new(TEST_ENTITY, 10)
        .with_batch_size(2)
        .with_filter_factory(FilterFactorySpec::new(FIELD_EQUALS).arg("type").arg("B"));
    let readers = ShardSplitter::new(&catalog, &store)
        .split(&job)
        .expect("split");

    for reader in readers {
        let encoded = reader.to_json().expect("encode");
        let mut decoded = ShardReader::from_json(&encoded, &catalog.filters).expect("decode");
        assert!(decoded.has_predicate());
        assert_eq!(decoded.to_json().expect("re-encode"), encoded);

        let mut original = reader;
        assert_eq!(drain(&mut decoded, &store), drain(&mut original, &store));
    }
}

#[test]
fn finished_range_slots_serialize_as_null() {
    let store = test_store();
    let mut reader = ShardReader::new(
        TEST_ENTITY,
        vec![
            KeyRange::half_open(uint(1), Some(uint(3))),
            KeyRange::half_open(uint(5), None),
        ],
        10,
        Vec::new(),
    );
    let catalog = test_catalog();

    let mut iter = reader.iter(&catalog, &store).expect("reader should start");
    let keys: Vec<Key> = iter
        .by_ref()
        .take(3)
        .map(|item| item.expect("read").0)
        .collect();
    let checkpoint = iter.checkpoint().expect("checkpoint");
    drop(iter);

    assert_eq!(keys, vec![uint(1), uint(2), uint(5)]);
    assert!(checkpoint["key_ranges"][0].is_null());
    assert!(checkpoint["key_ranges"][1].is_object());

    let resumed = resume(&checkpoint);
    assert_eq!(resumed.key_ranges().map(<[_]>::len), Some(2));
    assert_eq!(
        resumed
            .current_key_range()
            .and_then(KeyRange::start_key)
            .cloned(),
        Some(uint(5))
    );
}

#[test]
fn namespace_range_reads_partitions_in_order() {
    let store = partitioned_store();
    let range = NamespaceRange::new("a", Some("b".to_string())).expect("valid range");
    let mut reader = ShardReader::for_namespaces(TEST_ENTITY, range, 1, Vec::new());

    assert_eq!(
        drain(&mut reader, &store),
        vec![uint(3), uint(4), uint(5), uint(6)]
    );
    assert!(reader.is_exhausted());

    let mut everything =
        ShardReader::for_namespaces(TEST_ENTITY, NamespaceRange::full(), 3, Vec::new());
    assert_eq!(
        drain(&mut everything, &store),
        (1..=7).map(uint).collect::<Vec<_>>()
    );
}

#[test]
fn namespace_checkpoint_resumes_in_the_same_partition() {
    let store = partitioned_store();
    let catalog = test_catalog();
    let mut reader =
        ShardReader::for_namespaces(TEST_ENTITY, NamespaceRange::full(), 5, Vec::new());

    let mut iter = reader.iter(&catalog, &store).expect("reader should start");
    let first: Vec<Key> = iter
        .by_ref()
        .take(3)
        .map(|item| item.expect("read").0)
        .collect();
    let checkpoint = iter.checkpoint().expect("checkpoint");
    drop(iter);

    assert_eq!(first, vec![uint(1), uint(2), uint(3)]);
    assert_eq!(checkpoint["current_key_range"]["namespace"], json!("a"));

    let mut resumed = resume(&checkpoint);
    assert_eq!(
        drain(&mut resumed, &store),
        vec![uint(4), uint(5), uint(6), uint(7)]
    );
}

#[test]
fn readers_iterate_concurrently_on_worker_threads() {
    let store = test_store();
    let catalog = test_catalog();
    let readers = ShardSplitter::new(&catalog, &store)
        .split(&JobSpec::new(TEST_ENTITY, 3).with_batch_size(1))
        .expect("split");

    let mut keys: Vec<Key> = std::thread::scope(|scope| {
        let handles: Vec<_> = readers
            .into_iter()
            .map(|mut reader| {
                let (catalog, store) = (&catalog, &store);
                scope.spawn(move || {
                    reader
                        .iter(catalog, store)
                        .expect("reader should start")
                        .map(|item| item.expect("read").0)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| handle.join().expect("worker should not panic"))
            .collect()
    });
    keys.sort();

    assert_eq!(keys, (1..=6).map(uint).collect::<Vec<_>>());
}

#[test]
fn worker_metrics_stay_on_the_worker_thread() {
    let store = test_store();
    metrics_reset_all();

    let worker = std::thread::scope(|scope| {
        scope
            .spawn(|| {
                let mut reader = whole_collection(4);
                assert_eq!(drain(&mut reader, &store).len(), 6);
                metrics_report()
            })
            .join()
            .expect("worker should not panic")
    });

    assert_eq!(worker.ops.pages_fetched, 2);
    assert_eq!(worker.ops.rows_scanned, 6);
    assert_eq!(worker.ops.readers_exhausted, 1);
    assert_eq!(metrics_report(), EventReport::default());
}

#[test]
fn filtered_rows_are_reported_once_per_page() {
    #[derive(Default)]
    struct FilteredPerPage(RefCell<Vec<u64>>);

    impl MetricsSink for FilteredPerPage {
        fn record(&self, event: MetricsEvent<'_>) {
            if let MetricsEvent::RowsFiltered { rows_filtered, .. } = event {
                self.0.borrow_mut().push(rows_filtered);
            }
        }
    }

    let store = test_store();
    let mut reader = whole_collection(2);
    reader.inject_filter(
        Some(FilterFactorySpec::new(FIELD_EQUALS).arg("type").arg("B")),
        &test_catalog().filters,
    );

    let sink = Rc::new(FilteredPerPage::default());
    let keys = with_metrics_sink(sink.clone(), || drain(&mut reader, &store));

    assert_eq!(keys, vec![uint(2), uint(3)]);
    assert_eq!(sink.0.borrow().clone(), vec![1, 1, 2]);
}

#[test]
fn missing_range_direction_is_invalid_key_range() {
    let raw = json!({
        "entity_kind": TEST_ENTITY,
        "key_ranges": [
            null,
            {"key_start": "uint:1", "key_end": null, "include_start": true, "include_end": false}
        ],
        "batch_size": 2,
        "filters": []
    });

    let err = ShardReader::from_json(&raw, &FilterRegistry::with_builtins())
        .expect_err("missing direction should fail");
    assert!(matches!(
        err.as_key_range_error(),
        Some(KeyRangeError::InvalidKeyRange { reason }) if reason.starts_with("key_ranges[1]")
    ));
}

#[test]
fn zero_batch_size_is_corrupt() {
    let raw = json!({"entity_kind": TEST_ENTITY, "key_ranges": [], "batch_size": 0});

    let err = ShardReader::from_json(&raw, &FilterRegistry::with_builtins())
        .expect_err("zero batch size should fail");
    assert_eq!(err.class, ErrorClass::Corruption);
    assert_eq!(err.origin, ErrorOrigin::Reader);
}

#[test]
fn readers_are_send() {
    fn assert_send<T: Send>() {}

    assert_send::<ShardReader>();
}
