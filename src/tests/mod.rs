use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use crate::entities::{self, Experience, Project, Review, Skill};
use crate::loader::{self, LoadOutcome, Pager, ProfileLimits};
use crate::source::{
    BundledSource, ContentSource, PageQuery, RawPage, SourceError, TieredSource,
};
use crate::view::{
    CollectionView, DirectiveError, FilterChoice, FilterSelection, SortDirective, ViewDescriptor,
};

/// In-memory read API with per-collection failures, an atomic call
/// counter, and an optional gate that parks fetches until the test
/// releases them.
#[derive(Default)]
struct FakeSource {
    collections: HashMap<String, Vec<Value>>,
    failing: HashSet<String>,
    calls: AtomicUsize,
    gate: Option<Semaphore>,
}

impl FakeSource {
    fn new() -> Self {
        Self::default()
    }

    fn with_items(mut self, collection: &str, items: Vec<Value>) -> Self {
        self.collections.insert(collection.to_string(), items);
        self
    }

    fn with_failing(mut self, collection: &str) -> Self {
        self.failing.insert(collection.to_string());
        self
    }

    fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    async fn fetch_page(&self, collection: &str, query: PageQuery) -> Result<RawPage, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if self.failing.contains(collection) {
            return Err(SourceError::Fetch {
                collection: collection.to_string(),
                source: "connection reset".into(),
            });
        }

        let items = self
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default();
        let skip = query.skip.unwrap_or(0);
        let limit = query.limit.unwrap_or(items.len());
        let page: Vec<Value> = items.iter().skip(skip).take(limit).cloned().collect();
        Ok(RawPage {
            items: page,
            has_next: skip + limit < items.len(),
        })
    }

    async fn fetch_by_id(&self, collection: &str, id: &str) -> Result<Value, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.collections
            .get(collection)
            .and_then(|items| {
                items
                    .iter()
                    .find(|item| item.get("_id").and_then(Value::as_str) == Some(id))
            })
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }
}

fn review(id: &str, year: i32, rating: f64, genres: &[&str]) -> Review {
    Review {
        id: id.to_string(),
        title: id.to_string(),
        creator: None,
        year,
        rating,
        genres: genres.iter().map(|g| g.to_string()).collect(),
        status: None,
        body: String::new(),
        link: None,
    }
}

fn shelf() -> Vec<Review> {
    vec![
        review("inception", 2010, 9.0, &["Sci-Fi", "Thriller"]),
        review("parasite", 2019, 9.4, &["Drama", "Thriller"]),
        review("spirited-away", 2001, 9.3, &["Animation", "Fantasy"]),
    ]
}

fn shelf_view() -> CollectionView {
    CollectionView::new(
        ViewDescriptor::new()
            .filterable("genre")
            .filterable("status")
            .sortable("year")
            .sortable("rating"),
    )
}

fn ids(records: &[&Review]) -> Vec<String> {
    records.iter().map(|r| r.id.clone()).collect()
}

fn project_items(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| json!({"_id": format!("p{i}"), "title": format!("Project {i}")}))
        .collect()
}

#[test]
fn all_choices_return_snapshot_unchanged() {
    let snapshot = shelf();
    let view = shelf_view();
    let selection = FilterSelection::new()
        .with("genre", FilterChoice::All)
        .with("status", FilterChoice::All);

    let filtered = view.apply_filters(&snapshot, &selection).unwrap();
    assert_eq!(
        ids(&filtered),
        vec!["inception", "parasite", "spirited-away"]
    );
}

#[test]
fn facet_filter_keeps_only_matching_records() {
    let snapshot = shelf();
    let view = shelf_view();
    let selection = FilterSelection::new().with("genre", FilterChoice::parse("Thriller"));

    let filtered = view.apply_filters(&snapshot, &selection).unwrap();
    assert_eq!(ids(&filtered), vec!["inception", "parasite"]);
    assert!(filtered
        .iter()
        .all(|r| r.genres.iter().any(|g| g == "Thriller")));
}

#[test]
fn filters_compose_with_and() {
    let mut snapshot = shelf();
    snapshot[0].status = Some("finished".to_string());
    snapshot[1].status = Some("reading".to_string());

    let view = shelf_view();
    let selection = FilterSelection::new()
        .with("genre", FilterChoice::parse("Thriller"))
        .with("status", FilterChoice::parse("reading"));

    let filtered = view.apply_filters(&snapshot, &selection).unwrap();
    assert_eq!(ids(&filtered), vec!["parasite"]);
}

#[test]
fn empty_filter_result_is_valid() {
    let snapshot = shelf();
    let view = shelf_view();
    let selection = FilterSelection::new().with("genre", FilterChoice::parse("Western"));

    let curated = view
        .curate(
            &snapshot,
            &selection,
            &SortDirective::descending("rating"),
            Some("parasite"),
        )
        .unwrap();
    assert!(curated.visible.is_empty());
    assert!(curated.active.is_none());
}

#[test]
fn shelf_scenario_sorts_by_rating_and_year() {
    let snapshot = shelf();
    let view = shelf_view();
    let selection = FilterSelection::new();

    let by_rating = view
        .apply_sort(
            view.apply_filters(&snapshot, &selection).unwrap(),
            &SortDirective::descending("rating"),
        )
        .unwrap();
    assert_eq!(ids(&by_rating), vec!["parasite", "spirited-away", "inception"]);

    let by_year = view
        .apply_sort(
            view.apply_filters(&snapshot, &selection).unwrap(),
            &SortDirective::ascending("year"),
        )
        .unwrap();
    assert_eq!(ids(&by_year), vec!["spirited-away", "inception", "parasite"]);
}

#[test]
fn equal_keys_keep_snapshot_order_in_both_directions() {
    let snapshot = vec![
        review("a", 2020, 8.0, &[]),
        review("b", 2020, 7.0, &[]),
        review("c", 1999, 6.0, &[]),
        review("d", 2020, 9.0, &[]),
    ];
    let view = shelf_view();
    let unfiltered = |view: &CollectionView| {
        view.apply_filters(&snapshot, &FilterSelection::new())
            .unwrap()
    };

    let desc = view
        .apply_sort(unfiltered(&view), &SortDirective::descending("year"))
        .unwrap();
    assert_eq!(ids(&desc), vec!["a", "b", "d", "c"]);

    let asc = view
        .apply_sort(unfiltered(&view), &SortDirective::ascending("year"))
        .unwrap();
    assert_eq!(ids(&asc), vec!["c", "a", "b", "d"]);
}

#[test]
fn available_values_are_distinct_sorted_with_sentinel_first() {
    let snapshot = shelf();
    let view = shelf_view();

    let values = view.available_filter_values(&snapshot, "genre").unwrap();
    assert_eq!(
        values,
        vec!["All", "Animation", "Drama", "Fantasy", "Sci-Fi", "Thriller"]
    );
}

#[test]
fn active_resolution_falls_back_when_id_disappears() {
    let snapshot = shelf();
    let view = shelf_view();
    let ordered = view
        .apply_sort(
            view.apply_filters(&snapshot, &FilterSelection::new())
                .unwrap(),
            &SortDirective::descending("rating"),
        )
        .unwrap();

    let kept = view.resolve_active(&ordered, Some("inception")).unwrap();
    assert_eq!(kept.id, "inception");

    let fallback = view.resolve_active(&ordered, Some("gone")).unwrap();
    assert_eq!(fallback.id, "parasite");

    let empty: Vec<&Review> = Vec::new();
    assert!(view.resolve_active(&empty, Some("inception")).is_none());
}

#[test]
fn unknown_facet_and_sort_key_fail_fast() {
    let snapshot = shelf();
    let view = shelf_view();

    let selection = FilterSelection::new().with("director", FilterChoice::parse("Nolan"));
    assert!(matches!(
        view.apply_filters(&snapshot, &selection),
        Err(DirectiveError::UnknownFacet { .. })
    ));

    let filtered = view
        .apply_filters(&snapshot, &FilterSelection::new())
        .unwrap();
    assert!(matches!(
        view.apply_sort(filtered, &SortDirective::ascending("runtime")),
        Err(DirectiveError::UnknownSortKey { .. })
    ));

    assert!(view.available_filter_values(&snapshot, "director").is_err());
}

#[tokio::test]
async fn load_initial_then_load_more_appends_without_duplicates() {
    let source = Arc::new(FakeSource::new().with_items("projects", project_items(14)));
    let pager: Pager<Project> = Pager::new(source, "projects", 6);

    let first = pager.load_initial().await;
    assert_eq!(
        first,
        LoadOutcome::Loaded {
            appended: 6,
            has_more: true
        }
    );

    let second = pager.load_more().await;
    assert_eq!(
        second,
        LoadOutcome::Loaded {
            appended: 6,
            has_more: true
        }
    );

    let third = pager.load_more().await;
    assert_eq!(
        third,
        LoadOutcome::Loaded {
            appended: 2,
            has_more: false
        }
    );

    let state = pager.snapshot();
    assert_eq!(state.records.len(), 14);
    assert!(!state.has_more);
    assert!(state.last_error.is_none());

    let unique: HashSet<String> = state.records.iter().map(|p| p.id.clone()).collect();
    assert_eq!(unique.len(), 14);
}

#[tokio::test]
async fn load_more_while_in_flight_is_a_noop() {
    let source = Arc::new(FakeSource::new().with_items("projects", project_items(14)).gated());
    let pager: Pager<Project> = Pager::new(Arc::clone(&source) as Arc<dyn ContentSource>, "projects", 6);

    source.open_gate();
    pager.load_initial().await;
    assert_eq!(source.calls(), 1);

    let mut in_flight = Box::pin(pager.load_more());
    assert!(futures::poll!(in_flight.as_mut()).is_pending());
    assert_eq!(source.calls(), 2);
    assert!(pager.snapshot().is_loading);

    // Second advance while the first is parked: no new request.
    let overlapped = pager.load_more().await;
    assert_eq!(overlapped, LoadOutcome::AlreadyLoading);
    assert_eq!(source.calls(), 2);

    source.open_gate();
    let finished = in_flight.await;
    assert_eq!(
        finished,
        LoadOutcome::Loaded {
            appended: 6,
            has_more: true
        }
    );
    let state = pager.snapshot();
    assert_eq!(state.records.len(), 12);
    assert!(!state.is_loading);
}

#[tokio::test]
async fn failed_load_records_error_and_clears_flag() {
    let source = Arc::new(FakeSource::new().with_failing("projects"));
    let pager: Pager<Project> = Pager::new(source, "projects", 6);

    let outcome = pager.load_initial().await;
    assert_eq!(outcome, LoadOutcome::Failed);

    let state = pager.snapshot();
    assert!(state.records.is_empty());
    assert!(!state.is_loading);
    let message = state.last_error.expect("error should be recorded");
    assert!(message.contains("projects"));
}

#[tokio::test]
async fn stale_response_after_collection_switch_is_discarded() {
    let source = Arc::new(
        FakeSource::new()
            .with_items("movies", project_items(4))
            .with_items("books", Vec::new())
            .gated(),
    );
    let pager: Pager<Project> =
        Pager::new(Arc::clone(&source) as Arc<dyn ContentSource>, "movies", 6);

    let mut in_flight = Box::pin(pager.load_initial());
    assert!(futures::poll!(in_flight.as_mut()).is_pending());

    pager.set_collection("books");
    source.open_gate();

    let outcome = in_flight.await;
    assert_eq!(outcome, LoadOutcome::Superseded);

    let state = pager.snapshot();
    assert!(state.records.is_empty());
    assert!(!state.is_loading);
    assert_eq!(pager.collection(), "books");
}

#[tokio::test]
async fn profile_load_isolates_a_failing_collection() {
    let source = FakeSource::new()
        .with_items("projects", project_items(3))
        .with_items(
            "experience",
            vec![
                json!({"_id": "e-old", "jobTitle": "Intern", "startDate": "2019-01-15"}),
                json!({"_id": "e-new", "jobTitle": "Engineer", "startDate": "2023-06-01"}),
                json!({"_id": "e-undated", "jobTitle": "Volunteer"}),
            ],
        )
        .with_failing("skills");

    let profile = loader::load_profile(&source, ProfileLimits::default()).await;

    assert_eq!(profile.projects.len(), 3);
    let order: Vec<&str> = profile.experience.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(order, vec!["e-new", "e-old", "e-undated"]);
    assert!(profile.skills.is_empty());
    assert!(profile.failed("skills"));
    assert!(!profile.failed("projects"));
}

#[test]
fn skills_group_in_first_seen_category_order() {
    let skills = vec![
        Skill {
            id: "s1".to_string(),
            category: Some("A".to_string()),
            ..Skill::default()
        },
        Skill {
            id: "s2".to_string(),
            category: None,
            ..Skill::default()
        },
        Skill {
            id: "s3".to_string(),
            category: Some("A".to_string()),
            ..Skill::default()
        },
    ];

    let groups = entities::group_by_category(skills);
    let names: Vec<&str> = groups.iter().map(|g| g.category.as_str()).collect();
    assert_eq!(names, vec!["A", "Other"]);
    let members: Vec<&str> = groups[0].skills.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(members, vec!["s1", "s3"]);
}

#[test]
fn blank_category_lands_under_other() {
    let skills = vec![Skill {
        id: "s1".to_string(),
        category: Some("  ".to_string()),
        ..Skill::default()
    }];
    let groups = entities::group_by_category(skills);
    assert_eq!(groups[0].category, "Other");
}

#[test]
fn recency_sort_is_stable_and_keeps_undated_entries() {
    let mut entries = vec![
        Experience {
            id: "a".to_string(),
            start_date: Some("2021-03-01".to_string()),
            ..Experience::default()
        },
        Experience {
            id: "b".to_string(),
            start_date: None,
            ..Experience::default()
        },
        Experience {
            id: "c".to_string(),
            start_date: Some("2021-03-01".to_string()),
            ..Experience::default()
        },
        Experience {
            id: "d".to_string(),
            start_date: Some("not a date".to_string()),
            ..Experience::default()
        },
    ];

    entities::sort_by_recency(&mut entries);
    let order: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(order, vec!["a", "c", "b", "d"]);
}

#[tokio::test]
async fn tiered_source_serves_bundled_items_on_remote_failure() {
    let bundled = BundledSource::new()
        .with_records(
            "experience",
            &[Experience {
                id: "fallback".to_string(),
                job_title: Some("Engineer".to_string()),
                ..Experience::default()
            }],
        )
        .unwrap();
    let tiered = TieredSource::new(
        Arc::new(FakeSource::new().with_failing("experience")),
        Arc::new(bundled),
    );

    let page = tiered
        .fetch_page("experience", PageQuery::page(10, 0))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0]["_id"], "fallback");
}

#[tokio::test]
async fn tiered_source_falls_back_on_empty_first_page_only() {
    let bundled = BundledSource::new().with_items("experience", project_items(2));
    let tiered = TieredSource::new(
        Arc::new(FakeSource::new().with_items("experience", Vec::new())),
        Arc::new(bundled),
    );

    let first = tiered
        .fetch_page("experience", PageQuery::page(10, 0))
        .await
        .unwrap();
    assert_eq!(first.items.len(), 2);

    // A later page of an empty remote stays empty instead of mixing tiers.
    let later = tiered
        .fetch_page("experience", PageQuery::page(10, 10))
        .await
        .unwrap();
    assert!(later.items.is_empty());
}

#[tokio::test]
async fn bundled_source_pages_and_reports_has_next() {
    let bundled = BundledSource::new().with_items("projects", project_items(5));

    let first = bundled
        .fetch_page("projects", PageQuery::page(2, 0))
        .await
        .unwrap();
    assert_eq!(first.items.len(), 2);
    assert!(first.has_next);

    let last = bundled
        .fetch_page("projects", PageQuery::page(2, 4))
        .await
        .unwrap();
    assert_eq!(last.items.len(), 1);
    assert!(!last.has_next);
}

#[tokio::test]
async fn detail_lookup_surfaces_not_found() {
    let source = FakeSource::new().with_items("projects", project_items(2));

    let found: Project = loader::load_detail(&source, "projects", "p1").await.unwrap();
    assert_eq!(found.id, "p1");

    let missing = loader::load_detail::<Project>(&source, "projects", "nope").await;
    assert!(matches!(missing, Err(SourceError::NotFound { .. })));
}

#[test]
fn config_parses_yaml_and_defaults_page_size() {
    let config = crate::config::parse_config(
        "base_url: https://cms.example.com\ntimeout: 5\npage_size: 12\n",
    )
    .unwrap();
    assert_eq!(config.base_url.as_deref(), Some("https://cms.example.com"));
    assert_eq!(config.timeout, Some(5));
    assert_eq!(config.page_size(), 12);

    assert_eq!(
        crate::config::ClientConfig::default().page_size(),
        crate::config::ClientConfig::DEFAULT_PAGE_SIZE
    );
}
