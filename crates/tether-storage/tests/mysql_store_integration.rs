//! Runs against a disposable MySQL container; needs a docker daemon.
//! Run with `cargo test -p tether-storage -- --ignored`.

use tether_core::{NewShortLink, ShortCode};
use tether_storage::{ConflictKey, LinkStore, MySqlStore, StorageError};
use tether_test_infra::mysql::{MySqlServer, MysqlConfig};

const SCHEMA: &str = include_str!("../ddl/mysql/short_links.sql");

struct Fixture {
    _mysql: MySqlServer,
    store: MySqlStore,
}

impl Fixture {
    async fn start() -> Self {
        let (mysql, pool) = MySqlServer::with_schema(MysqlConfig::builder().build(), SCHEMA)
            .await
            .expect("start mysql with schema");

        Self {
            _mysql: mysql,
            store: MySqlStore::new(pool),
        }
    }
}

fn code(value: &str) -> ShortCode {
    ShortCode::new_unchecked(value)
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn insert_then_backfill_system_code() {
    let fixture = Fixture::start().await;

    let mut link = fixture
        .store
        .insert(NewShortLink::system("https://example.com", code("~0000000000000001")))
        .await
        .unwrap();
    assert!(link.id > 0);

    link.code = ShortCode::generated(link.id).unwrap();
    let updated = fixture.store.update(link.clone()).await.unwrap();
    assert_eq!(updated.code, link.code);

    let by_code = fixture
        .store
        .find_by_code(link.code.as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_code.target_address, "https://example.com");

    let by_target = fixture
        .store
        .find_by_target("https://example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_target.id, link.id);
    assert!(!fixture.store.exists_by_code("~0000000000000001").await.unwrap());
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn duplicate_code_and_system_target_conflict() {
    let fixture = Fixture::start().await;

    fixture
        .store
        .insert(NewShortLink::custom("https://one.example", code("promo"), None))
        .await
        .unwrap();
    let err = fixture
        .store
        .insert(NewShortLink::custom("https://two.example", code("promo"), None))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict { key: ConflictKey::Code, .. }));

    fixture
        .store
        .insert(NewShortLink::system("https://same.example", code("~a")))
        .await
        .unwrap();
    let err = fixture
        .store
        .insert(NewShortLink::system("https://same.example", code("~b")))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict { key: ConflictKey::Target, .. }));

    // custom aliases are outside the target index
    fixture
        .store
        .insert(NewShortLink::custom("https://same.example", code("mine"), Some("d".into())))
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn codes_differing_in_case_are_distinct() {
    let fixture = Fixture::start().await;

    fixture
        .store
        .insert(NewShortLink::custom("https://lower.example", code("abc"), None))
        .await
        .unwrap();
    fixture
        .store
        .insert(NewShortLink::custom("https://upper.example", code("ABC"), None))
        .await
        .unwrap();

    let upper = fixture.store.find_by_code("ABC").await.unwrap().unwrap();
    assert_eq!(upper.target_address, "https://upper.example");
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn access_counts_and_aggregates() {
    let fixture = Fixture::start().await;

    fixture
        .store
        .insert(NewShortLink::custom("https://a.example", code("a"), None))
        .await
        .unwrap();
    fixture
        .store
        .insert(NewShortLink::system("https://b.example", code("b")))
        .await
        .unwrap();

    assert_eq!(fixture.store.add_access_count("a", 1).await.unwrap(), Some(1));
    assert_eq!(fixture.store.add_access_count("a", 9).await.unwrap(), Some(10));
    assert_eq!(fixture.store.add_access_count("missing", 1).await.unwrap(), None);

    assert_eq!(fixture.store.count().await.unwrap(), 2);
    assert_eq!(fixture.store.sum_access_count().await.unwrap(), 10);
    assert_eq!(fixture.store.count_custom_aliases().await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn hot_links_and_creation_window() {
    let fixture = Fixture::start().await;

    for (alias, hits) in [("cold", 1), ("hot", 20), ("hotter", 40)] {
        fixture
            .store
            .insert(NewShortLink::custom("https://example.com", code(alias), None))
            .await
            .unwrap();
        fixture.store.add_access_count(alias, hits).await.unwrap();
    }

    let hot = fixture.store.find_hot_links(10).await.unwrap();
    let codes: Vec<&str> = hot.iter().map(|link| link.code.as_str()).collect();
    assert_eq!(codes, ["hotter", "hot"]);

    let all = fixture
        .store
        .find_created_between(jiff::Timestamp::UNIX_EPOCH, jiff::Timestamp::now())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].created_at <= w[1].created_at));
}
