use bucket_search_core::contract::{
    ItemsPage, ListDetail, MockSearchIndexApi, RequestMode, UploadSession,
};
use bucket_search_core::item_body::ItemBody;
use bucket_search_core::items::ItemsService;
use bucket_search_core::SyncError;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

fn items_page(names: &[&str], next: Option<&str>) -> ItemsPage {
    ItemsPage {
        items: names
            .iter()
            .map(|n| json!({"name": format!("datasources/ds/items/{n}"), "version": "djE="}))
            .collect(),
        next_page_token: next.map(str::to_string),
    }
}

/// Registers one expectation per page, keyed on the page token, and records the `brief` flags seen.
fn mock_listing(pages: Vec<ItemsPage>, briefs: Arc<Mutex<Vec<bool>>>) -> MockSearchIndexApi {
    let mut api = MockSearchIndexApi::new();
    for (index, listed) in pages.into_iter().enumerate() {
        let expected_token = if index == 0 {
            None
        } else {
            Some(format!("p{index}"))
        };
        let briefs = briefs.clone();
        api.expect_list_items_page()
            .withf(move |ds, token, size, _| ds == "datasources/ds" && *token == expected_token && *size == 10)
            .times(1)
            .return_once(move |_, _, _, brief| {
                briefs.lock().unwrap().push(brief);
                Ok(listed)
            });
    }
    api
}

#[tokio::test]
async fn list_items_returns_union_of_pages() {
    let cases: Vec<(&str, Vec<ItemsPage>, usize)> = vec![
        ("no items", vec![ItemsPage::default()], 0),
        ("one page", vec![items_page(&["a", "b"], None)], 2),
        (
            "several pages",
            vec![
                items_page(&["a", "b"], Some("p1")),
                items_page(&["c"], Some("p2")),
                items_page(&["d", "e"], None),
            ],
            5,
        ),
    ];

    for (name, pages, expected) in cases {
        let briefs = Arc::new(Mutex::new(Vec::new()));
        let service = ItemsService::new(mock_listing(pages, briefs.clone()), "ds");
        let items = service.list_items().await.expect("listing should succeed");
        assert_eq!(items.len(), expected, "case: {name}");

        let mut names: Vec<&str> = items.iter().filter_map(|i| i["name"].as_str()).collect();
        names.dedup();
        assert_eq!(names.len(), expected, "no duplicates in case: {name}");
    }
}

#[tokio::test]
async fn list_detail_controls_brief_flag_per_page() {
    let cases = vec![
        (ListDetail::Full, vec![false, false, false]),
        (ListDetail::Brief, vec![true, true, true]),
        (ListDetail::FirstPageFull, vec![false, true, true]),
    ];

    for (detail, expected) in cases {
        let briefs = Arc::new(Mutex::new(Vec::new()));
        let pages = vec![
            items_page(&["a"], Some("p1")),
            items_page(&["b"], Some("p2")),
            items_page(&["c"], None),
        ];
        let service = ItemsService::new(mock_listing(pages, briefs.clone()), "ds").with_list_detail(detail);
        service.list_items().await.unwrap();
        assert_eq!(*briefs.lock().unwrap(), expected, "detail {detail:?}");
    }
}

#[tokio::test]
async fn get_and_push_use_full_item_names() {
    let mut api = MockSearchIndexApi::new();
    api.expect_get_item()
        .withf(|name| name == "datasources/ds/items/abc123")
        .times(1)
        .returning(|name| Ok(json!({"name": name})));
    api.expect_push_item()
        .withf(|name, body| name == "datasources/ds/items/abc123" && body["item"]["type"] == "MODIFIED")
        .times(1)
        .returning(|_, _| Ok(json!({})));

    let service = ItemsService::new(api, "ds");
    let item = service.get_item("abc123").await.unwrap();
    assert_eq!(item["name"], "datasources/ds/items/abc123");
    service
        .push_item("abc123", &json!({"item": {"type": "MODIFIED"}}))
        .await
        .unwrap();
}

#[tokio::test]
async fn insert_item_adds_default_mode_only_when_missing() {
    let captured: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let mut api = MockSearchIndexApi::new();
    let sink = captured.clone();
    api.expect_index_item()
        .withf(|name, _| name == "datasources/ds/items/x")
        .times(2)
        .returning(move |_, body| {
            sink.lock().unwrap().push(body.clone());
            Ok(json!({"done": true}))
        });

    let service = ItemsService::new(api, "ds").with_mode(RequestMode::Asynchronous);

    let mut plain = ItemBody::from_template(json!({"item": {}})).unwrap();
    service.insert_item("x", &mut plain).await.unwrap();

    let mut explicit = ItemBody::from_template(json!({"item": {}, "mode": "SYNCHRONOUS"})).unwrap();
    service.insert_item("x", &mut explicit).await.unwrap();

    let bodies = captured.lock().unwrap();
    assert_eq!(bodies[0]["mode"], "ASYNCHRONOUS");
    assert_eq!(bodies[1]["mode"], "SYNCHRONOUS");
}

#[tokio::test]
async fn insert_with_media_sets_raw_content_reference() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("readme.txt");
    std::fs::write(&file, b"hello").unwrap();

    let captured: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let mut api = MockSearchIndexApi::new();
    api.expect_start_upload()
        .withf(|name| name == "datasources/ds/items/abc123:upload")
        .times(1)
        .returning(|_| {
            Ok(UploadSession {
                name: "datasources/ds/items/abc123/session-1".into(),
            })
        });
    api.expect_upload_media()
        .withf(|session, content| session.name.ends_with("session-1") && content == b"hello")
        .times(1)
        .returning(|_, _| Ok(json!({"resourceName": "media/abc123"})));
    let sink = captured.clone();
    api.expect_index_item()
        .times(1)
        .returning(move |_, body| {
            *sink.lock().unwrap() = Some(body.clone());
            Ok(json!({}))
        });

    let service = ItemsService::new(api, "ds");
    let mut body = ItemBody::from_template(json!({"item": {}})).unwrap();
    service
        .insert_item_with_media("abc123", &mut body, &file)
        .await
        .expect("insert with media should succeed");

    let sent = captured.lock().unwrap().clone().expect("index_item called");
    assert_eq!(sent["item"]["content"]["contentFormat"], "RAW");
    assert_eq!(sent["item"]["content"]["contentDataRef"], json!({"resourceName": "media/abc123"}));
    // sha256("hello")
    assert_eq!(
        sent["item"]["content"]["hash"],
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
}

#[tokio::test]
async fn insert_with_media_falls_back_to_session_when_transfer_fails() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("readme.txt");
    std::fs::write(&file, b"hello").unwrap();

    let captured: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let mut api = MockSearchIndexApi::new();
    api.expect_start_upload()
        .returning(|_| Ok(UploadSession { name: "session-9".into() }));
    api.expect_upload_media()
        .times(1)
        .returning(|_, _| Err(SyncError::Upload("HTTP 503".into())));
    let sink = captured.clone();
    api.expect_index_item()
        .times(1)
        .returning(move |_, body| {
            *sink.lock().unwrap() = Some(body.clone());
            Ok(json!({}))
        });

    let service = ItemsService::new(api, "ds");
    let mut body = ItemBody::new();
    service
        .insert_item_with_media("abc123", &mut body, &file)
        .await
        .expect("transfer failure must not abort the insert");

    let sent = captured.lock().unwrap().clone().unwrap();
    assert_eq!(sent["item"]["content"]["contentFormat"], "RAW");
    assert_eq!(sent["item"]["content"]["contentDataRef"], json!({"name": "session-9"}));
}

#[tokio::test]
async fn insert_with_media_aborts_when_session_cannot_be_reserved() {
    let mut api = MockSearchIndexApi::new();
    api.expect_start_upload()
        .returning(|_| Err(SyncError::IndexWrite("HTTP 403".into())));
    api.expect_upload_media().times(0);
    api.expect_index_item().times(0);

    let service = ItemsService::new(api, "ds");
    let mut body = ItemBody::new();
    let err = service
        .insert_item_with_media("abc123", &mut body, std::path::Path::new("missing.txt"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Upload(_)));
}

#[tokio::test]
async fn unreadable_media_file_aborts_before_transfer() {
    let mut api = MockSearchIndexApi::new();
    api.expect_start_upload()
        .times(1)
        .returning(|_| Ok(UploadSession { name: "session-2".into() }));
    api.expect_upload_media().times(0);
    api.expect_index_item().times(0);

    let dir = tempdir().unwrap();
    let service = ItemsService::new(api, "ds");
    let mut body = ItemBody::new();
    let err = service
        .insert_item_with_media("abc123", &mut body, &dir.path().join("gone.txt"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Io { .. }));
}

#[tokio::test]
async fn delete_item_is_synchronous_and_uses_listed_name() {
    let mut api = MockSearchIndexApi::new();
    api.expect_delete_item()
        .withf(|name, version, mode| name == "x" && version == "v1" && *mode == RequestMode::Synchronous)
        .times(1)
        .returning(|_, _, _| Ok(json!({})));

    let service = ItemsService::new(api, "ds");
    service.delete_item("x", "v1").await.unwrap();
}
