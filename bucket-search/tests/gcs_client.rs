use bucket_search::auth::AccessToken;
use bucket_search::gcs::GcsClient;
use bucket_search_core::contract::StorageApi;
use bucket_search_core::storage::CloudStorage;
use bucket_search_core::SyncError;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> GcsClient {
    GcsClient::new(server.uri(), AccessToken::new("storage-token"))
}

#[tokio::test]
async fn listing_follows_page_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/docs-bucket/o"))
        .and(query_param_is_missing("pageToken"))
        .and(header("authorization", "Bearer storage-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "storage#objects",
            "items": [{"name": "a.txt", "id": "docs-bucket/a.txt/1", "bucket": "docs-bucket", "size": "3"}],
            "nextPageToken": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/docs-bucket/o"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "storage#objects",
            "items": [{"name": "b/c.txt", "id": "docs-bucket/b/c.txt/1", "bucket": "docs-bucket"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let storage = CloudStorage::new(client(&server));
    let objects = storage.list_objects("docs-bucket").await.unwrap();
    let names: Vec<&str> = objects.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b/c.txt"]);
    assert_eq!(objects[0].size.as_deref(), Some("3"));
}

#[tokio::test]
async fn empty_bucket_has_no_items_field() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/empty/o"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "storage#objects"})))
        .mount(&server)
        .await;

    let page = client(&server).list_objects_page("empty", None).await.unwrap();
    assert!(page.items.is_empty());
    assert!(page.next_page_token.is_none());
}

#[tokio::test]
async fn listing_rejection_is_remote_list_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/private/o"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let err = client(&server).list_objects_page("private", None).await.unwrap_err();
    match err {
        SyncError::RemoteList(message) => assert!(message.contains("403"), "{message}"),
        other => panic!("expected RemoteList, got {other:?}"),
    }
}

#[tokio::test]
async fn media_chunks_are_requested_by_range() {
    let server = MockServer::start().await;
    let content = b"0123456789abcde".to_vec();
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/b/o/docs%2Freadme.txt"))
        .and(query_param("alt", "media"))
        .and(header("range", "bytes=0-9"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 0-9/15")
                .set_body_bytes(content[..10].to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/b/o/docs%2Freadme.txt"))
        .and(header("range", "bytes=10-19"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 10-14/15")
                .set_body_bytes(content[10..].to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let storage = CloudStorage::new(client(&server)).with_chunk_size(10);
    let objects = vec![bucket_object("docs/readme.txt")];
    let dir = tempdir().unwrap();
    let file = storage.download_object(&objects[0], dir.path()).await.unwrap();

    assert_eq!(file, dir.path().join("readme.txt"));
    assert_eq!(std::fs::read(file).unwrap(), content);
}

#[tokio::test]
async fn full_response_and_empty_object_are_handled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/b/o/whole.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"whole".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/b/o/empty.txt"))
        .respond_with(ResponseTemplate::new(416).insert_header("content-range", "bytes */0"))
        .mount(&server)
        .await;

    let api = client(&server);
    let whole = api.fetch_media_chunk("b", "whole.txt", 0, 1024).await.unwrap();
    assert_eq!(whole.data, b"whole".to_vec());
    assert_eq!(whole.total_size, Some(5));

    let empty = api.fetch_media_chunk("b", "empty.txt", 0, 1024).await.unwrap();
    assert!(empty.data.is_empty());
    assert_eq!(empty.total_size, Some(0));
}

#[tokio::test]
async fn missing_object_is_download_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/b/o/gone.txt"))
        .respond_with(ResponseTemplate::new(404).set_body_string("No such object"))
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_media_chunk("b", "gone.txt", 0, 10)
        .await
        .unwrap_err();
    match err {
        SyncError::Download { object, message } => {
            assert_eq!(object, "gone.txt");
            assert!(message.contains("404"));
        }
        other => panic!("expected Download, got {other:?}"),
    }
}

fn bucket_object(name: &str) -> bucket_search_core::contract::BucketObject {
    bucket_search_core::contract::BucketObject {
        name: name.to_string(),
        id: format!("b/{name}/1"),
        bucket: "b".to_string(),
        size: None,
        content_type: None,
    }
}
