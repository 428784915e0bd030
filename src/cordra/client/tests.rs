use super::*;
use mockito::{Matcher, Server};
use serde_json::json;
use std::io::Write;

const AUTH: &str = "Basic YWRtaW46cGFzc3dvcmQ="; // admin:password

fn client(server: &Server) -> CordraClient {
    CordraClient::new(server.url(), "admin", "password", true).unwrap()
}

#[tokio::test]
async fn test_create_json_object() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/objects")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("type".into(), "Person".into()),
            Matcher::UrlEncoded("full".into(), "true".into()),
        ]))
        .match_header("authorization", AUTH)
        .match_body(Matcher::Json(json!({ "identifier": "https://orcid.org/1" })))
        .with_status(200)
        .with_body(json!({
            "id": "test/abc",
            "type": "Person",
            "content": { "@id": "test/abc", "identifier": "https://orcid.org/1" }
        }).to_string())
        .create_async()
        .await;

    let created = client(&server)
        .create("Person", &json!({ "identifier": "https://orcid.org/1" }), None)
        .await
        .unwrap();

    assert_eq!(object_id(&created), Some("test/abc"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_create_injects_id_when_schema_has_no_mapping() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/objects")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({ "id": "test/xyz", "type": "Dataset", "content": { "name": "d" } }).to_string())
        .create_async()
        .await;

    let created = client(&server).create("Dataset", &json!({ "name": "d" }), None).await.unwrap();

    assert_eq!(created, json!({ "name": "d", "@id": "test/xyz" }));
}

#[tokio::test]
async fn test_create_without_any_id_fails() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/objects")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({ "content": { "name": "d" } }).to_string())
        .create_async()
        .await;

    let err = client(&server).create("Dataset", &json!({ "name": "d" }), None).await.unwrap_err();

    assert!(matches!(err, CordraError::MissingId(ref t) if t == "Dataset"));
}

#[tokio::test]
async fn test_create_with_payload_sends_multipart() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/objects")
        .match_query(Matcher::UrlEncoded("type".into(), "FileObject".into()))
        .match_header("content-type", Matcher::Regex("^multipart/form-data".into()))
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="content""#.into()),
            Matcher::Regex(r#"name="node/data.csv"; filename="node/data.csv""#.into()),
            Matcher::Regex("a,b,c".into()),
        ]))
        .with_status(200)
        .with_body(json!({ "id": "test/f1", "content": { "@id": "test/f1" } }).to_string())
        .create_async()
        .await;

    let mut staged = tempfile::NamedTempFile::new().unwrap();
    staged.write_all(b"a,b,c\n").unwrap();
    staged.flush().unwrap();

    let created = client(&server)
        .create(
            "FileObject",
            &json!({ "name": "data.csv" }),
            Some(Payload::new("node/data.csv", staged.path())),
        )
        .await
        .unwrap();

    assert_eq!(object_id(&created), Some("test/f1"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_create_with_missing_payload_file() {
    let server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();

    let err = client(&server)
        .create("FileObject", &json!({}), Some(Payload::new("gone", dir.path().join("gone"))))
        .await
        .unwrap_err();

    assert!(matches!(err, CordraError::Payload(ref name, _) if name == "gone"));
}

#[tokio::test]
async fn test_error_message_is_extracted() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/objects")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(json!({ "message": "Schema validation failed" }).to_string())
        .create_async()
        .await;

    let err = client(&server).create("Dataset", &json!({}), None).await.unwrap_err();

    assert_eq!(err.to_string(), "Cordra returned 400 Bad Request: Schema validation failed");
}

#[tokio::test]
async fn test_read_update_delete() {
    let mut server = Server::new_async().await;
    let read = server
        .mock("GET", "/objects/test/f1")
        .match_header("authorization", AUTH)
        .with_status(200)
        .with_body(json!({ "@id": "test/f1", "name": "a" }).to_string())
        .create_async()
        .await;
    let update = server
        .mock("PUT", "/objects/test/f1")
        .match_body(Matcher::PartialJson(json!({ "resultOf": "test/action" })))
        .with_status(200)
        .with_body(json!({ "@id": "test/f1", "name": "a", "resultOf": "test/action" }).to_string())
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/objects/test/f1")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let client = client(&server);
    let mut object = client.read("test/f1").await.unwrap();
    object["resultOf"] = json!("test/action");
    let updated = client.update("test/f1", &object).await.unwrap();
    client.delete("test/f1").await.unwrap();

    assert_eq!(updated["resultOf"], "test/action");
    read.assert_async().await;
    update.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test]
async fn test_health_requires_schemas() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/search")
        .match_query(Matcher::UrlEncoded("query".into(), "type:Schema".into()))
        .with_status(200)
        .with_body(json!({ "size": 0, "results": [] }).to_string())
        .create_async()
        .await;

    let err = client(&server).check_health().await.unwrap_err();
    assert!(matches!(err, CordraError::NoSchemas));
}

#[tokio::test]
async fn test_health_ok() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/search")
        .match_query(Matcher::UrlEncoded("query".into(), "type:Schema".into()))
        .with_status(200)
        .with_body(json!({ "pageNum": 0, "size": 12, "results": [{}] }).to_string())
        .create_async()
        .await;

    client(&server).check_health().await.unwrap();
}

#[test]
fn test_object_url() {
    let client = CordraClient::new("https://cordra.example.org/", "u", "p", false).unwrap();
    assert_eq!(client.object_url("test/abc"), "https://cordra.example.org/objects/test/abc");
}
