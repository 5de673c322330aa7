//! Tests for DriveClient with mocked HTTP responses.

use std::time::Duration;

use drive_rotate::models::{ApplicationSecret, FileListResponse, FileResource, StoredCredential};
use drive_rotate::{Authenticator, DriveClient, DriveError, DriveGateway, LocalFile};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use time::OffsetDateTime;

fn secret(token_uri: String) -> ApplicationSecret {
    ApplicationSecret {
        client_id: "client-id.apps.googleusercontent.com".to_string(),
        client_secret: "client-secret".to_string(),
        auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
        token_uri,
        redirect_uris: vec!["http://localhost".to_string()],
    }
}

fn client(server: &ServerGuard) -> DriveClient {
    let credential = StoredCredential {
        access_token: "test-token".to_string(),
        refresh_token: None,
        expires_at: OffsetDateTime::now_utc() + time::Duration::hours(1),
        scopes: vec!["https://www.googleapis.com/auth/drive.file".to_string()],
    };
    let auth = Authenticator::new(secret(format!("{}/token", server.url())), credential, None);
    DriveClient::with_base_urls(
        auth,
        Duration::from_secs(5),
        server.url(),
        format!("{}/upload", server.url()),
    )
    .unwrap()
}

fn api_error(code: u16, message: &str, reason: &str) -> String {
    json!({
        "error": {
            "code": code,
            "message": message,
            "errors": [{"reason": reason, "message": message}]
        }
    })
    .to_string()
}

mod models {
    use super::*;
    use drive_rotate::RemoteFile;

    #[test]
    fn test_file_list_response_deserialization() {
        let json = json!({
            "files": [
                {"id": "f1", "name": "file1.txt", "createdTime": "2025-03-14T09:26:53.123Z"},
                {"id": "f2", "name": "file2.txt"}
            ],
            "nextPageToken": "token123"
        });

        let response: FileListResponse = serde_json::from_value(json).unwrap();

        assert_eq!(response.files.len(), 2);
        assert!(response.files[0].created_time.is_some());
        assert!(response.files[1].created_time.is_none());
        assert_eq!(response.next_page_token, Some("token123".to_string()));
    }

    #[test]
    fn test_file_list_response_empty() {
        let response: FileListResponse = serde_json::from_value(json!({})).unwrap();

        assert!(response.files.is_empty());
        assert!(response.next_page_token.is_none());
    }

    #[test]
    fn test_remote_file_requires_created_time() {
        let resource: FileResource =
            serde_json::from_value(json!({"id": "f1", "name": "a.txt"})).unwrap();

        let err = RemoteFile::try_from(resource).unwrap_err();
        assert!(matches!(err, DriveError::Malformed(_)));
    }

    #[test]
    fn test_remote_file_display() {
        let resource: FileResource = serde_json::from_value(json!({
            "id": "f1",
            "name": "report_20250314_092653.pdf",
            "createdTime": "2025-03-14T09:26:53Z",
            "parents": ["folder-a"]
        }))
        .unwrap();

        let file = RemoteFile::try_from(resource).unwrap();
        assert_eq!(file.parent_id.as_deref(), Some("folder-a"));
        assert_eq!(
            file.to_string(),
            "report_20250314_092653.pdf (Created: 2025-03-14T09:26:53Z)"
        );
    }
}

mod folders {
    use super::*;

    #[tokio::test]
    async fn test_find_folder_sends_escaped_query() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/files")
            .match_header("authorization", "Bearer test-token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded(
                    "q".into(),
                    "mimeType='application/vnd.google-apps.folder' and name='Bob\\'s files' and trashed=false"
                        .into(),
                ),
                Matcher::UrlEncoded("spaces".into(), "drive".into()),
            ]))
            .with_status(200)
            .with_body(json!({"files": [{"id": "folder-b", "name": "Bob's files"}]}).to_string())
            .create_async()
            .await;

        let folder = client(&server)
            .find_folder_by_name("Bob's files")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(folder.id, "folder-b");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_find_folder_requires_exact_name() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"files": [
                    {"id": "folder-x", "name": "MyFiles"},
                    {"id": "folder-y", "name": "myfiles"}
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let folder = client(&server)
            .find_folder_by_name("myfiles")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(folder.id, "folder-y");
    }

    #[tokio::test]
    async fn test_find_or_create_creates_missing_folder() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"files": []}).to_string())
            .create_async()
            .await;
        let create = server
            .mock("POST", "/files")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({
                "name": "myfiles",
                "mimeType": "application/vnd.google-apps.folder"
            })))
            .with_status(200)
            .with_body(json!({"id": "folder-new", "name": "myfiles"}).to_string())
            .create_async()
            .await;

        let folder = client(&server)
            .find_or_create_folder("myfiles")
            .await
            .unwrap();

        assert_eq!(folder.id, "folder-new");
        assert_eq!(folder.name, "myfiles");
        create.assert_async().await;
    }
}

mod listing {
    use super::*;

    #[tokio::test]
    async fn test_list_children_follows_pages() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/files")
            .match_query(Matcher::Regex("pageSize=1000$".into()))
            .with_status(200)
            .with_body(
                json!({
                    "files": [
                        {"id": "f1", "name": "a.txt", "createdTime": "2025-03-14T09:00:00Z", "parents": ["folder-a"]},
                        {"id": "f2", "name": "b.txt", "createdTime": "2025-03-14T09:00:01Z", "parents": ["folder-a"]}
                    ],
                    "nextPageToken": "p2"
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/files")
            .match_query(Matcher::Regex("pageToken=p2$".into()))
            .with_status(200)
            .with_body(
                json!({
                    "files": [
                        {"id": "f3", "name": "c.txt", "createdTime": "2025-03-14T09:00:02Z", "parents": ["folder-a"]}
                    ]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let files = client(&server).list_children("folder-a").await.unwrap();

        let ids: Vec<_> = files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "f2", "f3"]);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_created_time_is_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"files": [{"id": "f1", "name": "a.txt"}]}).to_string())
            .create_async()
            .await;

        let err = client(&server).list_children("folder-a").await.unwrap_err();
        assert!(matches!(err, DriveError::Malformed(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_garbage_body_is_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let err = client(&server).list_children("folder-a").await.unwrap_err();
        assert!(matches!(err, DriveError::Malformed(_)));
    }
}

mod upload {
    use super::*;

    #[tokio::test]
    async fn test_upload_sends_metadata_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.4 fake").unwrap();
        let local = LocalFile::inspect(&path).unwrap();

        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/upload/files")
            .match_header("authorization", "Bearer test-token")
            .match_header("content-type", Matcher::Regex("^multipart/".into()))
            .match_query(Matcher::UrlEncoded("uploadType".into(), "multipart".into()))
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("report_20250314_092653.pdf".into()),
                Matcher::Regex("folder-a".into()),
                Matcher::Regex("%PDF-1.4 fake".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "id": "file-new",
                    "name": "report_20250314_092653.pdf",
                    "createdTime": "2025-03-14T09:26:54.512Z",
                    "mimeType": "application/pdf",
                    "parents": ["folder-a"]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let uploaded = client(&server)
            .upload_file(&local, "folder-a", "report_20250314_092653.pdf", "application/pdf")
            .await
            .unwrap();

        assert_eq!(uploaded.id, "file-new");
        assert_eq!(uploaded.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(uploaded.parent_id.as_deref(), Some("folder-a"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_over_quota() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"a").unwrap();
        let local = LocalFile::inspect(&path).unwrap();

        let mut server = Server::new_async().await;
        server
            .mock("POST", "/upload/files")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body(api_error(
                403,
                "The user's Drive storage quota has been exceeded.",
                "storageQuotaExceeded",
            ))
            .create_async()
            .await;

        let err = client(&server)
            .upload_file(&local, "folder-a", "a_20250314_092653.txt", "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::Quota(_)));
    }
}

mod error_handling {
    use super::*;

    #[tokio::test]
    async fn test_delete_missing_file_is_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("DELETE", "/files/gone")
            .with_status(404)
            .with_body(api_error(404, "File not found: gone.", "notFound"))
            .create_async()
            .await;

        match client(&server).delete_file("gone").await {
            Err(DriveError::NotFound(id)) => assert_eq!(id, "gone"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_succeeds_on_no_content() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/files/f1")
            .match_header("authorization", "Bearer test-token")
            .with_status(204)
            .create_async()
            .await;

        client(&server).delete_file("f1").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_classification() {
        let cases: [(usize, &str, fn(&DriveError) -> bool); 4] = [
            (503, "backendError", |e| matches!(e, DriveError::TransientIo(_))),
            (429, "rateLimitExceeded", |e| matches!(e, DriveError::Quota(_))),
            (401, "authError", |e| matches!(e, DriveError::Auth(_))),
            (400, "invalid", |e| matches!(e, DriveError::Api { status: 400, .. })),
        ];

        for (status, reason, check) in cases {
            let mut server = Server::new_async().await;
            server
                .mock("GET", "/files")
                .match_query(Matcher::Any)
                .with_status(status)
                .with_body(api_error(status as u16, "failed", reason))
                .create_async()
                .await;

            let err = client(&server).list_children("folder-a").await.unwrap_err();
            assert!(check(&err), "status {status} gave {err:?}");
        }
    }

    #[tokio::test]
    async fn test_request_timeout_is_transient() {
        // Accepts connections into the backlog but never answers.
        let silent = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", silent.local_addr().unwrap());

        let credential = StoredCredential {
            access_token: "test-token".to_string(),
            refresh_token: None,
            expires_at: OffsetDateTime::now_utc() + time::Duration::hours(1),
            scopes: Vec::new(),
        };
        let auth = Authenticator::new(secret(format!("{base}/token")), credential, None);
        let client = DriveClient::with_base_urls(
            auth,
            Duration::from_millis(200),
            base.clone(),
            format!("{base}/upload"),
        )
        .unwrap();

        let err = client.list_children("folder-a").await.unwrap_err();
        assert!(matches!(err, DriveError::TransientIo(_)), "got {err:?}");
        assert!(err.is_transient());
        drop(silent);
    }

    #[test]
    fn test_error_display() {
        let err = DriveError::Api {
            status: 400,
            message: "Invalid query".to_string(),
        };

        let display = format!("{}", err);
        assert!(display.contains("400"));
        assert!(display.contains("Invalid query"));
    }

    #[test]
    fn test_only_auth_is_fatal() {
        assert!(DriveError::Auth("revoked".to_string()).is_fatal());
        assert!(!DriveError::Quota("full".to_string()).is_fatal());
        assert!(!DriveError::NotFound("f1".to_string()).is_fatal());
    }
}
