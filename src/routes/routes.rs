//! Defines routes for the deposit file API.
//!
//! ## Structure
//! - **Service endpoints**
//!   - `GET  /healthz`, `GET /readyz`
//!   - `POST /login`, `POST /logout`: session cookie
//!   - `POST /deposits`: create a draft deposit
//!
//! - **Collection endpoints** (`/deposit/{pid}/files`)
//!   - `GET` list, `POST` upload, `PUT` reorder
//!
//! - **Item endpoints** (`/deposit/{pid}/files/{key}`)
//!   - `GET` representation, `PUT` rename, `DELETE` detach
//!   - `GET .../content` download

use crate::{
    handlers::{
        auth_handlers::{login, logout},
        deposit_handlers::create_deposit,
        file_handlers::{
            delete_file, download_file, get_file, list_files, rename_file, reorder_files,
            upload_file,
        },
        health_handlers::{healthz, readyz},
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build and return the router for all deposit routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/deposits", post(create_deposit))
        .route(
            "/deposit/{pid}/files",
            get(list_files).post(upload_file).put(reorder_files),
        )
        .route(
            "/deposit/{pid}/files/{key}",
            get(get_file).put(rename_file).delete(delete_file),
        )
        .route("/deposit/{pid}/files/{key}/content", get(download_file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, PASSWORD};
    use axum::{
        body::Body,
        extract::DefaultBodyLimit,
        http::{Method, Request, StatusCode, header},
        response::Response,
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const BOUNDARY: &str = "deposit-files-test-boundary";
    const CONTENT: &[u8] = b"### Testing textfile ###";

    enum Auth<'a> {
        None,
        Cookie(&'a str),
        Bearer(&'a str),
    }

    async fn send(
        fx: &Fixture,
        method: Method,
        uri: &str,
        auth: Auth<'_>,
        content_type: Option<String>,
        body: Vec<u8>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        builder = match auth {
            Auth::None => builder,
            Auth::Cookie(secret) => builder.header(header::COOKIE, format!("session={secret}")),
            Auth::Bearer(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
        };
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        routes()
            .with_state(fx.state.clone())
            .oneshot(builder.body(Body::from(body)).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn multipart(file: Option<(&str, &[u8])>, name: Option<&str>) -> (Option<String>, Vec<u8>) {
        let mut body = Vec::new();
        if let Some(name) = name {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{name}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((filename, content)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        (
            Some(format!("multipart/form-data; boundary={BOUNDARY}")),
            body,
        )
    }

    fn files_uri(fx: &Fixture) -> String {
        format!("/deposit/{}/files", fx.deposit.pid)
    }

    fn file_uri(fx: &Fixture, key: &str) -> String {
        format!("/deposit/{}/files/{}", fx.deposit.pid, key)
    }

    fn reload_keys(deposit: &crate::models::deposit::Deposit) -> Vec<String> {
        deposit.files.list().iter().map(|e| e.key.clone()).collect()
    }

    #[tokio::test]
    async fn test_files_get() {
        let fx = Fixture::new().await;
        fx.attach("test.txt", b"hello").await;
        let uri = files_uri(&fx);

        let res = send(&fx, Method::GET, &uri, Auth::None, None, vec![]).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let owner = fx.session(&fx.owner_email).await;
        let res = send(&fx, Method::GET, &uri, Auth::Cookie(&owner), None, vec![]).await;
        assert_eq!(res.status(), StatusCode::OK);
        let data = json_body(res).await;
        let entry = fx.reload().await.files.get("test.txt").unwrap().clone();
        assert_eq!(data[0]["checksum"], entry.file.checksum);
        assert_eq!(data[0]["filename"], "test.txt");
        assert_eq!(data[0]["filesize"], 5);
        assert_eq!(data[0]["id"], entry.file.id.to_string());

        let other = fx.session(&fx.other_email).await;
        let res = send(&fx, Method::GET, &uri, Auth::Cookie(&other), None, vec![]).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_files_get_without_files() {
        let fx = Fixture::new().await;
        let owner = fx.session(&fx.owner_email).await;
        let res = send(&fx, Method::GET, &files_uri(&fx), Auth::Cookie(&owner), None, vec![]).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await, json!([]));
    }

    #[tokio::test]
    async fn test_unknown_deposit_is_not_found() {
        let fx = Fixture::new().await;
        for uri in ["/deposit/424242/files", "/deposit/not-a-pid/files/a.txt"] {
            let res = send(&fx, Method::GET, uri, Auth::None, None, vec![]).await;
            assert_eq!(res.status(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn test_files_post() {
        let fx = Fixture::new().await;
        let uri = files_uri(&fx);

        let (ct, body) = multipart(Some(("test.json", CONTENT)), Some("real_test.json"));
        let res = send(&fx, Method::POST, &uri, Auth::None, ct, body).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let owner = fx.session(&fx.owner_email).await;
        let (ct, body) = multipart(None, Some("real_test.json"));
        let res = send(&fx, Method::POST, &uri, Auth::Cookie(&owner), ct, body).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let (ct, body) = multipart(Some(("test.json", CONTENT)), Some("real_test.json"));
        let res = send(&fx, Method::POST, &uri, Auth::Cookie(&owner), ct, body).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let data = json_body(res).await;

        let deposit = fx.reload().await;
        let entry = &deposit.files.list()[0];
        let digest = format!("md5:{:x}", md5::compute(CONTENT));
        assert_eq!(deposit.files.len(), 1);
        assert_eq!(entry.key, "real_test.json");
        assert_eq!(entry.file.checksum, digest);
        assert_eq!(entry.file.size, CONTENT.len() as i64);
        assert_eq!(data["filename"], "real_test.json");
        assert_eq!(data["checksum"], digest);
        assert_eq!(data["id"], entry.file.id.to_string());

        let other = fx.session(&fx.other_email).await;
        let (ct, body) = multipart(Some(("test.json", CONTENT)), Some("real_test.json"));
        let res = send(&fx, Method::POST, &uri, Auth::Cookie(&other), ct, body).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    async fn stored_instances(fx: &Fixture) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM file_instances")
            .fetch_one(&*fx.state.db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_uploads_never_lose_files() {
        let fx = Fixture::new().await;
        let owner = fx.session(&fx.owner_email).await;
        let uri = files_uri(&fx);
        let (ct_a, body_a) = multipart(Some(("a.txt", b"aaa")), None);
        let (ct_b, body_b) = multipart(Some(("b.txt", b"bbb")), None);

        let (a, b) = tokio::join!(
            send(&fx, Method::POST, &uri, Auth::Cookie(&owner), ct_a, body_a),
            send(&fx, Method::POST, &uri, Auth::Cookie(&owner), ct_b, body_b),
        );
        let statuses = [a.status(), b.status()];
        for status in statuses {
            assert!(
                status == StatusCode::CREATED || status == StatusCode::CONFLICT,
                "unexpected status {status}"
            );
        }
        let created = statuses
            .iter()
            .filter(|s| **s == StatusCode::CREATED)
            .count();
        assert!(created >= 1);

        let deposit = fx.reload().await;
        assert_eq!(deposit.files.len(), created);
        assert_eq!(stored_instances(&fx).await as usize, created);
    }

    #[tokio::test]
    async fn test_truncated_upload_is_bad_request() {
        let fx = Fixture::new().await;
        let owner = fx.session(&fx.owner_email).await;
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(CONTENT);

        let res = send(
            &fx,
            Method::POST,
            &files_uri(&fx),
            Auth::Cookie(&owner),
            Some(format!("multipart/form-data; boundary={BOUNDARY}")),
            body,
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(fx.reload().await.files.is_empty());
        assert_eq!(stored_instances(&fx).await, 0);
    }

    #[tokio::test]
    async fn test_upload_over_body_limit_is_payload_too_large() {
        let fx = Fixture::new().await;
        let owner = fx.session(&fx.owner_email).await;
        let big = vec![b'x'; 4096];
        let (ct, body) = multipart(Some(("big.bin", &big)), Some("big.bin"));

        let request = Request::builder()
            .method(Method::POST)
            .uri(files_uri(&fx))
            .header(header::COOKIE, format!("session={owner}"))
            .header(header::CONTENT_TYPE, ct.unwrap())
            .body(Body::from(body))
            .unwrap();
        let res = routes()
            .with_state(fx.state.clone())
            .layer(DefaultBodyLimit::max(1024))
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(fx.reload().await.files.is_empty());
        assert_eq!(stored_instances(&fx).await, 0);
    }

    #[tokio::test]
    async fn test_files_post_oauth2() {
        let fx = Fixture::new().await;
        let token = fx.write_token().await;
        let (ct, body) = multipart(Some(("test.json", CONTENT)), Some("real_test.json"));
        let res = send(&fx, Method::POST, &files_uri(&fx), Auth::Bearer(&token), ct, body).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(json_body(res).await["filename"], "real_test.json");
    }

    #[tokio::test]
    async fn test_files_post_uses_part_filename_without_name() {
        let fx = Fixture::new().await;
        let owner = fx.session(&fx.owner_email).await;
        let (ct, body) = multipart(Some(("test.json", CONTENT)), None);
        let res = send(&fx, Method::POST, &files_uri(&fx), Auth::Cookie(&owner), ct, body).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(json_body(res).await["filename"], "test.json");
    }

    #[tokio::test]
    async fn test_files_post_duplicate_key_conflicts() {
        let fx = Fixture::new().await;
        fx.attach("real_test.json", b"first").await;
        let owner = fx.session(&fx.owner_email).await;

        let (ct, body) = multipart(Some(("test.json", CONTENT)), Some("real_test.json"));
        let res = send(&fx, Method::POST, &files_uri(&fx), Auth::Cookie(&owner), ct, body).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM file_instances")
            .fetch_one(&*fx.state.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_read_only_token_cannot_upload() {
        let fx = Fixture::new().await;
        let token = fx.state.auth.issue_token(fx.owner, &[]).await.unwrap();

        let res = send(&fx, Method::GET, &files_uri(&fx), Auth::Bearer(&token), None, vec![]).await;
        assert_eq!(res.status(), StatusCode::OK);

        let (ct, body) = multipart(Some(("test.json", CONTENT)), Some("real_test.json"));
        let res = send(&fx, Method::POST, &files_uri(&fx), Auth::Bearer(&token), ct, body).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    async fn two_files(fx: &Fixture) -> (String, String) {
        fx.attach("hello.txt", b"### Testing textfile ###").await;
        fx.attach("world.txt", b"### Testing textfile 2 ###").await;
        let deposit = fx.reload().await;
        assert_eq!(reload_keys(&deposit), vec!["hello.txt", "world.txt"]);
        ("hello.txt".into(), "world.txt".into())
    }

    #[tokio::test]
    async fn test_files_put() {
        let fx = Fixture::new().await;
        let (key0, key) = two_files(&fx).await;
        let uri = files_uri(&fx);
        let order = serde_json::to_vec(&json!([{"id": key}, {"id": key0}])).unwrap();

        let res = send(&fx, Method::PUT, &uri, Auth::None, None, order.clone()).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let owner = fx.session(&fx.owner_email).await;
        let res = send(&fx, Method::PUT, &uri, Auth::Cookie(&owner), None, order.clone()).await;
        assert_eq!(res.status(), StatusCode::OK);
        let data = json_body(res).await;
        assert_eq!(data[0]["filename"], key);
        assert_eq!(data[1]["filename"], key0);

        let deposit = fx.reload().await;
        assert_eq!(deposit.files.len(), 2);
        assert_eq!(reload_keys(&deposit), vec![key.clone(), key0.clone()]);

        let other = fx.session(&fx.other_email).await;
        let res = send(&fx, Method::PUT, &uri, Auth::Cookie(&other), None, order).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_files_put_oauth2() {
        let fx = Fixture::new().await;
        let (key0, key) = two_files(&fx).await;
        let token = fx.write_token().await;
        let order = serde_json::to_vec(&json!([{"id": key}, {"id": key0}])).unwrap();

        let res = send(&fx, Method::PUT, &files_uri(&fx), Auth::Bearer(&token), None, order).await;
        assert_eq!(res.status(), StatusCode::OK);
        let data = json_body(res).await;
        assert_eq!(data[0]["filename"], key);
        assert_eq!(data[1]["filename"], key0);
    }

    #[tokio::test]
    async fn test_files_put_rejects_invalid_order() {
        let fx = Fixture::new().await;
        two_files(&fx).await;
        let owner = fx.session(&fx.owner_email).await;

        for body in [
            json!([{"id": "world.txt"}, {"id": "nope.txt"}]),
            json!([{"id": "world.txt"}]),
            json!([{"id": "world.txt"}, {"id": "world.txt"}]),
            json!({"id": "world.txt"}),
        ] {
            let body = serde_json::to_vec(&body).unwrap();
            let res = send(&fx, Method::PUT, &files_uri(&fx), Auth::Cookie(&owner), None, body).await;
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        }
        let res = send(
            &fx,
            Method::PUT,
            &files_uri(&fx),
            Auth::Cookie(&owner),
            None,
            b"not json".to_vec(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        assert_eq!(reload_keys(&fx.reload().await), vec!["hello.txt", "world.txt"]);
    }

    #[tokio::test]
    async fn test_file_get() {
        let fx = Fixture::new().await;
        fx.attach("test.txt", b"hello").await;
        let uri = file_uri(&fx, "test.txt");

        let res = send(&fx, Method::GET, &uri, Auth::None, None, vec![]).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let owner = fx.session(&fx.owner_email).await;
        let res = send(&fx, Method::GET, &uri, Auth::Cookie(&owner), None, vec![]).await;
        assert_eq!(res.status(), StatusCode::OK);
        let data = json_body(res).await;
        let entry = fx.reload().await.files.get("test.txt").unwrap().clone();
        assert_eq!(data["filename"], entry.key);
        assert_eq!(data["checksum"], entry.file.checksum);
        assert_eq!(data["id"], entry.file.id.to_string());

        let other = fx.session(&fx.other_email).await;
        let res = send(&fx, Method::GET, &uri, Auth::Cookie(&other), None, vec![]).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_file_get_not_found() {
        let fx = Fixture::new().await;
        let owner = fx.session(&fx.owner_email).await;
        let res = send(
            &fx,
            Method::GET,
            &file_uri(&fx, "not_found"),
            Auth::Cookie(&owner),
            None,
            vec![],
        )
        .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_key_gated_before_lookup() {
        let fx = Fixture::new().await;
        let uri = file_uri(&fx, "not_found");
        let other = fx.session(&fx.other_email).await;

        for method in [Method::GET, Method::PUT, Method::DELETE] {
            let res = send(&fx, method.clone(), &uri, Auth::None, None, b"{".to_vec()).await;
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
            let res = send(&fx, method, &uri, Auth::Cookie(&other), None, b"{".to_vec()).await;
            assert_eq!(res.status(), StatusCode::FORBIDDEN);
        }
    }

    #[tokio::test]
    async fn test_file_delete() {
        let fx = Fixture::new().await;
        fx.attach("test.txt", b"hello").await;
        let uri = file_uri(&fx, "test.txt");

        let res = send(&fx, Method::DELETE, &uri, Auth::None, None, vec![]).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(fx.reload().await.files.contains("test.txt"));

        let owner = fx.session(&fx.owner_email).await;
        let res = send(&fx, Method::DELETE, &uri, Auth::Cookie(&owner), None, vec![]).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
        assert!(!fx.reload().await.files.contains("test.txt"));

        let res = send(&fx, Method::DELETE, &uri, Auth::Cookie(&owner), None, vec![]).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let other = fx.session(&fx.other_email).await;
        let res = send(&fx, Method::DELETE, &uri, Auth::Cookie(&other), None, vec![]).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_file_delete_oauth2() {
        let fx = Fixture::new().await;
        fx.attach("test.txt", b"hello").await;
        let token = fx.write_token().await;
        let res = send(
            &fx,
            Method::DELETE,
            &file_uri(&fx, "test.txt"),
            Auth::Bearer(&token),
            None,
            vec![],
        )
        .await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(!fx.reload().await.files.contains("test.txt"));
    }

    #[tokio::test]
    async fn test_file_put_not_found() {
        let fx = Fixture::new().await;
        let owner = fx.session(&fx.owner_email).await;
        let body = serde_json::to_vec(&json!({"filename": "foobar"})).unwrap();
        let uri = file_uri(&fx, "not_found");

        let res = send(&fx, Method::PUT, &uri, Auth::Cookie(&owner), None, body.clone()).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        fx.attach("test.txt", b"hello").await;
        let res = send(&fx, Method::PUT, &uri, Auth::Cookie(&owner), None, body).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    async fn assert_renamed(fx: &Fixture, auth: Auth<'_>) {
        fx.attach("test.txt", b"hello").await;
        let old = fx.reload().await.files.get("test.txt").unwrap().file.clone();
        let new_filename = "test.txt-new-name";
        let body = serde_json::to_vec(&json!({ "filename": new_filename })).unwrap();

        let res = send(fx, Method::PUT, &file_uri(fx, "test.txt"), auth, None, body).await;
        assert_eq!(res.status(), StatusCode::OK);
        let data = json_body(res).await;

        let deposit = fx.reload().await;
        let entry = &deposit.files.list()[0];
        assert_eq!(entry.key, new_filename);
        assert_eq!(entry.file.id, old.id);
        assert_eq!(entry.file.checksum, old.checksum);
        assert_eq!(data["filename"], new_filename);
        assert_eq!(data["checksum"], old.checksum);
        assert_eq!(data["id"], old.id.to_string());
    }

    #[tokio::test]
    async fn test_file_put() {
        let fx = Fixture::new().await;
        let body = serde_json::to_vec(&json!({"filename": "x"})).unwrap();
        let res = send(&fx, Method::PUT, &file_uri(&fx, "test.txt"), Auth::None, None, body).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let owner = fx.session(&fx.owner_email).await;
        assert_renamed(&fx, Auth::Cookie(&owner)).await;
    }

    #[tokio::test]
    async fn test_file_put_oauth2() {
        let fx = Fixture::new().await;
        let token = fx.write_token().await;
        assert_renamed(&fx, Auth::Bearer(&token)).await;
    }

    #[tokio::test]
    async fn test_file_put_onto_existing_key_conflicts() {
        let fx = Fixture::new().await;
        let (key0, key) = two_files(&fx).await;
        let owner = fx.session(&fx.owner_email).await;
        let body = serde_json::to_vec(&json!({ "filename": key })).unwrap();

        let res = send(&fx, Method::PUT, &file_uri(&fx, &key0), Auth::Cookie(&owner), None, body).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert_eq!(reload_keys(&fx.reload().await), vec![key0, key]);
    }

    #[tokio::test]
    async fn test_file_download() {
        let fx = Fixture::new().await;
        fx.attach("test.txt", CONTENT).await;
        let owner = fx.session(&fx.owner_email).await;

        let res = send(
            &fx,
            Method::GET,
            &format!("{}/content", file_uri(&fx, "test.txt")),
            Auth::Cookie(&owner),
            None,
            vec![],
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::ETAG],
            format!("\"{:x}\"", md5::compute(CONTENT)).as_str()
        );
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], CONTENT);
    }

    #[tokio::test]
    async fn test_published_deposit_rejects_mutation() {
        let fx = Fixture::new().await;
        fx.attach("test.txt", b"hello").await;
        sqlx::query("UPDATE deposits SET status = 'published' WHERE pid = ?")
            .bind(&fx.deposit.pid)
            .execute(&*fx.state.db)
            .await
            .unwrap();
        let owner = fx.session(&fx.owner_email).await;

        let res = send(&fx, Method::GET, &files_uri(&fx), Auth::Cookie(&owner), None, vec![]).await;
        assert_eq!(res.status(), StatusCode::OK);
        let res = send(
            &fx,
            Method::DELETE,
            &file_uri(&fx, "test.txt"),
            Auth::Cookie(&owner),
            None,
            vec![],
        )
        .await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_login_sets_session_cookie() {
        let fx = Fixture::new().await;
        let form = format!("email={}&password=wrong", fx.owner_email.replace('@', "%40"));
        let res = send(
            &fx,
            Method::POST,
            "/login",
            Auth::None,
            Some("application/x-www-form-urlencoded".into()),
            form.into_bytes(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let form = format!(
            "email={}&password={}",
            fx.owner_email.replace('@', "%40"),
            PASSWORD
        );
        let res = send(
            &fx,
            Method::POST,
            "/login",
            Auth::None,
            Some("application/x-www-form-urlencoded".into()),
            form.into_bytes(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let cookie = res.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        let secret = cookie
            .strip_prefix("session=")
            .and_then(|rest| rest.split(';').next())
            .unwrap()
            .to_string();

        let res = send(&fx, Method::GET, &files_uri(&fx), Auth::Cookie(&secret), None, vec![]).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = send(&fx, Method::POST, "/logout", Auth::Cookie(&secret), None, vec![]).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        let res = send(&fx, Method::GET, &files_uri(&fx), Auth::Cookie(&secret), None, vec![]).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_deposit() {
        let fx = Fixture::new().await;
        let res = send(&fx, Method::POST, "/deposits", Auth::None, None, vec![]).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let token = fx.write_token().await;
        let res = send(&fx, Method::POST, "/deposits", Auth::Bearer(&token), None, vec![]).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let data = json_body(res).await;
        assert_eq!(data["status"], "draft");

        let pid = data["id"].as_str().unwrap();
        let created = fx.state.deposits.resolve(pid).await.unwrap();
        assert!(created.is_owner(fx.owner));
        assert!(created.files.is_empty());
    }

    #[tokio::test]
    async fn test_healthz() {
        let fx = Fixture::new().await;
        let res = send(&fx, Method::GET, "/healthz", Auth::None, None, vec![]).await;
        assert_eq!(res.status(), StatusCode::OK);
        let res = send(&fx, Method::GET, "/readyz", Auth::None, None, vec![]).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["checks"]["sqlite"]["ok"], true);
    }
}
