use super::db::{seed_admin, seed_session_cookie, TestDb};
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use myvet::settings::{Images, Settings};
use myvet::web::{self, AppState};
use sea_orm::DatabaseConnection;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PUBLIC_BASE_URL: &str = "https://vet.example.com";
const BOUNDARY: &str = "myvet-test-boundary";

/// The full router over a fresh database and image directory
pub struct TestApp {
    pub db: TestDb,
    pub images: TempDir,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        let db = TestDb::new().await;
        let images = TempDir::new().expect("Failed to create image dir");

        let mut settings = Settings::default();
        settings.server.public_base_url = Some(PUBLIC_BASE_URL.to_string());
        settings.images = Images {
            dir: images.path().to_path_buf(),
            url_prefix: "/images".to_string(),
        };

        let router = web::router(AppState::new(settings, db.connection().clone()));
        Self { db, images, router }
    }

    pub fn db(&self) -> &DatabaseConnection {
        self.db.connection()
    }

    /// Seed the administrator and return a logged-in cookie for it
    pub async fn admin_cookie(&self) -> String {
        let admin = seed_admin(self.db()).await;
        seed_session_cookie(self.db(), admin.id).await
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed")
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(
        &self,
        path: &str,
        cookie: Option<&str>,
        fields: &[(&str, &str)],
    ) -> Response<Body> {
        let body = serde_urlencoded::to_string(fields).unwrap();
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    /// POST a multipart form; `file` is `(file name, bytes)` for the `image` field.
    pub async fn post_multipart(
        &self,
        path: &str,
        cookie: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &[u8])>,
    ) -> Response<Body> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(header::COOKIE, cookie)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_json(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: &str,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
