use std::io::Read;

use gallery_fetch::{
    DirectorySink, DownloadConfig, DownloadOutcome, Error, GalleryDownloader, HttpGalleryApi,
    HttpTransport,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "share-abc";

async fn mount_gallery(server: &MockServer, locked: bool) {
    Mock::given(method("GET"))
        .and(path(format!("/api/gallery/{TOKEN}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "Smith Wedding",
            "description": "Ceremony and reception",
            "downloads_locked": locked,
            "invoice_token": locked.then_some("inv-1"),
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/api/gallery/{TOKEN}/media")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "media": [
                { "id": "m1", "filename": "first.jpg", "size_bytes": 5, "is_selected": true },
                { "id": "m2", "filename": "second.jpg", "size_bytes": 6, "is_selected": false },
                { "id": "m3", "filename": "third.jpg", "size_bytes": 5, "is_selected": true },
            ]
        })))
        .mount(server)
        .await;
}

async fn mount_body(server: &MockServer, name: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/files/{name}")))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

fn file_entry(server: &MockServer, name: &str, size: u64) -> serde_json::Value {
    json!({
        "url": format!("{}/files/{name}", server.uri()),
        "filename": name,
        "size_bytes": size,
    })
}

async fn open(
    server: &MockServer,
    dir: &TempDir,
) -> gallery_fetch::Result<(GalleryDownloader, gallery_fetch::GalleryInfo, gallery_fetch::Selection)>
{
    let http = reqwest::Client::new();
    let api = HttpGalleryApi::new(http.clone(), &format!("{}/api/", server.uri()), TOKEN);
    GalleryDownloader::open(
        api,
        HttpTransport::new(http),
        DirectorySink::new(dir.path()),
        DownloadConfig::default(),
    )
    .await
}

#[tokio::test]
async fn downloads_all_into_archive() {
    let server = MockServer::start().await;
    mount_gallery(&server, false).await;
    let names = ["first.jpg", "second.jpg", "third.jpg", "fourth.jpg", "fifth.jpg"];
    for name in names {
        mount_body(&server, name, 200, &format!("body of {name}")).await;
    }
    let files: Vec<_> = names.iter().map(|n| file_entry(&server, n, 16)).collect();
    Mock::given(method("GET"))
        .and(path(format!("/api/gallery/{TOKEN}/download-files")))
        .and(query_param("scope", "all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": files })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (downloader, info, selection) = open(&server, &dir).await.unwrap();
    assert_eq!(info.title, "Smith Wedding");
    assert_eq!(selection.selected_ids(), vec!["m1", "m3"]);

    let outcome = downloader.download_all().await.unwrap();
    let DownloadOutcome::Saved(saved) = outcome else {
        panic!("expected saved archive, got {outcome:?}");
    };
    assert_eq!(saved.path, dir.path().join("Smith Wedding_all.zip"));
    assert_eq!(saved.files, 5);
    assert!(downloader.progress().is_idle());

    let archive_file = std::fs::File::open(&saved.path).unwrap();
    let mut archive = zip::ZipArchive::new(archive_file).unwrap();
    assert_eq!(archive.len(), 5);
    for (i, name) in names.iter().enumerate() {
        let mut entry = archive.by_index(i).unwrap();
        assert_eq!(entry.name(), *name);
        assert_eq!(entry.compression(), zip::CompressionMethod::Stored);
        let mut body = String::new();
        entry.read_to_string(&mut body).unwrap();
        assert_eq!(body, format!("body of {name}"));
    }
    assert!(!dir.path().join("Smith Wedding_all.zip.part").exists());
}

#[tokio::test]
async fn selected_download_pushes_selection_first() {
    let server = MockServer::start().await;
    mount_gallery(&server, false).await;
    Mock::given(method("POST"))
        .and(path(format!("/api/gallery/{TOKEN}/select")))
        .and(body_json(json!({ "media_ids": ["m1", "m3"], "selected": true })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/api/gallery/{TOKEN}/select")))
        .and(body_json(json!({ "media_ids": ["m2"], "selected": false })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    mount_body(&server, "first.jpg", 200, "one").await;
    mount_body(&server, "third.jpg", 200, "three").await;
    let files = vec![
        file_entry(&server, "first.jpg", 3),
        file_entry(&server, "third.jpg", 5),
    ];
    Mock::given(method("GET"))
        .and(path(format!("/api/gallery/{TOKEN}/download-files")))
        .and(query_param("scope", "selected"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": files })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (downloader, _, selection) = open(&server, &dir).await.unwrap();
    let outcome = downloader.download_selected(&selection).await.unwrap();

    assert!(matches!(outcome, DownloadOutcome::Saved(ref s) if s.files == 2 && s.bytes == 8));
    assert!(dir.path().join("Smith Wedding_selected.zip").exists());
}

#[tokio::test]
async fn single_media_is_saved_unarchived() {
    let server = MockServer::start().await;
    mount_gallery(&server, false).await;
    mount_body(&server, "second.jpg", 200, "raw jpeg").await;
    Mock::given(method("GET"))
        .and(path(format!("/api/gallery/{TOKEN}/media/m2/download")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(file_entry(&server, "second.jpg", 8)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (downloader, _, _) = open(&server, &dir).await.unwrap();
    downloader.download_media("m2").await.unwrap();

    let saved = std::fs::read(dir.path().join("second.jpg")).unwrap();
    assert_eq!(saved, b"raw jpeg");
}

#[tokio::test]
async fn payment_required_locks_downloads() {
    let server = MockServer::start().await;
    mount_gallery(&server, false).await;
    Mock::given(method("GET"))
        .and(path(format!("/api/gallery/{TOKEN}/download-files")))
        .respond_with(ResponseTemplate::new(402))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (downloader, _, _) = open(&server, &dir).await.unwrap();
    assert!(!downloader.is_locked());

    assert_eq!(downloader.download_all().await.unwrap(), DownloadOutcome::Locked);
    assert!(downloader.is_locked());
    assert_eq!(downloader.download_all().await.unwrap(), DownloadOutcome::Locked);
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn locked_gallery_never_resolves() {
    let server = MockServer::start().await;
    mount_gallery(&server, true).await;
    Mock::given(method("GET"))
        .and(path(format!("/api/gallery/{TOKEN}/download-files")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (downloader, info, _) = open(&server, &dir).await.unwrap();
    assert_eq!(info.invoice_token.as_deref(), Some("inv-1"));
    assert_eq!(downloader.download_all().await.unwrap(), DownloadOutcome::Locked);
}

#[tokio::test]
async fn failing_file_saves_nothing() {
    let server = MockServer::start().await;
    mount_gallery(&server, false).await;
    mount_body(&server, "first.jpg", 200, "one").await;
    mount_body(&server, "second.jpg", 500, "boom").await;
    let files = vec![
        file_entry(&server, "first.jpg", 3),
        file_entry(&server, "second.jpg", 4),
    ];
    Mock::given(method("GET"))
        .and(path(format!("/api/gallery/{TOKEN}/download-files")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": files })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (downloader, _, _) = open(&server, &dir).await.unwrap();
    let err = downloader.download_all().await.unwrap_err();

    assert!(matches!(err, Error::Status { status: 500, .. }));
    assert!(!downloader.is_locked());
    assert!(downloader.progress().is_idle());
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn missing_and_expired_galleries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/gallery/{TOKEN}")))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/gallery/{TOKEN}/media")))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let result = open(&server, &dir).await;
    assert!(matches!(result, Err(Error::GalleryExpired)));

    let other = MockServer::start().await;
    let result = open(&other, &dir).await;
    assert!(matches!(result, Err(Error::GalleryNotFound)));
}
