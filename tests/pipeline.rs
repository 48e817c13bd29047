use std::collections::HashMap;
use std::fs::File;
use std::io::Read;

use sbo_epub::client::{Authenticated, OreillyClient, DEFAULT_USER_AGENT};
use sbo_epub::config::DownloadConfig;
use sbo_epub::epub::build_epub;
use sbo_epub::error::SboError;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BOOK_ID: &str = "9781492000000";

async fn serve(server: &MockServer, at: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(template)
        .mount(server)
        .await;
}

async fn login(server: &MockServer) -> OreillyClient<Authenticated> {
    serve(
        server,
        "/profile/",
        ResponseTemplate::new(200).set_body_string(r#"{"user_type":"Active"}"#),
    )
    .await;

    let mut cookies = HashMap::new();
    cookies.insert("orm-jwt".to_string(), "token".to_string());
    let config = config(server, std::path::Path::new("."));
    OreillyClient::new(&cookies, config.base_url().unwrap(), DEFAULT_USER_AGENT)
        .unwrap()
        .check_login()
        .await
        .unwrap()
}

fn config(server: &MockServer, output: &std::path::Path) -> DownloadConfig {
    let mut config = DownloadConfig::new(BOOK_ID);
    config.site_url = server.uri();
    config.output = output.to_path_buf();
    config
}

fn chapter(server: &MockServer, title: &str, filename: &str, images: &[&str]) -> serde_json::Value {
    json!({
        "title": title,
        "filename": filename,
        "content": format!("{}/content/{}", server.uri(), filename),
        "asset_base_url": format!("{}/assets/", server.uri()),
        "images": images,
        "stylesheets": [{"url": "css/book.css"}],
        "site_styles": null,
        "depth": "1",
    })
}

async fn mount_book(server: &MockServer) {
    serve(
        server,
        &format!("/api/v1/book/{}/", BOOK_ID),
        ResponseTemplate::new(200).set_body_json(json!({
            "title": "Test Book, 2nd Edition",
            "description": "A <b>book</b> about tests",
            "isbn": BOOK_ID,
            "issued": "2024-01-02",
            "cover": format!("{}/covers/200w/cover.jpg", server.uri()),
            "authors": [{"name": "Ann Author"}],
            "publishers": [{"name": "Test Press"}],
            "subjects": [{"name": "Testing"}],
            "rights": null,
        })),
    )
    .await;

    Mock::given(method("GET"))
        .and(path(format!("/api/v1/book/{}/chapter/", BOOK_ID)))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "next": null,
            "results": [
                chapter(server, "Chapter 1", "ch01.html", &["images/fig1.png"]),
                chapter(server, "Chapter 2", "ch02.html", &[]),
            ],
        })))
        .mount(server)
        .await;

    serve(
        server,
        "/content/ch01.html",
        ResponseTemplate::new(200).set_body_string(concat!(
            "<html><head><style>p{color:red}</style></head><body>",
            r#"<div id="sbo-rt-content"><p>Intro &amp; more</p>"#,
            r#"<img src="images/fig1.png"><a href="ch02.html#top">next</a></div>"#,
            "</body></html>"
        )),
    )
    .await;
    serve(
        server,
        "/content/ch02.html",
        ResponseTemplate::new(200).set_body_string(
            r#"<html><body><div id="sbo-rt-content"><p id="top">Two<br></p></div></body></html>"#,
        ),
    )
    .await;
    serve(server, "/assets/images/fig1.png", ResponseTemplate::new(200).set_body_bytes(vec![0x89u8, b'P', b'N', b'G'])).await;
    serve(server, "/assets/css/book.css", ResponseTemplate::new(200).set_body_string("p{margin:0}")).await;
    serve(server, "/covers/600w/cover.jpg", ResponseTemplate::new(200).set_body_bytes(vec![0xffu8, 0xd8, 0xff])).await;
}

fn read_entry(archive: &mut zip::ZipArchive<File>, name: &str) -> String {
    let mut content = String::new();
    archive
        .by_name(name)
        .unwrap_or_else(|_| panic!("missing {}", name))
        .read_to_string(&mut content)
        .unwrap();
    content
}

#[tokio::test]
async fn downloads_book_into_epub() {
    let server = MockServer::start().await;
    let client = login(&server).await;
    mount_book(&server).await;
    let dir = tempfile::tempdir().unwrap();

    let epub = build_epub(&client, &config(&server, dir.path())).await.unwrap();

    let root = dir.path().join(format!("Test Book ({})", BOOK_ID));
    assert_eq!(epub, root.join(format!("Test Book ({}).epub", BOOK_ID)));
    assert!(root.join("OEBPS/Images/fig1.png").exists());
    assert!(root.join("OEBPS/Images/cover.jpg").exists());
    assert!(!dir.path().join(format!("Test Book ({}).zip", BOOK_ID)).exists());

    let mut archive = zip::ZipArchive::new(File::open(&epub).unwrap()).unwrap();
    assert_eq!(archive.by_index(0).unwrap().name(), "mimetype");
    assert_eq!(read_entry(&mut archive, "mimetype"), "application/epub+zip");
    for name in [
        "META-INF/container.xml",
        "OEBPS/cover.xhtml",
        "OEBPS/ch01.xhtml",
        "OEBPS/ch02.xhtml",
        "OEBPS/Images/fig1.png",
        "OEBPS/Images/cover.jpg",
        "OEBPS/Styles/Style00.css",
    ] {
        assert!(archive.by_name(name).is_ok(), "missing {}", name);
    }

    let ch01 = read_entry(&mut archive, "OEBPS/ch01.xhtml");
    assert!(ch01.contains(r#"<link href="Styles/Style00.css" rel="stylesheet" type="text/css" />"#));
    assert!(ch01.contains("<style>p{color:red}</style>"));
    assert!(ch01.contains(r#"<img src="Images/fig1.png"/>"#));
    assert!(ch01.contains(r#"<a href="ch02.xhtml#top">next</a>"#));
    assert!(ch01.contains("Intro &amp; more"));
    let ch02 = read_entry(&mut archive, "OEBPS/ch02.xhtml");
    assert!(ch02.contains("Two<br/>"));

    let opf = read_entry(&mut archive, "OEBPS/content.opf");
    assert!(opf.contains("<dc:title>Test Book, 2nd Edition</dc:title>"));
    assert!(opf.contains("<dc:description>A &lt;b&gt;book&lt;/b&gt; about tests</dc:description>"));
    assert!(opf.contains("<dc:subject>Testing</dc:subject>"));
    assert!(!opf.contains("<dc:rights>"));
    assert!(opf.contains(r#"<item id="cover-image" href="Images/cover.jpg" media-type="image/jpeg" />"#));
    assert!(opf.contains(r#"<item id="style00" href="Styles/Style00.css" media-type="text/css" />"#));
    let spine: Vec<&str> = opf
        .lines()
        .filter(|line| line.starts_with("<itemref"))
        .collect();
    assert_eq!(
        spine,
        vec![
            r#"<itemref idref="cover"/>"#,
            r#"<itemref idref="ch0"/>"#,
            r#"<itemref idref="ch1"/>"#,
        ]
    );

    let ncx = read_entry(&mut archive, "OEBPS/toc.ncx");
    assert!(ncx.contains(r#"<content src="ch01.xhtml"/>"#));
    assert!(ncx.contains(r#"<content src="ch02.xhtml"/>"#));
    assert!(ncx.contains("<docAuthor><text>Ann Author</text></docAuthor>"));
}

#[tokio::test]
async fn missing_book_fails_before_touching_disk() {
    let server = MockServer::start().await;
    let client = login(&server).await;
    serve(
        &server,
        &format!("/api/v1/book/{}/", BOOK_ID),
        ResponseTemplate::new(404),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();

    let err = build_epub(&client, &config(&server, dir.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, SboError::Upstream(_)));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn expired_subscription_is_an_auth_error() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/profile/",
        ResponseTemplate::new(200).set_body_string(r#"{"user_type":"Expired"}"#),
    )
    .await;

    let err = OreillyClient::new(
        &HashMap::new(),
        config(&server, std::path::Path::new(".")).base_url().unwrap(),
        DEFAULT_USER_AGENT,
    )
    .unwrap()
    .check_login()
    .await
    .err()
    .unwrap();

    assert!(err.is_auth());
}
