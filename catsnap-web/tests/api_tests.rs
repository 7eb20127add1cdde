//! Integration tests for the catsnap HTTP API

mod common;

use axum::http::{Method, StatusCode};
use catsnap_web::jobs::{run_job, Job};
use catsnap_web::storage::filename_for;
use common::{get, json_request, multipart_request, Part, TestApp, GIF};
use serde_json::json;

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new().await;

    let (status, body) = app.send_json(get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "catsnap");
}

#[tokio::test]
async fn test_add_image_stores_blob_and_delays_jobs() {
    let mut app = TestApp::new().await;

    let request = multipart_request(
        "/add.json",
        &[
            Part::file("file", "cat.gif", GIF),
            Part::text("tags", "cat funny"),
            Part::text("title", "Loaf"),
        ],
    );
    let (status, body) = app.send_json(request).await;

    assert_eq!(status, StatusCode::OK);
    let filename = filename_for(GIF);
    assert_eq!(body["filename"], filename.as_str());
    assert_eq!(body["source_url"], format!("/public/{}", filename));
    assert_eq!(body["tags"], json!(["cat", "funny"]));
    assert!(app.state.images_dir.join(&filename).exists());

    let image_id = body["image_id"].as_i64().unwrap();
    assert_eq!(
        app.released_jobs(),
        vec![
            Job::ProcessImage {
                image_id,
                filename: filename.clone(),
            },
            Job::IndexTags {
                filename,
                tags: vec!["cat".to_string(), "funny".to_string()],
            },
        ]
    );
}

#[tokio::test]
async fn test_add_html_renders_page() {
    let app = TestApp::new().await;

    let request = multipart_request("/add", &[Part::file("file", "cat.gif", GIF)]);
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Image added"));
    assert!(html.contains(r#"href="/image/1""#));
}

#[tokio::test]
async fn test_add_requires_file_or_url() {
    let mut app = TestApp::new().await;

    let request = multipart_request("/add.json", &[Part::text("tags", "cat")]);
    let (status, body) = app.send_json(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("file or url"));
    assert!(app.released_jobs().is_empty());
}

#[tokio::test]
async fn test_add_with_unknown_album_rolls_back() {
    let mut app = TestApp::new().await;

    let request = multipart_request(
        "/add.json",
        &[
            Part::file("file", "cat.gif", GIF),
            Part::text("tags", "cat"),
            Part::text("album_id", "42"),
        ],
    );
    let (status, _) = app.send_json(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.released_jobs().is_empty());

    let (status, _) = app.send_json(get("/image/1.json")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_find_requires_tags() {
    let app = TestApp::new().await;

    let (status, body) = app.send_json(get("/find.json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No tags given");

    let (status, body) = app.send(get("/find?tags=")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8(body).unwrap().contains("No tags given"));
}

#[tokio::test]
async fn test_find_returns_images_with_any_tag() {
    let app = TestApp::new().await;
    let first = app.add_image(GIF, "cat funny").await;
    let second = app.add_image(b"not really a png", "dog").await;
    app.add_image(b"unrelated bytes", "bird").await;

    let (status, body) = app.send_json(get("/find.json?tags=cat%20dog")).await;

    assert_eq!(status, StatusCode::OK);
    let found = body.as_array().unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0]["url"], format!("/image/{}", first));
    assert_eq!(found[0]["source_url"], format!("/public/{}", filename_for(GIF)));
    assert_eq!(found[0]["tags"], json!(["cat", "funny"]));
    assert_eq!(found[1]["url"], format!("/image/{}", second));

    let (status, body) = app.send(get("/find?tags=cat")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("cat funny"));
}

#[tokio::test]
async fn test_show_image_in_both_formats() {
    let app = TestApp::new().await;
    let image_id = app.add_image(GIF, "cat").await;

    let (status, body) = app.send_json(get(&format!("/image/{}.json", image_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["image_id"], image_id);
    assert_eq!(body["tags"], json!(["cat"]));
    assert!(body["album"].is_null());

    let (status, body) = app.send(get(&format!("/image/{}", image_id))).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains(&format!("/public/{}", filename_for(GIF))));

    let (status, body) = app.send_json(get("/image/999.json")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = app.send(get("/image/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_edit_image_metadata() {
    let app = TestApp::new().await;
    let image_id = app.add_image(GIF, "cat").await;

    let (status, album) = app
        .send_json(json_request(Method::POST, "/new_album", json!({ "name": "Loaves" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let uri = format!("/image/{}", image_id);
    let (status, body) = app
        .send_json(json_request(
            Method::PATCH,
            &uri,
            json!({ "title": "Bread", "album_id": album["album_id"] }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Bread");
    assert_eq!(body["album"]["name"], "Loaves");

    // Only the given fields change
    let (status, body) = app
        .send_json(json_request(Method::PATCH, &uri, json!({ "description": "crusty" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Bread");
    assert_eq!(body["description"], "crusty");

    let (status, _) = app
        .send_json(json_request(Method::PATCH, &uri, json!({ "album_id": 777 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send_json(json_request(Method::PATCH, "/image/999", json!({ "title": "x" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tag_and_untag_image() {
    let mut app = TestApp::new().await;
    let image_id = app.add_image(GIF, "cat").await;
    app.released_jobs();
    let uri = format!("/image/{}/tag", image_id);
    let filename = filename_for(GIF);

    let (status, body) = app
        .send_json(json_request(Method::POST, &uri, json!({ "tag": "sleepy" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"], json!(["cat", "sleepy"]));
    assert_eq!(
        app.released_jobs(),
        vec![Job::IndexTags {
            filename: filename.clone(),
            tags: vec!["sleepy".to_string()],
        }]
    );

    // Already tagged: nothing new to index
    let (status, _) = app
        .send_json(json_request(Method::POST, &uri, json!({ "tag": "sleepy" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.released_jobs().is_empty());

    let (status, body) = app
        .send_json(json_request(Method::DELETE, &uri, json!({ "tag": "cat" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"], json!(["sleepy"]));
    assert_eq!(
        app.released_jobs(),
        vec![Job::UnindexTag {
            filename,
            tag: "cat".to_string(),
        }]
    );

    let (status, _) = app
        .send_json(json_request(Method::DELETE, &uri, json!({ "tag": "cat" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.released_jobs().is_empty());

    let (status, _) = app
        .send_json(json_request(Method::POST, &uri, json!({ "tag": "two words" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tag_document_filled_by_jobs() {
    let mut app = TestApp::new().await;
    app.add_image(GIF, "cat").await;

    let (status, body) = app.send_json(get("/tag/cat")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filenames"], json!([]));

    let ctx = app.worker_context();
    for job in app.released_jobs() {
        run_job(&ctx, &job).await.unwrap();
    }

    let (_, body) = app.send_json(get("/tag/cat")).await;
    assert_eq!(body["tag"], "cat");
    assert_eq!(body["filenames"], json!([filename_for(GIF)]));

    let (_, body) = app.send_json(get("/image/1.json")).await;
    assert_eq!(body["content_type"], "image/gif");
    assert_eq!(body["byte_size"], GIF.len());

    let (_, body) = app.send_json(get("/tags")).await;
    assert_eq!(body, json!(["cat"]));
}

#[tokio::test]
async fn test_albums() {
    let app = TestApp::new().await;

    let (status, created) = app
        .send_json(json_request(Method::POST, "/new_album", json!({ "name": "Cats" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Cats");

    let (status, _) = app
        .send_json(json_request(Method::POST, "/new_album", json!({ "name": "Cats" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send_json(json_request(Method::POST, "/new_album", json!({ "name": "  " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send_json(json_request(Method::POST, "/new_album", json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, albums) = app.send_json(get("/albums")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(albums.as_array().unwrap().len(), 1);

    let album_id = created["album_id"].as_i64().unwrap();
    let request = multipart_request(
        "/add.json",
        &[
            Part::file("file", "cat.gif", GIF),
            Part::text("album_id", &album_id.to_string()),
        ],
    );
    let (status, _) = app.send_json(request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send_json(get(&format!("/album/{}.json", album_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Cats");
    assert_eq!(body["images"].as_array().unwrap().len(), 1);

    let (status, body) = app.send(get(&format!("/album/{}", album_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains(&filename_for(GIF)));

    let (status, _) = app.send_json(get("/album/99.json")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_public_serves_blobs() {
    let app = TestApp::new().await;
    app.add_image(GIF, "cat").await;

    let (status, body) = app.send(get(&format!("/public/{}", filename_for(GIF)))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, GIF);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tag_requests_all_succeed() {
    let app = TestApp::new().await;
    let image_id = app.add_image(GIF, "cat").await;
    let uri = format!("/image/{}/tag", image_id);

    // Each request reads the image before writing; they must queue, not fail
    let mut requests = Vec::new();
    for n in 0..8 {
        let router = app.router();
        let request = json_request(Method::POST, &uri, json!({ "tag": format!("tag{}", n) }));
        requests.push(tokio::spawn(common::send(router, request)));
    }

    let mut statuses = Vec::new();
    for request in requests {
        statuses.push(request.await.unwrap().0);
    }
    assert!(statuses.iter().all(|s| *s == StatusCode::OK), "statuses: {:?}", statuses);

    let (_, body) = app.send_json(get(&format!("/image/{}.json", image_id))).await;
    assert_eq!(body["tags"].as_array().unwrap().len(), 9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_albums_conflict() {
    let app = TestApp::new().await;

    let mut requests = Vec::new();
    for _ in 0..6 {
        let request = json_request(Method::POST, "/new_album", json!({ "name": "Cats" }));
        requests.push(tokio::spawn(common::send(app.router(), request)));
    }

    let mut statuses = Vec::new();
    for request in requests {
        statuses.push(request.await.unwrap().0);
    }
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 1, "statuses: {:?}", statuses);
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(), 5, "statuses: {:?}", statuses);
}

#[tokio::test]
async fn test_add_by_url() {
    let mut app = TestApp::with_fetch_limit(64).await;
    let base = common::serve_files(vec![("/cat.gif", GIF.to_vec())]).await;
    let url = format!("{}/cat.gif", base);

    let request = multipart_request(
        "/add.json",
        &[Part::text("url", &url), Part::text("tags", "cat")],
    );
    let (status, body) = app.send_json(request).await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["filename"], filename_for(GIF).as_str());
    assert_eq!(app.released_jobs().len(), 2);

    let (_, image) = app.send_json(get(&format!("/image/{}.json", body["image_id"]))).await;
    assert_eq!(image["origin_url"], url.as_str());
}

#[tokio::test]
async fn test_add_by_url_rejects_oversized_image() {
    let mut app = TestApp::with_fetch_limit(64).await;
    let base = common::serve_files(vec![("/huge.gif", vec![0u8; 4096])]).await;

    let request = multipart_request(
        "/add.json",
        &[Part::text("url", &format!("{}/huge.gif", base)), Part::text("tags", "cat")],
    );
    let (status, body) = app.send_json(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("larger than 64"));
    assert!(app.released_jobs().is_empty());

    let (status, _) = app.send_json(get("/image/1.json")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
