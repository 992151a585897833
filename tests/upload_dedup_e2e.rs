mod common;

use common::{spawn_app, spawn_app_with};
use serde_json::Value;

fn clip_bytes(seed: u8) -> Vec<u8> {
    (0..4096u32).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

#[tokio::test]
async fn test_duplicate_content_is_rejected_under_any_name() {
    let app = spawn_app().await;
    let client = app.browser();
    app.open_session(&client).await;

    // Step 1: First upload is stored
    let first = app.upload(&client, "clip.mp4", clip_bytes(1)).await;
    assert_eq!(first.status().as_u16(), 200, "First upload failed");
    let first_body: Value = first.json().await.unwrap();
    assert_eq!(first_body["message"], "File uploaded successfully");
    let first_name = first_body["filename"].as_str().unwrap().to_string();
    assert!(first_name.starts_with("clip_"));
    assert!(first_name.ends_with(".mp4"));
    assert_eq!(
        std::fs::read(app.media_root().join(&first_name)).unwrap(),
        clip_bytes(1)
    );

    // Step 2: Same bytes under another name are a conflict
    let second = app.upload(&client, "clip2.mp4", clip_bytes(1)).await;
    assert_eq!(second.status().as_u16(), 409, "Duplicate was accepted");
    let second_body: Value = second.json().await.unwrap();
    assert!(second_body["error"].is_string());

    // Step 3: One changed byte is new content
    let mut changed = clip_bytes(1);
    changed[0] ^= 0xff;
    let third = app.upload(&client, "clip.mp4", changed).await;
    assert_eq!(third.status().as_u16(), 200, "Changed content was rejected");
    let third_body: Value = third.json().await.unwrap();
    assert_ne!(third_body["filename"].as_str().unwrap(), first_name);

    assert_eq!(app.index.len(), 2);
    assert_eq!(app.stored_files().len(), 2);
}

#[tokio::test]
async fn test_concurrent_identical_uploads_store_one_record() {
    let app = spawn_app().await;
    let client = app.browser();
    app.open_session(&client).await;

    let (a, b) = tokio::join!(
        app.upload(&client, "race.mp4", clip_bytes(7)),
        app.upload(&client, "race.mp4", clip_bytes(7)),
    );

    let mut statuses = vec![a.status().as_u16(), b.status().as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![200, 409]);
    assert_eq!(app.index.len(), 1);
}

#[tokio::test]
async fn test_oversized_upload_leaves_nothing_behind() {
    let app = spawn_app_with(&[("MAX_UPLOAD_BYTES", "1024")]).await;
    let client = app.browser();
    app.open_session(&client).await;

    let response = app.upload(&client, "big.mp4", clip_bytes(3)).await;
    assert_eq!(response.status().as_u16(), 413);

    assert!(app.stored_files().is_empty());
    assert_eq!(app.index.len(), 0);
    let staging_left = std::fs::read_dir(&app.config.staging_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(staging_left, 0);
}

#[tokio::test]
async fn test_non_mp4_upload_is_rejected() {
    let app = spawn_app().await;
    let client = app.browser();
    app.open_session(&client).await;

    let response = app.upload(&client, "movie.mkv", clip_bytes(2)).await;
    assert_eq!(response.status().as_u16(), 400);
    assert!(app.stored_files().is_empty());
    assert_eq!(app.index.len(), 0);
}

#[tokio::test]
async fn test_wrong_field_name_is_rejected() {
    let app = spawn_app().await;
    let client = app.browser();
    app.open_session(&client).await;

    let part = reqwest::multipart::Part::bytes(clip_bytes(4)).file_name("clip.mp4");
    let form = reqwest::multipart::Form::new().part("file", part);
    let response = client
        .post(app.url("/upload"))
        .header("Referer", app.same_host_referer())
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(app.index.len(), 0);
}

#[tokio::test]
async fn test_extra_part_after_the_file_is_rejected() {
    let app = spawn_app().await;
    let client = app.browser();
    app.open_session(&client).await;

    let part = reqwest::multipart::Part::bytes(clip_bytes(6)).file_name("clip.mp4");
    let form = reqwest::multipart::Form::new()
        .part("multimedia-upload", part)
        .text("comment", "second part");
    let response = client
        .post(app.url("/upload"))
        .header("Referer", app.same_host_referer())
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    assert!(app.stored_files().is_empty());
    assert_eq!(app.index.len(), 0);
    let staging_left = std::fs::read_dir(&app.config.staging_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(staging_left, 0);
}

#[tokio::test]
async fn test_upload_requires_session_and_same_host_referer() {
    let app = spawn_app().await;

    // No session cookie at all
    let anonymous = app.browser();
    let response = app.upload(&anonymous, "clip.mp4", clip_bytes(5)).await;
    assert_eq!(response.status().as_u16(), 403);

    // Valid session, foreign referer
    let client = app.browser();
    app.open_session(&client).await;
    let part = reqwest::multipart::Part::bytes(clip_bytes(5)).file_name("clip.mp4");
    let form = reqwest::multipart::Form::new().part("multimedia-upload", part);
    let response = client
        .post(app.url("/upload"))
        .header("Referer", "http://evil.example/")
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    assert!(app.stored_files().is_empty());
    assert_eq!(app.index.len(), 0);
}
