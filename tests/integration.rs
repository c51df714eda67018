use assert_fs::prelude::*;
use assert_fs::TempDir;
use image::{GenericImageView, Rgb, RgbImage};
use image_convert::server::{rest, ServerConfig};
use image_convert::{convert_one, BatchConverter, ConvertOptions, OutputFormat};
use std::path::Path;
use std::process::Command;

const CLI: &str = env!("CARGO_BIN_EXE_image-convert");

fn write_image(path: &Path, width: u32, height: u32) {
    RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]))
        .save(path)
        .unwrap();
}

fn is_avif(path: &Path) -> bool {
    let bytes = std::fs::read(path).unwrap();
    bytes.len() > 12 && &bytes[4..8] == b"ftyp" && &bytes[8..12] == b"avif"
}

fn webp_options() -> ConvertOptions {
    ConvertOptions {
        format: OutputFormat::Webp,
        ..Default::default()
    }
}

#[test]
fn test_round_trip_both_formats() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.child("landscape.png");
    write_image(input.path(), 120, 60);
    let out = temp_dir.child("out");
    out.create_dir_all().unwrap();

    let options = ConvertOptions {
        max_width: Some(60),
        ..Default::default()
    };
    let result = convert_one(input.path(), out.path(), &options).unwrap();

    let webp = out.child("landscape.webp");
    let avif = out.child("landscape.avif");
    assert!(webp.path().exists());
    assert!(avif.path().exists());
    assert_eq!(result.webp(), Some(webp.path()));
    assert_eq!(result.avif(), Some(avif.path()));

    let decoded = image::open(webp.path()).unwrap();
    assert_eq!(decoded.dimensions(), (60, 30));
    assert!(is_avif(avif.path()));
}

#[test]
fn test_batch_isolates_corrupt_file() {
    let temp_dir = TempDir::new().unwrap();
    let photos = temp_dir.child("photos");
    photos.create_dir_all().unwrap();
    write_image(photos.child("one.png").path(), 16, 16);
    write_image(photos.child("two.png").path(), 24, 12);
    photos.child("three.jpg").write_binary(b"not really a jpeg").unwrap();
    photos.child("notes.txt").write_str("skip me").unwrap();
    let out = temp_dir.child("out");
    out.create_dir_all().unwrap();

    let results = BatchConverter::new(webp_options(), 2)
        .with_worker_program(CLI)
        .process_directory(photos.path(), out.path())
        .unwrap();

    assert_eq!(results.len(), 3);
    let failed: Vec<_> = results.iter().filter(|r| r.is_failed()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].input().file_name().unwrap(), "three.jpg");

    let mut converted: Vec<_> = results
        .iter()
        .filter_map(|r| r.webp())
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    converted.sort();
    assert_eq!(converted, ["one.webp", "two.webp"]);
    assert!(!out.child("three.webp").path().exists());
}

#[test]
fn test_batch_single_worker_survives_failures() {
    let temp_dir = TempDir::new().unwrap();
    for (name, valid) in [("a.png", false), ("b.png", true), ("c.png", false), ("d.png", true)] {
        let child = temp_dir.child(name);
        if valid {
            write_image(child.path(), 8, 8);
        } else {
            child.write_binary(b"junk").unwrap();
        }
    }

    let results = BatchConverter::new(webp_options(), 1)
        .with_worker_program(CLI)
        .process_directory(temp_dir.path(), temp_dir.path())
        .unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(results.iter().filter(|r| r.is_failed()).count(), 2);
}

#[test]
fn test_cli_list_presets() {
    let output = Command::new(CLI).arg("--list-presets").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["web", "thumbnail", "social", "hd", "4k", "archive", "lossless", "max-compression"] {
        assert!(stdout.contains(name), "missing preset {}", name);
    }
}

#[test]
fn test_cli_without_input_fails() {
    let output = Command::new(CLI).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_cli_single_with_stats() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.child("pic.png");
    write_image(input.path(), 32, 32);
    let out = temp_dir.child("converted");

    let output = Command::new(CLI)
        .arg(input.path())
        .args(["-o"])
        .arg(out.path())
        .args(["-f", "webp", "-s"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("pic.webp"));
    assert!(stdout.contains("Compression Statistics"));
    assert!(out.child("pic.webp").path().exists());
    assert!(!out.child("pic.avif").path().exists());
}

#[test]
fn test_cli_invalid_quality_is_validation_error() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.child("pic.png");
    write_image(input.path(), 4, 4);

    let output = Command::new(CLI)
        .arg(input.path())
        .args(["--webp-quality", "0"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Validation error"));
    assert!(stderr.contains("webp_quality must be 1-100, got 0"));
}

#[test]
fn test_cli_batch_with_failure_exits_nonzero() {
    let temp_dir = TempDir::new().unwrap();
    write_image(temp_dir.child("ok.png").path(), 10, 10);
    temp_dir.child("bad.bmp").write_binary(b"BMnope").unwrap();

    let output = Command::new(CLI)
        .arg(temp_dir.path())
        .args(["--batch", "-f", "webp", "-w", "2"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 succeeded, 1 failed"));
    assert!(stdout.contains("bad.bmp"));
    assert!(temp_dir.child("ok.webp").path().exists());
}

#[tokio::test]
async fn test_rest_batch_endpoint() {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.child("in");
    input.create_dir_all().unwrap();
    write_image(input.child("a.png").path(), 20, 20);
    write_image(input.child("b.tiff").path(), 20, 10);
    let out = temp_dir.child("out");

    let body = serde_json::json!({
        "input_path": input.path(),
        "output_dir": out.path(),
        "format": "webp",
        "workers": 2,
    });
    let request = Request::builder()
        .method("POST")
        .uri("/api/convert/batch")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let app = rest::router(ServerConfig::default().with_worker_program(CLI));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "success");
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.get("error").is_none()));
    assert!(out.child("a.webp").path().exists());
    assert!(out.child("b.webp").path().exists());
}
