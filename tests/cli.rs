use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const EMBEDDINGS: &str = r#"{"kind":"image","key":"dog.jpg","vector":[1.0,0.0,0.0]}
{"kind":"image","key":"cat.png","vector":[0.0,1.0,0.0]}
{"kind":"image","key":"market.jpeg","vector":[0.0,0.6,0.8]}
{"kind":"text","key":"a dog playing in a park","vector":[0.9,0.1,0.0]}
{"kind":"text","key":"blurry motion","vector":[0.5,-0.5,-0.7]}
"#;

fn workspace() -> TempDir {
    let dir = tempdir().unwrap();
    let images = dir.path().join("images");
    fs::create_dir(&images).unwrap();
    for name in ["dog.jpg", "cat.png", "market.jpeg", "notes.txt"] {
        fs::write(images.join(name), b"").unwrap();
    }
    fs::write(dir.path().join("embeddings.jsonl"), EMBEDDINGS).unwrap();
    dir
}

fn clipdex(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("clipdex").unwrap();
    cmd.current_dir(dir)
        .env_remove("RUST_LOG")
        .env("CLIPDEX_INDEX_PATH", dir.join("index").join("images"))
        .env("CLIPDEX_EMBEDDINGS_PATH", dir.join("embeddings.jsonl"));
    cmd
}

fn build_index(dir: &Path) {
    clipdex(dir)
        .args(["index", "images"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 images ready for search"));
}

#[test]
fn setup_info_prints_instructions() {
    let dir = tempdir().unwrap();
    clipdex(dir.path())
        .arg("--setup-info")
        .assert()
        .success()
        .stdout(predicate::str::contains("How to Prepare clipdex Inputs"));
}

#[test]
fn index_then_list_in_path_order() {
    let dir = workspace();
    build_index(dir.path());

    let output = clipdex(dir.path()).arg("list").assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let names: Vec<_> = stdout
        .lines()
        .map(|line| Path::new(line).file_name().unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["cat.png", "dog.jpg", "market.jpeg"]);
}

#[test]
fn confident_search_prints_ranked_list() {
    let dir = workspace();
    build_index(dir.path());

    clipdex(dir.path())
        .args(["search", "a dog playing in a park", "-k", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Top 2 Results:"))
        .stdout(predicate::str::contains("1. dog.jpg"))
        .stdout(predicate::str::contains("Low Confidence").not());
}

#[test]
fn weak_search_falls_back_to_alternatives() {
    let dir = workspace();
    build_index(dir.path());

    clipdex(dir.path())
        .args(["search", "blurry motion"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Low Confidence Match"))
        .stdout(predicate::str::contains("% match"));
}

#[test]
fn rejected_search_prints_only_the_fallback() {
    let dir = workspace();
    build_index(dir.path());

    clipdex(dir.path())
        .args(["search", "blurry motion", "-k", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Query: \"blurry motion\""))
        .stdout(predicate::str::contains("top 3 possibilities"))
        .stdout(predicate::str::contains("Top 3 Results:").not())
        .stdout(predicate::str::contains("Score:").not());
}

#[test]
fn json_output_is_parseable() {
    let dir = workspace();
    build_index(dir.path());

    let output = clipdex(dir.path())
        .args(["search", "a dog playing in a park", "--json", "-k", "3"])
        .assert()
        .success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let json: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(json["accepted"], true);
    assert_eq!(json["database_record_count"], 3);
    assert_eq!(json["actual_results_count"], 3);
}

#[test]
fn stdin_queries_use_raw_vectors() {
    let dir = workspace();
    build_index(dir.path());

    clipdex(dir.path())
        .args(["search", "--stdin", "-k", "1"])
        .write_stdin("{\"label\":\"raw\",\"vector\":[0.0,2.0,0.0]}\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("1. cat.png"));
}

#[test]
fn search_without_index_fails() {
    let dir = workspace();
    clipdex(dir.path())
        .args(["search", "a dog playing in a park"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load index"));
}

#[test]
fn unknown_query_text_fails() {
    let dir = workspace();
    build_index(dir.path());
    clipdex(dir.path())
        .args(["search", "a query nobody embedded"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No embedding for text"));
}

#[test]
fn audio_skips_missing_files() {
    let dir = tempdir().unwrap();
    let clip = dir.path().join("clear_speech.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&clip, spec).unwrap();
    for i in 0..8_000 {
        let sample = if i % 2 == 0 { i16::MAX / 4 } else { -(i16::MAX / 4) };
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();

    clipdex(dir.path())
        .args(["audio", "missing.wav", "clear_speech.wav"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipping"))
        .stdout(predicate::str::contains("Quality: High"))
        .stdout(predicate::str::contains("Very short audio clip"))
        .stdout(predicate::str::contains("[SKIPPED] missing.wav: not found"));
}

fn write_tone(path: &Path) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..32_000 {
        let sample = if i % 2 == 0 { i16::MAX / 4 } else { -(i16::MAX / 4) };
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn audio_reports_corrupt_file_and_keeps_going() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("garbage.wav"), b"definitely not RIFF data").unwrap();
    write_tone(&dir.path().join("speech.wav"));

    clipdex(dir.path())
        .args(["audio", "garbage.wav", "speech.wav"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("garbage.wav").and(predicate::str::contains(
            "Skipping this file",
        )))
        .stdout(predicate::str::contains("Processing: speech.wav"))
        .stdout(predicate::str::contains("Quality: High"))
        .stdout(predicate::str::contains("Processed files:"))
        .stdout(predicate::str::contains("[ERROR] garbage.wav"))
        .stdout(predicate::str::contains("[OK] speech.wav: High quality"))
        .stderr(predicate::str::contains("1 of 2 files could not be processed"));
}

#[test]
fn caption_check_reports_undecodable_image_and_keeps_going() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
    image::GrayImage::from_pixel(4, 4, image::Luma([200u8]))
        .save(dir.path().join("bright.png"))
        .unwrap();

    clipdex(dir.path())
        .args(["caption-check", "broken.png", "bright.png"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Confidence: High"))
        .stdout(predicate::str::contains("[ERROR] broken.png"))
        .stdout(predicate::str::contains("[OK] bright.png: High confidence"))
        .stderr(predicate::str::contains("1 of 2 files could not be processed"));
}

#[test]
fn config_reflects_environment() {
    let dir = tempdir().unwrap();
    clipdex(dir.path())
        .env("CLIPDEX_TOP_K", "7")
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("top_k=7"))
        .stdout(predicate::str::contains("threshold=0.6"));
}
