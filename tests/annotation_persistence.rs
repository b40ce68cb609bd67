use std::fs;
use std::path::Path;

use serde_json::{Value, json};
use tempfile::tempdir;
use vqa_annotator::{AnnotatorConfig, ErrorKind, RepurposedFields, SampleRef};

fn write_dataset(data_dir: &Path, name: &str, count: usize) {
    fs::create_dir_all(data_dir).unwrap();
    let samples: Vec<Value> = (0..count)
        .map(|idx| {
            json!({
                "question": format!("question {idx}"),
                "options": ["A. yes", "B. no"],
                "answer": "A",
                "video_url": format!("  https://videos.example/{name}/{idx}.mp4\n"),
                "meta_data": { "idx": idx }
            })
        })
        .collect();
    fs::write(
        data_dir.join(format!("{name}.json")),
        serde_json::to_vec(&samples).unwrap(),
    )
    .unwrap();
}

fn config_in(root: &Path) -> AnnotatorConfig {
    AnnotatorConfig::default()
        .with_data_dir(root.join("data"))
        .with_store_root(root.join("store"))
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

#[test]
fn annotations_survive_reopen() {
    let dir = tempdir().unwrap();
    write_dataset(&dir.path().join("data"), "d1", 5);
    let sample = SampleRef::new("d1", 2);

    {
        let service = config_in(dir.path()).open().unwrap();
        service.set_error_flag("Misalignment", &sample, true).unwrap();
        service
            .add_repurposed(&sample, RepurposedFields::new("Q?", "A/B", "B"))
            .unwrap();
        service.set_selected(&sample, true).unwrap();
        service.add_caption(&sample, "two people talk").unwrap();
    }

    let service = config_in(dir.path()).open().unwrap();
    let view = service.sample_annotations(&sample).unwrap();
    assert_eq!(view.error_categories, vec!["Misalignment"]);
    assert_eq!(view.repurposed[0].fields.answer, "B");
    assert_eq!(
        view.repurposed[0].video_url,
        "https://videos.example/d1/2.mp4"
    );
    assert!(view.is_selected);
    assert_eq!(view.captions[0].caption, "two people talk");

    let store = dir.path().join("store");
    assert_eq!(
        read_json(&store.join("error_annotation/Misalignment.json")),
        json!({ "d1": [2] })
    );
    assert_eq!(
        read_json(&store.join("repurpose_data/repurposed_indices.json")),
        json!({ "d1": [2] })
    );
    let selected = read_json(&store.join("selected_data/selected_vqa.json"));
    assert_eq!(selected[0]["options"], json!(["A. yes", "B. no"]));
    assert!(!store.join("repurpose_data/repurposed_vqa.json.tmp").exists());
}

#[test]
fn legacy_field_names_are_read_and_rewritten() {
    let dir = tempdir().unwrap();
    write_dataset(&dir.path().join("data"), "d1", 4);
    let repurpose_dir = dir.path().join("store/repurpose_data");
    fs::create_dir_all(&repurpose_dir).unwrap();
    fs::write(
        repurpose_dir.join("repurposed_vqa.json"),
        serde_json::to_vec(&json!([{
            "original_dataset": "d1",
            "original_index": 1,
            "video_url": "u",
            "new_question": "Old?",
            "new_options": "A/B",
            "new_answer": "A"
        }]))
        .unwrap(),
    )
    .unwrap();
    fs::write(
        repurpose_dir.join("repurposed_indices.json"),
        br#"{"d1": [1]}"#,
    )
    .unwrap();

    let service = config_in(dir.path()).open().unwrap();
    let sample = SampleRef::new("d1", 1);
    assert_eq!(
        service.repurposed_for(&sample).unwrap()[0].fields.question,
        "Old?"
    );

    service
        .add_repurposed(&sample, RepurposedFields::new("New?", "A/B", "A"))
        .unwrap();
    let items = read_json(&repurpose_dir.join("repurposed_vqa.json"));
    assert_eq!(items[0]["dataset"], "d1");
    assert_eq!(items[0]["sample_index"], 1);
    assert!(items[0].get("original_index").is_none());
}

#[test]
fn desynced_index_is_repaired_on_open() {
    let dir = tempdir().unwrap();
    write_dataset(&dir.path().join("data"), "d1", 6);
    let sample = SampleRef::new("d1", 4);
    {
        let service = config_in(dir.path()).open().unwrap();
        service
            .add_repurposed(&sample, RepurposedFields::new("Q?", "A/B", "A"))
            .unwrap();
    }

    let index_path = dir
        .path()
        .join("store/repurpose_data/repurposed_indices.json");
    fs::write(&index_path, br#"{"d1": [0], "d9": [7]}"#).unwrap();

    let service = config_in(dir.path()).open().unwrap();
    assert_eq!(read_json(&index_path), json!({ "d1": [4] }));
    let views = service.repurposed_samples("d1").unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].position, 4);
    assert_eq!(views[0].items.len(), 1);
}

#[test]
fn corrupt_unit_reports_storage_unavailable() {
    let dir = tempdir().unwrap();
    write_dataset(&dir.path().join("data"), "d1", 2);
    let errors_dir = dir.path().join("store/error_annotation");
    fs::create_dir_all(&errors_dir).unwrap();
    fs::write(errors_dir.join("Wrong.json"), b"{not json").unwrap();

    let service = config_in(dir.path()).open().unwrap();
    let err = service
        .set_error_flag("Wrong", &SampleRef::new("d1", 0), true)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
    assert!(err.to_string().contains("Wrong.json"));
}

#[test]
fn directory_catalog_reports_datasets_and_trims_urls() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    write_dataset(&data, "beta", 1);
    write_dataset(&data, "alpha", 3);
    write_dataset(&data, "empty", 0);
    fs::write(data.join("notes.txt"), "not a dataset").unwrap();

    let service = config_in(dir.path()).open().unwrap();
    assert_eq!(service.datasets(), vec!["alpha", "beta", "empty"]);
    assert_eq!(service.dataset_info("empty").unwrap().total_samples, 0);

    let sample = service.sample(&SampleRef::new("alpha", 2)).unwrap();
    assert_eq!(sample.0["video_url"], "https://videos.example/alpha/2.mp4");
    assert_eq!(sample.0["meta_data"], json!({ "idx": 2 }));

    let err = service.dataset_info("gamma").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SampleNotFound);
}
