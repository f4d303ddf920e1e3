//! Creating, opening and listing projects.

use std::fs;

use bms_project::{CaseImage, ErrorKind, PixelSpacing, Project};
use ndarray::Array2;
use tempfile::TempDir;

fn small_image() -> CaseImage {
    CaseImage::new(Array2::from_elem((2, 2), 10.0), PixelSpacing::new(2.0, 1.0))
}

fn project_with_cases(dir: &TempDir, cases: &[&str]) -> Project {
    let project = Project::create(dir.path()).unwrap();
    for case in cases {
        project.add_case(case, &small_image()).unwrap();
    }
    project
}

#[test]
fn create_lays_out_directories_and_manifest() {
    let dir = TempDir::new().unwrap();
    let project = Project::create(dir.path()).unwrap();

    assert!(project.images_directory().is_dir());
    assert!(project.masks_directory().is_dir());
    assert!(project.manifest_path().is_file());
    assert!(project.element_names().unwrap().is_empty());
    assert!(project.mask_names().unwrap().is_empty());

    let err = Project::create(dir.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn open_requires_a_manifest() {
    let dir = TempDir::new().unwrap();
    let err = Project::open(dir.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    Project::create(dir.path()).unwrap();
    assert!(Project::open(dir.path()).is_ok());
}

#[test]
fn open_rejects_malformed_manifest() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("dataset.toml"), "files = 12\n").unwrap();
    let err = Project::open(dir.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataIntegrity);
}

#[test]
fn elements_follow_display_order() {
    let dir = TempDir::new().unwrap();
    let project = project_with_cases(&dir, &["5___a", "12___b", "3"]);

    assert_eq!(project.element_names().unwrap(), ["5___a", "12___b", "3"]);
    let names: Vec<String> = project
        .elements()
        .unwrap()
        .iter()
        .map(|element| element.name().to_string())
        .collect();
    assert_eq!(names, ["3", "5___a", "12___b"]);
}

#[test]
fn element_lookup_and_image_access() {
    let dir = TempDir::new().unwrap();
    let project = project_with_cases(&dir, &["7___left"]);

    let element = project.element("7___left").unwrap();
    assert_eq!(element.name_prefix(), "7");
    assert_eq!(element.pixel_spacing().unwrap(), PixelSpacing::new(2.0, 1.0));
    assert_eq!(element.image().unwrap().matrix.shape(), [2, 2]);
    assert!(element.display_params().unwrap().windowing.is_none());

    let err = project.element("8").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn listed_case_without_image_surfaces_not_found() {
    let dir = TempDir::new().unwrap();
    let project = project_with_cases(&dir, &["1"]);
    fs::remove_dir_all(project.images_directory().join("1")).unwrap();

    let element = project.element("1").unwrap();
    let err = element.image().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn add_case_refuses_duplicates() {
    let dir = TempDir::new().unwrap();
    let project = project_with_cases(&dir, &["1"]);

    let err = project.add_case("1", &small_image()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(project.element_names().unwrap(), ["1"]);

    let err = project.add_case("a/b", &small_image()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn add_case_keeps_secondary_groups() {
    let dir = TempDir::new().unwrap();
    let project = Project::create(dir.path()).unwrap();
    fs::write(
        project.manifest_path(),
        "files = []\n\n[groups]\nall = []\nreviewed = [\"legacy\"]\n",
    )
    .unwrap();

    project.add_case("1", &small_image()).unwrap();
    let groups = project.manifest().load().unwrap().groups().unwrap();
    assert_eq!(groups[0], ("all".to_string(), vec!["1".to_string()]));
    assert_eq!(groups[1], ("reviewed".to_string(), vec!["legacy".to_string()]));
}

#[test]
fn empty_mask_directory_is_still_a_mask_name() {
    let dir = TempDir::new().unwrap();
    let project = Project::create(dir.path()).unwrap();
    fs::create_dir(project.masks_directory().join("muscle")).unwrap();
    fs::write(project.masks_directory().join("README"), "notes").unwrap();

    let names: Vec<String> = project.mask_names().unwrap().into_iter().collect();
    assert_eq!(names, ["muscle"]);
}

#[test]
fn missing_masks_directory_means_no_masks() {
    let dir = TempDir::new().unwrap();
    let project = Project::create(dir.path()).unwrap();
    fs::remove_dir(project.masks_directory()).unwrap();
    assert!(project.mask_names().unwrap().is_empty());
}
