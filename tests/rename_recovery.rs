//! Case renames, collisions, and finishing a rename that stopped part-way.

use std::fs;

use bms_project::{
    CaseImage, ErrorKind, FindingCode, PixelSpacing, Project, ProjectError, RenameStep,
};
use ndarray::Array2;
use tempfile::TempDir;

fn project_with_masks(dir: &TempDir, cases: &[&str]) -> Project {
    let project = Project::create(dir.path()).unwrap();
    let image = CaseImage::new(Array2::from_elem((2, 2), 0.0), PixelSpacing::new(1.0, 1.0));
    for case in cases {
        let element = project.add_case(case, &image).unwrap();
        element
            .set_predicted_mask("muscle", Array2::from_elem((2, 2), true))
            .unwrap();
    }
    // A second mask name where only the first case has an archive.
    project
        .element(cases[0])
        .unwrap()
        .set_predicted_mask("fat", Array2::from_elem((2, 2), false))
        .unwrap();
    project
}

fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}

#[test]
fn rename_moves_image_masks_and_manifest_entry() {
    let dir = TempDir::new().unwrap();
    let project = project_with_masks(&dir, &["5___a", "6"]);

    let mut element = project.element("5___a").unwrap();
    let before = element.image().unwrap().clone();
    element.rename("5___b").unwrap();

    // The cached image is dropped; the next read comes from the new directory.
    let replacement =
        CaseImage::new(Array2::from_elem((2, 2), 7.0), PixelSpacing::new(1.0, 1.0));
    fs::remove_file(project.image_store().archive_path("5___b")).unwrap();
    project.image_store().create("5___b", &replacement).unwrap();

    assert_eq!(element.name(), "5___b");
    assert_ne!(element.image().unwrap(), &before);
    assert_eq!(element.image().unwrap(), &replacement);
    assert_eq!(project.element_names().unwrap(), ["6", "5___b"]);
    assert!(!project.images_directory().join("5___a").exists());
    let masks = project.mask_store();
    assert!(masks.exists("5___b", "muscle"));
    assert!(masks.exists("5___b", "fat"));
    assert!(!masks.exists("5___a", "muscle"));
    assert!(!masks.exists("5___a", "fat"));
}

#[test]
fn rename_and_back_restores_membership_and_masks() {
    let dir = TempDir::new().unwrap();
    let project = project_with_masks(&dir, &["1", "2", "3"]);
    let original = sorted(project.element_names().unwrap());

    project.rename_element("2", "2___x").unwrap();
    project.rename_element("2___x", "2").unwrap();

    assert_eq!(sorted(project.element_names().unwrap()), original);
    assert!(project.mask_store().exists("2", "muscle"));
    assert!(!project.mask_store().exists("2___x", "muscle"));
    let report = project.verify().unwrap();
    assert!(report.findings.is_empty(), "{:?}", report.findings);
}

#[test]
fn rename_updates_only_groups_that_held_the_case() {
    let dir = TempDir::new().unwrap();
    let project = project_with_masks(&dir, &["1", "2"]);
    let mut document = project.manifest().load().unwrap();
    let text = document.to_toml_string().unwrap()
        + "left = [\"1\"]\nright = [\"2\"]\n";
    fs::write(project.manifest_path(), text).unwrap();

    project.rename_element("1", "1___l").unwrap();

    document = project.manifest().load().unwrap();
    let groups = document.groups().unwrap();
    assert_eq!(groups[0].1, ["2", "1___l"]);
    assert_eq!(groups[1], ("left".to_string(), vec!["1___l".to_string()]));
    assert_eq!(groups[2], ("right".to_string(), vec!["2".to_string()]));
}

#[test]
fn collisions_are_refused_before_any_step() {
    let dir = TempDir::new().unwrap();
    let project = project_with_masks(&dir, &["1", "2"]);

    let err = project.rename_element("1", "2").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Unlisted, but a stray image directory already uses the name.
    fs::create_dir(project.images_directory().join("9")).unwrap();
    let err = project.rename_element("1", "9").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Unlisted, but a stray mask archive already uses the name.
    fs::copy(
        project.mask_store().archive_path("2", "muscle"),
        project.mask_store().archive_path("8", "muscle"),
    )
    .unwrap();
    let err = project.rename_element("1", "8").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    assert!(project.images_directory().join("1").is_dir());
    assert!(project.mask_store().exists("1", "muscle"));
    assert_eq!(project.element_names().unwrap(), ["1", "2"]);
}

#[test]
fn renaming_unknown_case_is_not_found() {
    let dir = TempDir::new().unwrap();
    let project = project_with_masks(&dir, &["1"]);
    let err = project.rename_element("4", "5").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn failed_rename_leaves_element_name_unchanged() {
    let dir = TempDir::new().unwrap();
    let project = project_with_masks(&dir, &["1", "2"]);
    let mut element = project.element("1").unwrap();
    assert!(element.rename("2").is_err());
    assert_eq!(element.name(), "1");
}

#[test]
fn complete_rename_finishes_after_image_step() {
    let dir = TempDir::new().unwrap();
    let project = project_with_masks(&dir, &["1", "2"]);

    // Simulate an interruption right after the image directory moved.
    fs::rename(
        project.images_directory().join("1"),
        project.images_directory().join("1___b"),
    )
    .unwrap();
    let report = project.verify().unwrap();
    assert!(report.has(FindingCode::MissingImage));
    assert!(report.has(FindingCode::UnlistedImage));

    project.complete_rename("1", "1___b").unwrap();
    assert_eq!(project.element_names().unwrap(), ["2", "1___b"]);
    assert!(project.mask_store().exists("1___b", "muscle"));
    assert!(project.mask_store().exists("1___b", "fat"));
    let report = project.verify().unwrap();
    assert!(report.findings.is_empty(), "{:?}", report.findings);

    // Running it again changes nothing.
    project.complete_rename("1", "1___b").unwrap();
    assert_eq!(project.element_names().unwrap(), ["2", "1___b"]);
}

#[test]
fn interrupted_steps_are_reported() {
    let dir = TempDir::new().unwrap();
    let project = project_with_masks(&dir, &["1", "2"]);

    fs::rename(
        project.images_directory().join("1"),
        project.images_directory().join("7"),
    )
    .unwrap();
    // Both archives present: the mask step cannot proceed without overwriting.
    fs::copy(
        project.mask_store().archive_path("1", "muscle"),
        project.mask_store().archive_path("7", "muscle"),
    )
    .unwrap();

    let err = project.complete_rename("1", "7").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    match err {
        ProjectError::RenameIncomplete {
            from,
            to,
            completed,
            ..
        } => {
            assert_eq!((from.as_str(), to.as_str()), ("1", "7"));
            assert_eq!(completed, [RenameStep::ImageDirectory]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(project.element_names().unwrap(), ["1", "2"]);
}

#[test]
fn complete_rename_without_either_directory_is_not_found() {
    let dir = TempDir::new().unwrap();
    let project = project_with_masks(&dir, &["1"]);
    let err = project.complete_rename("3", "4").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(matches!(err, ProjectError::NotFound { .. }));
}
