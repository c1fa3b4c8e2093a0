use std::fs;

use laser_config::coords::{self, parse_blob_line};
use laser_config::{CoordsFile, Roi};
use rstest::rstest;
use tempfile::tempdir;

#[rstest]
#[case("Blob 1: X=412, Y=220", Some((1, 412, 220)))]
#[case("  Blob 6: X=10.0, Y=7  ", Some((6, 10, 7)))]
#[case("Blob: x=1, y=2", None)]
#[case("Blob 2: X=, Y=3", None)]
#[case("Blob two: X=1, Y=3", None)]
fn blob_line_grammar(#[case] line: &str, #[case] expected: Option<(u32, i64, i64)>) {
    assert_eq!(parse_blob_line(line), expected);
}

#[rstest]
fn loader_skips_hits_and_garbage() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("coords.txt");
    fs::write(
        &path,
        "ROI: (10,20,300,400)\nAveraged Points:\nBlob 1: X=10, Y=20\nBlob 2: X=oops\nBlob 3: X=300, Y=400\nX: 5 # Y: 6\n",
    )
    .unwrap();
    let file = coords::load(&path).unwrap();
    assert_eq!(
        file,
        CoordsFile {
            roi: Roi {
                x1: 10,
                y1: 20,
                x2: 300,
                y2: 400
            },
            blobs: vec![(10, 20), (300, 400)],
        }
    );
}

#[rstest]
fn missing_roi_is_an_error() {
    let err = coords::parse("Blob 1: X=1, Y=2\n").unwrap_err();
    assert!(err.to_string().contains("no ROI"));
}

#[rstest]
fn write_then_append_hits() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("coords.txt");
    let file = CoordsFile {
        roi: Roi::bounding(&[(1, 2), (3, 4)]).unwrap(),
        blobs: vec![(1, 2), (3, 4)],
    };
    coords::write(&path, &file).unwrap();
    coords::append_hit(&path, 77, 88).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.ends_with("Blob 2: X=3, Y=4\nX: 77 # Y: 88\n"));
    assert_eq!(coords::load(&path).unwrap(), file);
}
