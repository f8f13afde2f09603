use std::io::Write;
use std::sync::Arc;

use geo::{polygon, MultiPolygon};
use tzfence::format::DatabaseBuilder;
use tzfence::{find_timezone, Geofence, LookupError, MmapStorage, Region};

fn write_image(image: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(image).unwrap();
    file.flush().unwrap();
    file
}

fn image() -> Vec<u8> {
    let island = polygon![
        (x: -66.0, y: 18.0),
        (x: -65.0, y: 18.0),
        (x: -65.0, y: 19.0),
        (x: -66.0, y: 19.0),
    ];
    DatabaseBuilder::new(20)
        .add_region(Region::from_multi_polygon(
            "America/Puerto_Rico",
            "AST4",
            MultiPolygon::new(vec![island]),
        ))
        .build()
        .unwrap()
}

#[test]
fn test_lookup_from_mapped_file() {
    let file = write_image(&image());
    let storage = MmapStorage::open(file.path()).unwrap();

    assert_eq!(
        find_timezone(&storage, 18.5, -65.5).unwrap().as_deref(),
        Some("AST4")
    );
    assert_eq!(find_timezone(&storage, 10.0, -65.5).unwrap(), None);
}

#[test]
fn test_shared_backend_across_threads() {
    let file = write_image(&image());
    let storage = Arc::new(MmapStorage::open(file.path()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let storage = Arc::clone(&storage);
            std::thread::spawn(move || {
                let geofence = Geofence::new(storage);
                geofence
                    .find_timezone(18.1 + i as f64 * 0.2, -65.5)
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().as_deref(), Some("AST4"));
    }
}

#[test]
fn test_truncated_file_is_an_error_not_a_miss() {
    let full = image();
    let file = write_image(&full[..full.len() - 6]);
    let storage = MmapStorage::open(file.path()).unwrap();

    let err = find_timezone(&storage, 18.5, -65.5).unwrap_err();
    assert!(matches!(
        err,
        LookupError::Storage(_) | LookupError::MalformedDatabase(_)
    ));
}
