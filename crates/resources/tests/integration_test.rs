//! Integration tests for asset loading.

use std::path::PathBuf;

use toy2d_resources::{ResourceError, RgbaImage, read_spirv_file};

fn scratch_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("toy2d-resources-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("Failed to create scratch directory");
    dir.join(name)
}

#[test]
fn test_png_round_trips_to_rgba8() {
    let path = scratch_path("checker.png");

    // 2x2 RGB image; decoding must expand it to RGBA with opaque alpha
    let rgb = image::RgbImage::from_raw(2, 2, vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255])
        .expect("valid dimensions");
    rgb.save(&path).expect("Failed to write test PNG");

    let decoded = RgbaImage::load(&path).expect("Failed to decode test PNG");
    assert_eq!(decoded.width(), 2);
    assert_eq!(decoded.height(), 2);
    assert_eq!(
        decoded.pixels(),
        &[
            255, 0, 0, 255, 0, 255, 0, 255, //
            0, 0, 255, 255, 255, 255, 255, 255,
        ]
    );
}

#[test]
fn test_corrupt_image_reports_decode_error() {
    let path = scratch_path("corrupt.png");
    std::fs::write(&path, b"definitely not a png").expect("Failed to write file");

    let err = RgbaImage::load(&path).unwrap_err();
    assert!(matches!(err, ResourceError::Image { .. }));
}

#[test]
fn test_spirv_word_alignment() {
    let good = scratch_path("good.spv");
    std::fs::write(&good, [0x03, 0x02, 0x23, 0x07, 0, 0, 0, 0]).expect("Failed to write file");
    assert_eq!(read_spirv_file(&good).unwrap().len(), 8);

    let bad = scratch_path("bad.spv");
    std::fs::write(&bad, [0x03, 0x02, 0x23]).expect("Failed to write file");
    assert!(matches!(
        read_spirv_file(&bad),
        Err(ResourceError::MisalignedSpirv { len: 3, .. })
    ));

    assert!(matches!(
        read_spirv_file(&scratch_path("missing.spv")),
        Err(ResourceError::FileNotFound(_))
    ));
}
