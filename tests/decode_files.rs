//! Integration tests decoding synthetic buffers end to end.

use meshport::formats::{self, ply, Decoded};
use meshport::sniff::{sniff, FormatTag};
use meshport::util::{Error, NullSink};

/// Build a binary PLY with xyz float32 vertices in the given endianness.
fn binary_ply(values: &[[f32; 3]], little: bool) -> Vec<u8> {
    let encoding = if little { "binary_little_endian" } else { "binary_big_endian" };
    let mut bytes = format!(
        "ply\nformat {encoding} 1.0\nelement vertex {}\n\
property float x\nproperty float y\nproperty float z\nend_header\n",
        values.len()
    )
    .into_bytes();
    for vertex in values {
        for &v in vertex {
            if little {
                bytes.extend_from_slice(&v.to_le_bytes());
            } else {
                bytes.extend_from_slice(&v.to_be_bytes());
            }
        }
    }
    bytes
}

#[test]
fn test_minimal_two_vertex_little_endian_exactness() {
    let vertices = [[1.0f32, 2.5, -3.0], [0.125, 1e6, -0.5]];
    let bytes = binary_ply(&vertices, true);

    let decoded = formats::decode_bytes(&bytes, "two.ply", &NullSink).unwrap();
    let ds = decoded.as_geometry().unwrap();

    // Decoded floats match the injected bytes exactly.
    assert_eq!(ds.positions, vec![1.0, 2.5, -3.0, 0.125, 1e6, -0.5]);
    assert_eq!(ds.decoded_vertices, 2);
}

#[test]
fn test_endianness_roundtrip_both_ways() {
    let vertices = [[0.1f32, -0.2, 0.3], [4.0, 5.0, 6.0], [7.5, -8.25, 9.0]];
    for little in [true, false] {
        let bytes = binary_ply(&vertices, little);
        let ds = formats::decode_bytes(&bytes, "v.ply", &NullSink)
            .unwrap()
            .into_geometry()
            .unwrap();
        let expected: Vec<f32> = vertices.iter().flatten().copied().collect();
        assert_eq!(ds.positions, expected, "little={little}");
    }
}

#[test]
fn test_length_invariant_with_short_ascii_data() {
    // Declares 5 vertices, supplies 2: buffers keep declared size, the
    // decoded count reports the truth, no rows are fabricated.
    let bytes = b"ply\nformat ascii 1.0\nelement vertex 5\n\
property float x\nproperty float y\nproperty float z\nend_header\n\
1 1 1\n2 2 2\n";
    let ds = formats::decode_bytes(bytes, "short.ply", &NullSink)
        .unwrap()
        .into_geometry()
        .unwrap();

    assert_eq!(ds.positions.len(), 3 * ds.vertex_count);
    assert_eq!(ds.vertex_count, 5);
    assert_eq!(ds.decoded_vertices, 2);
    assert_eq!(&ds.positions[..6], &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
}

#[test]
fn test_unterminated_header_names_missing_terminator() {
    let bytes = b"ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\n";
    let err = formats::decode_bytes(bytes, "broken.ply", &NullSink).unwrap_err();
    assert!(matches!(err, Error::UnterminatedHeader { .. }));
    assert!(err.to_string().contains("missing terminator"));
}

#[test]
fn test_stl_attribute_word_red() {
    // One triangle with attribute 0xF800: top 5 bits set, pure red.
    let mut bytes = vec![0u8; 80];
    bytes.extend_from_slice(&1u32.to_le_bytes());
    for v in [0.0f32, 0.0, 1.0] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    for vertex in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        for v in vertex {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
    }
    bytes.extend_from_slice(&0xF800u16.to_le_bytes());

    assert_eq!(sniff(&bytes, None).unwrap().tag, FormatTag::StlBinary);
    let ds = formats::decode_bytes(&bytes, "red.stl", &NullSink)
        .unwrap()
        .into_geometry()
        .unwrap();

    let colors = ds.colors.as_deref().unwrap();
    assert_eq!(&colors[..3], &[255, 0, 0]);
    assert_eq!(ds.vertex_count, 3);
    assert_eq!(ds.faces.len(), 1);
}

#[test]
fn test_pfm_bottom_to_top_and_scale() {
    // 2x2 single-channel, negative scale token (little-endian).
    let mut bytes = b"Pf\n2 2\n-4.5\n".to_vec();
    for v in [1.0f32, 2.0, 3.0, 4.0] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }

    let decoded = formats::decode_bytes(&bytes, "d.pfm", &NullSink).unwrap();
    let img = decoded.as_depth().unwrap();

    assert_eq!(img.scale, 4.5);
    // File rows run bottom-to-top, so the first stored row is the image
    // bottom.
    assert_eq!(img.sample(0, 0), 3.0);
    assert_eq!(img.sample(1, 1), 2.0);
}

#[test]
fn test_pfm_zero_scale_defaults_to_one() {
    let mut bytes = b"Pf\n1 1\n0\n".to_vec();
    bytes.extend_from_slice(&9.0f32.to_le_bytes());
    let decoded = formats::decode_bytes(&bytes, "d.pfm", &NullSink).unwrap();
    assert_eq!(decoded.as_depth().unwrap().scale, 1.0);
}

#[test]
fn test_six_column_table_is_xyz_rgb_clamped() {
    let bytes = b"0.0 0.0 0.0 999 128 64\n1.0 2.0 3.0 -12 0 255\n";
    // No magic matches; the numeric-table fallback takes it.
    assert!(sniff(bytes, None).is_none());

    let ds = formats::decode_bytes(bytes, "table.dat", &NullSink)
        .unwrap()
        .into_geometry()
        .unwrap();
    assert_eq!(ds.source_format, Some(FormatTag::Xyz));
    let colors = ds.colors.as_deref().unwrap();
    assert_eq!(&colors[..3], &[255, 128, 64]);
    assert_eq!(&colors[3..6], &[0, 0, 255]);
}

#[test]
fn test_pcd_binary_and_ascii_agree() {
    let header = |kind: &str| {
        format!(
            "VERSION 0.7\nFIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nCOUNT 1 1 1\n\
WIDTH 2\nHEIGHT 1\nPOINTS 2\nDATA {kind}\n"
        )
    };

    let ascii = format!("{}1 2 3\n4 5 6\n", header("ascii"));
    let mut binary = header("binary").into_bytes();
    for v in [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0] {
        binary.extend_from_slice(&v.to_le_bytes());
    }

    let from_ascii = formats::decode_bytes(ascii.as_bytes(), "c.pcd", &NullSink)
        .unwrap()
        .into_geometry()
        .unwrap();
    let from_binary = formats::decode_bytes(&binary, "c.pcd", &NullSink)
        .unwrap()
        .into_geometry()
        .unwrap();

    assert_eq!(from_ascii.positions, from_binary.positions);
}

#[test]
fn test_npy_depth_roundtrip() {
    let mut header = String::from("{'descr': '<f4', 'fortran_order': False, 'shape': (2, 3), }");
    while (10 + header.len() + 1) % 16 != 0 {
        header.push(' ');
    }
    header.push('\n');

    let mut bytes = b"\x93NUMPY".to_vec();
    bytes.extend_from_slice(&[1, 0]);
    bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
    bytes.extend_from_slice(header.as_bytes());
    let values = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }

    let decoded = formats::decode_bytes(&bytes, "d.npy", &NullSink).unwrap();
    let img = decoded.as_depth().unwrap();
    assert_eq!((img.width, img.height), (3, 2));
    assert_eq!(img.samples, values.to_vec());
}

#[test]
fn test_save_back_preserves_geometry() {
    let bytes = b"ply\nformat ascii 1.0\nelement vertex 3\n\
property float x\nproperty float y\nproperty float z\n\
property uchar red\nproperty uchar green\nproperty uchar blue\n\
element face 1\nproperty list uchar int vertex_indices\nend_header\n\
0 0 0 255 0 0\n1 0 0 0 255 0\n0 1 0 0 0 255\n3 0 1 2\n";
    let original = formats::decode_bytes(bytes, "tri.ply", &NullSink)
        .unwrap()
        .into_geometry()
        .unwrap();

    let written = ply::encode(&original).unwrap();
    let reread = formats::decode_bytes(&written, "tri.ply", &NullSink)
        .unwrap()
        .into_geometry()
        .unwrap();

    assert_eq!(reread.positions, original.positions);
    assert_eq!(reread.colors, original.colors);
    assert_eq!(reread.faces, original.faces);
}

#[test]
fn test_batch_isolates_failures() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let paths: Vec<std::path::PathBuf> = [
        ("ok.ply", binary_ply(&[[1.0, 2.0, 3.0]], true)),
        ("bad.ply", b"ply\nformat ascii 1.0\nelement vertex 1\n".to_vec()),
        ("table.xyz", b"1 2 3\n4 5 6\n".to_vec()),
    ]
    .into_iter()
    .map(|(name, content)| {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&content).unwrap();
        path
    })
    .collect();

    let results = formats::decode_batch(&paths, &NullSink);
    assert_eq!(results.len(), 3);

    let result_for = |name: &str| {
        &results
            .iter()
            .find(|(p, _)| p.file_name().unwrap() == name)
            .unwrap()
            .1
    };

    assert!(result_for("ok.ply").is_ok());
    assert!(matches!(result_for("bad.ply"), Err(Error::UnterminatedHeader { .. })));
    // Siblings of the broken file decode untouched.
    match result_for("table.xyz").as_ref().unwrap() {
        Decoded::Geometry(ds) => assert_eq!(ds.vertex_count, 2),
        Decoded::Depth(_) => panic!("expected geometry"),
    }
}
