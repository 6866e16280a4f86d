fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use slicebox_protocol::{FileInfo, FileKind, FileListing, MissingSlices, SlicePart, TransferMetadata};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent comparison).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  Store: {fixture}\n  Rust:  {reserialized}"
        );
        parsed
    }

    // --- Session metadata ---

    #[test]
    fn fixture_transfer_metadata() {
        let meta = roundtrip_test::<TransferMetadata>("transfer_metadata.json");
        assert_eq!(meta.slice_count, 10);
        assert!(meta.has_checksum());
    }

    #[test]
    fn fixture_transfer_metadata_without_checksum() {
        let meta = roundtrip_test::<TransferMetadata>("transfer_metadata_fresh.json");
        assert!(!meta.has_checksum());
        assert_eq!(meta.source_modified_at.timestamp_subsec_nanos(), 123_456_789);
    }

    #[test]
    fn metadata_missing_checksum_defaults_to_empty() {
        let json = r#"{
            "Fid": "f1",
            "Filesize": 1,
            "Filename": "a.bin",
            "SliceNum": 1,
            "ModifyTime": "2024-03-01T12:30:00Z"
        }"#;
        let meta: TransferMetadata = serde_json::from_str(json).unwrap();
        assert!(!meta.has_checksum(), "missing Md5sum should default to empty");
    }

    // --- Missing slice lists ---

    #[test]
    fn fixture_missing_slices_tail() {
        let missing = roundtrip_test::<MissingSlices>("missing_slices_tail.json");
        assert_eq!(missing.indices(5).collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn fixture_missing_slices_gaps() {
        let missing = roundtrip_test::<MissingSlices>("missing_slices_gaps.json");
        assert!(!missing.has_open_tail());
        assert_eq!(missing.count(10), 3);
    }

    #[test]
    fn fixture_missing_slices_all() {
        let missing = roundtrip_test::<MissingSlices>("missing_slices_all.json");
        assert!(missing.is_all());
    }

    #[test]
    fn missing_slices_null_means_nothing() {
        let missing: MissingSlices = serde_json::from_str(r#"{"Slices":null}"#).unwrap();
        assert!(missing.is_empty());
        let missing: MissingSlices = serde_json::from_str("{}").unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn missing_slices_rejects_misplaced_sentinel() {
        assert!(serde_json::from_str::<MissingSlices>(r#"{"Slices":[-1,2]}"#).is_err());
    }

    // --- Slice payloads ---

    #[test]
    fn fixture_slice_part() {
        let part = roundtrip_test::<SlicePart>("slice_part.json");
        assert_eq!(part.index, 7);
        assert_eq!(part.payload, b"Hello, slicebox!");
    }

    // --- File information ---

    #[test]
    fn fixture_file_info() {
        let info = roundtrip_test::<FileInfo>("file_info.json");
        assert_eq!(info.kind, FileKind::Slice);
    }

    #[test]
    fn fixture_file_listing() {
        let listing = roundtrip_test::<FileListing>("file_listing.json");
        let kinds: Vec<_> = listing.files.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![FileKind::Normal, FileKind::Slice]);
    }
}
