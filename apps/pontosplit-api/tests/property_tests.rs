//! Property-based tests for upload handling

use pontosplit_api::handlers::store_uploads;
use pontosplit_api::models::{parse_flag, Upload};
use proptest::prelude::*;
use std::collections::HashSet;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn stored_names_are_unique_and_legal(
        names in prop::collection::vec("[a-zA-Z0-9 _:*?<>|\"-]{0,20}(\\.pdf)?", 1..8)
    ) {
        let dir = tempfile::tempdir().unwrap();
        let uploads: Vec<Upload> = names
            .iter()
            .map(|n| Upload { filename: n.clone(), data: b"%PDF".to_vec() })
            .collect();

        let stored = store_uploads(dir.path(), &uploads).unwrap();
        prop_assert_eq!(stored.len(), uploads.len());

        let unique: HashSet<_> = stored.iter().collect();
        prop_assert_eq!(unique.len(), stored.len());

        for path in &stored {
            prop_assert_eq!(path.parent(), Some(dir.path()));
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            prop_assert!(!name.chars().any(|c| r#"\/:*?"<>|"#.contains(c)), "illegal char in {}", name);
        }
    }

    #[test]
    fn only_true_enables_flag(value in "[a-z]{0,6}") {
        prop_assert_eq!(parse_flag(&value), value == "true");
    }
}
