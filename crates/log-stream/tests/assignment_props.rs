//! 그룹 배정 속성 테스트

use std::fs;

use proptest::prelude::*;

use logstreamer_core::config::GroupConfig;
use logstreamer_log_stream::{Group, assign};

fn group_config(ext: &str) -> GroupConfig {
    GroupConfig {
        mask: format!(r"\.{ext}$"),
        rules: vec![r"(?P<n>\d+)".to_owned()],
        name: None,
        date_format: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn bindings_follow_masks_in_group_order(
        names in prop::collection::btree_set("[a-z]{1,6}\\.(log|txt|gz)", 1..8),
        exts in prop::collection::vec(prop::sample::select(vec!["log", "txt", "gz"]), 1..4),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::write(&path, "1\n").unwrap();
                path
            })
            .collect();

        let configs: Vec<_> = exts.iter().map(|ext| group_config(ext)).collect();
        let groups = Group::compile_all(&configs).unwrap();

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let bindings = rt.block_on(assign(&paths, &groups)).unwrap();

        let expected: usize = exts
            .iter()
            .map(|ext| names.iter().filter(|n| n.ends_with(&format!(".{ext}"))).count())
            .sum();
        prop_assert_eq!(bindings.len(), expected);

        for binding in &bindings {
            prop_assert!(binding.group().matches_file(binding.path()));
            prop_assert_eq!(binding.offset(), 2);
        }
        prop_assert!(bindings
            .windows(2)
            .all(|w| w[0].group().index() <= w[1].group().index()));
    }
}
