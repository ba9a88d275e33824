//! Unit tests for the extension filter

use crate::filter::{parse_extension_list, FileFilter, FilterOptions};
use proptest::prelude::*;
use std::path::PathBuf;
use test_case::test_case;

fn filter(include: &str, exclude: &str) -> FileFilter {
    FileFilter::new(FilterOptions::from_comma_lists(include, exclude))
}

mod precedence_tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_empty_lists_accept_everything() {
        let filter = filter("", "");
        assert!(filter.is_eligible(&PathBuf::from("a.txt")));
        assert!(filter.is_eligible(&PathBuf::from("no_extension")));
        assert!(filter.is_eligible(&PathBuf::from("dir/.hidden")));
    }

    #[test_case("a.txt", true ; "included extension")]
    #[test_case("a.png", false ; "neither list")]
    #[test_case("a.jpg", false ; "excluded but include set is authoritative")]
    #[test_case("docs/nested/b.txt", true ; "nested included")]
    fn test_include_set_is_authoritative(path: &str, eligible: bool) {
        let filter = filter("txt", "jpg");
        assert_eq!(filter.is_eligible(&PathBuf::from(path)), eligible);
    }

    #[test]
    fn test_include_wins_over_exclude_for_same_extension() {
        let filter = filter("txt", "txt");
        assert!(filter.is_eligible(&PathBuf::from("a.txt")));
    }

    #[test_case("a.tmp", false)]
    #[test_case("a.txt", true)]
    #[test_case("Makefile", true)]
    fn test_exclude_only(path: &str, eligible: bool) {
        let filter = filter("", "tmp");
        assert_eq!(filter.is_eligible(&PathBuf::from(path)), eligible);
    }
}

mod extension_tests {
    use super::*;

    #[test]
    fn test_match_is_case_sensitive() {
        let filter = filter("txt", "");
        assert!(filter.is_eligible(&PathBuf::from("a.txt")));
        assert!(!filter.is_eligible(&PathBuf::from("a.TXT")));
    }

    #[test]
    fn test_only_final_extension_counts() {
        let filter = filter("gz", "");
        assert!(filter.is_eligible(&PathBuf::from("backup.tar.gz")));
        assert!(!filter.is_eligible(&PathBuf::from("backup.gz.tar")));
    }

    #[test]
    fn test_leading_dot_is_stripped() {
        let from_list = filter(".txt", "");
        assert!(from_list.is_eligible(&PathBuf::from("a.txt")));

        let direct = FileFilter::new(FilterOptions {
            include_extensions: [".md".to_string()].into_iter().collect(),
            ..Default::default()
        });
        assert!(direct.is_eligible(&PathBuf::from("README.md")));
    }

    #[test]
    fn test_parse_drops_empty_items() {
        let parsed = parse_extension_list("txt,, md ,.rs,");
        let expected: Vec<&str> = vec!["md", "rs", "txt"];
        assert_eq!(parsed.iter().map(String::as_str).collect::<Vec<_>>(), expected);
        assert!(parse_extension_list("").is_empty());
    }
}

proptest! {
    #[test]
    fn prop_include_ignores_exclude(
        stem in "[a-z]{1,8}",
        ext in "[a-z]{1,4}",
        excluded in "[a-z]{1,4}",
    ) {
        let path = PathBuf::from(format!("{}.{}", stem, ext));
        let with_exclude = filter(&ext, &excluded);
        let without_exclude = filter(&ext, "");
        prop_assert!(with_exclude.is_eligible(&path));
        prop_assert_eq!(with_exclude.is_eligible(&path), without_exclude.is_eligible(&path));
    }

    #[test]
    fn prop_eligibility_depends_only_on_extension(
        dir_a in "[a-z]{1,6}",
        dir_b in "[a-z]{1,6}",
        ext in "(txt|jpg|png)",
    ) {
        let filter = filter("txt,png", "");
        let a = PathBuf::from(format!("{}/file.{}", dir_a, ext));
        let b = PathBuf::from(format!("{}/other.{}", dir_b, ext));
        prop_assert_eq!(filter.is_eligible(&a), filter.is_eligible(&b));
    }
}
