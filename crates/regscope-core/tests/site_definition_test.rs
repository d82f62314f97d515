use regscope_core::{ProfileTab, SiteDefinition};
use std::path::PathBuf;

fn bundled(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../site-definitions")
        .join(name)
}

#[test]
fn test_bundled_definition_matches_defaults() {
    let loaded = SiteDefinition::load(&bundled("dbd-datawarehouse.toml")).unwrap();
    let defaults = SiteDefinition::default();

    assert_eq!(loaded.search_url, defaults.search_url);
    assert_eq!(loaded.profile_marker, defaults.profile_marker);
    assert_eq!(loaded.selectors.interstitials, defaults.selectors.interstitials);
    assert_eq!(loaded.selectors.table_rows, defaults.selectors.table_rows);
    assert_eq!(
        loaded.selectors.next_disabled_classes,
        defaults.selectors.next_disabled_classes
    );
    for tab in ProfileTab::ALL {
        assert_eq!(
            loaded.selectors.tabs.for_tab(tab),
            defaults.selectors.tabs.for_tab(tab)
        );
    }
    assert_eq!(loaded.timing.hover(), defaults.timing.hover());
    assert_eq!(loaded.timing.page_turn(), defaults.timing.page_turn());
}
