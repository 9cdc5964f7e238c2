//! Catalog parsing, versioning and publication tests
//!
//! Payloads are inline copies of the documents each provider publishes,
//! trimmed to a handful of prefixes.

mod parsing_tests {
    use crate::catalog::{
        parser_for, AwsCatalogParser, CatalogParser, DatadogCatalogParser, GcpCatalogParser,
        GOOGLE_CLOUD_SERVICE, SENTINEL_RESOLVER,
    };
    use crate::error::CatalogError;
    use crate::models::CloudProvider;

    const GCP_RANGES: &str = r#"{"syncToken":"1000000000","createDate":"2022-09-01-22-03-06","prefixes":[{"ipv4Prefix": "34.80.0.0/15"},{"ipv4Prefix": "5.80.0.0/15"},{"ipv4Prefix": "150.81.0.0/15"},{"ipv4Prefix": "127.80.0.0/15"}]}"#;

    const GCP_RANGES_WITH_SENTINEL: &str = r#"{"syncToken":"1000000000","createDate":"2022-09-01-22-03-06","prefixes":[{"ipv4Prefix": "8.8.8.0/15"},{"ipv4Prefix": "5.80.0.0/15"},{"ipv4Prefix": "150.81.0.0/15"},{"ipv4Prefix": "127.80.0.0/15"}]}"#;

    const DATADOG_RANGES: &str = r#"{
        "version": 54,
        "modified": "2022-11-09-15-28-00",
        "agents": {"prefixes_ipv4": ["3.233.144.0/20"], "prefixes_ipv6": ["2600:1f18:24e6:b900::/56"]},
        "api": {"prefixes_ipv4": ["3.233.144.0/20", "44.192.28.0/22"], "prefixes_ipv6": []},
        "synthetics": {"prefixes_ipv4_by_location": {}, "prefixes_ipv4": ["8.8.8.8/32"], "prefixes_ipv6": []},
        "webhooks": {"prefixes_ipv4": ["52.44.41.0/24"], "prefixes_ipv6": []}
    }"#;

    #[test]
    fn test_gcp_parse() {
        let catalog = GcpCatalogParser.parse(GCP_RANGES.as_bytes()).unwrap();

        assert_eq!(catalog.provider(), CloudProvider::Gcp);
        assert_eq!(catalog.version(), "1000000000");
        assert_eq!(catalog.prefixes(GOOGLE_CLOUD_SERVICE).unwrap().len(), 4);
        assert!(catalog.created_at().is_some());
    }

    #[test]
    fn test_gcp_sentinel_is_removed() {
        let catalog = GcpCatalogParser
            .parse(GCP_RANGES_WITH_SENTINEL.as_bytes())
            .unwrap();

        let prefixes = catalog.prefixes(GOOGLE_CLOUD_SERVICE).unwrap();
        assert_eq!(prefixes.len(), 3);
        assert!(prefixes.iter().all(|p| !p.contains(&SENTINEL_RESOLVER)));
    }

    #[test]
    fn test_gcp_ignores_ipv6_entries() {
        let payload = r#"{"syncToken":"1","prefixes":[{"ipv6Prefix":"2600:1900::/35"},{"ipv4Prefix":"34.80.0.0/15"}]}"#;
        let catalog = GcpCatalogParser.parse(payload.as_bytes()).unwrap();
        assert_eq!(catalog.prefix_count(), 1);
    }

    #[test]
    fn test_only_sentinel_fails_with_no_ranges() {
        let payload = r#"{"syncToken":"1000000000","prefixes":[{"ipv4Prefix": "8.8.8.8/32"}]}"#;

        assert!(matches!(
            GcpCatalogParser.parse(payload.as_bytes()).unwrap_err(),
            CatalogError::NoRanges(CloudProvider::Gcp)
        ));
    }

    #[test]
    fn test_datadog_parse() {
        let catalog = DatadogCatalogParser.parse(DATADOG_RANGES.as_bytes()).unwrap();

        assert_eq!(catalog.version(), "54");
        assert_eq!(
            catalog.services().collect::<Vec<_>>(),
            vec!["agents", "api", "webhooks"]
        );
        assert_eq!(catalog.prefixes("api").unwrap().len(), 2);
        assert!(catalog.prefixes("synthetics").is_none());
    }

    #[test]
    fn test_datadog_is_newer_numeric() {
        let parser = DatadogCatalogParser;

        assert!(parser.is_newer(DATADOG_RANGES.as_bytes(), "53").unwrap());
        assert!(!parser.is_newer(DATADOG_RANGES.as_bytes(), "54").unwrap());
        assert!(!parser.is_newer(DATADOG_RANGES.as_bytes(), "100").unwrap());
    }

    #[test]
    fn test_is_newer() {
        let parser = GcpCatalogParser;

        assert!(parser.is_newer(GCP_RANGES.as_bytes(), "20").unwrap());
        assert!(!parser.is_newer(GCP_RANGES.as_bytes(), "1000000000").unwrap());
        assert!(parser.is_newer(GCP_RANGES.as_bytes(), "").unwrap());
        // numeric, not lexicographic
        assert!(parser.is_newer(GCP_RANGES.as_bytes(), "999999999").unwrap());
    }

    #[test]
    fn test_is_newer_does_not_need_prefixes() {
        let payload = r#"{"syncToken":"1000000001","prefixes":[{"ipv4Prefix": "not-a-prefix"}]}"#;
        assert!(GcpCatalogParser.is_newer(payload.as_bytes(), "1000000000").unwrap());
        assert!(matches!(
            GcpCatalogParser.parse(payload.as_bytes()).unwrap_err(),
            CatalogError::InvalidPrefix { .. }
        ));
    }

    #[test]
    fn test_empty_and_malformed_payloads() {
        for provider in CloudProvider::ALL {
            let parser = parser_for(provider);

            for payload in [&b""[..], &b"   "[..], &[][..]] {
                assert!(matches!(parser.parse(payload), Err(CatalogError::Empty(_))));
                assert!(matches!(parser.is_newer(payload, "20"), Err(CatalogError::Empty(_))));
            }

            assert!(matches!(
                parser.parse(b"<html>rate limited</html>"),
                Err(CatalogError::Malformed { .. })
            ));
        }
    }

    #[test]
    fn test_missing_version() {
        let payload = r#"{"prefixes":[{"ip_prefix":"3.5.140.0/22","service":"AMAZON"}]}"#;

        assert!(matches!(
            AwsCatalogParser.parse(payload.as_bytes()).unwrap_err(),
            CatalogError::MissingVersion(CloudProvider::Aws)
        ));
        assert!(matches!(
            AwsCatalogParser.is_newer(payload.as_bytes(), "1").unwrap_err(),
            CatalogError::MissingVersion(CloudProvider::Aws)
        ));
    }

    #[test]
    fn test_non_numeric_version() {
        let payload = r#"{"syncToken":"latest","prefixes":[{"ip_prefix":"3.5.140.0/22","service":"AMAZON"}]}"#;

        assert!(matches!(
            AwsCatalogParser.is_newer(payload.as_bytes(), "1").unwrap_err(),
            CatalogError::InvalidVersion { .. }
        ));
    }
}

mod store_tests {
    use crate::catalog::{
        CatalogFetcher, CatalogRefreshWorker, CatalogStore, RefreshConfig, RefreshOutcome,
    };
    use crate::models::CloudProvider;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn gcp_payload(version: u64, prefix: &str) -> Vec<u8> {
        format!(
            r#"{{"syncToken":"{}","createDate":"2022-09-01-22-03-06","prefixes":[{{"ipv4Prefix":"{}"}}]}}"#,
            version, prefix
        )
        .into_bytes()
    }

    #[test]
    fn test_refresh_publishes_newer_catalog() {
        let store = CatalogStore::new();
        assert!(store.snapshot(CloudProvider::Gcp).is_none());

        let outcome = store
            .refresh(CloudProvider::Gcp, &gcp_payload(10, "34.80.0.0/15"))
            .unwrap();
        assert_eq!(
            outcome,
            RefreshOutcome::Updated {
                previous: None,
                version: "10".to_string(),
            }
        );

        let outcome = store
            .refresh(CloudProvider::Gcp, &gcp_payload(10, "5.80.0.0/15"))
            .unwrap();
        assert_eq!(
            outcome,
            RefreshOutcome::Unchanged {
                version: "10".to_string(),
            }
        );

        let outcome = store
            .refresh(CloudProvider::Gcp, &gcp_payload(11, "5.80.0.0/15"))
            .unwrap();
        assert_eq!(
            outcome,
            RefreshOutcome::Updated {
                previous: Some("10".to_string()),
                version: "11".to_string(),
            }
        );
    }

    #[test]
    fn test_failed_refresh_keeps_last_known_good() {
        let store = CatalogStore::new();
        store
            .refresh(CloudProvider::Gcp, &gcp_payload(10, "34.80.0.0/15"))
            .unwrap();

        assert!(store.refresh(CloudProvider::Gcp, b"").is_err());
        assert!(store
            .refresh(CloudProvider::Gcp, &gcp_payload(11, "8.8.8.8/32"))
            .is_err());

        assert_eq!(store.version(CloudProvider::Gcp), Some("10".to_string()));
    }

    #[test]
    fn test_snapshots_survive_publication() {
        let store = CatalogStore::new();
        store
            .refresh(CloudProvider::Gcp, &gcp_payload(10, "34.80.0.0/15"))
            .unwrap();

        let held = store.snapshot(CloudProvider::Gcp).unwrap();
        store
            .refresh(CloudProvider::Gcp, &gcp_payload(11, "5.80.0.0/15"))
            .unwrap();

        assert_eq!(held.version(), "10");
        assert_eq!(held.prefix_count(), 1);
        assert_eq!(store.snapshot(CloudProvider::Gcp).unwrap().version(), "11");
    }

    struct StaticFetcher {
        payloads: Mutex<HashMap<CloudProvider, Vec<u8>>>,
    }

    #[async_trait]
    impl CatalogFetcher for StaticFetcher {
        async fn fetch(&self, provider: CloudProvider) -> Result<Vec<u8>> {
            self.payloads
                .lock()
                .unwrap()
                .get(&provider)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no payload for {}", provider))
        }
    }

    #[tokio::test]
    async fn test_refresh_worker_updates_store() {
        let mut payloads = HashMap::new();
        payloads.insert(CloudProvider::Gcp, gcp_payload(10, "34.80.0.0/15"));
        let fetcher = Arc::new(StaticFetcher {
            payloads: Mutex::new(payloads),
        });

        let store = Arc::new(CatalogStore::new());
        let worker = CatalogRefreshWorker::new(store.clone(), fetcher.clone(), RefreshConfig::default());

        // AWS and Datadog fetches fail and are skipped
        assert_eq!(worker.refresh_all().await, 1);
        assert_eq!(worker.refresh_all().await, 0);
        assert!(store.snapshot(CloudProvider::Aws).is_none());

        fetcher
            .payloads
            .lock()
            .unwrap()
            .insert(CloudProvider::Gcp, gcp_payload(11, "34.80.0.0/15"));
        assert_eq!(worker.refresh_all().await, 1);
        assert_eq!(store.version(CloudProvider::Gcp), Some("11".to_string()));
    }

    #[tokio::test]
    async fn test_refresh_worker_stops_on_shutdown() {
        let mut payloads = HashMap::new();
        payloads.insert(CloudProvider::Gcp, gcp_payload(10, "34.80.0.0/15"));
        let fetcher = Arc::new(StaticFetcher {
            payloads: Mutex::new(payloads),
        });

        let store = Arc::new(CatalogStore::new());
        let config = RefreshConfig {
            interval: Duration::from_millis(10),
            providers: vec![CloudProvider::Gcp],
        };
        let worker = CatalogRefreshWorker::new(store.clone(), fetcher, config);

        let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(store.version(CloudProvider::Gcp), Some("10".to_string()));
    }
}
