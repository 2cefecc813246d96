mod common;

use common::{hidden_net, net, ManualClock, MockRadio};
use pretty_assertions::assert_eq;
use wifi_provision_core::error::Error;
use wifi_provision_core::scan::{ScanCache, ScanConfig};

fn cache() -> ScanCache {
    ScanCache::new(ScanConfig::default())
}

fn ssids(cache: &ScanCache, radio: &mut MockRadio, clock: &ManualClock) -> Vec<String> {
    let mut cache = ScanCache::new(cache.config().clone());
    cache.start_scan(radio, clock).unwrap();
    cache
        .results(radio, clock, false)
        .iter()
        .map(|n| n.ssid.clone())
        .collect()
}

#[test]
fn pipeline_filters_sorts_and_truncates() {
    let mut radio = MockRadio::new();
    let clock = ManualClock::new();
    radio.set_scan_response(Ok(vec![
        net("weak", -98),              // quality 4, below the floor
        hidden_net(-40),               // hidden, filtered by default
        net("bad\u{1}ssid", -40),      // not printable ascii
        net("office", -70),
        net("office", -45),            // duplicate, first occurrence wins
        net("home", -52),
    ]));

    let mut cache = cache();
    let count = cache.start_scan(&mut radio, &clock).unwrap();
    assert_eq!(count, 2);

    let results = cache.results(&mut radio, &clock, false);
    let names: Vec<&str> = results.iter().map(|n| n.ssid.as_str()).collect();
    // Strongest first, dedupe kept the -70 dBm "office" entry.
    assert_eq!(names, vec!["home", "office"]);
    assert_eq!(results[1].rssi, -70);
}

#[test]
fn hidden_networks_pass_when_enabled() {
    let mut radio = MockRadio::new();
    let clock = ManualClock::new();
    radio.set_scan_response(Ok(vec![hidden_net(-40), net("home", -52)]));

    let mut cache = ScanCache::new(ScanConfig {
        show_hidden: true,
        ..ScanConfig::default()
    });
    cache.start_scan(&mut radio, &clock).unwrap();
    let results = cache.results(&mut radio, &clock, false);
    assert_eq!(results.len(), 2);
    assert!(results[0].hidden);
    assert_eq!(results[0].ssid, "");
}

#[test]
fn lexicographic_sort_when_signal_sort_is_off() {
    let mut radio = MockRadio::new();
    let clock = ManualClock::new();
    radio.set_scan_response(Ok(vec![
        net("zeta", -40),
        net("alpha", -80),
        net("mid", -60),
    ]));

    let mut cache = ScanCache::new(ScanConfig {
        sort_by_signal: false,
        min_signal_quality: 0,
        ..ScanConfig::default()
    });
    cache.start_scan(&mut radio, &clock).unwrap();
    let names: Vec<&str> = cache
        .results(&mut radio, &clock, false)
        .iter()
        .map(|n| n.ssid.as_str())
        .collect();
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);
}

#[test]
fn results_are_capped_at_max_results() {
    let mut radio = MockRadio::new();
    let clock = ManualClock::new();
    let raw: Vec<_> = (0..30).map(|i| net(&format!("net{i:02}"), -50 - i)).collect();
    radio.set_scan_response(Ok(raw));

    let mut cache = ScanCache::new(ScanConfig {
        max_results: 5,
        ..ScanConfig::default()
    });
    cache.start_scan(&mut radio, &clock).unwrap();
    assert_eq!(cache.network_count(), 5);
}

#[test]
fn cache_serves_results_until_the_timeout() {
    let mut radio = MockRadio::new();
    let clock = ManualClock::new();
    radio.set_scan_response(Ok(vec![net("home", -52)]));

    let mut cache = cache();
    cache.results(&mut radio, &clock, false);
    assert_eq!(radio.scan_count(), 1);

    // Within the window nothing rescans.
    clock.advance(29_000);
    cache.results(&mut radio, &clock, false);
    assert_eq!(radio.scan_count(), 1);
    assert_eq!(cache.cache_age(&clock), Some(29_000));

    // Past it the next read rescans.
    clock.advance(2_000);
    cache.results(&mut radio, &clock, false);
    assert_eq!(radio.scan_count(), 2);
}

#[test]
fn force_rescan_bypasses_a_fresh_cache() {
    let mut radio = MockRadio::new();
    let clock = ManualClock::new();
    radio.set_scan_response(Ok(vec![net("home", -52)]));

    let mut cache = cache();
    cache.results(&mut radio, &clock, false);
    cache.results(&mut radio, &clock, true);
    assert_eq!(radio.scan_count(), 2);
}

#[test]
fn scan_failure_keeps_stale_results_and_allows_retry() {
    let mut radio = MockRadio::new();
    let clock = ManualClock::new();
    radio.set_scan_response(Ok(vec![net("home", -52)]));

    let mut cache = cache();
    cache.start_scan(&mut radio, &clock).unwrap();

    radio.set_scan_response(Err(Error::ScanFailed("radio busy".to_string())));
    assert!(cache.start_scan(&mut radio, &clock).is_err());
    assert!(cache.last_error().is_some());
    assert!(!cache.is_scan_in_progress());
    // The previous results are still served.
    assert_eq!(cache.find_network("home").map(|n| n.rssi), Some(-52));

    radio.set_scan_response(Ok(vec![net("home", -48)]));
    cache.start_scan(&mut radio, &clock).unwrap();
    assert!(cache.last_error().is_none());
    assert_eq!(cache.find_network("home").map(|n| n.rssi), Some(-48));
}

#[test]
fn identical_input_yields_identical_output() {
    let mut radio = MockRadio::new();
    let clock = ManualClock::new();
    radio.set_scan_response(Ok(vec![
        net("office", -70),
        net("home", -52),
        net("cafe", -61),
    ]));

    let cache = cache();
    let first = ssids(&cache, &mut radio, &clock);
    let second = ssids(&cache, &mut radio, &clock);
    assert_eq!(first, second);
}

#[test]
fn clear_cache_invalidates_it() {
    let mut radio = MockRadio::new();
    let clock = ManualClock::new();
    radio.set_scan_response(Ok(vec![net("home", -52)]));

    let mut cache = cache();
    cache.start_scan(&mut radio, &clock).unwrap();
    assert!(cache.cache_valid(&clock));

    cache.clear_cache();
    assert!(!cache.cache_valid(&clock));
    assert_eq!(cache.network_count(), 0);
    assert_eq!(cache.cache_age(&clock), None);
}
