mod common;

use common::MemStorage;
use pretty_assertions::assert_eq;
use wifi_provision_core::error::Error;
use wifi_provision_core::store::{ConfigStore, DeviceConfig, NetworkConfig, RECORD_LEN};

fn store_on(backend: &MemStorage) -> ConfigStore<MemStorage> {
    let mut store = ConfigStore::new(backend.clone());
    store.initialize();
    store
}

#[test]
fn first_boot_writes_back_defaults() {
    let backend = MemStorage::new();
    assert!(backend.is_empty());

    let store = store_on(&backend);
    assert!(!store.has_credentials());
    assert_eq!(store.device_config(), DeviceConfig::default());
    assert_eq!(store.network_config(), NetworkConfig::default());
    // The defaults are immediately durable.
    assert_eq!(backend.snapshot().len(), RECORD_LEN);
}

#[test]
fn credentials_survive_a_reload() {
    let backend = MemStorage::new();
    let mut store = store_on(&backend);
    store.save_credentials("HomeNet", "hunter22").unwrap();

    let reloaded = store_on(&backend);
    let (creds, found) = reloaded.load_credentials();
    assert!(found);
    assert_eq!(creds.ssid, "HomeNet");
    assert_eq!(creds.password, "hunter22");
}

#[test]
fn empty_ssid_is_rejected_without_mutation() {
    let backend = MemStorage::new();
    let mut store = store_on(&backend);
    store.save_credentials("HomeNet", "hunter22").unwrap();

    assert!(matches!(
        store.save_credentials("", "pw"),
        Err(Error::InvalidInput(_))
    ));
    let (creds, found) = store.load_credentials();
    assert!(found);
    assert_eq!(creds.ssid, "HomeNet");
}

#[test]
fn overlong_password_is_truncated() {
    let backend = MemStorage::new();
    let mut store = store_on(&backend);
    let long = "x".repeat(80);
    store.save_credentials("HomeNet", &long).unwrap();

    let (creds, _) = store_on(&backend).load_credentials();
    assert_eq!(creds.password.len(), 64);
}

#[test]
fn corruption_in_any_region_resets_to_defaults() {
    // Magic, version, checksum field, credential payload.
    for &index in &[0usize, 4, 6, 20] {
        let backend = MemStorage::new();
        let mut store = store_on(&backend);
        store.save_credentials("HomeNet", "hunter22").unwrap();

        backend.corrupt_byte(index);
        let mut store = store_on(&backend);
        assert!(
            !store.has_credentials(),
            "corrupt byte {index} should have reset the record"
        );
        // The rewritten image is valid again.
        assert!(store.integrity_check());
    }
}

#[test]
fn repair_detects_and_overwrites_a_bad_image() {
    let backend = MemStorage::new();
    let mut store = store_on(&backend);
    store.save_credentials("HomeNet", "hunter22").unwrap();
    assert!(!store.is_corrupted());
    assert_eq!(store.repair_if_needed().unwrap(), false);

    backend.corrupt_byte(15);
    assert!(store.is_corrupted());
    assert_eq!(store.repair_if_needed().unwrap(), true);
    assert!(store.integrity_check());
    assert!(!store.has_credentials());
}

#[test]
fn device_config_round_trips_and_validates_hostname() {
    let backend = MemStorage::new();
    let mut store = store_on(&backend);

    let config = DeviceConfig {
        hostname: "bench-node".to_string(),
        auto_reconnect: false,
        max_reconnect_attempts: 7,
        connect_timeout_secs: 12,
    };
    store.save_device_config(config.clone()).unwrap();
    assert_eq!(store_on(&backend).device_config(), config);

    let bad = DeviceConfig {
        hostname: String::new(),
        ..config
    };
    assert!(store.save_device_config(bad).is_err());
}

#[test]
fn network_config_round_trips() {
    let backend = MemStorage::new();
    let mut store = store_on(&backend);

    let config = NetworkConfig {
        use_static_ip: true,
        static_ip: "192.168.1.50".parse().unwrap(),
        gateway: "192.168.1.1".parse().unwrap(),
        subnet: "255.255.255.0".parse().unwrap(),
        primary_dns: "1.1.1.1".parse().unwrap(),
        secondary_dns: "8.8.8.8".parse().unwrap(),
    };
    store.save_network_config(config.clone()).unwrap();
    assert_eq!(store_on(&backend).network_config(), config);
}

#[test]
fn clear_all_wipes_every_section() {
    let backend = MemStorage::new();
    let mut store = store_on(&backend);
    store.save_credentials("HomeNet", "hunter22").unwrap();
    store
        .save_device_config(DeviceConfig {
            hostname: "bench-node".to_string(),
            ..DeviceConfig::default()
        })
        .unwrap();

    store.clear_all().unwrap();

    let store = store_on(&backend);
    assert!(!store.has_credentials());
    assert_eq!(store.device_config(), DeviceConfig::default());
    assert_eq!(store.network_config(), NetworkConfig::default());
}
