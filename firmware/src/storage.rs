//! NVS blob backend for the config store.

use anyhow::{Context, Result};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

use wifi_provision_core::error::Error;
use wifi_provision_core::platform::StorageBackend;

const NVS_NAMESPACE: &str = "wifi_prov";
const RECORD_KEY: &str = "record";

pub struct NvsBackend {
    nvs: EspNvs<NvsDefault>,
}

impl NvsBackend {
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self> {
        let nvs =
            EspNvs::new(partition, NVS_NAMESPACE, true).context("Failed to open NVS namespace")?;
        Ok(Self { nvs })
    }
}

impl StorageBackend for NvsBackend {
    fn load(&mut self, buf: &mut [u8]) -> wifi_provision_core::error::Result<usize> {
        match self.nvs.get_blob(RECORD_KEY, buf) {
            Ok(Some(data)) => Ok(data.len()),
            Ok(None) => Ok(0),
            Err(e) => Err(Error::Storage(e.to_string())),
        }
    }

    fn persist(&mut self, data: &[u8]) -> wifi_provision_core::error::Result<()> {
        self.nvs
            .set_blob(RECORD_KEY, data)
            .map_err(|e| Error::Storage(e.to_string()))
    }

    fn capacity(&self) -> usize {
        // NVS caps a single blob at just under 4000 bytes.
        4000
    }
}
