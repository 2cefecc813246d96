//! Process-level platform hooks.

use wifi_provision_core::platform::SystemControl;

pub struct EspSystem;

impl SystemControl for EspSystem {
    fn restart(&mut self) {
        unsafe { esp_idf_svc::sys::esp_restart() };
    }

    fn free_heap(&self) -> usize {
        unsafe { esp_idf_svc::sys::esp_get_free_heap_size() as usize }
    }

    fn chip_id(&self) -> u32 {
        let mac = read_mac();
        u32::from_be_bytes([mac[2], mac[3], mac[4], mac[5]])
    }
}

/// Last 2 bytes of the STA MAC, used to suffix the setup AP SSID.
pub fn mac_suffix() -> u16 {
    let mac = read_mac();
    u16::from_be_bytes([mac[4], mac[5]])
}

fn read_mac() -> [u8; 6] {
    let mut mac = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_read_mac(
            mac.as_mut_ptr(),
            esp_idf_svc::sys::esp_mac_type_t_ESP_MAC_WIFI_STA,
        );
    }
    mac
}
