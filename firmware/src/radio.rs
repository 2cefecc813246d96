//! esp-idf implementation of the radio capability.
//!
//! While the config portal's access point is up, connection attempts run
//! in mixed AP+STA mode so a failed attempt leaves the portal reachable.
//! The AP is only torn down through `stop_access_point`.

use std::net::Ipv4Addr;

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::ipv4::{
    ClientConfiguration as IpClientConfiguration, ClientSettings, Configuration as IpConfiguration,
    Mask, Subnet,
};
use esp_idf_svc::netif::{EspNetif, NetifConfiguration};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi,
};
use log::{info, warn};

use wifi_provision_core::error::{Error, Result};
use wifi_provision_core::platform::WifiRadio;
use wifi_provision_core::scan::{EncryptionKind, ScannedNetwork};
use wifi_provision_core::store::NetworkConfig;

pub struct EspRadio {
    wifi: EspWifi<'static>,
    ap_config: Option<AccessPointConfiguration>,
    static_ip_applied: bool,
}

impl EspRadio {
    pub fn new(
        modem: Modem,
        sys_loop: EspSystemEventLoop,
        nvs_partition: EspDefaultNvsPartition,
    ) -> anyhow::Result<Self> {
        let wifi = EspWifi::new(modem, sys_loop, Some(nvs_partition))?;
        Ok(Self {
            wifi,
            ap_config: None,
            static_ip_applied: false,
        })
    }

    fn apply_static_ip(&mut self, network: &NetworkConfig) -> Result<()> {
        let settings = ClientSettings {
            ip: network.static_ip,
            subnet: Subnet {
                gateway: network.gateway,
                mask: Mask(prefix_len(network.subnet)),
            },
            dns: some_addr(network.primary_dns),
            secondary_dns: some_addr(network.secondary_dns),
        };
        let netif_config = NetifConfiguration {
            ip_configuration: Some(IpConfiguration::Client(IpClientConfiguration::Fixed(
                settings,
            ))),
            ..NetifConfiguration::wifi_default_client()
        };
        let netif = EspNetif::new_with_conf(&netif_config).map_err(radio_err)?;
        self.wifi.swap_netif_sta(netif).map_err(radio_err)?;
        self.static_ip_applied = true;
        info!("static ip {} applied", network.static_ip);
        Ok(())
    }

    fn restore_dhcp(&mut self) -> Result<()> {
        let netif =
            EspNetif::new_with_conf(&NetifConfiguration::wifi_default_client()).map_err(radio_err)?;
        self.wifi.swap_netif_sta(netif).map_err(radio_err)?;
        self.static_ip_applied = false;
        Ok(())
    }
}

impl WifiRadio for EspRadio {
    fn begin_connect(
        &mut self,
        ssid: &str,
        password: &str,
        static_ip: Option<&NetworkConfig>,
    ) -> Result<()> {
        let _ = self.wifi.disconnect();

        match static_ip {
            Some(network) => self.apply_static_ip(network)?,
            None if self.static_ip_applied => self.restore_dhcp()?,
            None => {}
        }

        let client = ClientConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| Error::InvalidInput("ssid too long for the driver"))?,
            password: password
                .try_into()
                .map_err(|_| Error::InvalidInput("password too long for the driver"))?,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::default()
            },
            ..Default::default()
        };
        let config = match &self.ap_config {
            Some(ap) => Configuration::Mixed(client, ap.clone()),
            None => Configuration::Client(client),
        };
        self.wifi.set_configuration(&config).map_err(radio_err)?;

        if !self.wifi.is_started().map_err(radio_err)? {
            self.wifi.start().map_err(radio_err)?;
        }
        self.wifi.connect().map_err(radio_err)?;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    fn disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("wifi disconnect failed: {e}");
        }
    }

    fn scan(&mut self) -> Result<Vec<ScannedNetwork>> {
        let raw = self
            .wifi
            .scan()
            .map_err(|e| Error::ScanFailed(e.to_string()))?;
        Ok(raw
            .into_iter()
            .map(|ap| ScannedNetwork {
                hidden: ap.ssid.is_empty(),
                ssid: ap.ssid.to_string(),
                rssi: i32::from(ap.signal_strength),
                channel: ap.channel,
                encryption: map_auth(ap.auth_method),
                bssid: ap.bssid,
            })
            .collect())
    }

    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<Ipv4Addr> {
        let ap = AccessPointConfiguration {
            ssid: ssid.try_into().unwrap_or_default(),
            password: password.try_into().unwrap_or_default(),
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            channel: 6,
            max_connections: 4,
            ..Default::default()
        };
        self.ap_config = Some(ap.clone());
        self.wifi
            .set_configuration(&Configuration::AccessPoint(ap))
            .map_err(radio_err)?;
        if !self.wifi.is_started().map_err(radio_err)? {
            self.wifi.start().map_err(radio_err)?;
        }
        let ip = self.wifi.ap_netif().get_ip_info().map_err(radio_err)?.ip;
        info!("access point up at {ip}");
        Ok(ip)
    }

    fn stop_access_point(&mut self) {
        self.ap_config = None;
        // Drop back to plain station mode; an active STA link survives the
        // mode change.
        if let Ok(Configuration::Mixed(client, _)) = self.wifi.get_configuration() {
            if let Err(e) = self
                .wifi
                .set_configuration(&Configuration::Client(client))
            {
                warn!("failed to leave mixed mode: {e}");
            }
        }
    }

    fn current_ssid(&mut self) -> Option<String> {
        ap_record().map(|record| {
            let end = record
                .ssid
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(record.ssid.len());
            String::from_utf8_lossy(&record.ssid[..end]).into_owned()
        })
    }

    fn rssi(&mut self) -> Option<i32> {
        ap_record().map(|record| i32::from(record.rssi))
    }
}

/// Info about the currently associated access point, if any.
fn ap_record() -> Option<esp_idf_svc::sys::wifi_ap_record_t> {
    let mut record = esp_idf_svc::sys::wifi_ap_record_t::default();
    let err = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut record) };
    (err == esp_idf_svc::sys::ESP_OK).then_some(record)
}

fn map_auth(auth: Option<AuthMethod>) -> EncryptionKind {
    match auth {
        Some(AuthMethod::None) => EncryptionKind::Open,
        Some(AuthMethod::WEP) => EncryptionKind::Wep,
        Some(AuthMethod::WPA) => EncryptionKind::Wpa,
        Some(AuthMethod::WPA2Personal) | Some(AuthMethod::WPA2Enterprise) => EncryptionKind::Wpa2,
        Some(AuthMethod::WPAWPA2Personal) => EncryptionKind::WpaWpa2,
        Some(AuthMethod::WPA3Personal) | Some(AuthMethod::WPA2WPA3Personal) => EncryptionKind::Wpa3,
        _ => EncryptionKind::Unknown,
    }
}

fn prefix_len(subnet: Ipv4Addr) -> u8 {
    if subnet.is_unspecified() {
        24
    } else {
        u32::from(subnet).leading_ones() as u8
    }
}

fn some_addr(addr: Ipv4Addr) -> Option<Ipv4Addr> {
    (!addr.is_unspecified()).then_some(addr)
}

fn radio_err(e: esp_idf_svc::sys::EspError) -> Error {
    Error::Radio(e.to_string())
}
