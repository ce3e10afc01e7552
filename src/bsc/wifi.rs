use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use embedded_svc::wifi::{AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, Wifi};
use esp_idf_hal::peripheral;
use esp_idf_svc::{
    eventloop::{EspSubscription, EspSystemEventLoop, System},
    netif::{EspNetif, EspNetifWait},
    wifi::{EspWifi, WifiEvent, WifiWait},
};
use log::*;

use crate::config::{NetworkConfig, NetworkMode};
use crate::storage::Arena;

/// Brings the radio up in the configured mode. Uploads arrive over this link,
/// so failing to start is fatal for the caller.
pub fn start(
    modem: impl peripheral::Peripheral<P = esp_idf_hal::modem::Modem> + 'static,
    sysloop: EspSystemEventLoop,
    config: &NetworkConfig,
) -> anyhow::Result<Box<EspWifi<'static>>> {
    let mut wifi = Box::new(EspWifi::new(modem, sysloop.clone(), None)?);

    let access_point = || AccessPointConfiguration {
        ssid: config.ssid.as_str().into(),
        password: config.password.as_str().into(),
        auth_method: AuthMethod::WPAWPA2Personal,
        ..Default::default()
    };

    let configuration = match config.mode {
        NetworkMode::AccessPoint => Configuration::AccessPoint(access_point()),
        NetworkMode::Station => Configuration::Client(client(&mut wifi, config)?),
        NetworkMode::Mixed => {
            let client = client(&mut wifi, config)?;
            Configuration::Mixed(
                client.clone(),
                AccessPointConfiguration {
                    ssid: "pov-cylinder".into(),
                    channel: client.channel.unwrap_or(1),
                    ..Default::default()
                },
            )
        }
    };
    wifi.set_configuration(&configuration)?;

    wifi.start()?;
    info!("Starting wifi in {:?} mode...", config.mode);

    if !WifiWait::new(&sysloop)?
        .wait_with_timeout(Duration::from_secs(20), || wifi.is_started().unwrap_or(false))
    {
        bail!("Wifi did not start");
    }

    if config.mode == NetworkMode::AccessPoint {
        let ip_info = wifi.ap_netif().get_ip_info()?;
        info!("Access point {} up at {}", config.ssid, ip_info.ip);
        return Ok(wifi);
    }

    info!("Connecting wifi...");
    wifi.connect()?;

    if !EspNetifWait::new::<EspNetif>(wifi.sta_netif(), &sysloop)?.wait_with_timeout(
        Duration::from_secs(20),
        || {
            wifi.is_connected().unwrap_or(false)
                && wifi
                    .sta_netif()
                    .get_ip_info()
                    .map(|info| info.ip != Ipv4Addr::new(0, 0, 0, 0))
                    .unwrap_or(false)
        },
    ) {
        bail!("Wifi did not connect or did not receive a DHCP lease");
    }

    let ip_info = wifi.sta_netif().get_ip_info()?;
    info!("Wifi DHCP info: {:?}", ip_info);

    ping(ip_info.subnet.gateway)?;

    Ok(wifi)
}

/// Empties the arena whenever a station joins our access point. Dropping
/// the returned subscription stops it.
pub fn clear_on_join(sysloop: &EspSystemEventLoop, arena: Arc<Arena>) -> anyhow::Result<EspSubscription<System>> {
    let subscription = sysloop.subscribe(move |event: &WifiEvent| {
        if matches!(event, WifiEvent::ApStaConnected) {
            info!("Client joined the access point, erasing stored frames");
            arena.clear_all();
        }
    })?;
    Ok(subscription)
}

fn client(wifi: &mut EspWifi<'static>, config: &NetworkConfig) -> anyhow::Result<ClientConfiguration> {
    info!("Wifi created, about to scan");
    let ours = wifi.scan()?.into_iter().find(|a| a.ssid == config.ssid.as_str());

    let channel = if let Some(ours) = ours {
        info!(
            "Found configured access point {} on channel {}",
            config.ssid, ours.channel
        );
        Some(ours.channel)
    } else {
        info!(
            "Configured access point {} not found during scanning, will go with unknown channel",
            config.ssid
        );
        None
    };

    Ok(ClientConfiguration {
        ssid: config.ssid.as_str().into(),
        password: config.password.as_str().into(),
        channel,
        ..Default::default()
    })
}

fn ping(ip: embedded_svc::ipv4::Ipv4Addr) -> anyhow::Result<()> {
    info!("About to do some pings for {:?}", ip);

    let ping_summary = esp_idf_svc::ping::EspPing::default().ping(ip, &Default::default())?;
    if ping_summary.transmitted != ping_summary.received {
        bail!("Pinging IP {} resulted in timeouts", ip);
    }

    info!("Pinging done");

    Ok(())
}
