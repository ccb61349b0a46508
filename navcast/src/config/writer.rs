//! INI serialization for `config show` and saving.

use std::path::Path;

use super::NavcastConfig;

/// Convert a `NavcastConfig` to a commented INI string.
pub(super) fn to_config_string(config: &NavcastConfig) -> String {
    let api_key = config.routing.api_key.as_deref().unwrap_or("");
    let route_file = config
        .routing
        .route_file
        .as_ref()
        .map(|p| path_to_string(p))
        .unwrap_or_default();

    format!(
        r#"[navigation]
; A route point counts as reached when the fix is closer than this (meters).
; Leaving twice this distance from the target triggers a replan.
target_change_range = {target_change_range}
; Minimum seconds between two replan requests.
replan_cooldown_secs = {replan_cooldown_secs}
; How often the latest fix is evaluated (milliseconds).
fix_interval_ms = {fix_interval_ms}
; Datum of incoming fixes: wgs84 or bd09
fix_datum = {fix_datum}

[routing]
base_url = {base_url}
; Access key for the directions and geocoding service
api_key = {api_key}
; City hint for address lookups (empty to omit)
region = {region}
; Pre-computed route in the directions response format; replaces live routing
route_file = {route_file}
retry_attempts = {retry_attempts}
retry_delay_ms = {retry_delay_ms}
timeout_secs = {timeout_secs}

[network]
; Peer that receives guidance datagrams
peer_address = {peer_address}
peer_port = {peer_port}
listen_port = {listen_port}
recv_timeout_ms = {recv_timeout_ms}
; Inbound messages buffered between two engine ticks
hand_off_capacity = {hand_off_capacity}

[logging]
directory = {log_directory}
file = {log_file}
"#,
        target_change_range = config.navigation.target_change_range_m,
        replan_cooldown_secs = config.navigation.replan_cooldown.as_secs(),
        fix_interval_ms = config.navigation.fix_interval.as_millis(),
        fix_datum = config.navigation.fix_datum,
        base_url = config.routing.base_url,
        api_key = api_key,
        region = config.routing.region,
        route_file = route_file,
        retry_attempts = config.routing.retry_attempts,
        retry_delay_ms = config.routing.retry_delay.as_millis(),
        timeout_secs = config.routing.timeout.as_secs(),
        peer_address = config.network.peer_address,
        peer_port = config.network.peer_port,
        listen_port = config.network.listen_port,
        recv_timeout_ms = config.network.recv_timeout.as_millis(),
        hand_off_capacity = config.network.hand_off_capacity,
        log_directory = path_to_string(&config.logging.directory),
        log_file = config.logging.file,
    )
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_every_section() {
        let output = to_config_string(&NavcastConfig::default());
        for section in ["[navigation]", "[routing]", "[network]", "[logging]"] {
            assert!(output.contains(section), "missing {}", section);
        }
        assert!(output.contains("fix_datum = wgs84"));
        assert!(output.contains("peer_port = 12345"));
        assert!(output.contains("api_key = \n"));
    }
}
