//! Shared pieces of the two-port link implementations.

use gf_network::{NetworkError, NetworkResult, PortDirection};

/// Derive the two-port directions from the signed flux (positive means port
/// 0 is the source).
pub fn two_port_directions(flux: f64) -> [PortDirection; 2] {
    if flux > 0.0 {
        [PortDirection::Source, PortDirection::Sink]
    } else if flux < 0.0 {
        [PortDirection::Sink, PortDirection::Source]
    } else {
        [PortDirection::None, PortDirection::None]
    }
}

/// Index of the source and sink ports for a signed two-port flux; `None`
/// when there is no flow.
pub fn source_sink_ports(flux: f64) -> Option<(usize, usize)> {
    if flux > 0.0 {
        Some((0, 1))
    } else if flux < 0.0 {
        Some((1, 0))
    } else {
        None
    }
}

/// Validate a non-negative, finite config value at initialization.
pub fn check_config_value(
    name: &str,
    what: &'static str,
    value: f64,
) -> NetworkResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(NetworkError::InitInvalid {
            name: name.to_string(),
            what,
            value,
        })
    }
}

/// Clamp a blockage malfunction to its 0-1 domain.
pub fn clamp_blockage(blockage: f64) -> f64 {
    blockage.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directions_follow_flux_sign() {
        assert_eq!(
            two_port_directions(1.0),
            [PortDirection::Source, PortDirection::Sink]
        );
        assert_eq!(
            two_port_directions(-1.0),
            [PortDirection::Sink, PortDirection::Source]
        );
        assert_eq!(
            two_port_directions(0.0),
            [PortDirection::None, PortDirection::None]
        );
    }

    #[test]
    fn config_value_rejects_negative_and_nan() {
        assert!(check_config_value("l", "conductance", -1.0).is_err());
        assert!(check_config_value("l", "conductance", f64::NAN).is_err());
        assert_eq!(check_config_value("l", "conductance", 2.0).unwrap(), 2.0);
    }
}
