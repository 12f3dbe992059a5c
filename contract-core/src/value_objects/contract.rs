//! A single menu entry: resource grant and payment

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resources are granted in Hz but every utility works in MHz
pub const HZ_PER_MHZ: f64 = 1e6;

/// Offer of `resource` Hz in exchange for `payment` from Agent to Principal
///
/// Immutable once built. Negative resource (solver overshoot) is clamped to
/// zero at construction; payment may be negative (a subsidized contract).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    resource: f64,
    payment: f64,
}

impl Contract {
    /// The outside option: nothing granted, nothing paid
    pub const NULL: Contract = Contract {
        resource: 0.0,
        payment: 0.0,
    };

    pub fn new(resource_hz: f64, payment: f64) -> Self {
        Self {
            resource: resource_hz.max(0.0),
            payment,
        }
    }

    pub fn from_mhz(resource_mhz: f64, payment: f64) -> Self {
        Self::new(resource_mhz * HZ_PER_MHZ, payment)
    }

    /// Zero-payment grant, used by the baseline allocators
    pub fn grant(resource_hz: f64) -> Self {
        Self::new(resource_hz, 0.0)
    }

    #[inline]
    pub fn resource(&self) -> f64 {
        self.resource
    }

    #[inline]
    pub fn resource_mhz(&self) -> f64 {
        self.resource / HZ_PER_MHZ
    }

    #[inline]
    pub fn payment(&self) -> f64 {
        self.payment
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Contract(R={:.2} MHz, P={:.4})",
            self.resource_mhz(),
            self.payment
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_resource_clamped() {
        let contract = Contract::new(-5.0, 1.0);
        assert_eq!(contract.resource(), 0.0);
        assert_eq!(contract.payment(), 1.0);
    }

    #[test]
    fn test_mhz_conversion() {
        let contract = Contract::from_mhz(12.5, -0.25);
        assert_eq!(contract.resource(), 12_500_000.0);
        assert_eq!(contract.resource_mhz(), 12.5);
        assert_eq!(contract.payment(), -0.25);
    }

    #[test]
    fn test_display() {
        let contract = Contract::from_mhz(30.0, 2.5);
        assert_eq!(contract.to_string(), "Contract(R=30.00 MHz, P=2.5000)");
    }
}
