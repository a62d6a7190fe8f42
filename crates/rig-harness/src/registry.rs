//! ---
//! rig_section: "05-orchestration"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Binds service registrations to implementations and ports."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rig_common::{PortConfig, MIN_SERVICE_PORT};
use rig_server::ServiceCatalog;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::HarnessError;

/// One service a caller wants started for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Unique name; also names the service's plan artifact.
    pub name: String,
    /// Key into the [`ServiceCatalog`].
    pub implementation: String,
    /// Explicit port, or `None` for a random draw.
    #[serde(default)]
    pub port: Option<u16>,
}

impl ServiceDescriptor {
    /// Descriptor with an auto-assigned port.
    pub fn new(name: impl Into<String>, implementation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            implementation: implementation.into(),
            port: None,
        }
    }

    /// Pin the service to `port`.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

/// Parses `NAME[=IMPL][:PORT]`; `IMPL` defaults to the lowercased name.
impl FromStr for ServiceDescriptor {
    type Err = HarnessError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        let (head, port) = match text.rsplit_once(':') {
            Some((head, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    HarnessError::binding(head, format!("'{port}' is not a valid port"))
                })?;
                (head, Some(port))
            }
            None => (text, None),
        };
        let (name, implementation) = match head.split_once('=') {
            Some((name, implementation)) => (name.trim(), implementation.trim().to_owned()),
            None => (head.trim(), head.trim().to_lowercase()),
        };
        if implementation.is_empty() {
            return Err(HarnessError::binding(name, "implementation is empty"));
        }
        Ok(Self {
            name: name.to_owned(),
            implementation,
            port,
        })
    }
}

impl fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.implementation)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        Ok(())
    }
}

/// A registration resolved to a concrete port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundService {
    /// Service name.
    pub name: String,
    /// Catalog key of the business handler.
    pub implementation: String,
    /// Port the server will listen on.
    pub port: u16,
    /// Whether the port came from a random draw.
    pub auto_assigned: bool,
}

/// Validate `descriptors` and assign ports.
///
/// Explicit ports are honored exactly. The rest are drawn from the configured
/// range, skipping ports already taken in this run. Nothing touches the
/// filesystem or the network.
pub fn bind_services<R: Rng + ?Sized>(
    descriptors: &[ServiceDescriptor],
    catalog: &ServiceCatalog,
    ports: &PortConfig,
    rng: &mut R,
) -> Result<Vec<BoundService>, HarnessError> {
    if descriptors.is_empty() {
        return Err(HarnessError::binding("", "no services registered"));
    }

    let mut names = HashSet::new();
    let mut taken = BTreeSet::new();
    for descriptor in descriptors {
        validate_name(&descriptor.name)?;
        if !names.insert(descriptor.name.as_str()) {
            return Err(HarnessError::binding(
                &descriptor.name,
                "name registered more than once",
            ));
        }
        if !catalog.contains(&descriptor.implementation) {
            return Err(HarnessError::binding(
                &descriptor.name,
                format!(
                    "unknown implementation '{}' (known: {})",
                    descriptor.implementation,
                    catalog.names().collect::<Vec<_>>().join(", ")
                ),
            ));
        }
        if let Some(port) = descriptor.port {
            if port < MIN_SERVICE_PORT {
                return Err(HarnessError::binding(
                    &descriptor.name,
                    format!("port {port} is below {MIN_SERVICE_PORT}"),
                ));
            }
            if !taken.insert(port) {
                return Err(HarnessError::binding(
                    &descriptor.name,
                    format!("port {port} is already assigned in this run"),
                ));
            }
        }
    }

    let auto = descriptors.iter().filter(|d| d.port.is_none()).count();
    let capacity = match ports.range_end.checked_sub(ports.range_start) {
        Some(span) => {
            let in_range = taken.range(ports.range_start..=ports.range_end).count();
            usize::from(span) + 1 - in_range
        }
        None => 0,
    };
    if auto > capacity {
        return Err(HarnessError::binding(
            "",
            format!(
                "{auto} services need ports but only {capacity} remain in {}-{}",
                ports.range_start, ports.range_end
            ),
        ));
    }

    let mut bound = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let (port, auto_assigned) = match descriptor.port {
            Some(port) => (port, false),
            None => (draw_port(ports, &mut taken, rng), true),
        };
        debug!(service = %descriptor.name, implementation = %descriptor.implementation, port, auto_assigned, "service bound");
        bound.push(BoundService {
            name: descriptor.name.clone(),
            implementation: descriptor.implementation.clone(),
            port,
            auto_assigned,
        });
    }
    Ok(bound)
}

fn draw_port<R: Rng + ?Sized>(ports: &PortConfig, taken: &mut BTreeSet<u16>, rng: &mut R) -> u16 {
    loop {
        let port = rng.gen_range(ports.range_start..=ports.range_end);
        if taken.insert(port) {
            return port;
        }
    }
}

fn validate_name(name: &str) -> Result<(), HarnessError> {
    if name.is_empty() {
        return Err(HarnessError::binding(name, "service name is empty"));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(HarnessError::binding(
            name,
            format!("character '{bad}' is not allowed in service names"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn parses_name_implementation_and_port() {
        let d: ServiceDescriptor = "Checkout".parse().unwrap();
        assert_eq!(d, ServiceDescriptor::new("Checkout", "checkout"));

        let d: ServiceDescriptor = "Shop=checkout:50051".parse().unwrap();
        assert_eq!(d, ServiceDescriptor::new("Shop", "checkout").with_port(50051));
        assert_eq!(d.to_string(), "Shop=checkout:50051");

        let d: ServiceDescriptor = "Inventory:50052".parse().unwrap();
        assert_eq!(d.implementation, "inventory");
        assert_eq!(d.port, Some(50052));

        assert!("Checkout:http".parse::<ServiceDescriptor>().is_err());
        assert!("Checkout=".parse::<ServiceDescriptor>().is_err());
    }

    #[test]
    fn explicit_ports_are_kept_and_auto_ports_stay_in_range() {
        let descriptors = vec![
            ServiceDescriptor::new("Checkout", "checkout").with_port(50051),
            ServiceDescriptor::new("Inventory", "inventory"),
        ];
        let bound = bind_services(
            &descriptors,
            &ServiceCatalog::builtin(),
            &PortConfig::default(),
            &mut rng(),
        )
        .unwrap();
        assert_eq!(bound[0].port, 50051);
        assert!(!bound[0].auto_assigned);
        assert!((50000..=59999).contains(&bound[1].port));
        assert!(bound[1].auto_assigned);
    }

    #[test]
    fn auto_ports_avoid_each_other() {
        let ports = PortConfig {
            range_start: 50000,
            range_end: 50003,
            ..PortConfig::default()
        };
        let descriptors: Vec<_> = (0..3)
            .map(|i| ServiceDescriptor::new(format!("svc{i}"), "checkout"))
            .chain(std::iter::once(
                ServiceDescriptor::new("pinned", "inventory").with_port(50001),
            ))
            .collect();
        let bound =
            bind_services(&descriptors, &ServiceCatalog::builtin(), &ports, &mut rng()).unwrap();
        let unique: HashSet<_> = bound.iter().map(|b| b.port).collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn exhausted_range_is_rejected() {
        let ports = PortConfig {
            range_start: 50000,
            range_end: 50001,
            ..PortConfig::default()
        };
        let descriptors: Vec<_> = (0..3)
            .map(|i| ServiceDescriptor::new(format!("svc{i}"), "checkout"))
            .collect();
        let err = bind_services(&descriptors, &ServiceCatalog::builtin(), &ports, &mut rng())
            .unwrap_err();
        assert!(matches!(err, HarnessError::Binding { .. }));
    }

    #[test]
    fn inverted_range_is_rejected_without_drawing() {
        let ports = PortConfig {
            range_start: 50010,
            range_end: 50000,
            ..PortConfig::default()
        };
        let err = bind_services(
            &[ServiceDescriptor::new("Checkout", "checkout")],
            &ServiceCatalog::builtin(),
            &ports,
            &mut rng(),
        )
        .unwrap_err();
        assert!(matches!(err, HarnessError::Binding { .. }));

        let pinned = bind_services(
            &[ServiceDescriptor::new("Checkout", "checkout").with_port(50051)],
            &ServiceCatalog::builtin(),
            &ports,
            &mut rng(),
        )
        .unwrap();
        assert_eq!(pinned[0].port, 50051);
    }

    #[test]
    fn rejects_bad_registrations() {
        let catalog = ServiceCatalog::builtin();
        let ports = PortConfig::default();
        let cases = [
            vec![],
            vec![ServiceDescriptor::new("", "checkout")],
            vec![ServiceDescriptor::new("../etc", "checkout")],
            vec![ServiceDescriptor::new("Payments", "payments")],
            vec![ServiceDescriptor::new("Checkout", "checkout").with_port(80)],
            vec![
                ServiceDescriptor::new("Checkout", "checkout"),
                ServiceDescriptor::new("Checkout", "inventory"),
            ],
            vec![
                ServiceDescriptor::new("A", "checkout").with_port(50051),
                ServiceDescriptor::new("B", "inventory").with_port(50051),
            ],
        ];
        for descriptors in cases {
            let err = bind_services(&descriptors, &catalog, &ports, &mut rng()).unwrap_err();
            assert!(err.is_pre_spawn(), "{descriptors:?}");
        }
    }
}
