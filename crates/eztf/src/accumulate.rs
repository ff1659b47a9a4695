//! prepass accumulators
//!
//! Some references point at things that are only built later in the same sub-stack, or at things that are never
//! registered by name at all (a subnet is part of its network module). Accumulators scan a range once before any
//! resource is built and record the facts the resolver needs for those.
use crate::stack::{required, BuildError};
use crate::value::Value;
use indexmap::{IndexMap, IndexSet};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Accumulators {
    /// `"<region>/<subnet>"` to network name
    pub subnets: IndexMap<String, String>,
    /// `"<destination type>-<destination>"` to log sink name
    pub log_destinations: IndexMap<String, String>,
    /// names of HA VPN gateways
    pub vpn_ha: IndexSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulator {
    Subnets,
    LogDestinations,
    VpnHa,
}

impl Accumulator {
    pub fn scan(
        self,
        accumulators: &mut Accumulators,
        range: &str,
        items: &[Value],
    ) -> Result<(), BuildError> {
        tracing::trace!(?self, range, "scanning");
        match self {
            Accumulator::Subnets => {
                for network in items {
                    let network_name = required(network, range, "network_name")?;
                    for subnet in network.items("subnets") {
                        let region = required(subnet, range, "subnet_region")?;
                        let name = required(subnet, range, "subnet_name")?;
                        accumulators
                            .subnets
                            .insert(format!("{region}/{name}"), network_name.clone());
                    }
                }
            }
            Accumulator::LogDestinations => {
                for sink in items {
                    let destination_type = required(sink, range, "log_destination_type")?;
                    let sink_name = required(sink, range, "log_sink_name")?;
                    let destination = required(sink, range, "destination_uri")?;
                    accumulators
                        .log_destinations
                        .insert(format!("{destination_type}-{destination}"), sink_name);
                }
            }
            Accumulator::VpnHa => {
                for gateway in items {
                    accumulators.vpn_ha.insert(required(gateway, range, "name")?);
                }
            }
        }
        Ok(())
    }
}
