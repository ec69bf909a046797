//! Net connectivity read from a generated PCB document.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::document::PcbDocument;
use crate::error::Result;
use crate::source::{fetch_generated_json, Repository, RetryPolicy};

/// Pins (`DESIGNATOR.PAD`) connected to each net, nets in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Netlist {
    pub nets: BTreeMap<String, Vec<String>>,
}

impl Netlist {
    /// Pads without a designator or net are skipped, as are pads on an
    /// empty net. Pins within a net are in natural order.
    pub fn from_pcb(pcb: &PcbDocument) -> Self {
        let mut nets: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for component in &pcb.component_instances {
            let Some(designator) = component.designator.as_deref() else {
                continue;
            };
            for pad in &component.pads {
                let (Some(pad_name), Some(net)) = (pad.designator.as_deref(), pad.net_name.as_deref())
                else {
                    continue;
                };
                if net.is_empty() {
                    continue;
                }
                nets.entry(net.to_string())
                    .or_default()
                    .push(format!("{designator}.{pad_name}"));
            }
        }

        for pins in nets.values_mut() {
            pins.sort_by(|a, b| natord::compare(a, b));
        }
        Self { nets }
    }

    pub fn pins(&self, net: &str) -> &[String] {
        self.nets.get(net).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Fetch the generated JSON of `pcb_file` and collect its nets.
pub fn generate_netlist(
    repo: &dyn Repository,
    pcb_file: &str,
    git_ref: Option<&str>,
    policy: &RetryPolicy,
) -> Result<Netlist> {
    let git_ref = git_ref.unwrap_or(repo.default_ref());
    log::info!("Generating netlist for {pcb_file} in {} at {git_ref}", repo.name());
    let json = fetch_generated_json(repo, pcb_file, git_ref, policy)?;
    let pcb = PcbDocument::from_json(pcb_file, json)?;
    Ok(Netlist::from_pcb(&pcb))
}
