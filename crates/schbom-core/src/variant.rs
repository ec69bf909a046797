//! Altium project variants: components that are not fitted, and parameter
//! overrides for fitted ones.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::component::ComponentRecord;
use crate::project::Section;

static VARIATION_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^variation\d+$").unwrap());
static PARAM_VARIATION_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^paramvariation(\d+)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariationKind {
    FittedModParams,
    NotFitted,
    AltComp,
}

impl VariationKind {
    fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "0" => Some(Self::FittedModParams),
            "1" => Some(Self::NotFitted),
            "2" => Some(Self::AltComp),
            _ => None,
        }
    }
}

/// Component identity used by variations: short unique id and designator.
type ComponentKey = (String, String);

/// Parse `Key=Value|Key=Value` directive fields. Fields without `=` are
/// dropped with a warning.
fn parse_fields(value: &str) -> HashMap<&str, &str> {
    value
        .split('|')
        .filter_map(|field| {
            let pair = field.split_once('=');
            if pair.is_none() {
                log::warn!("Ignoring malformed variation field '{field}'");
            }
            pair
        })
        .collect()
}

/// Removals and parameter patches described by one variant section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantDirectives {
    removed: HashSet<ComponentKey>,
    patches: HashMap<ComponentKey, Vec<(String, String)>>,
}

impl VariantDirectives {
    /// Read `VariationN` and `ParamVariationN` entries in file order.
    ///
    /// A `ParamVariationN` only applies to a designator registered by an
    /// earlier fitted `VariationN`; anything else is logged and ignored.
    pub fn from_section(section: &Section) -> Self {
        let mut directives = Self::default();
        let mut fitted: HashMap<String, String> = HashMap::new();

        for (key, value) in section.entries() {
            if VARIATION_KEY.is_match(key) {
                let fields = parse_fields(value);
                let (Some(designator), Some(unique_id), Some(kind)) = (
                    fields.get("Designator").copied(),
                    fields.get("UniqueId").copied(),
                    fields.get("Kind").copied(),
                ) else {
                    log::warn!(
                        "Designator, UniqueId, or Kind not found in {key}='{value}'; skipping this variation."
                    );
                    continue;
                };
                let Some(kind) = VariationKind::from_code(kind) else {
                    log::warn!(
                        "Kind {kind} of {key} must be either 0, 1 or 2; skipping this variation."
                    );
                    continue;
                };

                let unique_id = unique_id.rsplit('\\').next().unwrap_or(unique_id);
                if kind == VariationKind::NotFitted {
                    directives
                        .removed
                        .insert((unique_id.to_string(), designator.to_string()));
                } else {
                    fitted.insert(designator.to_string(), unique_id.to_string());
                }
            } else if let Some(caps) = PARAM_VARIATION_KEY.captures(key) {
                let id = &caps[1];
                let Some(designator) = section.get(&format!("ParamDesignator{id}")) else {
                    log::warn!("ParamVariation{id} has no ParamDesignator{id}; ignoring it.");
                    continue;
                };
                let Some(unique_id) = fitted.get(designator) else {
                    log::warn!(
                        "ParamVariation{id} found for component {designator} either before the \
                         corresponding Variation or for a component that is not fitted. \
                         Ignoring this ParamVariation."
                    );
                    continue;
                };
                let fields = parse_fields(value);
                let (Some(parameter), Some(variant_value)) =
                    (fields.get("ParameterName").copied(), fields.get("VariantValue").copied())
                else {
                    log::warn!("ParameterName or VariantValue not found in ParamVariation{id}.");
                    continue;
                };

                directives
                    .patches
                    .entry((unique_id.clone(), designator.to_string()))
                    .or_default()
                    .push((parameter.to_string(), variant_value.to_string()));
            }
        }

        directives
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.patches.is_empty()
    }

    /// Drop not-fitted components and patch the parameters of the rest.
    /// Removal wins over patching. Components without a unique id or
    /// designator are never targeted.
    pub fn apply(&self, components: Vec<ComponentRecord>) -> Vec<ComponentRecord> {
        components
            .into_iter()
            .filter_map(|mut component| {
                let key = component
                    .short_unique_id()
                    .zip(component.designator())
                    .map(|(uid, designator)| (uid.to_string(), designator.to_string()));
                let Some(key) = key else {
                    return Some(component);
                };

                if self.removed.contains(&key) {
                    log::debug!("Variant removes {} ({})", key.1, key.0);
                    return None;
                }
                if let Some(patches) = self.patches.get(&key) {
                    for (parameter, value) in patches {
                        component.attributes.insert(parameter.clone(), value.clone());
                    }
                }
                Some(component)
            })
            .collect()
    }
}

/// Apply `directives` to `components`; see [`VariantDirectives::apply`].
pub fn apply_variant(
    components: Vec<ComponentRecord>,
    directives: &VariantDirectives,
) -> Vec<ComponentRecord> {
    directives.apply(components)
}
