//! Address Space Rules
//!
//! Memory-mapped nodes declare `baseAddress` and `addressSize` as hex
//! strings. A node occupies the half-open range `[base, base + size)`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::diagram::Node;

use super::rules::{Rule, RuleContext, RuleOutcome};
use super::{AddressField, AddressRange, DrcViolation, RuleId, ViolationDetails};

static HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0[xX][0-9a-fA-F]+$").unwrap());

/// Parse a `0x`-prefixed hex value. Values that do not fit in 64 bits are
/// treated as malformed.
pub fn parse_hex(value: &str) -> Option<u64> {
    let value = value.trim();
    if !HEX.is_match(value) {
        return None;
    }
    u64::from_str_radix(&value[2..], 16).ok()
}

pub fn format_hex(value: u128) -> String {
    format!("0x{:08X}", value)
}

/// `[a_base, a_base + a_size)` and `[b_base, b_base + b_size)` share at least one address
pub fn ranges_overlap(a_base: u64, a_size: u64, b_base: u64, b_size: u64) -> bool {
    let a_end = a_base as u128 + a_size as u128;
    let b_end = b_base as u128 + b_size as u128;
    (a_base as u128) < b_end && (b_base as u128) < a_end
}

/// A node's decoded address window
#[derive(Debug, Clone, Copy)]
struct Window<'a> {
    node: &'a Node,
    base: u64,
    size: u64,
}

impl Window<'_> {
    fn end(&self) -> u128 {
        self.base as u128 + self.size as u128
    }

    fn range(&self) -> AddressRange {
        AddressRange {
            node_id: self.node.id.clone(),
            base: format_hex(self.base as u128),
            end: format_hex(self.end()),
        }
    }
}

/// Nodes with both address fields present and well formed, in diagram order.
/// Anything else is reported by [`MalformedAddressRule`].
fn windows(nodes: &[Node]) -> Vec<Window<'_>> {
    nodes
        .iter()
        .filter_map(|node| {
            let base = parse_hex(node.properties.base_address.as_deref()?)?;
            let size = parse_hex(node.properties.address_size.as_deref()?)?;
            Some(Window { node, base, size })
        })
        .collect()
}

pub struct AddressOverlapRule;

impl Rule for AddressOverlapRule {
    fn id(&self) -> RuleId {
        RuleId::Addr001
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();
        let windows = windows(&ctx.diagram().nodes);

        for (i, a) in windows.iter().enumerate() {
            for b in &windows[i + 1..] {
                outcome.checked();
                if !ranges_overlap(a.base, a.size, b.base, b.size) {
                    continue;
                }
                let start = a.base.max(b.base) as u128;
                let end = a.end().min(b.end());
                outcome.push(
                    DrcViolation::new(
                        ViolationDetails::AddressOverlap {
                            first: a.range(),
                            second: b.range(),
                            overlap_start: format_hex(start),
                            overlap_end: format_hex(end),
                        },
                        format!("{} / {}", a.node.id, b.node.id),
                        format!(
                            "Address range of '{}' [{}, {}) overlaps '{}' [{}, {}) at [{}, {})",
                            a.node.display_name(),
                            format_hex(a.base as u128),
                            format_hex(a.end()),
                            b.node.display_name(),
                            format_hex(b.base as u128),
                            format_hex(b.end()),
                            format_hex(start),
                            format_hex(end)
                        ),
                        "Move one of the regions so that the address map has no overlap",
                    )
                    .with_components([a.node.id.as_str(), b.node.id.as_str()]),
                );
            }
        }
        outcome
    }
}

pub struct MalformedAddressRule;

impl Rule for MalformedAddressRule {
    fn id(&self) -> RuleId {
        RuleId::Addr002
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();
        for node in ctx.diagram().nodes.iter().filter(|n| n.is_memory_mapped()) {
            let fields = [
                (AddressField::BaseAddress, "baseAddress", &node.properties.base_address),
                (AddressField::AddressSize, "addressSize", &node.properties.address_size),
            ];
            for (field, key, value) in fields {
                outcome.checked();
                let description = match value {
                    Some(value) if parse_hex(value).is_some() => continue,
                    Some(value) => format!(
                        "'{}' has {} '{}', which is not a 0x-prefixed 64-bit hex value",
                        node.display_name(),
                        key,
                        value
                    ),
                    None => format!(
                        "'{}' declares an address window without {}",
                        node.display_name(),
                        key
                    ),
                };
                outcome.push(
                    DrcViolation::new(
                        ViolationDetails::MalformedAddress {
                            node_id: node.id.clone(),
                            field,
                            value: value.clone().unwrap_or_default(),
                        },
                        format!("node {}", node.id),
                        description,
                        format!("Write {} as a hex literal such as 0x40000000", key),
                    )
                    .with_components([node.id.as_str()]),
                );
            }
        }
        outcome
    }
}

pub struct AddressAlignmentRule;

impl Rule for AddressAlignmentRule {
    fn id(&self) -> RuleId {
        RuleId::Addr003
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();
        for window in windows(&ctx.diagram().nodes) {
            if window.size == 0 {
                continue;
            }
            outcome.checked();
            if window.base % window.size == 0 {
                continue;
            }
            let node = window.node;
            let base = format_hex(window.base as u128);
            let size = format_hex(window.size as u128);
            outcome.push(
                DrcViolation::new(
                    ViolationDetails::MisalignedBase {
                        node_id: node.id.clone(),
                        base: base.clone(),
                        size: size.clone(),
                    },
                    format!("node {}", node.id),
                    format!(
                        "Base address {} of '{}' is not aligned to its size {}",
                        base,
                        node.display_name(),
                        size
                    ),
                    "Align the base address to a multiple of the region size",
                )
                .with_components([node.id.as_str()]),
            );
        }
        outcome
    }
}
