//! Run a subset of the rule catalog on a diagram built in code.

use archguard::diagram::Direction;
use archguard::prelude::*;
use archguard::RulesEngine;

fn main() -> Result<(), ArchGuardError> {
    let diagram = Diagram::new()
        .with_node(
            Node::new("cpu0", NodeCategory::Cpu)
                .with_label("Application Core")
                .with_interface(
                    Interface::new("m_axi", "AXI4")
                        .with_direction(Direction::Master)
                        .with_widths(32, 32, 4),
                ),
        )
        .with_node(
            Node::new("sram0", NodeCategory::Memory)
                .with_label("On-chip SRAM")
                .with_address("0x20000000", "0x40000")
                .with_interface(
                    Interface::new("s_axi", "AXI4")
                        .with_direction(Direction::Slave)
                        .with_widths(64, 32, 4),
                ),
        )
        .with_edge(Edge::new("e1", "cpu0", "m_axi", "sram0", "s_axi"));

    let options = DrcOptions {
        rules: vec!["AXI-001".into(), "AXI-002".into(), "ADDR-003".into()],
        ..DrcOptions::default()
    };

    let run = RulesEngine::with_default_rules().analyze(&diagram, &options)?;
    println!("{} checks, {} violation(s)", run.total_checks, run.violations.len());
    for v in &run.violations {
        println!("  {} {} [{}]: {}", v.rule_id(), v.rule_name, v.severity, v.description);
    }
    Ok(())
}
