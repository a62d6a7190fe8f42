//! ---
//! rig_section: "06-operator-interface"
//! rig_subsection: "binary"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "`rigctl catalog`: list what runs can use."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use rig_client::RoutineCatalog;
use rig_common::RigConfig;
use rig_harness::Harness;

/// Print the built-in service implementations and test routines.
pub fn run() {
    let harness = Harness::new(RigConfig::default());
    println!("Service implementations:");
    for name in harness.services().names() {
        let contract = harness.services().contract(name).unwrap_or("-");
        println!("  {name:<12} {contract}");
    }
    println!("Test routines:");
    print_routines(harness.routines());
}

fn print_routines(routines: &RoutineCatalog) {
    for (name, description) in routines.entries() {
        println!("  {name:<12} {description}");
    }
}
