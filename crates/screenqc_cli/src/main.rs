//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `screenqc_core` wiring: it
//!   seeds the in-memory server with one image and runs the contrast
//!   check end to end.
//! - Keep output deterministic for quick local sanity checks.

use screenqc_core::{
    Connection, ConnectionConfig, ContrastMeasure, ImageSpec, MemoryServer, Plane, QcEngine,
};

fn main() {
    println!("screenqc_core version={}", screenqc_core::core_version());

    let server = MemoryServer::new();
    server.add_image(
        ImageSpec::new("smoke-a1")
            .channel_labels(["DAPI"])
            .plane(0, 0, 0, Plane::filled(4, 4, 100.0)),
    );

    let config = ConnectionConfig::new("importer", "screenqc");
    let mut conn = match Connection::connect(config, Box::new(server)) {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("connect failed: {err}");
            std::process::exit(1);
        }
    };

    match QcEngine::new(&mut conn).run(&ContrastMeasure) {
        Ok(summary) => println!(
            "contrast run ok: candidates={} checked={}",
            summary.candidates, summary.checked
        ),
        Err(err) => {
            eprintln!("contrast run failed: {err}");
            std::process::exit(1);
        }
    }
}
