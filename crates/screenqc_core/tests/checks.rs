use screenqc_core::{
    AnnotationTarget, AnnotationValue, Connection, ConnectionConfig, ContrastMeasure, ImageSpec,
    MemoryServer, Plane, PowerSpectrum, QcEngine, SaturationCheck,
};

fn connect(server: &MemoryServer) -> Connection {
    Connection::connect(
        ConnectionConfig::new("importer", "secret"),
        Box::new(server.clone()),
    )
    .unwrap()
}

fn map_rows(conn: &mut Connection, target: AnnotationTarget, namespace: &str) -> Vec<(String, String)> {
    conn.annotations(target, Some(namespace))
        .unwrap()
        .into_iter()
        .find_map(|a| match a.value {
            AnnotationValue::Map(rows) => Some(rows),
            _ => None,
        })
        .expect("map annotation present")
}

#[test]
fn contrast_reports_interquartile_over_median() {
    let server = MemoryServer::new();
    // Samples 0..=100: P25=25, P50=50, P75=75, so the ratio is exactly 1.
    let samples: Vec<f64> = (0..=100).map(f64::from).collect();
    let image = server.add_image(
        ImageSpec::new("ramp")
            .channel_labels(["DAPI"])
            .plane(0, 0, 0, Plane::from_samples(101, 1, samples).unwrap()),
    );

    let mut conn = connect(&server);
    QcEngine::new(&mut conn).run(&ContrastMeasure).unwrap();

    let rows = map_rows(
        &mut conn,
        AnnotationTarget::Image(image),
        "contrast.qualitycheck",
    );
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "DAPI contrast");
    let value: f64 = rows[0].1.parse().unwrap();
    assert!((value - 1.0).abs() < 1e-12);
}

#[test]
fn contrast_flags_a_zero_median_plane() {
    let server = MemoryServer::new();
    let image = server.add_image(
        ImageSpec::new("dark")
            .channel_labels(["DAPI"])
            .plane(0, 0, 0, Plane::filled(4, 4, 0.0)),
    );

    let mut conn = connect(&server);
    QcEngine::new(&mut conn).run(&ContrastMeasure).unwrap();

    let rows = map_rows(
        &mut conn,
        AnnotationTarget::Image(image),
        "contrast.qualitycheck",
    );
    assert_eq!(rows, vec![("DAPI contrast".to_string(), "divide by zero".to_string())]);
}

#[test]
fn contrast_reports_one_row_per_plane_with_repeated_labels() {
    let server = MemoryServer::new();
    let image = server.add_image(
        ImageSpec::new("stack")
            .channel_labels(["DAPI"])
            .plane(0, 0, 0, Plane::filled(4, 4, 10.0))
            .plane(1, 0, 0, Plane::filled(4, 4, 20.0)),
    );

    let mut conn = connect(&server);
    QcEngine::new(&mut conn).run(&ContrastMeasure).unwrap();

    let rows = map_rows(
        &mut conn,
        AnnotationTarget::Image(image),
        "contrast.qualitycheck",
    );
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|(label, _)| label == "DAPI contrast"));
}

#[test]
fn power_spectrum_stores_summary_and_plot_per_channel() {
    let server = MemoryServer::new();
    // Unit impulse: flat spectrum, so every radial bin averages to zero.
    let mut samples = vec![0.0; 16];
    samples[0] = 1.0;
    let image = server.add_image(
        ImageSpec::new("impulse")
            .channel_labels(["GFP"])
            .plane(0, 0, 0, Plane::from_samples(4, 4, samples).unwrap()),
    );

    let mut conn = connect(&server);
    QcEngine::new(&mut conn).run(&PowerSpectrum).unwrap();

    let scoped = conn
        .annotations(
            AnnotationTarget::Image(image),
            Some("powerspectrum.qualitycheck"),
        )
        .unwrap();
    // Completion tag, one numeric summary, one plot attachment.
    assert_eq!(scoped.len(), 3);

    let summary = scoped
        .iter()
        .find_map(|a| match a.value {
            AnnotationValue::Double(value) => Some((a.name.clone(), value)),
            _ => None,
        })
        .expect("numeric summary present");
    assert_eq!(summary.0.as_deref(), Some("GFP power spectrum"));
    assert!(summary.1.abs() < 1e-9);

    let attachment = scoped
        .iter()
        .find_map(|a| match &a.value {
            AnnotationValue::File { name, mime, bytes } => Some((name.clone(), mime.clone(), bytes.clone())),
            _ => None,
        })
        .expect("plot attachment present");
    assert!(attachment.0.starts_with("GFP_"));
    assert!(attachment.0.ends_with("_powerspectrum.png"));
    assert_eq!(attachment.1, "image/png");
    assert_eq!(&attachment.2[..8], b"\x89PNG\r\n\x1a\n");
}

#[test]
fn saturation_reports_clipped_fraction_per_plane() {
    let server = MemoryServer::new();
    let mut samples = vec![10.0; 16];
    for sample in samples.iter_mut().take(4) {
        *sample = 255.0;
    }
    let image = server.add_image(
        ImageSpec::new("hot")
            .channel_labels(["DAPI"])
            .pixel_max(255.0)
            .plane(0, 0, 0, Plane::from_samples(4, 4, samples).unwrap()),
    );

    let mut conn = connect(&server);
    QcEngine::new(&mut conn).run(&SaturationCheck).unwrap();

    let rows = map_rows(
        &mut conn,
        AnnotationTarget::Image(image),
        "saturation.qualitycheck",
    );
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "DAPI saturation");
    let fraction: f64 = rows[0].1.parse().unwrap();
    assert!((fraction - 0.25).abs() < 1e-12);
}
