use super::*;

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["coolfleet-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_coolers_with_filters() {
    let cli = Cli::try_parse_from([
        "coolfleet-cli",
        "coolers",
        "--status",
        "alert",
        "--city",
        "Durban",
        "--json",
    ])
    .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Coolers {
            count: 200,
            seed: None,
            status: Some(ref s),
            city: Some(ref c),
            json: true,
            ..
        }) if s == "alert" && c == "Durban"
    ));
}

#[test]
fn circle_accepts_negative_coordinates() {
    let cli = Cli::try_parse_from([
        "coolfleet-cli",
        "circle",
        "--lng",
        "28.0473",
        "--lat",
        "-26.2041",
        "--radius",
        "500",
    ])
    .expect("expected valid cli args");

    let Some(Commands::Circle {
        lng,
        lat,
        radius,
        steps,
    }) = cli.command
    else {
        panic!("expected circle command");
    };
    assert!((lng - 28.0473).abs() < f64::EPSILON);
    assert!((lat + 26.2041).abs() < f64::EPSILON);
    assert_eq!(radius, Some(500.0));
    assert_eq!(steps, coolfleet_core::CIRCLE_STEPS);
}

#[test]
fn simulate_defaults() {
    let cli = Cli::try_parse_from(["coolfleet-cli", "simulate"]).expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Simulate {
            count: 20,
            ticks: 60,
            interval_secs: 60,
            seed: None,
            zones: None,
            ..
        })
    ));
}

#[test]
fn check_zones_requires_a_path() {
    assert!(Cli::try_parse_from(["coolfleet-cli", "check-zones"]).is_err());

    let cli = Cli::try_parse_from(["coolfleet-cli", "check-zones", "zones.yaml", "--count", "50"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::CheckZones { ref path, count: 50, seed: None })
            if path == std::path::Path::new("zones.yaml")
    ));
}
