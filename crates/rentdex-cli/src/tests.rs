use super::*;

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["rentdex-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["rentdex-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["rentdex-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn discover_defaults_to_all_sources() {
    let cli = Cli::try_parse_from(["rentdex-cli", "discover"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Discover {
            source: None,
            max_urls: None
        })
    ));
}

#[test]
fn discover_with_source_and_cap() {
    let cli = Cli::try_parse_from([
        "rentdex-cli",
        "discover",
        "--source",
        "khmer24",
        "--max-urls",
        "50",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Discover {
            source: Some(ref s),
            max_urls: Some(50)
        }) if s == "khmer24"
    ));
}

#[test]
fn process_with_max_items() {
    let cli = Cli::try_parse_from(["rentdex-cli", "process", "--max-items", "25"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Process {
            source: None,
            max_items: Some(25)
        })
    ));
}

#[test]
fn mark_stale_uses_kebab_case() {
    let cli = Cli::try_parse_from(["rentdex-cli", "mark-stale", "--days", "10"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::MarkStale { days: Some(10) })
    ));
}

#[test]
fn index_daily_parses_iso_date() {
    let cli =
        Cli::try_parse_from(["rentdex-cli", "index", "daily", "--date", "2025-03-10"]).unwrap();
    let expected = NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date");
    assert!(matches!(
        cli.command,
        Some(Commands::Index {
            command: IndexCommands::Daily { date: Some(d) }
        }) if d == expected
    ));
}

#[test]
fn index_daily_rejects_malformed_date() {
    let result = Cli::try_parse_from(["rentdex-cli", "index", "daily", "--date", "10/03/2025"]);
    assert!(result.is_err());
}

#[test]
fn index_monthly_defaults_to_current_month() {
    let cli = Cli::try_parse_from(["rentdex-cli", "index", "monthly"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Index {
            command: IndexCommands::Monthly {
                year: None,
                month: None
            }
        })
    ));
}

#[test]
fn index_show_monthly_requires_year_and_month() {
    let result = Cli::try_parse_from(["rentdex-cli", "index", "show-monthly", "--year", "2025"]);
    assert!(result.is_err());

    let cli = Cli::try_parse_from([
        "rentdex-cli",
        "index",
        "show-monthly",
        "--year",
        "2025",
        "--month",
        "3",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Index {
            command: IndexCommands::ShowMonthly {
                year: 2025,
                month: 3
            }
        })
    ));
}

#[test]
fn queue_status_with_source() {
    let cli =
        Cli::try_parse_from(["rentdex-cli", "queue", "status", "--source", "realestate-kh"])
            .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Queue {
            command: QueueCommands::Status { source: Some(ref s) }
        }) if s == "realestate-kh"
    ));
}

#[test]
fn runs_list_default_limit() {
    let cli = Cli::try_parse_from(["rentdex-cli", "runs", "list"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Runs {
            command: RunsCommands::List {
                job: None,
                limit: 20
            }
        })
    ));
}

#[test]
fn runs_list_parses_job_type() {
    let cli =
        Cli::try_parse_from(["rentdex-cli", "runs", "list", "--job", "process_queue"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Runs {
            command: RunsCommands::List {
                job: Some(JobType::ProcessQueue),
                ..
            }
        })
    ));
}

#[test]
fn runs_list_rejects_unknown_job_type() {
    let result = Cli::try_parse_from(["rentdex-cli", "runs", "list", "--job", "reindex"]);
    assert!(result.is_err());
}

#[test]
fn listing_override_parses_type_and_active_flag() {
    let cli = Cli::try_parse_from([
        "rentdex-cli",
        "listing",
        "override",
        "--id",
        "42",
        "--property-type",
        "serviced apartment",
        "--active",
        "false",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Listing {
            command: ListingCommands::Override {
                id: 42,
                property_type: Some(PropertyType::ServicedApartment),
                active: Some(false)
            }
        })
    ));
}

#[test]
fn listing_override_requires_id() {
    let result = Cli::try_parse_from(["rentdex-cli", "listing", "override"]);
    assert!(result.is_err());
}

#[test]
fn listing_clear_override() {
    let cli =
        Cli::try_parse_from(["rentdex-cli", "listing", "clear-override", "--id", "7"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Listing {
            command: ListingCommands::ClearOverride { id: 7 }
        })
    ));
}

#[test]
fn schedule_takes_no_arguments() {
    let cli = Cli::try_parse_from(["rentdex-cli", "schedule"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Schedule)));
}
