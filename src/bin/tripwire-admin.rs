use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tripwire::clock::SystemClock;
use tripwire::config::Config;
use tripwire::fraud::is_disposable_email;
use tripwire::models::DeviceFingerprint;
use tripwire::service::{build_detector, connect_storage};
use tripwire::storage::SessionQuery;

#[derive(Parser)]
#[command(name = "tripwire-admin")]
#[command(about = "Tripwire fraud review CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List recent fraud alerts
    Alerts {
        /// Only alerts for this user
        #[arg(long)]
        user: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show a user's session history
    Sessions {
        user_id: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Check an email against the disposable-provider list
    CheckEmail { email: String },
    /// Score a hypothetical signup without recording anything
    Risk {
        ip: String,
        /// Full device fingerprint
        fingerprint: String,
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::CheckEmail { email } => {
            if is_disposable_email(&email) {
                println!("⚠ {} uses a disposable email provider", email);
            } else {
                println!("✓ {} is not on the disposable provider list", email);
            }
        }
        Commands::Alerts { user, limit } => {
            let storage = connect_storage(&config.database).await?;
            let alerts = storage.list_alerts(limit, user.as_deref()).await?;
            if alerts.is_empty() {
                println!("No fraud alerts found.");
            } else {
                println!("{:<26} {:<10} {:<30} {}", "Created", "Level", "User", "Reason");
                println!("{}", "-".repeat(100));
                for alert in alerts {
                    println!(
                        "{:<26} {:<10} {:<30} {}",
                        alert.created_at.to_rfc3339(),
                        alert.risk_level,
                        alert.user_id,
                        alert.reason
                    );
                }
            }
        }
        Commands::Sessions { user_id, limit } => {
            let storage = connect_storage(&config.database).await?;
            let sessions = storage
                .query_sessions(&SessionQuery::default().with_user(&user_id).limit(limit))
                .await?;
            if sessions.is_empty() {
                println!("No sessions found for '{}'.", user_id);
            } else {
                println!(
                    "{:<26} {:<8} {:<40} {:<20} {}",
                    "Created", "Action", "IP", "Location", "Device"
                );
                println!("{}", "-".repeat(120));
                for s in sessions {
                    println!(
                        "{:<26} {:<8} {:<40} {:<20} {} {} on {} ({})",
                        s.created_at.to_rfc3339(),
                        s.action,
                        s.ip,
                        format!("{}, {}", s.city, s.country),
                        s.browser,
                        s.browser_version,
                        s.os,
                        s.device_type
                    );
                }
            }
        }
        Commands::Risk {
            ip,
            fingerprint,
            email,
        } => {
            let storage = connect_storage(&config.database).await?;
            let detector = build_detector(&config, storage, Arc::new(SystemClock));
            let fingerprint = DeviceFingerprint::new(fingerprint);
            let assessment = detector.assess(&email, &ip, &fingerprint).await;

            println!("Score:      {}", assessment.score);
            println!("Risk level: {}", assessment.risk_level);
            println!(
                "Decision:   {}",
                if assessment.risk_level.blocks_signup() {
                    "block"
                } else if assessment.warrants_alert() {
                    "allow with alert"
                } else {
                    "allow"
                }
            );
            for reason in &assessment.reasons {
                println!("  - {}", reason);
            }
        }
    }

    Ok(())
}
