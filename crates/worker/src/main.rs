use chrono::{Days, Utc};
use shared::briefing::{BriefingEdition, compose_digest};
use shared::config::WorkerConfig;
use shared::push::FcmSender;
use shared::repos::Store;
use shared::timezone;
use tokio::signal;
use tokio::time::{self, Duration};
use tracing::{error, info, warn};

mod schedule;

use schedule::BriefingSchedule;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "worker=debug,shared=debug".to_string()),
        )
        .init();

    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("failed to read worker config: {err}");
            std::process::exit(1);
        }
    };

    let store = match Store::connect(&config.database_url, config.database_max_connections).await {
        Ok(store) => store,
        Err(err) => {
            error!("failed to connect to postgres: {err}");
            std::process::exit(1);
        }
    };

    let push = match FcmSender::from_service_account_file(&config.fcm_service_account_path) {
        Ok(sender) => sender,
        Err(err) => {
            error!("briefing worker needs a push sender: {err}");
            std::process::exit(1);
        }
    };

    let briefing_schedule = match BriefingSchedule::new(&config.morning_cron, &config.evening_cron)
    {
        Ok(briefing_schedule) => briefing_schedule,
        Err(err) => {
            error!("invalid briefing cron expression: {err}");
            std::process::exit(1);
        }
    };

    info!(
        "briefing worker starting (matutino {:?}, nocturno {:?}, zone America/Lima)",
        config.morning_cron, config.evening_cron
    );

    loop {
        let now = Utc::now();
        let Some((fire_at, edition)) = briefing_schedule.next_fire(now) else {
            error!("no upcoming briefing trigger; exiting");
            break;
        };

        let wait = (fire_at - now).to_std().unwrap_or(Duration::from_secs(0));
        info!("next briefing {:?} at {}", edition, fire_at.to_rfc3339());

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
            _ = time::sleep(wait) => {
                run_briefings(&store, &push, edition).await;
            }
        }
    }
}

/// One digest per user with a push token. Per-user failures are counted,
/// never raised.
async fn run_briefings(store: &Store, push: &FcmSender, edition: BriefingEdition) {
    let users = match store.users_with_push_tokens().await {
        Ok(users) => users,
        Err(err) => {
            error!("briefing user listing failed: {err}");
            return;
        }
    };

    let today = timezone::local_date(Utc::now());
    let horizon_date = match edition {
        BriefingEdition::Matutino => today,
        BriefingEdition::Nocturno => today.checked_add_days(Days::new(1)).unwrap_or(today),
    };
    let Some(until) = timezone::local_day_end_utc(horizon_date) else {
        error!("briefing horizon computation failed for {horizon_date}");
        return;
    };

    let mut sent = 0usize;
    let mut failures = 0usize;
    for user in users {
        let Some(token) = user.push_token.as_deref().filter(|token| !token.is_empty()) else {
            continue;
        };

        let alerts = match store.due_pending_alerts(user.id, until).await {
            Ok(alerts) => alerts,
            Err(err) => {
                warn!("briefing alert fetch failed for {}: {err}", user.id);
                failures += 1;
                continue;
            }
        };

        let Some(digest) = compose_digest(edition, &alerts) else {
            continue;
        };

        match push.send(token, &digest).await {
            Ok(()) => sent += 1,
            Err(err) => {
                failures += 1;
                match err {
                    shared::push::PushSendError::Transient { code, message }
                    | shared::push::PushSendError::Permanent { code, message } => {
                        warn!("briefing push failed for {} ({code}): {message}", user.id);
                    }
                }
            }
        }
    }

    info!(
        "briefing {:?} done: {sent} sent, {failures} failures",
        edition
    );
}
