use std::collections::HashMap;
use std::time::Duration;

use chrono::Timelike;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm::{LlmGateway, SenderProfileContract, prompts};
use crate::repos::{HistoricRunStats, SenderProfileUpsert, Store, StoreError};

use super::gmail::FetchedEmail;
use super::triage::TriageEngine;

const HISTORY_FETCH_LIMIT: u32 = 500;
const TOP_SENDERS: usize = 30;
const KEYWORD_MIN_LEN: usize = 4;
const TOP_KEYWORDS: usize = 5;
const SAMPLE_EMAILS: usize = 3;

#[derive(Debug)]
pub enum HistoricOutcome {
    AlreadyAnalyzed,
    Completed(HistoricRunStats),
}

/// One-shot mailbox pass: statistical sender profiles with exactly one short
/// LLM call per top sender, then a completion marker with the savings figure.
pub async fn run_historic_analysis(
    store: &Store,
    gateway: &dyn LlmGateway,
    engine: &TriageEngine,
    gmail: &super::gmail::GmailClient,
    user_id: Uuid,
    email_address: &str,
    pacing_seconds: u64,
) -> Result<HistoricOutcome, StoreError> {
    if store.historic_run_completed(user_id, email_address).await? {
        return Ok(HistoricOutcome::AlreadyAnalyzed);
    }

    let emails = match gmail.list_recent(HISTORY_FETCH_LIMIT).await {
        Ok(emails) => emails,
        Err(err) => {
            warn!("historic fetch failed for {email_address}: {err}");
            Vec::new()
        }
    };
    let total = emails.len();
    if total == 0 {
        return Ok(HistoricOutcome::Completed(HistoricRunStats {
            total_emails: 0,
            discarded: 0,
            valuable: 0,
            senders_learned: 0,
            llm_calls: 0,
            savings_percent: 0.0,
        }));
    }

    // Layer-1 filter, no LLM.
    let mut valuable = Vec::new();
    let mut discarded = 0;
    for email in emails {
        if engine.is_obvious_spam(&email) || engine.initial_score(&email, "") < 30 {
            discarded += 1;
            continue;
        }
        valuable.push(email);
    }

    let mut by_sender: HashMap<String, Vec<FetchedEmail>> = HashMap::new();
    for email in valuable.iter().cloned() {
        by_sender.entry(email.sender.clone()).or_default().push(email);
    }

    let mut ranked: Vec<(String, Vec<FetchedEmail>)> = by_sender.into_iter().collect();
    ranked.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(TOP_SENDERS);

    let email_account_id = store
        .get_email_account(user_id, email_address)
        .await?
        .map(|account| account.id);

    let mut senders_learned = 0;
    let mut llm_calls = 0;
    for (sender, mut sender_emails) in ranked {
        sender_emails.sort_by_key(|email| email.date);

        let stats = sender_statistics(&sender_emails);
        let sample = render_sample(&sender_emails);

        // The only LLM work in the whole pass: one short call per top sender.
        let profile = match gateway
            .generate_json(prompts::sender_profile_request(&sender, &sample, SAMPLE_EMAILS.min(sender_emails.len())))
            .await
        {
            Ok(payload) => {
                llm_calls += 1;
                serde_json::from_value::<SenderProfileContract>(payload).unwrap_or_else(|err| {
                    warn!("sender profile parse failed for {sender}: {err}");
                    SenderProfileContract {
                        tono_habitual: None,
                        tema_principal: None,
                        nivel_importancia: None,
                        patron_comunicacion: None,
                    }
                })
            }
            Err(err) => {
                warn!("sender profile llm call failed for {sender}: {err}");
                continue;
            }
        };

        let upsert = SenderProfileUpsert {
            user_id,
            email_account_id,
            sender: &sender,
            total_emails: sender_emails.len() as i32,
            first_contact: sender_emails.first().and_then(|email| email.date),
            last_contact: sender_emails.last().and_then(|email| email.date),
            frequency_days: stats.frequency_days,
            typical_hour: stats.typical_hour,
            avg_length: stats.avg_length,
            top_keywords: &stats.top_keywords,
            habitual_tone: profile.tono_habitual.as_deref().unwrap_or("neutro"),
            primary_topic: profile.tema_principal.as_deref().unwrap_or("personal"),
            importance_level: profile.nivel_importancia.unwrap_or(5) as i32,
            communication_pattern: profile.patron_comunicacion.as_deref(),
        };

        match store.upsert_sender_profile(&upsert).await {
            Ok(()) => senders_learned += 1,
            Err(err) => warn!("sender profile upsert failed for {sender}: {err}"),
        }

        sleep(Duration::from_secs(pacing_seconds)).await;
    }

    let savings_percent = if total > 0 {
        ((total as f64 - llm_calls as f64) / total as f64) * 100.0
    } else {
        0.0
    };

    let run = HistoricRunStats {
        total_emails: total as i32,
        discarded,
        valuable: valuable.len() as i32,
        senders_learned,
        llm_calls,
        savings_percent: (savings_percent * 100.0).round() / 100.0,
    };
    store.record_historic_run(user_id, email_address, &run).await?;

    info!(
        "historic analysis for {email_address}: {} profiles, {} llm calls, {:.1}% saved",
        run.senders_learned, run.llm_calls, run.savings_percent
    );
    Ok(HistoricOutcome::Completed(run))
}

struct SenderStatistics {
    frequency_days: f64,
    typical_hour: i32,
    avg_length: i32,
    top_keywords: Vec<String>,
}

fn sender_statistics(emails: &[FetchedEmail]) -> SenderStatistics {
    let dates: Vec<_> = emails.iter().filter_map(|email| email.date).collect();

    let frequency_days = if dates.len() > 1 {
        let first = dates.iter().min().copied().unwrap_or_default();
        let last = dates.iter().max().copied().unwrap_or_default();
        let span_days = (last - first).num_days() as f64;
        span_days / emails.len() as f64
    } else {
        0.0
    };

    let typical_hour = most_common_hour(&dates).unwrap_or(12);

    let avg_length = if emails.is_empty() {
        0
    } else {
        let total: usize = emails.iter().map(|email| email.body.chars().count()).sum();
        (total / emails.len()) as i32
    };

    SenderStatistics {
        frequency_days,
        typical_hour,
        avg_length,
        top_keywords: top_keywords(emails),
    }
}

fn most_common_hour(dates: &[chrono::DateTime<chrono::Utc>]) -> Option<i32> {
    if dates.is_empty() {
        return None;
    }
    let mut counts = [0usize; 24];
    for date in dates {
        counts[date.hour() as usize] += 1;
    }
    counts
        .iter()
        .enumerate()
        .max_by_key(|(_, count)| **count)
        .map(|(hour, _)| hour as i32)
}

/// Simple tokenisation and count: words of four or more letters, top five.
fn top_keywords(emails: &[FetchedEmail]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for email in emails {
        let text = format!("{} {}", email.subject, email.body).to_lowercase();
        for word in text.split(|c: char| !c.is_alphanumeric()) {
            if word.chars().count() >= KEYWORD_MIN_LEN {
                *counts.entry(word.to_string()).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(TOP_KEYWORDS)
        .map(|(word, _)| word)
        .collect()
}

fn render_sample(emails: &[FetchedEmail]) -> String {
    emails
        .iter()
        .rev()
        .take(SAMPLE_EMAILS)
        .map(|email| {
            let excerpt: String = email.body.chars().take(200).collect();
            format!("Asunto: {}\nExtracto: {excerpt}", email.subject)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{sender_statistics, top_keywords};
    use crate::email::gmail::FetchedEmail;

    fn email_at(day: u32, hour: u32, body: &str) -> FetchedEmail {
        FetchedEmail {
            id: format!("m-{day}-{hour}"),
            thread_id: None,
            sender: "ana@acme.pe".to_string(),
            sender_full: "ana@acme.pe".to_string(),
            subject: "reporte mensual ventas".to_string(),
            body: body.to_string(),
            date: Utc.with_ymd_and_hms(2026, 1, day, hour, 0, 0).single(),
            labels: Vec::new(),
        }
    }

    #[test]
    fn frequency_is_span_over_count() {
        let emails = vec![
            email_at(1, 9, "contenido del reporte"),
            email_at(11, 9, "contenido del reporte"),
        ];
        let stats = sender_statistics(&emails);
        assert!((stats.frequency_days - 5.0).abs() < f64::EPSILON);
        assert_eq!(stats.typical_hour, 9);
    }

    #[test]
    fn keywords_skip_short_words_and_rank_by_count() {
        let emails = vec![
            email_at(1, 9, "ventas ventas ventas presupuesto de la semana"),
            email_at(2, 9, "ventas presupuesto"),
        ];
        let keywords = top_keywords(&emails);
        assert_eq!(keywords.first().map(String::as_str), Some("ventas"));
        assert!(keywords.iter().all(|word| word.chars().count() >= 4));
        assert!(keywords.len() <= 5);
    }
}
