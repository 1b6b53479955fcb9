//! Newsletter delivery sub-flow.

pub mod mailer;
pub mod registry;

use std::{collections::HashMap, sync::Arc};

use market_client::domain::{Region, User};
use tokio::task::JoinSet;

use crate::{
    retry::RetryPolicy,
    transform::{TransformError, TransformedResult},
};

pub use mailer::{Mailer, OutgoingEmail, SmtpMailer};
pub use registry::{CsvUserRegistry, PgUserRegistry, StaticUserRegistry, UserRegistry};

#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    #[error("user registry unavailable: {0}")]
    Registry(String),
    #[error("sending to {to} failed: {reason}")]
    Send { to: String, reason: String },
    #[error("cannot render newsletter: {0}")]
    Render(#[from] TransformError),
    #[error("{failed} of {total} newsletters were not delivered")]
    PartialDelivery { failed: usize, total: usize },
}

/// Aggregate outcome of one sub-flow run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<String>,
    /// (email, reason)
    pub failed: Vec<(String, String)>,
}

impl DeliveryReport {
    pub fn submitted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }

    pub fn ensure_complete(&self) -> Result<(), NotifyError> {
        if self.failed.is_empty() {
            Ok(())
        } else {
            Err(NotifyError::PartialDelivery {
                failed: self.failed.len(),
                total: self.submitted(),
            })
        }
    }
}

pub struct Notifier {
    registry: Arc<dyn UserRegistry>,
    mailer: Arc<dyn Mailer>,
    retry: RetryPolicy,
}

impl Notifier {
    pub fn new(registry: Arc<dyn UserRegistry>, mailer: Arc<dyn Mailer>, retry: RetryPolicy) -> Self {
        Self { registry, mailer, retry }
    }

    /// Sends one newsletter per registered user.
    ///
    /// Loading the registry is retried with the sub-flow policy. Sends are
    /// submitted once each and run concurrently; a failed send is recorded
    /// in the report and never stops the others.
    pub async fn send_newsletters(
        &self,
        result: &TransformedResult,
        region: &Region,
    ) -> Result<DeliveryReport, NotifyError> {
        let registry = &self.registry;
        let users = self.retry.run("load_users", move || registry.load_users()).await?;
        let table_html = result.table_html()?;
        let subject = format!("Newsletter: {}", result.title);

        let mut tasks = JoinSet::new();
        let mut recipients = HashMap::with_capacity(users.len());
        for user in &users {
            let email = OutgoingEmail {
                to: user.email.clone(),
                subject: subject.clone(),
                html_body: compose_body(user, result, &table_html, region),
            };
            let mailer = Arc::clone(&self.mailer);
            let handle = tasks.spawn(async move { mailer.send(email).await });
            recipients.insert(handle.id(), user.email.clone());
        }
        tracing::info!(users = users.len(), "newsletter sends submitted");

        let mut report = DeliveryReport::default();
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, sent) = match joined {
                Ok((id, sent)) => (id, sent.map_err(|e| e.to_string())),
                Err(e) => (e.id(), Err(format!("send task aborted: {e}"))),
            };
            let to = recipients.remove(&id).unwrap_or_default();
            match sent {
                Ok(()) => {
                    metrics::counter!("newsletter_emails_sent_total").increment(1);
                    report.delivered.push(to);
                }
                Err(reason) => {
                    tracing::error!(error = %reason, to = %to, "newsletter send failed");
                    metrics::counter!("newsletter_emails_failed_total").increment(1);
                    report.failed.push((to, reason));
                }
            }
        }

        Ok(report)
    }
}

/// HTML body of a newsletter for one user.
pub fn compose_body(user: &User, result: &TransformedResult, table_html: &str, region: &Region) -> String {
    format!(
        "Hello {}, <br>Please find our latest update on: <br><br><h1>{} ({}):</h1>{}<br><br>{}",
        escape_html(&user.name),
        result.title,
        escape_html(&region.display_name),
        result.chart,
        table_html
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
