//! Offline notifications delivered through Mailjet.

use crate::config::{Config, MailjetConfig, WorkerContact};
use crate::error::NotifyError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

const SENDER_NAME: &str = "Fairshares";

/// What happened to a notification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Messages sent, one per matching contact entry.
    Sent(usize),
    /// No configured contact has this worker name.
    NoContact,
    /// A contact matched but mail credentials are not configured.
    Disabled,
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Tell the contacts of `worker_name` that it went offline.
    async fn notify(&self, worker_name: &str) -> Result<Delivery, NotifyError>;
}

/// Rendered email for one contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineNotice {
    pub to_email: String,
    pub to_name: String,
    pub subject: String,
    pub text: String,
}

impl OfflineNotice {
    pub fn new(contact: &WorkerContact, pool_page: &str) -> Self {
        Self {
            to_email: contact.notify.clone(),
            to_name: contact.name.clone(),
            subject: format!("{} Is Offline", contact.name),
            text: format!(
                "Worker `{}` Is Offline.\n\nPlease check your pool: {}.",
                contact.name, pool_page
            ),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendRequest<'a> {
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Message<'a> {
    from: Recipient<'a>,
    to: Vec<Recipient<'a>>,
    subject: &'a str,
    text_part: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Recipient<'a> {
    email: &'a str,
    name: &'a str,
}

pub struct MailjetNotifier {
    client: Client,
    mailjet: MailjetConfig,
    contacts: Vec<WorkerContact>,
    pool_page: String,
}

impl MailjetNotifier {
    pub fn new(config: &Config) -> Self {
        Self::with_client(config, Client::new())
    }

    pub fn with_client(config: &Config, client: Client) -> Self {
        Self {
            client,
            mailjet: config.mailjet.clone(),
            contacts: config.workers.clone(),
            pool_page: format!(
                "{}/{}",
                config.flexpool.page_url.trim_end_matches('/'),
                config.flexpool.address
            ),
        }
    }

    fn contacts_for<'a>(&'a self, worker_name: &'a str) -> impl Iterator<Item = &'a WorkerContact> {
        self.contacts.iter().filter(move |c| c.name == worker_name)
    }

    async fn send(&self, notice: &OfflineNotice) -> Result<(), NotifyError> {
        let request = SendRequest {
            messages: vec![Message {
                from: Recipient {
                    email: &self.mailjet.email,
                    name: SENDER_NAME,
                },
                to: vec![Recipient {
                    email: &notice.to_email,
                    name: &notice.to_name,
                }],
                subject: &notice.subject,
                text_part: &notice.text,
            }],
        };

        let url = format!("{}/v3.1/send", self.mailjet.api_url().trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.mailjet.key, Some(&self.mailjet.secret))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationService for MailjetNotifier {
    async fn notify(&self, worker_name: &str) -> Result<Delivery, NotifyError> {
        let contacts: Vec<&WorkerContact> = self.contacts_for(worker_name).collect();
        if contacts.is_empty() {
            debug!(worker = %worker_name, "Notifier: no contact configured for {}", worker_name);
            return Ok(Delivery::NoContact);
        }

        let mut sent = 0;
        for contact in contacts {
            info!(
                worker = %contact.name,
                notify = %contact.notify,
                "{} is offline, sending notification to {}",
                contact.name,
                contact.notify
            );
            if !self.mailjet.is_configured() {
                continue;
            }

            let notice = OfflineNotice::new(contact, &self.pool_page);
            self.send(&notice).await?;
            sent += 1;
        }

        if sent == 0 {
            debug!(worker = %worker_name, "Notifier: mailjet credentials missing, nothing sent");
            return Ok(Delivery::Disabled);
        }
        Ok(Delivery::Sent(sent))
    }
}
