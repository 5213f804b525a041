//! Notification records and donor alert delivery
//!
//! Every dispatch creates fresh records ("resend" semantics): calling it again
//! for the same request and donors records a second notification. Within one
//! call, repeated donor IDs are collapsed so each donor gets one record.
//! Delivery is best-effort: a record is kept whether or not the mail went out,
//! and a failed send never stops the rest of the batch.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use lifepulse_core::DonorResponse;
use serde::Serialize;

use crate::email::{alert_mail, Mailer};
use crate::error::{ServerError, ServerResult};
use crate::store::{
    DonorId, DonorStore, NotificationId, NotificationRecord, NotificationStore, RequestId,
    RequestStore,
};

/// Where alert mails point donors to
#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub platform_name: String,
    pub frontend_url: String,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            platform_name: "LifePulse".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
        }
    }
}

/// One notified donor
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub record: NotificationRecord,
    pub delivered: bool,
}

/// Result of one dispatch call
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    /// Outcomes in input order
    pub outcomes: Vec<DispatchOutcome>,
    /// IDs that did not resolve to a donor; no record was created for them
    pub unknown_donors: Vec<DonorId>,
}

impl DispatchReport {
    pub fn records(&self) -> Vec<&NotificationRecord> {
        self.outcomes.iter().map(|o| &o.record).collect()
    }

    pub fn delivered_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.delivered).count()
    }
}

/// Outcome of a request-less urgent alert
#[derive(Debug, Clone, Serialize)]
pub struct AlertOutcome {
    pub donor_id: DonorId,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct NotificationDispatcher<S, M> {
    store: Arc<S>,
    mailer: Arc<M>,
    settings: AlertSettings,
}

impl<S, M> NotificationDispatcher<S, M>
where
    S: DonorStore + RequestStore + NotificationStore,
    M: Mailer,
{
    pub fn new(store: Arc<S>, mailer: Arc<M>, settings: AlertSettings) -> Self {
        Self {
            store,
            mailer,
            settings,
        }
    }

    /// Record and send one notification per donor for a request
    pub fn dispatch(&self, request_id: RequestId, donor_ids: &[DonorId]) -> ServerResult<DispatchReport> {
        let request = self
            .store
            .get_request(request_id)?
            .ok_or(ServerError::RequestNotFound)?;

        let mut seen = HashSet::new();
        let mut report = DispatchReport::default();

        for &donor_id in donor_ids {
            if !seen.insert(donor_id) {
                continue;
            }

            let donor = match self.store.get_donor(donor_id)? {
                Some(donor) => donor,
                None => {
                    report.unknown_donors.push(donor_id);
                    continue;
                }
            };

            let record = self
                .store
                .create_notification(request.id, donor.id, Utc::now())?;

            let mail = alert_mail(
                &self.settings.platform_name,
                &donor.full_name,
                Some(request.blood_group_needed),
                &self.settings.frontend_url,
            );
            let delivered = self.mailer.send_mail(&donor.email, &mail).is_ok();

            report.outcomes.push(DispatchOutcome { record, delivered });
        }

        Ok(report)
    }

    /// Record a donor's answer to a notification. Last write wins.
    pub fn record_response(
        &self,
        notification_id: NotificationId,
        donor_id: DonorId,
        response: DonorResponse,
    ) -> ServerResult<NotificationRecord> {
        if response == DonorResponse::NoResponse {
            return Err(lifepulse_core::Error::InvalidResponse(response.to_string()).into());
        }
        self.store
            .set_response(notification_id, donor_id, response, Utc::now())
    }

    /// Send an urgent alert that is not tied to a request.
    ///
    /// No notification record is created, since records belong to a request.
    pub fn alert(&self, donor_id: DonorId) -> ServerResult<AlertOutcome> {
        let donor = self
            .store
            .get_donor(donor_id)?
            .ok_or(ServerError::DonorNotFound)?;

        let mail = alert_mail(
            &self.settings.platform_name,
            &donor.full_name,
            None,
            &self.settings.frontend_url,
        );
        let error = self.mailer.send_mail(&donor.email, &mail).err();

        Ok(AlertOutcome {
            donor_id,
            delivered: error.is_none(),
            error,
        })
    }
}
