//! Contact resolution - make sure a CRM contact exists before an event references it
//!
//! Never fails the caller. A conflict on create proves the contact exists, so a
//! failed follow-up search/update is only logged. Any other failure is logged and
//! resolution is skipped; the event submission that follows is the authoritative
//! success signal.

use crate::domain::types::non_blank;
use crate::io::crm::{ContactUpdate, CrmApi, CrmError, NewContact};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which path contact resolution took
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactResolution {
    /// The contact did not exist and was created
    Created,
    /// The contact already existed. `updated` is true when name/phone were pushed.
    ConflictResolved { updated: bool },
    /// Creation failed for a non-conflict reason; existence is unknown
    ResolutionSkipped { reason: String },
}

impl ContactResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactResolution::Created => "created",
            ContactResolution::ConflictResolved { .. } => "conflict_resolved",
            ContactResolution::ResolutionSkipped { .. } => "skipped",
        }
    }
}

pub struct ContactResolver {
    api: Arc<dyn CrmApi>,
}

impl ContactResolver {
    pub fn new(api: Arc<dyn CrmApi>) -> Self {
        Self { api }
    }

    /// Create the contact, or reconcile with the existing one on conflict
    pub async fn ensure_contact(
        &self,
        email: &str,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> ContactResolution {
        let name = non_blank(name).map(str::to_string);
        let phone = non_blank(phone).map(str::to_string);

        let contact = NewContact::new(email, name.clone(), phone.clone());
        match self.api.create_contact(&contact).await {
            Ok(()) => {
                debug!(email = %email, "contact_created");
                ContactResolution::Created
            }
            Err(e) if e.is_conflict() => {
                debug!(email = %email, status = ?e.status(), "contact_exists");
                let updated = self.reconcile_existing(email, ContactUpdate { name, phone }).await;
                ContactResolution::ConflictResolved { updated }
            }
            Err(e) => {
                warn!(email = %email, error = %e, "contact_create_failed");
                ContactResolution::ResolutionSkipped { reason: e.to_string() }
            }
        }
    }

    /// Push supplied fields to the existing contact. Returns true if an update was written.
    async fn reconcile_existing(&self, email: &str, update: ContactUpdate) -> bool {
        if update.is_empty() {
            return false;
        }

        let existing = match self.api.search_contact_by_email(email).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                warn!(email = %email, "contact_search_no_match");
                return false;
            }
            Err(e) => {
                log_reconcile_failure(email, "search", &e);
                return false;
            }
        };

        match self.api.update_contact(&existing.id, &update).await {
            Ok(()) => {
                info!(email = %email, contact_id = %existing.id, "contact_updated");
                true
            }
            Err(e) => {
                log_reconcile_failure(email, "update", &e);
                false
            }
        }
    }
}

#[cold]
fn log_reconcile_failure(email: &str, step: &str, e: &CrmError) {
    warn!(email = %email, step = %step, error = %e, "contact_reconcile_failed");
}
