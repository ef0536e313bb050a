//! In-memory CRM double for service tests

use crate::io::crm::{ContactUpdate, CrmApi, CrmError, EventSubmission, NewContact, RemoteContact};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// One recorded API call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateContact { email: String, name: Option<String>, phone: Option<String> },
    SearchContact { email: String },
    UpdateContact { id: String, name: Option<String>, phone: Option<String> },
    CreateEvent { email: String, event_name: String, created_at: i64 },
}

#[derive(Default)]
struct State {
    contacts: HashMap<String, String>,
    calls: Vec<Call>,
    create_error: Option<CrmError>,
    search_error: Option<CrmError>,
    update_error: Option<CrmError>,
    /// Keyed by 0-based create_event call index
    event_errors: HashMap<usize, CrmError>,
    events_seen: usize,
}

#[derive(Default)]
pub struct MockCrm {
    state: Mutex<State>,
}

impl MockCrm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing_contact(self, email: &str, id: &str) -> Self {
        self.state.lock().contacts.insert(email.to_string(), id.to_string());
        self
    }

    pub fn with_create_error(self, err: CrmError) -> Self {
        self.state.lock().create_error = Some(err);
        self
    }

    pub fn with_search_error(self, err: CrmError) -> Self {
        self.state.lock().search_error = Some(err);
        self
    }

    pub fn with_update_error(self, err: CrmError) -> Self {
        self.state.lock().update_error = Some(err);
        self
    }

    pub fn with_event_error(self, index: usize, err: CrmError) -> Self {
        self.state.lock().event_errors.insert(index, err);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn event_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|c| matches!(c, Call::CreateEvent { .. })).collect()
    }
}

#[async_trait]
impl CrmApi for MockCrm {
    async fn create_contact(&self, contact: &NewContact) -> Result<(), CrmError> {
        let mut state = self.state.lock();
        state.calls.push(Call::CreateContact {
            email: contact.email.clone(),
            name: contact.name.clone(),
            phone: contact.phone.clone(),
        });
        if let Some(err) = state.create_error.clone() {
            return Err(err);
        }
        if state.contacts.contains_key(&contact.email) {
            return Err(CrmError::from_response(
                409,
                r#"{"type":"error.list","errors":[{"code":"conflict","message":"A contact matching those details already exists"}]}"#,
            ));
        }
        let id = format!("c-{}", state.contacts.len() + 1);
        state.contacts.insert(contact.email.clone(), id);
        Ok(())
    }

    async fn search_contact_by_email(
        &self,
        email: &str,
    ) -> Result<Option<RemoteContact>, CrmError> {
        let mut state = self.state.lock();
        state.calls.push(Call::SearchContact { email: email.to_string() });
        if let Some(err) = state.search_error.clone() {
            return Err(err);
        }
        Ok(state
            .contacts
            .get(email)
            .map(|id| RemoteContact { id: id.clone(), email: Some(email.to_string()) }))
    }

    async fn update_contact(
        &self,
        contact_id: &str,
        update: &ContactUpdate,
    ) -> Result<(), CrmError> {
        let mut state = self.state.lock();
        state.calls.push(Call::UpdateContact {
            id: contact_id.to_string(),
            name: update.name.clone(),
            phone: update.phone.clone(),
        });
        match state.update_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn create_event(&self, event: &EventSubmission) -> Result<(), CrmError> {
        let mut state = self.state.lock();
        state.calls.push(Call::CreateEvent {
            email: event.email.clone(),
            event_name: event.event_name.clone(),
            created_at: event.created_at,
        });
        let index = state.events_seen;
        state.events_seen += 1;
        match state.event_errors.get(&index) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
