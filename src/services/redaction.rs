//! Contact visibility for premium listings.
//!
//! Anything that may be cached is redacted for every premium listing. The
//! contacts a caller has paid for are put back per response.

use std::collections::HashMap;
use tracing::warn;

use crate::db::Store;
use crate::models::account::Caller;
use crate::models::service::ServiceRecord;

/// Redacts the contact of every premium listing.
pub fn redact_premium(records: &mut [ServiceRecord]) {
    for record in records.iter_mut().filter(|r| r.premium_only) {
        record.redact_contact();
    }
}

/// Restores contacts of premium listings the caller has a completed payment
/// for. Lookup failures leave the records redacted.
pub async fn restore_paid_contacts(
    store: &Store,
    records: &mut [ServiceRecord],
    caller: Option<Caller>,
) {
    let Some(caller) = caller.filter(|c| c.verified) else {
        return;
    };

    let premium: Vec<i32> = records
        .iter()
        .filter(|r| r.premium_only)
        .map(|r| r.id)
        .collect();
    if premium.is_empty() {
        return;
    }

    let contacts = match paid_contacts(store, caller.user_id, &premium).await {
        Ok(contacts) => contacts,
        Err(e) => {
            warn!(user_id = caller.user_id, error = %e, "Could not check purchases, keeping contacts redacted");
            return;
        }
    };

    for record in records.iter_mut() {
        if let Some(contact) = contacts.get(&record.id) {
            record.contact_info.clone_from(contact);
        }
    }
}

async fn paid_contacts(
    store: &Store,
    user_id: i32,
    service_ids: &[i32],
) -> anyhow::Result<HashMap<i32, Option<String>>> {
    let paid = store.paid_service_ids(user_id, service_ids).await?;
    let records = store.get_services(&paid).await?;
    Ok(records.into_iter().map(|r| (r.id, r.contact_info)).collect())
}
