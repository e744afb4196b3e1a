//! Reference, transaction id and due-date helpers. Pure: callers pass the
//! clock reading and the random source.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::Rng;

use crate::domain::DocumentKind;

/// Days between issuance and payment due date.
pub const PAYMENT_TERM_DAYS: i64 = 30;

/// Fresh draws allowed after a reference is rejected as already taken.
pub const REFERENCE_RETRIES: usize = 1;

const TRANSACTION_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `<PREFIX>-<YYYYMMDD>-<unix millis>-<0..=999>`.
pub fn generate_reference<R: Rng + ?Sized>(
    kind: &DocumentKind,
    now: DateTime<Utc>,
    rng: &mut R,
) -> String {
    format!(
        "{}-{}-{}-{}",
        kind.reference_prefix(),
        now.format("%Y%m%d"),
        now.timestamp_millis(),
        rng.gen_range(0..1000)
    )
}

/// `TXN-<unix millis>-<9 base36 chars>`, quoted back to callers for support lookups.
pub fn generate_transaction_id<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: String = (0..TRANSACTION_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("TXN-{}-{}", now.timestamp_millis(), suffix)
}

/// Due date for an invoice issued on `issued_on`. Payment-terms text never shifts it.
pub fn due_date(issued_on: NaiveDate) -> NaiveDate {
    issued_on + Duration::days(PAYMENT_TERM_DAYS)
}
