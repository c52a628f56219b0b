//! Operational views over bookings.
//!
//! These read workflow data, not ledger lines.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use craneledger_accounting::LedgerPeriod;
use craneledger_core::{BookingId, ContactId, DomainResult, EntityId, Money};

use crate::booking::{Booking, BookingStatus};

const UNKNOWN_CONTACT: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSummary {
    pub entity_id: EntityId,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_bookings: usize,
    pub confirmed_bookings: usize,
    pub completed_bookings: usize,
    pub cancelled_bookings: usize,
    pub total_revenue: Money,
    pub total_margin: Money,
    pub total_supplier_payouts: Money,
    pub outstanding_deposits: Money,
}

/// Counts and totals over bookings created within `[from, to]` (whole days).
pub fn booking_summary(
    entity_id: EntityId,
    from: NaiveDate,
    to: NaiveDate,
    bookings: &[Booking],
) -> DomainResult<BookingSummary> {
    let period = LedgerPeriod::between(from, to)?;
    let in_range: Vec<&Booking> = bookings
        .iter()
        .filter(|b| b.entity_id == entity_id && period.contains(b.created_at.date_naive()))
        .collect();

    let count = |status: BookingStatus| in_range.iter().filter(|b| b.status == status).count();
    let completed = || in_range.iter().filter(|b| b.status == BookingStatus::Completed);

    Ok(BookingSummary {
        entity_id,
        from,
        to,
        total_bookings: in_range.len(),
        confirmed_bookings: count(BookingStatus::Confirmed),
        completed_bookings: count(BookingStatus::Completed),
        cancelled_bookings: count(BookingStatus::Cancelled),
        total_revenue: Money::sum(completed().map(|b| b.total_job_amount)),
        total_margin: Money::sum(completed().map(|b| b.margin_amount)),
        total_supplier_payouts: Money::sum(in_range.iter().map(|b| b.supplier_payout_amount)),
        outstanding_deposits: Money::sum(
            in_range
                .iter()
                .filter(|b| b.status == BookingStatus::Confirmed && b.deposit_amount.is_positive())
                .map(|b| b.deposit_amount),
        ),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutstandingDeposit {
    pub booking_id: BookingId,
    pub external_booking_id: String,
    pub customer_name: String,
    pub deposit_amount: Money,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

/// Deposits still held as a liability: every CONFIRMED booking.
pub fn outstanding_deposits(
    bookings: &[Booking],
    contact_names: &HashMap<ContactId, String>,
) -> Vec<OutstandingDeposit> {
    bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Confirmed)
        .map(|b| OutstandingDeposit {
            booking_id: b.id,
            external_booking_id: b.external_booking_id.clone(),
            customer_name: contact_names
                .get(&b.customer_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_CONTACT.to_string()),
            deposit_amount: b.deposit_amount,
            status: b.status,
            created_at: b.created_at,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingPayout {
    pub booking_id: BookingId,
    pub external_booking_id: String,
    pub supplier_name: String,
    pub payout_amount: Money,
    pub status: BookingStatus,
}

/// CONFIRMED or COMPLETED bookings with a supplier and no payout yet.
pub fn upcoming_payouts(
    bookings: &[Booking],
    paid_out: &HashSet<BookingId>,
    contact_names: &HashMap<ContactId, String>,
) -> Vec<UpcomingPayout> {
    bookings
        .iter()
        .filter(|b| matches!(b.status, BookingStatus::Confirmed | BookingStatus::Completed))
        .filter(|b| !paid_out.contains(&b.id))
        .filter_map(|b| {
            let supplier_id = b.supplier_id?;
            Some(UpcomingPayout {
                booking_id: b.id,
                external_booking_id: b.external_booking_id.clone(),
                supplier_name: contact_names
                    .get(&supplier_id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_CONTACT.to_string()),
                payout_amount: b.supplier_payout_amount,
                status: b.status,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginReport {
    pub entity_id: EntityId,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_margin: Money,
    pub booking_count: usize,
    pub average_margin: Money,
}

/// Margin over COMPLETED bookings last updated within `[from, to]`.
pub fn margin_report(
    entity_id: EntityId,
    from: NaiveDate,
    to: NaiveDate,
    bookings: &[Booking],
) -> DomainResult<MarginReport> {
    let period = LedgerPeriod::between(from, to)?;
    let completed: Vec<&Booking> = bookings
        .iter()
        .filter(|b| {
            b.entity_id == entity_id
                && b.status == BookingStatus::Completed
                && period.contains(b.updated_at.date_naive())
        })
        .collect();

    let total_margin = Money::sum(completed.iter().map(|b| b.margin_amount));
    let booking_count = completed.len();
    let average_margin = if booking_count == 0 {
        Money::ZERO
    } else {
        total_margin.divide(Decimal::from(booking_count as u64))?
    };

    Ok(MarginReport {
        entity_id,
        from,
        to,
        total_margin,
        booking_count,
        average_margin,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    use crate::booking::NewBooking;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    fn at(d: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, d, hour, 0, 0).unwrap()
    }

    fn test_booking(entity_id: EntityId, ext: &str, supplier: Option<ContactId>, created: DateTime<Utc>) -> Booking {
        let input = NewBooking {
            external_booking_id: ext.into(),
            entity_id,
            customer_name: "Customer".into(),
            customer_email: None,
            supplier_name: None,
            supplier_email: None,
            total_job_amount: Money::from_major(1000),
            deposit_amount: None,
            margin_amount: None,
        };
        Booking::register(&input, ContactId::new(), supplier, created).unwrap()
    }

    #[test]
    fn summary_counts_by_status_and_includes_the_whole_last_day() {
        let entity_id = EntityId::new();
        let mut confirmed = test_booking(entity_id, "A", None, at(1, 9));
        confirmed.record_deposit(Money::from_major(200), at(1, 9)).unwrap();

        let mut completed = test_booking(entity_id, "B", Some(ContactId::new()), at(3, 23));
        completed.record_payout(Money::from_major(700), at(3, 23)).unwrap();
        completed.recognize_margin(Money::from_major(150), at(3, 23)).unwrap();

        let outside = test_booking(entity_id, "C", None, at(4, 0));
        let other_entity = test_booking(EntityId::new(), "D", None, at(2, 12));

        let summary =
            booking_summary(entity_id, day(1), day(3), &[confirmed, completed, outside, other_entity]).unwrap();

        assert_eq!(summary.total_bookings, 2);
        assert_eq!(summary.confirmed_bookings, 1);
        assert_eq!(summary.completed_bookings, 1);
        assert_eq!(summary.cancelled_bookings, 0);
        assert_eq!(summary.total_revenue, Money::from_major(1000));
        assert_eq!(summary.total_margin, Money::from_major(150));
        assert_eq!(summary.total_supplier_payouts, Money::from_major(700));
        assert_eq!(summary.outstanding_deposits, Money::from_major(200));
    }

    #[test]
    fn summary_rejects_inverted_range() {
        assert!(booking_summary(EntityId::new(), day(5), day(1), &[]).is_err());
    }

    #[test]
    fn outstanding_deposits_fall_back_to_unknown_customer() {
        let entity_id = EntityId::new();
        let mut known = test_booking(entity_id, "A", None, at(1, 9));
        known.record_deposit(Money::from_major(100), at(1, 9)).unwrap();
        let mut unknown = test_booking(entity_id, "B", None, at(1, 9));
        unknown.record_deposit(Money::from_major(50), at(1, 9)).unwrap();
        let pending = test_booking(entity_id, "C", None, at(1, 9));

        let names = HashMap::from([(known.customer_id, "Harbour Builders".to_string())]);
        let rows = outstanding_deposits(&[known, unknown, pending], &names);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].customer_name, "Harbour Builders");
        assert_eq!(rows[1].customer_name, "Unknown");
    }

    #[test]
    fn upcoming_payouts_skip_paid_and_supplierless_bookings() {
        let entity_id = EntityId::new();
        let supplier = ContactId::new();
        let mut due = test_booking(entity_id, "A", Some(supplier), at(1, 9));
        due.record_deposit(Money::from_major(100), at(1, 9)).unwrap();
        let mut paid = test_booking(entity_id, "B", Some(supplier), at(1, 9));
        paid.record_deposit(Money::from_major(100), at(1, 9)).unwrap();
        let mut no_supplier = test_booking(entity_id, "C", None, at(1, 9));
        no_supplier.record_deposit(Money::from_major(100), at(1, 9)).unwrap();

        let paid_out = HashSet::from([paid.id]);
        let names = HashMap::from([(supplier, "Big Lift".to_string())]);
        let rows = upcoming_payouts(&[due.clone(), paid, no_supplier], &paid_out, &names);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].booking_id, due.id);
        assert_eq!(rows[0].supplier_name, "Big Lift");
    }

    #[test]
    fn margin_report_averages_to_four_places() {
        let entity_id = EntityId::new();
        let mut bookings = Vec::new();
        for (i, margin) in ["100", "100", "100.0001"].iter().enumerate() {
            let mut b = test_booking(entity_id, &format!("M{i}"), None, at(1, 9));
            b.recognize_margin(Money::parse(margin).unwrap(), at(2, 9) + Duration::minutes(i as i64))
                .unwrap();
            bookings.push(b);
        }

        let report = margin_report(entity_id, day(2), day(2), &bookings).unwrap();
        assert_eq!(report.booking_count, 3);
        assert_eq!(report.total_margin.to_string(), "300.0001");
        assert_eq!(report.average_margin.to_string(), "100.0000");

        let empty = margin_report(entity_id, day(10), day(11), &bookings).unwrap();
        assert_eq!(empty.booking_count, 0);
        assert_eq!(empty.average_margin, Money::ZERO);
    }
}
