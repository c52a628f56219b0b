//! Crane-hire booking workflow domain.
//!
//! A booking moves PENDING -> CONFIRMED (deposit) -> COMPLETED (margin
//! recognized), or to CANCELLED. Every money movement is expressed as a
//! balanced set of journal lines built here and posted by the ledger engine.
//! The operational views (deposits held, payouts pending, margin earned) are
//! pure folds over bookings.

pub mod booking;
pub mod postings;
pub mod summary;

pub use booking::{
    Booking, BookingAccounts, BookingEvent, BookingEventType, BookingStatus,
    CancellationScenario, NewBooking,
};
pub use postings::{gst_inclusive_split, BookingPosting, GstSplit};
pub use summary::{
    booking_summary, margin_report, outstanding_deposits, upcoming_payouts, BookingSummary,
    MarginReport, OutstandingDeposit, UpcomingPayout,
};
