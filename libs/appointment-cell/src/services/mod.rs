pub mod calendar;
pub mod availability;
pub mod booking;
pub mod blackout;
pub mod lifecycle;
pub mod overview;

pub use calendar::{CalendarGrid, ClinicSchedule, GridSlot};
pub use availability::{AvailabilityService, SlotLookup};
pub use booking::BookingService;
pub use blackout::BlackoutService;
pub use lifecycle::AppointmentLifecycleService;
pub use overview::OverviewService;
