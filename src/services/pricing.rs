//! Booking price derivation.
//!
//! Everything here is a pure function of its arguments: the same schedule,
//! guests, add-ons and surcharge always produce the same total.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, SubsecRound, Utc};
use serde::Serialize;

use crate::errors::BookingError;
use crate::models::{Addon, Location, PriceUnit};

const SECONDS_PER_HOUR: i64 = 3600;

#[derive(Debug, Clone)]
pub struct PriceInputs<'a> {
    pub base_price_per_hour: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub guest_count: i64,
    pub incremental_rate_per_guest: i64,
    pub addons: &'a [Addon],
    pub additional_price: i64,
}

impl<'a> PriceInputs<'a> {
    pub fn for_location(
        location: &Location,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        guest_count: i64,
        addons: &'a [Addon],
        additional_price: i64,
    ) -> Self {
        Self {
            base_price_per_hour: location.base_price_per_hour,
            start,
            end,
            guest_count,
            incremental_rate_per_guest: location.incremental_rate_per_guest,
            addons,
            additional_price,
        }
    }
}

/// All amounts in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub duration_hours: i64,
    pub base_price: i64,
    pub guest_fee: i64,
    pub addon_total: i64,
    pub additional_price: i64,
    pub total: i64,
}

/// Accepts RFC 3339 or a naive `YYYY-MM-DD[T ]HH:MM[:SS]` read as UTC.
/// Sub-second precision is dropped; stored timestamps carry whole seconds.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, BookingError> {
    let raw = raw.trim();
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|naive| naive.and_utc())
        })
        .ok_or_else(|| BookingError::InvalidDuration(format!("cannot parse timestamp '{raw}'")))?;

    if !(1..=9999).contains(&parsed.year()) {
        return Err(BookingError::InvalidDuration(format!(
            "timestamp '{raw}' is outside years 1 to 9999"
        )));
    }
    Ok(parsed.trunc_subsecs(0))
}

/// An end at or before the start, but less than a day earlier, is read as
/// the same clock time on the following day.
pub fn effective_end(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<DateTime<Utc>, BookingError> {
    if end > start {
        return Ok(end);
    }
    let rolled = end.checked_add_signed(Duration::days(1)).ok_or_else(|| {
        BookingError::InvalidDuration(format!("end {end} cannot roll over to the next day"))
    })?;
    if rolled > start {
        Ok(rolled)
    } else {
        Err(BookingError::InvalidDuration(format!(
            "end {end} is more than a day before start {start}"
        )))
    }
}

/// Whole hours between start and (effective) end, partial hours rounded up,
/// never less than one.
pub fn duration_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64, BookingError> {
    let end = effective_end(start, end)?;
    let seconds = (end - start).num_seconds();
    let hours = (seconds + SECONDS_PER_HOUR - 1) / SECONDS_PER_HOUR;
    Ok(hours.max(1))
}

pub fn calculate(inputs: &PriceInputs) -> Result<PriceBreakdown, BookingError> {
    if inputs.guest_count < 1 {
        return Err(BookingError::InvalidGuestCount(inputs.guest_count));
    }
    non_negative(inputs.base_price_per_hour, "base_price_per_hour")?;
    non_negative(inputs.incremental_rate_per_guest, "incremental_rate_per_guest")?;
    non_negative(inputs.additional_price, "additional_price")?;

    let duration_hours = duration_hours(inputs.start, inputs.end)?;

    let base_price = inputs
        .base_price_per_hour
        .checked_mul(duration_hours)
        .ok_or(BookingError::PriceOverflow("base price"))?;

    let guest_fee = (inputs.guest_count - 1)
        .checked_mul(inputs.incremental_rate_per_guest)
        .ok_or(BookingError::PriceOverflow("guest fee"))?;

    let mut addon_total: i64 = 0;
    for addon in inputs.addons {
        non_negative(addon.price, "addon price")?;
        let charge = match addon.price_unit {
            PriceUnit::Flat => Some(addon.price),
            PriceUnit::PerHour => addon.price.checked_mul(duration_hours),
        };
        addon_total = charge
            .and_then(|c| addon_total.checked_add(c))
            .ok_or(BookingError::PriceOverflow("add-on total"))?;
    }

    let total = [guest_fee, addon_total, inputs.additional_price]
        .into_iter()
        .try_fold(base_price, |acc, part| acc.checked_add(part))
        .ok_or(BookingError::PriceOverflow("total price"))?;

    Ok(PriceBreakdown {
        duration_hours,
        base_price,
        guest_fee,
        addon_total,
        additional_price: inputs.additional_price,
        total,
    })
}

/// Maps selected add-on ids onto the location's catalogue.
pub fn resolve_addons(
    location: &Location,
    selected: &BTreeSet<String>,
) -> Result<Vec<Addon>, BookingError> {
    selected
        .iter()
        .map(|id| {
            location
                .addons
                .iter()
                .find(|a| &a.id == id)
                .cloned()
                .ok_or_else(|| BookingError::UnknownAddon {
                    addon: id.clone(),
                    location: location.id.clone(),
                })
        })
        .collect()
}

fn non_negative(value: i64, field: &'static str) -> Result<(), BookingError> {
    if value < 0 {
        Err(BookingError::NegativeAmount { field })
    } else {
        Ok(())
    }
}
